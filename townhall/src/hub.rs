use crate::message::{Notification, ServerEvent};
use log::{error, info, trace, warn};
use postage::mpsc::{channel, Receiver, Sender};
use postage::prelude::Sink;
use std::collections::HashMap;
use std::sync::Mutex;
use townhall_base::{Kind, Record};
use uuid::Uuid;

pub type SubscriberId = Uuid;

/// Receiving half handed to a connection task.
pub struct Subscription {
    pub id: SubscriberId,
    pub rx: Receiver<ServerEvent>,
}

/// Set of connected real-time subscribers.
///
/// Every subscriber owns a bounded queue. A subscriber whose queue is full or closed is dropped
/// from the hub, its connection task then sees the end of its queue and closes the socket.
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, Sender<ServerEvent>>>,
    queue_len: usize,
}

impl BroadcastHub {
    pub fn new(queue_len: usize) -> Self {
        BroadcastHub {
            subscribers: Mutex::new(HashMap::new()),
            queue_len: queue_len.max(1),
        }
    }

    /// `initial` is queued before the subscriber becomes visible to broadcasts.
    pub fn register(&self, initial: Vec<ServerEvent>) -> Subscription {
        let id = Uuid::new_v4();
        let (mut tx, rx) = channel(self.queue_len.max(initial.len() + 1));
        for ev in initial {
            if tx.try_send(ev).is_err() {
                error!("{id}: initial snapshot did not fit the queue");
            }
        }
        match self.subscribers.lock() {
            Ok(mut subscribers) => {
                subscribers.insert(id, tx);
                info!("{id}: subscribed, {} connected", subscribers.len());
            }
            Err(_) => error!("{id}: subscriber map poisoned, not registered"),
        }
        Subscription { id, rx }
    }

    pub fn disconnect(&self, id: SubscriberId) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            error!("{id}: subscriber map poisoned");
            return;
        };
        if subscribers.remove(&id).is_some() {
            info!("{id}: unsubscribed, {} connected", subscribers.len());
        }
    }

    /// Sends the full `records` of `kind` to everyone, returns how many subscribers got it.
    pub fn broadcast(&self, kind: Kind, records: &[Record]) -> usize {
        let ev = ServerEvent::update(kind, records.to_vec());
        trace!("broadcast {} ({} records)", ev.name(), records.len());
        self.fan_out(ev, None)
    }

    /// Sends `notification` to every subscriber except `from`.
    pub fn relay(&self, from: SubscriberId, notification: Notification) -> usize {
        trace!("{from}: relaying {:?}", notification.kind);
        self.fan_out(ServerEvent::Notification(notification), Some(from))
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn fan_out(&self, ev: ServerEvent, except: Option<SubscriberId>) -> usize {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            error!("subscriber map poisoned, {} not delivered", ev.name());
            return 0;
        };
        let mut delivered = 0;
        subscribers.retain(|id, tx| {
            if Some(*id) == except {
                return true;
            }
            match tx.try_send(ev.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    warn!("{id}: queue full or closed, dropping subscriber");
                    false
                }
            }
        });
        delivered
    }
}
