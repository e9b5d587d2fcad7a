use crate::common::Error;
use crate::hub::{BroadcastHub, SubscriberId, Subscription};
use crate::message::{Notification, ServerEvent};
use crate::persistence::JsonFile;
use crate::store::CollectionStore;
use crate::sync_notifier::{Action, Change, Notifier};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use townhall_base::{Fields, Kind, Record, RecordId};

/// Runs every create and delete: store, disk, sync queue, subscribers, in that order.
///
/// Each kind sits behind its own async mutex that is held for the whole sequence, so mutations
/// of a kind are applied, written and broadcast one at a time and in the same order.
pub struct MutationService {
    events: Mutex<CollectionStore>,
    programs: Mutex<CollectionStore>,
    hub: BroadcastHub,
    notifier: Arc<dyn Notifier>,
    strict_persistence: bool,
}

impl MutationService {
    pub async fn open(
        data_dir: impl Into<PathBuf>,
        hub: BroadcastHub,
        notifier: Arc<dyn Notifier>,
        strict_persistence: bool,
    ) -> Self {
        let data_dir = data_dir.into();
        let events =
            CollectionStore::load(Kind::Events, JsonFile::for_kind(&data_dir, Kind::Events)).await;
        let programs =
            CollectionStore::load(Kind::Programs, JsonFile::for_kind(&data_dir, Kind::Programs))
                .await;
        info!("Data loaded from {}", data_dir.display());
        MutationService {
            events: Mutex::new(events),
            programs: Mutex::new(programs),
            hub,
            notifier,
            strict_persistence,
        }
    }

    fn store(&self, kind: Kind) -> &Mutex<CollectionStore> {
        match kind {
            Kind::Events => &self.events,
            Kind::Programs => &self.programs,
        }
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub async fn list(&self, kind: Kind) -> Vec<Record> {
        self.store(kind).lock().await.records().to_vec()
    }

    pub async fn create(&self, kind: Kind, fields: Fields) -> Result<Record, Error> {
        let mut store = self.store(kind).lock().await;
        let record = store.append(fields);
        if let Err(e) = store.persist().await {
            if self.strict_persistence {
                store.pop();
                error!("{kind}: create of {} rolled back: {e}", record.id);
                return Err(e);
            }
            error!("{kind}: {} kept in memory only: {e}", record.id);
        }
        self.notifier.notify(Change {
            kind,
            action: Action::Add,
            label: record.label(),
        });
        self.hub.broadcast(kind, store.records());
        Ok(record)
    }

    /// `raw_id` is parsed leniently. An id that matches nothing is not an error, the collection
    /// simply stays as it is and `None` is returned.
    pub async fn delete(&self, kind: Kind, raw_id: &str) -> Result<Option<Record>, Error> {
        let id = RecordId::parse_lenient(raw_id);
        let mut store = self.store(kind).lock().await;
        let removed = store.remove_by_id(id);
        if let Err(e) = store.persist().await {
            if self.strict_persistence {
                if let Some((index, record)) = removed {
                    store.restore(index, record);
                }
                error!("{kind}: delete of {raw_id:?} rolled back: {e}");
                return Err(e);
            }
            error!("{kind}: delete of {raw_id:?} not persisted: {e}");
        }
        let label = match &removed {
            Some((_, record)) => record.label(),
            None => raw_id.to_string(),
        };
        self.notifier.notify(Change {
            kind,
            action: Action::Delete,
            label,
        });
        self.hub.broadcast(kind, store.records());
        Ok(removed.map(|(_, record)| record))
    }

    /// Registers a subscriber with the current snapshot of every kind. All stores are held while
    /// this happens, so no update can slip in between the snapshot and the registration.
    pub async fn subscribe(&self) -> Subscription {
        let events = self.events.lock().await;
        let programs = self.programs.lock().await;
        self.hub.register(vec![
            ServerEvent::update(Kind::Events, events.records().to_vec()),
            ServerEvent::update(Kind::Programs, programs.records().to_vec()),
        ])
    }

    pub fn relay(&self, from: SubscriberId, notification: Notification) -> usize {
        self.hub.relay(from, notification)
    }
}
