use crate::api;
use crate::common::Error;
use crate::config::Config;
use crate::handle_result;
use crate::hub::{BroadcastHub, SubscriberId, Subscription};
use crate::message::{ClientEvent, ServerEvent};
use crate::service::MutationService;
use crate::sync_notifier::{Disabled, Notifier, SyncNotifier};
use futures_util::{Sink, SinkExt, StreamExt, TryStreamExt};
use log::{error, info, trace, warn};
use postage::prelude::Stream;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};

pub struct TownhallServer {
    pub http_addr: SocketAddr,
    pub ws_addr: SocketAddr,
    pub service: Arc<MutationService>,
    pub join: JoinHandle<()>,
}

impl TownhallServer {
    /// Loads both collections, binds the HTTP and real-time listeners and starts serving.
    pub async fn start(config: &Config) -> Result<Self, Error> {
        let notifier: Arc<dyn Notifier> = if config.sync.enabled {
            let (notifier, _worker) = SyncNotifier::spawn(&config.sync);
            Arc::new(notifier)
        } else {
            Arc::new(Disabled)
        };
        let hub = BroadcastHub::new(config.subscriber_queue);
        let service = Arc::new(
            MutationService::open(&config.data_dir, hub, notifier, config.strict_persistence)
                .await,
        );

        let http_listener = TcpListener::bind(config.http_addr).await?;
        let ws_listener = TcpListener::bind(config.ws_addr).await?;
        let http_addr = http_listener.local_addr()?;
        let ws_addr = ws_listener.local_addr()?;

        let app = api::router(service.clone(), config.public_dir.as_deref());
        let ws_service = service.clone();
        let join = tokio::spawn(async move {
            tokio::select! {
                r = axum::serve(http_listener, app).into_future() => {
                    if let Err(e) = r {
                        error!("HTTP server stopped: {e}");
                    }
                }
                _ = ws_server_acceptor(ws_listener, ws_service) => {}
            }
        });
        info!("Serving HTTP on {http_addr}, real-time on ws://{ws_addr}");

        Ok(TownhallServer {
            http_addr,
            ws_addr,
            service,
            join,
        })
    }
}

pub async fn ws_server_acceptor(listener: TcpListener, service: Arc<MutationService>) {
    info!("Real-time acceptor started");
    loop {
        match listener.accept().await {
            Ok((tcp_stream, remote_addr)) => {
                trace!("Got new connection from: {remote_addr}");
                let service = service.clone();
                tokio::spawn(async move {
                    let ws_stream = match tokio_tungstenite::accept_async(tcp_stream).await {
                        Ok(ws_stream) => ws_stream,
                        Err(e) => {
                            warn!("{remote_addr}: websocket handshake failed: {e:?}");
                            return;
                        }
                    };
                    let (ws_sink, ws_source) = StreamExt::split(ws_stream);
                    let subscription = service.subscribe().await;
                    let id = subscription.id;
                    info!("{id}: connected from {remote_addr}");
                    ws_event_loop(ws_sink, ws_source, subscription, &service).await;
                    service.hub().disconnect(id);
                    info!("{id}: event loop exited");
                });
            }
            Err(e) => {
                warn!("{e:?}");
            }
        }
    }
}

async fn ws_event_loop(
    mut ws_tx: impl Sink<Message> + Unpin,
    mut ws_rx: impl futures_util::Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    mut subscription: Subscription,
    service: &MutationService,
) {
    let id = subscription.id;
    loop {
        tokio::select! {
            message = ws_rx.try_next() => {
                match message {
                    Ok(Some(Message::Close(_))) | Ok(None) => {
                        break;
                    }
                    Ok(Some(message)) => {
                        let r = process_message(message, id, service);
                        handle_result!(r);
                    }
                    Err(e) => {
                        warn!("{id}: {e}");
                        break;
                    }
                }
            }
            event = subscription.rx.recv() => {
                let Some(event) = event else {
                    info!("{id}: dropped by hub");
                    break;
                };
                let r = send_event(&event, &mut ws_tx).await;
                handle_result!(r);
            }
        }
    }
}

fn process_message(
    ws_message: Message,
    from: SubscriberId,
    service: &MutationService,
) -> Result<(), Error> {
    match ws_message {
        Message::Text(text) => {
            let event: ClientEvent = serde_json::from_str(&text)?;
            let ClientEvent::Notification(notification) = event;
            let delivered = service.relay(from, notification);
            trace!("{from}: notification relayed to {delivered}");
        }
        Message::Ping(_) | Message::Pong(_) => {}
        u => {
            warn!("{from}: unsupported ws message: {u:?}");
        }
    }
    Ok(())
}

async fn send_event(
    event: &ServerEvent,
    ws_tx: &mut (impl Sink<Message> + Unpin),
) -> Result<(), Error> {
    let text = event.to_json()?;
    ws_tx
        .send(Message::Text(text))
        .await
        .map_err(|_| Error::Ws)?;
    Ok(())
}
