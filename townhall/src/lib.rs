pub mod api;
pub mod common;
pub mod config;
mod consts;
pub mod hub;
pub mod message;
pub mod persistence;
pub mod service;
pub mod store;
pub mod sync_notifier;
pub mod sync_server;

pub use config::Config;
pub use service::MutationService;
pub use sync_server::TownhallServer;
pub use townhall_base::{Fields, Kind, Record, RecordId};
