//! Real-time frames. Every frame is a JSON text message `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};
use townhall_base::{Kind, Record};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "events-update")]
    EventsUpdate(Vec<Record>),
    #[serde(rename = "programs-update")]
    ProgramsUpdate(Vec<Record>),
    #[serde(rename = "notification")]
    Notification(Notification),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Relayed verbatim to every other subscriber.
    #[serde(rename = "notification")]
    Notification(Notification),
}

/// Out-of-band admin announcement, never persisted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: String,
}

impl ServerEvent {
    /// Full snapshot of one collection.
    pub fn update(kind: Kind, records: Vec<Record>) -> Self {
        match kind {
            Kind::Events => ServerEvent::EventsUpdate(records),
            Kind::Programs => ServerEvent::ProgramsUpdate(records),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::EventsUpdate(_) => Kind::Events.update_event(),
            ServerEvent::ProgramsUpdate(_) => Kind::Programs.update_event(),
            ServerEvent::Notification(_) => "notification",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
