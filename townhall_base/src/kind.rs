use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Record kinds served by the site. Each kind is its own collection, file and update channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Events,
    Programs,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown record kind: {}", .0)]
pub struct UnknownKind(pub String);

impl Kind {
    pub const ALL: [Kind; 2] = [Kind::Events, Kind::Programs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Events => "events",
            Kind::Programs => "programs",
        }
    }

    /// Used in commit messages: "Add event: Gala".
    pub fn singular(&self) -> &'static str {
        match self {
            Kind::Events => "event",
            Kind::Programs => "program",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Kind::Events => "events.json",
            Kind::Programs => "programs.json",
        }
    }

    /// Name of the real-time event carrying this kind's full collection.
    pub fn update_event(&self) -> &'static str {
        match self {
            Kind::Events => "events-update",
            Kind::Programs => "programs-update",
        }
    }
}

impl FromStr for Kind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "events" => Ok(Kind::Events),
            "programs" => Ok(Kind::Programs),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
