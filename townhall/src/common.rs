use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("config: {}", .0)]
    Config(String),

    /// Valid JSON that is not an array of record objects.
    #[error("unexpected document shape: {}", .0)]
    Shape(String),

    #[error("persisting {}: {}", .path.display(), .source)]
    Persistence {
        path: PathBuf,
        source: Box<Error>,
    },

    #[error("Ws")]
    Ws,

    #[error("{}", .0)]
    Internal(String),
}

impl Error {
    pub fn persistence(path: impl Into<PathBuf>, source: Error) -> Self {
        Error::Persistence {
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            Error::Persistence { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    pub fn is_shape(&self) -> bool {
        match self {
            Error::Shape(_) => true,
            Error::Persistence { source, .. } => source.is_shape(),
            _ => false,
        }
    }
}

/// Decides what an error means for a real-time connection loop: socket and internal errors end
/// the connection, a bad frame is only logged.
#[macro_export]
macro_rules! handle_result {
    ($r:ident) => {{
        match $r {
            Err($crate::common::Error::Ws) => {
                log::warn!("Encountered ws stream error in event loop, terminating");
                return;
            }
            Err($crate::common::Error::Internal(i)) => {
                log::warn!("Encountered internal error in event loop: {i}, terminating");
                return;
            }
            Err($crate::common::Error::Json(e)) => {
                log::warn!("Malformed frame ignored: {e}");
            }
            Err(e) => {
                log::warn!("Event loop: {e}");
            }
            Ok(_) => {}
        }
    }};
}
