pub mod date_time;
pub mod kind;
pub mod record;
pub mod record_id;

pub use kind::{Kind, UnknownKind};
pub use record::{Fields, Record, RecordKey};
pub use record_id::RecordId;
