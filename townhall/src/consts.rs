pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_WS_PORT: u16 = 3001;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_PUBLIC_DIR: &str = "public";

pub const SUBSCRIBER_QUEUE: usize = 64;
pub const SYNC_QUEUE: usize = 64;

pub const PUSH_ATTEMPTS: u32 = 3;
pub const PUSH_BACKOFF_MS: u64 = 500;
pub const PUSH_TIMEOUT_SECS: u64 = 30;

pub const PORT_ENV: &str = "PORT";
pub const WS_PORT_ENV: &str = "TOWNHALL_WS_PORT";
