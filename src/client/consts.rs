pub const DEFAULT_HOST: &str = "localhost:8000";
pub const DEFAULT_WS_PATH: &str = "/ws/conversation";
pub const DEFAULT_CAPACITY: usize = 256;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

pub const SECTION_COMPLETE_TTL_MS: u64 = 3_000;
pub const ERROR_TTL_MS: u64 = 5_000;

/// Shown when the channel fails; transport details only go to the log.
pub const CONNECTION_ERROR_MESSAGE: &str = "Connection error";
pub const MICROPHONE_ERROR_MESSAGE: &str = "Microphone access denied";
