// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8081;
pub const WS_PATH: &str = "ws";

// Per-connection outbound buffer; a client that falls this far behind is dropped
pub const DEFAULT_MESSAGE_BUFFER_SIZE: usize = 256;

// Matchmaking constants
pub const DEFAULT_MATCH_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_MATCH_BASE_RANGE: i32 = 50;
pub const DEFAULT_MATCH_WIDEN_RATE: f64 = 5.0;

// Rating constants
pub const K_FACTOR: f64 = 32.0;
pub const DEFAULT_RATING: i32 = 500;
pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;

// Account constraints
pub const MIN_USERNAME_LENGTH: usize = 5;
pub const MIN_PASSWORD_LENGTH: usize = 5;
pub const DEFAULT_TOKEN_TTL_HOURS: u64 = 24;
