//! Application constants
//!
//! Centralized location for header names, endpoint paths, storage keys and
//! defaults shared by the request, auth and polling layers.

// Outbound headers
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_REQUEST_ID: &str = "X-Request-Id";
pub const HEADER_CLIENT_VERSION: &str = "X-Client-Version";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_LEGACY_USER_ID: &str = "X-User-Id";
pub const CONTENT_TYPE_JSON: &str = "application/json";

// Auth endpoints
pub const PATH_AUTH_LOGIN: &str = "/auth/login";
pub const PATH_AUTH_REFRESH: &str = "/auth/refresh";
pub const PATH_AUTH_USERINFO: &str = "/auth/userinfo";

// Job endpoints (task id is appended)
pub const PATH_TASK_STATUS: &str = "/status";
pub const PATH_TASK_RESULT: &str = "/result";

// Health endpoint used by the connectivity probe
pub const PATH_HEALTH: &str = "/health";

// Durable storage keys
pub const KEY_ACCESS_TOKEN: &str = "courier.auth.access_token";
pub const KEY_REFRESH_TOKEN: &str = "courier.auth.refresh_token";
pub const KEY_EXPIRES_AT: &str = "courier.auth.expires_at";
pub const KEY_USER_INFO: &str = "courier.auth.user_info";
pub const KEY_AUTH_MODE: &str = "courier.auth.mode";
pub const KEY_DEVICE_ID: &str = "courier.auth.device_id";
pub const KEY_CACHE_SNAPSHOT: &str = "courier.cache.snapshot";

/// Every key owned by the auth coordinator; cleared together on logout.
pub const AUTH_STATE_KEYS: [&str; 5] =
    [KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_EXPIRES_AT, KEY_USER_INFO, KEY_AUTH_MODE];

// Envelope
pub const ENVELOPE_SUCCESS_CODE: i64 = 0;
/// Business code reported when a job fails without its own code.
pub const TASK_FAILED_CODE: i64 = -1;

// Defaults
pub const DEFAULT_MAX_CONCURRENT: usize = 6;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_REFRESH_WINDOW_SECS: u64 = 300;
pub const DEFAULT_REFRESH_COOLDOWN_SECS: u64 = 10;
pub const DEFAULT_LOGIN_COOLDOWN_SECS: u64 = 5;
