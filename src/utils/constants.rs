//! Shared constants and invariants

pub const DEFAULT_GRACE_SECONDS: u64 = 60;
pub const DEFAULT_SESSION_DURATION_MINUTES: u64 = 480;
pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;

// Retry schedule: 3 attempts, 1s / 2s / 4s between them
pub const DEFAULT_REFRESH_ATTEMPTS: u32 = 3;
pub const DEFAULT_REFRESH_DELAYS_MS: [u64; 3] = [1000, 2000, 4000];

// Cookies
pub const SESSION_COOKIE_NAME: &str = "stytch_session";
pub const SESSION_JWT_COOKIE_NAME: &str = "stytch_session_jwt";

// Routes
pub const LOGIN_PATH: &str = "/auth";
pub const SESSION_REFRESH_PATH: &str = "/api/auth/session/refresh";
pub const LOGOUT_PATH: &str = "/api/auth/logout";
