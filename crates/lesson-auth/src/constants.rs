//! API paths and token store keys
//!
//! Paths are relative to the configured API base URL and may be overridden
//! through the client configuration.

/// Password login, returns a token pair
pub const LOGIN_PATH: &str = "/api/users/auth/login";

/// Refresh token exchange, returns a new token pair
pub const REFRESH_PATH: &str = "/api/users/auth/refresh";

/// Refresh token revocation
pub const LOGOUT_PATH: &str = "/api/users/auth/logout";

/// Profile of the user owning the access token
pub const ME_PATH: &str = "/api/users/auth/me";

/// Token store key for the current access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Token store key for the current refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Token store key for the cached user profile (JSON)
pub const USER_KEY: &str = "user";

/// Every key the session writes; cleared together on logout.
pub const SESSION_KEYS: &[&str] = &[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];
