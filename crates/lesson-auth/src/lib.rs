//! Lesson platform authentication protocol
//!
//! Wire types and calls for the login, refresh and logout endpoints, plus the
//! token store the session manager persists credentials in. This crate has no
//! notion of concurrency control: it performs single calls and leaves
//! serialization of refresh attempts to the `session` crate.
//!
//! Credential flow:
//! 1. `token::login()` exchanges email/password for a `TokenPair`
//! 2. The pair is written to a `TokenStore` under `ACCESS_TOKEN_KEY` / `REFRESH_TOKEN_KEY`
//! 3. On a 401, `token::refresh_tokens()` exchanges the refresh token for a new pair
//! 4. `token::revoke()` tells the API to revoke the refresh token at logout

pub mod constants;
pub mod error;
pub mod profile;
pub mod store;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use profile::UserProfile;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{LoginRequest, RefreshRequest, TokenPair, login, refresh_tokens, revoke};
