//! Shared types for the lesson platform client crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
