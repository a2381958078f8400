//! Command-line errors

use thiserror::Error;

/// Errors detected before the session is involved.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("no password: set LESSON_PASSWORD or pipe it on stdin")]
    MissingPassword,
}
