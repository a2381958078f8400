//! Redacting wrapper for bearer and refresh tokens

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value - redacted in Debug/Display/logs, zeroed on drop
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Create a new secret value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize + PartialEq> Secret<T> {
    /// Compare against a plain value without exposing either side to logs.
    pub fn matches(&self, other: &T) -> bool {
        self.0 == *other
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_is_redacted_in_debug_and_display() {
        let token = Secret::new(String::from("eyJhbGciOiJIUzI1NiJ9.access"));
        assert_eq!(format!("{token:?}"), "[REDACTED]");
        assert_eq!(format!("{token}"), "[REDACTED]");
    }

    #[test]
    fn expose_returns_inner_token() {
        let token: Secret<String> = String::from("rt_123").into();
        assert_eq!(token.expose(), "rt_123");
    }

    #[test]
    fn matches_compares_inner_value() {
        let token = Secret::new(String::from("A1"));
        assert!(token.matches(&"A1".to_string()));
        assert!(!token.matches(&"A2".to_string()));
    }

    #[test]
    fn clone_is_independent() {
        let original = Secret::new(String::from("R1"));
        let copy = original.clone();
        drop(original);
        assert_eq!(copy.expose(), "R1");
    }
}
