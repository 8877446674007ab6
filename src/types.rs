//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: UUID-based unique connection identifier
//! - `Username`: validated display name (3-16 characters, no spaces)

use std::borrow::Borrow;

use uuid::Uuid;

use crate::error::AppError;

/// Fewest characters allowed in a username
pub const MIN_NAME_LEN: usize = 3;

/// Most characters allowed in a username
pub const MAX_NAME_LEN: usize = 16;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4 for type-safe connection identification.
/// Implements Hash and Eq for use as map keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A display name that satisfies the naming rules
///
/// Only constructed through [`Username::parse`], so every registered
/// name is known to be valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Validate a candidate name
    pub fn parse(name: impl Into<String>) -> Result<Self, AppError> {
        let name = name.into();
        if Self::is_valid(&name) {
            Ok(Self(name))
        } else {
            Err(AppError::NameInvalid(name))
        }
    }

    /// Check the length and space rules without allocating
    pub fn is_valid(name: &str) -> bool {
        let len = name.chars().count();
        (MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) && !name.contains(' ')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Username {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
