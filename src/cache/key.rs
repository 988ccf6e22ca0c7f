//! Key Validation
//!
//! Every backend checks caller-supplied keys before touching its medium.

use crate::cache::RESERVED_KEY_CHARACTERS;
use crate::error::{CacheError, Result};

/// Rejects empty keys and keys containing a reserved character.
///
/// The error names the first offending character and the full key.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey {
            key: String::new(),
            character: None,
        });
    }

    if let Some(character) = key.chars().find(|c| RESERVED_KEY_CHARACTERS.contains(c)) {
        return Err(CacheError::InvalidKey {
            key: key.to_string(),
            character: Some(character),
        });
    }

    Ok(())
}
