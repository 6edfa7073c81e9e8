use crate::errors::{Result, VellumError};

pub const MAX_KEY_LEN: usize = 500;
pub const MAX_TITLE_LEN: usize = 500;

/// Validate a package or entity key.
///
/// Keys must be non-blank, at most [`MAX_KEY_LEN`] characters, and free of
/// control characters.
///
/// # Errors
///
/// Returns `VellumError::InvalidKey` describing the first rule broken.
pub fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(VellumError::InvalidKey {
            reason: "key cannot be empty or whitespace-only".to_string(),
        });
    }
    if key.chars().count() > MAX_KEY_LEN {
        return Err(VellumError::InvalidKey {
            reason: format!("key exceeds {} characters", MAX_KEY_LEN),
        });
    }
    if key.chars().any(char::is_control) {
        return Err(VellumError::InvalidKey {
            reason: "key cannot contain control characters".to_string(),
        });
    }
    Ok(())
}

/// Validate a title. Version titles may be empty; package titles may not.
///
/// # Errors
///
/// Returns `VellumError::InvalidTitle` describing the first rule broken.
pub fn validate_title(title: &str, allow_empty: bool) -> Result<()> {
    if !allow_empty && title.trim().is_empty() {
        return Err(VellumError::InvalidTitle {
            reason: "title cannot be empty or whitespace-only".to_string(),
        });
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(VellumError::InvalidTitle {
            reason: format!("title exceeds {} characters", MAX_TITLE_LEN),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_rules() {
        assert!(validate_key("unit-1").is_ok());
        assert!(validate_key("xblock.v1:problem:abc").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("   ").is_err());
        assert!(validate_key("a\nb").is_err());
        assert!(validate_key(&"k".repeat(MAX_KEY_LEN)).is_ok());
        assert!(validate_key(&"k".repeat(MAX_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn test_title_rules() {
        assert!(validate_title("", true).is_ok());
        assert!(validate_title("", false).is_err());
        assert!(validate_title("Intro", false).is_ok());
        assert!(validate_title(&"t".repeat(MAX_TITLE_LEN + 1), true).is_err());
    }
}
