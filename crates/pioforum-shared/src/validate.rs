//! Input normalisation for channel names and message text.
//!
//! Both inputs are trimmed before storage; the trimmed form is what gets
//! compared, persisted and shown.

use crate::constants::{MAX_CHANNEL_NAME_LEN, MAX_MESSAGE_LEN};
use crate::error::ValidationError;

/// Trim a channel name and reject blank or oversized input.
pub fn channel_name(raw: &str) -> Result<String, ValidationError> {
    non_blank(raw, "Channel name", MAX_CHANNEL_NAME_LEN)
}

/// Trim message text and reject blank or oversized input.
pub fn message_text(raw: &str) -> Result<String, ValidationError> {
    non_blank(raw, "Message", MAX_MESSAGE_LEN)
}

/// Case-insensitive channel name equality.
pub fn same_channel_name(a: &str, b: &str) -> bool {
    name_key(a) == name_key(b)
}

/// Key under which channel names are compared.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn non_blank(raw: &str, field: &'static str, max: usize) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    let len = trimmed.chars().count();
    if len > max {
        return Err(ValidationError::TooLong { field, len, max });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_trimmed() {
        assert_eq!(channel_name("  random  ").unwrap(), "random");
    }

    #[test]
    fn test_blank_rejected() {
        assert_eq!(channel_name(" \t\n"), Err(ValidationError::Empty("Channel name")));
        assert_eq!(message_text(""), Err(ValidationError::Empty("Message")));
    }

    #[test]
    fn test_too_long() {
        let long = "x".repeat(MAX_CHANNEL_NAME_LEN + 1);
        assert!(matches!(
            channel_name(&long),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_same_channel_name() {
        assert!(same_channel_name("General", "general "));
        assert!(same_channel_name("ÉTUDES", "études"));
        assert!(!same_channel_name("General", "Generals"));
    }
}
