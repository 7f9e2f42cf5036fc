//! Common validation rules shared across request payloads.

use validator::ValidationError;

/// Validates roll number format.
///
/// Requirements:
/// - 1-32 characters after trimming
/// - ASCII alphanumerics, `-` and `/` only
pub fn validate_roll_number(roll_number: &str) -> Result<(), ValidationError> {
    let trimmed = roll_number.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    if trimmed.len() > 32 {
        return Err(ValidationError::new("roll_number_invalid_length"));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '/')
    {
        return Err(ValidationError::new("roll_number_invalid_characters"));
    }
    Ok(())
}

/// Rejects titles and names made only of whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}
