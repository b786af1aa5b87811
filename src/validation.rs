use crate::participant::Status;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("content is empty")]
    Empty,
    #[error("content exceeds maximum length of {0}")]
    TooLong(usize),
}

const MAX_MESSAGE_LEN: usize = 2000;
const MAX_WELCOME_MESSAGE_LEN: usize = 500;

/// Validates chat message content. Mirrors the out-of-scope
/// `utils.ValidateContent` collaborator — only its contract (length/charset
/// bounds) is specified, so this implementation enforces a conservative
/// length bound and rejects empty content.
pub fn validate_content(content: &str) -> Result<(), ValidationError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(ValidationError::TooLong(MAX_MESSAGE_LEN));
    }
    Ok(())
}

pub fn validate_welcome_message(content: &str) -> Result<(), ValidationError> {
    if content.chars().count() > MAX_WELCOME_MESSAGE_LEN {
        return Err(ValidationError::TooLong(MAX_WELCOME_MESSAGE_LEN));
    }
    Ok(())
}

/// Status is a closed enum already validated by deserialization; this stub
/// exists so callers have one symmetrical entry point across the three
/// validator kinds named in the collaborator contract.
pub fn validate_status(_status: &Status) -> Result<(), ValidationError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_content_rejects_empty() {
        assert_eq!(validate_content("   "), Err(ValidationError::Empty));
    }

    #[test]
    fn test_validate_content_rejects_too_long() {
        let long = "a".repeat(MAX_MESSAGE_LEN + 1);
        assert_eq!(
            validate_content(&long),
            Err(ValidationError::TooLong(MAX_MESSAGE_LEN))
        );
    }

    #[test]
    fn test_validate_content_accepts_normal_message() {
        assert!(validate_content("hello world").is_ok());
    }

    #[test]
    fn test_validate_welcome_message_rejects_too_long() {
        let long = "a".repeat(MAX_WELCOME_MESSAGE_LEN + 1);
        assert!(validate_welcome_message(&long).is_err());
    }
}
