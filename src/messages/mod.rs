pub mod repository;

use crate::error::{AppError, AppResult};

pub const MAX_CONTENT_CHARS: usize = 500;

/// Trim and length-check message content.
pub fn validate_content(raw: &str) -> AppResult<&str> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Message content is empty".into()));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::Validation(
            "Message content exceeds 500 characters".into(),
        ));
    }
    Ok(content)
}
