//! Validation utilities.

use regex::Regex;

use crate::types::{ChatError, ChatResult};

const CHANNEL_USERNAME_PATTERN: &str = r"^[a-zA-Z][a-zA-Z0-9_]{3,31}$";
const MAX_TITLE_CHARS: usize = 255;
const MAX_DESCRIPTION_CHARS: usize = 2048;

/// Validation utilities
pub struct Validator;

impl Validator {
    /// Trim a required field, rejecting empty values
    pub fn required(field: &str, value: &str) -> ChatResult<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ChatError::validation(format!("{field} cannot be empty")));
        }
        Ok(trimmed.to_string())
    }

    /// Validate chat title
    pub fn chat_title(title: &str) -> ChatResult<String> {
        let title = Self::required("title", title)?;
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(ChatError::validation(format!(
                "title too long (max {MAX_TITLE_CHARS} characters)"
            )));
        }
        Ok(title)
    }

    /// Validate chat description
    pub fn description(description: &str) -> ChatResult<String> {
        let description = Self::required("description", description)?;
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(ChatError::validation(format!(
                "description too long (max {MAX_DESCRIPTION_CHARS} characters)"
            )));
        }
        Ok(description)
    }

    /// Validate a public channel handle
    pub fn channel_username(username: &str) -> ChatResult<String> {
        let username = Self::required("username", username)?;
        let pattern = Regex::new(CHANNEL_USERNAME_PATTERN)
            .map_err(|e| ChatError::validation(format!("failed to compile username pattern: {e}")))?;

        if !pattern.is_match(&username) {
            return Err(ChatError::validation(
                "username must start with a letter and contain 4-32 letters, digits or underscores",
            ));
        }
        Ok(username)
    }
}
