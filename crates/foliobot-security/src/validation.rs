use foliobot_common::{Error, Result};
use subtle::ConstantTimeEq;
use tracing::warn;

const MAX_SESSION_ID_LEN: usize = 128;

/// Input validation and sanitization for chat messages.
pub struct InputValidator;

impl InputValidator {
    /// Check for potential prompt injection patterns.
    pub fn check_prompt_injection(input: &str) -> bool {
        let patterns = [
            "ignore previous instructions",
            "ignore all previous",
            "disregard your instructions",
            "you are now",
            "new instructions:",
            "system prompt:",
        ];

        let lower = input.to_lowercase();
        patterns.iter().any(|p| lower.contains(p))
    }

    /// Sanitize user input by removing control characters.
    pub fn sanitize(input: &str) -> String {
        input
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect()
    }

    /// Sanitize and trim a chat message, requiring 1..=`max_len` characters.
    pub fn validate_message(input: &str, max_len: usize) -> Result<String> {
        let cleaned = Self::sanitize(input).trim().to_string();
        let len = cleaned.chars().count();

        if len == 0 {
            return Err(Error::Validation("message cannot be empty".into()));
        }
        if len > max_len {
            return Err(Error::Validation(format!(
                "message too long: {len} characters (max {max_len})"
            )));
        }
        if Self::check_prompt_injection(&cleaned) {
            // Logged, not rejected.
            warn!("possible prompt injection in chat message");
        }
        Ok(cleaned)
    }

    /// Validate that a client-supplied session identifier is well-formed.
    pub fn validate_session_id(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::Validation("session ID cannot be empty".into()));
        }
        if id.len() > MAX_SESSION_ID_LEN {
            return Err(Error::Validation("session ID too long".into()));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::Validation(
                "session ID contains invalid characters".into(),
            ));
        }
        Ok(())
    }

    /// Constant-time comparison of a presented API key against the configured one.
    pub fn verify_api_key(expected: &str, provided: &str) -> bool {
        expected.as_bytes().ct_eq(provided.as_bytes()).into()
    }
}
