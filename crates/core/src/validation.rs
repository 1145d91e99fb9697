//! Job name validation, shared by the client pre-check and the server.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Minimum trimmed name length, in characters.
pub const MIN_NAME_LENGTH: usize = 3;

/// Maximum trimmed name length, in characters.
pub const MAX_NAME_LENGTH: usize = 100;

/// Letters, digits, whitespace, `-`, `_`, `.`.
const NAME_PATTERN: &str = r"^[a-zA-Z0-9\s\-_.]+$";

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NAME_PATTERN).expect("valid regex"));

/// Validate a job name and return it trimmed.
pub fn validate_job_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(CoreError::Validation("Job name is required".into()));
    }

    let len = trimmed.chars().count();
    if len < MIN_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Job name must be at least {MIN_NAME_LENGTH} characters"
        )));
    }
    if len > MAX_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Job name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }

    if !NAME_RE.is_match(trimmed) {
        return Err(CoreError::Validation(
            "Job name contains invalid characters".into(),
        ));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_name_is_trimmed() {
        assert_eq!(validate_job_name("  Nightly Backup  ").unwrap(), "Nightly Backup");
    }

    #[test]
    fn allowed_punctuation() {
        assert!(validate_job_name("etl-v2_final.run").is_ok());
    }

    #[test]
    fn empty_and_whitespace_only_rejected() {
        assert_eq!(
            validate_job_name("   "),
            Err(CoreError::Validation("Job name is required".into()))
        );
        assert!(validate_job_name("").is_err());
    }

    #[test]
    fn too_short_after_trim() {
        let err = validate_job_name("  ab ").unwrap_err();
        assert!(err.to_string().contains("at least 3"));
    }

    #[test]
    fn length_boundaries() {
        assert!(validate_job_name(&"a".repeat(MIN_NAME_LENGTH)).is_ok());
        assert!(validate_job_name(&"a".repeat(MAX_NAME_LENGTH)).is_ok());
        assert!(validate_job_name(&"a".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn invalid_characters_rejected() {
        for name in ["drop; table", "job<script>", "über job", "a/b/c"] {
            assert_eq!(
                validate_job_name(name),
                Err(CoreError::Validation(
                    "Job name contains invalid characters".into()
                )),
                "{name}"
            );
        }
    }
}
