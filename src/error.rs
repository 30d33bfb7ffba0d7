use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("{field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{operation} failed: {details}")]
    Collaborator { operation: String, details: String },

    #[error("dropped stale result for epoch {epoch} (current epoch {current})")]
    StaleResult { epoch: u64, current: u64 },

    #[error("cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn collaborator(operation: impl Into<String>, error: &anyhow::Error) -> Self {
        Self::Collaborator {
            operation: operation.into(),
            details: compact_error(error),
        }
    }
}

/// Flattens an error chain into at most three lines.
pub fn compact_error(error: &anyhow::Error) -> String {
    let mut out = Vec::new();
    for (index, cause) in error.chain().enumerate() {
        if index == 0 {
            out.push(cause.to_string());
        } else if index <= 2 {
            out.push(format!("caused by: {cause}"));
        } else {
            break;
        }
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{EngineError, compact_error};
    use anyhow::Context;

    #[test]
    fn compact_error_keeps_three_levels() {
        let error = Err::<(), _>(anyhow::anyhow!("root"))
            .context("middle")
            .context("upper")
            .context("top")
            .unwrap_err();

        let compact = compact_error(&error);
        assert_eq!(compact, "top\ncaused by: upper\ncaused by: middle");
    }

    #[test]
    fn collaborator_error_names_operation() {
        let error = anyhow::anyhow!("pods \"api\" not found");
        let engine = EngineError::collaborator("delete pod default/api", &error);
        assert_eq!(
            engine.to_string(),
            "delete pod default/api failed: pods \"api\" not found"
        );
    }

    #[test]
    fn validation_error_is_field_prefixed() {
        let error = EngineError::validation("name", "must not be empty");
        assert_eq!(error.to_string(), "name: must not be empty");
    }
}
