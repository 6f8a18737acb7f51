use serde_json::Value;

use crate::{constants::USER_ERROR_PREFIX, error::Cep18Error};

/// Execution result of a processed transaction, in one of the two wire generations.
///
/// The generations disagree on how success is expressed, so the polarity is decided
/// once in [`ExecutionResult::is_success`] and nowhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// `{"Version1": {"Success": …}}` / `{"Version1": {"Failure": …}}`, also the flat
    /// `{"Success": …}` form of older deploy results. Success is the presence of the
    /// `Success` marker.
    Version1 {
        success: bool,
        error_message: Option<String>,
    },
    /// `{"Version2": {…, "error_message": null | "…"}}`. Success is the absence of an
    /// error message.
    Version2 { error_message: Option<String> },
}

impl ExecutionResult {
    pub fn from_json(value: &Value) -> Result<Self, Cep18Error> {
        if let Some(version2) = value.get("Version2") {
            return Ok(ExecutionResult::Version2 {
                error_message: message_field(version2),
            });
        }

        let version1 = match value.get("Version1") {
            Some(version1) => version1,
            None if has_marker(value, "Success") || has_marker(value, "Failure") => value,
            None => {
                return Err(Cep18Error::Schema(format!(
                    "neither Version1 nor Version2 in execution result: {}",
                    value
                )));
            }
        };

        let success = has_marker(version1, "Success");
        let error_message = if success {
            None
        } else {
            version1
                .get("Failure")
                .and_then(message_field)
                .or_else(|| message_field(version1))
        };

        Ok(ExecutionResult::Version1 {
            success,
            error_message,
        })
    }

    pub fn is_success(&self) -> bool {
        match self {
            ExecutionResult::Version1 { success, .. } => *success,
            ExecutionResult::Version2 { error_message } => error_message.is_none(),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ExecutionResult::Version1 { error_message, .. }
            | ExecutionResult::Version2 { error_message } => error_message.as_deref(),
        }
    }

    pub fn classify(&self) -> TransactionOutcome {
        if self.is_success() {
            return TransactionOutcome {
                success: true,
                error_code: None,
                raw_message: None,
            };
        }

        let raw_message = self.error_message().map(str::to_string);
        TransactionOutcome {
            success: false,
            error_code: raw_message.as_deref().and_then(parse_user_error),
            raw_message,
        }
    }
}

fn has_marker(value: &Value, marker: &str) -> bool {
    value.get(marker).is_some_and(|inner| !inner.is_null())
}

fn message_field(value: &Value) -> Option<String> {
    match value.get("error_message")? {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}

/// Extracts `<code>` from `User error: <code>`. Anything else is not a contract error.
pub fn parse_user_error(message: &str) -> Option<u32> {
    let code = message.strip_prefix(USER_ERROR_PREFIX)?.trim();
    if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    code.parse().ok()
}

/// Classified outcome of one completed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub success: bool,
    /// Present only for `User error: <code>` failures.
    pub error_code: Option<u32>,
    pub raw_message: Option<String>,
}

impl TransactionOutcome {
    /// Turns a failed outcome into the matching error kind.
    pub fn into_result(self) -> Result<TransactionOutcome, Cep18Error> {
        if self.success {
            return Ok(self);
        }
        if let Some(code) = self.error_code {
            return Err(Cep18Error::Contract { code });
        }
        Err(Cep18Error::Infra(
            self.raw_message
                .unwrap_or_else(|| "execution failed without an error message".to_string()),
        ))
    }
}

/// Result of waiting for a transaction under a caller-supplied time budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Completed(TransactionOutcome),
    TimedOut,
}
