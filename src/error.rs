use crate::types::EntityKind;

#[derive(thiserror::Error, Debug)]
pub enum ScfError {
    #[error("{kind} with ID {id} does not exist")]
    NotFound { kind: EntityKind, id: String },
    #[error("{kind} with ID {id} already exists")]
    AlreadyExists { kind: EntityKind, id: String },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Referenced {kind} with ID {id} does not exist")]
    InvalidReference { kind: EntityKind, id: String },
    #[error("Invalid transition on {id}: {reason}")]
    InvalidTransition { id: String, reason: String },
    #[error("Stored value under {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("Concurrent write to {key} lost the race, re-read and resubmit")]
    Conflict { key: String },
    #[error("Ledger storage failure: {0}")]
    Storage(String),
}

impl ScfError {
    /// Only a lost write race is worth resubmitting.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScfError::Conflict { .. })
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        ScfError::InvalidArgument(msg.into())
    }

    pub fn invalid_transition(id: &str, reason: impl Into<String>) -> Self {
        ScfError::InvalidTransition {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn corrupt(key: &str, reason: impl ToString) -> Self {
        ScfError::Corrupt {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<sled::Error> for ScfError {
    fn from(value: sled::Error) -> Self {
        ScfError::Storage(value.to_string())
    }
}

pub type ScfResult<T> = Result<T, ScfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflict_is_retryable() {
        let conflict = ScfError::Conflict {
            key: "proposal:D1".into(),
        };
        let missing = ScfError::NotFound {
            kind: EntityKind::Proposal,
            id: "D1".into(),
        };

        assert!(conflict.is_retryable());
        assert!(!missing.is_retryable());
        assert!(!ScfError::invalid_argument("amount").is_retryable());
    }

    #[test]
    fn messages_carry_the_offending_id() {
        let err = ScfError::InvalidReference {
            kind: EntityKind::Participant,
            id: "P9".into(),
        };
        assert_eq!(
            err.to_string(),
            "Referenced participant with ID P9 does not exist"
        );
    }
}
