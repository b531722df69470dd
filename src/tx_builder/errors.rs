//! Error types for mint transaction construction
//!
//! Every variant is raised before any asset signer is generated, so a
//! construction error never leaves partial drafts behind.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionBuilderError {
    /// Failed to build an instruction for a specific program
    #[error("Instruction build error (program={program}): {reason}")]
    InstructionBuild {
        /// The program the instruction targets
        program: String,
        reason: String,
    },

    /// Requested quantity is zero or above the known allowance
    #[error("Invalid quantity {requested} (allowed: 1..={max})")]
    InvalidQuantity { requested: u64, max: u64 },

    /// The group enables a guard whose accounts this client cannot supply
    #[error("Guard '{guard}' in group '{label}' is not supported by this client")]
    UnsupportedGuard { label: String, guard: String },

    /// Blockhash could not be fetched or is already stale
    #[error("Blockhash error: {0}")]
    Blockhash(String),

    /// Message failed to compile (account limits, lookup table mismatch)
    #[error("Message compile error: {0}")]
    Compile(String),

    /// Compute budget instructions are not ahead of the mint instruction
    #[error("Invalid instruction order: {0}")]
    InvalidInstructionOrder(String),

    /// Missing or unresolvable group, missing accounts
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransactionBuilderError {
    /// Check if rebuilding with fresh network state might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Blockhash(_) => true,

            Self::InstructionBuild { .. } => false,
            Self::InvalidQuantity { .. } => false,
            Self::UnsupportedGuard { .. } => false,
            Self::Compile(_) => false,
            Self::InvalidInstructionOrder(_) => false,
            Self::Configuration(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::InstructionBuild { .. } => "instruction",
            Self::InvalidQuantity { .. } => "quantity",
            Self::UnsupportedGuard { .. } => "unsupported_guard",
            Self::Blockhash(_) => "blockhash",
            Self::Compile(_) => "compile",
            Self::InvalidInstructionOrder(_) => "validation",
            Self::Configuration(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

// Convenience constructors
impl TransactionBuilderError {
    pub fn instruction_failed(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InstructionBuild {
            program: program.into(),
            reason: reason.into(),
        }
    }

    pub fn blockhash_unavailable(reason: impl Into<String>) -> Self {
        Self::Blockhash(reason.into())
    }

    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }

    pub fn unknown_group(label: &str) -> Self {
        Self::Configuration(format!("no guard group labelled '{label}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransactionBuilderError::InstructionBuild {
            program: "candy_guard".to_string(),
            reason: "missing payment destination".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Instruction build error (program=candy_guard): missing payment destination"
        );

        let err = TransactionBuilderError::InvalidQuantity {
            requested: 0,
            max: 3,
        };
        assert_eq!(err.to_string(), "Invalid quantity 0 (allowed: 1..=3)");
    }

    #[test]
    fn test_error_retryability() {
        assert!(TransactionBuilderError::Blockhash("stale".to_string()).is_retryable());
        assert!(!TransactionBuilderError::unknown_group("VIP").is_retryable());
        assert!(!TransactionBuilderError::InvalidQuantity {
            requested: 4,
            max: 1
        }
        .is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            TransactionBuilderError::Compile("too many accounts".to_string()).category(),
            "compile"
        );
        assert_eq!(
            TransactionBuilderError::invalid_order("x").category(),
            "validation"
        );
    }
}
