//! Error types for the token distribution core

use crate::types::{Address, Amount, ProposalId};
use thiserror::Error;

/// Result type alias for distribution operations
pub type Result<T> = std::result::Result<T, DistributionError>;

/// Errors returned by the ledger, vesting and dev pool components
///
/// Every mutating operation validates its preconditions first and returns
/// one of these without touching state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributionError {
    // === Authorization ===
    /// Caller lacks the capability required for the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(Address),

    // === Validation ===
    /// Argument outside its permitted domain
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Account balance cannot cover the debit
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Amount, required: Amount },

    /// Checked arithmetic overflowed
    #[error("Arithmetic overflow")]
    Overflow,

    // === Vesting ===
    /// Beneficiary already has a vesting schedule
    #[error("Duplicate schedule for beneficiary: {0}")]
    DuplicateSchedule(Address),

    /// No vesting schedule exists for the beneficiary
    #[error("Unknown beneficiary: {0}")]
    UnknownBeneficiary(Address),

    /// Vested amount equals the amount already released
    #[error("Nothing to release for beneficiary: {0}")]
    NothingToRelease(Address),

    // === Dev pool ===
    /// Proposal id was never assigned
    #[error("Unknown proposal: {0}")]
    UnknownProposal(ProposalId),

    /// Signer already recorded on the proposal
    #[error("Signer {signer} already approved proposal {proposal}")]
    AlreadyApproved { proposal: ProposalId, signer: Address },

    /// Proposal was executed and is terminal
    #[error("Proposal already executed: {0}")]
    AlreadyExecuted(ProposalId),

    /// Proposal was revoked and is terminal
    #[error("Proposal revoked: {0}")]
    Revoked(ProposalId),

    /// Not enough approvals to execute yet
    #[error("Threshold not met: need {required}, have {approvals}")]
    ThresholdNotMet { required: usize, approvals: usize },

    // === Persistence ===
    /// Restored state violates an invariant
    #[error("Corrupted state: {0}")]
    Corrupted(String),
}

impl DistributionError {
    /// Stable numeric code for logs and CLI exit reporting
    pub fn code(&self) -> u32 {
        match self {
            Self::Unauthorized(_) => 1001,
            Self::InvalidParameter(_) => 1002,
            Self::InsufficientBalance { .. } => 1003,
            Self::Overflow => 1004,
            Self::DuplicateSchedule(_) => 2001,
            Self::UnknownBeneficiary(_) => 2002,
            Self::NothingToRelease(_) => 2003,
            Self::UnknownProposal(_) => 3001,
            Self::AlreadyApproved { .. } => 3002,
            Self::AlreadyExecuted(_) => 3003,
            Self::Revoked(_) => 3004,
            Self::ThresholdNotMet { .. } => 3005,
            Self::Corrupted(_) => 9001,
        }
    }

    /// Whether the same call may succeed later without any change of
    /// parameters (more approvals, more elapsed time)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ThresholdNotMet { .. } | Self::NothingToRelease(_)
        )
    }

    /// Shorthand for `InvalidParameter`
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
