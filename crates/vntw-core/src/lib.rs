//! # Value Network Core
//!
//! Shared vocabulary for the VNTW token distribution system.
//!
//! - [`Address`] - 32-byte account identifier (hex / BLAKE3-derived)
//! - [`Amount`], [`Timestamp`], [`ProposalId`] - integer aliases
//! - [`DistributionError`] - every failure kind the components can report
//!
//! ```text
//!   DevPool ──release──► Vesting ──transfer──► Ledger
//!   (M-of-N)             (cliff + linear)      (burn on transfer)
//! ```

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;

/// Basis point constants
pub mod bps {
    /// Denominator of a basis point fraction
    pub const DENOMINATOR: u32 = 10_000;

    /// Highest permitted burn rate (100%)
    pub const MAX: u32 = DENOMINATOR;
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{DistributionError, Result};
    pub use crate::types::*;
}
