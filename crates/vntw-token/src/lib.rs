//! # VNTW Token - Ledger, Vesting & Dev Pool
//!
//! Deterministic core of the Value Network token distribution system.
//!
//! ## Components
//!
//! | Component | Owns | Depends on |
//! |-----------|------|------------|
//! | [`Ledger`] | balances, total supply, burn rate | - |
//! | [`Vesting`] | per-beneficiary cliff + linear schedules | Ledger |
//! | [`DevPool`] | signer set, M-of-N proposals | Vesting, Ledger |
//!
//! ```text
//!  propose ─► approve* ─► execute_if_ready
//!                              │  (flag set first)
//!                              ▼
//!                      Vesting::release_capped
//!                              │  (released bumped first)
//!                              ▼
//!                       Ledger::transfer ─► burn = amount * bps / 10_000
//! ```
//!
//! The components are plain owned state mutated through `&mut self`.
//! [`TokenSystem`] wraps all three behind one lock so that every mutation is
//! applied atomically and in a single total order, and records an audit
//! [`Event`] for each one.
//!
//! Time never comes from a clock inside this crate: every time-sensitive
//! call takes `now` explicitly.

pub mod devpool;
pub mod events;
pub mod ledger;
pub mod system;
pub mod vesting;

// Re-exports
pub use devpool::{DevPool, Execution, Proposal, ProposalStatus};
pub use events::{Event, EventKind, Journal};
pub use ledger::{Ledger, TransferReceipt};
pub use system::{DeployParams, Deployment, SystemState, TokenSystem};
pub use vesting::{Release, Vesting, VestingSchedule};

/// VNTW token constants
pub mod constants {
    /// Default token name
    pub const NAME: &str = "Value Network";

    /// Default token symbol
    pub const SYMBOL: &str = "VNTW";

    /// Decimal places
    pub const DECIMALS: u8 = 18;

    /// One VNTW in smallest unit
    pub const ONE_VNTW: u128 = 1_000_000_000_000_000_000; // 10^18

    /// Default approval threshold for the dev pool
    pub const DEFAULT_THRESHOLD: usize = 2;

    /// Deployment nonces used to derive component addresses
    pub const TOKEN_NONCE: u64 = 0;
    pub const VESTING_NONCE: u64 = 1;
    pub const DEV_POOL_NONCE: u64 = 2;
}

pub use constants::*;
