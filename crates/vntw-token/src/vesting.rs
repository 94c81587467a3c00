//! # Vesting
//!
//! Per-beneficiary release schedules with a cliff and linear vesting.
//!
//! ```text
//! |----cliff----|--------linear vesting--------|
//! ^             ^                              ^
//! start         start + cliff                  start + duration
//! ```
//!
//! - Before `start + cliff`: nothing vested
//! - From the cliff on: `floor(total * (now - start) / duration)`
//! - From `start + duration` on: `total`
//!
//! Tokens are held in the ledger under the vesting account. A release bumps
//! the schedule's `released` counter before asking the ledger to transfer;
//! a failed transfer restores the counter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use vntw_core::{Address, Amount, DistributionError, Result, Timestamp};

use crate::ledger::{Ledger, TransferReceipt};

/// Release schedule of a single beneficiary
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingSchedule {
    pub beneficiary: Address,

    /// Fixed at creation
    pub total_allocated: Amount,

    pub start: Timestamp,

    /// Offset from `start` before which nothing vests
    pub cliff: Timestamp,

    /// Offset from `start` at which everything has vested
    pub duration: Timestamp,

    /// Cumulative amount handed to the ledger for transfer
    pub released: Amount,
}

impl VestingSchedule {
    /// Amount vested at `now`
    pub fn vested_at(&self, now: Timestamp) -> Amount {
        if now < self.cliff_end() {
            return 0;
        }
        if now >= self.end() {
            return self.total_allocated;
        }
        mul_div_floor(self.total_allocated, now - self.start, self.duration)
    }

    /// Vested but not yet released at `now`
    pub fn releasable_at(&self, now: Timestamp) -> Amount {
        self.vested_at(now).saturating_sub(self.released)
    }

    /// Allocation still owed to the beneficiary
    pub fn remaining(&self) -> Amount {
        self.total_allocated - self.released
    }

    pub fn is_fully_released(&self) -> bool {
        self.released == self.total_allocated
    }

    pub fn cliff_end(&self) -> Timestamp {
        self.start.saturating_add(self.cliff)
    }

    pub fn end(&self) -> Timestamp {
        self.start.saturating_add(self.duration)
    }
}

/// floor(value * numerator / denominator) for `numerator < denominator`
/// without a 256-bit intermediate.
///
/// value = q * d + r  =>  value * n / d = q * n + floor(r * n / d),
/// and r * n < d * d <= 2^128.
fn mul_div_floor(value: Amount, numerator: u64, denominator: u64) -> Amount {
    debug_assert!(numerator < denominator);
    let d = denominator as Amount;
    let n = numerator as Amount;
    let q = value / d;
    let r = value % d;
    q * n + r * n / d
}

/// Outcome of a successful release
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub beneficiary: Address,
    /// Ledger receipt for the transfer out of the vesting account
    pub receipt: TransferReceipt,
    /// Schedule's cumulative `released` after this release
    pub released_total: Amount,
}

impl Release {
    /// Gross amount released from the schedule
    pub fn amount(&self) -> Amount {
        self.receipt.amount
    }
}

/// Vesting contract state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vesting {
    /// Ledger account holding the vesting reserve
    account: Address,

    /// Identity allowed to create schedules
    owner: Address,

    schedules: BTreeMap<Address, VestingSchedule>,

    /// Sum of `total_allocated - released` across all schedules
    total_committed: Amount,
}

impl Vesting {
    pub fn new(account: Address, owner: Address) -> Self {
        Self {
            account,
            owner,
            schedules: BTreeMap::new(),
            total_committed: 0,
        }
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn total_committed(&self) -> Amount {
        self.total_committed
    }

    pub fn schedule(&self, beneficiary: &Address) -> Option<&VestingSchedule> {
        self.schedules.get(beneficiary)
    }

    pub fn schedules(&self) -> impl Iterator<Item = &VestingSchedule> {
        self.schedules.values()
    }

    /// Register a schedule for `beneficiary`
    ///
    /// The vesting account must already hold enough tokens to cover every
    /// outstanding allocation plus `amount`.
    #[allow(clippy::too_many_arguments)]
    pub fn create_schedule(
        &mut self,
        caller: Address,
        ledger: &Ledger,
        beneficiary: Address,
        amount: Amount,
        start: Timestamp,
        cliff: Timestamp,
        duration: Timestamp,
    ) -> Result<&VestingSchedule> {
        if caller != self.owner {
            warn!(caller = %caller, "Rejected schedule creation from non-owner");
            return Err(DistributionError::Unauthorized(caller));
        }
        if self.schedules.contains_key(&beneficiary) {
            return Err(DistributionError::DuplicateSchedule(beneficiary));
        }
        if amount == 0 {
            return Err(DistributionError::invalid("allocation must be nonzero"));
        }
        if duration == 0 {
            return Err(DistributionError::invalid("duration must be nonzero"));
        }
        if cliff > duration {
            return Err(DistributionError::InvalidParameter(format!(
                "cliff {} exceeds duration {}",
                cliff, duration
            )));
        }
        if beneficiary == self.account {
            return Err(DistributionError::invalid("vesting account cannot be a beneficiary"));
        }

        let required = self
            .total_committed
            .checked_add(amount)
            .ok_or(DistributionError::Overflow)?;
        let available = ledger.balance_of(&self.account);
        if available < required {
            return Err(DistributionError::InsufficientBalance { available, required });
        }

        self.total_committed = required;
        let schedule = self.schedules.entry(beneficiary).or_insert(VestingSchedule {
            beneficiary,
            total_allocated: amount,
            start,
            cliff,
            duration,
            released: 0,
        });

        info!(
            beneficiary = %beneficiary,
            amount,
            start,
            cliff,
            duration,
            "Vesting schedule created"
        );
        Ok(schedule)
    }

    /// Amount vested for `beneficiary` at `now`
    pub fn vested_amount(&self, beneficiary: &Address, now: Timestamp) -> Result<Amount> {
        let schedule = self
            .schedules
            .get(beneficiary)
            .ok_or(DistributionError::UnknownBeneficiary(*beneficiary))?;
        let vested = schedule.vested_at(now);
        debug!(beneficiary = %beneficiary, now, vested, "Vested amount computed");
        Ok(vested)
    }

    /// Vested but unreleased amount for `beneficiary` at `now`
    pub fn releasable_amount(&self, beneficiary: &Address, now: Timestamp) -> Result<Amount> {
        self.schedules
            .get(beneficiary)
            .map(|s| s.releasable_at(now))
            .ok_or(DistributionError::UnknownBeneficiary(*beneficiary))
    }

    /// Transfer everything vested and unreleased to `beneficiary`
    pub fn release(&mut self, ledger: &mut Ledger, beneficiary: Address, now: Timestamp) -> Result<Release> {
        self.release_inner(ledger, beneficiary, None, now)
    }

    /// Like [`Vesting::release`], but transfer at most `cap`
    pub fn release_capped(
        &mut self,
        ledger: &mut Ledger,
        beneficiary: Address,
        cap: Amount,
        now: Timestamp,
    ) -> Result<Release> {
        if cap == 0 {
            return Err(DistributionError::invalid("release cap must be nonzero"));
        }
        self.release_inner(ledger, beneficiary, Some(cap), now)
    }

    fn release_inner(
        &mut self,
        ledger: &mut Ledger,
        beneficiary: Address,
        cap: Option<Amount>,
        now: Timestamp,
    ) -> Result<Release> {
        let account = self.account;
        let schedule = self
            .schedules
            .get_mut(&beneficiary)
            .ok_or(DistributionError::UnknownBeneficiary(beneficiary))?;

        let releasable = schedule.releasable_at(now);
        let amount = cap.map_or(releasable, |cap| releasable.min(cap));
        if amount == 0 {
            return Err(DistributionError::NothingToRelease(beneficiary));
        }

        // Account for the release before the ledger sees it
        schedule.released += amount;
        self.total_committed -= amount;

        match ledger.transfer(account, beneficiary, amount) {
            Ok(receipt) => {
                info!(
                    beneficiary = %beneficiary,
                    amount,
                    burned = receipt.burned,
                    released_total = schedule.released,
                    "Vested tokens released"
                );
                Ok(Release {
                    beneficiary,
                    receipt,
                    released_total: schedule.released,
                })
            }
            Err(err) => {
                schedule.released -= amount;
                self.total_committed += amount;
                warn!(beneficiary = %beneficiary, amount, error = %err, "Release rolled back");
                Err(err)
            }
        }
    }

    /// Check the bookkeeping of a deserialized vesting state
    pub fn validate(&self) -> Result<()> {
        let mut committed: Amount = 0;
        for (key, schedule) in &self.schedules {
            if *key != schedule.beneficiary {
                return Err(DistributionError::Corrupted(format!(
                    "schedule keyed by {} belongs to {}",
                    key, schedule.beneficiary
                )));
            }
            if schedule.duration == 0
                || schedule.cliff > schedule.duration
                || schedule.total_allocated == 0
                || schedule.released > schedule.total_allocated
            {
                return Err(DistributionError::Corrupted(format!(
                    "invalid schedule for {}",
                    schedule.beneficiary
                )));
            }
            committed = committed
                .checked_add(schedule.remaining())
                .ok_or_else(|| DistributionError::Corrupted("commitment overflows".into()))?;
        }

        if committed != self.total_committed {
            return Err(DistributionError::Corrupted(format!(
                "schedules commit {} but total_committed is {}",
                committed, self.total_committed
            )));
        }
        Ok(())
    }
}
