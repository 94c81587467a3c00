//! # Ledger
//!
//! Account balances, total supply and the burn-on-transfer rule.
//!
//! The token is deflationary: every transfer destroys
//! `floor(amount * burn_rate_bps / 10_000)` units, so total supply shrinks
//! whenever the burn rate is nonzero. All arithmetic is integer.
//!
//! Invariants held after every operation:
//! - `sum(balances) == total_supply`
//! - `total_supply + total_burned == initial supply`
//! - `burn_rate_bps <= 10_000`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use vntw_core::{bps, Address, Amount, DistributionError, Result};

use crate::constants::DECIMALS;

/// Outcome of a successful transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Amount debited from the sender
    pub amount: Amount,
    /// Amount destroyed
    pub burned: Amount,
    /// Amount credited to the recipient
    pub net: Amount,
}

/// Token ledger
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ledger {
    name: String,
    symbol: String,
    decimals: u8,

    /// Identity allowed to change the burn rate
    admin: Address,

    burn_rate_bps: u32,

    /// Supply minted at genesis; never changes
    initial_supply: Amount,
    total_supply: Amount,
    total_burned: Amount,

    /// Zero balances are pruned
    balances: BTreeMap<Address, Amount>,
}

impl Ledger {
    /// Create a ledger minting the whole initial supply to `admin`
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        initial_supply: Amount,
        burn_rate_bps: u32,
        admin: Address,
    ) -> Result<Self> {
        Self::with_genesis(name, symbol, burn_rate_bps, admin, &[(admin, initial_supply)])
    }

    /// Create a ledger with an explicit genesis distribution
    ///
    /// Genesis credits are mints, not transfers: no burn applies.
    pub fn with_genesis(
        name: impl Into<String>,
        symbol: impl Into<String>,
        burn_rate_bps: u32,
        admin: Address,
        genesis: &[(Address, Amount)],
    ) -> Result<Self> {
        let name = name.into();
        let symbol = symbol.into();

        if name.trim().is_empty() || symbol.trim().is_empty() {
            return Err(DistributionError::invalid("token name and symbol must be non-empty"));
        }
        check_burn_rate(burn_rate_bps)?;

        let mut balances = BTreeMap::new();
        let mut total_supply: Amount = 0;
        for (holder, amount) in genesis {
            total_supply = total_supply
                .checked_add(*amount)
                .ok_or(DistributionError::Overflow)?;
            if *amount > 0 {
                let balance: &mut Amount = balances.entry(*holder).or_default();
                *balance += *amount;
            }
        }

        info!(
            name = %name,
            symbol = %symbol,
            total_supply,
            burn_rate_bps,
            "Ledger created"
        );

        Ok(Self {
            name,
            symbol,
            decimals: DECIMALS,
            admin,
            burn_rate_bps,
            initial_supply: total_supply,
            total_supply,
            total_burned: 0,
            balances,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn burn_rate_bps(&self) -> u32 {
        self.burn_rate_bps
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Cumulative units destroyed since creation
    pub fn total_burned(&self) -> Amount {
        self.total_burned
    }

    /// Balance of an address; unknown addresses hold 0
    pub fn balance_of(&self, address: &Address) -> Amount {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Iterate all nonzero balances in address order
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    /// Burn/net split a transfer of `amount` would produce at the current rate
    pub fn quote_transfer(&self, amount: Amount) -> TransferReceipt {
        let burned = burn_portion(amount, self.burn_rate_bps);
        debug!(amount, burned, rate = self.burn_rate_bps, "Transfer quoted");
        TransferReceipt {
            amount,
            burned,
            net: amount - burned,
        }
    }

    /// Move `amount` from `from` to `to`, destroying the burn portion
    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<TransferReceipt> {
        if amount == 0 {
            return Err(DistributionError::invalid("transfer amount must be nonzero"));
        }
        if from == to {
            return Err(DistributionError::invalid("cannot transfer to self"));
        }

        let available = self.balance_of(&from);
        if amount > available {
            return Err(DistributionError::InsufficientBalance {
                available,
                required: amount,
            });
        }

        let receipt = self.quote_transfer(amount);
        let to_balance = self
            .balance_of(&to)
            .checked_add(receipt.net)
            .ok_or(DistributionError::Overflow)?;

        // All checks passed; nothing below can fail
        self.set_balance(from, available - amount);
        self.set_balance(to, to_balance);
        self.total_supply -= receipt.burned;
        self.total_burned += receipt.burned;

        info!(
            from = %from,
            to = %to,
            amount,
            burned = receipt.burned,
            "Transfer applied"
        );

        Ok(receipt)
    }

    /// Destroy `amount` held by `holder`
    pub fn burn(&mut self, holder: Address, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(DistributionError::invalid("burn amount must be nonzero"));
        }
        let available = self.balance_of(&holder);
        if amount > available {
            return Err(DistributionError::InsufficientBalance {
                available,
                required: amount,
            });
        }

        self.set_balance(holder, available - amount);
        self.total_supply -= amount;
        self.total_burned += amount;

        info!(holder = %holder, amount, "Tokens burned");
        Ok(())
    }

    /// Change the burn rate for all subsequent transfers
    ///
    /// Returns the previous rate.
    pub fn set_burn_rate(&mut self, caller: Address, new_rate_bps: u32) -> Result<u32> {
        if caller != self.admin {
            warn!(caller = %caller, "Rejected burn rate change from non-admin");
            return Err(DistributionError::Unauthorized(caller));
        }
        check_burn_rate(new_rate_bps)?;

        let previous = std::mem::replace(&mut self.burn_rate_bps, new_rate_bps);
        info!(previous, new = new_rate_bps, "Burn rate changed");
        Ok(previous)
    }

    /// Check the accounting invariants of a deserialized ledger
    pub fn validate(&self) -> Result<()> {
        check_burn_rate(self.burn_rate_bps)
            .map_err(|_| DistributionError::Corrupted(format!("burn rate {} out of range", self.burn_rate_bps)))?;

        let mut sum: Amount = 0;
        for (holder, balance) in &self.balances {
            if *balance == 0 {
                return Err(DistributionError::Corrupted(format!("zero balance stored for {}", holder)));
            }
            sum = sum
                .checked_add(*balance)
                .ok_or_else(|| DistributionError::Corrupted("balance sum overflows".into()))?;
        }

        if sum != self.total_supply {
            return Err(DistributionError::Corrupted(format!(
                "balances sum to {} but total supply is {}",
                sum, self.total_supply
            )));
        }

        if self.total_supply.checked_add(self.total_burned) != Some(self.initial_supply) {
            return Err(DistributionError::Corrupted(format!(
                "supply {} plus burned {} does not equal initial supply {}",
                self.total_supply, self.total_burned, self.initial_supply
            )));
        }
        Ok(())
    }

    fn set_balance(&mut self, address: Address, balance: Amount) {
        if balance == 0 {
            self.balances.remove(&address);
        } else {
            self.balances.insert(address, balance);
        }
    }
}

fn check_burn_rate(rate_bps: u32) -> Result<()> {
    if rate_bps > bps::MAX {
        return Err(DistributionError::InvalidParameter(format!(
            "burn rate {} exceeds {} bps",
            rate_bps,
            bps::MAX
        )));
    }
    Ok(())
}

/// floor(amount * rate_bps / 10_000), split so no intermediate exceeds `amount`
fn burn_portion(amount: Amount, rate_bps: u32) -> Amount {
    let denominator = bps::DENOMINATOR as Amount;
    let rate = rate_bps as Amount;
    (amount / denominator) * rate + (amount % denominator) * rate / denominator
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn bob() -> Address {
        Address::from_label("bob")
    }

    fn ledger(rate: u32) -> Ledger {
        Ledger::new("Value Network", "VNTW", 1_000_000, rate, alice()).unwrap()
    }

    #[test]
    fn test_new_mints_to_admin() {
        let ledger = ledger(0);
        assert_eq!(ledger.name(), "Value Network");
        assert_eq!(ledger.symbol(), "VNTW");
        assert_eq!(ledger.decimals(), 18);
        assert_eq!(ledger.balance_of(&alice()), 1_000_000);
        assert_eq!(ledger.total_supply(), 1_000_000);
        assert_eq!(ledger.balance_of(&bob()), 0);
    }

    #[test]
    fn test_new_rejects_bad_parameters() {
        assert!(matches!(
            Ledger::new("", "VNTW", 1, 0, alice()),
            Err(DistributionError::InvalidParameter(_))
        ));
        assert!(matches!(
            Ledger::new("Token", "TKN", 1, 10_001, alice()),
            Err(DistributionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_transfer_with_burn() {
        // 5% burn: 1000 sent, 950 received, 50 destroyed
        let mut ledger = ledger(500);
        let receipt = ledger.transfer(alice(), bob(), 1000).unwrap();

        assert_eq!(receipt, TransferReceipt { amount: 1000, burned: 50, net: 950 });
        assert_eq!(ledger.balance_of(&bob()), 950);
        assert_eq!(ledger.balance_of(&alice()), 999_000);
        assert_eq!(ledger.total_supply(), 999_950);
        assert_eq!(ledger.total_burned(), 50);
        ledger.validate().unwrap();
    }

    #[test]
    fn test_burn_rounds_down() {
        let mut ledger = ledger(500);
        let receipt = ledger.transfer(alice(), bob(), 19).unwrap();
        // 19 * 500 / 10000 = 0.95 -> 0
        assert_eq!(receipt.burned, 0);
        assert_eq!(ledger.balance_of(&bob()), 19);
    }

    #[test]
    fn test_full_burn_rate_destroys_everything() {
        let mut ledger = ledger(10_000);
        let receipt = ledger.transfer(alice(), bob(), 400).unwrap();
        assert_eq!(receipt.net, 0);
        assert_eq!(ledger.balance_of(&bob()), 0);
        assert_eq!(ledger.total_supply(), 999_600);
        ledger.validate().unwrap();
    }

    #[test]
    fn test_transfer_failures_leave_state_untouched() {
        let mut ledger = ledger(500);
        let before = ledger.clone();

        assert!(matches!(
            ledger.transfer(alice(), bob(), 0),
            Err(DistributionError::InvalidParameter(_))
        ));
        assert!(matches!(
            ledger.transfer(alice(), alice(), 10),
            Err(DistributionError::InvalidParameter(_))
        ));
        assert_eq!(
            ledger.transfer(bob(), alice(), 1),
            Err(DistributionError::InsufficientBalance { available: 0, required: 1 })
        );

        assert_eq!(ledger.balance_of(&alice()), before.balance_of(&alice()));
        assert_eq!(ledger.total_supply(), before.total_supply());
        assert_eq!(ledger.total_burned(), 0);
    }

    #[test]
    fn test_transfer_entire_balance_prunes_account() {
        let mut ledger = ledger(0);
        ledger.transfer(alice(), bob(), 1_000_000).unwrap();
        assert_eq!(ledger.holders().count(), 1);
        assert_eq!(ledger.balance_of(&alice()), 0);
    }

    #[test]
    fn test_set_burn_rate() {
        let mut ledger = ledger(0);
        assert_eq!(ledger.set_burn_rate(alice(), 500), Ok(0));
        assert_eq!(ledger.burn_rate_bps(), 500);

        assert!(matches!(
            ledger.set_burn_rate(alice(), 10_001),
            Err(DistributionError::InvalidParameter(_))
        ));
        assert_eq!(
            ledger.set_burn_rate(bob(), 100),
            Err(DistributionError::Unauthorized(bob()))
        );
        assert_eq!(ledger.burn_rate_bps(), 500);
    }

    #[test]
    fn test_rate_change_not_retroactive() {
        let mut ledger = ledger(0);
        ledger.transfer(alice(), bob(), 1000).unwrap();
        ledger.set_burn_rate(alice(), 1000).unwrap();
        assert_eq!(ledger.balance_of(&bob()), 1000);

        ledger.transfer(bob(), alice(), 1000).unwrap();
        assert_eq!(ledger.total_supply(), 999_900);
    }

    #[test]
    fn test_explicit_burn() {
        let mut ledger = ledger(0);
        ledger.burn(alice(), 250).unwrap();
        assert_eq!(ledger.total_supply(), 999_750);
        assert_eq!(ledger.total_burned(), 250);
        assert_eq!(
            ledger.burn(bob(), 1),
            Err(DistributionError::InsufficientBalance { available: 0, required: 1 })
        );
    }

    #[test]
    fn test_burn_on_amounts_near_max() {
        let mut ledger = Ledger::new("Token", "TKN", Amount::MAX, 500, alice()).unwrap();

        let amount = Amount::MAX / 100;
        let receipt = ledger.transfer(alice(), bob(), amount).unwrap();
        assert_eq!(receipt.burned, amount / 20);
        assert_eq!(receipt.net, amount - amount / 20);

        let receipt = ledger.transfer(alice(), bob(), ledger.balance_of(&alice())).unwrap();
        assert_eq!(receipt.burned + receipt.net, receipt.amount);
        ledger.validate().unwrap();
    }

    #[test]
    fn test_burn_portion_matches_wide_formula() {
        for (amount, rate) in [(1_000u128, 500u32), (9_999, 1), (10_001, 9_999), (12_345_678, 10_000)] {
            assert_eq!(burn_portion(amount, rate), amount * rate as u128 / 10_000);
        }
        assert_eq!(burn_portion(Amount::MAX, 10_000), Amount::MAX);
        assert_eq!(burn_portion(Amount::MAX, 0), 0);
    }

    #[test]
    fn test_validate_detects_tampering() {
        let ledger = ledger(0);
        let mut json = serde_json::to_value(&ledger).unwrap();
        json["total_supply"] = serde_json::json!(5);
        let tampered: Ledger = serde_json::from_value(json).unwrap();
        assert!(matches!(tampered.validate(), Err(DistributionError::Corrupted(_))));
    }

    #[test]
    fn test_validate_detects_inflated_burn_total() {
        let mut ledger = ledger(500);
        ledger.transfer(alice(), bob(), 1_000).unwrap();
        ledger.validate().unwrap();

        let mut json = serde_json::to_value(&ledger).unwrap();
        json["total_burned"] = serde_json::json!(999_999);
        let tampered: Ledger = serde_json::from_value(json).unwrap();
        assert!(matches!(tampered.validate(), Err(DistributionError::Corrupted(_))));
    }

    proptest! {
        #[test]
        fn prop_transfer_burn_arithmetic(
            amount in 1u128..=1_000_000,
            rate in 0u32..=10_000,
        ) {
            let mut ledger = ledger(rate);
            let supply_before = ledger.total_supply();
            let to_before = ledger.balance_of(&bob());
            let expected_burn = amount * rate as u128 / 10_000;

            ledger.transfer(alice(), bob(), amount).unwrap();

            prop_assert_eq!(ledger.total_supply(), supply_before - expected_burn);
            prop_assert_eq!(ledger.balance_of(&bob()), to_before + amount - expected_burn);
            prop_assert!(ledger.validate().is_ok());
        }
    }
}
