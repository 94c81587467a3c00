//! # Token System
//!
//! Deployment wiring and the serialized execution model.
//!
//! [`TokenSystem`] owns the ledger, the vesting contract and the dev pool
//! behind a single `RwLock`. Every mutation holds the write lock from
//! validation to the last downstream effect, so mutations never interleave
//! and are applied in one total order. Reads share the read lock and always
//! see a fully applied state.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;
use vntw_core::{Address, Amount, DistributionError, ProposalId, Result, Timestamp};

use crate::constants::{DEV_POOL_NONCE, TOKEN_NONCE, VESTING_NONCE};
use crate::devpool::{DevPool, Execution, Proposal, ProposalStatus};
use crate::events::{Event, EventKind, Journal};
use crate::ledger::{Ledger, TransferReceipt};
use crate::vesting::{Release, Vesting, VestingSchedule};

/// Parameters passed by the deployer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeployParams {
    pub name: String,
    pub symbol: String,
    pub initial_supply: Amount,
    pub burn_rate_bps: u32,

    /// Ledger admin and vesting owner
    pub deployer: Address,

    /// Part of the initial supply minted straight into the vesting account
    pub vesting_reserve: Amount,

    pub signers: Vec<Address>,
    pub threshold: usize,
}

/// Addresses assigned at deployment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub deployer: Address,
    pub token: Address,
    pub vesting: Address,
    pub dev_pool: Address,
}

impl Deployment {
    /// Derive component addresses from the deployer
    pub fn derive(deployer: Address) -> Self {
        Self {
            deployer,
            token: Address::derive_contract(&deployer, TOKEN_NONCE),
            vesting: Address::derive_contract(&deployer, VESTING_NONCE),
            dev_pool: Address::derive_contract(&deployer, DEV_POOL_NONCE),
        }
    }

    /// Accounts only the components themselves may move funds from
    pub fn is_component(&self, address: &Address) -> bool {
        *address == self.token || *address == self.vesting || *address == self.dev_pool
    }
}

/// Complete system state; also the persisted snapshot format
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemState {
    pub deployment: Deployment,
    pub ledger: Ledger,
    pub vesting: Vesting,
    pub dev_pool: DevPool,
    pub journal: Journal,
}

impl SystemState {
    /// Check every cross-component invariant
    pub fn validate(&self) -> Result<()> {
        self.ledger.validate()?;
        self.vesting.validate()?;
        self.dev_pool.validate()?;

        if self.vesting.account() != self.deployment.vesting
            || self.dev_pool.account() != self.deployment.dev_pool
        {
            return Err(DistributionError::Corrupted("component addresses do not match deployment".into()));
        }

        let reserve = self.ledger.balance_of(&self.vesting.account());
        if reserve < self.vesting.total_committed() {
            return Err(DistributionError::Corrupted(format!(
                "vesting reserve {} below committed {}",
                reserve,
                self.vesting.total_committed()
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Serialized single-writer token system
pub struct TokenSystem {
    state: RwLock<SystemState>,
}

impl TokenSystem {
    /// Deploy ledger, vesting and dev pool, wired together
    pub fn deploy(params: DeployParams) -> Result<Self> {
        if params.vesting_reserve > params.initial_supply {
            return Err(DistributionError::InvalidParameter(format!(
                "vesting reserve {} exceeds initial supply {}",
                params.vesting_reserve, params.initial_supply
            )));
        }

        let deployment = Deployment::derive(params.deployer);
        if params.signers.iter().any(|s| deployment.is_component(s)) {
            return Err(DistributionError::invalid("a component account cannot be a signer"));
        }

        let ledger = Ledger::with_genesis(
            params.name,
            params.symbol,
            params.burn_rate_bps,
            params.deployer,
            &[
                (params.deployer, params.initial_supply - params.vesting_reserve),
                (deployment.vesting, params.vesting_reserve),
            ],
        )?;
        let vesting = Vesting::new(deployment.vesting, params.deployer);
        let dev_pool = DevPool::new(deployment.dev_pool, params.signers, params.threshold)?;

        info!(
            token = %deployment.token,
            vesting = %deployment.vesting,
            dev_pool = %deployment.dev_pool,
            "Token system deployed"
        );

        Ok(Self {
            state: RwLock::new(SystemState {
                deployment,
                ledger,
                vesting,
                dev_pool,
                journal: Journal::new(),
            }),
        })
    }

    /// Rebuild a system from a snapshot, rejecting inconsistent state
    pub fn restore(state: SystemState) -> Result<Self> {
        state.validate()?;
        info!(events = state.journal.len(), "Token system restored");
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Consistent copy of the whole state
    pub fn snapshot(&self) -> SystemState {
        self.state.read().clone()
    }

    /// Run a read-only closure against a consistent view
    pub fn read<R>(&self, f: impl FnOnce(&SystemState) -> R) -> R {
        f(&self.state.read())
    }

    pub fn deployment(&self) -> Deployment {
        self.state.read().deployment
    }

    // === Ledger ===

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.state.read().ledger.balance_of(address)
    }

    pub fn total_supply(&self) -> Amount {
        self.state.read().ledger.total_supply()
    }

    pub fn burn_rate_bps(&self) -> u32 {
        self.state.read().ledger.burn_rate_bps()
    }

    /// Transfer between externally owned accounts
    pub fn transfer(&self, from: Address, to: Address, amount: Amount) -> Result<TransferReceipt> {
        let mut state = self.state.write();
        if state.deployment.is_component(&from) {
            return Err(DistributionError::Unauthorized(from));
        }
        let receipt = state.ledger.transfer(from, to, amount)?;
        state.journal.record(EventKind::Transfer {
            from,
            to,
            amount,
            burned: receipt.burned,
        });
        Ok(receipt)
    }

    pub fn burn(&self, holder: Address, amount: Amount) -> Result<()> {
        let mut state = self.state.write();
        if state.deployment.is_component(&holder) {
            return Err(DistributionError::Unauthorized(holder));
        }
        state.ledger.burn(holder, amount)?;
        state.journal.record(EventKind::Burn { holder, amount });
        Ok(())
    }

    pub fn set_burn_rate(&self, caller: Address, new_bps: u32) -> Result<()> {
        let mut state = self.state.write();
        let previous_bps = state.ledger.set_burn_rate(caller, new_bps)?;
        state.journal.record(EventKind::BurnRateChanged { previous_bps, new_bps });
        Ok(())
    }

    // === Vesting ===

    pub fn create_schedule(
        &self,
        caller: Address,
        beneficiary: Address,
        amount: Amount,
        start: Timestamp,
        cliff: Timestamp,
        duration: Timestamp,
    ) -> Result<VestingSchedule> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        if state.deployment.is_component(&beneficiary) {
            return Err(DistributionError::invalid("a component account cannot be a beneficiary"));
        }
        let schedule = state
            .vesting
            .create_schedule(caller, &state.ledger, beneficiary, amount, start, cliff, duration)?
            .clone();
        state.journal.record(EventKind::ScheduleCreated {
            beneficiary,
            amount,
            start,
            cliff,
            duration,
        });
        Ok(schedule)
    }

    pub fn schedule(&self, beneficiary: &Address) -> Option<VestingSchedule> {
        self.state.read().vesting.schedule(beneficiary).cloned()
    }

    pub fn vested_amount(&self, beneficiary: &Address, now: Timestamp) -> Result<Amount> {
        self.state.read().vesting.vested_amount(beneficiary, now)
    }

    pub fn releasable_amount(&self, beneficiary: &Address, now: Timestamp) -> Result<Amount> {
        self.state.read().vesting.releasable_amount(beneficiary, now)
    }

    pub fn release(&self, beneficiary: Address, now: Timestamp) -> Result<Release> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let release = state.vesting.release(&mut state.ledger, beneficiary, now)?;
        state.journal.record(EventKind::Released {
            beneficiary,
            amount: release.amount(),
            burned: release.receipt.burned,
            at: now,
        });
        Ok(release)
    }

    // === Dev pool ===

    pub fn propose(
        &self,
        proposer: Address,
        beneficiary: Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<ProposalId> {
        let mut state = self.state.write();
        let id = state.dev_pool.propose(proposer, beneficiary, amount, now)?;
        state.journal.record(EventKind::Proposed {
            id,
            proposer,
            beneficiary,
            amount,
            at: now,
        });
        Ok(id)
    }

    pub fn approve(&self, id: ProposalId, signer: Address) -> Result<usize> {
        let mut state = self.state.write();
        let approvals = state.dev_pool.approve(id, signer)?;
        state.journal.record(EventKind::Approved { id, signer, approvals });
        Ok(approvals)
    }

    pub fn execute_if_ready(&self, id: ProposalId, now: Timestamp) -> Result<Execution> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        match state
            .dev_pool
            .execute_if_ready(id, now, &mut state.vesting, &mut state.ledger)
        {
            Ok(execution) => {
                state.journal.record(EventKind::Executed {
                    id,
                    released: execution.release.amount(),
                    at: now,
                });
                Ok(execution)
            }
            Err(err) => {
                // Precondition failures leave the proposal open; a failed
                // release leaves it executed and is journaled as such
                let executed = state
                    .dev_pool
                    .proposal(id)
                    .map(|p| matches!(p.status, ProposalStatus::Executed { .. }))
                    .unwrap_or(false);
                if executed && !matches!(err, DistributionError::AlreadyExecuted(_)) {
                    state.journal.record(EventKind::ExecutionFailed {
                        id,
                        error_code: err.code(),
                        error: err.to_string(),
                        at: now,
                    });
                }
                Err(err)
            }
        }
    }

    pub fn revoke(&self, id: ProposalId, signer: Address, now: Timestamp) -> Result<()> {
        let mut state = self.state.write();
        state.dev_pool.revoke(id, signer, now)?;
        state.journal.record(EventKind::Revoked { id, signer, at: now });
        Ok(())
    }

    pub fn proposal(&self, id: ProposalId) -> Option<Proposal> {
        self.state.read().dev_pool.proposal(id).cloned()
    }

    // === Journal ===

    pub fn events_since(&self, after: u64) -> Vec<Event> {
        self.state.read().journal.since(after).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployer() -> Address {
        Address::from_label("deployer")
    }

    fn params() -> DeployParams {
        DeployParams {
            name: "Token".into(),
            symbol: "TKN".into(),
            initial_supply: 1_000_000,
            burn_rate_bps: 0,
            deployer: deployer(),
            vesting_reserve: 100_000,
            signers: vec![
                Address::from_label("A"),
                Address::from_label("B"),
                Address::from_label("C"),
            ],
            threshold: 2,
        }
    }

    #[test]
    fn test_deploy_wires_components() {
        let system = TokenSystem::deploy(params()).unwrap();
        let deployment = system.deployment();

        assert_eq!(deployment, Deployment::derive(deployer()));
        assert_eq!(system.balance_of(&deployer()), 900_000);
        assert_eq!(system.balance_of(&deployment.vesting), 100_000);
        assert_eq!(system.total_supply(), 1_000_000);
        system.read(|s| {
            assert_eq!(s.vesting.owner(), deployer());
            assert_eq!(s.dev_pool.threshold(), 2);
            assert_eq!(s.ledger.admin(), deployer());
        });
    }

    #[test]
    fn test_deploy_rejects_empty_signers() {
        let mut params = params();
        params.signers.clear();
        assert!(matches!(
            TokenSystem::deploy(params),
            Err(DistributionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_deploy_rejects_oversized_reserve() {
        let mut params = params();
        params.vesting_reserve = params.initial_supply + 1;
        assert!(matches!(
            TokenSystem::deploy(params),
            Err(DistributionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_component_accounts_cannot_be_spent_directly() {
        let system = TokenSystem::deploy(params()).unwrap();
        let vesting = system.deployment().vesting;
        assert_eq!(
            system.transfer(vesting, deployer(), 1),
            Err(DistributionError::Unauthorized(vesting))
        );
        assert_eq!(system.burn(vesting, 1), Err(DistributionError::Unauthorized(vesting)));
        assert_eq!(system.balance_of(&vesting), 100_000);
    }

    #[test]
    fn test_journal_records_mutations_only() {
        let system = TokenSystem::deploy(params()).unwrap();
        let bob = Address::from_label("bob");

        system.transfer(deployer(), bob, 10).unwrap();
        assert!(system.transfer(bob, deployer(), 100).is_err());
        system.set_burn_rate(deployer(), 500).unwrap();

        let events = system.events_since(0);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].seq, 1);
        assert_eq!(
            events[1].kind,
            EventKind::BurnRateChanged { previous_bps: 0, new_bps: 500 }
        );
    }

    #[test]
    fn test_failed_release_is_journaled() {
        let system = TokenSystem::deploy(params()).unwrap();
        let x = Address::from_label("X");
        system.create_schedule(deployer(), x, 1000, 100, 0, 10).unwrap();

        let id = system.propose(Address::from_label("A"), x, 50, 0).unwrap();
        system.approve(id, Address::from_label("B")).unwrap();

        // Schedule has not started yet
        assert_eq!(
            system.execute_if_ready(id, 50),
            Err(DistributionError::NothingToRelease(x))
        );
        assert!(matches!(
            system.proposal(id).unwrap().status,
            ProposalStatus::Executed { released: 0, .. }
        ));
        assert!(matches!(
            system.events_since(0).last().unwrap().kind,
            EventKind::ExecutionFailed { error_code: 2003, .. }
        ));

        // Repeat attempt is rejected and not journaled again
        let before = system.events_since(0).len();
        assert_eq!(system.execute_if_ready(id, 200), Err(DistributionError::AlreadyExecuted(id)));
        assert_eq!(system.events_since(0).len(), before);
    }

    #[test]
    fn test_snapshot_roundtrip_and_tamper_detection() {
        let system = TokenSystem::deploy(params()).unwrap();
        let x = Address::from_label("X");
        system.create_schedule(deployer(), x, 1000, 0, 0, 10).unwrap();
        system.propose(Address::from_label("A"), x, 50, 0).unwrap();

        let json = system.snapshot().to_json().unwrap();
        let restored = TokenSystem::restore(SystemState::from_json(&json).unwrap()).unwrap();
        assert_eq!(restored.balance_of(&deployer()), 900_000);
        assert_eq!(restored.proposal(1).unwrap().amount, 50);
        assert_eq!(restored.schedule(&x).unwrap().total_allocated, 1000);

        let mut tampered = system.snapshot();
        tampered.vesting = Vesting::new(tampered.deployment.dev_pool, deployer());
        assert!(matches!(
            TokenSystem::restore(tampered),
            Err(DistributionError::Corrupted(_))
        ));
    }
}
