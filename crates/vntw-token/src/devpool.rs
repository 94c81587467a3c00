//! # Dev Pool
//!
//! Gates vesting releases behind M-of-N signer approval.
//!
//! ## Proposal lifecycle
//!
//! ```text
//!  propose ─► Pending ──approvals >= M──► Executable ──execute──► Executed
//!                │                            │
//!                └──────────revoke────────────┴──────────────► Revoked
//! ```
//!
//! `Executed` and `Revoked` are terminal. Execution marks the proposal
//! executed before the vesting release runs, so a nested or repeated call
//! always observes it as already executed. If the release then fails the
//! proposal stays executed with nothing released.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};
use vntw_core::{Address, Amount, DistributionError, ProposalId, Result, Timestamp};

use crate::ledger::Ledger;
use crate::vesting::{Release, Vesting};

/// Proposal status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Collecting approvals
    Pending,
    /// Threshold reached, waiting for execution
    Executable,
    /// Terminal: release attempted
    Executed {
        executed_at: Timestamp,
        /// Gross amount released; 0 when the downstream release failed
        released: Amount,
    },
    /// Terminal: abandoned by a signer
    Revoked {
        revoked_by: Address,
        revoked_at: Timestamp,
    },
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed { .. } | Self::Revoked { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executable => "executable",
            Self::Executed { .. } => "executed",
            Self::Revoked { .. } => "revoked",
        }
    }
}

/// Distribution proposal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub beneficiary: Address,
    /// Upper bound on the amount released on execution
    pub amount: Amount,
    pub proposer: Address,
    pub approvers: BTreeSet<Address>,
    pub created_at: Timestamp,
    pub status: ProposalStatus,
}

impl Proposal {
    pub fn approvals(&self) -> usize {
        self.approvers.len()
    }

    /// Reject approve/revoke/execute on a terminal proposal
    fn ensure_open(&self) -> Result<()> {
        match self.status {
            ProposalStatus::Executed { .. } => Err(DistributionError::AlreadyExecuted(self.id)),
            ProposalStatus::Revoked { .. } => Err(DistributionError::Revoked(self.id)),
            ProposalStatus::Pending | ProposalStatus::Executable => Ok(()),
        }
    }
}

/// Outcome of a successful execution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub proposal: ProposalId,
    pub release: Release,
}

/// Dev pool state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DevPool {
    /// Ledger account of the pool itself
    account: Address,
    signers: BTreeSet<Address>,
    /// Approvals required to execute (M)
    threshold: usize,
    proposals: BTreeMap<ProposalId, Proposal>,
    next_id: ProposalId,
}

impl DevPool {
    /// Create a pool requiring `threshold` of `signers` to approve
    pub fn new(account: Address, signers: Vec<Address>, threshold: usize) -> Result<Self> {
        let count = signers.len();
        let signer_set: BTreeSet<Address> = signers.into_iter().collect();

        if signer_set.is_empty() {
            return Err(DistributionError::invalid("dev pool needs at least one signer"));
        }
        if signer_set.len() != count {
            return Err(DistributionError::invalid("duplicate signer"));
        }
        if threshold == 0 || threshold > signer_set.len() {
            return Err(DistributionError::InvalidParameter(format!(
                "threshold {} outside 1..={}",
                threshold,
                signer_set.len()
            )));
        }

        info!(signers = signer_set.len(), threshold, "Dev pool created");

        Ok(Self {
            account,
            signers: signer_set,
            threshold,
            proposals: BTreeMap::new(),
            next_id: 1,
        })
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn signers(&self) -> impl Iterator<Item = &Address> {
        self.signers.iter()
    }

    pub fn is_signer(&self, address: &Address) -> bool {
        self.signers.contains(address)
    }

    pub fn proposal(&self, id: ProposalId) -> Option<&Proposal> {
        self.proposals.get(&id)
    }

    pub fn proposals(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    /// Open a proposal to release up to `amount` to `beneficiary`
    ///
    /// The proposer's approval is registered immediately.
    pub fn propose(
        &mut self,
        proposer: Address,
        beneficiary: Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<ProposalId> {
        if !self.is_signer(&proposer) {
            warn!(proposer = %proposer, "Rejected proposal from non-signer");
            return Err(DistributionError::Unauthorized(proposer));
        }
        if amount == 0 {
            return Err(DistributionError::invalid("proposal amount must be nonzero"));
        }

        let id = self.next_id;
        self.next_id += 1;

        let mut proposal = Proposal {
            id,
            beneficiary,
            amount,
            proposer,
            approvers: BTreeSet::from([proposer]),
            created_at: now,
            status: ProposalStatus::Pending,
        };
        Self::refresh_status(&mut proposal, self.threshold);
        self.proposals.insert(id, proposal);

        info!(id, proposer = %proposer, beneficiary = %beneficiary, amount, "Proposal created");
        Ok(id)
    }

    /// Record `signer`'s approval; returns the new approval count
    pub fn approve(&mut self, id: ProposalId, signer: Address) -> Result<usize> {
        let threshold = self.threshold;
        let authorized = self.signers.contains(&signer);
        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(DistributionError::UnknownProposal(id))?;

        proposal.ensure_open()?;
        if !authorized {
            warn!(id, signer = %signer, "Rejected approval from non-signer");
            return Err(DistributionError::Unauthorized(signer));
        }
        if proposal.approvers.contains(&signer) {
            return Err(DistributionError::AlreadyApproved { proposal: id, signer });
        }

        proposal.approvers.insert(signer);
        Self::refresh_status(proposal, threshold);

        info!(
            id,
            signer = %signer,
            approvals = proposal.approvals(),
            threshold,
            status = proposal.status.name(),
            "Proposal approved"
        );
        Ok(proposal.approvals())
    }

    /// Execute a proposal whose approvals reached the threshold
    ///
    /// Releases up to the proposal amount from the beneficiary's vesting
    /// schedule. Release failures are returned after the proposal has been
    /// marked executed.
    pub fn execute_if_ready(
        &mut self,
        id: ProposalId,
        now: Timestamp,
        vesting: &mut Vesting,
        ledger: &mut Ledger,
    ) -> Result<Execution> {
        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(DistributionError::UnknownProposal(id))?;

        proposal.ensure_open()?;
        if proposal.approvals() < self.threshold {
            return Err(DistributionError::ThresholdNotMet {
                required: self.threshold,
                approvals: proposal.approvals(),
            });
        }

        // Commit before the downstream effect
        proposal.status = ProposalStatus::Executed {
            executed_at: now,
            released: 0,
        };

        match vesting.release_capped(ledger, proposal.beneficiary, proposal.amount, now) {
            Ok(release) => {
                proposal.status = ProposalStatus::Executed {
                    executed_at: now,
                    released: release.amount(),
                };
                info!(
                    id,
                    beneficiary = %proposal.beneficiary,
                    released = release.amount(),
                    "Proposal executed"
                );
                Ok(Execution { proposal: id, release })
            }
            Err(err) => {
                warn!(id, error = %err, "Proposal executed but release failed");
                Err(err)
            }
        }
    }

    /// Abandon a non-terminal proposal
    pub fn revoke(&mut self, id: ProposalId, signer: Address, now: Timestamp) -> Result<()> {
        let authorized = self.signers.contains(&signer);
        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(DistributionError::UnknownProposal(id))?;

        proposal.ensure_open()?;
        if !authorized {
            warn!(id, signer = %signer, "Rejected revoke from non-signer");
            return Err(DistributionError::Unauthorized(signer));
        }

        proposal.status = ProposalStatus::Revoked {
            revoked_by: signer,
            revoked_at: now,
        };
        info!(id, signer = %signer, "Proposal revoked");
        Ok(())
    }

    /// Check the bookkeeping of a deserialized pool
    pub fn validate(&self) -> Result<()> {
        if self.threshold == 0 || self.threshold > self.signers.len() {
            return Err(DistributionError::Corrupted(format!(
                "threshold {} outside 1..={}",
                self.threshold,
                self.signers.len()
            )));
        }
        for (id, proposal) in &self.proposals {
            if *id != proposal.id || *id == 0 || *id >= self.next_id {
                return Err(DistributionError::Corrupted(format!("proposal id {} out of sequence", id)));
            }
            if !proposal.approvers.is_subset(&self.signers) {
                return Err(DistributionError::Corrupted(format!(
                    "proposal {} approved by a non-signer",
                    id
                )));
            }
            if !proposal.approvers.contains(&proposal.proposer) {
                return Err(DistributionError::Corrupted(format!(
                    "proposal {} lacks its proposer's approval",
                    id
                )));
            }

            // Pending below threshold; executable or executed at or above it
            let reached = proposal.approvals() >= self.threshold;
            let consistent = match proposal.status {
                ProposalStatus::Pending => !reached,
                ProposalStatus::Executable | ProposalStatus::Executed { .. } => reached,
                ProposalStatus::Revoked { .. } => true,
            };
            if !consistent {
                return Err(DistributionError::Corrupted(format!(
                    "proposal {} is {} with {} of {} approvals",
                    id,
                    proposal.status.name(),
                    proposal.approvals(),
                    self.threshold
                )));
            }
        }
        Ok(())
    }

    fn refresh_status(proposal: &mut Proposal, threshold: usize) {
        if proposal.status == ProposalStatus::Pending && proposal.approvals() >= threshold {
            proposal.status = ProposalStatus::Executable;
        }
    }
}
