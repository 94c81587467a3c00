//! Audit journal of applied mutations

use serde::{Deserialize, Serialize};
use vntw_core::{Address, Amount, ProposalId, Timestamp};

/// What happened
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
        burned: Amount,
    },
    Burn {
        holder: Address,
        amount: Amount,
    },
    BurnRateChanged {
        previous_bps: u32,
        new_bps: u32,
    },
    ScheduleCreated {
        beneficiary: Address,
        amount: Amount,
        start: Timestamp,
        cliff: Timestamp,
        duration: Timestamp,
    },
    Released {
        beneficiary: Address,
        amount: Amount,
        burned: Amount,
        at: Timestamp,
    },
    Proposed {
        id: ProposalId,
        proposer: Address,
        beneficiary: Address,
        amount: Amount,
        at: Timestamp,
    },
    Approved {
        id: ProposalId,
        signer: Address,
        approvals: usize,
    },
    Executed {
        id: ProposalId,
        released: Amount,
        at: Timestamp,
    },
    /// Proposal marked executed but the vesting release failed
    ExecutionFailed {
        id: ProposalId,
        error_code: u32,
        error: String,
        at: Timestamp,
    },
    Revoked {
        id: ProposalId,
        signer: Address,
        at: Timestamp,
    },
}

/// Journal entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Position in the total order of mutations, starting at 1
    pub seq: u64,
    pub kind: EventKind,
}

/// Append-only event log
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Journal {
    events: Vec<Event>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return its sequence number
    pub fn record(&mut self, kind: EventKind) -> u64 {
        let seq = self.events.last().map_or(1, |e| e.seq + 1);
        self.events.push(Event { seq, kind });
        seq
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Events with `seq > after`
    pub fn since(&self, after: u64) -> &[Event] {
        let start = self.events.partition_point(|e| e.seq <= after);
        &self.events[start..]
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_numbers() {
        let mut journal = Journal::new();
        assert!(journal.is_empty());
        assert_eq!(journal.record(EventKind::BurnRateChanged { previous_bps: 0, new_bps: 5 }), 1);
        assert_eq!(
            journal.record(EventKind::Burn { holder: Address::ZERO, amount: 3 }),
            2
        );
        assert_eq!(journal.len(), 2);
        assert_eq!(journal.since(1).len(), 1);
        assert_eq!(journal.since(0).len(), 2);
        assert!(journal.since(2).is_empty());
    }

    #[test]
    fn test_event_json_shape() {
        let event = Event {
            seq: 4,
            kind: EventKind::Approved { id: 1, signer: Address::ZERO, approvals: 2 },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["seq"], 4);
        assert_eq!(json["kind"]["approved"]["approvals"], 2);
    }
}
