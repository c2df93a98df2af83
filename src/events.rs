use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{AccountId, ReamortizationReason};

/// all events that can be emitted over a loan's life
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoanEvent {
    // lifecycle events
    LoanActivated {
        account_id: AccountId,
        principal: Money,
        emi: Money,
        timestamp: DateTime<Utc>,
    },
    LoanClosed {
        account_id: AccountId,
        timestamp: DateTime<Utc>,
    },

    // instalment events
    EmiAmortised {
        account_id: AccountId,
        previous_emi: Money,
        emi: Money,
        event_type: String,
        timestamp: DateTime<Utc>,
    },
    Reamortized {
        account_id: AccountId,
        reason: ReamortizationReason,
        previous_emi: Money,
        new_emi: Money,
        timestamp: DateTime<Utc>,
    },

    // due amount events
    DueAmountsPosted {
        account_id: AccountId,
        principal_due: Money,
        interest_due: Money,
        emi: Money,
        elapsed_term: u32,
        remaining_term: u32,
        timestamp: DateTime<Utc>,
    },
    DueCalculationSkipped {
        account_id: AccountId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // balloon events
    BalloonScheduled {
        account_id: AccountId,
        balloon_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    BalloonPaymentPosted {
        account_id: AccountId,
        principal_due: Money,
        interest_due: Money,
        timestamp: DateTime<Utc>,
    },

    // customer events
    InterestAccrued {
        account_id: AccountId,
        amount: Money,
        days: u32,
        timestamp: DateTime<Utc>,
    },
    RepaymentReceived {
        account_id: AccountId,
        principal: Money,
        interest: Money,
        timestamp: DateTime<Utc>,
    },
}

impl LoanEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LoanEvent::LoanActivated { timestamp, .. }
            | LoanEvent::LoanClosed { timestamp, .. }
            | LoanEvent::EmiAmortised { timestamp, .. }
            | LoanEvent::Reamortized { timestamp, .. }
            | LoanEvent::DueAmountsPosted { timestamp, .. }
            | LoanEvent::DueCalculationSkipped { timestamp, .. }
            | LoanEvent::BalloonScheduled { timestamp, .. }
            | LoanEvent::BalloonPaymentPosted { timestamp, .. }
            | LoanEvent::InterestAccrued { timestamp, .. }
            | LoanEvent::RepaymentReceived { timestamp, .. } => *timestamp,
        }
    }
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<LoanEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: LoanEvent) {
        tracing::trace!(?event, "event emitted");
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<LoanEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[LoanEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
