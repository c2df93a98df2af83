pub mod amortization;
pub mod balloon;
pub mod closure;
pub mod config;
pub mod context;
pub mod decimal;
pub mod due_amount;
pub mod emi;
pub mod errors;
pub mod events;
pub mod interest;
pub mod ledger;
pub mod memory;
pub mod reamortization;
pub mod repayment_holiday;
pub mod schedule;
pub mod simulation;
pub mod state;
pub mod term;
pub mod types;

// re-export key types
pub use amortization::{Amortization, AmortizationFeature, AmortizationInputs, PrincipalAdjustment};
pub use config::LoanParameters;
pub use context::{AccountHistory, LedgerView, LoanContext, ParameterValue, ParameterView};
pub use decimal::{Money, Rate};
pub use due_amount::{DueAmountOutcome, DueAmountScheduler};
pub use errors::{LoanError, Result};
pub use events::{EventStore, LoanEvent};
pub use interest::{InterestApplication, InterestRate, InterestRateFeature};
pub use ledger::{CustomInstruction, Posting};
pub use memory::InMemoryAccount;
pub use reamortization::{ReamortizationCondition, ReamortizationRules};
pub use simulation::LoanSimulator;
pub use state::LoanSnapshot;
pub use types::{
    AmortizationMethod, DaysInYear, HolidayImpactPreference, LoanPhase, ReamortizationDecision,
    ReamortizationReason, TermDetails,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
