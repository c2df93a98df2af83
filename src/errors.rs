use thiserror::Error;

use crate::decimal::Money;

#[derive(Error, Debug)]
pub enum LoanError {
    #[error("unknown amortisation method: {method}")]
    UnknownAmortizationMethod {
        method: String,
    },

    #[error("missing parameter: {name}")]
    MissingParameter {
        name: String,
    },

    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        name: String,
        message: String,
    },

    #[error("calculation error: {message}")]
    CalculationError {
        message: String,
    },

    #[error("emi {emi} does not cover period interest {interest}")]
    NonAmortizingEmi {
        emi: Money,
        interest: Money,
    },

    #[error("due amount calculation day change rejected: {message}")]
    DueDayChangeRejected {
        message: String,
    },

    #[error("outstanding balance at {address}: {amount}")]
    OutstandingBalance {
        address: String,
        amount: Money,
    },

    #[error("ledger error: {message}")]
    Ledger {
        message: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LoanError>;
