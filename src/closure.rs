use chrono::{DateTime, Utc};

use crate::context::LoanContext;
use crate::errors::{LoanError, Result};
use crate::events::LoanEvent;
use crate::ledger::{
    reset_tracker_balances, standard_instruction_details, CustomInstruction, Posting, ACCRUED_INTEREST_RECEIVABLE,
    DUE_CALCULATION_EVENT_COUNTER, EMI, INTEREST_DUE, INTERNAL_CONTRA, PRINCIPAL, PRINCIPAL_DUE,
};

pub const CLOSE_LOAN_EVENT: &str = "CLOSE_LOAN";

/// balances that must be settled before a loan can close
const OUTSTANDING_ADDRESSES: [&str; 4] = [PRINCIPAL, PRINCIPAL_DUE, INTEREST_DUE, ACCRUED_INTEREST_RECEIVABLE];

/// result of closing a loan
#[derive(Debug, Clone, PartialEq)]
pub struct LoanClosure {
    pub instructions: Vec<CustomInstruction>,
    pub event: LoanEvent,
}

/// postings zeroing the instalment and counter trackers
pub fn residual_cleanup_postings(ctx: &LoanContext<'_>, at: Option<DateTime<Utc>>) -> Result<Vec<Posting>> {
    let denomination = ctx.denomination()?;
    reset_tracker_balances(
        ctx.ledger,
        ctx.account_id,
        &[EMI, DUE_CALCULATION_EVENT_COUNTER],
        INTERNAL_CONTRA,
        &denomination,
        at,
    )
}

pub fn close_loan(ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<LoanClosure> {
    let denomination = ctx.denomination()?;
    for address in OUTSTANDING_ADDRESSES {
        let amount = ctx.balance(address, &denomination, Some(at))?;
        if !amount.is_zero() {
            tracing::warn!(address, %amount, "loan cannot close with outstanding balance");
            return Err(LoanError::OutstandingBalance {
                address: address.to_string(),
                amount,
            });
        }
    }

    let postings = residual_cleanup_postings(ctx, Some(at))?;
    let instructions = if postings.is_empty() {
        Vec::new()
    } else {
        vec![CustomInstruction::new(
            postings,
            standard_instruction_details("Clearing residual tracker balances", CLOSE_LOAN_EVENT, false, "LOAN"),
        )]
    };
    tracing::info!(account_id = ctx.account_id, %at, "loan closed");

    Ok(LoanClosure {
        instructions,
        event: LoanEvent::LoanClosed {
            account_id: ctx.account_id.to_string(),
            timestamp: at,
        },
    })
}
