use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;

use crate::config::PARAM_TOTAL_REPAYMENT_COUNT;
use crate::context::LoanContext;
use crate::errors::{LoanError, Result};
use crate::ledger::{DUE_CALCULATION_EVENT_COUNTER, PRINCIPAL};
use crate::schedule::months_between;
use crate::types::TermDetails;

pub fn original_total_term(ctx: &LoanContext<'_>) -> Result<u32> {
    ctx.get_count(PARAM_TOTAL_REPAYMENT_COUNT, None)
}

/// completed due events, read from the counter address
pub fn calculate_elapsed_term(ctx: &LoanContext<'_>, at: Option<DateTime<Utc>>) -> Result<u32> {
    let denomination = ctx.denomination()?;
    let counter = ctx.balance(DUE_CALCULATION_EVENT_COUNTER, &denomination, at)?;
    counter
        .as_decimal()
        .trunc()
        .to_u32()
        .ok_or_else(|| LoanError::CalculationError {
            message: format!("due calculation counter holds {counter}"),
        })
}

/// elapsed from the counter, remaining from the original term
///
/// remaining drops to zero once the principal is fully repaid.
pub fn term_details_from_counter(ctx: &LoanContext<'_>, effective: DateTime<Utc>) -> Result<TermDetails> {
    let total = original_total_term(ctx)?;
    if effective == ctx.creation_datetime() {
        return Ok(TermDetails::new(0, total));
    }

    let denomination = ctx.denomination()?;
    let principal = ctx.balance(PRINCIPAL, &denomination, Some(effective))?;
    let elapsed = calculate_elapsed_term(ctx, Some(effective))?;
    let remaining = if principal.is_positive() {
        total.saturating_sub(elapsed)
    } else {
        0
    };
    Ok(TermDetails::new(elapsed, remaining))
}

/// whole calendar months since creation, for loans without due events
pub fn calendar_term_details(ctx: &LoanContext<'_>, effective: DateTime<Utc>) -> Result<TermDetails> {
    let total = original_total_term(ctx)?;
    let start = ctx.creation_datetime();
    let elapsed = months_between(start, effective.max(start))?;
    if elapsed > total {
        return Ok(TermDetails::new(total, 0));
    }
    Ok(TermDetails::new(elapsed, total - elapsed))
}
