use chrono::{DateTime, Utc};

use crate::amortization::{Amortization, AmortizationInputs};
use crate::config::PARAM_PRINCIPAL;
use crate::context::LoanContext;
use crate::decimal::{Money, FULFILLMENT_PRECISION};
use crate::due_amount::transfer_principal_due;
use crate::errors::Result;
use crate::ledger::{create_postings, standard_instruction_details, CustomInstruction, Posting, EMI, INTERNAL_CONTRA};

pub const ACCOUNT_ACTIVATION_EVENT: &str = "ACCOUNT_ACTIVATION";

/// derived parameter exposing the current instalment
pub const PARAM_EQUATED_INSTALMENT_AMOUNT: &str = "equated_instalment_amount";

/// compute the instalment and the instruction moving the `EMI` tracker to it
///
/// without `with_balances` the current instalment is taken as zero, which is
/// the activation case.
pub fn amortise(
    ctx: &LoanContext<'_>,
    strategy: &dyn Amortization,
    inputs: &AmortizationInputs<'_>,
    with_balances: bool,
    event: &str,
) -> Result<Vec<CustomInstruction>> {
    let updated = strategy.calculate_emi(ctx, inputs)?;
    let denomination = ctx.denomination()?;
    let current = if with_balances {
        ctx.balance(EMI, &denomination, Some(inputs.effective))?
    } else {
        Money::ZERO
    };

    let postings = update_emi(ctx.account_id, &denomination, current, updated);
    if postings.is_empty() {
        return Ok(Vec::new());
    }
    tracing::info!(%current, %updated, event, "emi amortised");
    Ok(vec![CustomInstruction::new(
        postings,
        standard_instruction_details(&format!("Updating EMI to {updated}"), event, false, "LOAN"),
    )])
}

/// activation for loans whose first instalment falls due immediately
///
/// only meaningful for zero interest products: the whole first instalment
/// is principal, so it moves straight from `PRINCIPAL` to `PRINCIPAL_DUE`.
pub fn charge_in_advance(
    ctx: &LoanContext<'_>,
    strategy: &dyn Amortization,
    inputs: &AmortizationInputs<'_>,
) -> Result<Vec<CustomInstruction>> {
    let mut instructions = amortise(ctx, strategy, inputs, false, ACCOUNT_ACTIVATION_EVENT)?;

    let denomination = ctx.denomination()?;
    let principal = Money::from_decimal(ctx.get_decimal(PARAM_PRINCIPAL, None)?);
    let principal_due = strategy.calculate_emi(ctx, &(*inputs).principal(principal))?;
    let postings = transfer_principal_due(ctx.account_id, principal_due, &denomination);
    if !postings.is_empty() {
        tracing::info!(%principal_due, "instalment charged in advance");
        instructions.push(CustomInstruction::new(
            postings,
            standard_instruction_details("Principal due on activation", ACCOUNT_ACTIVATION_EVENT, true, "LOAN"),
        ));
    }
    Ok(instructions)
}

/// postings moving the `EMI` tracker from `current` to `updated`
pub fn update_emi(account_id: &str, denomination: &str, current: Money, updated: Money) -> Vec<Posting> {
    let delta = current - updated;
    if delta.is_zero() {
        return Vec::new();
    }

    let (debit_address, credit_address) = if delta.is_negative() {
        (EMI, INTERNAL_CONTRA)
    } else {
        (INTERNAL_CONTRA, EMI)
    };
    create_postings(delta.abs(), account_id, debit_address, account_id, credit_address, denomination)
}

/// instalment currently held on the `EMI` tracker
pub fn get_emi(ctx: &LoanContext<'_>, at: Option<DateTime<Utc>>) -> Result<Money> {
    let denomination = ctx.denomination()?;
    Ok(ctx.balance(EMI, &denomination, at)?.round_dp(FULFILLMENT_PRECISION))
}
