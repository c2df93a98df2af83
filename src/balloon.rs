use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amortization::{amortisation_method, MinimumRepayment};
use crate::config::{PARAM_APPLICATION_PRECISION, PARAM_TOTAL_REPAYMENT_COUNT};
use crate::context::LoanContext;
use crate::decimal::{compound_factor, round_half_up, Money, Rate, FULFILLMENT_PRECISION};
use crate::due_amount::{self, get_principal, transfer_principal_due, DUE_AMOUNT_CALCULATION_EVENT, DUE_AMOUNT_CALCULATION_PREFIX};
use crate::errors::Result;
use crate::interest::{InterestApplication, InterestRate};
use crate::ledger::{standard_instruction_details, CustomInstruction};
use crate::schedule::{add_months, with_time, ScheduleDirective, ScheduleExpression, ScheduledEvent};
use crate::types::AmortizationMethod;

pub const BALLOON_PAYMENT_EVENT: &str = "BALLOON_PAYMENT_EVENT";

pub const PARAM_BALLOON_PAYMENT_DAYS_DELTA: &str = "balloon_payment_days_delta";
pub const PARAM_BALLOON_PAYMENT_AMOUNT: &str = "balloon_payment_amount";
pub const PARAM_BALLOON_EMI_AMOUNT: &str = "balloon_emi_amount";
pub const PARAM_EXPECTED_BALLOON_PAYMENT_AMOUNT: &str = "expected_balloon_payment_amount";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalloonOutcome {
    pub instructions: Vec<CustomInstruction>,
    pub principal_due: Money,
    pub interest_applied: Money,
}

pub fn is_balloon_loan(method: AmortizationMethod) -> bool {
    method.is_balloon()
}

fn balloon_payment_days_delta(ctx: &LoanContext<'_>) -> Result<i64> {
    ctx.get_int_or(PARAM_BALLOON_PAYMENT_DAYS_DELTA, None, 0)
}

fn at_due_calculation_time(ctx: &LoanContext<'_>, dt: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let (hour, minute, second) = ctx.schedule_time(DUE_AMOUNT_CALCULATION_PREFIX)?;
    with_time(dt, hour, minute, second)
}

fn no_repayment_balloon_datetime(ctx: &LoanContext<'_>, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let total = ctx.get_count(PARAM_TOTAL_REPAYMENT_COUNT, None)?;
    let months = i32::try_from(total).unwrap_or(i32::MAX);
    let balloon = add_months(from, months)? + Duration::days(balloon_payment_days_delta(ctx)?);
    at_due_calculation_time(ctx, balloon)
}

/// balloon and due calculation schedules for a balloon loan
///
/// no repayment loans get a one-off balloon at term end and never run the
/// due calculation. The other balloon methods park the balloon event until
/// the final due calculation arms it.
pub fn scheduled_events(
    ctx: &LoanContext<'_>,
    account_opening: DateTime<Utc>,
    method: AmortizationMethod,
) -> Result<BTreeMap<String, ScheduledEvent>> {
    // schedules never fire on the opening day
    let balloon_start = account_opening + Duration::days(1);
    let mut events = BTreeMap::new();

    if method == AmortizationMethod::NoRepayment {
        let balloon_at = no_repayment_balloon_datetime(ctx, account_opening)?;
        events.insert(
            BALLOON_PAYMENT_EVENT.to_string(),
            ScheduledEvent::new(balloon_start, ScheduleExpression::OneOff(balloon_at)),
        );
        events.insert(
            DUE_AMOUNT_CALCULATION_EVENT.to_string(),
            ScheduledEvent::end_of_time(balloon_start),
        );
    } else {
        events.insert(BALLOON_PAYMENT_EVENT.to_string(), ScheduledEvent::end_of_time(balloon_start));
        events.extend(due_amount::scheduled_events(ctx, account_opening)?);
    }
    Ok(events)
}

/// arm the balloon `days_delta` days after the final due calculation and park the due calculation
pub fn update_balloon_payment_schedule(
    ctx: &LoanContext<'_>,
    execution: DateTime<Utc>,
) -> Result<Vec<ScheduleDirective>> {
    let balloon_at = execution + Duration::days(balloon_payment_days_delta(ctx)?);
    let balloon_at = at_due_calculation_time(ctx, balloon_at)?;
    tracing::info!(%balloon_at, "balloon payment scheduled");
    Ok(vec![
        ScheduleDirective {
            event_type: BALLOON_PAYMENT_EVENT.to_string(),
            expression: ScheduleExpression::OneOff(balloon_at),
            skip: false,
        },
        ScheduleDirective {
            event_type: DUE_AMOUNT_CALCULATION_EVENT.to_string(),
            expression: ScheduleExpression::EndOfTime,
            skip: true,
        },
    ])
}

/// one-off balloon date after a conversion, from the latest term
///
/// the start is left to the host, which sets it to the conversion time.
pub fn update_no_repayment_balloon_schedule(ctx: &LoanContext<'_>) -> Result<BTreeMap<String, ScheduledEvent>> {
    if amortisation_method(ctx)? != AmortizationMethod::NoRepayment {
        return Ok(BTreeMap::new());
    }
    let balloon_at = no_repayment_balloon_datetime(ctx, ctx.creation_datetime())?;
    Ok(BTreeMap::from([(
        BALLOON_PAYMENT_EVENT.to_string(),
        ScheduledEvent {
            start: None,
            expression: ScheduleExpression::OneOff(balloon_at),
        },
    )]))
}

/// move all outstanding principal and interest to due
///
/// interest is applied with a zero-length window so everything accrued up
/// to `effective` counts as instalment interest.
pub fn schedule_logic(
    ctx: &LoanContext<'_>,
    effective: DateTime<Utc>,
    interest_application: Option<&dyn InterestApplication>,
    account_type: &str,
) -> Result<BalloonOutcome> {
    let method = amortisation_method(ctx)?;
    if !is_balloon_loan(method) {
        return Ok(BalloonOutcome {
            instructions: Vec::new(),
            principal_due: Money::ZERO,
            interest_applied: Money::ZERO,
        });
    }

    let denomination = ctx.denomination()?;
    let principal = get_principal(ctx, &denomination, effective)?;
    let mut postings = transfer_principal_due(ctx.account_id, principal, &denomination);

    let interest_applied = match interest_application {
        Some(application) => {
            let amounts = application.interest_to_apply(ctx, effective, effective)?;
            postings.extend(application.apply_interest(ctx, effective, effective)?);
            amounts.total_rounded
        }
        None => Money::ZERO,
    };

    let instructions = if postings.is_empty() {
        Vec::new()
    } else {
        vec![CustomInstruction::new(
            postings,
            standard_instruction_details(
                "Updating due balances for final balloon payment.",
                BALLOON_PAYMENT_EVENT,
                true,
                account_type,
            ),
        )
        .overriding_restrictions()]
    };
    tracing::info!(%principal, interest = %interest_applied, "balloon payment due");

    Ok(BalloonOutcome {
        instructions,
        principal_due: principal.max(Money::ZERO),
        interest_applied,
    })
}

/// lump sum left after `terms` instalments of `emi`
///
/// rearranges the annuity formula: `L = (1+R)^N * (P - EMI/R) + EMI/R`.
pub fn calculate_lump_sum(emi: Money, principal: Money, monthly_rate: Rate, terms: u32, precision: u32) -> Result<Money> {
    let emi = emi.as_decimal();
    let principal = principal.as_decimal();
    let rate = monthly_rate.as_decimal();
    if rate.is_zero() {
        let amount = principal - emi * Decimal::from(terms);
        return Ok(Money::from_decimal(round_half_up(amount, precision)));
    }

    let pow = compound_factor(rate, terms)?;
    let amount = pow * (principal - emi / rate) + emi / rate;
    Ok(Money::from_decimal(round_half_up(amount, precision)))
}

/// projected balloon amount, zero for amortising loans
///
/// assumes the rate stays as it is today. A minimum repayment loan with a
/// static instalment needs a rate to invert the formula; without one the
/// projection is zero.
pub fn expected_balloon_payment_amount(
    ctx: &LoanContext<'_>,
    effective: DateTime<Utc>,
    interest_rate: Option<&dyn InterestRate>,
) -> Result<Money> {
    let denomination = ctx.denomination()?;
    let principal = get_principal(ctx, &denomination, effective)?;

    match amortisation_method(ctx)? {
        AmortizationMethod::NoRepayment | AmortizationMethod::InterestOnly => Ok(principal.max(Money::ZERO)),
        AmortizationMethod::MinimumRepaymentWithBalloonPayment => {
            if let Some(amount) = ctx.get_optional_decimal(PARAM_BALLOON_PAYMENT_AMOUNT, None)? {
                return Ok(Money::from_decimal(amount));
            }
            let (Some(emi), Some(rate)) = (MinimumRepayment.static_emi(ctx)?, interest_rate) else {
                return Ok(Money::ZERO);
            };
            let total = ctx.get_count(PARAM_TOTAL_REPAYMENT_COUNT, None)?;
            let precision = ctx.get_int_or(PARAM_APPLICATION_PRECISION, None, i64::from(FULFILLMENT_PRECISION))?;
            let precision = u32::try_from(precision).unwrap_or(FULFILLMENT_PRECISION);
            calculate_lump_sum(emi, principal, rate.monthly_rate(ctx, effective)?, total, precision)
        }
        AmortizationMethod::DecliningPrincipal | AmortizationMethod::FlatInterest => Ok(Money::ZERO),
    }
}
