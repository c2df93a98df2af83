use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amortization::flat_interest::{calculate_interest_due, calculate_non_accruing_loan_total_interest};
use crate::config::{
    DEFAULT_APPLICATION_PRECISION, PARAM_APPLICATION_PRECISION, PARAM_PRINCIPAL, PARAM_TOTAL_REPAYMENT_COUNT,
};
use crate::context::LoanContext;
use crate::decimal::{round_half_up, Money, Rate, RATE_DECIMAL_PLACES};
use crate::errors::{LoanError, Result};
use crate::interest::fixed::PARAM_FIXED_INTEREST_RATE;
use crate::interest::InterestRate;
use crate::ledger::{
    create_postings, Posting, ACCRUED_INTEREST_RECEIVABLE, DEFAULT_ADDRESS, INTEREST_DUE, INTERNAL_CONTRA,
    PRINCIPAL,
};
use crate::schedule::add_months;
use crate::term::calculate_elapsed_term;

pub const PARAM_INTEREST_RECEIVED_ACCOUNT: &str = "interest_received_account";
pub const DEFAULT_INTEREST_RECEIVED_ACCOUNT: &str = "INTEREST_RECEIVED";

/// interest split between the current instalment and older arrears
///
/// emi interest is what accrued during the last repayment period; anything
/// accrued before that is non-emi interest and does not reduce the principal
/// part of the instalment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestAmounts {
    pub emi_accrued: Money,
    pub emi_rounded_accrued: Money,
    pub non_emi_accrued: Money,
    pub non_emi_rounded_accrued: Money,
    pub total_rounded: Money,
}

/// moves interest from accrual into due balances
pub trait InterestApplication {
    fn application_precision(&self, ctx: &LoanContext<'_>) -> Result<u32> {
        let precision = ctx.get_int_or(
            PARAM_APPLICATION_PRECISION,
            None,
            i64::from(DEFAULT_APPLICATION_PRECISION),
        )?;
        u32::try_from(precision)
            .ok()
            .filter(|p| *p <= 15)
            .ok_or_else(|| LoanError::InvalidParameter {
                name: PARAM_APPLICATION_PRECISION.to_string(),
                message: format!("{precision} outside 0..=15"),
            })
    }

    fn interest_to_apply(
        &self,
        ctx: &LoanContext<'_>,
        effective: DateTime<Utc>,
        previous_application: DateTime<Utc>,
    ) -> Result<InterestAmounts>;

    fn apply_interest(
        &self,
        ctx: &LoanContext<'_>,
        effective: DateTime<Utc>,
        previous_application: DateTime<Utc>,
    ) -> Result<Vec<Posting>>;
}

fn interest_received_account(ctx: &LoanContext<'_>) -> Result<String> {
    Ok(ctx
        .get_optional_text(PARAM_INTEREST_RECEIVED_ACCOUNT, None)?
        .unwrap_or_else(|| DEFAULT_INTEREST_RECEIVED_ACCOUNT.to_string()))
}

/// applies interest accrued daily on the receivable address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccruedInterestApplication;

impl AccruedInterestApplication {
    fn accrued(&self, ctx: &LoanContext<'_>, denomination: &str, at: DateTime<Utc>, precision: u32) -> Result<(Money, Money)> {
        let accrued = ctx.balance(ACCRUED_INTEREST_RECEIVABLE, denomination, Some(at))?;
        Ok((accrued, accrued.round_dp(precision)))
    }
}

impl InterestApplication for AccruedInterestApplication {
    fn interest_to_apply(
        &self,
        ctx: &LoanContext<'_>,
        effective: DateTime<Utc>,
        previous_application: DateTime<Utc>,
    ) -> Result<InterestAmounts> {
        let denomination = ctx.denomination()?;
        let precision = self.application_precision(ctx)?;
        let (effective_unrounded, effective_rounded) = self.accrued(ctx, &denomination, effective, precision)?;

        // interest still accrued from before the last full period is arrears
        let one_period_ago = add_months(effective, -1)?;
        let (old_unrounded, old_rounded) = if one_period_ago < previous_application {
            (Money::ZERO, Money::ZERO)
        } else {
            self.accrued(ctx, &denomination, one_period_ago, precision)?
        };

        Ok(InterestAmounts {
            emi_accrued: effective_unrounded - old_unrounded,
            emi_rounded_accrued: effective_rounded - old_rounded,
            non_emi_accrued: old_unrounded,
            non_emi_rounded_accrued: old_rounded,
            total_rounded: effective_rounded,
        })
    }

    fn apply_interest(
        &self,
        ctx: &LoanContext<'_>,
        effective: DateTime<Utc>,
        previous_application: DateTime<Utc>,
    ) -> Result<Vec<Posting>> {
        let denomination = ctx.denomination()?;
        let income_account = interest_received_account(ctx)?;
        let amounts = self.interest_to_apply(ctx, effective, previous_application)?;

        let mut postings = create_postings(
            amounts.total_rounded,
            ctx.account_id,
            INTEREST_DUE,
            &income_account,
            DEFAULT_ADDRESS,
            &denomination,
        );
        // the full unrounded accrual is reversed, dropping any sub-precision remainder
        postings.extend(create_postings(
            amounts.emi_accrued + amounts.non_emi_accrued,
            ctx.account_id,
            INTERNAL_CONTRA,
            ctx.account_id,
            ACCRUED_INTEREST_RECEIVABLE,
            &denomination,
        ));
        tracing::debug!(
            applied = %amounts.total_rounded,
            non_emi = %amounts.non_emi_rounded_accrued,
            "interest applied"
        );
        Ok(postings)
    }
}

/// applies interest fixed up front on the original principal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlatInterestApplication;

impl InterestApplication for FlatInterestApplication {
    fn interest_to_apply(
        &self,
        ctx: &LoanContext<'_>,
        effective: DateTime<Utc>,
        _previous_application: DateTime<Utc>,
    ) -> Result<InterestAmounts> {
        let precision = self.application_precision(ctx)?;
        let principal = Money::from_decimal(ctx.get_decimal(PARAM_PRINCIPAL, None)?);
        let total_term = ctx.get_count(PARAM_TOTAL_REPAYMENT_COUNT, None)?;
        let annual = Rate::from_decimal(ctx.get_decimal(PARAM_FIXED_INTEREST_RATE, None)?);

        let total_interest = calculate_non_accruing_loan_total_interest(principal, annual, total_term, precision);
        let elapsed = calculate_elapsed_term(ctx, Some(effective))?;
        let remaining = total_term.saturating_sub(elapsed);
        let interest_due = calculate_interest_due(total_interest, total_term, remaining, precision);

        Ok(InterestAmounts {
            emi_rounded_accrued: interest_due,
            total_rounded: interest_due,
            ..InterestAmounts::default()
        })
    }

    fn apply_interest(
        &self,
        ctx: &LoanContext<'_>,
        effective: DateTime<Utc>,
        previous_application: DateTime<Utc>,
    ) -> Result<Vec<Posting>> {
        let denomination = ctx.denomination()?;
        let income_account = interest_received_account(ctx)?;
        let amounts = self.interest_to_apply(ctx, effective, previous_application)?;
        Ok(create_postings(
            amounts.total_rounded,
            ctx.account_id,
            INTEREST_DUE,
            &income_account,
            DEFAULT_ADDRESS,
            &denomination,
        ))
    }
}

/// one day of interest on the outstanding principal
pub fn accrue_daily_interest(
    ctx: &LoanContext<'_>,
    at: DateTime<Utc>,
    rate: &dyn InterestRate,
) -> Result<Vec<Posting>> {
    let denomination = ctx.denomination()?;
    let principal = ctx.balance(PRINCIPAL, &denomination, Some(at))?;
    let daily = rate.daily_rate(ctx, at)?;
    let amount = Money::from_decimal(round_half_up(
        principal.as_decimal() * daily.as_decimal(),
        RATE_DECIMAL_PLACES,
    ));
    tracing::debug!(%principal, %daily, %amount, "daily interest accrued");
    Ok(create_postings(
        amount,
        ctx.account_id,
        ACCRUED_INTEREST_RECEIVABLE,
        ctx.account_id,
        INTERNAL_CONTRA,
        &denomination,
    ))
}
