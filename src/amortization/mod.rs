pub mod declining_principal;
pub mod flat_interest;
pub mod interest_only;
pub mod minimum_repayment;
pub mod no_repayment;

use chrono::{DateTime, Utc};

use crate::config::PARAM_AMORTISATION_METHOD;
use crate::context::LoanContext;
use crate::decimal::{Money, Rate};
use crate::errors::Result;
use crate::interest::InterestRate;
use crate::types::{AmortizationMethod, TermDetails};

pub use declining_principal::DecliningPrincipal;
pub use flat_interest::FlatInterest;
pub use interest_only::InterestOnly;
pub use minimum_repayment::MinimumRepayment;
pub use no_repayment::NoRepayment;

/// signed contribution to the principal that gets amortised
pub trait PrincipalAdjustment {
    fn name(&self) -> &str;

    fn calculate_principal_adjustment(
        &self,
        ctx: &LoanContext<'_>,
        denomination: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Money>;
}

/// adjustment equal to the net balance of one address, e.g. capitalised fees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceAdjustment {
    pub name: String,
    pub address: String,
}

impl BalanceAdjustment {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
        }
    }
}

impl PrincipalAdjustment for BalanceAdjustment {
    fn name(&self) -> &str {
        &self.name
    }

    fn calculate_principal_adjustment(
        &self,
        ctx: &LoanContext<'_>,
        denomination: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Money> {
        ctx.balance(&self.address, denomination, at)
    }
}

/// inputs shared by instalment and term calculations
#[derive(Clone, Copy)]
pub struct AmortizationInputs<'a> {
    pub effective: DateTime<Utc>,
    /// ignore repayment pace and use the original term minus elapsed
    pub use_expected_term: bool,
    /// principal to amortise, the `principal` parameter when None
    pub principal: Option<Money>,
    pub interest_rate: Option<&'a dyn InterestRate>,
    pub adjustments: &'a [&'a dyn PrincipalAdjustment],
}

impl<'a> AmortizationInputs<'a> {
    pub fn at(effective: DateTime<Utc>) -> Self {
        Self {
            effective,
            use_expected_term: true,
            principal: None,
            interest_rate: None,
            adjustments: &[],
        }
    }

    pub fn use_expected_term(mut self, use_expected_term: bool) -> Self {
        self.use_expected_term = use_expected_term;
        self
    }

    pub fn principal(mut self, principal: Money) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn interest_rate(mut self, rate: &'a dyn InterestRate) -> Self {
        self.interest_rate = Some(rate);
        self
    }

    pub fn adjustments(mut self, adjustments: &'a [&'a dyn PrincipalAdjustment]) -> Self {
        self.adjustments = adjustments;
        self
    }

    /// monthly rate at the effective instant, zero without a rate feature
    pub fn monthly_rate(&self, ctx: &LoanContext<'_>) -> Result<Rate> {
        match self.interest_rate {
            Some(rate) => rate.monthly_rate(ctx, self.effective),
            None => Ok(Rate::ZERO),
        }
    }

    /// sum of every principal adjustment as of the effective instant
    pub fn total_adjustment(&self, ctx: &LoanContext<'_>, denomination: &str) -> Result<Money> {
        let mut total = Money::ZERO;
        for adjustment in self.adjustments {
            total += adjustment.calculate_principal_adjustment(ctx, denomination, Some(self.effective))?;
        }
        Ok(total)
    }

    /// explicit principal or the `principal` parameter, plus adjustments
    pub fn adjusted_principal(&self, ctx: &LoanContext<'_>) -> Result<Money> {
        let principal = match self.principal {
            Some(principal) => principal,
            None => Money::from_decimal(ctx.get_decimal(crate::config::PARAM_PRINCIPAL, None)?),
        };
        if self.adjustments.is_empty() {
            return Ok(principal);
        }
        let denomination = ctx.denomination()?;
        Ok(principal + self.total_adjustment(ctx, &denomination)?)
    }
}

/// amortisation strategy selected per loan
pub trait Amortization {
    fn method(&self) -> AmortizationMethod;

    /// the final due event leaves principal to a balloon event
    fn override_final_event(&self) -> bool;

    fn calculate_emi(&self, ctx: &LoanContext<'_>, inputs: &AmortizationInputs<'_>) -> Result<Money>;

    fn term_details(&self, ctx: &LoanContext<'_>, inputs: &AmortizationInputs<'_>) -> Result<TermDetails>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmortizationFeature {
    DecliningPrincipal(DecliningPrincipal),
    FlatInterest(FlatInterest),
    InterestOnly(InterestOnly),
    MinimumRepayment(MinimumRepayment),
    NoRepayment(NoRepayment),
}

impl AmortizationFeature {
    pub fn for_method(method: AmortizationMethod) -> Self {
        match method {
            AmortizationMethod::DecliningPrincipal => AmortizationFeature::DecliningPrincipal(DecliningPrincipal),
            AmortizationMethod::FlatInterest => AmortizationFeature::FlatInterest(FlatInterest),
            AmortizationMethod::InterestOnly => AmortizationFeature::InterestOnly(InterestOnly),
            AmortizationMethod::MinimumRepaymentWithBalloonPayment => {
                AmortizationFeature::MinimumRepayment(MinimumRepayment)
            }
            AmortizationMethod::NoRepayment => AmortizationFeature::NoRepayment(NoRepayment),
        }
    }

    /// strategy named by the `amortisation_method` parameter
    ///
    /// an unknown method is a configuration error, never a silent default
    pub fn from_parameters(ctx: &LoanContext<'_>) -> Result<Self> {
        let method: AmortizationMethod = amortisation_method(ctx)?;
        Ok(Self::for_method(method))
    }

    fn inner(&self) -> &dyn Amortization {
        match self {
            AmortizationFeature::DecliningPrincipal(a) => a,
            AmortizationFeature::FlatInterest(a) => a,
            AmortizationFeature::InterestOnly(a) => a,
            AmortizationFeature::MinimumRepayment(a) => a,
            AmortizationFeature::NoRepayment(a) => a,
        }
    }
}

pub fn amortisation_method(ctx: &LoanContext<'_>) -> Result<AmortizationMethod> {
    ctx.get_union_key(PARAM_AMORTISATION_METHOD, None)?.parse()
}

impl Amortization for AmortizationFeature {
    fn method(&self) -> AmortizationMethod {
        self.inner().method()
    }

    fn override_final_event(&self) -> bool {
        self.inner().override_final_event()
    }

    fn calculate_emi(&self, ctx: &LoanContext<'_>, inputs: &AmortizationInputs<'_>) -> Result<Money> {
        let emi = self.inner().calculate_emi(ctx, inputs)?;
        tracing::debug!(method = %self.method(), %emi, "emi calculated");
        Ok(emi)
    }

    fn term_details(&self, ctx: &LoanContext<'_>, inputs: &AmortizationInputs<'_>) -> Result<TermDetails> {
        self.inner().term_details(ctx, inputs)
    }
}
