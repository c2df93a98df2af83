use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::balloon::{PARAM_BALLOON_EMI_AMOUNT, PARAM_BALLOON_PAYMENT_AMOUNT, PARAM_BALLOON_PAYMENT_DAYS_DELTA};
use crate::decimal::Money;
use crate::due_amount::{DUE_AMOUNT_CALCULATION_PREFIX, PARAM_DUE_AMOUNT_CALCULATION_DAY};
use crate::errors::{LoanError, Result};
use crate::interest::application::PARAM_INTEREST_RECEIVED_ACCOUNT;
use crate::interest::fixed::PARAM_FIXED_INTEREST_RATE;
use crate::interest::fixed_to_variable::PARAM_FIXED_INTEREST_TERM;
use crate::interest::variable::{
    PARAM_ANNUAL_INTEREST_RATE_CAP, PARAM_ANNUAL_INTEREST_RATE_FLOOR, PARAM_VARIABLE_INTEREST_RATE,
    PARAM_VARIABLE_RATE_ADJUSTMENT,
};
use crate::interest::PARAM_DAYS_IN_YEAR;
use crate::memory::ParameterStore;
use crate::repayment_holiday::{
    DEFAULT_BLOCKING_FLAG, PARAM_DUE_AMOUNT_CALCULATION_BLOCKING_FLAGS,
    PARAM_REPAYMENT_HOLIDAY_IMPACT_PREFERENCE,
};
use crate::types::{AmortizationMethod, DaysInYear, HolidayImpactPreference};

pub const PARAM_PRINCIPAL: &str = "principal";
pub const PARAM_TOTAL_REPAYMENT_COUNT: &str = "total_repayment_count";
pub const PARAM_DENOMINATION: &str = "denomination";
pub const PARAM_AMORTISATION_METHOD: &str = "amortisation_method";
pub const PARAM_APPLICATION_PRECISION: &str = "application_precision";

pub const DEFAULT_APPLICATION_PRECISION: u32 = 2;
pub const DEFAULT_DUE_AMOUNT_CALCULATION_DAY: u32 = 28;

/// every parameter a loan account is configured with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanParameters {
    pub principal: Money,
    pub total_repayment_count: u32,
    pub denomination: String,
    pub amortisation_method: AmortizationMethod,
    pub interest: InterestConfig,
    pub application_precision: u32,
    pub balloon: BalloonConfig,
    pub repayment_holiday: RepaymentHolidayConfig,
    pub due_schedule: DueScheduleConfig,
    pub interest_received_account: String,
}

/// interest rate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestConfig {
    pub fixed_interest_rate: Option<Decimal>,
    pub variable_interest_rate: Option<Decimal>,
    pub variable_rate_adjustment: Decimal,
    pub annual_interest_rate_cap: Option<Decimal>,
    pub annual_interest_rate_floor: Option<Decimal>,
    pub days_in_year: DaysInYear,
    /// periods on the fixed rate before switching to variable, 0 for never
    pub fixed_interest_term: u32,
}

impl InterestConfig {
    pub fn fixed(annual_rate: Decimal) -> Self {
        Self {
            fixed_interest_rate: Some(annual_rate),
            variable_interest_rate: None,
            variable_rate_adjustment: Decimal::ZERO,
            annual_interest_rate_cap: None,
            annual_interest_rate_floor: None,
            days_in_year: DaysInYear::Actual,
            fixed_interest_term: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BalloonConfig {
    pub payment_days_delta: Option<u32>,
    pub payment_amount: Option<Money>,
    pub emi_amount: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentHolidayConfig {
    pub impact_preference: HolidayImpactPreference,
    pub blocking_flags: Vec<String>,
}

impl Default for RepaymentHolidayConfig {
    fn default() -> Self {
        Self {
            impact_preference: HolidayImpactPreference::IncreaseEmi,
            blocking_flags: vec![DEFAULT_BLOCKING_FLAG.to_string()],
        }
    }
}

/// day and time of the monthly due amount calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueScheduleConfig {
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl Default for DueScheduleConfig {
    fn default() -> Self {
        Self {
            day: DEFAULT_DUE_AMOUNT_CALCULATION_DAY,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

impl LoanParameters {
    fn base(principal: Money, annual_rate: Decimal, term: u32, method: AmortizationMethod) -> Self {
        Self {
            principal,
            total_repayment_count: term,
            denomination: "GBP".to_string(),
            amortisation_method: method,
            interest: InterestConfig::fixed(annual_rate),
            application_precision: DEFAULT_APPLICATION_PRECISION,
            balloon: BalloonConfig::default(),
            repayment_holiday: RepaymentHolidayConfig::default(),
            due_schedule: DueScheduleConfig::default(),
            interest_received_account: "INTEREST_RECEIVED".to_string(),
        }
    }

    /// standard repayment loan
    pub fn declining_principal(principal: Money, annual_rate: Decimal, term: u32) -> Self {
        Self::base(principal, annual_rate, term, AmortizationMethod::DecliningPrincipal)
    }

    pub fn flat_interest(principal: Money, annual_rate: Decimal, term: u32) -> Self {
        Self::base(principal, annual_rate, term, AmortizationMethod::FlatInterest)
    }

    pub fn interest_only(principal: Money, annual_rate: Decimal, term: u32) -> Self {
        Self::base(principal, annual_rate, term, AmortizationMethod::InterestOnly)
    }

    /// reduced instalments with a balloon at term end
    pub fn minimum_repayment(principal: Money, annual_rate: Decimal, term: u32, balloon: BalloonConfig) -> Self {
        Self {
            balloon,
            ..Self::base(principal, annual_rate, term, AmortizationMethod::MinimumRepaymentWithBalloonPayment)
        }
    }

    pub fn no_repayment(principal: Money, annual_rate: Decimal, term: u32) -> Self {
        Self::base(principal, annual_rate, term, AmortizationMethod::NoRepayment)
    }

    pub fn with_denomination(mut self, denomination: &str) -> Self {
        self.denomination = denomination.to_string();
        self
    }

    /// variable rate on `base_rate`, optionally after a fixed period
    pub fn with_variable_rate(mut self, base_rate: Decimal, fixed_interest_term: u32) -> Self {
        self.interest.variable_interest_rate = Some(base_rate);
        self.interest.fixed_interest_term = fixed_interest_term;
        self
    }

    pub fn with_rate_limits(mut self, floor: Option<Decimal>, cap: Option<Decimal>) -> Self {
        self.interest.annual_interest_rate_floor = floor;
        self.interest.annual_interest_rate_cap = cap;
        self
    }

    pub fn with_days_in_year(mut self, days_in_year: DaysInYear) -> Self {
        self.interest.days_in_year = days_in_year;
        self
    }

    pub fn with_holiday_preference(mut self, preference: HolidayImpactPreference) -> Self {
        self.repayment_holiday.impact_preference = preference;
        self
    }

    pub fn with_due_schedule(mut self, due_schedule: DueScheduleConfig) -> Self {
        self.due_schedule = due_schedule;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, message: &str| LoanError::InvalidParameter {
            name: name.to_string(),
            message: message.to_string(),
        };

        if !self.principal.is_positive() {
            return Err(invalid(PARAM_PRINCIPAL, "must be greater than zero"));
        }
        if self.total_repayment_count == 0 {
            return Err(invalid(PARAM_TOTAL_REPAYMENT_COUNT, "must be at least 1"));
        }
        if !(1..=31).contains(&self.due_schedule.day) {
            return Err(invalid(PARAM_DUE_AMOUNT_CALCULATION_DAY, "must be between 1 and 31"));
        }
        if self.due_schedule.hour > 23 || self.due_schedule.minute > 59 || self.due_schedule.second > 59 {
            return Err(invalid(DUE_AMOUNT_CALCULATION_PREFIX, "time of day out of range"));
        }
        if self.balloon.payment_amount.is_some() && self.balloon.emi_amount.is_some() {
            return Err(invalid(
                PARAM_BALLOON_PAYMENT_AMOUNT,
                "cannot be combined with balloon_emi_amount",
            ));
        }
        if self.interest.fixed_interest_rate.is_none() && self.interest.variable_interest_rate.is_none() {
            return Err(invalid(PARAM_FIXED_INTEREST_RATE, "a fixed or variable rate is required"));
        }
        Ok(())
    }

    /// load into a parameter store, effective from `effective_from`
    pub fn into_parameter_store(&self, effective_from: DateTime<Utc>) -> Result<ParameterStore> {
        self.validate()?;

        let mut store = ParameterStore::new();
        let at = effective_from;
        store.set(PARAM_PRINCIPAL, self.principal.as_decimal(), at);
        store.set(PARAM_TOTAL_REPAYMENT_COUNT, Decimal::from(self.total_repayment_count), at);
        store.set(PARAM_DENOMINATION, self.denomination.as_str(), at);
        store.set(PARAM_AMORTISATION_METHOD, self.amortisation_method.as_str(), at);
        store.set(PARAM_APPLICATION_PRECISION, Decimal::from(self.application_precision), at);
        store.set(PARAM_INTEREST_RECEIVED_ACCOUNT, self.interest_received_account.as_str(), at);

        let interest = &self.interest;
        if let Some(rate) = interest.fixed_interest_rate {
            store.set(PARAM_FIXED_INTEREST_RATE, rate, at);
        }
        if let Some(rate) = interest.variable_interest_rate {
            store.set(PARAM_VARIABLE_INTEREST_RATE, rate, at);
        }
        store.set(PARAM_VARIABLE_RATE_ADJUSTMENT, interest.variable_rate_adjustment, at);
        if let Some(cap) = interest.annual_interest_rate_cap {
            store.set(PARAM_ANNUAL_INTEREST_RATE_CAP, cap, at);
        }
        if let Some(floor) = interest.annual_interest_rate_floor {
            store.set(PARAM_ANNUAL_INTEREST_RATE_FLOOR, floor, at);
        }
        store.set(PARAM_DAYS_IN_YEAR, interest.days_in_year.as_str(), at);
        store.set(PARAM_FIXED_INTEREST_TERM, Decimal::from(interest.fixed_interest_term), at);

        if let Some(days) = self.balloon.payment_days_delta {
            store.set(PARAM_BALLOON_PAYMENT_DAYS_DELTA, Decimal::from(days), at);
        }
        if let Some(amount) = self.balloon.payment_amount {
            store.set(PARAM_BALLOON_PAYMENT_AMOUNT, amount.as_decimal(), at);
        }
        if let Some(amount) = self.balloon.emi_amount {
            store.set(PARAM_BALLOON_EMI_AMOUNT, amount.as_decimal(), at);
        }

        store.set(
            PARAM_REPAYMENT_HOLIDAY_IMPACT_PREFERENCE,
            self.repayment_holiday.impact_preference.as_str(),
            at,
        );
        store.set(
            PARAM_DUE_AMOUNT_CALCULATION_BLOCKING_FLAGS,
            serde_json::to_string(&self.repayment_holiday.blocking_flags)?,
            at,
        );

        let schedule = &self.due_schedule;
        store.set(PARAM_DUE_AMOUNT_CALCULATION_DAY, Decimal::from(schedule.day), at);
        store.set(&format!("{DUE_AMOUNT_CALCULATION_PREFIX}_hour"), Decimal::from(schedule.hour), at);
        store.set(&format!("{DUE_AMOUNT_CALCULATION_PREFIX}_minute"), Decimal::from(schedule.minute), at);
        store.set(&format!("{DUE_AMOUNT_CALCULATION_PREFIX}_second"), Decimal::from(schedule.second), at);

        Ok(store)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let parameters: Self = serde_json::from_str(json)?;
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for LoanParameters {
    fn default() -> Self {
        Self::declining_principal(Money::from_major(10_000), dec!(0.05), 12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ParameterValue, ParameterView};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_round_trip_keeps_method_names() {
        let params = LoanParameters::minimum_repayment(
            Money::from_major(10_000),
            dec!(0.12),
            24,
            BalloonConfig {
                payment_amount: Some(Money::from_major(2_000)),
                ..BalloonConfig::default()
            },
        );
        let json = params.to_json().unwrap();
        assert!(json.contains("MINIMUM_REPAYMENT_WITH_BALLOON_PAYMENT"));

        let parsed = LoanParameters::from_json(&json).unwrap();
        assert_eq!(parsed, params);
    }

    #[test]
    fn test_both_balloon_options_rejected() {
        let params = LoanParameters::minimum_repayment(
            Money::from_major(10_000),
            dec!(0.12),
            24,
            BalloonConfig {
                payment_days_delta: None,
                payment_amount: Some(Money::from_major(2_000)),
                emi_amount: Some(Money::from_major(300)),
            },
        );
        assert!(matches!(params.validate(), Err(LoanError::InvalidParameter { .. })));
    }

    #[test]
    fn test_zero_term_rejected() {
        let params = LoanParameters::declining_principal(Money::from_major(1_000), dec!(0.05), 0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_parameter_store_contents() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let store = LoanParameters::flat_interest(Money::from_major(1_000), dec!(0.06), 10)
            .into_parameter_store(at)
            .unwrap();

        assert_eq!(
            store.parameter(PARAM_AMORTISATION_METHOD, None).unwrap(),
            Some(ParameterValue::Text("FLAT_INTEREST".to_string()))
        );
        assert_eq!(
            store.parameter(PARAM_DUE_AMOUNT_CALCULATION_BLOCKING_FLAGS, None).unwrap(),
            Some(ParameterValue::Text(r#"["REPAYMENT_HOLIDAY"]"#.to_string()))
        );
        assert_eq!(store.parameter(PARAM_BALLOON_PAYMENT_AMOUNT, None).unwrap(), None);
    }
}
