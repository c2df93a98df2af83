use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::LoanError;

/// identifier of a loan account in the ledger
pub type AccountId = String;

/// amortization method selected per loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmortizationMethod {
    /// equal instalments, interest on the declining balance
    DecliningPrincipal,
    /// interest fixed up front on the original principal
    FlatInterest,
    /// interest only, principal settled by a balloon event
    InterestOnly,
    /// reduced instalments with a balloon at term end
    MinimumRepaymentWithBalloonPayment,
    /// nothing due until the balloon event
    NoRepayment,
}

impl AmortizationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmortizationMethod::DecliningPrincipal => "DECLINING_PRINCIPAL",
            AmortizationMethod::FlatInterest => "FLAT_INTEREST",
            AmortizationMethod::InterestOnly => "INTEREST_ONLY",
            AmortizationMethod::MinimumRepaymentWithBalloonPayment => {
                "MINIMUM_REPAYMENT_WITH_BALLOON_PAYMENT"
            }
            AmortizationMethod::NoRepayment => "NO_REPAYMENT",
        }
    }

    /// settled by a terminal balloon event
    pub fn is_balloon(&self) -> bool {
        matches!(
            self,
            AmortizationMethod::InterestOnly
                | AmortizationMethod::MinimumRepaymentWithBalloonPayment
                | AmortizationMethod::NoRepayment
        )
    }
}

impl fmt::Display for AmortizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AmortizationMethod {
    type Err = LoanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DECLINING_PRINCIPAL" => Ok(AmortizationMethod::DecliningPrincipal),
            "FLAT_INTEREST" => Ok(AmortizationMethod::FlatInterest),
            "INTEREST_ONLY" => Ok(AmortizationMethod::InterestOnly),
            "MINIMUM_REPAYMENT_WITH_BALLOON_PAYMENT" => {
                Ok(AmortizationMethod::MinimumRepaymentWithBalloonPayment)
            }
            "NO_REPAYMENT" => Ok(AmortizationMethod::NoRepayment),
            _ => Err(LoanError::UnknownAmortizationMethod {
                method: s.to_string(),
            }),
        }
    }
}

/// day count basis for daily rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaysInYear {
    Days360,
    Days365,
    Days366,
    /// 366 in leap years, 365 otherwise
    Actual,
}

impl DaysInYear {
    /// unsupported conventions resolve to `Actual`
    pub fn parse_or_actual(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "360" => DaysInYear::Days360,
            "365" => DaysInYear::Days365,
            "366" => DaysInYear::Days366,
            "actual" => DaysInYear::Actual,
            other => {
                tracing::warn!(convention = other, "unsupported days_in_year, using actual");
                DaysInYear::Actual
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DaysInYear::Days360 => "360",
            DaysInYear::Days365 => "365",
            DaysInYear::Days366 => "366",
            DaysInYear::Actual => "actual",
        }
    }

    pub fn days(&self, at: DateTime<Utc>) -> u32 {
        match self {
            DaysInYear::Days360 => 360,
            DaysInYear::Days365 => 365,
            DaysInYear::Days366 => 366,
            DaysInYear::Actual => {
                if is_leap_year(at.year()) {
                    366
                } else {
                    365
                }
            }
        }
    }
}

impl Default for DaysInYear {
    fn default() -> Self {
        DaysInYear::Actual
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

/// what happens to the loan once a repayment holiday ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayImpactPreference {
    /// keep the term, recompute the instalment
    IncreaseEmi,
    /// keep the instalment, the term grows
    IncreaseTerm,
}

impl HolidayImpactPreference {
    /// lenient parse for stored parameters, only `increase_emi` raises the instalment
    pub fn parse_or_increase_term(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(preference = value, "unsupported repayment holiday impact preference, keeping the instalment");
            HolidayImpactPreference::IncreaseTerm
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HolidayImpactPreference::IncreaseEmi => "increase_emi",
            HolidayImpactPreference::IncreaseTerm => "increase_term",
        }
    }
}

impl FromStr for HolidayImpactPreference {
    type Err = LoanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "increase_emi" => Ok(HolidayImpactPreference::IncreaseEmi),
            "increase_term" => Ok(HolidayImpactPreference::IncreaseTerm),
            other => Err(LoanError::InvalidParameter {
                name: "repayment_holiday_impact_preference".to_string(),
                message: format!("unsupported value {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReamortizationReason {
    RateChanged,
    HolidayEnded,
    RegimeTransition,
}

/// outcome of the reamortization rule table for one period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReamortizationDecision {
    pub should_trigger: bool,
    pub reason: Option<ReamortizationReason>,
}

impl ReamortizationDecision {
    pub fn none() -> Self {
        Self {
            should_trigger: false,
            reason: None,
        }
    }

    pub fn triggered(reason: ReamortizationReason) -> Self {
        Self {
            should_trigger: true,
            reason: Some(reason),
        }
    }
}

/// lifecycle phase of a loan account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanPhase {
    /// no disbursement booked yet
    PreActivation,
    /// principal outstanding, nothing due
    Accruing,
    /// amounts due and awaiting repayment
    DuePosted,
    /// all principal has moved to due
    FinalDuePosted,
    /// balances reconciled to zero
    Closed,
}

/// elapsed and remaining due periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermDetails {
    pub elapsed: u32,
    pub remaining: u32,
}

impl TermDetails {
    pub fn new(elapsed: u32, remaining: u32) -> Self {
        Self { elapsed, remaining }
    }

    pub fn is_final_period(&self) -> bool {
        self.remaining == 1
    }
}
