use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::PARAM_DENOMINATION;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::ledger::BalanceCoordinate;

/// read access to net balances
pub trait LedgerView {
    /// net balance (debit minus credit) of a coordinate, as of `at` or latest
    fn balance(
        &self,
        account_id: &str,
        coordinate: &BalanceCoordinate,
        at: Option<DateTime<Utc>>,
    ) -> Result<Money>;
}

/// raw parameter value as stored by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterValue {
    Number(Decimal),
    Text(String),
    Date(DateTime<Utc>),
}

impl From<Decimal> for ParameterValue {
    fn from(d: Decimal) -> Self {
        ParameterValue::Number(d)
    }
}

impl From<&str> for ParameterValue {
    fn from(s: &str) -> Self {
        ParameterValue::Text(s.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(s: String) -> Self {
        ParameterValue::Text(s)
    }
}

/// time-indexed parameter lookups
pub trait ParameterView {
    /// value in force at `at`, latest when `at` is None
    fn parameter(&self, name: &str, at: Option<DateTime<Utc>>) -> Result<Option<ParameterValue>>;

    /// every change of the parameter, oldest first
    fn parameter_timeseries(&self, name: &str) -> Result<Vec<(DateTime<Utc>, ParameterValue)>>;
}

/// account metadata owned by the scheduling host
pub trait AccountHistory {
    fn account_creation_datetime(&self) -> DateTime<Utc>;

    fn last_execution_datetime(&self, event_type: &str) -> Option<DateTime<Utc>>;

    fn is_flag_active(&self, flag: &str, at: DateTime<Utc>) -> bool;
}

/// everything a calculation may read about one loan account
#[derive(Clone, Copy)]
pub struct LoanContext<'a> {
    pub account_id: &'a str,
    pub ledger: &'a dyn LedgerView,
    pub parameters: &'a dyn ParameterView,
    pub history: &'a dyn AccountHistory,
}

impl<'a> LoanContext<'a> {
    pub fn new(
        account_id: &'a str,
        ledger: &'a dyn LedgerView,
        parameters: &'a dyn ParameterView,
        history: &'a dyn AccountHistory,
    ) -> Self {
        Self {
            account_id,
            ledger,
            parameters,
            history,
        }
    }

    pub fn creation_datetime(&self) -> DateTime<Utc> {
        self.history.account_creation_datetime()
    }

    pub fn last_execution_datetime(&self, event_type: &str) -> Option<DateTime<Utc>> {
        self.history.last_execution_datetime(event_type)
    }

    pub fn denomination(&self) -> Result<String> {
        self.get_text(PARAM_DENOMINATION, None)
    }

    /// committed net balance of an address on this account
    pub fn balance(&self, address: &str, denomination: &str, at: Option<DateTime<Utc>>) -> Result<Money> {
        self.ledger
            .balance(self.account_id, &BalanceCoordinate::committed(address, denomination), at)
    }

    fn raw(&self, name: &str, at: Option<DateTime<Utc>>) -> Result<ParameterValue> {
        self.parameters
            .parameter(name, at)?
            .ok_or_else(|| LoanError::MissingParameter {
                name: name.to_string(),
            })
    }

    pub fn get_decimal(&self, name: &str, at: Option<DateTime<Utc>>) -> Result<Decimal> {
        coerce_decimal(name, &self.raw(name, at)?)
    }

    pub fn get_optional_decimal(&self, name: &str, at: Option<DateTime<Utc>>) -> Result<Option<Decimal>> {
        match self.parameters.parameter(name, at)? {
            Some(value) => coerce_decimal(name, &value).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_decimal_or(&self, name: &str, at: Option<DateTime<Utc>>, default: Decimal) -> Result<Decimal> {
        Ok(self.get_optional_decimal(name, at)?.unwrap_or(default))
    }

    pub fn get_int(&self, name: &str, at: Option<DateTime<Utc>>) -> Result<i64> {
        let value = self.get_decimal(name, at)?;
        to_int(name, value)
    }

    pub fn get_int_or(&self, name: &str, at: Option<DateTime<Utc>>, default: i64) -> Result<i64> {
        match self.get_optional_decimal(name, at)? {
            Some(value) => to_int(name, value),
            None => Ok(default),
        }
    }

    /// non-negative integer such as a term count
    pub fn get_count(&self, name: &str, at: Option<DateTime<Utc>>) -> Result<u32> {
        let value = self.get_int(name, at)?;
        u32::try_from(value).map_err(|_| LoanError::InvalidParameter {
            name: name.to_string(),
            message: format!("expected a non-negative count, got {value}"),
        })
    }

    pub fn get_text(&self, name: &str, at: Option<DateTime<Utc>>) -> Result<String> {
        match self.raw(name, at)? {
            ParameterValue::Text(s) => Ok(s),
            ParameterValue::Number(d) => Ok(d.to_string()),
            ParameterValue::Date(dt) => Ok(dt.to_rfc3339()),
        }
    }

    pub fn get_optional_text(&self, name: &str, at: Option<DateTime<Utc>>) -> Result<Option<String>> {
        if self.parameters.parameter(name, at)?.is_none() {
            return Ok(None);
        }
        self.get_text(name, at).map(Some)
    }

    /// key of a union (enumerated) parameter
    pub fn get_union_key(&self, name: &str, at: Option<DateTime<Utc>>) -> Result<String> {
        self.get_text(name, at)
    }

    /// json encoded parameter, None when unset
    pub fn get_json<T: DeserializeOwned>(&self, name: &str, at: Option<DateTime<Utc>>) -> Result<Option<T>> {
        match self.get_optional_text(name, at)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_date(&self, name: &str, at: Option<DateTime<Utc>>) -> Result<DateTime<Utc>> {
        match self.raw(name, at)? {
            ParameterValue::Date(dt) => Ok(dt),
            ParameterValue::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| LoanError::InvalidParameter {
                    name: name.to_string(),
                    message: e.to_string(),
                }),
            ParameterValue::Number(_) => Err(LoanError::InvalidParameter {
                name: name.to_string(),
                message: "expected a date".to_string(),
            }),
        }
    }

    /// hour, minute and second parameters sharing `prefix`
    pub fn schedule_time(&self, prefix: &str) -> Result<(u32, u32, u32)> {
        let hour = self.get_int_or(&format!("{prefix}_hour"), None, 0)?;
        let minute = self.get_int_or(&format!("{prefix}_minute"), None, 0)?;
        let second = self.get_int_or(&format!("{prefix}_second"), None, 0)?;
        let check = |name: &str, value: i64, max: i64| -> Result<u32> {
            if (0..=max).contains(&value) {
                Ok(value as u32)
            } else {
                Err(LoanError::InvalidParameter {
                    name: format!("{prefix}_{name}"),
                    message: format!("{value} outside 0..={max}"),
                })
            }
        };
        Ok((check("hour", hour, 23)?, check("minute", minute, 59)?, check("second", second, 59)?))
    }
}

fn coerce_decimal(name: &str, value: &ParameterValue) -> Result<Decimal> {
    match value {
        ParameterValue::Number(d) => Ok(*d),
        ParameterValue::Text(s) => Decimal::from_str(s.trim()).map_err(|e| LoanError::InvalidParameter {
            name: name.to_string(),
            message: e.to_string(),
        }),
        ParameterValue::Date(_) => Err(LoanError::InvalidParameter {
            name: name.to_string(),
            message: "expected a number".to_string(),
        }),
    }
}

fn to_int(name: &str, value: Decimal) -> Result<i64> {
    if !value.fract().is_zero() {
        return Err(LoanError::InvalidParameter {
            name: name.to_string(),
            message: format!("expected an integer, got {value}"),
        });
    }
    value.to_i64().ok_or_else(|| LoanError::InvalidParameter {
        name: name.to_string(),
        message: format!("{value} out of range"),
    })
}
