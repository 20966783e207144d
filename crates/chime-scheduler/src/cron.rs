//! Six-field cron expression translation.
//!
//! Wire format: `second minute hour day month day_of_week`, whitespace
//! separated. A `?` token means the field is unconstrained; any other token
//! is kept verbatim and interpreted by the `cron` crate when the schedule
//! is compiled (`*/5`, `1-5`, `MON-FRI`, ...).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Number of fields in the cron wire format.
pub const CRON_FIELD_COUNT: usize = 6;

/// Structured cron schedule. Absent fields are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSchedule {
    pub second: Option<String>,
    pub minute: Option<String>,
    pub hour: Option<String>,
    pub day: Option<String>,
    pub month: Option<String>,
    pub day_of_week: Option<String>,
}

impl CronSchedule {
    /// Translate a cron expression into a structured schedule.
    ///
    /// An absent expression yields the empty (fully unconstrained) schedule.
    /// Validation is not separable from translation: a wrong field count
    /// fails here, before any field is interpreted.
    pub fn parse(expression: Option<&str>) -> Result<Self, SchedulerError> {
        let Some(expression) = expression else {
            return Ok(Self::default());
        };

        validate(expression)?;

        let mut tokens = expression.split_whitespace();
        let mut field = || {
            tokens
                .next()
                .filter(|t| *t != "?")
                .map(|t| t.to_string())
        };

        Ok(Self {
            second: field(),
            minute: field(),
            hour: field(),
            day: field(),
            month: field(),
            day_of_week: field(),
        })
    }

    /// Whether every field is unconstrained.
    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }

    /// Render back to a six-field expression, absent fields as `*`.
    pub fn to_expression(&self) -> String {
        let star = |f: &Option<String>| f.clone().unwrap_or_else(|| "*".to_string());
        format!(
            "{} {} {} {} {} {}",
            star(&self.second),
            star(&self.minute),
            star(&self.hour),
            star(&self.day),
            star(&self.month),
            star(&self.day_of_week),
        )
    }

    /// Compile into an evaluatable schedule.
    pub fn compile(&self) -> Result<cron::Schedule, SchedulerError> {
        let expression = self.to_expression();
        cron::Schedule::from_str(&expression).map_err(|source| SchedulerError::CronParse {
            expression,
            source,
        })
    }
}

/// Check that an expression has exactly six whitespace-separated fields.
pub fn validate(expression: &str) -> Result<(), SchedulerError> {
    let found = expression.split_whitespace().count();
    if found != CRON_FIELD_COUNT {
        return Err(SchedulerError::CronFieldCount {
            expression: expression.to_string(),
            found,
        });
    }
    Ok(())
}
