use std::fmt::Display;

use chrono::{DateTime, Datelike, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    #[default]
    Month,
    Year,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }

    /// Anything other than an explicit `year` bills monthly.
    pub fn from_metadata(value: Option<&str>) -> Self {
        match value {
            Some("year") => BillingInterval::Year,
            _ => BillingInterval::Month,
        }
    }

    fn months(&self) -> Months {
        match self {
            BillingInterval::Month => Months::new(1),
            BillingInterval::Year => Months::new(12),
        }
    }

    /// End of a billing period starting at `starts_at`.
    ///
    /// The day of month is kept; when the target month is too short the
    /// spare days overflow into the next one, so Jan 31 ends on Mar 3
    /// (Mar 2 in a leap year) and a yearly Feb 29 start ends on Mar 1.
    pub fn period_end(&self, starts_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let month_start = starts_at.with_day(1)?.checked_add_months(self.months())?;
        month_start.checked_add_signed(Duration::days(i64::from(starts_at.day0())))
    }
}

impl Display for BillingInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
