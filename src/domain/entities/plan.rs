use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

/// A purchasable premium plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_type: String,
    pub name: String,
    /// `None` means the grant never expires.
    pub duration_months: Option<u32>,
    pub price_units: i64,
    #[serde(default)]
    pub features: Vec<String>,
}

impl Plan {
    pub fn is_lifetime(&self) -> bool {
        self.duration_months.is_none()
    }

    /// Expiry of a grant of this plan that starts at `start`.
    pub fn expires_at_from(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.duration_months
            .and_then(|months| start.checked_add_months(Months::new(months)))
    }
}
