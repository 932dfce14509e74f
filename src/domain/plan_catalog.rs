use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use super::entities::plan::Plan;
use super::invoice_token::TOKEN_DELIMITER;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Plan type must not be empty")]
    EmptyPlanType,

    #[error("Plan type {0:?} contains the token delimiter")]
    DelimiterInPlanType(String),

    #[error("Duplicate plan type {0:?}")]
    DuplicatePlanType(String),

    #[error("Plan {0:?} has a negative price")]
    NegativePrice(String),

    #[error("Plan {0:?} has a zero duration")]
    ZeroDuration(String),

    #[error("Catalog must contain at least one plan")]
    Empty,

    #[error("Failed to read plan catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse plan catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Immutable plan table, built once at start-up and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
    index: HashMap<String, usize>,
}

impl PlanCatalog {
    /// Builds a catalog, keeping the given order for listings.
    pub fn new(plans: Vec<Plan>) -> Result<Self, CatalogError> {
        if plans.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut index = HashMap::with_capacity(plans.len());
        for (pos, plan) in plans.iter().enumerate() {
            validate_plan(plan)?;
            if index.insert(plan.plan_type.clone(), pos).is_some() {
                return Err(CatalogError::DuplicatePlanType(plan.plan_type.clone()));
            }
        }

        Ok(Self { plans, index })
    }

    /// Loads a JSON array of plans.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        let plans: Vec<Plan> = serde_json::from_str(&raw)?;
        Self::new(plans)
    }

    pub fn get(&self, plan_type: &str) -> Option<&Plan> {
        self.index.get(plan_type).map(|pos| &self.plans[*pos])
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        let plans = vec![
            default_plan("1_month", "1 Month", Some(1), 100),
            default_plan("3_months", "3 Months", Some(3), 250),
            default_plan("6_months", "6 Months", Some(6), 450),
            default_plan("1_year", "1 Year", Some(12), 800),
            default_plan("lifetime", "Lifetime", None, 2000),
        ];
        let index = plans
            .iter()
            .enumerate()
            .map(|(pos, plan)| (plan.plan_type.clone(), pos))
            .collect();
        Self { plans, index }
    }
}

fn default_plan(plan_type: &str, name: &str, duration_months: Option<u32>, price: i64) -> Plan {
    Plan {
        plan_type: plan_type.to_string(),
        name: name.to_string(),
        duration_months,
        price_units: price,
        features: vec![
            "Unlimited habits".to_string(),
            "Advanced statistics".to_string(),
            "Custom reminders".to_string(),
        ],
    }
}

fn validate_plan(plan: &Plan) -> Result<(), CatalogError> {
    if plan.plan_type.trim().is_empty() {
        return Err(CatalogError::EmptyPlanType);
    }
    if plan.plan_type.contains(TOKEN_DELIMITER) {
        return Err(CatalogError::DelimiterInPlanType(plan.plan_type.clone()));
    }
    if plan.price_units < 0 {
        return Err(CatalogError::NegativePrice(plan.plan_type.clone()));
    }
    if plan.duration_months == Some(0) {
        return Err(CatalogError::ZeroDuration(plan.plan_type.clone()));
    }
    Ok(())
}
