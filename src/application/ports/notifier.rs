use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{app_error::AppResult, domain::entities::user::UserId};

// ============================================================================
// Port Types
// ============================================================================

/// User-facing messages sent after a state change has committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Activated {
        plan_name: String,
        expires_at: Option<DateTime<Utc>>,
    },
    Cancelled {
        plan_name: String,
    },
    Expired {
        plan_name: String,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Activated { .. } => "activated",
            Notification::Cancelled { .. } => "cancelled",
            Notification::Expired { .. } => "expired",
        }
    }

    pub fn render(&self) -> String {
        match self {
            Notification::Activated {
                plan_name,
                expires_at: Some(expires_at),
            } => format!(
                "Premium activated: {}. Valid until {}.",
                plan_name,
                expires_at.format("%Y-%m-%d")
            ),
            Notification::Activated {
                plan_name,
                expires_at: None,
            } => format!("Premium activated: {}. It never expires.", plan_name),
            Notification::Cancelled { plan_name } => format!(
                "Your {} subscription was cancelled. Habits over the free limit are now locked.",
                plan_name
            ),
            Notification::Expired { plan_name } => format!(
                "Your {} subscription has expired. Renew to unlock your premium habits.",
                plan_name
            ),
        }
    }
}

// ============================================================================
// Port Trait
// ============================================================================

/// Outbound message sink. Delivery is best-effort; callers log failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: UserId, notification: &Notification) -> AppResult<()>;
}
