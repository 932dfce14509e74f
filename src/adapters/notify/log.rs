use async_trait::async_trait;

use crate::{
    app_error::AppResult,
    domain::entities::user::UserId,
    ports::notifier::{Notification, Notifier},
};

/// Fallback sink when no bot token is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: UserId, notification: &Notification) -> AppResult<()> {
        tracing::info!(
            user_id = %user_id,
            kind = notification.kind(),
            text = %notification.render(),
            "Notification (log only)"
        );
        Ok(())
    }
}
