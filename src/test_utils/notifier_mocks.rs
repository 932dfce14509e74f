//! Recording notifier.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::notifier::{Notification, Notifier},
    domain::entities::user::UserId,
};

#[derive(Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<(UserId, Notification)>>,
    fail: bool,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send fails and nothing is recorded.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(UserId, Notification)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, user_id: UserId, notification: &Notification) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Internal("notifier unavailable".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((user_id, notification.clone()));
        Ok(())
    }
}
