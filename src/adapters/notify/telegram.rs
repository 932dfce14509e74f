use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::user::UserId,
    ports::notifier::{Notification, Notifier},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Sends notifications as Telegram bot messages. The chat id is the user id.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    bot_token: SecretString,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: SecretString, api_base: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            bot_token,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }
}

#[derive(Serialize)]
struct SendMessageReq<'a> {
    chat_id: i64,
    text: &'a str,
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, user_id: UserId, notification: &Notification) -> AppResult<()> {
        let text = notification.render();
        let body = SendMessageReq {
            chat_id: user_id.as_i64(),
            text: &text,
        };
        // The URL embeds the bot token, so only the status is logged.
        self.client
            .post(self.send_message_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Telegram request failed: {}", e.without_url())))?
            .error_for_status()
            .map_err(|e| {
                AppError::Internal(format!(
                    "Telegram rejected message: {}",
                    e.status().map(|s| s.to_string()).unwrap_or_default()
                ))
            })?;

        tracing::debug!(user_id = %user_id, kind = notification.kind(), "Telegram notification sent");
        Ok(())
    }
}
