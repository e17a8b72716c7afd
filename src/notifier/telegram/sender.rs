// notifier/telegram/sender.rs

use crate::model::NotifyError;
use crate::notifier::telegram::TelegramNotifier;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Form parameters of a `sendMessage` call.
pub fn message_params(chat_id: &str, text: &str) -> [(&'static str, String); 4] {
    [
        ("chat_id", chat_id.to_string()),
        ("text", text.to_string()),
        ("parse_mode", "Markdown".to_string()),
        ("disable_web_page_preview", "true".to_string()),
    ]
}

/// Sends a Markdown message with link previews disabled.
pub async fn send_markdown(
    notifier: &TelegramNotifier,
    chat_id: &str,
    text: &str,
) -> Result<(), NotifyError> {
    if notifier.bot_token.is_empty() || chat_id.is_empty() {
        return Err(NotifyError::ApiError("missing bot token or chat id".into()));
    }

    let url = notifier.send_message_url();
    debug!("📤 Sending Telegram message to {}:\n{}", chat_id, text);
    let response = match timeout(
        Duration::from_secs(10),
        notifier.client.post(&url).form(&message_params(chat_id, text)).send(),
    )
    .await
    {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
            // the URL carries the bot token
            let e = e.without_url();
            warn!("❌ Telegram send() failed: {}", e);
            return Err(NotifyError::ApiError(format!("Send failed: {}", e)));
        }
        Err(_) => {
            warn!("⏳ Telegram send() timed out");
            return Err(NotifyError::Unreachable);
        }
    };

    let status = response.status();
    let body = response.text().await.unwrap_or_else(|_| "unknown".into());
    if !status.is_success() {
        warn!("❌ Telegram API responded [{}]: {}", status, body);
        return Err(NotifyError::Rejected { status: status.as_u16(), body });
    }
    debug!("✅ Telegram response [{}]: {}", status, body);
    Ok(())
}
