pub mod sender;

use crate::model::NotifyError;
use crate::notifier::Messenger;
use reqwest::Client;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    pub bot_token: String,
    pub api_base: String,
    pub client: Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: String) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::ApiError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            bot_token,
            api_base: DEFAULT_API_BASE.to_string(),
            client,
        })
    }

    pub fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait::async_trait]
impl Messenger for TelegramNotifier {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), NotifyError> {
        sender::send_markdown(self, recipient, text).await
    }
}
