pub mod dispatcher;
pub mod telegram;

use crate::model::NotifyError;

pub use dispatcher::AlertDispatcher;
pub use telegram::TelegramNotifier;

/// Delivers a formatted text to one recipient.
#[async_trait::async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), NotifyError>;
}
