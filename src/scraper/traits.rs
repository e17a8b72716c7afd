use crate::model::BrowserError;
use std::time::Duration;

/// Page automation capability the pagination controller drives.
#[async_trait::async_trait]
pub trait Browser: Send + Sync {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError>;
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError>;
    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), BrowserError>;
    async fn click(&mut self, selector: &str) -> Result<(), BrowserError>;
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError>;
    async fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<(), BrowserError>;
    /// Text of the first element matching `selector`, `None` when absent.
    async fn text(&self, selector: &str) -> Result<Option<String>, BrowserError>;
    async fn rows(&self, selector: &str) -> Result<Vec<Box<dyn RowHandle>>, BrowserError>;
    async fn close(&mut self) {}
}

/// One result row.
#[async_trait::async_trait]
pub trait RowHandle: Send + Sync {
    async fn inner_text(&self) -> Result<String, BrowserError>;
    async fn is_visible(&self) -> Result<bool, BrowserError>;
    /// Text of the first descendant matching `selector`.
    async fn text_of(&self, selector: &str) -> Result<Option<String>, BrowserError>;
    /// Attribute of the first descendant matching `selector`.
    async fn attr_of(&self, selector: &str, attr: &str) -> Result<Option<String>, BrowserError>;
}

/// Opens a fresh browser session for each scan attempt.
#[async_trait::async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Browser>, BrowserError>;
}
