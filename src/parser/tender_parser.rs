// Portal-specific row extraction
use crate::config::PortalConfig;
use crate::model::{ExtractError, Offer};
use crate::normalizer::{single_line, strip_label};
use crate::scraper::RowHandle;
use crate::utils::fingerprint;

/// Turns result rows into offers. Scoring happens later.
pub struct TenderExtractor {
    reference: String,
    object: String,
    object_label: String,
    buyer: String,
    buyer_label: String,
    deadline: String,
    action_link: String,
    link_base: String,
    search_url: String,
}

impl TenderExtractor {
    pub fn new(portal: &PortalConfig) -> Self {
        let s = &portal.selectors;
        Self {
            reference: s.reference.clone(),
            object: s.object.clone(),
            object_label: s.object_label.clone(),
            buyer: s.buyer.clone(),
            buyer_label: s.buyer_label.clone(),
            deadline: s.deadline.clone(),
            action_link: s.action_link.clone(),
            link_base: portal.link_base.clone(),
            search_url: portal.search_url.clone(),
        }
    }

    /// Hash of the row's full rendered text.
    pub async fn fingerprint(&self, row: &dyn RowHandle) -> Result<String, ExtractError> {
        let text = row.inner_text().await?;
        if text.trim().is_empty() {
            return Err(ExtractError::EmptyRow);
        }
        Ok(fingerprint(&text))
    }

    pub async fn extract(
        &self,
        row: &dyn RowHandle,
        fingerprint: String,
    ) -> Result<Offer, ExtractError> {
        let reference = row.text_of(&self.reference).await?.map(|t| t.trim().to_string());
        let object_text = row
            .text_of(&self.object)
            .await?
            .map(|t| strip_label(&t, &self.object_label));
        let buyer = row.text_of(&self.buyer).await?.map(|t| strip_label(&t, &self.buyer_label));
        let deadline = row.text_of(&self.deadline).await?.map(|t| single_line(&t));
        let href = row.attr_of(&self.action_link, "href").await?;

        Ok(Offer {
            fingerprint,
            reference: reference.unwrap_or_default(),
            buyer: buyer.unwrap_or_default(),
            object_text: object_text.unwrap_or_default(),
            deadline: deadline.unwrap_or_default(),
            link: self.resolve_link(href.as_deref()),
            verdict: None,
        })
    }

    fn resolve_link(&self, href: Option<&str>) -> String {
        match href.map(str::trim).filter(|h| !h.is_empty()) {
            Some(href) if href.starts_with("http://") || href.starts_with("https://") => {
                href.to_string()
            }
            Some(href) => format!("{}{}", self.link_base, href),
            None => self.search_url.clone(),
        }
    }
}
