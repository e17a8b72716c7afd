use crate::config::Subscriber;
use crate::model::Offer;
use crate::notifier::Messenger;
use std::sync::Arc;
use tracing::{info, warn};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Fingerprints of every offer sent to at least one recipient.
    pub dispatched: Vec<String>,
    pub delivered: usize,
    pub failed: usize,
}

/// Formats offers and pushes them to subscribers.
pub struct AlertDispatcher {
    messenger: Arc<dyn Messenger>,
    subscribers: Vec<Subscriber>,
}

impl AlertDispatcher {
    pub fn new(messenger: Arc<dyn Messenger>, subscribers: Vec<Subscriber>) -> Self {
        Self { messenger, subscribers }
    }

    /// Best-effort delivery of one offer. Failures are logged only.
    pub async fn dispatch(&self, recipient: &str, offer: &Offer) -> bool {
        let text = format_alert(offer);
        match self.messenger.send(recipient, &text).await {
            Ok(()) => true,
            Err(e) => {
                warn!("❌ Alert for {} not delivered to {}: {}", offer.fingerprint, recipient, e);
                false
            }
        }
    }

    /// Sends offers, in the given order, to every subscriber whose filter
    /// accepts their category.
    pub async fn dispatch_all(&self, offers: &[Offer]) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        for offer in offers {
            let category = offer.category();
            let mut sent = false;
            let recipients = self.subscribers.iter().filter(|s| s.subscriptions.accepts(&category));
            for subscriber in recipients {
                sent = true;
                if self.dispatch(&subscriber.id, offer).await {
                    summary.delivered += 1;
                } else {
                    summary.failed += 1;
                }
            }
            if sent {
                summary.dispatched.push(offer.fingerprint.clone());
            }
        }
        info!(
            "🚀 {} alerts sent ({} deliveries, {} failed)",
            summary.dispatched.len(),
            summary.delivered,
            summary.failed
        );
        summary
    }

    /// Plain notice to the administrative recipient.
    pub async fn notify_admin(&self, text: &str) -> bool {
        let Some(admin) = self.subscribers.first() else {
            warn!("⚠️ No administrative recipient configured");
            return false;
        };
        match self.messenger.send(&admin.id, text).await {
            Ok(()) => true,
            Err(e) => {
                warn!("❌ Admin notice not delivered: {}", e);
                false
            }
        }
    }
}

/// Escapes free text for Telegram's legacy Markdown.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Text placed inside a `*bold*` entity. Escapes are not honoured there, so
/// the only unsafe character is dropped instead.
fn bold_text(text: &str) -> String {
    text.replace('*', "")
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() { placeholder } else { value }
}

pub fn format_alert(offer: &Offer) -> String {
    let buyer = escape_markdown(or_placeholder(&offer.buyer, "Inconnu"));
    let object = escape_markdown(or_placeholder(&offer.object_text, "Objet inconnu"));
    let deadline = or_placeholder(&offer.deadline, "Inconnue").replace('`', "'");
    let reference = if offer.reference.is_empty() {
        String::new()
    } else {
        format!("🔖 Réf : {}\n", escape_markdown(&offer.reference))
    };

    if offer.is_priority() {
        format!(
            "🚜 *URGENT {} (AO)* 🚜\n{rule}\n🏛️ *Acheteur :* {}\n📅 *Limite :* `{}`\n{}{rule}\n{}\n\n🔗 [VOIR L'OFFRE]({})",
            bold_text(&offer.category().to_uppercase()),
            buyer,
            deadline,
            reference,
            object,
            offer.link,
            rule = RULE,
        )
    } else {
        format!(
            "🚨 *ALERTE AO - {}*\n🏛️ {}\n⏳ *{}* | 🎯 Score: *{}*\n{}\n{}\n\n🔗 [Voir l'offre]({})",
            bold_text(&offer.category()),
            buyer,
            bold_text(&deadline),
            offer.score(),
            reference,
            object,
            offer.link,
        )
    }
}
