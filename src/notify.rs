use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::types::{Channel, DeliverableDeal};

/// Discord caps embeds per webhook message; larger batches are split.
const MAX_EMBEDS_PER_MESSAGE: usize = 10;

const EMBED_COLOR_DEAL: u32 = 0xE8_71_00;

/// Delivery seam between the decision pipeline and the outside world.
/// `deals` is one batch: a single immediate delivery or a flushed queue.
pub trait Notifier: Send + Sync {
    fn deliver(
        &self,
        channel: &Channel,
        deals: &[DeliverableDeal],
    ) -> impl Future<Output = Result<()>> + Send;
}

/// The webhook transport is shared between the pipeline and the dispatcher.
impl<N: Notifier> Notifier for std::sync::Arc<N> {
    async fn deliver(&self, channel: &Channel, deals: &[DeliverableDeal]) -> Result<()> {
        (**self).deliver(channel, deals).await
    }
}

// ---------------------------------------------------------------------------
// Webhook payload
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct WebhookMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<WebhookEmbed>,
}

#[derive(Debug, Serialize)]
pub struct WebhookEmbed {
    pub title: String,
    pub url: String,
    pub description: String,
    pub color: u32,
    pub timestamp: String,
    pub fields: Vec<WebhookField>,
}

#[derive(Debug, Serialize)]
pub struct WebhookField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

pub(crate) fn build_message(deals: &[DeliverableDeal], batched: bool) -> WebhookMessage {
    let content = if batched && deals.len() > 1 {
        Some(format!("{} deals held during quiet hours", deals.len()))
    } else {
        None
    };
    WebhookMessage {
        content,
        embeds: deals.iter().map(build_embed).collect(),
    }
}

fn build_embed(deal: &DeliverableDeal) -> WebhookEmbed {
    let mut fields = Vec::new();
    if let Some(price) = deal.price {
        fields.push(WebhookField {
            name: "Price".to_string(),
            value: format!("£{price:.2}"),
            inline: true,
        });
    }
    if let Some(merchant) = &deal.merchant {
        fields.push(WebhookField {
            name: "Merchant".to_string(),
            value: merchant.clone(),
            inline: true,
        });
    }
    WebhookEmbed {
        title: deal.title.clone(),
        url: deal.link.clone(),
        description: deal.match_summary.clone(),
        color: EMBED_COLOR_DEAL,
        timestamp: Utc::now().to_rfc3339(),
        fields,
    }
}

// ---------------------------------------------------------------------------
// Webhook transport
// ---------------------------------------------------------------------------

/// Posts deal notifications to a channel's webhook URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

impl Notifier for WebhookNotifier {
    async fn deliver(&self, channel: &Channel, deals: &[DeliverableDeal]) -> Result<()> {
        let batched = deals.len() > 1;
        for chunk in deals.chunks(MAX_EMBEDS_PER_MESSAGE) {
            let message = build_message(chunk, batched);
            let resp = self
                .client
                .post(&channel.webhook_url)
                .json(&message)
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(crate::error::AppError::Notify(format!(
                    "webhook for channel {} returned {}",
                    channel.id,
                    resp.status(),
                )));
            }
        }
        info!(
            channel_id = %channel.id,
            count = deals.len(),
            "Delivered {} deal(s) to {}",
            deals.len(),
            channel.name,
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// In-memory notifier double for pipeline and dispatcher tests.
#[cfg(test)]
pub mod testing {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;
    use crate::error::AppError;

    #[derive(Default)]
    pub struct RecordingNotifier {
        /// (channel_id, deal ids) per deliver call, in call order.
        deliveries: Mutex<Vec<(String, Vec<String>)>>,
        fail_channels: HashSet<String>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_for(channel_ids: &[&str]) -> Self {
            Self {
                deliveries: Mutex::new(Vec::new()),
                fail_channels: channel_ids.iter().map(|s| s.to_string()).collect(),
            }
        }

        pub fn delivered(&self) -> Vec<(String, Vec<String>)> {
            self.deliveries.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        async fn deliver(&self, channel: &Channel, deals: &[DeliverableDeal]) -> Result<()> {
            if self.fail_channels.contains(&channel.id) {
                return Err(AppError::Notify(format!(
                    "simulated delivery failure for {}",
                    channel.id
                )));
            }
            self.deliveries.lock().unwrap().push((
                channel.id.clone(),
                deals.iter().map(|d| d.deal_id.clone()).collect(),
            ));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deliverable(id: &str) -> DeliverableDeal {
        DeliverableDeal {
            deal_id: id.to_string(),
            title: format!("Deal {id}"),
            link: format!("https://example.com/{id}"),
            price: Some(19.99),
            merchant: Some("Currys".to_string()),
            match_summary: "Search term matched: anker".to_string(),
        }
    }

    #[test]
    fn single_delivery_has_no_batch_header() {
        let message = build_message(&[deliverable("d1")], false);
        assert!(message.content.is_none());
        assert_eq!(message.embeds.len(), 1);
        let embed = &message.embeds[0];
        assert_eq!(embed.title, "Deal d1");
        assert_eq!(embed.description, "Search term matched: anker");
        assert_eq!(embed.fields[0].value, "£19.99");
        assert_eq!(embed.fields[1].value, "Currys");
    }

    #[test]
    fn batched_delivery_announces_the_count() {
        let deals = vec![deliverable("d1"), deliverable("d2"), deliverable("d3")];
        let message = build_message(&deals, true);
        assert_eq!(
            message.content.as_deref(),
            Some("3 deals held during quiet hours")
        );
        assert_eq!(message.embeds.len(), 3);
    }

    #[test]
    fn missing_price_and_merchant_omit_their_fields() {
        let mut d = deliverable("d1");
        d.price = None;
        d.merchant = None;
        let message = build_message(&[d], false);
        assert!(message.embeds[0].fields.is_empty());
    }
}
