//! Fire-and-forget sale alerts.
//!
//! Notification delivery must never hold up or fail the pipeline: alerts run
//! in a detached task, every failure is logged and dropped.

use telegram_client::TelegramClient;
use tracing::warn;

use salestrail_store::NotificationStore;

#[derive(Debug, Clone)]
pub struct SaleAlert {
    pub lead_id: i64,
    pub targetologist: Option<String>,
    pub contact_name: Option<String>,
    pub amount: i64,
    pub product_name: String,
    pub campaign: Option<String>,
}

#[derive(Clone)]
pub struct Notifier {
    telegram: TelegramClient,
    chat_ids: Vec<i64>,
    notifications: NotificationStore,
}

impl Notifier {
    pub fn new(
        telegram: TelegramClient,
        chat_ids: Vec<i64>,
        notifications: NotificationStore,
    ) -> Self {
        Self {
            telegram,
            chat_ids,
            notifications,
        }
    }

    /// Broadcast the alert on a detached task and mark the notification row
    /// as sent once at least one chat received it. The caller never awaits
    /// this work.
    pub fn spawn_sale_alert(&self, alert: SaleAlert) {
        let telegram = self.telegram.clone();
        let chat_ids = self.chat_ids.clone();
        let notifications = self.notifications.clone();

        tokio::spawn(async move {
            let text = format_sale_message(&alert);
            let delivered = telegram.broadcast(&chat_ids, &text).await;
            if delivered == 0 {
                warn!(lead_id = alert.lead_id, "Sale alert reached no chats");
                return;
            }
            if let Err(e) = notifications.mark_sent(alert.lead_id).await {
                warn!(lead_id = alert.lead_id, error = %e, "Failed to mark notification sent");
            }
        });
    }
}

fn targetologist_emoji(name: &str) -> &'static str {
    match name {
        "Kenesary" => "👑",
        "Arystan" => "🦁",
        "Muha" => "🚀",
        "Traf4" => "⚡",
        "Unknown" => "❓",
        _ => "🎯",
    }
}

/// Format an amount in tenge with thousands separators: 150000 → "150 000 ₸".
fn format_tenge(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}{grouped} ₸")
}

fn format_sale_message(alert: &SaleAlert) -> String {
    let targetologist = alert.targetologist.as_deref().unwrap_or("Unknown");
    let emoji = targetologist_emoji(targetologist);
    format!(
        "🎉 *НОВАЯ ПРОДАЖА!*\n\n\
         {emoji} *Таргетолог:* {targetologist}\n\
         👤 *Клиент:* {customer}\n\
         💰 *Сумма:* {amount}\n\
         📦 *Продукт:* {product}\n\
         🏷️ *Кампания:* {campaign}\n\n\
         *{targetologist}, ПОЗДРАВЛЯЕМ! ПО ВАМ СДЕЛАЛИ ПРОДАЖУ!* 🔥",
        customer = alert.contact_name.as_deref().unwrap_or("Без имени"),
        amount = format_tenge(alert.amount),
        product = alert.product_name,
        campaign = alert.campaign.as_deref().unwrap_or("N/A"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenge_grouping() {
        assert_eq!(format_tenge(0), "0 ₸");
        assert_eq!(format_tenge(5_000), "5 000 ₸");
        assert_eq!(format_tenge(150_000), "150 000 ₸");
        assert_eq!(format_tenge(1_234_567), "1 234 567 ₸");
    }

    #[test]
    fn message_names_the_team() {
        let alert = SaleAlert {
            lead_id: 1,
            targetologist: Some("Kenesary".into()),
            contact_name: Some("Dana".into()),
            amount: 5_000,
            product_name: "Express Course".into(),
            campaign: Some("express_promo".into()),
        };
        let text = format_sale_message(&alert);
        assert!(text.contains("👑 *Таргетолог:* Kenesary"));
        assert!(text.contains("5 000 ₸"));
        assert!(text.contains("express_promo"));
    }

    #[test]
    fn unattributed_sale_still_formats() {
        let alert = SaleAlert {
            lead_id: 1,
            targetologist: None,
            contact_name: None,
            amount: 12_000,
            product_name: "Main Product".into(),
            campaign: None,
        };
        let text = format_sale_message(&alert);
        assert!(text.contains("❓ *Таргетолог:* Unknown"));
        assert!(text.contains("Без имени"));
        assert!(text.contains("N/A"));
    }
}
