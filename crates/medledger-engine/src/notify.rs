//! # Notifications
//!
//! Messages the engine queues in the notification outbox, and the
//! [`Notifier`] seam the outbox processor delivers them through.
//!
//! ```text
//!   kind               channel   recipient              trigger
//!   ─────────────────  ────────  ─────────────────────  ─────────────────────────
//!   DELIVERY_OTP       SMS       customer phone         every invoice
//!   HIGH_VALUE_ALERT   email     notifications.alert_   net ≥ high_value_threshold
//!                                email
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use medledger_core::Money;

pub const DELIVERY_OTP: &str = "DELIVERY_OTP";
pub const HIGH_VALUE_ALERT: &str = "HIGH_VALUE_ALERT";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),

    #[error("Notification rejected: {0}")]
    Rejected(String),

    #[error("Unreadable notification payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// SMS carrying the code the driver must collect at handover.
    DeliveryOtp {
        invoice_id: String,
        invoice_number: String,
        customer_name: String,
        phone: Option<String>,
        otp: String,
    },
    /// Email to accounts about a large invoice.
    HighValueAlert {
        invoice_id: String,
        invoice_number: String,
        customer_name: String,
        net_paise: i64,
        email: String,
    },
}

impl Notification {
    /// Outbox `kind` column value.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::DeliveryOtp { .. } => DELIVERY_OTP,
            Notification::HighValueAlert { .. } => HIGH_VALUE_ALERT,
        }
    }

    pub fn from_payload(payload: &str) -> Result<Self, NotifyError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Delivery channel for notifications (SMS gateway, mailer, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::DeliveryOtp {
                invoice_number,
                customer_name,
                phone,
                ..
            } => {
                // the code itself is never logged
                info!(
                    invoice_number = %invoice_number,
                    customer = %customer_name,
                    phone = phone.as_deref().unwrap_or("-"),
                    "Delivery OTP SMS"
                );
            }
            Notification::HighValueAlert {
                invoice_number,
                customer_name,
                net_paise,
                email,
                ..
            } => {
                info!(
                    invoice_number = %invoice_number,
                    customer = %customer_name,
                    net = %Money::from_paise(*net_paise),
                    to = %email,
                    "High-value invoice alert"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trip_keeps_kind() {
        let n = Notification::HighValueAlert {
            invoice_id: "inv-1".into(),
            invoice_number: "INV-202610-000001".into(),
            customer_name: "Apollo Medicals".into(),
            net_paise: 6_000_000,
            email: "accounts@example.com".into(),
        };
        let json = serde_json::to_string(&n).unwrap();
        let back = Notification::from_payload(&json).unwrap();
        assert_eq!(back.kind(), HIGH_VALUE_ALERT);
        assert_eq!(back, n);
    }

    #[test]
    fn test_garbage_payload() {
        assert!(matches!(
            Notification::from_payload("not json"),
            Err(NotifyError::Payload(_))
        ));
    }

    #[tokio::test]
    async fn test_logging_notifier_accepts_everything() {
        let n = Notification::DeliveryOtp {
            invoice_id: "inv-1".into(),
            invoice_number: "INV-202610-000001".into(),
            customer_name: "City Chemists".into(),
            phone: None,
            otp: "004211".into(),
        };
        assert!(LoggingNotifier.send(&n).await.is_ok());
    }
}
