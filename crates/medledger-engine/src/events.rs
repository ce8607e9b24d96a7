//! # Ledger Event Bus
//!
//! In-process broadcast of committed documents to connected clients.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  TransactionEngine                                                      │
//! │       │ tx.commit() ✓                                                   │
//! │       ▼                                                                 │
//! │  EventBus::publish(LedgerEvent::InvoiceCreated { .. })                  │
//! │       │                                                                 │
//! │       ├──► subscriber 1 (dashboard push)                               │
//! │       ├──► subscriber 2 (delivery app)                                  │
//! │       └──► no subscribers → dropped, logged at debug                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events are published only after commit and publishing cannot fail the
//! operation. Event payloads are summaries; the delivery OTP is never part
//! of one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use medledger_core::{DeliveryStatus, Invoice, Purchase, PurchaseReturn, SalesReturn};

/// Default capacity of the broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    InvoiceCreated(InvoiceSummary),
    PurchaseRecorded(DocumentSummary),
    SalesReturnCreated(DocumentSummary),
    PurchaseReturnCreated(DocumentSummary),
    DeliveryVerified {
        invoice_id: String,
        invoice_number: String,
        delivered_at: DateTime<Utc>,
    },
}

impl LedgerEvent {
    /// Id of the document the event is about.
    pub fn document_id(&self) -> &str {
        match self {
            LedgerEvent::InvoiceCreated(s) => &s.id,
            LedgerEvent::PurchaseRecorded(s)
            | LedgerEvent::SalesReturnCreated(s)
            | LedgerEvent::PurchaseReturnCreated(s) => &s.id,
            LedgerEvent::DeliveryVerified { invoice_id, .. } => invoice_id,
        }
    }
}

/// What clients need to list a new invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub id: String,
    pub invoice_number: String,
    pub customer_id: String,
    pub net_paise: i64,
    pub is_cash: bool,
    pub delivery_status: DeliveryStatus,
    pub line_count: usize,
}

impl InvoiceSummary {
    pub fn new(invoice: &Invoice, line_count: usize) -> Self {
        InvoiceSummary {
            id: invoice.id.clone(),
            invoice_number: invoice.invoice_number.clone(),
            customer_id: invoice.customer_id.clone(),
            net_paise: invoice.net_paise,
            is_cash: invoice.is_cash,
            delivery_status: invoice.delivery_status,
            line_count,
        }
    }
}

/// Bills, credit notes and debit notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub number: String,
    /// Supplier or customer.
    pub party_id: String,
    /// Invoice or bill a return refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub total_paise: i64,
}

impl From<&Purchase> for DocumentSummary {
    fn from(p: &Purchase) -> Self {
        DocumentSummary {
            id: p.id.clone(),
            number: p.bill_number.clone(),
            party_id: p.supplier_id.clone(),
            source_id: None,
            total_paise: p.total_paise,
        }
    }
}

impl From<&SalesReturn> for DocumentSummary {
    fn from(r: &SalesReturn) -> Self {
        DocumentSummary {
            id: r.id.clone(),
            number: r.return_number.clone(),
            party_id: r.customer_id.clone(),
            source_id: Some(r.invoice_id.clone()),
            total_paise: r.total_paise,
        }
    }
}

impl From<&PurchaseReturn> for DocumentSummary {
    fn from(r: &PurchaseReturn) -> Self {
        DocumentSummary {
            id: r.id.clone(),
            number: r.return_number.clone(),
            party_id: r.supplier_id.clone(),
            source_id: Some(r.purchase_id.clone()),
            total_paise: r.total_paise,
        }
    }
}

// =============================================================================
// Event Bus
// =============================================================================

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LedgerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        EventBus { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event; returns how many subscribers received it.
    pub fn publish(&self, event: LedgerEvent) -> usize {
        let document_id = event.document_id().to_string();
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(document_id = %document_id, "No event subscribers");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> DocumentSummary {
        DocumentSummary {
            id: "pur-1".into(),
            number: "BILL-202610-000001".into(),
            party_id: "sup-1".into(),
            source_id: None,
            total_paise: 392_000,
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        assert_eq!(bus.publish(LedgerEvent::PurchaseRecorded(summary())), 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.document_id(), "pur-1");
    }

    #[test]
    fn test_publish_without_subscribers_is_harmless() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(LedgerEvent::PurchaseRecorded(summary())), 0);
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_string(&LedgerEvent::PurchaseRecorded(summary())).unwrap();
        assert!(json.contains(r#""type":"purchase_recorded""#));
        assert!(!json.contains("source_id"));
    }
}
