//! Delivery verification with a one-time code.
//!
//! ```text
//! Pending ──(otp matches)──► Delivered   proof + delivered_at stored
//!    │
//!    ├── otp mismatch        → InvalidOtp, nothing changes
//!    └── not Pending         → AlreadyDelivered { status }
//! ```

use rand::Rng;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use medledger_core::{CoreError, DeliveryStatus, Invoice, OTP_LENGTH};

use super::TransactionEngine;
use crate::commands::VerifyDelivery;
use crate::error::{LedgerError, LedgerResult};
use crate::events::LedgerEvent;

/// A fresh zero-padded numeric code.
pub fn generate_otp() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..10u32.pow(OTP_LENGTH as u32));
    format!("{:0width$}", value, width = OTP_LENGTH)
}

/// Compares codes in constant time.
pub fn otp_matches(expected: &str, given: &str) -> bool {
    expected.as_bytes().ct_eq(given.as_bytes()).into()
}

fn status_label(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Pending => "pending",
        DeliveryStatus::Delivered => "delivered",
        DeliveryStatus::Returned => "returned",
    }
}

impl TransactionEngine {
    /// Marks an invoice delivered when the code matches.
    ///
    /// ## Errors
    /// - `InvoiceNotFound`
    /// - `AlreadyDelivered` if the invoice is not pending (includes a
    ///   concurrent verification that won the race)
    /// - `InvalidOtp`
    pub async fn verify_delivery(&self, cmd: VerifyDelivery) -> LedgerResult<Invoice> {
        cmd.validate()?;

        let invoices = self.db.invoices();
        let invoice = invoices
            .get_by_id(&cmd.invoice_id)
            .await?
            .ok_or_else(|| CoreError::InvoiceNotFound(cmd.invoice_id.clone()))?;

        if invoice.delivery_status != DeliveryStatus::Pending {
            return Err(already(&invoice, invoice.delivery_status).into());
        }

        if !otp_matches(&invoice.delivery_otp, &cmd.otp) {
            warn!(invoice_number = %invoice.invoice_number, "Delivery OTP mismatch");
            return Err(CoreError::InvalidOtp {
                invoice_number: invoice.invoice_number,
            }
            .into());
        }

        let delivered_at = self.clock.now();
        let (this, proof) = (self, &cmd.proof);
        let id = invoice.id.as_str();
        let updated = self
            .run_unit("verify_delivery", move || async move {
                let updated = this
                    .db
                    .invoices()
                    .mark_delivered(id, proof, delivered_at)
                    .await?;
                Ok::<_, LedgerError>(updated)
            })
            .await?;

        if !updated {
            // someone else moved it out of Pending since we read it
            let current = invoices
                .get_by_id(&invoice.id)
                .await?
                .map(|i| i.delivery_status)
                .unwrap_or(DeliveryStatus::Delivered);
            return Err(already(&invoice, current).into());
        }

        let delivered = Invoice {
            delivery_status: DeliveryStatus::Delivered,
            delivered_at: Some(delivered_at),
            delivery_photo_url: cmd.proof.photo_url.clone(),
            delivery_signature: cmd.proof.signature.clone(),
            delivery_latitude: cmd.proof.latitude,
            delivery_longitude: cmd.proof.longitude,
            delivery_note: cmd.proof.note.clone(),
            ..invoice
        };

        self.events.publish(LedgerEvent::DeliveryVerified {
            invoice_id: delivered.id.clone(),
            invoice_number: delivered.invoice_number.clone(),
            delivered_at,
        });

        info!(invoice_number = %delivered.invoice_number, "Delivery verified");
        Ok(delivered)
    }
}

fn already(invoice: &Invoice, status: DeliveryStatus) -> CoreError {
    CoreError::AlreadyDelivered {
        invoice_number: invoice.invoice_number.clone(),
        status: status_label(status).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_shape() {
        for _ in 0..200 {
            let otp = generate_otp();
            assert_eq!(otp.len(), OTP_LENGTH);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_otp_compare() {
        assert!(otp_matches("004211", "004211"));
        assert!(!otp_matches("004211", "004212"));
        assert!(!otp_matches("004211", "04211"));
    }
}
