use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use tourbook_core::payment::{
    IntentRequest, IntentStatus, PaymentAdapter, PaymentError, PaymentIntent, PaymentProvider,
};

/// In-house settlement for direct checkout. Charges settle immediately.
#[derive(Debug, Default)]
pub struct ManualPaymentAdapter;

impl ManualPaymentAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn short_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{}-{}", prefix, &hex[..12])
}

#[async_trait]
impl PaymentAdapter for ManualPaymentAdapter {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Manual
    }

    async fn create_intent(&self, _request: &IntentRequest) -> Result<PaymentIntent, PaymentError> {
        Err(PaymentError::Unsupported(PaymentProvider::Manual))
    }

    async fn get_intent(&self, _intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        Err(PaymentError::Unsupported(PaymentProvider::Manual))
    }

    async fn refund(&self, transaction_id: &str, amount_cents: i64, currency: &str) -> Result<String, PaymentError> {
        let refund_id = short_id("RFN");
        tracing::info!("Manual refund {} of {} {} for {}", refund_id, amount_cents, currency, transaction_id);
        Ok(refund_id)
    }

    async fn process_payment(&self, request: &IntentRequest) -> Result<PaymentIntent, PaymentError> {
        let status = if request.amount_cents > 0 {
            IntentStatus::Succeeded
        } else {
            IntentStatus::Failed
        };

        Ok(PaymentIntent {
            id: short_id("TXN"),
            provider: PaymentProvider::Manual,
            booking_id: Some(request.booking_id),
            amount_cents: request.amount_cents,
            currency: request.currency.clone(),
            status,
            client_secret: None,
            approval_url: None,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourbook_core::booking::PaymentMethod;

    fn request(amount_cents: i64) -> IntentRequest {
        IntentRequest {
            booking_id: Uuid::new_v4(),
            booking_reference: "ABCD1234".to_string(),
            amount_cents,
            currency: "INR".to_string(),
            description: "Kerala Backwaters x2".to_string(),
            customer_email: "guest@example.com".to_string(),
            method: PaymentMethod::CreditCard,
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn test_direct_payment_settles() {
        let adapter = ManualPaymentAdapter::new();
        let intent = adapter.process_payment(&request(22_000)).await.unwrap();

        assert_eq!(intent.status, IntentStatus::Succeeded);
        assert!(intent.id.starts_with("TXN-"));
        assert_eq!(intent.id.len(), 16);
        assert_eq!(intent.id[4..].to_uppercase(), intent.id[4..]);
    }

    #[tokio::test]
    async fn test_zero_amount_is_declined() {
        let adapter = ManualPaymentAdapter::new();
        let intent = adapter.process_payment(&request(0)).await.unwrap();
        assert_eq!(intent.status, IntentStatus::Failed);
    }

    #[tokio::test]
    async fn test_intents_unsupported() {
        let adapter = ManualPaymentAdapter::new();
        assert!(matches!(
            adapter.create_intent(&request(100)).await,
            Err(PaymentError::Unsupported(PaymentProvider::Manual))
        ));
        assert!(adapter.verify_webhook(b"{}", "sig").is_err());
        assert!(adapter.refund("TXN-1", 100, "INR").await.unwrap().starts_with("RFN-"));
    }
}
