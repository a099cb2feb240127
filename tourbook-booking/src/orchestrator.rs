use std::collections::HashMap;
use std::sync::Arc;
use tourbook_core::booking::Payment;
use tourbook_core::payment::{
    IntentRequest, PaymentAdapter, PaymentError, PaymentIntent, PaymentProvider, WebhookEvent,
};

/// Routes payment operations to the adapter registered for each provider.
#[derive(Default)]
pub struct PaymentOrchestrator {
    adapters: HashMap<PaymentProvider, Arc<dyn PaymentAdapter>>,
}

impl PaymentOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn PaymentAdapter>) -> Self {
        self.adapters.insert(adapter.provider(), adapter);
        self
    }

    pub fn adapter(&self, provider: PaymentProvider) -> Result<&Arc<dyn PaymentAdapter>, PaymentError> {
        self.adapters
            .get(&provider)
            .ok_or_else(|| PaymentError::NotConfigured(provider.to_string()))
    }

    pub fn providers(&self) -> Vec<PaymentProvider> {
        self.adapters.keys().copied().collect()
    }

    /// Create a provider charge for the method's provider.
    pub async fn initialize_payment(&self, request: &IntentRequest) -> Result<PaymentIntent, PaymentError> {
        let provider = request.method.provider();
        tracing::info!(
            "Creating {} intent for booking {} ({} {})",
            provider, request.booking_reference, request.amount_cents, request.currency
        );
        self.adapter(provider)?.create_intent(request).await
    }

    pub async fn get_intent(&self, provider: PaymentProvider, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        self.adapter(provider)?.get_intent(intent_id).await
    }

    /// Settle a charge the customer approved at the provider.
    pub async fn capture(&self, provider: PaymentProvider, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        tracing::info!("Capturing {} charge {}", provider, intent_id);
        self.adapter(provider)?.capture(intent_id).await
    }

    /// Direct checkout always settles through the manual provider.
    pub async fn process_direct(&self, request: &IntentRequest) -> Result<PaymentIntent, PaymentError> {
        self.adapter(PaymentProvider::Manual)?.process_payment(request).await
    }

    pub async fn refund(&self, payment: &Payment) -> Result<String, PaymentError> {
        self.adapter(payment.provider)?
            .refund(&payment.transaction_id, payment.amount_cents, &payment.currency)
            .await
    }

    /// Checks the signature before looking at the payload at all.
    pub fn verify_webhook(
        &self,
        provider: PaymentProvider,
        payload: &[u8],
        signature: &str,
    ) -> Result<Option<WebhookEvent>, PaymentError> {
        let adapter = self.adapter(provider)?;
        adapter.verify_webhook(payload, signature)?;
        adapter.parse_webhook(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourbook_payments::ManualPaymentAdapter;

    #[test]
    fn test_missing_adapter_is_not_configured() {
        let orchestrator = PaymentOrchestrator::new().with_adapter(Arc::new(ManualPaymentAdapter::new()));

        assert!(orchestrator.adapter(PaymentProvider::Manual).is_ok());
        assert!(matches!(
            orchestrator.adapter(PaymentProvider::Stripe),
            Err(PaymentError::NotConfigured(_))
        ));
        assert_eq!(orchestrator.providers(), vec![PaymentProvider::Manual]);
    }

    #[tokio::test]
    async fn test_capture_unsupported_by_manual() {
        let orchestrator = PaymentOrchestrator::new().with_adapter(Arc::new(ManualPaymentAdapter::new()));

        assert!(matches!(
            orchestrator.capture(PaymentProvider::Manual, "TXN-1").await,
            Err(PaymentError::Unsupported(PaymentProvider::Manual))
        ));
        assert!(matches!(
            orchestrator.capture(PaymentProvider::Paypal, "ORDER-1").await,
            Err(PaymentError::NotConfigured(_))
        ));
    }
}
