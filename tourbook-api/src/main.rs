use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tourbook_api::metrics::Metrics;
use tourbook_api::middleware::resiliency::ResiliencyState;
use tourbook_api::{app, AppState, AuthConfig};
use tourbook_booking::{BookingService, PaymentOrchestrator, TextInvoiceRenderer};
use tourbook_catalog::{PricingConfig, PricingEngine};
use tourbook_core::events::EventPublisher;
use tourbook_payments::{ManualPaymentAdapter, PaypalAdapter, PaypalConfig, StripeAdapter, StripeConfig};
use tourbook_store::app_config::{Config, PaymentsConfig};
use tourbook_store::{
    DbClient, EventProducer, InMemoryEventPublisher, PostgresBookingRepository,
    PostgresTourRepository, RedisClient,
};

fn payment_orchestrator(payments: &PaymentsConfig, tolerance_secs: i64) -> anyhow::Result<PaymentOrchestrator> {
    let mut orchestrator = PaymentOrchestrator::new().with_adapter(Arc::new(ManualPaymentAdapter::new()));

    if let Some(stripe) = &payments.stripe {
        let mut config = StripeConfig::new(&stripe.secret_key, &stripe.webhook_secret);
        config.tolerance_secs = tolerance_secs;
        if let Some(base) = &stripe.api_base {
            config.api_base = base.clone();
        }
        orchestrator = orchestrator.with_adapter(Arc::new(StripeAdapter::new(config)?));
    } else {
        tracing::warn!("Stripe is not configured; card payments are unavailable");
    }

    if let Some(paypal) = &payments.paypal {
        let mut config = PaypalConfig::new(&paypal.client_id, &paypal.client_secret, &paypal.webhook_secret);
        if let Some(base) = &paypal.api_base {
            config.api_base = base.clone();
        }
        if let Some(url) = &paypal.return_url {
            config.return_url = url.clone();
        }
        if let Some(url) = &paypal.cancel_url {
            config.cancel_url = url.clone();
        }
        orchestrator = orchestrator.with_adapter(Arc::new(PaypalAdapter::new(config)?));
    } else {
        tracing::warn!("PayPal is not configured; PayPal and UPI payments are unavailable");
    }

    tracing::info!("Payment providers: {:?}", orchestrator.providers());
    Ok(orchestrator)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tourbook_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Tourbook API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let redis = match &config.redis {
        Some(redis) => Some(Arc::new(RedisClient::new(&redis.url).context("Invalid Redis URL")?)),
        None => {
            tracing::warn!("Redis is not configured; rate limiting disabled");
            None
        }
    };

    let events: Arc<dyn EventPublisher> = match &config.kafka {
        Some(kafka) => Arc::new(EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?),
        None => {
            tracing::warn!("Kafka is not configured; booking events stay in process");
            Arc::new(InMemoryEventPublisher::new())
        }
    };

    let rules = config.business_rules.clone();
    let pricing = PricingEngine::new(PricingConfig {
        currency: config.payments.currency.clone(),
        max_participants: rules.max_participants,
    });
    let orchestrator = payment_orchestrator(&config.payments, rules.webhook_tolerance_seconds)?;

    let bookings = BookingService::new(
        Arc::new(PostgresTourRepository::new(db.pool.clone())),
        Arc::new(PostgresBookingRepository::new(db.pool.clone())),
        Arc::new(orchestrator),
        events,
        pricing,
    )
    .with_reference_attempts(rules.reference_attempts);

    let app_state = AppState {
        bookings: Arc::new(bookings),
        redis,
        invoices: Arc::new(TextInvoiceRenderer),
        metrics: Arc::new(Metrics::new()?),
        resiliency: Arc::new(ResiliencyState::new()),
        auth: AuthConfig { secret: config.auth.jwt_secret.clone() },
        business_rules: rules,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
