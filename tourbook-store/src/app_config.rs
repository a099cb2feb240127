use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_max_participants")]
    pub max_participants: i32,
    #[serde(default = "default_reference_attempts")]
    pub reference_attempts: u32,
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_seconds: i64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_max_participants() -> i32 { 10 }
fn default_reference_attempts() -> u32 { 3 }
fn default_webhook_tolerance() -> i64 { 300 }
fn default_rate_limit() -> i64 { 100 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            max_participants: default_max_participants(),
            reference_attempts: default_reference_attempts(),
            webhook_tolerance_seconds: default_webhook_tolerance(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub stripe: Option<StripeSettings>,
    #[serde(default)]
    pub paypal: Option<PaypalSettings>,
}

fn default_currency() -> String { "INR".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaypalSettings {
    pub client_id: String,
    pub client_secret: String,
    pub webhook_secret: String,
    pub api_base: Option<String>,
    pub return_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub max_connections: u32,
}

fn default_pool_size() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `TOURBOOK__AUTH__JWT_SECRET=...`
            .add_source(config::Environment::with_prefix("TOURBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let raw = r#"
            [server]
            port = 8080
            [database]
            url = "postgres://localhost/tourbook"
            [auth]
            jwt_secret = "secret"
            [payments]
        "#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.payments.currency, "INR");
        assert_eq!(config.business_rules.max_participants, 10);
        assert_eq!(config.business_rules.reference_attempts, 3);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.redis.is_none());
        assert!(config.payments.stripe.is_none());
    }
}
