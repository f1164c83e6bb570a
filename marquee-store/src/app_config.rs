use marquee_booking::RefundPolicy;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_hold_seconds")]
    pub seat_hold_seconds: u64,
    /// "time_window" or "flat_rate"
    #[serde(default = "default_refund_policy")]
    pub refund_policy: String,
    #[serde(default = "default_full_refund_hours")]
    pub full_refund_hours: f64,
    #[serde(default = "default_flat_refund_percent")]
    pub flat_refund_percent: u32,
    #[serde(default = "default_reference_prefix")]
    pub reference_prefix: String,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_hold_seconds() -> u64 {
    600
}
fn default_refund_policy() -> String {
    "time_window".to_string()
}
fn default_full_refund_hours() -> f64 {
    24.0
}
fn default_flat_refund_percent() -> u32 {
    50
}
fn default_reference_prefix() -> String {
    "MQ".to_string()
}
fn default_rate_limit() -> i64 {
    100
}

impl BusinessRules {
    /// The refund policy for this deployment. Unknown names fall back to
    /// the time-window policy rather than failing startup.
    pub fn refund_policy(&self) -> RefundPolicy {
        match self.refund_policy.as_str() {
            "flat_rate" => RefundPolicy::FlatRate {
                refund_percent: self.flat_refund_percent,
            },
            _ => RefundPolicy::TimeWindow {
                full_refund_hours: self.full_refund_hours,
            },
        }
    }

    pub fn hold_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.seat_hold_seconds as i64)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

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
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("MARQUEE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(policy: &str) -> BusinessRules {
        BusinessRules {
            seat_hold_seconds: 600,
            refund_policy: policy.to_string(),
            full_refund_hours: 24.0,
            flat_refund_percent: 50,
            reference_prefix: "MQ".to_string(),
            rate_limit_per_minute: 100,
        }
    }

    #[test]
    fn test_refund_policy_selection() {
        assert_eq!(
            rules("time_window").refund_policy(),
            RefundPolicy::TimeWindow {
                full_refund_hours: 24.0
            }
        );
        assert_eq!(
            rules("flat_rate").refund_policy(),
            RefundPolicy::FlatRate { refund_percent: 50 }
        );
        // Unknown values get the conservative default
        assert_eq!(
            rules("something_else").refund_policy(),
            RefundPolicy::TimeWindow {
                full_refund_hours: 24.0
            }
        );
    }

    #[test]
    fn test_hold_ttl() {
        assert_eq!(rules("time_window").hold_ttl(), chrono::Duration::minutes(10));
    }
}
