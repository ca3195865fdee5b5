use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ShowConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub queue: QueueConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub uri: String,
    pub queue_name: String,
    pub consumer_tag: String,
    pub ack_mode: AckMode,
    /// Unacked deliveries the broker may push at once in manual mode.
    pub prefetch: u16,
    pub retry: RetryPolicy,
}

/// Bounded exponential backoff applied to store failures before a
/// message is given up on.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(100),
            max_elapsed: Duration::from_secs(10),
        }
    }
}

/// How deliveries from the acceptance queue are settled.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AckMode {
    /// Broker considers the message consumed on delivery (at-most-once).
    Auto,
    /// Ack after the update ran, requeue on store failure (at-least-once).
    Manual,
}

impl std::str::FromStr for AckMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(AckMode::Auto),
            "manual" => Ok(AckMode::Manual),
            _ => Err(format!("Invalid queue ack mode: {}", s)),
        }
    }
}

impl ShowConfig {
    pub fn load() -> Result<Self, AppError> {
        // Loads .env and APP__ prefixed settings
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(ShowConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_CONNECTION_STRING", None, is_prod)?,
                database: get_env("DBNAME", None, is_prod)?,
                collection: get_env("COLNAME", None, is_prod)?,
            },
            queue: QueueConfig {
                uri: get_env("RABBITMQ_CONNECTION_STRING", None, is_prod)?,
                // Tuning knobs keep their defaults in every environment
                queue_name: get_env("QUEUE_NAME", Some("reviews"), false)?,
                consumer_tag: get_env("QUEUE_CONSUMER_TAG", Some("show-service"), false)?,
                ack_mode: parse_env("QUEUE_ACK_MODE", "auto")?,
                prefetch: parse_env("QUEUE_PREFETCH", "10")?,
                retry: RetryPolicy {
                    initial_interval: Duration::from_millis(parse_env(
                        "QUEUE_RETRY_INITIAL_MS",
                        "100",
                    )?),
                    max_elapsed: Duration::from_secs(parse_env("QUEUE_RETRY_WINDOW_SECS", "10")?),
                },
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), false)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("Invalid {}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_mode_parses_case_insensitively() {
        assert_eq!("auto".parse::<AckMode>(), Ok(AckMode::Auto));
        assert_eq!("MANUAL".parse::<AckMode>(), Ok(AckMode::Manual));
        assert!("sometimes".parse::<AckMode>().is_err());
    }

    #[test]
    fn missing_required_key_is_a_config_error() {
        let result = get_env("SHOW_SERVICE_TEST_UNSET_KEY", None, false);
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn default_is_used_outside_production() {
        let value = get_env("SHOW_SERVICE_TEST_UNSET_KEY", Some("reviews"), false).unwrap();
        assert_eq!(value, "reviews");
    }

    #[test]
    fn default_is_refused_in_production() {
        let result = get_env("SHOW_SERVICE_TEST_UNSET_KEY", Some("reviews"), true);
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn optional_queue_keys_default_in_production() {
        env::remove_var("QUEUE_PREFETCH_UNSET_TEST");
        let prefetch: u16 = parse_env("QUEUE_PREFETCH_UNSET_TEST", "10").unwrap();
        assert_eq!(prefetch, 10);
    }

    #[test]
    fn load_in_production_only_requires_connection_settings() {
        // Only this test touches these variables
        env::set_var("ENVIRONMENT", "prod");
        env::set_var("MONGODB_CONNECTION_STRING", "mongodb://localhost:27017");
        env::set_var("DBNAME", "showsdb");
        env::set_var("COLNAME", "shows");
        env::set_var("RABBITMQ_CONNECTION_STRING", "amqp://localhost:5672");
        for key in [
            "QUEUE_NAME",
            "QUEUE_CONSUMER_TAG",
            "QUEUE_ACK_MODE",
            "QUEUE_PREFETCH",
            "QUEUE_RETRY_INITIAL_MS",
            "QUEUE_RETRY_WINDOW_SECS",
        ] {
            env::remove_var(key);
        }

        let config = ShowConfig::load().unwrap();

        env::remove_var("ENVIRONMENT");
        assert_eq!(config.queue.queue_name, "reviews");
        assert_eq!(config.queue.consumer_tag, "show-service");
        assert_eq!(config.queue.ack_mode, AckMode::Auto);
        assert_eq!(config.queue.prefetch, 10);
        assert_eq!(config.queue.retry, RetryPolicy::default());
    }

    #[test]
    fn unparsable_value_is_a_config_error() {
        env::set_var("QUEUE_PREFETCH_BAD_TEST", "lots");
        let result: Result<u16, _> = parse_env("QUEUE_PREFETCH_BAD_TEST", "10");
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }
}
