use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::Context;
use quantfolio_core::constants::{
    BENCHMARK_SYMBOL, DEFAULT_HISTORY_DAYS, MAX_SOLVER_ITERATIONS, RISK_FREE_RATE,
};

use crate::auth::{decode_secret_key, AuthConfig};

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub auth: AuthConfig,
    pub optimizer: OptimizerConfig,
    pub market_data: MarketDataConfig,
}

/// Numeric knobs forwarded to the optimization service.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    pub risk_free_rate: f64,
    pub history_days: i64,
    pub benchmark_symbol: String,
    pub max_iterations: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: RISK_FREE_RATE,
            history_days: DEFAULT_HISTORY_DAYS,
            benchmark_symbol: BENCHMARK_SYMBOL.to_string(),
            max_iterations: MAX_SOLVER_ITERATIONS,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MarketDataConfig {
    pub fetch_timeout: Duration,
    pub max_attempts: u32,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            max_attempts: 3,
            cache_ttl: Duration::from_secs(15 * 60),
            cache_capacity: 512,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = env_or("QF_LISTEN_ADDR", "0.0.0.0:8080".parse()?)?;
        let cors_allow = std::env::var("QF_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = env_or("QF_REQUEST_TIMEOUT_MS", 30_000)?;

        let secret = std::env::var("QF_SECRET_KEY").context("QF_SECRET_KEY must be set")?;
        let password_hash = std::env::var("QF_AUTH_PASSWORD_HASH")
            .ok()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());
        let ttl_minutes: u64 = env_or("QF_AUTH_TOKEN_TTL_MINUTES", 60)?;
        let auth = AuthConfig {
            password_hash,
            jwt_secret: decode_secret_key(&secret)?,
            access_token_ttl: Duration::from_secs(ttl_minutes * 60),
        };

        let defaults = OptimizerConfig::default();
        let optimizer = OptimizerConfig {
            risk_free_rate: env_or("QF_RISK_FREE_RATE", defaults.risk_free_rate)?,
            history_days: env_or("QF_HISTORY_DAYS", defaults.history_days)?,
            benchmark_symbol: std::env::var("QF_BENCHMARK_SYMBOL")
                .map(|s| s.trim().to_uppercase())
                .unwrap_or(defaults.benchmark_symbol),
            max_iterations: env_or("QF_MAX_ITERATIONS", defaults.max_iterations)?,
        };

        let defaults = MarketDataConfig::default();
        let market_data = MarketDataConfig {
            fetch_timeout: Duration::from_millis(env_or(
                "QF_FETCH_TIMEOUT_MS",
                defaults.fetch_timeout.as_millis() as u64,
            )?),
            max_attempts: env_or("QF_FETCH_MAX_ATTEMPTS", defaults.max_attempts)?,
            cache_ttl: Duration::from_secs(env_or(
                "QF_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),
            cache_capacity: env_or("QF_CACHE_CAPACITY", defaults.cache_capacity)?,
        };

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            auth,
            optimizer,
            market_data,
        })
    }
}

/// Parses `key` when set, otherwise returns `default`.
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key}: {raw}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_parses_and_defaults() {
        std::env::set_var("QF_TEST_ENV_OR_SET", " 42 ");
        assert_eq!(env_or::<u64>("QF_TEST_ENV_OR_SET", 7).unwrap(), 42);
        assert_eq!(env_or::<u64>("QF_TEST_ENV_OR_UNSET", 7).unwrap(), 7);

        std::env::set_var("QF_TEST_ENV_OR_BAD", "forty");
        assert!(env_or::<u64>("QF_TEST_ENV_OR_BAD", 7).is_err());
    }
}
