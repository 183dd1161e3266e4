use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub dispatch_radius_m: f64,
    pub offer_ttl_secs: i64,
    pub sweep_interval_secs: u64,
    pub compensation_max_attempts: u32,
    pub compensation_backoff_ms: u64,
    pub payment_currency: String,
    pub base_fare: u32,
    pub fare_per_km: u32,
    pub min_fare: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            dispatch_radius_m: 5_000.0,
            offer_ttl_secs: 30,
            sweep_interval_secs: 10,
            compensation_max_attempts: 8,
            compensation_backoff_ms: 25,
            payment_currency: "INR".to_string(),
            base_fare: 50,
            fare_per_km: 12,
            min_fare: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            dispatch_radius_m: parse_or_default("DISPATCH_RADIUS_METERS", defaults.dispatch_radius_m)?,
            offer_ttl_secs: parse_or_default("OFFER_TTL_SECS", defaults.offer_ttl_secs)?,
            sweep_interval_secs: parse_or_default("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?,
            compensation_max_attempts: parse_or_default(
                "COMPENSATION_MAX_ATTEMPTS",
                defaults.compensation_max_attempts,
            )?,
            compensation_backoff_ms: parse_or_default(
                "COMPENSATION_BACKOFF_MS",
                defaults.compensation_backoff_ms,
            )?,
            payment_currency: env::var("PAYMENT_CURRENCY").unwrap_or(defaults.payment_currency),
            base_fare: parse_or_default("BASE_FARE", defaults.base_fare)?,
            fare_per_km: parse_or_default("FARE_PER_KM", defaults.fare_per_km)?,
            min_fare: parse_or_default("MIN_FARE", defaults.min_fare)?,
        };

        if config.offer_ttl_secs <= 0 {
            return Err(AppError::Internal("invalid OFFER_TTL_SECS: must be > 0".to_string()));
        }
        if config.min_fare == 0 {
            return Err(AppError::Internal("invalid MIN_FARE: must be > 0".to_string()));
        }
        if config.compensation_max_attempts == 0 {
            return Err(AppError::Internal(
                "invalid COMPENSATION_MAX_ATTEMPTS: must be > 0".to_string(),
            ));
        }

        Ok(config)
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
