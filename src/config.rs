use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use rust_decimal::Decimal;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub db_max_connections: u32,

    // Rate limiting
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_level: String,

    /// Worked hours per day before overtime starts.
    pub shift_hours: Decimal,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{} must be set", key))
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            db_max_connections: parsed_or("DB_MAX_CONNECTIONS", 10)?,
            rate_protected_per_min: parsed_or("RATE_PROTECTED_PER_MIN", 1000)?,
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),
            shift_hours: parsed_or("SHIFT_HOURS", Decimal::from(8))?,
        })
    }

    /// Settings for tests and tooling that never touch the environment.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            server_addr: "127.0.0.1:0".to_string(),
            database_url: String::new(),
            jwt_secret: jwt_secret.to_string(),
            db_max_connections: 1,
            rate_protected_per_min: 1000,
            api_prefix: "/api".to_string(),
            log_level: "debug".to_string(),
            shift_hours: Decimal::from(8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_numbers_are_reported_with_the_key() {
        // key unique to this test
        unsafe { env::set_var("PAYROLL_TEST_BAD_NUMBER", "ten") };
        let err = parsed_or::<u32>("PAYROLL_TEST_BAD_NUMBER", 1).unwrap_err();
        assert!(err.to_string().contains("PAYROLL_TEST_BAD_NUMBER"));
        assert_eq!(parsed_or::<u32>("PAYROLL_TEST_UNSET_NUMBER", 7).unwrap(), 7);
    }
}
