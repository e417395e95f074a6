use envconfig::Envconfig;
use thiserror::Error;

/// Runtime configuration, read from the environment (and `.env` when present).
#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "DATABASE_URL", default = "sqlite://medfex.db")]
    pub database_url: String,

    #[envconfig(from = "PORT", default = "5000")]
    pub port: u16,

    #[envconfig(from = "JWT_SECRET")]
    pub jwt_secret: String,

    #[envconfig(from = "JWT_TTL_HOURS", default = "720")]
    pub jwt_ttl_hours: i64,

    #[envconfig(from = "BCRYPT_COST", default = "12")]
    pub bcrypt_cost: u32,

    #[envconfig(from = "UPLOAD_DIR", default = "uploads")]
    pub upload_dir: String,

    /// Six-field cron expression (seconds first), evaluated in UTC.
    #[envconfig(from = "REFILL_REMINDER_CRON", default = "0 0 9 * * *")]
    pub refill_reminder_cron: String,

    #[envconfig(from = "REFILL_REMINDER_WINDOW_DAYS", default = "3")]
    pub refill_reminder_window_days: i64,
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("JWT_TTL_HOURS must be between 1 and {max}, got {value}")]
    JwtTtl { value: i64, max: i64 },
    #[error("REFILL_REMINDER_WINDOW_DAYS must be between 0 and {max}, got {value}")]
    ReminderWindow { value: i64, max: i64 },
    #[error("BCRYPT_COST must be between 4 and 31, got {0}")]
    BcryptCost(u32),
}

const MAX_JWT_TTL_HOURS: i64 = 24 * 365 * 10;
const MAX_REMINDER_WINDOW_DAYS: i64 = 3650;

impl Config {
    /// Rejects values the date arithmetic or bcrypt cannot handle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_JWT_TTL_HOURS).contains(&self.jwt_ttl_hours) {
            return Err(ConfigError::JwtTtl {
                value: self.jwt_ttl_hours,
                max: MAX_JWT_TTL_HOURS,
            });
        }
        if !(0..=MAX_REMINDER_WINDOW_DAYS).contains(&self.refill_reminder_window_days) {
            return Err(ConfigError::ReminderWindow {
                value: self.refill_reminder_window_days,
                max: MAX_REMINDER_WINDOW_DAYS,
            });
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::BcryptCost(self.bcrypt_cost));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::test_config;

    use super::*;

    #[test]
    fn defaults_used_in_tests_are_valid() {
        assert_eq!(test_config("uploads").validate(), Ok(()));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut config = test_config("uploads");
        config.jwt_ttl_hours = i64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::JwtTtl { .. })));

        let mut config = test_config("uploads");
        config.refill_reminder_window_days = 1_000_000_000_000_000;
        assert!(matches!(config.validate(), Err(ConfigError::ReminderWindow { .. })));

        let mut config = test_config("uploads");
        config.bcrypt_cost = 2;
        assert_eq!(config.validate(), Err(ConfigError::BcryptCost(2)));
    }
}
