use std::collections::HashMap;
use thiserror::Error;

/// Runtime configuration, read once at startup.
///
/// Weekday labels and slot count drive route generation; zone names are a
/// naming convention supplied here, never derived from the server clock
/// inside business logic.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub route_slots_per_day: usize,
    pub route_weekday_labels: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let route_slots_per_day = env_map
            .get("ROUTE_SLOTS_PER_DAY")
            .map(|s| s.as_str())
            .unwrap_or("2")
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "ROUTE_SLOTS_PER_DAY".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;
        if route_slots_per_day == 0 {
            return Err(ConfigError::InvalidValue(
                "ROUTE_SLOTS_PER_DAY".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let route_weekday_labels: Vec<String> = env_map
            .get("ROUTE_WEEKDAY_LABELS")
            .map(|s| s.as_str())
            .unwrap_or("mon,tue,wed,thu,fri")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if route_weekday_labels.is_empty() {
            return Err(ConfigError::InvalidValue(
                "ROUTE_WEEKDAY_LABELS".to_string(),
                "must name at least one weekday".to_string(),
            ));
        }

        Ok(Config {
            port,
            database_path,
            route_slots_per_day,
            route_weekday_labels,
        })
    }
}
