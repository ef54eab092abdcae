use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use chrono::NaiveTime;
use sqlx::postgres::PgConnectOptions;
use thiserror::Error;

use crate::calendar::Calendar;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub user: String,
    pub password: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        if let Some(url) = &self.url {
            return url.parse::<PgConnectOptions>().map_err(|e: sqlx::Error| ConfigError::Invalid {
                key: "DATABASE_URL",
                message: e.to_string(),
            });
        }

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name))
    }
}

#[derive(Clone)]
pub struct TlsSettings {
    pub key_path: PathBuf,
    pub cert_path: PathBuf,
    pub ca_path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    pub fn parse(value: &str) -> Self {
        let origins: Vec<String> = value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            CorsOrigins::Any
        } else {
            CorsOrigins::List(origins)
        }
    }
}

#[derive(Clone)]
pub struct ScheduleSettings {
    pub time: NaiveTime,
    pub calendar: Calendar,
    pub run_on_startup: bool,
}

#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database: DatabaseSettings,
    pub tls: Option<TlsSettings>,
    pub field_encryption: bool,
    pub secret_key: Option<String>,
    pub cors_origins: CorsOrigins,
    pub schedule: ScheduleSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str| {
            var(key)
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false)
        };

        let database = DatabaseSettings {
            url: var("DATABASE_URL"),
            user: var("DB_USER").unwrap_or_else(|| "postgres".to_string()),
            password: var("DB_PASS").unwrap_or_default(),
            name: var("DB_NAME").unwrap_or_else(|| "birthdays".to_string()),
            host: var("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or("DB_PORT", var("DB_PORT"), 5432)?,
            max_connections: parse_or("DB_MAX_CONNECTIONS", var("DB_MAX_CONNECTIONS"), 5)?,
        };

        let tls = if flag("TLS_ENABLED") {
            Some(TlsSettings {
                key_path: var("TLS_KEY_PATH")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::Missing("TLS_KEY_PATH"))?,
                cert_path: var("TLS_CERT_PATH")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::Missing("TLS_CERT_PATH"))?,
                ca_path: var("TLS_CA_PATH").map(PathBuf::from),
            })
        } else {
            None
        };

        let field_encryption = flag("FIELD_ENCRYPTION");
        let secret_key = var("SECRET_KEY");
        if field_encryption && secret_key.is_none() {
            return Err(ConfigError::Missing("SECRET_KEY"));
        }

        let time = match var("REMINDER_TIME") {
            Some(value) => NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| {
                ConfigError::Invalid {
                    key: "REMINDER_TIME",
                    message: e.to_string(),
                }
            })?,
            None => NaiveTime::from_hms_opt(8, 0, 0).ok_or(ConfigError::Invalid {
                key: "REMINDER_TIME",
                message: "default out of range".to_string(),
            })?,
        };

        let calendar = match var("BIRTHDAY_CALENDAR") {
            Some(value) => value.parse::<Calendar>().map_err(|message| ConfigError::Invalid {
                key: "BIRTHDAY_CALENDAR",
                message,
            })?,
            None => Calendar::Persian,
        };

        Ok(Self {
            port: parse_or("PORT", var("PORT"), 5000)?,
            database,
            tls,
            field_encryption,
            secret_key,
            cors_origins: CorsOrigins::parse(&var("CORS_ORIGINS").unwrap_or_else(|| "*".to_string())),
            schedule: ScheduleSettings {
                time,
                calendar,
                run_on_startup: flag("RUN_REMINDERS_ON_STARTUP"),
            },
        })
    }

    pub fn log_configuration(&self) {
        log::info!("Configuration:");
        log::info!("  PORT: {}", self.port);
        match &self.database.url {
            Some(_) => log::info!("  Database: DATABASE_URL"),
            None => log::info!(
                "  Database: {}@{}:{}/{}",
                self.database.user,
                self.database.host,
                self.database.port,
                self.database.name
            ),
        }
        match &self.tls {
            Some(tls) => log::info!("  TLS: enabled (cert {})", tls.cert_path.display()),
            None => log::info!("  TLS: disabled"),
        }
        log::info!("  Field encryption: {}", self.field_encryption);
        match &self.cors_origins {
            CorsOrigins::Any => log::info!("  CORS origins: *"),
            CorsOrigins::List(origins) => log::info!("  CORS origins: {}", origins.join(", ")),
        }
        log::info!(
            "  Reminders: daily at {} ({} calendar)",
            self.schedule.time.format("%H:%M"),
            self.schedule.calendar
        );
    }
}

fn parse_or<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    match value {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
