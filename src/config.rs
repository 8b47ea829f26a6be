//! Environment configuration.

use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::notifications::DispatcherConfig;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub nats_url: Option<String>,
    pub admin_email: Option<String>,
    pub notification_workers: usize,
    pub notification_queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Ok(Self {
            database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: parse_or(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 10)?,
            port: parse_or(get("PORT"), "PORT", 8083)?,
            nats_url: get("NATS_URL"),
            admin_email: get("ADMIN_EMAIL"),
            notification_workers: parse_or(get("NOTIFICATION_WORKERS"), "NOTIFICATION_WORKERS", 2)?,
            notification_queue_capacity: parse_or(get("NOTIFICATION_QUEUE_CAPACITY"), "NOTIFICATION_QUEUE_CAPACITY", 256)?,
        })
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            workers: self.notification_workers,
            queue_capacity: self.notification_queue_capacity,
            admin_email: self.admin_email.clone(),
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}
