// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup into an immutable [`AppConfig`] that is passed to each
//! component's constructor.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TOPIC_ID` | Log topic entries are appended to | Required |
//! | `TOPIC_ENCRYPTION_KEY` | AES-GCM key (16, 24 or 32 bytes) | Required |
//! | `OPERATOR_ID` | Account used to mint correlation keys | `0.0.2` |
//! | `EXPLORER_URL` | Base URL for viewer links | `https://explorer.kabuto.sh/testnet` |
//! | `RETRIEVE_TIMEOUT_MS` | Max wait for an entry to be ingested | `30000` |
//! | `RETRIEVE_POLL_INTERVAL_MS` | Store check interval while waiting | `250` |
//! | `STORE_CAPACITY` | Max envelopes retained | `10000` |
//! | `STORE_TTL_SECS` | Envelope retention time | `3600` |
//! | `LEDGER_FINALITY_DELAY_MS` | Local ledger consensus delay | `500` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::cipher::{CipherError, CipherKey};
use crate::ledger::TopicId;
use crate::{retrieval, store};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the log topic identifier.
///
/// Used both to subscribe to the log and to build explorer links.
pub const TOPIC_ID_ENV: &str = "TOPIC_ID";

/// Environment variable name for the shared envelope encryption key.
///
/// The raw UTF-8 bytes of the value are the key, so its length must be
/// exactly 16, 24 or 32 bytes.
pub const ENCRYPTION_KEY_ENV: &str = "TOPIC_ENCRYPTION_KEY";

pub const OPERATOR_ID_ENV: &str = "OPERATOR_ID";
pub const EXPLORER_URL_ENV: &str = "EXPLORER_URL";
pub const RETRIEVE_TIMEOUT_ENV: &str = "RETRIEVE_TIMEOUT_MS";
pub const RETRIEVE_POLL_INTERVAL_ENV: &str = "RETRIEVE_POLL_INTERVAL_MS";
pub const STORE_CAPACITY_ENV: &str = "STORE_CAPACITY";
pub const STORE_TTL_ENV: &str = "STORE_TTL_SECS";
pub const FINALITY_DELAY_ENV: &str = "LEDGER_FINALITY_DELAY_MS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_OPERATOR_ID: &str = "0.0.2";
const DEFAULT_EXPLORER_URL: &str = "https://explorer.kabuto.sh/testnet";
const DEFAULT_FINALITY_DELAY: Duration = Duration::from_millis(500);

/// Default `RUST_LOG` filter when none is set.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("TOPIC_ENCRYPTION_KEY is unusable: {0}")]
    EncryptionKey(#[source] CipherError),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Read `LOG_FORMAT`; anything other than `json` selects pretty output.
    pub fn from_env() -> Self {
        match env::var(LOG_FORMAT_ENV) {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Immutable process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub topic_id: TopicId,
    pub cipher_key: CipherKey,
    pub operator_id: String,
    pub explorer_url: String,
    pub retrieve_timeout: Duration,
    pub retrieve_poll_interval: Duration,
    pub store_capacity: usize,
    pub store_ttl: Duration,
    pub finality_delay: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &'static str| lookup(name).filter(|value| !value.trim().is_empty());

        let host = var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(var(PORT_ENV), PORT_ENV, DEFAULT_PORT)?;
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: HOST_ENV,
                value: host.clone(),
                reason: e.to_string(),
            })?;

        let topic_id = TopicId(var(TOPIC_ID_ENV).ok_or(ConfigError::Missing(TOPIC_ID_ENV))?);

        let key = lookup(ENCRYPTION_KEY_ENV)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::Missing(ENCRYPTION_KEY_ENV))?;
        let cipher_key = CipherKey::new(key.into_bytes()).map_err(ConfigError::EncryptionKey)?;

        let explorer_url = var(EXPLORER_URL_ENV).unwrap_or_else(|| DEFAULT_EXPLORER_URL.to_string());
        url::Url::parse(&explorer_url).map_err(|e| ConfigError::Invalid {
            name: EXPLORER_URL_ENV,
            value: explorer_url.clone(),
            reason: e.to_string(),
        })?;

        let retrieve_timeout = Duration::from_millis(parse_or(
            var(RETRIEVE_TIMEOUT_ENV),
            RETRIEVE_TIMEOUT_ENV,
            retrieval::DEFAULT_TIMEOUT.as_millis() as u64,
        )?);
        let retrieve_poll_interval = Duration::from_millis(parse_or(
            var(RETRIEVE_POLL_INTERVAL_ENV),
            RETRIEVE_POLL_INTERVAL_ENV,
            retrieval::DEFAULT_POLL_INTERVAL.as_millis() as u64,
        )?);
        if retrieve_poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: RETRIEVE_POLL_INTERVAL_ENV,
                value: "0".into(),
                reason: "must be at least 1 ms".into(),
            });
        }

        let store_capacity = parse_or(var(STORE_CAPACITY_ENV), STORE_CAPACITY_ENV, store::DEFAULT_CAPACITY)?;
        if store_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: STORE_CAPACITY_ENV,
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        let store_ttl = Duration::from_secs(parse_or(
            var(STORE_TTL_ENV),
            STORE_TTL_ENV,
            store::DEFAULT_TTL.as_secs(),
        )?);
        let finality_delay = Duration::from_millis(parse_or(
            var(FINALITY_DELAY_ENV),
            FINALITY_DELAY_ENV,
            DEFAULT_FINALITY_DELAY.as_millis() as u64,
        )?);

        Ok(Self {
            bind_addr,
            topic_id,
            cipher_key,
            operator_id: var(OPERATOR_ID_ENV).unwrap_or_else(|| DEFAULT_OPERATOR_ID.to_string()),
            explorer_url,
            retrieve_timeout,
            retrieve_poll_interval,
            store_capacity,
            store_ttl,
            finality_delay,
        })
    }
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}
