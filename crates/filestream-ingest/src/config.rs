//! Application configuration loaded from environment variables.

use crate::notify::{PubSubConfig, Topics};
use crate::sink::{ClickHouseConfig, TableRef};
use anyhow::Context;
use filestream_core::DEFAULT_INSERT_DEADLINE_SECS;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LEDGER_PATH: &str = "./data/ledger";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Trigger server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    /// RocksDB directory holding the ledger.
    pub ledger_path: PathBuf,

    /// ClickHouse connection URL.
    pub clickhouse_url: String,

    /// Optional ClickHouse credentials.
    pub clickhouse_user: Option<String>,
    pub clickhouse_password: Option<String>,

    /// Sink target table.
    pub table: TableRef,

    /// Retry budget for one sink insertion.
    pub insert_deadline: Duration,

    /// Cloud project owning the notification topics.
    pub project: String,

    /// Pub/Sub service base URL.
    pub pubsub_endpoint: String,

    /// Bearer token for Pub/Sub.
    pub pubsub_auth_token: Option<String>,

    /// Endpoint override for S3-compatible object stores.
    pub s3_endpoint: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `GCP_PROJECT`: Project owning the success and error topics
    ///
    /// Optional:
    /// - `FILESTREAM_BIND_ADDR`: Server bind address (default: "0.0.0.0:8080")
    /// - `FILESTREAM_LEDGER_PATH`: Ledger directory (default: "./data/ledger")
    /// - `CLICKHOUSE_URL`: ClickHouse URL (default: "http://localhost:8123")
    /// - `CLICKHOUSE_USER` / `CLICKHOUSE_PASSWORD`: ClickHouse credentials
    /// - `FILESTREAM_SINK_DATASET`: Sink database (default: "dataset_files_sink_json")
    /// - `FILESTREAM_SINK_TABLE`: Sink table (default: "table_sink")
    /// - `FILESTREAM_INSERT_DEADLINE_SECS`: Insert retry budget (default: 30)
    /// - `PUBSUB_ENDPOINT`: Pub/Sub URL (default: "https://pubsub.googleapis.com")
    /// - `PUBSUB_AUTH_TOKEN`: Pub/Sub bearer token
    /// - `S3_ENDPOINT`: Object store endpoint override
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("FILESTREAM_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let ledger_path = Self::ledger_path_from_env();

        let clickhouse_url =
            std::env::var("CLICKHOUSE_URL").unwrap_or_else(|_| "http://localhost:8123".to_string());

        let defaults = TableRef::default();
        let table = TableRef::new(
            std::env::var("FILESTREAM_SINK_DATASET").unwrap_or(defaults.database),
            std::env::var("FILESTREAM_SINK_TABLE").unwrap_or(defaults.table),
        );

        let insert_deadline = match std::env::var("FILESTREAM_INSERT_DEADLINE_SECS") {
            Ok(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid FILESTREAM_INSERT_DEADLINE_SECS: {raw:?}"))?;
                if secs == 0 {
                    anyhow::bail!("FILESTREAM_INSERT_DEADLINE_SECS must be greater than zero");
                }
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(DEFAULT_INSERT_DEADLINE_SECS),
        };

        let project = std::env::var("GCP_PROJECT")
            .map(|p| p.trim().to_string())
            .ok()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| anyhow::anyhow!("GCP_PROJECT environment variable is required"))?;

        let pubsub_endpoint = std::env::var("PUBSUB_ENDPOINT")
            .unwrap_or_else(|_| PubSubConfig::default().endpoint)
            .trim_end_matches('/')
            .to_string();

        let config = Self {
            bind_addr,
            ledger_path,
            clickhouse_url,
            clickhouse_user: non_empty_var("CLICKHOUSE_USER"),
            clickhouse_password: non_empty_var("CLICKHOUSE_PASSWORD"),
            table,
            insert_deadline,
            project,
            pubsub_endpoint,
            pubsub_auth_token: non_empty_var("PUBSUB_AUTH_TOKEN"),
            s3_endpoint: non_empty_var("S3_ENDPOINT"),
        };

        tracing::info!(
            bind_addr = %config.bind_addr,
            ledger = %config.ledger_path.display(),
            clickhouse_url = %config.clickhouse_url,
            table = %config.table,
            deadline_secs = config.insert_deadline.as_secs(),
            project = %config.project,
            "configuration loaded"
        );

        Ok(config)
    }

    /// Ledger location alone, for commands that only read the ledger.
    pub fn ledger_path_from_env() -> PathBuf {
        std::env::var("FILESTREAM_LEDGER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_LEDGER_PATH))
    }

    pub fn topics(&self) -> Topics {
        Topics::for_project(&self.project)
    }

    pub fn clickhouse(&self) -> ClickHouseConfig {
        ClickHouseConfig {
            url: self.clickhouse_url.clone(),
            user: self.clickhouse_user.clone(),
            password: self.clickhouse_password.clone(),
            ..Default::default()
        }
    }

    pub fn pubsub(&self) -> PubSubConfig {
        PubSubConfig {
            endpoint: self.pubsub_endpoint.clone(),
            auth_token: self.pubsub_auth_token.clone(),
            ..Default::default()
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize config tests that manipulate env vars.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "FILESTREAM_BIND_ADDR",
        "FILESTREAM_LEDGER_PATH",
        "CLICKHOUSE_URL",
        "CLICKHOUSE_USER",
        "CLICKHOUSE_PASSWORD",
        "FILESTREAM_SINK_DATASET",
        "FILESTREAM_SINK_TABLE",
        "FILESTREAM_INSERT_DEADLINE_SECS",
        "GCP_PROJECT",
        "PUBSUB_ENDPOINT",
        "PUBSUB_AUTH_TOKEN",
        "S3_ENDPOINT",
    ];

    fn with_env_vars<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        let saved: Vec<_> = ENV_KEYS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        // SAFETY: Serialized by mutex; only test code touches these vars.
        unsafe {
            for k in ENV_KEYS {
                std::env::remove_var(k);
            }
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
        }

        f();

        // SAFETY: Restoring original env state.
        unsafe {
            for (k, v) in &saved {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn config_defaults() {
        with_env_vars(&[("GCP_PROJECT", "acme")], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.bind_addr, "0.0.0.0:8080");
            assert_eq!(config.ledger_path, PathBuf::from("./data/ledger"));
            assert_eq!(config.clickhouse_url, "http://localhost:8123");
            assert_eq!(config.table.to_string(), "dataset_files_sink_json.table_sink");
            assert_eq!(config.insert_deadline, Duration::from_secs(30));
            assert_eq!(config.pubsub_endpoint, "https://pubsub.googleapis.com");
            assert!(config.pubsub_auth_token.is_none());
            assert!(config.s3_endpoint.is_none());
        });
    }

    #[test]
    fn config_requires_project() {
        with_env_vars(&[], || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("GCP_PROJECT"));
        });
        with_env_vars(&[("GCP_PROJECT", "  ")], || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn config_custom_values() {
        with_env_vars(
            &[
                ("GCP_PROJECT", "acme"),
                ("FILESTREAM_BIND_ADDR", "127.0.0.1:9000"),
                ("FILESTREAM_LEDGER_PATH", "/var/lib/ledger"),
                ("CLICKHOUSE_URL", "http://ch:8123"),
                ("CLICKHOUSE_USER", "writer"),
                ("FILESTREAM_SINK_DATASET", "raw"),
                ("FILESTREAM_SINK_TABLE", "files"),
                ("FILESTREAM_INSERT_DEADLINE_SECS", "5"),
                ("PUBSUB_ENDPOINT", "http://localhost:8085/"),
                ("S3_ENDPOINT", "http://minio:9000"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.bind_addr, "127.0.0.1:9000");
                assert_eq!(config.ledger_path, PathBuf::from("/var/lib/ledger"));
                assert_eq!(config.clickhouse().user.as_deref(), Some("writer"));
                assert_eq!(config.table, TableRef::new("raw", "files"));
                assert_eq!(config.insert_deadline, Duration::from_secs(5));
                assert_eq!(config.pubsub().endpoint, "http://localhost:8085");
                assert_eq!(config.s3_endpoint.as_deref(), Some("http://minio:9000"));
                assert_eq!(
                    config.topics().topic(crate::notify::Channel::Error),
                    "projects/acme/topics/streaming_error_topic"
                );
            },
        );
    }

    #[test]
    fn ledger_path_needs_no_project() {
        with_env_vars(&[], || {
            assert_eq!(Config::ledger_path_from_env(), PathBuf::from("./data/ledger"));
        });
        with_env_vars(&[("FILESTREAM_LEDGER_PATH", "/srv/ledger")], || {
            assert_eq!(Config::ledger_path_from_env(), PathBuf::from("/srv/ledger"));
        });
    }

    #[test]
    fn config_rejects_bad_deadline() {
        with_env_vars(
            &[("GCP_PROJECT", "acme"), ("FILESTREAM_INSERT_DEADLINE_SECS", "soon")],
            || assert!(Config::from_env().is_err()),
        );
        with_env_vars(
            &[("GCP_PROJECT", "acme"), ("FILESTREAM_INSERT_DEADLINE_SECS", "0")],
            || assert!(Config::from_env().is_err()),
        );
    }
}
