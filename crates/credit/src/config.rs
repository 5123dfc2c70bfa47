//! Service configuration.
//!
//! Values come from three layers, highest precedence first:
//!
//! 1. command line flags and their environment variables
//! 2. `config.toml` (`~/.credit_engine/config.toml` unless `--config` is given)
//! 3. built-in defaults
//!
//! ```toml
//! bucket_input = "propostas"
//! bucket_output = "motor-decisao-output"
//! listen = "0.0.0.0:8080"
//! store_root = "/var/lib/credit/store"
//! max_body_bytes = 1048576
//!
//! [worker]
//! concurrency = 4
//! max_deliveries = 3
//! redelivery_delay_ms = 500
//! decision_naming = "random"   # or "source"
//! ```

use clap::Args;
use credit_api::DEFAULT_MAX_UPLOAD_BYTES;
use credit_protocol::defaults::{
    DEFAULT_LISTEN_ADDR, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_DELIVERIES,
    DEFAULT_OUTPUT_BUCKET, DEFAULT_REDELIVERY_DELAY_MS, DEFAULT_WORKER_CONCURRENCY,
};
use credit_worker::{DecisionNaming, DispatcherConfig, WorkerConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("input bucket is not configured (use --bucket-input, BUCKET_INPUT or bucket_input)")]
    MissingInputBucket,

    #[error("invalid listen address {0:?}")]
    InvalidListen(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Flags of `credit serve`.
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Config file (default: ~/.credit_engine/config.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bucket receiving proposals and documents
    #[arg(long, env = "BUCKET_INPUT")]
    pub bucket_input: Option<String>,

    /// Bucket receiving decisions
    #[arg(long, env = "BUCKET_OUTPUT")]
    pub bucket_output: Option<String>,

    /// HTTP listen address
    #[arg(long, env = "CREDIT_LISTEN")]
    pub listen: Option<String>,

    /// Root directory of the filesystem object store
    #[arg(long, env = "CREDIT_STORE_ROOT")]
    pub store_root: Option<PathBuf>,
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub bucket_input: Option<String>,
    pub bucket_output: Option<String>,
    pub listen: Option<String>,
    pub store_root: Option<PathBuf>,
    pub max_body_bytes: Option<usize>,
    pub max_upload_bytes: Option<usize>,
    #[serde(default)]
    pub worker: WorkerSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerSection {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Attempts per notification, including the first.
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,

    #[serde(default = "default_redelivery_delay_ms")]
    pub redelivery_delay_ms: u64,

    #[serde(default)]
    pub decision_naming: DecisionNaming,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_deliveries: default_max_deliveries(),
            redelivery_delay_ms: default_redelivery_delay_ms(),
            decision_naming: DecisionNaming::default(),
        }
    }
}

fn default_concurrency() -> usize {
    DEFAULT_WORKER_CONCURRENCY
}

fn default_max_deliveries() -> u32 {
    DEFAULT_MAX_DELIVERIES
}

fn default_redelivery_delay_ms() -> u64 {
    DEFAULT_REDELIVERY_DELAY_MS
}

/// Load the config file.
///
/// An explicitly given path must exist. The default path is optional and a
/// missing file yields the defaults.
pub fn load_file_config(explicit: Option<&Path>, home: &Path) -> Result<FileConfig> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (home.join("config.toml"), false),
    };
    if !path.exists() {
        return if required {
            Err(ConfigError::NotFound(path))
        } else {
            Ok(FileConfig::default())
        };
    }
    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Toml { path, source })
}

/// Fully resolved settings of a running service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub input_bucket: String,
    pub output_bucket: String,
    pub listen: SocketAddr,
    pub store_root: PathBuf,
    pub max_body_bytes: usize,
    pub max_upload_bytes: usize,
    pub worker: WorkerSection,
}

impl ServiceConfig {
    pub fn resolve(args: &ServeArgs, file: FileConfig, home: &Path) -> Result<Self> {
        let input_bucket = first_non_blank(args.bucket_input.as_deref(), file.bucket_input.as_deref())
            .ok_or(ConfigError::MissingInputBucket)?;
        let output_bucket =
            first_non_blank(args.bucket_output.as_deref(), file.bucket_output.as_deref())
                .unwrap_or_else(|| DEFAULT_OUTPUT_BUCKET.to_string());

        let listen_raw = first_non_blank(args.listen.as_deref(), file.listen.as_deref())
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen = listen_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidListen(listen_raw.clone()))?;

        let store_root = args
            .store_root
            .clone()
            .or(file.store_root)
            .unwrap_or_else(|| home.join("store"));

        let max_body_bytes = file.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES);
        let max_upload_bytes = file.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        for (field, value) in [
            ("max_body_bytes", max_body_bytes),
            ("max_upload_bytes", max_upload_bytes),
            ("worker.concurrency", file.worker.concurrency),
            ("worker.max_deliveries", file.worker.max_deliveries as usize),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        Ok(Self {
            input_bucket,
            output_bucket,
            listen,
            store_root,
            max_body_bytes,
            max_upload_bytes,
            worker: file.worker,
        })
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::new(&self.output_bucket).with_naming(self.worker.decision_naming)
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            input_bucket: self.input_bucket.clone(),
            concurrency: self.worker.concurrency,
            max_deliveries: self.worker.max_deliveries,
            redelivery_delay: Duration::from_millis(self.worker.redelivery_delay_ms),
        }
    }
}

fn first_non_blank(primary: Option<&str>, fallback: Option<&str>) -> Option<String> {
    [primary, fallback]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(bucket_input: Option<&str>) -> ServeArgs {
        ServeArgs {
            bucket_input: bucket_input.map(str::to_string),
            ..ServeArgs::default()
        }
    }

    #[test]
    fn defaults_apply_when_only_the_input_bucket_is_set() {
        let home = Path::new("/home/u/.credit_engine");
        let config = ServiceConfig::resolve(&args(Some("in")), FileConfig::default(), home).unwrap();
        assert_eq!(config.input_bucket, "in");
        assert_eq!(config.output_bucket, "motor-decisao-output");
        assert_eq!(config.listen, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.store_root, home.join("store"));
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(config.worker, WorkerSection::default());
        assert_eq!(config.worker_config().naming, DecisionNaming::Random);
    }

    #[test]
    fn missing_or_blank_input_bucket_is_fatal() {
        let home = Path::new("/h");
        for input in [None, Some(""), Some("   ")] {
            let err = ServiceConfig::resolve(&args(input), FileConfig::default(), home).unwrap_err();
            assert!(matches!(err, ConfigError::MissingInputBucket), "{input:?}");
        }
    }

    #[test]
    fn command_line_overrides_file() {
        let file: FileConfig = toml::from_str(
            r#"
            bucket_input = "from-file"
            bucket_output = "out-file"
            listen = "127.0.0.1:9000"
            "#,
        )
        .unwrap();
        let cli = ServeArgs {
            bucket_input: Some("from-cli".to_string()),
            ..ServeArgs::default()
        };
        let config = ServiceConfig::resolve(&cli, file, Path::new("/h")).unwrap();
        assert_eq!(config.input_bucket, "from-cli");
        assert_eq!(config.output_bucket, "out-file");
        assert_eq!(config.listen.port(), 9000);
    }

    #[test]
    fn blank_flag_falls_back_to_file() {
        let file = FileConfig {
            bucket_input: Some("from-file".to_string()),
            ..FileConfig::default()
        };
        let config = ServiceConfig::resolve(&args(Some("")), file, Path::new("/h")).unwrap();
        assert_eq!(config.input_bucket, "from-file");
    }

    #[test]
    fn worker_section_is_parsed() {
        let file: FileConfig = toml::from_str(
            r#"
            bucket_input = "in"
            [worker]
            concurrency = 8
            decision_naming = "source"
            "#,
        )
        .unwrap();
        let config = ServiceConfig::resolve(&ServeArgs::default(), file, Path::new("/h")).unwrap();
        let dispatcher = config.dispatcher_config();
        assert_eq!(dispatcher.concurrency, 8);
        assert_eq!(dispatcher.max_deliveries, DEFAULT_MAX_DELIVERIES);
        assert_eq!(dispatcher.input_bucket, "in");
        assert_eq!(
            config.worker_config().naming,
            DecisionNaming::SourceDerived
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_listen = ServeArgs {
            listen: Some("not an address".to_string()),
            ..args(Some("in"))
        };
        assert!(matches!(
            ServiceConfig::resolve(&bad_listen, FileConfig::default(), Path::new("/h")),
            Err(ConfigError::InvalidListen(_))
        ));

        let zero: FileConfig = toml::from_str("[worker]\nconcurrency = 0").unwrap();
        assert!(matches!(
            ServiceConfig::resolve(&args(Some("in")), zero, Path::new("/h")),
            Err(ConfigError::Zero { field: "worker.concurrency" })
        ));

        assert!(toml::from_str::<FileConfig>("bucket = \"typo\"").is_err());
    }

    #[test]
    fn default_config_file_is_optional() {
        let temp = TempDir::new().unwrap();
        let file = load_file_config(None, temp.path()).unwrap();
        assert!(file.bucket_input.is_none());

        let missing = temp.path().join("nope.toml");
        assert!(matches!(
            load_file_config(Some(&missing), temp.path()),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn config_file_is_loaded_from_home() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("config.toml"),
            "bucket_input = \"propostas\"\nmax_body_bytes = 2048\n",
        )
        .unwrap();
        let file = load_file_config(None, temp.path()).unwrap();
        let config = ServiceConfig::resolve(&ServeArgs::default(), file, temp.path()).unwrap();
        assert_eq!(config.input_bucket, "propostas");
        assert_eq!(config.max_body_bytes, 2048);

        std::fs::write(temp.path().join("config.toml"), "max_body_bytes = \"x\"").unwrap();
        assert!(matches!(
            load_file_config(None, temp.path()),
            Err(ConfigError::Toml { .. })
        ));
    }
}
