//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and `WC_*`
//! environment variables, merging them with proper precedence, and applying
//! the result onto a [`CheckConfig`].
//!
//! Precedence, lowest to highest: built-in defaults, config files (XDG, then
//! home, then local), environment variables, command-line flags.

use crate::error::WhoisCheckError;
use crate::types::{CheckConfig, ServerAddress};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Output formats accepted in `[output] default_format`.
pub const OUTPUT_FORMATS: &[&str] = &["table", "json", "csv"];

/// Configuration loaded from TOML files.
///
/// ```toml
/// [defaults]
/// concurrency = 20
/// timeout = "8s"
/// referral_timeout = "4s"
///
/// [servers]
/// "co.uk" = "whois.nic.uk"
/// test = "127.0.0.1:4343"
///
/// [output]
/// default_format = "table"
/// sort = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Default values for lookup options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Suffix -> `host[:port]` overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<HashMap<String, String>>,

    /// Output formatting preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,
}

/// Default configuration values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Per-query timeout (e.g. "8s", "500ms")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_referral_hops: Option<usize>,

    /// Wall-clock bound for a whole batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,

    /// Root broker as `host[:port]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_rate_limited: Option<bool>,

    /// Run the DNS and website probes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<bool>,
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// One of "table", "json", "csv"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_format: Option<String>,

    /// List available domains first in the table view
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<bool>,
}

/// Configuration discovery and loading functionality.
#[derive(Debug, Default)]
pub struct ConfigManager;

impl ConfigManager {
    pub fn new() -> Self {
        Self
    }

    /// Load and validate configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, WhoisCheckError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(WhoisCheckError::file_error(
                path.to_string_lossy(),
                "configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            WhoisCheckError::file_error(
                path.to_string_lossy(),
                format!("failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content)?;
        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// A file that exists but fails to parse or validate is skipped with a
    /// warning.
    pub fn discover_and_load(&self) -> FileConfig {
        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        candidates
            .into_iter()
            .flatten()
            .fold(FileConfig::default(), |merged, path| match self.load_file(&path) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded config file");
                    self.merge_configs(merged, config)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring config file");
                    merged
                }
            })
    }

    /// `./whois-check.toml` or `./.whois-check.toml`.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./whois-check.toml", "./.whois-check.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// `~/.whois-check.toml` or `~/whois-check.toml`.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".whois-check.toml", "whois-check.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// `$XDG_CONFIG_HOME/whois-check/config.toml`, defaulting to `~/.config`.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("whois-check").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations; values from `higher` win.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(lower), Some(higher)) => Some(DefaultsConfig {
                    concurrency: higher.concurrency.or(lower.concurrency),
                    timeout: higher.timeout.or(lower.timeout),
                    referral_timeout: higher.referral_timeout.or(lower.referral_timeout),
                    max_referral_hops: higher.max_referral_hops.or(lower.max_referral_hops),
                    deadline: higher.deadline.or(lower.deadline),
                    broker: higher.broker.or(lower.broker),
                    retry_rate_limited: higher.retry_rate_limited.or(lower.retry_rate_limited),
                    probe: higher.probe.or(lower.probe),
                }),
                (lower, higher) => higher.or(lower),
            },
            servers: match (lower.servers, higher.servers) {
                (Some(mut lower), Some(higher)) => {
                    lower.extend(higher);
                    Some(lower)
                }
                (lower, higher) => higher.or(lower),
            },
            output: match (lower.output, higher.output) {
                (Some(lower), Some(higher)) => Some(OutputConfig {
                    default_format: higher.default_format.or(lower.default_format),
                    sort: higher.sort.or(lower.sort),
                }),
                (lower, higher) => higher.or(lower),
            },
        }
    }

    /// Validate a configuration for common issues.
    pub fn validate_config(&self, config: &FileConfig) -> Result<(), WhoisCheckError> {
        if let Some(defaults) = &config.defaults {
            if let Some(concurrency) = defaults.concurrency {
                validate_concurrency(concurrency)?;
            }

            for (name, value) in [
                ("timeout", &defaults.timeout),
                ("referral_timeout", &defaults.referral_timeout),
                ("deadline", &defaults.deadline),
            ] {
                if let Some(value) = value {
                    require_duration(name, value)?;
                }
            }

            if let Some(broker) = &defaults.broker {
                ServerAddress::parse(broker)?;
            }
        }

        if let Some(servers) = &config.servers {
            for (suffix, server) in servers {
                if suffix.trim().trim_start_matches('.').is_empty() {
                    return Err(WhoisCheckError::config("server suffix cannot be empty"));
                }
                ServerAddress::parse(server).map_err(|_| {
                    WhoisCheckError::config(format!(
                        "invalid server '{}' for suffix '{}'",
                        server, suffix
                    ))
                })?;
            }
        }

        if let Some(format) = config.output.as_ref().and_then(|o| o.default_format.as_deref()) {
            if !OUTPUT_FORMATS.contains(&format) {
                return Err(WhoisCheckError::config(format!(
                    "unknown output format '{}', use one of: {}",
                    format,
                    OUTPUT_FORMATS.join(", ")
                )));
            }
        }

        Ok(())
    }
}

impl FileConfig {
    /// Layer this file's values onto `config`.
    pub fn apply(&self, mut config: CheckConfig) -> Result<CheckConfig, WhoisCheckError> {
        if let Some(defaults) = &self.defaults {
            if let Some(concurrency) = defaults.concurrency {
                config = config.with_concurrency(concurrency);
            }
            if let Some(timeout) = &defaults.timeout {
                config = config.with_timeout(require_duration("timeout", timeout)?);
            }
            if let Some(timeout) = &defaults.referral_timeout {
                config = config.with_referral_timeout(require_duration("referral_timeout", timeout)?);
            }
            if let Some(hops) = defaults.max_referral_hops {
                config = config.with_max_referral_hops(hops);
            }
            if let Some(deadline) = &defaults.deadline {
                config = config.with_batch_deadline(Some(require_duration("deadline", deadline)?));
            }
            if let Some(broker) = &defaults.broker {
                config = config.with_broker(ServerAddress::parse(broker)?);
            }
            if let Some(retry) = defaults.retry_rate_limited {
                config.retry_rate_limited = retry;
            }
            if let Some(probe) = defaults.probe {
                config = config.with_probes(probe, probe);
            }
        }

        if let Some(servers) = &self.servers {
            for (suffix, server) in servers {
                config = config.with_server(suffix, ServerAddress::parse(server)?);
            }
        }

        Ok(config)
    }
}

/// Configuration read from `WC_*` environment variables.
///
/// Invalid values are logged and ignored rather than failing the run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub concurrency: Option<usize>,
    pub timeout: Option<Duration>,
    pub referral_timeout: Option<Duration>,
    pub max_referral_hops: Option<usize>,
    pub deadline: Option<Duration>,
    pub broker: Option<ServerAddress>,
    pub probe: Option<bool>,
    pub json: Option<bool>,
    pub csv: Option<bool>,
    pub file: Option<String>,
    pub config: Option<String>,
}

/// Load configuration from the process environment.
pub fn load_env_config() -> EnvConfig {
    load_env_config_from(|name| env::var(name).ok())
}

/// Load configuration through `lookup`, which maps a variable name to its value.
pub fn load_env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    EnvConfig {
        concurrency: var("WC_CONCURRENCY").and_then(|v| {
            env_value("WC_CONCURRENCY", &v, |v| {
                v.trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|c| validate_concurrency(*c).is_ok())
            })
        }),
        timeout: var("WC_TIMEOUT").and_then(|v| env_value("WC_TIMEOUT", &v, parse_duration_string)),
        referral_timeout: var("WC_REFERRAL_TIMEOUT")
            .and_then(|v| env_value("WC_REFERRAL_TIMEOUT", &v, parse_duration_string)),
        max_referral_hops: var("WC_MAX_REFERRAL_HOPS")
            .and_then(|v| env_value("WC_MAX_REFERRAL_HOPS", &v, |v| v.trim().parse().ok())),
        deadline: var("WC_DEADLINE").and_then(|v| env_value("WC_DEADLINE", &v, parse_duration_string)),
        broker: var("WC_BROKER")
            .and_then(|v| env_value("WC_BROKER", &v, |v| ServerAddress::parse(v).ok())),
        probe: var("WC_PROBE").and_then(|v| env_value("WC_PROBE", &v, parse_bool)),
        json: var("WC_JSON").and_then(|v| env_value("WC_JSON", &v, parse_bool)),
        csv: var("WC_CSV").and_then(|v| env_value("WC_CSV", &v, parse_bool)),
        file: var("WC_FILE"),
        config: var("WC_CONFIG"),
    }
}

fn env_value<T, P>(name: &str, raw: &str, parse: P) -> Option<T>
where
    P: Fn(&str) -> Option<T>,
{
    let parsed = parse(raw);
    if parsed.is_some() {
        info!(variable = name, value = raw, "using environment override");
    } else {
        warn!(variable = name, value = raw, "ignoring invalid environment value");
    }
    parsed
}

impl EnvConfig {
    /// Layer the environment values onto `config`.
    pub fn apply(&self, mut config: CheckConfig) -> CheckConfig {
        if let Some(concurrency) = self.concurrency {
            config = config.with_concurrency(concurrency);
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        if let Some(timeout) = self.referral_timeout {
            config = config.with_referral_timeout(timeout);
        }
        if let Some(hops) = self.max_referral_hops {
            config = config.with_max_referral_hops(hops);
        }
        if let Some(deadline) = self.deadline {
            config = config.with_batch_deadline(Some(deadline));
        }
        if let Some(broker) = &self.broker {
            config = config.with_broker(broker.clone());
        }
        if let Some(probe) = self.probe {
            config = config.with_probes(probe, probe);
        }
        config
    }

    /// JSON and CSV cannot both be requested.
    pub fn has_output_format_conflict(&self) -> bool {
        matches!((self.json, self.csv), (Some(true), Some(true)))
    }
}

/// Parse a duration like "500ms", "5s", "2m" or bare seconds ("5").
pub fn parse_duration_string(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(s) = value.strip_suffix('s') {
        s.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(m) = value.strip_suffix('m') {
        m.trim().parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        value.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn validate_concurrency(concurrency: usize) -> Result<(), WhoisCheckError> {
    if (1..=100).contains(&concurrency) {
        Ok(())
    } else {
        Err(WhoisCheckError::config("concurrency must be between 1 and 100"))
    }
}

fn require_duration(name: &str, value: &str) -> Result<Duration, WhoisCheckError> {
    parse_duration_string(value).ok_or_else(|| {
        WhoisCheckError::config(format!(
            "invalid {} '{}', use a format like '500ms', '5s' or '2m'",
            name, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_parse_duration_string() {
        assert_eq!(parse_duration_string("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration_string("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration_string("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration_string("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration_string("invalid"), None);
    }

    #[test]
    fn test_load_valid_config() {
        let temp_file = write_config(
            r#"
[defaults]
concurrency = 25
timeout = "6s"
max_referral_hops = 2

[servers]
"co.uk" = "whois.nic.uk"
test = "127.0.0.1:4343"

[output]
default_format = "json"
"#,
        );

        let config = ConfigManager::new().load_file(temp_file.path()).unwrap();

        let defaults = config.defaults.clone().unwrap();
        assert_eq!(defaults.concurrency, Some(25));
        assert_eq!(defaults.timeout.as_deref(), Some("6s"));

        let check = config.apply(CheckConfig::default()).unwrap();
        assert_eq!(check.concurrency, 25);
        assert_eq!(check.whois_timeout, Duration::from_secs(6));
        assert_eq!(check.max_referral_hops, 2);
        assert_eq!(
            check.custom_servers.get("test"),
            Some(&ServerAddress::new("127.0.0.1", 4343))
        );
        assert_eq!(
            config.output.unwrap().default_format.as_deref(),
            Some("json")
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let manager = ConfigManager::new();

        for content in [
            "[defaults]\nconcurrency = 0\n",
            "[defaults]\ntimeout = \"soon\"\n",
            "[servers]\ncom = \"bad host\"\n",
            "[output]\ndefault_format = \"yaml\"\n",
            "[defaults\n",
        ] {
            let temp_file = write_config(content);
            assert!(manager.load_file(temp_file.path()).is_err(), "{}", content);
        }
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigManager::new()
            .load_file("/nonexistent/whois-check.toml")
            .unwrap_err();
        assert!(matches!(err, WhoisCheckError::FileError { .. }));
    }

    #[test]
    fn test_merge_configs() {
        let manager = ConfigManager::new();

        let lower = FileConfig {
            defaults: Some(DefaultsConfig {
                concurrency: Some(10),
                timeout: Some("5s".to_string()),
                ..Default::default()
            }),
            servers: Some(HashMap::from([
                ("com".to_string(), "whois.a.example".to_string()),
                ("net".to_string(), "whois.b.example".to_string()),
            ])),
            ..Default::default()
        };

        let higher = FileConfig {
            defaults: Some(DefaultsConfig {
                concurrency: Some(25),
                ..Default::default()
            }),
            servers: Some(HashMap::from([(
                "com".to_string(),
                "whois.c.example".to_string(),
            )])),
            ..Default::default()
        };

        let merged = manager.merge_configs(lower, higher);
        let defaults = merged.defaults.unwrap();
        assert_eq!(defaults.concurrency, Some(25));
        assert_eq!(defaults.timeout.as_deref(), Some("5s"));

        let servers = merged.servers.unwrap();
        assert_eq!(servers["com"], "whois.c.example");
        assert_eq!(servers["net"], "whois.b.example");
    }

    #[test]
    fn test_env_config() {
        let vars = HashMap::from([
            ("WC_CONCURRENCY", "30"),
            ("WC_TIMEOUT", "750ms"),
            ("WC_BROKER", "127.0.0.1:4343"),
            ("WC_PROBE", "yes"),
            ("WC_MAX_REFERRAL_HOPS", "lots"),
            ("WC_JSON", "true"),
            ("WC_CSV", "1"),
        ]);
        let env = load_env_config_from(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(env.concurrency, Some(30));
        assert_eq!(env.timeout, Some(Duration::from_millis(750)));
        assert_eq!(env.max_referral_hops, None);
        assert!(env.has_output_format_conflict());

        let config = env.apply(CheckConfig::default());
        assert_eq!(config.concurrency, 30);
        assert_eq!(config.broker, ServerAddress::new("127.0.0.1", 4343));
        assert!(config.probe_dns && config.probe_http);
    }

    #[test]
    fn test_env_rejects_out_of_range_concurrency() {
        let env = load_env_config_from(|name| (name == "WC_CONCURRENCY").then(|| "500".to_string()));
        assert_eq!(env.concurrency, None);
    }
}
