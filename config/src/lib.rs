//! Configuration for the `sandlot` binary.
//!
//! The file lives at `~/.sandlot/config.toml` unless `SANDLOT_CONFIG` points
//! elsewhere. Every section is optional:
//!
//! ```toml
//! [store]
//! path = "~/.sandlot/workloads.db"
//!
//! [workflow]
//! base_url = "https://workflow-gateway.internal"
//! state_machine = "arn:aws:states:us-east-1:123456789012:stateMachine:validate"
//! api_token = "${WORKFLOW_TOKEN}"
//!
//! [scheduler]
//! base_url = "https://scheduler-gateway.internal"
//! cluster = "playground"
//! subnets = ["subnet-a", "subnet-b"]
//! security_group = "sg-0123"
//! execution_role = "arn:aws:iam::123456789012:role/playground"
//!
//! [http]
//! request_timeout_secs = 5
//! call_deadline_secs = 10
//!
//! [server]
//! addr = "127.0.0.1:8080"
//! ```
//!
//! Values missing from the file fall back to `SANDLOT_*` environment
//! variables (see [`ENV_FALLBACKS`]).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sandlot_providers::ClientSettings;
use sandlot_providers::retry::RetryConfig;
use sandlot_providers::scheduler::SchedulerSettings;
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "SANDLOT_CONFIG";

/// Environment variables consulted when the file leaves a key unset.
pub const ENV_FALLBACKS: &[(&str, &str)] = &[
    ("workflow.base_url", "SANDLOT_WORKFLOW_URL"),
    ("workflow.state_machine", "SANDLOT_STATE_MACHINE"),
    ("scheduler.base_url", "SANDLOT_SCHEDULER_URL"),
    ("scheduler.cluster", "SANDLOT_CLUSTER"),
    ("scheduler.subnets", "SANDLOT_SUBNETS"),
    ("scheduler.security_group", "SANDLOT_SECURITY_GROUP"),
    ("scheduler.execution_role", "SANDLOT_EXECUTION_ROLE"),
];

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

// Default value functions for serde (bool::default() is false, so only true needs a fn)
const fn default_true() -> bool {
    true
}

const fn default_container_port() -> u16 {
    8000
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SandlotConfig {
    pub store: Option<StoreConfig>,
    pub workflow: Option<WorkflowConfig>,
    pub scheduler: Option<SchedulerConfig>,
    pub http: Option<HttpConfig>,
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
    #[error("{key} is not configured (set it in the config file or {env})")]
    Missing {
        key: &'static str,
        env: &'static str,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } => Some(path),
            Self::Invalid { .. } | Self::Missing { .. } => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file. `~` and `${VAR}` are expanded.
    pub path: Option<String>,
}

#[derive(Default, Deserialize)]
pub struct WorkflowConfig {
    pub base_url: Option<String>,
    pub state_machine: Option<String>,
    pub api_token: Option<String>,
    #[serde(default)]
    pub allow_insecure_http: bool,
}

#[derive(Deserialize)]
pub struct SchedulerConfig {
    pub base_url: Option<String>,
    pub cluster: Option<String>,
    #[serde(default)]
    pub subnets: Vec<String>,
    pub security_group: Option<String>,
    pub execution_role: Option<String>,
    #[serde(default = "default_container_port")]
    pub container_port: u16,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    #[serde(default = "default_true")]
    pub assign_public_ip: bool,
    pub api_token: Option<String>,
    #[serde(default)]
    pub allow_insecure_http: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            cluster: None,
            subnets: Vec::new(),
            security_group: None,
            execution_role: None,
            container_port: default_container_port(),
            cpu: None,
            memory: None,
            assign_public_ip: true,
            api_token: None,
            allow_insecure_http: false,
        }
    }
}

fn mask(opt: Option<&String>) -> &'static str {
    if opt.is_some() { "[REDACTED]" } else { "None" }
}

// Manual Debug impls to prevent leaking tokens in logs.
impl std::fmt::Debug for WorkflowConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowConfig")
            .field("base_url", &self.base_url)
            .field("state_machine", &self.state_machine)
            .field("api_token", &mask(self.api_token.as_ref()))
            .field("allow_insecure_http", &self.allow_insecure_http)
            .finish()
    }
}

impl std::fmt::Debug for SchedulerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerConfig")
            .field("base_url", &self.base_url)
            .field("cluster", &self.cluster)
            .field("subnets", &self.subnets)
            .field("security_group", &self.security_group)
            .field("execution_role", &self.execution_role)
            .field("container_port", &self.container_port)
            .field("cpu", &self.cpu)
            .field("memory", &self.memory)
            .field("assign_public_ip", &self.assign_public_ip)
            .field("api_token", &mask(self.api_token.as_ref()))
            .field("allow_insecure_http", &self.allow_insecure_http)
            .finish()
    }
}

/// Timeouts and retry policy for gateway calls.
#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "HttpConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "HttpConfig::default_call_deadline_secs")]
    pub call_deadline_secs: u64,
    #[serde(default = "HttpConfig::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "HttpConfig::default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "HttpConfig::default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl HttpConfig {
    const fn default_request_timeout_secs() -> u64 {
        5
    }
    const fn default_call_deadline_secs() -> u64 {
        10
    }
    const fn default_max_retries() -> u32 {
        1
    }
    const fn default_initial_backoff_ms() -> u64 {
        250
    }
    const fn default_max_backoff_ms() -> u64 {
        2000
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_backoff_ms),
            max_delay: Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms)),
            ..RetryConfig::default()
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: Self::default_request_timeout_secs(),
            call_deadline_secs: Self::default_call_deadline_secs(),
            max_retries: Self::default_max_retries(),
            initial_backoff_ms: Self::default_initial_backoff_ms(),
            max_backoff_ms: Self::default_max_backoff_ms(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    pub addr: Option<String>,
    /// Write logs to stderr instead of the log file.
    #[serde(default)]
    pub log_to_stderr: bool,
}

/// Fully resolved settings, ready to build clients from.
#[derive(Debug, Clone)]
pub struct Settings {
    pub store_path: PathBuf,
    pub workflow: Option<WorkflowSettings>,
    pub scheduler: Option<SchedulerClientSettings>,
    pub call_deadline: Duration,
    pub server_addr: SocketAddr,
    pub log_to_stderr: bool,
}

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub client: ClientSettings,
    pub state_machine: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SchedulerClientSettings {
    pub client: ClientSettings,
    pub scheduler: SchedulerSettings,
}

impl Settings {
    pub fn require_workflow(&self) -> Result<&WorkflowSettings, ConfigError> {
        self.workflow.as_ref().ok_or(ConfigError::Missing {
            key: "workflow.base_url",
            env: "SANDLOT_WORKFLOW_URL",
        })
    }

    pub fn require_scheduler(&self) -> Result<&SchedulerClientSettings, ConfigError> {
        self.scheduler.as_ref().ok_or(ConfigError::Missing {
            key: "scheduler.base_url",
            env: "SANDLOT_SCHEDULER_URL",
        })
    }
}

/// Expand `${VAR}` references. Unset variables expand to the empty string;
/// an unclosed `${` is kept literally.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    expand_with(value, &|name| std::env::var(name).ok())
}

fn expand_with(value: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&lookup(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn expand_home(value: &str) -> PathBuf {
    if let Some(rest) = value.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(value)
}

/// Blank strings count as unset.
fn present(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_url(key: &'static str, raw: &str) -> Result<url::Url, ConfigError> {
    url::Url::parse(raw).map_err(|e| ConfigError::Invalid {
        key,
        message: format!("{raw:?}: {e}"),
    })
}

impl SandlotConfig {
    /// Load the config file, if one exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        toml::from_str(&content).map_err(|err| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, err);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source: err,
            }
        })
    }

    /// Resolve against the process environment.
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        self.resolve_with(&|name| std::env::var(name).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve_with(
        &self,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Settings, ConfigError> {
        let expand = |value: Option<&String>| {
            present(value).and_then(|v| present(Some(&expand_with(&v, env))))
        };
        let fallback = |value: Option<&String>, var: &str| {
            expand(value).or_else(|| present(env(var).as_ref()))
        };

        let default_http = HttpConfig::default();
        let http = self.http.as_ref().unwrap_or(&default_http);
        let retry = http.retry_config();
        let request_timeout = Duration::from_secs(http.request_timeout_secs.max(1));

        let store_path = self
            .store
            .as_ref()
            .and_then(|store| expand(store.path.as_ref()))
            .map_or_else(default_store_path, |p| expand_home(&p));

        let default_workflow = WorkflowConfig::default();
        let workflow_cfg = self.workflow.as_ref().unwrap_or(&default_workflow);
        let workflow = match fallback(workflow_cfg.base_url.as_ref(), "SANDLOT_WORKFLOW_URL") {
            Some(raw) => {
                let mut client = ClientSettings::new(parse_url("workflow.base_url", &raw)?);
                client.api_token = expand(workflow_cfg.api_token.as_ref());
                client.allow_insecure_http = workflow_cfg.allow_insecure_http;
                client.request_timeout = request_timeout;
                client.retry = retry.clone();
                Some(WorkflowSettings {
                    client,
                    state_machine: fallback(
                        workflow_cfg.state_machine.as_ref(),
                        "SANDLOT_STATE_MACHINE",
                    ),
                })
            }
            None => None,
        };

        let default_scheduler = SchedulerConfig::default();
        let scheduler_cfg = self.scheduler.as_ref().unwrap_or(&default_scheduler);
        let scheduler = match fallback(scheduler_cfg.base_url.as_ref(), "SANDLOT_SCHEDULER_URL") {
            Some(raw) => {
                let mut client = ClientSettings::new(parse_url("scheduler.base_url", &raw)?);
                client.api_token = expand(scheduler_cfg.api_token.as_ref());
                client.allow_insecure_http = scheduler_cfg.allow_insecure_http;
                client.request_timeout = request_timeout;
                client.retry = retry;

                let subnets = if scheduler_cfg.subnets.is_empty() {
                    env("SANDLOT_SUBNETS")
                        .map(|raw| {
                            raw.split(',')
                                .map(str::trim)
                                .filter(|s| !s.is_empty())
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default()
                } else {
                    scheduler_cfg.subnets.clone()
                };

                let defaults = SchedulerSettings::default();
                Some(SchedulerClientSettings {
                    client,
                    scheduler: SchedulerSettings {
                        cluster: fallback(scheduler_cfg.cluster.as_ref(), "SANDLOT_CLUSTER"),
                        subnets,
                        security_group: fallback(
                            scheduler_cfg.security_group.as_ref(),
                            "SANDLOT_SECURITY_GROUP",
                        ),
                        execution_role: fallback(
                            scheduler_cfg.execution_role.as_ref(),
                            "SANDLOT_EXECUTION_ROLE",
                        ),
                        container_port: scheduler_cfg.container_port,
                        cpu: present(scheduler_cfg.cpu.as_ref()).unwrap_or(defaults.cpu),
                        memory: present(scheduler_cfg.memory.as_ref()).unwrap_or(defaults.memory),
                        assign_public_ip: scheduler_cfg.assign_public_ip,
                    },
                })
            }
            None => None,
        };

        let server = self.server.as_ref();
        let addr = server
            .and_then(|s| present(s.addr.as_ref()))
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let server_addr = addr.parse().map_err(|e| ConfigError::Invalid {
            key: "server.addr",
            message: format!("{addr:?}: {e}"),
        })?;

        Ok(Settings {
            store_path,
            workflow,
            scheduler,
            call_deadline: Duration::from_secs(http.call_deadline_secs.max(1)),
            server_addr,
            log_to_stderr: server.is_some_and(|s| s.log_to_stderr),
        })
    }
}

/// `SANDLOT_CONFIG`, else `~/.sandlot/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".sandlot").join("config.toml"))
}

/// Directory for state and logs: `~/.sandlot`, else `./.sandlot`.
#[must_use]
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".sandlot"))
        .unwrap_or_else(|| PathBuf::from(".sandlot"))
}

fn default_store_path() -> PathBuf {
    data_dir().join("workloads.db")
}
