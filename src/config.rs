// src/config.rs

//! Manages client configuration: loading, resolving defaults, and validation.

use crate::connection::{AuthMarkers, SessionSettings};
use crate::core::link::{DEFAULT_POLL_INTERVAL, DEFAULT_WATCHER_TIMEOUT, Link, LinkSettings};
use crate::core::protocol::ProtocolConstants;
use crate::core::protocol::line_codec::DEFAULT_MAX_LINE_LENGTH;
use crate::core::tasks::{self, CalendarSchedule, Timer};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

/// Configuration for TLS on the outbound connection.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// The name checked against the server certificate. Defaults to `host`.
    #[serde(default)]
    pub server_name: Option<String>,
    /// A PEM bundle of trusted roots. The bundled web PKI roots are used if unset.
    #[serde(default)]
    pub ca_path: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// The line written at the login prompt.
    #[serde(default = "default_credentials_command")]
    pub command: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            command: default_credentials_command(),
        }
    }
}

fn default_credentials_command() -> String {
    "connect {username} {password}".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MarkersConfig {
    #[serde(default = "default_login_prompt")]
    pub login_prompt: String,
    #[serde(default = "default_auth_success")]
    pub auth_success: String,
    #[serde(default = "default_auth_failure")]
    pub auth_failure: String,
}

impl Default for MarkersConfig {
    fn default() -> Self {
        let markers = AuthMarkers::default();
        Self {
            login_prompt: markers.login_prompt,
            auth_success: markers.auth_success,
            auth_failure: markers.auth_failure,
        }
    }
}

fn default_login_prompt() -> String {
    AuthMarkers::default().login_prompt
}
fn default_auth_success() -> String {
    AuthMarkers::default().auth_success
}
fn default_auth_failure() -> String {
    AuthMarkers::default().auth_failure
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProtocolConfig {
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default = "default_kwarg_delimiter")]
    pub kwarg_delimiter: String,
    #[serde(default = "default_list_delimiter")]
    pub list_delimiter: String,
    /// Lines written once the session becomes active, after placeholder
    /// substitution.
    #[serde(default)]
    pub setup_commands: Vec<String>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            kwarg_delimiter: default_kwarg_delimiter(),
            list_delimiter: default_list_delimiter(),
            setup_commands: Vec::new(),
        }
    }
}

fn default_command_prefix() -> String {
    ProtocolConstants::default().command_prefix
}
fn default_kwarg_delimiter() -> String {
    ProtocolConstants::default().kwarg_delimiter
}
fn default_list_delimiter() -> String {
    ProtocolConstants::default().list_delimiter
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WatchersConfig {
    #[serde(with = "humantime_serde", default = "default_watcher_timeout")]
    pub default_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
}

impl Default for WatchersConfig {
    fn default() -> Self {
        Self {
            default_timeout: default_watcher_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_watcher_timeout() -> Duration {
    DEFAULT_WATCHER_TIMEOUT
}
fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KeepaliveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(with = "humantime_serde", default = "default_keepalive_interval")]
    pub interval: Duration,
    #[serde(default = "default_keepalive_command")]
    pub command: String,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_keepalive_interval(),
            command: default_keepalive_command(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_keepalive_interval() -> Duration {
    Duration::from_secs(60)
}
fn default_keepalive_command() -> String {
    "PING".to_string()
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9464
}

/// A scheduled write declared in the config file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TimerConfig {
    pub name: String,
    #[serde(with = "humantime_serde", default)]
    pub every: Option<Duration>,
    #[serde(default)]
    pub cron: Option<String>,
    pub command: String,
    #[serde(default = "default_true")]
    pub pause_when_disconnected: bool,
}

impl TimerConfig {
    /// Builds the timer that writes `command` on this schedule.
    pub fn to_timer(&self) -> Result<Timer> {
        let command = self.command.clone();
        let job = move |link: Link| {
            let command = command.clone();
            async move { link.write(command) }
        };
        let timer = match (self.every, &self.cron) {
            (Some(period), None) => Timer::every(self.name.clone(), period, job),
            (None, Some(expression)) => Timer::cron(self.name.clone(), expression, job)
                .with_context(|| format!("timer '{}' has an invalid cron expression", self.name))?,
            _ => {
                return Err(anyhow!(
                    "timer '{}' must set exactly one of 'every' or 'cron'",
                    self.name
                ));
            }
        };
        Ok(timer.pause_when_disconnected(self.pause_when_disconnected))
    }
}

/// A raw representation of the config file before validation and resolution.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_max_line_length")]
    max_line_length: usize,
    #[serde(default)]
    tls: TlsConfig,
    #[serde(default)]
    credentials: CredentialsConfig,
    #[serde(default)]
    markers: MarkersConfig,
    #[serde(default)]
    protocol: ProtocolConfig,
    #[serde(default)]
    watchers: WatchersConfig,
    #[serde(default)]
    keepalive: KeepaliveConfig,
    #[serde(default)]
    metrics: MetricsConfig,
    #[serde(default)]
    timers: Vec<TimerConfig>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    7777
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}

/// Represents the final, validated client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub max_line_length: usize,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub markers: MarkersConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub watchers: WatchersConfig,
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub timers: Vec<TimerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_line_length: default_max_line_length(),
            tls: TlsConfig::default(),
            credentials: CredentialsConfig::default(),
            markers: MarkersConfig::default(),
            protocol: ProtocolConfig::default(),
            watchers: WatchersConfig::default(),
            keepalive: KeepaliveConfig::default(),
            metrics: MetricsConfig::default(),
            timers: Vec::new(),
        }
    }
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        Self {
            host: raw.host,
            port: raw.port,
            log_level: raw.log_level,
            max_line_length: raw.max_line_length,
            tls: raw.tls,
            credentials: raw.credentials,
            markers: raw.markers,
            protocol: raw.protocol,
            watchers: raw.watchers,
            keepalive: raw.keepalive,
            metrics: raw.metrics,
            timers: raw.timers,
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config in '{path}'"))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let raw_config: RawConfig =
            toml::from_str(contents).context("Failed to parse TOML configuration")?;
        let config = Config::from(raw_config);
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_line_length == 0 {
            return Err(anyhow!("max_line_length cannot be 0"));
        }

        let p = &self.protocol;
        for (name, value) in [
            ("command_prefix", &p.command_prefix),
            ("kwarg_delimiter", &p.kwarg_delimiter),
            ("list_delimiter", &p.list_delimiter),
        ] {
            if value.is_empty() {
                return Err(anyhow!("protocol.{name} cannot be empty"));
            }
        }
        if p.kwarg_delimiter == p.list_delimiter {
            return Err(anyhow!(
                "protocol.kwarg_delimiter and protocol.list_delimiter must differ"
            ));
        }
        if p.kwarg_delimiter.contains('=') || p.list_delimiter.contains('=') {
            return Err(anyhow!("protocol delimiters cannot contain '='"));
        }

        let m = &self.markers;
        if m.login_prompt.is_empty() || m.auth_success.is_empty() || m.auth_failure.is_empty() {
            return Err(anyhow!("markers cannot be empty"));
        }
        if m.auth_success.contains(&m.auth_failure) || m.auth_failure.contains(&m.auth_success) {
            warn!("markers.auth_success and markers.auth_failure overlap; success is checked first.");
        }

        if self.credentials.username.is_empty() {
            warn!("credentials.username is empty.");
        }

        if self.watchers.default_timeout.is_zero() {
            return Err(anyhow!("watchers.default_timeout cannot be 0"));
        }
        if self.watchers.poll_interval.is_zero() {
            return Err(anyhow!("watchers.poll_interval cannot be 0"));
        }
        if self.watchers.poll_interval > self.watchers.default_timeout {
            warn!(
                "watchers.poll_interval ({:?}) exceeds watchers.default_timeout ({:?}); timeouts will be late.",
                self.watchers.poll_interval, self.watchers.default_timeout
            );
        }

        if self.keepalive.enabled {
            if self.keepalive.interval.is_zero() {
                return Err(anyhow!("keepalive.interval cannot be 0"));
            }
            if self.keepalive.command.trim().is_empty() {
                return Err(anyhow!("keepalive.command cannot be empty when enabled"));
            }
        }

        if self.tls.enabled
            && let Some(path) = &self.tls.ca_path
            && path.trim().is_empty()
        {
            return Err(anyhow!("tls.ca_path cannot be empty when set"));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(anyhow!("metrics.port cannot be 0"));
        }

        let mut names = std::collections::HashSet::new();
        for timer in &self.timers {
            if timer.name.trim().is_empty() {
                return Err(anyhow!("timer names cannot be empty"));
            }
            if !names.insert(timer.name.as_str()) {
                return Err(anyhow!("duplicate timer name '{}'", timer.name));
            }
            match (timer.every, &timer.cron) {
                (Some(period), None) if period.is_zero() => {
                    return Err(anyhow!("timer '{}': 'every' cannot be 0", timer.name));
                }
                (Some(_), None) => {}
                (None, Some(expression)) => {
                    CalendarSchedule::parse(expression)
                        .with_context(|| format!("timer '{}'", timer.name))?;
                }
                _ => {
                    return Err(anyhow!(
                        "timer '{}' must set exactly one of 'every' or 'cron'",
                        timer.name
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn protocol_constants(&self) -> ProtocolConstants {
        ProtocolConstants::new(
            &self.protocol.command_prefix,
            &self.protocol.kwarg_delimiter,
            &self.protocol.list_delimiter,
        )
    }

    /// The part of the configuration the core consumes.
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            protocol: self.protocol_constants(),
            default_timeout: self.watchers.default_timeout,
            poll_interval: self.watchers.poll_interval,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            markers: AuthMarkers {
                login_prompt: self.markers.login_prompt.clone(),
                auth_success: self.markers.auth_success.clone(),
                auth_failure: self.markers.auth_failure.clone(),
            },
            credential_command: SessionSettings::render_credentials(
                &self.credentials.command,
                &self.credentials.username,
                &self.credentials.password,
            ),
            setup_commands: self.protocol.setup_commands.clone(),
        }
    }

    /// The keepalive timer, if enabled, followed by the config-declared timers.
    pub fn timers(&self) -> Result<Vec<Timer>> {
        let mut timers = Vec::with_capacity(self.timers.len() + 1);
        if self.keepalive.enabled {
            timers.push(tasks::keepalive_timer(
                self.keepalive.interval,
                self.keepalive.command.clone(),
            ));
        }
        for timer in &self.timers {
            timers.push(timer.to_timer()?);
        }
        Ok(timers)
    }

    /// The name the TLS handshake verifies.
    pub fn tls_server_name(&self) -> &str {
        self.tls.server_name.as_deref().unwrap_or(&self.host)
    }
}
