//! TOML-based configuration for the console.
//!
//! Reads and writes `AppConfig` at the platform-appropriate location:
//! - Windows:  `%APPDATA%\camctl\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/camctl/config.toml` or `~/.config/camctl/config.toml`
//! - macOS:    `~/Library/Application Support/camctl/config.toml`
//!
//! A different file can be given on the command line.  A missing file yields
//! the defaults: no cameras, no scene switcher and no matrix.
//!
//! ```toml
//! [console]
//! log_level = "info"
//! command_timeout_ms = 500
//! speed_rounding = "truncate"
//!
//! [[cameras]]
//! id = 1
//! host = "192.168.0.21"
//! protocol = "strict"
//! zoom_speed = { min = 0, max = 7 }
//!
//! [scene_switcher]
//! host = "127.0.0.1"
//!
//! [matrix]
//! host = "192.168.0.40"
//! reset_macro = "lecture"
//! inputs = [{ name = "lectern", port = 8 }]
//! outputs = [{ name = "stream", port = 4 }]
//!
//! [[matrix.macros]]
//! name = "lecture"
//! routes = [{ input = "lectern", outputs = ["stream"] }]
//!
//! [[matrix.rules]]
//! when = { input = "lectern", output = "stream" }
//! actions = [{ type = "add_overrides", overrides = [{ scene = "3.0", name = "3.0 Lectern" }] }]
//! ```
//!
//! # Validation
//!
//! Everything that would make a feature misbehave later is rejected at load
//! time with [`ConfigError::Invalid`]: inverted ranges, duplicate camera ids,
//! duplicate matrix ports or names, macros and rules naming unknown ports,
//! an output routed twice in one macro, empty destination lists, an unknown
//! reset macro, and override keys without a scene number.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camctl_core::matrix::{MatrixRule, RouteCondition, RuleAction};
use camctl_core::{
    parse_scene_id, CameraLimits, MatrixMapping, Port, SpeedRange, SpeedRounding, ViscaVariant,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::matrix_reconciler::{MatrixMacro, MatrixSettings, NamedPort};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The content parsed but is inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_switcher: Option<SceneSwitcherConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<MatrixConfig>,
}

/// General console behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsoleConfig {
    /// `tracing` log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Wait after each transmitted camera command.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// How zoom trigger positions map onto zoom speeds.
    #[serde(default)]
    pub speed_rounding: SpeedRounding,
}

/// One PTZ camera.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraConfig {
    /// Camera number; also the minor scene number for camera-specific scenes.
    pub id: u8,
    pub host: String,
    #[serde(default = "default_camera_port")]
    pub port: u16,
    #[serde(default)]
    pub protocol: ViscaVariant,
    #[serde(default = "default_pan_speed")]
    pub pan_speed: SpeedRange,
    #[serde(default = "default_tilt_speed")]
    pub tilt_speed: SpeedRange,
    #[serde(default = "default_zoom_speed")]
    pub zoom_speed: SpeedRange,
    #[serde(default = "default_focus_speed")]
    pub focus_speed: SpeedRange,
    #[serde(default = "default_preset")]
    pub preset: SpeedRange,
}

/// Scene-switching tool connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneSwitcherConfig {
    pub host: String,
    #[serde(default = "default_scene_switcher_port")]
    pub port: u16,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

/// Matrix device dialect.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum MatrixProtocol {
    #[default]
    #[serde(rename = "mt-viki")]
    MtViki,
}

/// Video matrix device, its ports, macros and rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatrixConfig {
    pub host: String,
    #[serde(default = "default_matrix_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub protocol: MatrixProtocol,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub inputs: Vec<PortConfig>,
    #[serde(default)]
    pub outputs: Vec<PortConfig>,
    #[serde(default)]
    pub macros: Vec<MacroConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_macro: Option<String>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// A named physical port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortConfig {
    pub name: String,
    pub port: Port,
}

/// A named set of routes, by port name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MacroConfig {
    pub name: String,
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteConfig {
    pub input: String,
    pub outputs: Vec<String>,
}

/// Condition → actions entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<ConditionConfig>,
    pub actions: Vec<ActionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionConfig {
    pub input: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    AddOverrides { overrides: Vec<OverrideConfig> },
    ClearOverrides,
}

/// Scene name used for scene id `scene` (e.g. `"3.0"`) while the rule holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverrideConfig {
    pub scene: String,
    pub name: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_command_timeout_ms() -> u64 {
    500
}
fn default_camera_port() -> u16 {
    52381
}
fn default_pan_speed() -> SpeedRange {
    CameraLimits::default().pan
}
fn default_tilt_speed() -> SpeedRange {
    CameraLimits::default().tilt
}
fn default_zoom_speed() -> SpeedRange {
    CameraLimits::default().zoom
}
fn default_focus_speed() -> SpeedRange {
    CameraLimits::default().focus
}
fn default_preset() -> SpeedRange {
    CameraLimits::default().preset
}
fn default_scene_switcher_port() -> u16 {
    4455
}
fn default_reconnect_delay_ms() -> u64 {
    5000
}
fn default_matrix_port() -> u16 {
    80
}
fn default_request_timeout_ms() -> u64 {
    1000
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            command_timeout_ms: default_command_timeout_ms(),
            speed_rounding: SpeedRounding::default(),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl ConsoleConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl CameraConfig {
    pub fn limits(&self) -> CameraLimits {
        CameraLimits {
            pan: self.pan_speed,
            tilt: self.tilt_speed,
            zoom: self.zoom_speed,
            focus: self.focus_speed,
            preset: self.preset,
        }
    }
}

impl SceneSwitcherConfig {
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl MatrixConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Resolves port names and builds the reconciler settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for any inconsistency listed in the
    /// module documentation.
    pub fn settings(&self) -> Result<MatrixSettings, ConfigError> {
        let inputs = named_ports("input", &self.inputs)?;
        let outputs = named_ports("output", &self.outputs)?;

        let mut macro_names = HashSet::new();
        let mut macros = Vec::with_capacity(self.macros.len());
        for m in &self.macros {
            if !macro_names.insert(m.name.as_str()) {
                return Err(invalid(format!("duplicate matrix macro '{}'", m.name)));
            }
            macros.push(MatrixMacro {
                name: m.name.clone(),
                routes: macro_routes(m, &inputs, &outputs)?,
            });
        }

        if let Some(reset) = &self.reset_macro {
            if !macro_names.contains(reset.as_str()) {
                return Err(invalid(format!("reset_macro '{reset}' is not a configured macro")));
            }
        }

        let rules = self
            .rules
            .iter()
            .map(|rule| matrix_rule(rule, &inputs, &outputs))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MatrixSettings {
            inputs,
            outputs,
            macros,
            reset_macro: self.reset_macro.clone(),
            rules,
        })
    }
}

fn named_ports(kind: &str, ports: &[PortConfig]) -> Result<Vec<NamedPort>, ConfigError> {
    let mut names = HashSet::new();
    let mut numbers = HashSet::new();
    for p in ports {
        if !names.insert(p.name.as_str()) {
            return Err(invalid(format!("duplicate matrix {kind} name '{}'", p.name)));
        }
        if !numbers.insert(p.port) {
            return Err(invalid(format!("duplicate matrix {kind} port {}", p.port)));
        }
    }
    Ok(ports
        .iter()
        .map(|p| NamedPort {
            name: p.name.clone(),
            port: p.port,
        })
        .collect())
}

fn lookup(kind: &str, ports: &[NamedPort], name: &str) -> Result<Port, ConfigError> {
    ports
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.port)
        .ok_or_else(|| invalid(format!("unknown matrix {kind} '{name}'")))
}

fn macro_routes(
    m: &MacroConfig,
    inputs: &[NamedPort],
    outputs: &[NamedPort],
) -> Result<MatrixMapping, ConfigError> {
    let mut seen = HashSet::new();
    let mut routes = Vec::with_capacity(m.routes.len());
    for route in &m.routes {
        if route.outputs.is_empty() {
            return Err(invalid(format!(
                "macro '{}': destination list for '{}' is empty",
                m.name, route.input
            )));
        }
        let input = lookup("input", inputs, &route.input)?;
        let mut targets = Vec::with_capacity(route.outputs.len());
        for name in &route.outputs {
            let output = lookup("output", outputs, name)?;
            if !seen.insert(output) {
                return Err(invalid(format!(
                    "macro '{}': output '{name}' is routed more than once",
                    m.name
                )));
            }
            targets.push(output);
        }
        routes.push((input, targets));
    }
    Ok(MatrixMapping::from_routes(routes))
}

fn matrix_rule(
    rule: &RuleConfig,
    inputs: &[NamedPort],
    outputs: &[NamedPort],
) -> Result<MatrixRule, ConfigError> {
    let when = match &rule.when {
        Some(c) => Some(RouteCondition {
            input: lookup("input", inputs, &c.input)?,
            output: lookup("output", outputs, &c.output)?,
        }),
        None => None,
    };
    let mut actions = Vec::with_capacity(rule.actions.len());
    for action in &rule.actions {
        actions.push(match action {
            ActionConfig::ClearOverrides => RuleAction::ClearOverrides,
            ActionConfig::AddOverrides { overrides } => {
                let mut entries = Vec::with_capacity(overrides.len());
                for o in overrides {
                    let id = parse_scene_id(&o.scene);
                    if id.is_absent() {
                        return Err(invalid(format!(
                            "override key '{}' has no scene number",
                            o.scene
                        )));
                    }
                    entries.push((id, o.name.clone()));
                }
                RuleAction::AddOverrides(entries)
            }
        });
    }
    Ok(MatrixRule { when, actions })
}

impl AppConfig {
    /// Checks everything that can be checked without touching the network.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();
        for camera in &self.cameras {
            if !ids.insert(camera.id) {
                return Err(invalid(format!("duplicate camera id {}", camera.id)));
            }
            let ranges = [
                ("pan_speed", camera.pan_speed),
                ("tilt_speed", camera.tilt_speed),
                ("zoom_speed", camera.zoom_speed),
                ("focus_speed", camera.focus_speed),
                ("preset", camera.preset),
            ];
            for (name, range) in ranges {
                if !range.is_valid() {
                    return Err(invalid(format!(
                        "camera {}: {name} min {} is greater than max {}",
                        camera.id, range.min, range.max
                    )));
                }
            }
        }
        if let Some(matrix) = &self.matrix {
            matrix.settings()?;
        }
        Ok(())
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads and validates the config at the default location.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads and validates `AppConfig` from `path`, returning the defaults if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed and
/// [`ConfigError::Invalid`] if it is inconsistent.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            cfg.validate()?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory including the `camctl` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("camctl"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("camctl"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support").join("camctl"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
