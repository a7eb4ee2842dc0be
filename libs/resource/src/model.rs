//! The managed record and its attribute types.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ResourceError;
use crate::value::AttrValue;

/// Identifier assigned to a record after its first successful apply.
///
/// It is not derived from the node or the configuration; it only marks the
/// record as created.
pub const RECORD_ID: &str = "machine_configuration_apply";

/// Resource type suffix, appended to the provider name.
pub const TYPE_NAME_SUFFIX: &str = "_machine_configuration_apply";

/// Default create timeout.
pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(10 * 60); // 10 minutes

/// Default update timeout.
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(10 * 60); // 10 minutes

/// A string that must never be printed.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sensitive(String);

impl Sensitive {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for Sensitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sensitive(<{} bytes>)", self.0.len())
    }
}

impl From<String> for Sensitive {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Sensitive {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// How a configuration change takes effect on the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Let the node decide between reboot and no-reboot.
    #[default]
    Auto,
    /// Apply and reboot.
    Reboot,
    /// Apply immediately without a reboot; fails if a reboot is needed.
    NoReboot,
    /// Stage for the next boot.
    Staged,
}

impl ApplyMode {
    pub const ALL: [ApplyMode; 4] = [Self::Auto, Self::Reboot, Self::NoReboot, Self::Staged];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Reboot => "reboot",
            Self::NoReboot => "no_reboot",
            Self::Staged => "staged",
        }
    }
}

impl fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplyMode {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ResourceError::InvalidApplyMode(s.to_string()))
    }
}

/// Client credentials for the node API.
///
/// Each value is a base64-encoded PEM block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfiguration {
    pub ca_certificate: String,
    pub client_certificate: String,
    pub client_key: Sensitive,
}

/// Per-operation timeouts.
///
/// `None` means "use the default"; it is persisted as an explicit null so it
/// stays distinguishable from a zero duration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timeouts {
    pub create: Option<String>,
    pub update: Option<String>,
}

impl Timeouts {
    /// Create timeout, or `default` when unset.
    pub fn create(&self, default: Duration) -> Result<Duration, ResourceError> {
        resolve_timeout(self.create.as_deref(), default)
    }

    /// Update timeout, or `default` when unset.
    pub fn update(&self, default: Duration) -> Result<Duration, ResourceError> {
        resolve_timeout(self.update.as_deref(), default)
    }
}

fn resolve_timeout(value: Option<&str>, default: Duration) -> Result<Duration, ResourceError> {
    match value {
        None => Ok(default),
        Some(value) => parse_duration(value).map_err(|reason| ResourceError::InvalidTimeout {
            value: value.to_string(),
            reason,
        }),
    }
}

/// Longest accepted duration, about 2562047h.
pub const MAX_DURATION: Duration = Duration::from_nanos(i64::MAX as u64);

/// Parse a duration string such as `10m`, `1h30m` or `1.5s`.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s.starts_with('-') {
        return Err("negative durations are not allowed".to_string());
    }
    let s = s.strip_prefix('+').unwrap_or(s);
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = 0f64;
    let mut rest = s;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("expected a number in {input:?}"));
        }
        let number: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid number in {input:?}"))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" | "μs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            "" => return Err(format!("missing unit in {input:?}")),
            unit => return Err(format!("unknown unit {unit:?} in {input:?}")),
        };
        rest = &rest[unit_len..];

        total += number * seconds_per_unit;
    }

    let duration = Duration::try_from_secs_f64(total).map_err(|e| format!("{input:?}: {e}"))?;
    if duration > MAX_DURATION {
        return Err(format!("duration {input:?} out of range"));
    }
    Ok(duration)
}

/// One configuration-applied-to-a-node binding.
///
/// The same type carries the config view (caller-supplied values), the plan
/// view (proposed values after planning) and the persisted state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    pub id: AttrValue<String>,
    pub apply_mode: AttrValue<ApplyMode>,
    pub node: AttrValue<String>,
    pub endpoint: AttrValue<String>,
    pub client_configuration: AttrValue<ClientConfiguration>,
    /// Base configuration document.
    pub machine_configuration_input: AttrValue<Sensitive>,
    /// Base configuration with `config_patches` applied.
    pub machine_configuration: AttrValue<Sensitive>,
    pub config_patches: Vec<AttrValue<String>>,
    pub timeouts: Timeouts,
}

impl Record {
    /// Resource type name for a provider.
    pub fn type_name(provider: &str) -> String {
        format!("{provider}{TYPE_NAME_SUFFIX}")
    }
}
