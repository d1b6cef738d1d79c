//! Typed device settings and status reports.
//!
//! The device exposes a handful of key/value system configs plus read-only
//! status endpoints. Keys are closed-world: an unknown name is rejected up
//! front rather than sent to the device.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{config_bail, Error};

/// The writable system configs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    /// Owner name shown on the device.
    Owner,
    /// Clock display, 12h or 24h.
    TimeFormat,
    /// Date display format string.
    DateFormat,
    /// Minutes of inactivity before sleep.
    SleepTimeout,
    /// IANA timezone name.
    Timezone,
}

impl SettingKey {
    pub const ALL: [SettingKey; 5] = [
        SettingKey::Owner,
        SettingKey::TimeFormat,
        SettingKey::DateFormat,
        SettingKey::SleepTimeout,
        SettingKey::Timezone,
    ];

    /// The key name on the device API.
    pub fn api_name(&self) -> &'static str {
        match self {
            SettingKey::Owner => "owner",
            SettingKey::TimeFormat => "time_format",
            SettingKey::DateFormat => "date_format",
            SettingKey::SleepTimeout => "timeout_to_standby",
            SettingKey::Timezone => "timezone",
        }
    }

    /// The name accepted on the command line.
    pub fn cli_name(&self) -> &'static str {
        match self {
            SettingKey::Owner => "owner",
            SettingKey::TimeFormat => "time-format",
            SettingKey::DateFormat => "date-format",
            SettingKey::SleepTimeout => "sleep-timeout",
            SettingKey::Timezone => "timezone",
        }
    }

    /// Checks `value` against the key's expected shape before it goes out.
    pub fn validate(&self, value: &str) -> crate::Result<()> {
        match self {
            SettingKey::TimeFormat => {
                if value != "12h" && value != "24h" {
                    config_bail!("time format must be '12h' or '24h', got '{value}'");
                }
            }
            SettingKey::SleepTimeout => {
                if value.parse::<u32>().is_err() {
                    config_bail!("sleep timeout must be a number of minutes, got '{value}'");
                }
            }
            SettingKey::Owner | SettingKey::DateFormat | SettingKey::Timezone => (),
        }
        Ok(())
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

impl FromStr for SettingKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .into_iter()
            .find(|key| key.cli_name() == s)
            .ok_or_else(|| {
                let valid: Vec<_> = SettingKey::ALL.iter().map(SettingKey::cli_name).collect();
                Error::Config(format!(
                    "unknown setting '{s}', expected one of {}",
                    valid.join(", ")
                ))
            })
    }
}

/// A note template installed on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInfo {
    pub id: String,
    pub name: String,
}

/// Security modes the device supports for wifi networks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WifiSecurity {
    #[default]
    Open,
    Psk,
}

impl WifiSecurity {
    /// The mode name on the device API.
    pub fn api_name(&self) -> &'static str {
        match self {
            WifiSecurity::Open => "nonsec",
            WifiSecurity::Psk => "psk",
        }
    }
}

impl fmt::Display for WifiSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WifiSecurity::Open => f.write_str("open"),
            WifiSecurity::Psk => f.write_str("psk"),
        }
    }
}

impl FromStr for WifiSecurity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(WifiSecurity::Open),
            "psk" => Ok(WifiSecurity::Psk),
            _ => Err(Error::Config(format!(
                "unknown wifi security '{s}', expected 'open' or 'psk'"
            ))),
        }
    }
}

/// A wifi network known to or visible from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub ssid: String,
    pub security: WifiSecurity,
}

/// Everything the device accepts when registering a wifi network. The
/// field set is closed; there are no free-form parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiNetworkConfig {
    pub ssid: String,
    pub security: WifiSecurity,
    pub password: Option<String>,
    /// Off means static addressing; the address fields below then apply.
    pub dhcp: bool,
    pub static_address: Option<String>,
    pub gateway: Option<String>,
    pub network_mask: Option<u8>,
    pub dns1: Option<String>,
    pub dns2: Option<String>,
    pub proxy: bool,
}

impl WifiNetworkConfig {
    pub fn new(ssid: impl Into<String>, security: WifiSecurity) -> Self {
        WifiNetworkConfig {
            ssid: ssid.into(),
            security,
            dhcp: true,
            ..WifiNetworkConfig::default()
        }
    }

    /// Checks the configuration for the combinations the device rejects.
    pub fn validate(&self) -> crate::Result<()> {
        if self.ssid.is_empty() {
            config_bail!("wifi network needs a non-empty ssid");
        }
        match self.security {
            WifiSecurity::Psk if self.password.as_deref().unwrap_or("").is_empty() => {
                config_bail!("psk security needs a password for '{}'", self.ssid);
            }
            WifiSecurity::Open if self.password.is_some() => {
                config_bail!("open network '{}' does not take a password", self.ssid);
            }
            _ => (),
        }
        if !self.dhcp && self.static_address.is_none() {
            config_bail!("static addressing needs an address for '{}'", self.ssid);
        }
        if self.dhcp && self.static_address.is_some() {
            config_bail!("dhcp and a static address are exclusive for '{}'", self.ssid);
        }
        Ok(())
    }
}

/// Report from the storage status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageInfo {
    pub capacity: u64,
    pub available: u64,
}

impl StorageInfo {
    pub fn used(&self) -> u64 {
        self.capacity.saturating_sub(self.available)
    }
}

/// Report from the battery status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryInfo {
    /// Charge percentage, 0 to 100.
    pub level: u32,
    pub plugged: bool,
    pub health: String,
}
