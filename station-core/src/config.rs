use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("CALLSIGN must be 1-6 alphanumeric characters")]
    InvalidCallsign,
    #[error("at least one of BBS_STATION_ID, ECHO_STATION_ID, WINLINK_STATION_ID must be enabled")]
    NoStationEnabled,
}

/// One `AUTH` entry: `CALL[-SSID],password`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthEntry {
    pub callsign: String,
    pub ssid: Option<u8>,
    pub password: String,
}

/// The configuration surface the core recognizes, flat like the original
/// `config.ini` the distillation traces back to. Loading from a file and
/// CLI parsing live outside this crate; callers construct this struct and
/// pass it in.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub callsign: String,
    /// `0..=15` enables that station id on this SSID; `None` disables it.
    pub bbs_station_id: Option<u8>,
    pub echo_station_id: Option<u8>,
    pub winlink_station_id: Option<u8>,
    #[serde(default)]
    pub auth: Vec<AuthEntry>,
    pub winlink_server: Option<String>,
    pub winlink_port: Option<u16>,
    #[serde(default = "default_winlink_use_tls")]
    pub winlink_use_tls: bool,
    pub winlink_password: Option<String>,
}

fn default_winlink_use_tls() -> bool {
    true
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.callsign.is_empty()
            || self.callsign.len() > 6
            || !self.callsign.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(ConfigError::InvalidCallsign);
        }
        if self.bbs_station_id.is_none() && self.echo_station_id.is_none() && self.winlink_station_id.is_none() {
            return Err(ConfigError::NoStationEnabled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            callsign: "KK7VZT".to_string(),
            bbs_station_id: Some(1),
            echo_station_id: None,
            winlink_station_id: None,
            auth: Vec::new(),
            winlink_server: None,
            winlink_port: None,
            winlink_use_tls: true,
            winlink_password: None,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn no_station_enabled_is_rejected() {
        let mut config = base();
        config.bbs_station_id = None;
        assert_eq!(config.validate(), Err(ConfigError::NoStationEnabled));
    }

    #[test]
    fn overlong_callsign_is_rejected() {
        let mut config = base();
        config.callsign = "TOOLONGCALL".to_string();
        assert_eq!(config.validate(), Err(ConfigError::InvalidCallsign));
    }
}
