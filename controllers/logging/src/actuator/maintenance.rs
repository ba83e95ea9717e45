//! Maintenance window of the seed log store autoscaler

use crate::error::ControllerError;
use chrono::{NaiveTime, TimeDelta};
use regex::Regex;
use seed_client::SeedClientTrait;

/// Namespace of the shoot-info ConfigMap
pub const SHOOT_INFO_NAMESPACE: &str = "kube-system";
/// ConfigMap describing the seed's own shoot
pub const SHOOT_INFO_NAME: &str = "shoot-info";

pub const DEFAULT_BEGIN: &str = "220000-0000";
pub const DEFAULT_END: &str = "230000-0000";

/// Begin and end in `HHMMSS±ZZZZ`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceWindow {
    pub begin: String,
    pub end: String,
}

impl Default for MaintenanceWindow {
    fn default() -> Self {
        Self {
            begin: DEFAULT_BEGIN.to_string(),
            end: DEFAULT_END.to_string(),
        }
    }
}

/// A wall-clock time with its zone offset kept verbatim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceTime<'a> {
    time: NaiveTime,
    offset: &'a str,
}

impl<'a> MaintenanceTime<'a> {
    /// Parse `HHMMSS+ZZZZ`, e.g. `220000+0100`
    pub fn parse(value: &'a str) -> Result<Self, ControllerError> {
        let invalid = || ControllerError::InvalidConfig(format!("invalid maintenance time '{}', expected HHMMSS+ZZZZ", value));

        let re = Regex::new(r"^(\d{6})([+-]\d{4})$")
            .map_err(|e| ControllerError::InvalidConfig(format!("failed to compile regex: {}", e)))?;
        let captures = re.captures(value).ok_or_else(invalid)?;
        let (clock, offset) = match (captures.get(1), captures.get(2)) {
            (Some(clock), Some(offset)) => (clock.as_str(), offset.as_str()),
            _ => return Err(invalid()),
        };
        let time = NaiveTime::parse_from_str(clock, "%H%M%S").map_err(|_| invalid())?;
        Ok(Self { time, offset })
    }

    /// Shift by whole hours, wrapping at midnight
    #[must_use]
    pub fn add_hours(self, hours: i64) -> Self {
        let (time, _) = self.time.overflowing_add_signed(TimeDelta::hours(hours));
        Self { time, ..self }
    }

    /// Back to `HHMMSS+ZZZZ` with the original offset
    pub fn formatted(&self) -> String {
        format!("{}{}", self.time.format("%H%M%S"), self.offset)
    }
}

/// Window for the seed log store: one hour after the seed's own shoot
/// maintenance window, or the default window when the seed is no shoot
pub async fn compute_window(seed: &dyn SeedClientTrait) -> Result<MaintenanceWindow, ControllerError> {
    let Some(shoot_info) = seed.get_config_map(SHOOT_INFO_NAMESPACE, SHOOT_INFO_NAME).await? else {
        return Ok(MaintenanceWindow::default());
    };

    let data = shoot_info.data.unwrap_or_default();
    let shifted = |key: &str| -> Result<String, ControllerError> {
        let value = data.get(key).map(String::as_str).unwrap_or_default();
        Ok(MaintenanceTime::parse(value)?.add_hours(1).formatted())
    };
    Ok(MaintenanceWindow {
        begin: shifted("maintenanceBegin")?,
        end: shifted("maintenanceEnd")?,
    })
}
