//! Typed payloads for the frame kinds the monitor service pushes.
//!
//! These are what `ChannelManager::subscribe_typed` decodes `data` into.
//! Field names follow the service's camelCase JSON. Everything beyond the
//! identifiers is optional because sensors report partial readings.

use chrono::NaiveDateTime;
use serde::Deserialize;

/// `ENVIRONMENT_DATA` payload: one sensor snapshot for a lab
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentReading {
    #[serde(default)]
    pub id: Option<u64>,
    pub lab_id: u64,
    #[serde(default)]
    pub lab_name: Option<String>,
    /// °C
    #[serde(default)]
    pub temperature: Option<f64>,
    /// %
    #[serde(default)]
    pub humidity: Option<f64>,
    /// μg/m³
    #[serde(default)]
    pub pm25: Option<f64>,
    /// lux
    #[serde(default)]
    pub illuminance: Option<f64>,
    /// ppm
    #[serde(default)]
    pub co2: Option<f64>,
    #[serde(default)]
    pub online_device_count: Option<u32>,
    #[serde(default)]
    pub total_device_count: Option<u32>,
    #[serde(default, deserialize_with = "lenient_time::deserialize")]
    pub monitor_time: Option<NaiveDateTime>,
    /// SENSOR or MANUAL
    #[serde(default)]
    pub data_source: Option<String>,
    /// 0 normal, 1 warning, 2 danger, 3 critical
    #[serde(default)]
    pub alarm_status: Option<u8>,
    #[serde(default)]
    pub alarm_message: Option<String>,
    #[serde(default)]
    pub quality_level: Option<String>,
    #[serde(default)]
    pub current_people_count: Option<u32>,
}

impl EnvironmentReading {
    pub fn is_alarming(&self) -> bool {
        self.alarm_status.unwrap_or(0) > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmLevel {
    Warning,
    Danger,
    Critical,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HandleStatus {
    Pending,
    Processing,
    Confirmed,
    Resolved,
    Ignored,
    #[serde(other)]
    Unknown,
}

/// `ALARM` payload: a newly raised alarm
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabAlarm {
    #[serde(default)]
    pub id: Option<u64>,
    pub lab_id: u64,
    #[serde(default)]
    pub lab_name: Option<String>,
    /// e.g. TEMP_HIGH, CO2_HIGH
    pub alarm_type: String,
    pub alarm_level: AlarmLevel,
    #[serde(default)]
    pub alarm_message: Option<String>,
    #[serde(default)]
    pub alarm_value: Option<f64>,
    #[serde(default)]
    pub threshold_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_time::deserialize")]
    pub alarm_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub status: Option<HandleStatus>,
}

/// `ALARM_CONFIRMED` / `ALARM_RESOLVED` / `ALARM_IGNORED` payload.
///
/// Only the `*By` / `*At` pair matching the kind is populated.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmStatusChange {
    pub alarm_id: u64,
    #[serde(default)]
    pub lab_id: Option<u64>,
    #[serde(default)]
    pub confirmed_by: Option<String>,
    #[serde(default, deserialize_with = "lenient_time::deserialize")]
    pub confirmed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub resolved_by: Option<String>,
    #[serde(default, deserialize_with = "lenient_time::deserialize")]
    pub resolved_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub ignored_by: Option<String>,
    #[serde(default, deserialize_with = "lenient_time::deserialize")]
    pub ignored_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub remark: Option<String>,
}

impl AlarmStatusChange {
    /// User who performed the transition, whichever it was
    pub fn actor(&self) -> Option<&str> {
        self.confirmed_by
            .as_deref()
            .or(self.resolved_by.as_deref())
            .or(self.ignored_by.as_deref())
    }
}

/// Timestamps arrive either as `yyyy-MM-dd HH:mm:ss` text, ISO-8601 text, or
/// epoch milliseconds depending on which serializer produced the frame.
pub(crate) mod lenient_time {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{de, Deserialize, Deserializer};
    use serde_json::Value;

    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => parse_text(&text)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("unrecognized timestamp '{}'", text))),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .map(|dt| Some(dt.naive_utc()))
                .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", n))),
            Some(other) => Err(de::Error::custom(format!(
                "expected timestamp, found {}",
                other
            ))),
        }
    }

    pub(crate) fn parse_text(text: &str) -> Option<NaiveDateTime> {
        FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    }
}
