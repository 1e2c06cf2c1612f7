use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use time::OffsetDateTime;

/// Sensor kinds reported in a device's `newest_events` map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum SensorKind {
    #[serde(rename = "te")]
    Temperature,
    #[serde(rename = "hu")]
    Humidity,
    #[serde(rename = "il")]
    Illumination,
    #[serde(rename = "mo")]
    Movement,
    /// Event types this exporter does not publish.
    #[serde(other)]
    Unknown,
}

/// Most recent observation of one sensor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorReading {
    #[serde(rename = "val")]
    pub value: f64,
    #[serde(rename = "created_at", with = "time::serde::rfc3339")]
    pub observed_at: OffsetDateTime,
}

/// One device as returned by `GET /1/devices`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceSnapshot {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub firmware_version: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub mac_address: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub bt_mac_address: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub serial_number: String,
    #[serde(default)]
    pub newest_events: HashMap<SensorKind, SensorReading>,
}

impl DeviceSnapshot {
    /// Returns the reading for `kind`, or `None` when the device reported none.
    pub fn reading(&self, kind: SensorKind) -> Option<&SensorReading> {
        self.newest_events.get(&kind)
    }

    pub fn labels(&self) -> LabelSet<'_> {
        LabelSet {
            id: &self.id,
            name: &self.name,
            firmware_version: &self.firmware_version,
            bt_mac_address: &self.bt_mac_address,
            mac_address: &self.mac_address,
            serial_number: &self.serial_number,
        }
    }
}

/// Identity attributes used as the label values of every device series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSet<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub firmware_version: &'a str,
    pub bt_mac_address: &'a str,
    pub mac_address: &'a str,
    pub serial_number: &'a str,
}

impl<'a> LabelSet<'a> {
    /// Label keys, in the order `values()` yields them.
    pub const KEYS: [&'static str; 6] = [
        "id",
        "name",
        "firmware_version",
        "bt_mac_address",
        "mac_address",
        "serial_number",
    ];

    pub fn values(&self) -> [&'a str; 6] {
        [
            self.id,
            self.name,
            self.firmware_version,
            self.bt_mac_address,
            self.mac_address,
            self.serial_number,
        ]
    }
}

// The exposition format has no notion of a missing label value.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
