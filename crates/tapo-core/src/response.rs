//! Typed response structures for device JSON replies.
//!
//! Every reply has the shape `{ "result": { ... }, "error_code": 0 }`.
//! The `result` object is a sprawling union of device-info and
//! energy-usage fields; everything in it is optional and unknown fields
//! are ignored, since firmware revisions add and drop fields freely.
//!
//! `error_code == 0` means success. Any other value is a device-reported
//! failure and is handed back to the caller as data, not as an error.

use serde::{Deserialize, Serialize};

/// A decrypted device reply.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Response {
    /// Method result, absent or null for some set-commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<DeviceResult>,

    /// Device status code; `0` is success.
    #[serde(default)]
    pub error_code: i32,
}

impl Response {
    /// Returns true if the device reported success.
    pub fn is_success(&self) -> bool {
        self.error_code == 0
    }
}

/// Union of the `result` fields returned by `get_device_info`,
/// `get_energy_usage`, and `set_device_info`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeviceResult {
    /// Unique device ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Firmware version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fw_ver: Option<String>,

    /// Hardware version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hw_ver: Option<String>,

    /// Device type identifier (e.g. "SMART.TAPOPLUG").
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,

    /// Device model (e.g. "P110").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// MAC address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,

    /// Hardware ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hw_id: Option<String>,

    /// Firmware ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fw_id: Option<String>,

    /// OEM ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oem_id: Option<String>,

    /// Device IP address as reported by the device itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Offset from UTC in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_diff: Option<i64>,

    /// SSID of the joined network (base64 on recent firmware).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,

    /// WiFi signal strength in dBm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i64>,

    /// Coarse signal level (0-3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_level: Option<i64>,

    /// Auto-off status ("on"/"off").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_off_status: Option<String>,

    /// Seconds until auto-off fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_off_remain_time: Option<i64>,

    /// Latitude, scaled by 10000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<i64>,

    /// Longitude, scaled by 10000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<i64>,

    /// Device language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,

    /// Avatar name chosen in the app.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    /// Region string (e.g. "Europe/Madrid").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Hardware specs string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specs: Option<String>,

    /// User-assigned nickname (base64 on recent firmware).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,

    /// Whether a location has been configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_set_location_info: Option<bool>,

    /// Current relay state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_on: Option<bool>,

    /// Seconds since the relay was switched on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_time: Option<i64>,

    /// Power-on default behavior.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_states: Option<DefaultStates>,

    /// Overheat protection flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overheated: Option<bool>,

    /// Power protection status ("normal"/...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_protection_status: Option<String>,

    /// Overcurrent status ("normal"/...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overcurrent_status: Option<String>,

    /// Minutes the relay was on today.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today_runtime: Option<i64>,

    /// Minutes the relay was on this month.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_runtime: Option<i64>,

    /// Energy used today in watt-hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today_energy: Option<i64>,

    /// Energy used this month in watt-hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_energy: Option<i64>,

    /// Device-local timestamp ("YYYY-MM-DD HH:MM:SS").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_time: Option<String>,

    /// Electricity charge triple as reported by the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electricity_charge: Option<Vec<i64>>,

    /// Instantaneous power draw in milliwatts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_power: Option<i64>,
}

impl DeviceResult {
    /// Returns true if the relay is known to be on.
    pub fn is_on(&self) -> bool {
        self.device_on == Some(true)
    }
}

/// Power-on default behavior block inside `get_device_info`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DefaultStates {
    /// Behavior type (e.g. "last_states").
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub state_type: Option<String>,

    /// Opaque state payload; shape varies by behavior type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
}
