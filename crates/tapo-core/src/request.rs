//! Shape of the JSON commands carried inside encrypted frames.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// A device command, serialized to JSON and encrypted before transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    /// Device method name, e.g. `set_device_info`.
    pub method: String,

    /// Current Unix time in seconds.
    ///
    /// The wire name says milliseconds but the firmware has always been
    /// fed seconds; both are preserved for compatibility.
    #[serde(rename = "requestTimeMils")]
    pub request_time_mils: i64,

    /// Method parameters, omitted entirely for parameterless queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

/// Parameters accepted by `set_device_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestParams {
    /// Desired relay state.
    pub device_on: bool,
}

impl Request {
    /// Builds a `set_device_info` request switching the relay.
    pub fn set_device_info(device_on: bool) -> Self {
        Self::new("set_device_info", Some(RequestParams { device_on }))
    }

    /// Builds a `get_device_info` query.
    pub fn get_device_info() -> Self {
        Self::new("get_device_info", None)
    }

    /// Builds a `get_energy_usage` query.
    pub fn get_energy_usage() -> Self {
        Self::new("get_energy_usage", None)
    }

    fn new(method: &str, params: Option<RequestParams>) -> Self {
        Self {
            method: method.to_string(),
            request_time_mils: unix_time_secs(),
            params,
        }
    }
}

fn unix_time_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
