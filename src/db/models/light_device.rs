//! One-time snapshot of light sensor hardware capabilities, persisted at
//! startup and never buffered or batched.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightDevice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub device_id: String,
    pub label: String,
    /// Wall clock at capture, milliseconds.
    pub timestamp: i64,
    pub max_range: f32,
    /// Minimum delay between events, microseconds.
    pub min_delay: f32,
    pub name: String,
    pub power: f32,
    pub resolution: f32,
    pub sensor_type: String,
    pub vendor: String,
    pub version: String,
}
