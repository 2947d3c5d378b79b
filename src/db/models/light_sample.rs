//! Light sample data model.
//!
//! One accepted ambient light reading: a raw sensor event that passed both
//! the throttle and change-detection rules.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightSample {
    /// Row id; `None` until the sample is persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub device_id: String,
    pub label: String,
    /// Wall clock at acceptance, milliseconds.
    pub timestamp: i64,
    /// Monotonic driver timestamp, nanoseconds.
    pub event_timestamp: i64,
    /// Illuminance in lux.
    pub light: f32,
    pub accuracy: i32,
}
