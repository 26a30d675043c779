// Wire models for the plant dashboard document.
//
// The engine only reasons about a handful of fields; everything else the
// backend reports is captured in flattened maps so a snapshot can be
// echoed back wholesale on writes. The set endpoint rejects documents
// that are missing fields it originally sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A temperature setting together with its permitted range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempSetting {
    pub value: f64,
    pub min: f64,
    pub max: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Zone operating mode wrapper (`{"value": N, ...}` on the wire).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneMode {
    pub value: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Central-heating zone state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub comfort_temp: TempSetting,
    pub mode: ZoneMode,
    /// Temporary-override end time. The backend reports it in a 12-hour
    /// form (or not at all) but only accepts 24-hour form on writes, so
    /// it is kept raw until a write normalizes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deroga_until: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full plant dashboard document as last fetched or last
/// written-and-echoed.
///
/// Only ever replaced wholesale, never mutated in place -- readers can
/// not observe a torn state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantData {
    /// Plant operating mode code.
    pub mode: i64,
    /// Domestic hot water target temperature and bounds.
    pub dhw_temp: TempSetting,
    /// Central-heating zone state.
    pub zone: Zone,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Before/after pair the set endpoint expects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlantUpdate {
    pub new_value: PlantData,
    pub old_value: PlantData,
}
