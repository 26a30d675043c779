// ── Parameter validation and the pending change set ──
//
// Collaborators hand in loosely-typed parameter values (service calls
// arrive as strings); everything is validated and coerced against the
// latest snapshot's bounds before it may enter the pending set. An
// invalid value is logged and dropped -- one bad parameter never fails
// the batch.

use std::collections::HashMap;
use std::str::FromStr;

use strum::{Display, EnumString};
use tracing::{info, warn};

use ariston_api::PlantData;

/// The closed set of remotely settable parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ParamKind {
    /// Plant operating mode (winter/summer/off).
    Mode,
    /// Central-heating zone operating mode (manual/scheduled).
    ChMode,
    /// Central-heating target temperature.
    ChSetTemperature,
    /// Domestic-hot-water target temperature.
    DhwSetTemperature,
}

/// Raw parameter values as handed in by a collaborator.
pub type ParameterMap = HashMap<ParamKind, String>;

/// Plant operating modes the backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PlantMode {
    Winter,
    Summer,
    Off,
}

impl PlantMode {
    /// Wire code for this mode.
    pub fn code(self) -> i64 {
        match self {
            Self::Winter => 1,
            Self::Summer => 0,
            Self::Off => 5,
        }
    }
}

/// Central-heating zone modes the backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ChMode {
    Manual,
    Scheduled,
}

impl ChMode {
    /// Wire code for this mode.
    pub fn code(self) -> i64 {
        match self {
            Self::Manual => 2,
            Self::Scheduled => 3,
        }
    }
}

/// Desired values awaiting confirmation from the backend.
///
/// One optional slot per parameter kind; a slot is cleared once a read
/// confirms the value took effect, or when the retry budget runs out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingChanges {
    pub mode: Option<i64>,
    pub ch_mode: Option<i64>,
    pub ch_set_temperature: Option<f64>,
    pub dhw_set_temperature: Option<f64>,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self.ch_mode.is_none()
            && self.ch_set_temperature.is_none()
            && self.dhw_set_temperature.is_none()
    }

    /// Drop every queued value.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Validate `params` against the bounds in `snapshot` and merge every
    /// accepted value. Unknown names and out-of-range values are logged
    /// and skipped.
    pub(crate) fn absorb(&mut self, params: &ParameterMap, snapshot: &PlantData) {
        if let Some(raw) = params.get(&ParamKind::Mode) {
            match PlantMode::from_str(raw.trim()) {
                Ok(mode) => {
                    info!(mode = %mode, "new mode queued");
                    self.mode = Some(mode.code());
                }
                Err(_) => warn!(value = %raw, "unknown mode"),
            }
        }

        if let Some(raw) = params.get(&ParamKind::DhwSetTemperature) {
            // The DHW circuit only takes whole-degree setpoints.
            match parse_temperature(raw, 1.0) {
                Some(t) if t >= snapshot.dhw_temp.min && t <= snapshot.dhw_temp.max => {
                    info!(temperature = t, "new DHW temperature queued");
                    self.dhw_set_temperature = Some(t);
                }
                _ => warn!(value = %raw, "unsupported DHW temperature value"),
            }
        }

        if let Some(raw) = params.get(&ParamKind::ChSetTemperature) {
            // CH setpoints move in half-degree steps.
            match parse_temperature(raw, 2.0) {
                Some(t) if t >= snapshot.zone.comfort_temp.min
                    && t <= snapshot.zone.comfort_temp.max =>
                {
                    info!(temperature = t, "new CH temperature queued");
                    self.ch_set_temperature = Some(t);
                }
                _ => warn!(value = %raw, "unsupported CH temperature value"),
            }
        }

        if let Some(raw) = params.get(&ParamKind::ChMode) {
            match ChMode::from_str(raw.trim()) {
                Ok(mode) => {
                    info!(mode = %mode, "new CH mode queued");
                    self.ch_mode = Some(mode.code());
                }
                Err(_) => warn!(value = %raw, "unknown CH mode"),
            }
        }
    }
}

/// Parse a temperature string and round it to the nearest `1/steps_per_unit`.
fn parse_temperature(raw: &str, steps_per_unit: f64) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    Some((value * steps_per_unit).round() / steps_per_unit)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::float_cmp)]

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn snapshot() -> PlantData {
        serde_json::from_value(json!({
            "mode": 0,
            "dhwTemp": { "value": 55.0, "min": 40.0, "max": 80.0 },
            "zone": {
                "comfortTemp": { "value": 20.0, "min": 10.0, "max": 30.0 },
                "mode": { "value": 2 }
            }
        }))
        .unwrap()
    }

    #[test]
    fn ch_temperature_rounds_to_half_degrees() {
        assert_eq!(parse_temperature("21.3", 2.0), Some(21.5));
        assert_eq!(parse_temperature("21.2", 2.0), Some(21.0));
        assert_eq!(parse_temperature(" 18 ", 2.0), Some(18.0));
        assert_eq!(parse_temperature("warm", 2.0), None);
    }

    #[test]
    fn dhw_temperature_rounds_to_whole_degrees() {
        assert_eq!(parse_temperature("54.4", 1.0), Some(54.0));
        assert_eq!(parse_temperature("54.6", 1.0), Some(55.0));
    }

    #[test]
    fn mode_names_are_case_insensitive() {
        assert_eq!(PlantMode::from_str("WINTER").unwrap(), PlantMode::Winter);
        assert_eq!(PlantMode::from_str("Summer").unwrap(), PlantMode::Summer);
        assert_eq!(ChMode::from_str("SCHEDULED").unwrap(), ChMode::Scheduled);
        assert!(PlantMode::from_str("lukewarm").is_err());
    }

    #[test]
    fn absorb_accepts_values_inside_the_bounds() {
        let mut pending = PendingChanges::default();
        let params = ParameterMap::from([
            (ParamKind::Mode, "winter".to_string()),
            (ParamKind::ChSetTemperature, "21.3".to_string()),
            (ParamKind::DhwSetTemperature, "60".to_string()),
            (ParamKind::ChMode, "manual".to_string()),
        ]);

        pending.absorb(&params, &snapshot());

        assert_eq!(pending.mode, Some(PlantMode::Winter.code()));
        assert_eq!(pending.ch_set_temperature, Some(21.5));
        assert_eq!(pending.dhw_set_temperature, Some(60.0));
        assert_eq!(pending.ch_mode, Some(ChMode::Manual.code()));
    }

    #[test]
    fn absorb_drops_out_of_range_and_unknown_values() {
        let mut pending = PendingChanges::default();
        let params = ParameterMap::from([
            (ParamKind::Mode, "banana".to_string()),
            (ParamKind::ChSetTemperature, "35".to_string()),
            (ParamKind::DhwSetTemperature, "95".to_string()),
        ]);

        pending.absorb(&params, &snapshot());

        assert!(pending.is_empty());
    }

    #[test]
    fn bounds_are_inclusive() {
        let mut pending = PendingChanges::default();
        let params = ParameterMap::from([
            (ParamKind::DhwSetTemperature, "80".to_string()),
            (ParamKind::ChSetTemperature, "10".to_string()),
        ]);

        pending.absorb(&params, &snapshot());

        assert_eq!(pending.dhw_set_temperature, Some(80.0));
        assert_eq!(pending.ch_set_temperature, Some(10.0));
    }

    #[test]
    fn param_kinds_parse_from_snake_case_names() {
        assert_eq!(
            ParamKind::from_str("ch_set_temperature").unwrap(),
            ParamKind::ChSetTemperature
        );
        assert_eq!(ParamKind::from_str("MODE").unwrap(), ParamKind::Mode);
    }
}
