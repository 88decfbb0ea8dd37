use serde::{Deserialize, Serialize};

/// Value marking an unset measurement in sentinel-encoded parameter vectors.
pub const SENTINEL: f32 = -100.0;

/// Number of anthropometric parameters.
pub const PARAMETER_COUNT: usize = 7;

/// Parameter names in regression order.
pub const PARAMETER_NAMES: [&str; PARAMETER_COUNT] =
    ["height", "weight", "chest", "waist", "hip", "inseam", "fitness"];

/// The seven measurements driving the shape regression.
///
/// `None` means "unknown": the regression fills the slot from the
/// statistical prior conditioned on the known ones.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnthropometricParameters {
    pub height_cm: Option<f32>,
    pub weight_kg: Option<f32>,
    pub chest_cm: Option<f32>,
    pub waist_cm: Option<f32>,
    pub hip_cm: Option<f32>,
    pub inseam_cm: Option<f32>,
    pub fitness: Option<f32>,
}

impl AnthropometricParameters {
    /// All seven measurements known.
    pub fn new(
        height_cm: f32,
        weight_kg: f32,
        chest_cm: f32,
        waist_cm: f32,
        hip_cm: f32,
        inseam_cm: f32,
        fitness: f32,
    ) -> Self {
        Self::from_array([
            Some(height_cm),
            Some(weight_kg),
            Some(chest_cm),
            Some(waist_cm),
            Some(hip_cm),
            Some(inseam_cm),
            Some(fitness),
        ])
    }

    /// No measurement known; the regression returns the prior mean shape.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn from_array(values: [Option<f32>; PARAMETER_COUNT]) -> Self {
        let [height_cm, weight_kg, chest_cm, waist_cm, hip_cm, inseam_cm, fitness] = values;
        Self {
            height_cm,
            weight_kg,
            chest_cm,
            waist_cm,
            hip_cm,
            inseam_cm,
            fitness,
        }
    }

    pub fn as_array(&self) -> [Option<f32>; PARAMETER_COUNT] {
        [
            self.height_cm,
            self.weight_kg,
            self.chest_cm,
            self.waist_cm,
            self.hip_cm,
            self.inseam_cm,
            self.fitness,
        ]
    }

    /// Decode a sentinel vector: `-100` and non-finite slots become `None`.
    pub fn from_sentinel(values: [f32; PARAMETER_COUNT]) -> Self {
        Self::from_array(values.map(|v| (v.is_finite() && v != SENTINEL).then_some(v)))
    }

    /// Encode back into a sentinel vector.
    pub fn to_sentinel(&self) -> [f32; PARAMETER_COUNT] {
        self.as_array().map(|v| v.unwrap_or(SENTINEL))
    }

    /// Number of known measurements.
    pub fn known_count(&self) -> usize {
        self.as_array().iter().filter(|v| v.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_round_trip() {
        let raw = [175.0, 75.0, SENTINEL, 85.0, SENTINEL, 80.0, 0.5];
        let p = AnthropometricParameters::from_sentinel(raw);
        assert_eq!(p.height_cm, Some(175.0));
        assert_eq!(p.chest_cm, None);
        assert_eq!(p.hip_cm, None);
        assert_eq!(p.known_count(), 5);
        assert_eq!(p.to_sentinel(), raw);
    }

    #[test]
    fn non_finite_is_unknown() {
        let p = AnthropometricParameters::from_sentinel([f32::NAN, 70.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(p.height_cm, None);
        assert_eq!(p.known_count(), 6);
    }

    #[test]
    fn unknown_has_no_values() {
        let p = AnthropometricParameters::unknown();
        assert_eq!(p.known_count(), 0);
        assert_eq!(p.to_sentinel(), [SENTINEL; PARAMETER_COUNT]);
    }

    #[test]
    fn deserializes_missing_fields_as_unknown() {
        let p: AnthropometricParameters =
            serde_json::from_str(r#"{"height_cm": 180.0, "weight_kg": 80.0}"#).unwrap();
        assert_eq!(p.height_cm, Some(180.0));
        assert_eq!(p.weight_kg, Some(80.0));
        assert_eq!(p.known_count(), 2);
    }
}
