use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Gender;

/// Repeated per-scan measurements of one subject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasurementSeries {
    #[serde(default)]
    pub chests: Vec<f32>,
    #[serde(default)]
    pub waists: Vec<f32>,
    #[serde(default)]
    pub hips: Vec<f32>,
    #[serde(default)]
    pub inseams: Vec<f32>,
    #[serde(default)]
    pub fits: Vec<f32>,
    #[serde(default)]
    pub thighs: Vec<f32>,
    #[serde(default)]
    pub percent_body_fat: Option<Vec<f32>>,
}

/// Averaged measurements as reported to callers. Field order is the wire
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageReport {
    pub gender: String,
    pub height: f32,
    pub weight: f32,
    pub chest: f32,
    pub waist: f32,
    pub hip: f32,
    pub inseam: f32,
    pub fitness: f32,
    pub thigh: f32,
    #[serde(
        rename = "PercentBodyFat",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub percent_body_fat: Option<f32>,
    pub error_id: String,
}

/// Arithmetic mean, 0 for an empty slice.
pub fn vector_mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

impl AverageReport {
    pub fn new(gender: Gender, height: f32, weight: f32, series: &MeasurementSeries) -> Self {
        Self {
            gender: gender.code().to_string(),
            height,
            weight,
            chest: vector_mean(&series.chests),
            waist: vector_mean(&series.waists),
            hip: vector_mean(&series.hips),
            inseam: vector_mean(&series.inseams),
            fitness: vector_mean(&series.fits),
            thigh: vector_mean(&series.thighs),
            percent_body_fat: series.percent_body_fat.as_deref().map(vector_mean),
            error_id: "0".to_string(),
        }
    }
}

/// Average repeated scans into the report JSON.
pub fn average(
    gender: Gender,
    height: f32,
    weight: f32,
    series: &MeasurementSeries,
) -> Result<String> {
    let report = AverageReport::new(gender, height, weight, series);
    Ok(serde_json::to_string_pretty(&report)?)
}
