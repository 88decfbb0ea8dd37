use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::{InversionError, Result};
use crate::inversion::laplacian::RelaxParams;
use crate::model::EAR_VERTEX;
use crate::types::{AnthropometricParameters, Gender};

/// Head-region relaxation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LaplacianConfig {
    /// Template height (m) above which male meshes are relaxed.
    pub male_bound: f32,
    /// Template height (m) above which female meshes are relaxed.
    pub female_bound: f32,
    pub ear_vertex: usize,
    pub row_sum_limit: f32,
}

impl Default for LaplacianConfig {
    fn default() -> Self {
        Self {
            male_bound: 1.57,
            female_bound: 1.48,
            ear_vertex: EAR_VERTEX,
            row_sum_limit: 10_000.0,
        }
    }
}

impl LaplacianConfig {
    pub fn bound(&self, gender: Gender) -> f32 {
        match gender {
            Gender::Male => self.male_bound,
            Gender::Female => self.female_bound,
        }
    }

    pub fn params(&self, gender: Gender) -> RelaxParams {
        RelaxParams {
            bound: self.bound(gender),
            ear_vertex: self.ear_vertex,
            row_sum_limit: self.row_sum_limit,
        }
    }
}

/// Inversion engine parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct InversionConfig {
    pub laplacian: LaplacianConfig,
    /// Terminator appended to every OBJ line.
    pub obj_delimiter: String,
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            laplacian: LaplacianConfig::default(),
            obj_delimiter: "\n".to_string(),
        }
    }
}

/// One person to invert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub gender: Gender,
    #[serde(flatten)]
    pub parameters: AnthropometricParameters,
}

impl Subject {
    /// A subject needs a name (it names the output files) and a positive
    /// height and weight; every other measurement may be unknown.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(InversionError::Input("subject has no name".into()));
        }
        let positive = |v: Option<f32>| v.is_some_and(|v| v > 0.0);
        if !positive(self.parameters.height_cm) || !positive(self.parameters.weight_kg) {
            return Err(InversionError::Input(format!(
                "subject {}: height and weight must be positive",
                self.name
            )));
        }
        Ok(())
    }
}

/// Fully resolved pipeline configuration (constructed from CLI args).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model directory; `None` runs against the synthetic body model.
    pub models: Option<PathBuf>,
    pub subject: Subject,
    /// JSON list of subjects, processed instead of `subject`.
    pub batch: Option<PathBuf>,
    pub output: PathBuf,
    pub inversion: InversionConfig,
    pub with_normals: bool,
    pub dry_run: bool,
    pub verbose: bool,
    pub threads: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            models: None,
            subject: Subject {
                name: "subject".to_string(),
                gender: Gender::Male,
                parameters: AnthropometricParameters::unknown(),
            },
            batch: None,
            output: PathBuf::from("out"),
            inversion: InversionConfig::default(),
            with_normals: false,
            dry_run: false,
            verbose: false,
            threads: None,
        }
    }
}

/// CLI argument definition (clap derive).
#[derive(Parser, Debug)]
#[command(
    name = "avatar-inversion",
    about = "Reconstruct a 3D body mesh from anthropometric measurements",
    version
)]
pub struct CliArgs {
    /// Model directory (<Name>_<gender>.bin files); synthetic model if omitted
    #[arg(short = 'm', long)]
    pub models: Option<PathBuf>,

    /// Body model gender
    #[arg(short = 'g', long, value_enum, default_value = "male")]
    pub gender: Gender,

    /// Subject name, used for the output file names
    #[arg(short = 'n', long, default_value = "subject")]
    pub name: String,

    /// Height in centimeters
    #[arg(long)]
    pub height: Option<f32>,

    /// Weight in kilograms
    #[arg(long)]
    pub weight: Option<f32>,

    /// Chest circumference in centimeters
    #[arg(long)]
    pub chest: Option<f32>,

    /// Waist circumference in centimeters
    #[arg(long)]
    pub waist: Option<f32>,

    /// Hip circumference in centimeters
    #[arg(long)]
    pub hip: Option<f32>,

    /// Inseam length in centimeters
    #[arg(long)]
    pub inseam: Option<f32>,

    /// Fitness score
    #[arg(long)]
    pub fitness: Option<f32>,

    /// JSON file with a list of subjects to invert in parallel
    #[arg(short = 'b', long)]
    pub batch: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long, default_value = "out")]
    pub output: PathBuf,

    /// Write vertex normals into the OBJ files
    #[arg(long)]
    pub with_normals: bool,

    /// Validate inputs and models, write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Worker thread count (default: all cores)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,
}

impl From<CliArgs> for PipelineConfig {
    fn from(args: CliArgs) -> Self {
        let parameters = AnthropometricParameters {
            height_cm: args.height,
            weight_kg: args.weight,
            chest_cm: args.chest,
            waist_cm: args.waist,
            hip_cm: args.hip,
            inseam_cm: args.inseam,
            fitness: args.fitness,
        };

        PipelineConfig {
            models: args.models,
            subject: Subject {
                name: args.name,
                gender: args.gender,
                parameters,
            },
            batch: args.batch,
            output: args.output,
            inversion: InversionConfig::default(),
            with_normals: args.with_normals,
            dry_run: args.dry_run,
            verbose: args.verbose,
            threads: args.threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_laplacian_config() {
        let lc = LaplacianConfig::default();
        assert_eq!(lc.bound(Gender::Male), 1.57);
        assert_eq!(lc.bound(Gender::Female), 1.48);
        assert_eq!(lc.ear_vertex, 3552);
        assert_eq!(lc.params(Gender::Female).row_sum_limit, 10_000.0);
    }

    #[test]
    fn default_inversion_config() {
        let ic = InversionConfig::default();
        assert_eq!(ic.obj_delimiter, "\n");
    }

    #[test]
    fn cli_args_to_pipeline_config() {
        let args = CliArgs::parse_from([
            "avatar-inversion",
            "-m",
            "./models",
            "-g",
            "female",
            "-n",
            "jane",
            "--height",
            "168",
            "--weight",
            "61.5",
            "--hip",
            "99",
            "-o",
            "./out",
            "--with-normals",
            "--dry-run",
            "-v",
            "-j",
            "8",
        ]);

        let config: PipelineConfig = args.into();

        assert_eq!(config.models, Some(PathBuf::from("./models")));
        assert_eq!(config.subject.gender, Gender::Female);
        assert_eq!(config.subject.name, "jane");
        assert_eq!(config.subject.parameters.height_cm, Some(168.0));
        assert_eq!(config.subject.parameters.weight_kg, Some(61.5));
        assert_eq!(config.subject.parameters.hip_cm, Some(99.0));
        assert_eq!(config.subject.parameters.chest_cm, None);
        assert_eq!(config.output, PathBuf::from("./out"));
        assert!(config.with_normals);
        assert!(config.dry_run);
        assert!(config.verbose);
        assert_eq!(config.threads, Some(8));
    }

    #[test]
    fn cli_args_minimal() {
        let args = CliArgs::parse_from(["avatar-inversion", "--height", "180", "--weight", "80"]);
        let config: PipelineConfig = args.into();

        assert!(config.models.is_none());
        assert!(config.batch.is_none());
        assert_eq!(config.subject.gender, Gender::Male);
        assert_eq!(config.subject.name, "subject");
        assert_eq!(config.output, PathBuf::from("out"));
        assert!(!config.with_normals);
        assert!(!config.dry_run);
        assert!(!config.verbose);
        assert_eq!(config.threads, None);
        assert!(config.subject.validate().is_ok());
    }

    #[test]
    fn subject_validation() {
        let mut s = PipelineConfig::default().subject;
        assert!(s.validate().is_err());

        s.parameters.height_cm = Some(170.0);
        s.parameters.weight_kg = Some(0.0);
        assert!(s.validate().is_err());

        s.parameters.weight_kg = Some(65.0);
        assert!(s.validate().is_ok());

        s.name = "  ".into();
        let err = s.validate().unwrap_err();
        assert!(matches!(err, InversionError::Input(_)));
    }

    #[test]
    fn subject_from_json() {
        let s: Subject = serde_json::from_str(
            r#"{"name": "a", "gender": "female", "height_cm": 160.0, "weight_kg": 55.0}"#,
        )
        .unwrap();
        assert_eq!(s.gender, Gender::Female);
        assert_eq!(s.parameters.height_cm, Some(160.0));
        assert_eq!(s.parameters.waist_cm, None);
    }
}
