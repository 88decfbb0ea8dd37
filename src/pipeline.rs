use std::collections::HashSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{PipelineConfig, Subject};
use crate::error::{ArcLengthError, InversionError, Result};
use crate::inversion::Inversion;
use crate::model::loader;
use crate::model::synthetic::SyntheticBody;
use crate::model::ModelStore;
use crate::regression::PredMesh;
use crate::types::{AnthropometricParameters, Gender};

/// Summary of a completed pipeline run.
#[derive(Debug)]
pub struct ProcessingResult {
    pub subjects: usize,
    pub failed: usize,
    pub meshes_written: usize,
    pub duration: Duration,
}

impl std::fmt::Display for ProcessingResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} subjects inverted, {} meshes written ({:.2}s)",
            self.subjects - self.failed,
            self.subjects,
            self.meshes_written,
            self.duration.as_secs_f64()
        )
    }
}

/// Limb circumferences in centimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circumferences {
    pub calf: f32,
    pub thigh: f32,
    pub upper_arm: f32,
}

impl From<[f32; 3]> for Circumferences {
    fn from([calf, thigh, upper_arm]: [f32; 3]) -> Self {
        Self {
            calf,
            thigh,
            upper_arm,
        }
    }
}

/// Per-subject report written next to the mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectReport {
    pub name: String,
    pub gender: Gender,
    /// Measurements after the unknown ones were filled from the prior.
    pub parameters: AnthropometricParameters,
    pub vertices: usize,
    pub triangles: usize,
    pub circumferences: Circumferences,
    /// Empty on success, the circumference error otherwise.
    pub error_id: String,
}

/// Outcome of one subject.
#[derive(Debug, Clone)]
pub struct SubjectOutcome {
    pub report: SubjectReport,
    pub obj_path: Option<PathBuf>,
}

/// Pipeline orchestrator: load models, invert each subject, write outputs.
pub struct Pipeline;

impl Pipeline {
    /// Run the full inversion pipeline.
    pub fn run(config: &PipelineConfig) -> Result<ProcessingResult> {
        let start = Instant::now();

        info!("Stage 1/3: Models");
        let store = Arc::new(Self::load_store(config)?);
        let inversion = Inversion::new(Arc::clone(&store), config.inversion.clone());

        let subjects = Self::subjects(config)?;
        info!(count = subjects.len(), "Subjects loaded");

        if config.dry_run {
            info!("--dry-run: validating subjects and predicting parameters");
            for subject in &subjects {
                subject.validate()?;
                let pm = PredMesh::new(store.bundle(subject.gender)?);
                let predicted = pm.predict_parameters(&subject.parameters)?;
                print_dry_run_summary(subject, &predicted);
            }
            return Ok(ProcessingResult {
                subjects: subjects.len(),
                failed: 0,
                meshes_written: 0,
                duration: start.elapsed(),
            });
        }

        fs::create_dir_all(&config.output)?;

        info!("Stage 2/3: Inversion");
        let outcomes: Vec<Result<SubjectOutcome>> = if config.batch.is_some() {
            subjects
                .par_iter()
                .map(|s| Self::process(&inversion, s, config))
                .collect()
        } else {
            subjects
                .iter()
                .map(|s| Self::process(&inversion, s, config))
                .collect()
        };

        info!("Stage 3/3: Summary");
        let mut failed = 0;
        let mut written = 0;
        for (subject, outcome) in subjects.iter().zip(outcomes) {
            match outcome {
                Ok(o) => {
                    written += usize::from(o.obj_path.is_some());
                    print_subject_summary(&o);
                }
                Err(e) if config.batch.is_some() => {
                    error!(subject = %subject.name, %e, "Subject failed");
                    failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let duration = start.elapsed();
        info!(
            subjects = subjects.len(),
            failed,
            meshes = written,
            elapsed = ?duration,
            "Pipeline complete"
        );

        Ok(ProcessingResult {
            subjects: subjects.len(),
            failed,
            meshes_written: written,
            duration,
        })
    }

    fn load_store(config: &PipelineConfig) -> Result<ModelStore> {
        match &config.models {
            Some(dir) => {
                info!(dir = %dir.display(), "Loading model directory");
                loader::load_model_dir(dir)
            }
            None => {
                warn!("No model directory given, using the synthetic body model");
                let mut store = ModelStore::new();
                for gender in Gender::ALL {
                    store.insert(SyntheticBody::new(gender).bundle()?);
                }
                Ok(store)
            }
        }
    }

    fn subjects(config: &PipelineConfig) -> Result<Vec<Subject>> {
        match &config.batch {
            Some(path) => {
                let file = fs::File::open(path).map_err(|e| {
                    InversionError::Input(format!("cannot open batch {}: {e}", path.display()))
                })?;
                let subjects: Vec<Subject> = serde_json::from_reader(std::io::BufReader::new(file))?;
                if subjects.is_empty() {
                    return Err(InversionError::Input(format!(
                        "batch {} lists no subjects",
                        path.display()
                    )));
                }
                let mut names = HashSet::new();
                if let Some(dup) = subjects.iter().find(|s| !names.insert(s.name.as_str())) {
                    return Err(InversionError::Input(format!(
                        "batch {} lists subject {:?} more than once",
                        path.display(),
                        dup.name
                    )));
                }
                Ok(subjects)
            }
            None => Ok(vec![config.subject.clone()]),
        }
    }

    /// Invert one subject and write `<name>.obj` and `<name>.json`.
    pub fn process(
        inversion: &Inversion,
        subject: &Subject,
        config: &PipelineConfig,
    ) -> Result<SubjectOutcome> {
        subject.validate()?;
        let gender = subject.gender;

        let body = inversion.invert_body(gender, &subject.parameters)?;
        let mut mesh = body.mesh;
        if config.with_normals {
            mesh = mesh.with_normals()?;
        }

        let (circumferences, error_id) =
            match inversion.arc_length(gender, &mesh.positions, 0.0, 0.0) {
                Ok(c) => (c, String::new()),
                Err(e) => {
                    warn!(subject = %subject.name, %e, "Circumference estimate failed");
                    (ArcLengthError::SENTINEL, e.to_string())
                }
            };

        let obj_path = config.output.join(format!("{}.obj", subject.name));
        let lines = mesh.to_obj_lines(&inversion.config().obj_delimiter, config.with_normals)?;
        write_lines(&obj_path, &lines)?;

        let report = SubjectReport {
            name: subject.name.clone(),
            gender,
            parameters: AnthropometricParameters::from_array(body.parameters.map(Some)),
            vertices: mesh.vertex_count(),
            triangles: mesh.triangle_count(),
            circumferences: circumferences.into(),
            error_id,
        };
        let report_path = config.output.join(format!("{}.json", subject.name));
        fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;

        info!(
            subject = %subject.name,
            obj = %obj_path.display(),
            "Subject written"
        );
        Ok(SubjectOutcome {
            report,
            obj_path: Some(obj_path),
        })
    }
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let file = fs::File::create(path)
        .map_err(|e| InversionError::Output(format!("{}: {e}", path.display())))?;
    let mut w = BufWriter::new(file);
    for line in lines {
        w.write_all(line.as_bytes())?;
    }
    w.flush()?;
    Ok(())
}

/// Print the predicted measurements of a subject.
fn print_dry_run_summary(subject: &Subject, predicted: &[f32; 7]) {
    println!("=== Dry Run: {} ({}) ===", subject.name, subject.gender);
    let given = subject.parameters.as_array();
    for ((name, value), known) in crate::types::PARAMETER_NAMES
        .iter()
        .zip(predicted)
        .zip(given)
    {
        let tag = if known.is_some() { "given" } else { "predicted" };
        println!("  {name:<8} {value:>8.2}  ({tag})");
    }
}

/// Print one subject's outputs.
fn print_subject_summary(outcome: &SubjectOutcome) {
    let r = &outcome.report;
    println!("=== {} ({}) ===", r.name, r.gender);
    println!("  Vertices:  {}", r.vertices);
    println!("  Triangles: {}", r.triangles);
    let c = r.circumferences;
    println!(
        "  Calf / thigh / upper arm: {:.1} / {:.1} / {:.1} cm",
        c.calf, c.thigh, c.upper_arm
    );
    if !r.error_id.is_empty() {
        println!("  Warning:   {}", r.error_id);
    }
    if let Some(path) = &outcome.obj_path {
        println!("  Mesh:      {}", path.display());
    }
}
