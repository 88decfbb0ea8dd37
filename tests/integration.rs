//! End-to-end integration tests.
//!
//! These tests write a synthetic model directory, run the full pipeline,
//! and validate the exported meshes and reports.

use std::fs;
use std::path::Path;

use avatar_inversion::config::PipelineConfig;
use avatar_inversion::model::loader::write_model_dir;
use avatar_inversion::model::synthetic::SyntheticBody;
use avatar_inversion::model::{N_FACES_INV, N_VERTS_INV};
use avatar_inversion::pipeline::SubjectReport;
use avatar_inversion::{Gender, Pipeline};

/// Write both synthetic genders in the on-disk model layout.
fn write_models(dir: &Path) {
    let male = SyntheticBody::new(Gender::Male).bundle().unwrap();
    let female = SyntheticBody::new(Gender::Female).bundle().unwrap();
    write_model_dir(dir, &[&male, &female]).unwrap();
}

fn config(models: &Path, output: &Path, name: &str, gender: Gender) -> PipelineConfig {
    let mut config = PipelineConfig {
        models: Some(models.to_path_buf()),
        output: output.to_path_buf(),
        ..Default::default()
    };
    config.subject.name = name.to_string();
    config.subject.gender = gender;
    config.subject.parameters.height_cm = Some(176.0);
    config.subject.parameters.weight_kg = Some(74.0);
    config.subject.parameters.inseam_cm = Some(81.0);
    config
}

fn load_obj(path: &Path) -> tobj::Mesh {
    let (models, _) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: false,
            single_index: false,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(models.len(), 1);
    models.into_iter().next().unwrap().mesh
}

#[test]
fn full_pipeline_from_model_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let models = tmp.path().join("models");
    let output = tmp.path().join("out");
    write_models(&models);

    let result = Pipeline::run(&config(&models, &output, "alex", Gender::Male)).unwrap();
    assert_eq!(result.subjects, 1);
    assert_eq!(result.failed, 0);
    assert_eq!(result.meshes_written, 1);

    let mesh = load_obj(&output.join("alex.obj"));
    assert_eq!(mesh.positions.len() / 3, N_VERTS_INV);
    assert_eq!(mesh.indices.len() / 3, N_FACES_INV);
    assert!(mesh.normals.is_empty());
    assert!(mesh.indices.iter().all(|&i| (i as usize) < N_VERTS_INV));
    assert!(mesh.positions.iter().all(|v| v.is_finite()));

    let report: SubjectReport =
        serde_json::from_str(&fs::read_to_string(output.join("alex.json")).unwrap()).unwrap();
    assert_eq!(report.gender, Gender::Male);
    assert_eq!(report.parameters.height_cm, Some(176.0));
    assert_eq!(report.parameters.inseam_cm, Some(81.0));
    assert_eq!(report.vertices, N_VERTS_INV);
    assert!(report.circumferences.thigh > 0.0 && report.circumferences.thigh <= 100.0);
    assert!(report.error_id.is_empty());
}

#[test]
fn full_pipeline_with_normals() {
    let tmp = tempfile::tempdir().unwrap();
    let models = tmp.path().join("models");
    let output = tmp.path().join("out");
    write_models(&models);

    let mut c = config(&models, &output, "sam", Gender::Female);
    c.with_normals = true;
    Pipeline::run(&c).unwrap();

    let mesh = load_obj(&output.join("sam.obj"));
    assert_eq!(mesh.positions.len() / 3, N_VERTS_INV);
    assert_eq!(mesh.normals.len() / 3, N_VERTS_INV);
    for n in mesh.normals.chunks_exact(3) {
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        assert!((len - 1.0).abs() < 1e-3);
    }
}

#[test]
fn taller_subject_produces_taller_mesh() {
    let tmp = tempfile::tempdir().unwrap();
    let models = tmp.path().join("models");
    let output = tmp.path().join("out");
    write_models(&models);

    let mut short = config(&models, &output, "short", Gender::Female);
    short.subject.parameters.height_cm = Some(150.0);
    let mut tall = config(&models, &output, "tall", Gender::Female);
    tall.subject.parameters.height_cm = Some(190.0);
    Pipeline::run(&short).unwrap();
    Pipeline::run(&tall).unwrap();

    let top = |name: &str| {
        load_obj(&output.join(format!("{name}.obj")))
            .positions
            .chunks_exact(3)
            .map(|p| p[1])
            .fold(f32::MIN, f32::max)
    };
    assert!(top("tall") > top("short"));
}

#[test]
fn batch_against_single_gender_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let models = tmp.path().join("models");
    let output = tmp.path().join("out");
    let male = SyntheticBody::new(Gender::Male).bundle().unwrap();
    write_model_dir(&models, &[&male]).unwrap();

    let batch = tmp.path().join("subjects.json");
    fs::write(
        &batch,
        r#"[
            {"name": "m1", "gender": "male", "height_cm": 170.0, "weight_kg": 68.0},
            {"name": "m2", "gender": "male", "height_cm": 188.0, "weight_kg": 95.0, "waist_cm": 101.0},
            {"name": "f1", "gender": "female", "height_cm": 160.0, "weight_kg": 55.0}
        ]"#,
    )
    .unwrap();

    let mut c = config(&models, &output, "unused", Gender::Male);
    c.batch = Some(batch);
    let result = Pipeline::run(&c).unwrap();
    assert_eq!(result.subjects, 3);
    assert_eq!(result.failed, 1);
    assert!(output.join("m1.obj").exists());
    assert!(output.join("m2.obj").exists());
    assert!(!output.join("f1.obj").exists());
}

#[test]
fn pipeline_missing_models_returns_error() {
    let tmp = tempfile::tempdir().unwrap();
    let c = config(
        &tmp.path().join("nonexistent"),
        &tmp.path().join("out"),
        "x",
        Gender::Male,
    );
    let result = Pipeline::run(&c);
    assert!(result.is_err());
}
