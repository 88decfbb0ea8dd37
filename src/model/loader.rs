use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{ModelStore, StatisticalModelBundle, GENDERED_BLOBS, SHARED_BLOBS};
use crate::error::{InversionError, Result};
use crate::types::Gender;

/// File holding a per-gender blob: `<Name>_<male|female>.bin`.
pub fn gendered_path(dir: &Path, name: &str, gender: Gender) -> PathBuf {
    dir.join(format!("{name}_{gender}.bin"))
}

/// File holding a blob shared by both genders: `<Name>.bin`.
pub fn shared_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.bin"))
}

fn read_blob(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        InversionError::ModelLoad(format!("failed to read {}: {e}", path.display()))
    })
}

/// Read all blobs of one gender, keyed by bare blob name.
pub fn read_gender_blobs(dir: &Path, gender: Gender) -> Result<HashMap<String, Vec<u8>>> {
    let mut blobs = HashMap::with_capacity(GENDERED_BLOBS.len() + SHARED_BLOBS.len());
    for name in GENDERED_BLOBS {
        blobs.insert(name.to_string(), read_blob(&gendered_path(dir, name, gender))?);
    }
    for name in SHARED_BLOBS {
        blobs.insert(name.to_string(), read_blob(&shared_path(dir, name))?);
    }
    Ok(blobs)
}

/// Load every gender present in `dir` into a fresh store.
///
/// A gender counts as present when its `MvnMu` file exists; a present gender
/// with a missing or malformed blob is an error. At least one gender must be
/// present.
pub fn load_model_dir(dir: &Path) -> Result<ModelStore> {
    if !dir.is_dir() {
        return Err(InversionError::ModelLoad(format!(
            "model directory not found: {}",
            dir.display()
        )));
    }

    let mut store = ModelStore::new();
    for gender in Gender::ALL {
        if !gendered_path(dir, "MvnMu", gender).exists() {
            warn!(%gender, dir = %dir.display(), "No model files for gender, skipping");
            continue;
        }
        let blobs = read_gender_blobs(dir, gender)?;
        store.load(gender, &blobs)?;
    }

    if !Gender::ALL.iter().any(|&g| store.is_loaded(g)) {
        return Err(InversionError::ModelLoad(format!(
            "no model bundles in {}",
            dir.display()
        )));
    }

    info!(dir = %dir.display(), "Model directory loaded");
    Ok(store)
}

/// Write bundles in the layout `load_model_dir` reads.
///
/// Shared blobs are taken from the first bundle.
pub fn write_model_dir(dir: &Path, bundles: &[&StatisticalModelBundle]) -> Result<()> {
    fs::create_dir_all(dir)?;
    for (i, bundle) in bundles.iter().enumerate() {
        let blobs = bundle.to_blobs();
        for name in GENDERED_BLOBS {
            if let Some(bytes) = blobs.get(name) {
                fs::write(gendered_path(dir, name, bundle.gender), bytes)?;
            }
        }
        if i == 0 {
            for name in SHARED_BLOBS {
                if let Some(bytes) = blobs.get(name) {
                    fs::write(shared_path(dir, name), bytes)?;
                }
            }
        }
    }
    info!(dir = %dir.display(), bundles = bundles.len(), "Model directory written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::synthetic::SyntheticBody;

    #[test]
    fn file_naming() {
        let dir = Path::new("/models");
        assert_eq!(
            gendered_path(dir, "Cov", Gender::Female),
            PathBuf::from("/models/Cov_female.bin")
        );
        assert_eq!(
            shared_path(dir, "InvRightThigh"),
            PathBuf::from("/models/InvRightThigh.bin")
        );
    }

    #[test]
    fn write_then_load_single_gender() {
        let tmp = tempfile::tempdir().unwrap();
        let male = SyntheticBody::new(Gender::Male).bundle().unwrap();
        write_model_dir(tmp.path(), &[&male]).unwrap();

        assert!(tmp.path().join("SvInv_male.bin").exists());
        assert!(tmp.path().join("InvRightCalf.bin").exists());
        assert!(!tmp.path().join("SvInv_female.bin").exists());

        let store = load_model_dir(tmp.path()).unwrap();
        assert!(store.is_loaded(Gender::Male));
        assert!(!store.is_loaded(Gender::Female));
        let loaded = store.bundle(Gender::Male).unwrap();
        assert_eq!(loaded.mu, male.mu);
        assert_eq!(loaded.verts_inv, male.verts_inv);
    }

    #[test]
    fn missing_blob_of_present_gender_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let female = SyntheticBody::new(Gender::Female).bundle().unwrap();
        write_model_dir(tmp.path(), &[&female]).unwrap();
        fs::remove_file(tmp.path().join("BonWInv_female.bin")).unwrap();

        let err = load_model_dir(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("BonWInv_female.bin"));
    }

    #[test]
    fn empty_dir_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_model_dir(tmp.path()).is_err());
        assert!(load_model_dir(&tmp.path().join("nope")).is_err());
    }
}
