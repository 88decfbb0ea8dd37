pub mod codec;
pub mod loader;
pub mod synthetic;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{InversionError, Result};
use crate::types::Gender;
use codec::Matrix;

pub const N_VERTS: usize = 1002;
pub const N_VERTS_3: usize = 3 * N_VERTS;
pub const N_VERTS_INV: usize = 10777;
pub const N_VERTS_INV_3: usize = 3 * N_VERTS_INV;
pub const N_FACES: usize = 2000;
pub const N_FACES_3: usize = 3 * N_FACES;
pub const N_FACES_INV: usize = 21550;
pub const N_FACES_INV_3: usize = 3 * N_FACES_INV;
pub const N_MU: usize = 7;
pub const N_BONES: usize = 17;
pub const N_JOINTS: usize = 18;
/// Fine-mesh vertex whose height separates the relaxed head region.
pub const EAR_VERTEX: usize = 3552;

/// Blob names of a per-gender bundle.
pub const GENDERED_BLOBS: [&str; 14] = [
    "MvnMu",
    "Ranges",
    "Cov",
    "Sv",
    "SvInv",
    "SkV",
    "BonW",
    "BonWInv",
    "AvgVerts",
    "VertsInv",
    "Faces",
    "FacesInv",
    "LaplacianRings",
    "LaplacianRingsAsVectors",
];

/// Blob names shared by both genders.
pub const SHARED_BLOBS: [&str; 3] = ["InvRightCalf", "InvRightThigh", "InvRightUpperArm"];

/// Ordered one-rings of the fine mesh, 0-based.
#[derive(Debug, Clone, Default)]
pub struct VertexRings {
    flat: Vec<u32>,
    offsets: Vec<usize>,
}

impl VertexRings {
    /// Build from per-vertex ring sizes and the flattened 1-based rings.
    pub fn from_one_based(sizes: &[i32], flat: &[i32], vertex_count: usize) -> Result<Self> {
        if sizes.len() != vertex_count {
            return Err(InversionError::ModelLoad(format!(
                "LaplacianRings has {} entries, expected {vertex_count}",
                sizes.len()
            )));
        }
        let mut offsets = Vec::with_capacity(sizes.len() + 1);
        offsets.push(0usize);
        for &s in sizes {
            let s = usize::try_from(s).map_err(|_| {
                InversionError::ModelLoad(format!("negative ring size {s}"))
            })?;
            offsets.push(offsets[offsets.len() - 1] + s);
        }
        let total = offsets[offsets.len() - 1];
        if flat.len() != total {
            return Err(InversionError::ModelLoad(format!(
                "LaplacianRingsAsVectors has {} entries, ring sizes sum to {total}",
                flat.len()
            )));
        }
        let flat = to_zero_based("LaplacianRingsAsVectors", flat, vertex_count)?;
        Ok(Self { flat, offsets })
    }

    /// Build from already 0-based rings.
    pub fn from_rings(rings: &[Vec<u32>]) -> Self {
        let mut offsets = Vec::with_capacity(rings.len() + 1);
        offsets.push(0);
        let mut flat = Vec::new();
        for ring in rings {
            flat.extend_from_slice(ring);
            offsets.push(flat.len());
        }
        Self { flat, offsets }
    }

    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ring(&self, vertex: usize) -> &[u32] {
        &self.flat[self.offsets[vertex]..self.offsets[vertex + 1]]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u32]> + '_ {
        (0..self.len()).map(move |i| self.ring(i))
    }

    /// Ring sizes, as stored in `LaplacianRings`.
    pub fn sizes(&self) -> Vec<i32> {
        self.offsets.windows(2).map(|w| (w[1] - w[0]) as i32).collect()
    }

    /// Flattened 1-based rings, as stored in `LaplacianRingsAsVectors`.
    pub fn to_one_based(&self) -> Vec<i32> {
        self.flat.iter().map(|&v| v as i32 + 1).collect()
    }
}

/// Vertex ids of the limbs measured by the circumference estimator, 0-based.
#[derive(Debug, Clone, Default)]
pub struct BodyParts {
    pub calf: Vec<u32>,
    pub thigh: Vec<u32>,
    pub upper_arm: Vec<u32>,
}

impl BodyParts {
    pub fn from_blobs<B: AsRef<[u8]>>(blobs: &HashMap<String, B>) -> Result<Self> {
        let part = |name: &str| -> Result<Vec<u32>> {
            let ids = codec::decode_vi(name, blob(blobs, name)?)?;
            to_zero_based(name, &ids, N_VERTS_INV)
        };
        Ok(Self {
            calf: part("InvRightCalf")?,
            thigh: part("InvRightThigh")?,
            upper_arm: part("InvRightUpperArm")?,
        })
    }
}

fn blob<'a, B: AsRef<[u8]>>(blobs: &'a HashMap<String, B>, name: &str) -> Result<&'a [u8]> {
    blobs
        .get(name)
        .map(AsRef::as_ref)
        .ok_or_else(|| InversionError::ModelLoad(format!("missing blob {name}")))
}

fn to_zero_based(name: &str, ids: &[i32], limit: usize) -> Result<Vec<u32>> {
    ids.iter()
        .map(|&id| {
            if id < 1 || id as usize > limit {
                Err(InversionError::ModelLoad(format!(
                    "blob {name}: id {id} outside 1..={limit}"
                )))
            } else {
                Ok((id - 1) as u32)
            }
        })
        .collect()
}

fn to_faces(name: &str, ids: &[i32], vertex_count: usize) -> Result<Vec<u32>> {
    ids.iter()
        .map(|&id| {
            if id < 0 || id as usize >= vertex_count {
                Err(InversionError::ModelLoad(format!(
                    "blob {name}: vertex {id} outside 0..{vertex_count}"
                )))
            } else {
                Ok(id as u32)
            }
        })
        .collect()
}

fn expect_len(name: &str, len: usize, expected: usize) -> Result<()> {
    if len != expected {
        return Err(InversionError::ModelLoad(format!(
            "blob {name}: length {len}, expected {expected}"
        )));
    }
    Ok(())
}

fn expect_shape(name: &str, m: &Matrix, rows: usize, cols: usize) -> Result<()> {
    if m.shape() != (rows, cols) {
        return Err(InversionError::ModelLoad(format!(
            "blob {name}: shape {}x{}, expected {rows}x{cols}",
            m.rows, m.cols
        )));
    }
    Ok(())
}

/// Per-gender statistical body model. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct StatisticalModelBundle {
    pub gender: Gender,
    /// Prior mean of the seven parameters.
    pub mu: Vec<f32>,
    /// Plausible `[min, max]` per parameter.
    pub ranges: Matrix,
    pub cov: Matrix,
    /// Coarse shape basis, `3 * N_VERTS x N_MU`.
    pub sv: Matrix,
    /// Fine shape basis, `3 * N_VERTS_INV x N_MU`.
    pub sv_inv: Matrix,
    /// Skeleton joints, one xyz row each.
    pub joints: Matrix,
    pub bone_weights: Matrix,
    pub bone_weights_inv: Matrix,
    pub avg_verts: Vec<f32>,
    pub verts_inv: Vec<f32>,
    /// Coarse triangles, 0-based.
    pub faces: Vec<u32>,
    /// Fine triangles, 0-based.
    pub faces_inv: Vec<u32>,
    pub rings: VertexRings,
    pub parts: BodyParts,
}

impl StatisticalModelBundle {
    /// Decode and validate every blob of one gender.
    ///
    /// `blobs` holds the gendered blobs under their bare names (`"Cov"`, not
    /// `"Cov_male"`) together with the shared body-part blobs.
    pub fn load<B: AsRef<[u8]>>(gender: Gender, blobs: &HashMap<String, B>) -> Result<Self> {
        debug!(%gender, count = blobs.len(), "Decoding model blobs");

        let mu = codec::decode_vf("MvnMu", blob(blobs, "MvnMu")?)?;
        expect_len("MvnMu", mu.len(), N_MU)?;

        let ranges = codec::decode_vvf("Ranges", blob(blobs, "Ranges")?)?;
        expect_shape("Ranges", &ranges, N_MU, 2)?;

        let cov = codec::decode_vvf("Cov", blob(blobs, "Cov")?)?;
        expect_shape("Cov", &cov, N_MU, N_MU)?;

        let sv = codec::decode_vvf("Sv", blob(blobs, "Sv")?)?;
        expect_shape("Sv", &sv, N_VERTS_3, N_MU)?;

        let sv_inv = codec::decode_vvf("SvInv", blob(blobs, "SvInv")?)?;
        expect_shape("SvInv", &sv_inv, N_VERTS_INV_3, N_MU)?;

        let joints = codec::decode_vvf("SkV", blob(blobs, "SkV")?)?;
        expect_shape("SkV", &joints, N_JOINTS, 3)?;

        let bone_weights = codec::decode_vvf("BonW", blob(blobs, "BonW")?)?;
        expect_shape("BonW", &bone_weights, N_VERTS, N_BONES)?;

        let bone_weights_inv = codec::decode_vvf("BonWInv", blob(blobs, "BonWInv")?)?;
        expect_shape("BonWInv", &bone_weights_inv, N_VERTS_INV, N_BONES)?;

        let avg_verts = codec::decode_vf("AvgVerts", blob(blobs, "AvgVerts")?)?;
        expect_len("AvgVerts", avg_verts.len(), N_VERTS_3)?;

        let verts_inv = codec::decode_vf("VertsInv", blob(blobs, "VertsInv")?)?;
        expect_len("VertsInv", verts_inv.len(), N_VERTS_INV_3)?;
        if verts_inv.iter().any(|v| !v.is_finite()) {
            return Err(InversionError::ModelLoad(
                "blob VertsInv: non-finite coordinate".into(),
            ));
        }

        let faces = codec::decode_vi("Faces", blob(blobs, "Faces")?)?;
        expect_len("Faces", faces.len(), N_FACES_3)?;
        let faces = to_faces("Faces", &faces, N_VERTS)?;

        let faces_inv = codec::decode_vi("FacesInv", blob(blobs, "FacesInv")?)?;
        expect_len("FacesInv", faces_inv.len(), N_FACES_INV_3)?;
        let faces_inv = to_faces("FacesInv", &faces_inv, N_VERTS_INV)?;

        let sizes = codec::decode_vi("LaplacianRings", blob(blobs, "LaplacianRings")?)?;
        let flat = codec::decode_vi(
            "LaplacianRingsAsVectors",
            blob(blobs, "LaplacianRingsAsVectors")?,
        )?;
        let rings = VertexRings::from_one_based(&sizes, &flat, N_VERTS_INV)?;

        let parts = BodyParts::from_blobs(blobs)?;

        Ok(Self {
            gender,
            mu,
            ranges,
            cov,
            sv,
            sv_inv,
            joints,
            bone_weights,
            bone_weights_inv,
            avg_verts,
            verts_inv,
            faces,
            faces_inv,
            rings,
            parts,
        })
    }

    /// Encode back into named blobs (bare names, shared blobs included).
    pub fn to_blobs(&self) -> HashMap<String, Vec<u8>> {
        let faces = |f: &[u32]| f.iter().map(|&i| i as i32).collect::<Vec<_>>();
        let parts = |p: &[u32]| p.iter().map(|&i| i as i32 + 1).collect::<Vec<_>>();

        let mut blobs = HashMap::new();
        blobs.insert("MvnMu".to_string(), codec::encode_vf(&self.mu));
        blobs.insert("Ranges".to_string(), codec::encode_vvf(&self.ranges));
        blobs.insert("Cov".to_string(), codec::encode_vvf(&self.cov));
        blobs.insert("Sv".to_string(), codec::encode_vvf(&self.sv));
        blobs.insert("SvInv".to_string(), codec::encode_vvf(&self.sv_inv));
        blobs.insert("SkV".to_string(), codec::encode_vvf(&self.joints));
        blobs.insert("BonW".to_string(), codec::encode_vvf(&self.bone_weights));
        blobs.insert("BonWInv".to_string(), codec::encode_vvf(&self.bone_weights_inv));
        blobs.insert("AvgVerts".to_string(), codec::encode_vf(&self.avg_verts));
        blobs.insert("VertsInv".to_string(), codec::encode_vf(&self.verts_inv));
        blobs.insert("Faces".to_string(), codec::encode_vi(&faces(&self.faces)));
        blobs.insert("FacesInv".to_string(), codec::encode_vi(&faces(&self.faces_inv)));
        blobs.insert("LaplacianRings".to_string(), codec::encode_vi(&self.rings.sizes()));
        blobs.insert(
            "LaplacianRingsAsVectors".to_string(),
            codec::encode_vi(&self.rings.to_one_based()),
        );
        blobs.insert("InvRightCalf".to_string(), codec::encode_vi(&parts(&self.parts.calf)));
        blobs.insert("InvRightThigh".to_string(), codec::encode_vi(&parts(&self.parts.thigh)));
        blobs.insert(
            "InvRightUpperArm".to_string(),
            codec::encode_vi(&parts(&self.parts.upper_arm)),
        );
        blobs
    }
}

/// Caller-owned set of loaded model bundles, at most one per gender.
///
/// Bundles are immutable and shared by `Arc`, so one store can serve many
/// concurrent inversions.
#[derive(Debug, Clone, Default)]
pub struct ModelStore {
    male: Option<Arc<StatisticalModelBundle>>,
    female: Option<Arc<StatisticalModelBundle>>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) the bundle of its gender.
    pub fn insert(&mut self, bundle: StatisticalModelBundle) {
        let slot = match bundle.gender {
            Gender::Male => &mut self.male,
            Gender::Female => &mut self.female,
        };
        *slot = Some(Arc::new(bundle));
    }

    /// Decode one gender's blobs and insert the result.
    pub fn load<B: AsRef<[u8]>>(&mut self, gender: Gender, blobs: &HashMap<String, B>) -> Result<()> {
        let bundle = StatisticalModelBundle::load(gender, blobs)?;
        info!(%gender, "Model bundle loaded");
        self.insert(bundle);
        Ok(())
    }

    /// Build a store holding both genders.
    pub fn from_blobs<B: AsRef<[u8]>>(
        male: &HashMap<String, B>,
        female: &HashMap<String, B>,
    ) -> Result<Self> {
        let mut store = Self::new();
        store.load(Gender::Male, male)?;
        store.load(Gender::Female, female)?;
        Ok(store)
    }

    pub fn bundle(&self, gender: Gender) -> Result<Arc<StatisticalModelBundle>> {
        let slot = match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
        };
        slot.clone()
            .ok_or_else(|| InversionError::ModelLoad(format!("no {gender} model loaded")))
    }

    pub fn is_loaded(&self, gender: Gender) -> bool {
        match gender {
            Gender::Male => self.male.is_some(),
            Gender::Female => self.female.is_some(),
        }
    }
}
