use glam::Vec3;

use crate::model::codec::Matrix;
use crate::model::N_BONES;

/// Angle sum below which the template is used unposed.
pub const POSE_EPSILON: f32 = 0.01;

/// Bones, joints and pose slots of the articulated limbs.
const RIGHT_FOOT: (usize, usize) = (6, 6);
const LEFT_FOOT: (usize, usize) = (10, 10);
const RIGHT_ARM: ([usize; 2], usize) = ([12, 13], 12);
const LEFT_ARM: ([usize; 2], usize) = ([15, 16], 15);
const RIGHT_LEG: ([usize; 3], usize) = ([4, 5, 6], 4);
const LEFT_LEG: ([usize; 3], usize) = ([8, 9, 10], 8);

pub fn needs_pose(pose: &[f32; 4], feet: &[f32; 2]) -> bool {
    pose.iter().chain(feet).map(|a| a.abs()).sum::<f32>() > POSE_EPSILON
}

fn joint(joints: &Matrix, j: usize) -> Vec3 {
    let r = joints.row(j);
    Vec3::new(r[0], r[1], r[2])
}

/// Rotate in the x-z plane about `pivot`; y is untouched.
fn rotate_xz(p: Vec3, pivot: Vec3, theta: f32) -> Vec3 {
    let (s, c) = theta.sin_cos();
    let d = p - pivot;
    Vec3::new(
        pivot.x + c * d.x + s * d.z,
        p.y,
        pivot.z - s * d.x + c * d.z,
    )
}

/// Rotate in the x-y plane about `pivot`; z is untouched.
fn rotate_xy(p: Vec3, pivot: Vec3, theta: f32) -> Vec3 {
    let (s, c) = theta.sin_cos();
    let d = p - pivot;
    Vec3::new(
        pivot.x + c * d.x - s * d.y,
        pivot.y + s * d.x + c * d.y,
        p.z,
    )
}

/// One linear-blend pass: every bone rotates the whole mesh about its pivot
/// and the results are blended per vertex by the bone weights.
fn blend(
    src: &[Vec3],
    weights: &Matrix,
    pivot: impl Fn(usize) -> (Vec3, f32),
    rotate: fn(Vec3, Vec3, f32) -> Vec3,
) -> Vec<Vec3> {
    let mut out = vec![Vec3::ZERO; src.len()];
    for b in 0..N_BONES {
        let (pr, theta) = pivot(b);
        for (v, (dst, &p)) in out.iter_mut().zip(src).enumerate() {
            let w = weights.get(v, b);
            if w != 0.0 {
                *dst += w * rotate(p, pr, theta);
            }
        }
    }
    out
}

/// Pose the template: feet first (x-z plane), then arms and legs (x-y plane).
///
/// `pose` is right arm, left arm, right leg, left leg; `feet` is right, left.
/// Bones without an angle rotate by zero about the origin, which keeps their
/// vertices in place weighted by their bone weight.
pub fn deform(
    template: &[Vec3],
    joints: &Matrix,
    weights: &Matrix,
    pose: &[f32; 4],
    feet: &[f32; 2],
) -> Vec<Vec3> {
    let feet_posed = blend(
        template,
        weights,
        |b| match b {
            b if b == RIGHT_FOOT.0 => (joint(joints, RIGHT_FOOT.1), feet[0]),
            b if b == LEFT_FOOT.0 => (joint(joints, LEFT_FOOT.1), feet[1]),
            _ => (Vec3::ZERO, 0.0),
        },
        rotate_xz,
    );

    blend(
        &feet_posed,
        weights,
        |b| {
            if RIGHT_ARM.0.contains(&b) {
                (joint(joints, RIGHT_ARM.1), pose[0])
            } else if LEFT_ARM.0.contains(&b) {
                (joint(joints, LEFT_ARM.1), pose[1])
            } else if RIGHT_LEG.0.contains(&b) {
                (joint(joints, RIGHT_LEG.1), pose[2])
            } else if LEFT_LEG.0.contains(&b) {
                (joint(joints, LEFT_LEG.1), pose[3])
            } else {
                (Vec3::ZERO, 0.0)
            }
        },
        rotate_xy,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::N_JOINTS;
    use approx::assert_abs_diff_eq;

    fn one_hot(bones: &[usize]) -> Matrix {
        let mut w = Matrix::zeros(bones.len(), N_BONES);
        for (v, &b) in bones.iter().enumerate() {
            w.set(v, b, 1.0);
        }
        w
    }

    fn joints() -> Matrix {
        let mut j = Matrix::zeros(N_JOINTS, 3);
        for i in 0..N_JOINTS {
            j.set(i, 0, 0.1 * i as f32);
            j.set(i, 1, 1.0);
        }
        j
    }

    #[test]
    fn zero_angles_with_unit_weights_is_identity() {
        let template = vec![Vec3::new(0.1, 0.2, 0.3), Vec3::new(-1.0, 2.0, 0.5)];
        let w = one_hot(&[3, 12]);
        let out = deform(&template, &joints(), &w, &[0.0; 4], &[0.0; 2]);
        for (a, b) in out.iter().zip(&template) {
            assert_abs_diff_eq!(a.distance(*b), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn right_arm_rotates_about_its_joint() {
        let j = joints();
        let pivot = Vec3::new(1.2, 1.0, 0.0);
        let template = vec![pivot + Vec3::new(1.0, 0.0, 0.25)];
        let w = one_hot(&[13]);
        let out = deform(&template, &j, &w, &[std::f32::consts::FRAC_PI_2, 0.0, 0.0, 0.0], &[0.0; 2]);
        // Quarter turn in x-y maps +x to +y, z unchanged.
        assert_abs_diff_eq!(out[0].x, pivot.x, epsilon = 1e-5);
        assert_abs_diff_eq!(out[0].y, pivot.y + 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out[0].z, 0.25, epsilon = 1e-6);
    }

    #[test]
    fn right_foot_rotates_in_xz_before_the_leg() {
        let j = joints();
        let foot = Vec3::new(0.6, 1.0, 0.0);
        let template = vec![foot + Vec3::new(1.0, 0.5, 0.0)];
        let w = one_hot(&[6]);
        let out = deform(&template, &j, &w, &[0.0; 4], &[std::f32::consts::FRAC_PI_2, 0.0]);
        // x' = px + sin * dz = px, z' = pz - sin * dx = -1
        assert_abs_diff_eq!(out[0].x, foot.x, epsilon = 1e-5);
        assert_abs_diff_eq!(out[0].y, 1.5, epsilon = 1e-6);
        assert_abs_diff_eq!(out[0].z, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn unposed_bones_ignore_angles() {
        let template = vec![Vec3::new(0.3, 0.4, 0.5)];
        let w = one_hot(&[0]);
        let out = deform(&template, &joints(), &w, &[1.0, 1.0, 1.0, 1.0], &[1.0, 1.0]);
        assert_abs_diff_eq!(out[0].distance(template[0]), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn pose_threshold() {
        assert!(!needs_pose(&[0.0; 4], &[0.0; 2]));
        assert!(!needs_pose(&[0.002, -0.002, 0.0, 0.0], &[0.001, 0.0]));
        assert!(needs_pose(&[0.0, 0.0, 0.0, -0.02], &[0.0; 2]));
    }
}
