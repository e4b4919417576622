//! Direction sampling helpers for the growth phase.
//!
//! Every function draws from a caller-supplied generator so that a tree's
//! history depends only on its own seeded [`rand::rngs::StdRng`].

use glam::{Quat, Vec2, Vec3};
use rand::Rng;

/// Uniform float in `[0, 1)`.
#[inline]
pub fn unit_f32(rng: &mut impl Rng) -> f32 {
    rng.random::<f32>()
}

/// Spherical interpolation between two directions.
///
/// Both inputs are normalized first; the result is a unit vector. Falls
/// back to `from` when either input is degenerate.
pub fn slerp_dir(from: Vec3, to: Vec3, t: f32) -> Vec3 {
    let (Some(a), Some(b)) = (from.try_normalize(), to.try_normalize()) else {
        return from.normalize_or(Vec3::Y);
    };
    let arc = Quat::from_rotation_arc(a, b);
    (Quat::IDENTITY.slerp(arc, t) * a).normalize_or(a)
}

/// Uniformly distributed point on the unit sphere.
pub fn random_unit_vector(rng: &mut impl Rng) -> Vec3 {
    let z = unit_f32(rng) * 2.0 - 1.0;
    let t = unit_f32(rng) * std::f32::consts::TAU;
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * t.cos(), z, r * t.sin())
}

/// Any unit vector perpendicular to `dir`.
///
/// Uses world-up as the helper axis, or world-right when `dir` is close
/// to vertical.
pub fn orthogonal_axis(dir: Vec3) -> Vec3 {
    let axis = dir.cross(Vec3::Y);
    if axis.length_squared() < 1e-4 {
        dir.cross(Vec3::X).normalize_or(Vec3::Z)
    } else {
        axis.normalize()
    }
}

/// Tilts `base` by an angle drawn from `angle_range` (degrees, min/max)
/// and spins the result by a random azimuth around `base`.
pub fn random_branch_direction(base: Vec3, angle_range: Vec2, rng: &mut impl Rng) -> Vec3 {
    let base = base.normalize_or(Vec3::Y);
    let min_angle = angle_range.x.max(0.0);
    let max_angle = angle_range.y.max(min_angle);
    let axis = orthogonal_axis(base);

    let angle = min_angle + (max_angle - min_angle) * unit_f32(rng);
    let spin = unit_f32(rng) * 360.0;
    let rot = Quat::from_axis_angle(base, spin.to_radians())
        * Quat::from_axis_angle(axis, angle.to_radians());
    (rot * base).normalize_or(base)
}
