//! Skeletal mesh synthesis.
//!
//! Turns a node list (positions, radii, parent links) into renderable
//! geometry:
//! - [`build_tube_mesh`] - one ring per node, stitched along every
//!   parent→child edge, with parallel-transport frames so the rings do
//!   not roll around the branch axis.
//! - [`build_bark_mesh`] - one independent cylinder per [`Segment`].
//! - [`build_line_mesh`] - one line per segment, for skeleton debugging.
//! - [`build_leaf_mesh`] - a leaf template instanced once per
//!   [`LeafInstance`].
//!
//! All builders are pure and return an empty [`Mesh`] on degenerate input.

use glam::{Mat3, Mat4, Quat, Vec3};

use crate::types::NodeId;

/// Primitive type of a [`Mesh`]'s index buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Topology {
    #[default]
    Triangles,
    Lines,
}

/// Vertex and index buffers with 32-bit indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub topology: Topology,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines() -> Self {
        Self {
            topology: Topology::Lines,
            ..Self::default()
        }
    }

    pub fn with_capacity(vertices: usize, indices: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices),
            normals: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(indices),
            topology: Topology::Triangles,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles, or `0` for a line mesh.
    pub fn triangle_count(&self) -> usize {
        match self.topology {
            Topology::Triangles => self.indices.len() / 3,
            Topology::Lines => 0,
        }
    }

    /// Number of line segments, or `0` for a triangle mesh.
    pub fn line_count(&self) -> usize {
        match self.topology {
            Topology::Lines => self.indices.len() / 2,
            Topology::Triangles => 0,
        }
    }

    /// Adds one vertex and returns its index.
    pub fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let idx = self.positions.len() as u32;
        self.positions.push(position);
        self.normals.push(normal);
        idx
    }

    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Appends `other`, offsetting its indices past the current vertices.
    ///
    /// Both meshes are expected to share a topology.
    pub fn merge(&mut self, other: &Mesh) {
        let offset = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.indices.extend(other.indices.iter().map(|i| i + offset));
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` when empty.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p))),
        )
    }
}

/// A tapered cylinder between two points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub start: Vec3,
    pub end: Vec3,
    pub start_radius: f32,
    pub end_radius: f32,
}

/// Placement of one leaf template copy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeafInstance {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl LeafInstance {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), self.rotation, self.translation)
    }
}

/// Rotation mapping local +Z to `forward` and local +Y as close to `up`
/// as possible. Returns identity for a zero `forward`.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let Some(f) = forward.try_normalize() else {
        return Quat::IDENTITY;
    };
    let mut right = up.cross(f);
    if right.length_squared() < 1e-8 {
        right = f.any_orthonormal_vector().cross(f);
    }
    let right = right.normalize();
    let new_up = f.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, new_up, f))
}

/// A unit vector orthogonal to `forward`, built against world-up (or
/// world-right when `forward` is close to vertical).
fn fallback_normal(forward: Vec3) -> Vec3 {
    let helper = if forward.dot(Vec3::Y).abs() > 0.9 {
        Vec3::X
    } else {
        Vec3::Y
    };
    forward.cross(helper).normalize_or(Vec3::Z)
}

/// Builds a continuous tube along the skeleton.
///
/// Each node gets one ring of `radial_segments` vertices (at least 3),
/// oriented by a parallel-transport frame: the root frame is an arbitrary
/// basis orthogonal to its forward vector, and every other node reuses
/// its parent's normal with the component along its own forward removed.
/// Each parent→child edge contributes two triangles per radial segment.
/// Forks share the parent ring.
///
/// ### Parameters
/// - `positions`, `radii`, `parents` - Per-node data, all the same length.
///   `parents[i]` must be smaller than `i` for frames to propagate;
///   anything else is treated as a root.
/// - `radial_segments` - Ring resolution.
///
/// ### Returns
/// The tube mesh, or an empty mesh when the inputs are empty or their
/// lengths disagree.
pub fn build_tube_mesh(
    positions: &[Vec3],
    radii: &[f32],
    parents: &[Option<NodeId>],
    radial_segments: usize,
) -> Mesh {
    let n = positions.len();
    if n == 0 || radii.len() != n || parents.len() != n {
        return Mesh::new();
    }
    let segs = radial_segments.max(3);
    let parent_of = |i: usize| parents[i].filter(|&p| p < n && p != i);

    let mut child_sum = vec![Vec3::ZERO; n];
    let mut has_child = vec![false; n];
    for i in 0..n {
        if let Some(p) = parent_of(i) {
            child_sum[p] += positions[i] - positions[p];
            has_child[p] = true;
        }
    }

    let forwards: Vec<Vec3> = (0..n)
        .map(|i| {
            let f = match parent_of(i) {
                Some(p) => positions[i] - positions[p],
                None if has_child[i] => child_sum[i],
                None => Vec3::Y,
            };
            if f.length_squared() < 1e-4 {
                Vec3::Y
            } else {
                f.normalize()
            }
        })
        .collect();

    let mut frame_normals = vec![Vec3::ZERO; n];
    let mut frame_binormals = vec![Vec3::ZERO; n];
    for i in 0..n {
        let f = forwards[i];
        let normal = match parent_of(i) {
            Some(p) => {
                let prev = frame_normals[p];
                let projected = prev - f * prev.dot(f);
                if projected.length_squared() < 1e-4 {
                    fallback_normal(f)
                } else {
                    projected.normalize()
                }
            }
            None => fallback_normal(f),
        };
        frame_normals[i] = normal;
        frame_binormals[i] = f.cross(normal).normalize_or(Vec3::X);
    }

    let edges = (0..n).filter(|&i| parent_of(i).is_some()).count();
    let mut mesh = Mesh::with_capacity(n * segs, edges * segs * 6);

    for i in 0..n {
        let r = radii[i].max(1e-4);
        let (nrm, bin) = (frame_normals[i], frame_binormals[i]);
        for s in 0..segs {
            let angle = std::f32::consts::TAU * (s as f32 / segs as f32);
            let dir = nrm * angle.cos() + bin * angle.sin();
            mesh.push_vertex(positions[i] + dir * r, dir);
        }
    }

    for i in 0..n {
        let Some(p) = parent_of(i) else {
            continue;
        };
        let parent_start = (p * segs) as u32;
        let child_start = (i * segs) as u32;
        for s in 0..segs {
            let s1 = (s + 1) % segs;
            let (p0, p1) = (parent_start + s as u32, parent_start + s1 as u32);
            let (c0, c1) = (child_start + s as u32, child_start + s1 as u32);
            mesh.add_triangle(p0, c0, p1);
            mesh.add_triangle(p1, c0, c1);
        }
    }

    mesh
}

/// Builds one open cylinder per segment, each with its own frame.
///
/// Unlike [`build_tube_mesh`] the cylinders do not share rings. Segments
/// shorter than `1e-4` are skipped.
pub fn build_bark_mesh(segments: &[Segment], radial_segments: usize) -> Mesh {
    if segments.is_empty() {
        return Mesh::new();
    }
    let segs = radial_segments.max(3);
    let mut mesh = Mesh::with_capacity(segments.len() * segs * 2, segments.len() * segs * 6);

    for seg in segments {
        let axis = seg.end - seg.start;
        let length = axis.length();
        if length <= 1e-4 {
            continue;
        }
        let axis = axis / length;
        let tangent = {
            let t = axis.cross(Vec3::Y);
            if t.length_squared() < 1e-4 {
                axis.cross(Vec3::X)
            } else {
                t
            }
        }
        .normalize();
        let bitangent = axis.cross(tangent);

        let base = mesh.vertex_count() as u32;
        for s in 0..segs {
            let angle = std::f32::consts::TAU * (s as f32 / segs as f32);
            let dir = tangent * angle.cos() + bitangent * angle.sin();
            mesh.push_vertex(seg.start + dir * seg.start_radius, dir);
            mesh.push_vertex(seg.end + dir * seg.end_radius, dir);
        }
        for s in 0..segs as u32 {
            let next = (s + 1) % segs as u32;
            let (i0, i1) = (base + s * 2, base + s * 2 + 1);
            let (i2, i3) = (base + next * 2, base + next * 2 + 1);
            mesh.add_triangle(i0, i2, i1);
            mesh.add_triangle(i2, i3, i1);
        }
    }

    mesh
}

/// Builds a line list with one segment per skeleton edge.
pub fn build_line_mesh(segments: &[Segment]) -> Mesh {
    let mut mesh = Mesh::lines();
    for seg in segments {
        let a = mesh.push_vertex(seg.start, Vec3::ZERO);
        let b = mesh.push_vertex(seg.end, Vec3::ZERO);
        mesh.indices.extend_from_slice(&[a, b]);
    }
    mesh
}

/// Batches `template` once per instance into a single triangle mesh.
///
/// Positions go through the full scale/rotation/translation transform;
/// normals are only rotated since the scale is uniform.
pub fn build_leaf_mesh(template: &Mesh, instances: &[LeafInstance]) -> Mesh {
    if template.is_empty() || instances.is_empty() {
        return Mesh::new();
    }
    let mut mesh = Mesh::with_capacity(
        template.vertex_count() * instances.len(),
        template.indices.len() * instances.len(),
    );
    for inst in instances {
        let m = inst.matrix();
        let offset = mesh.vertex_count() as u32;
        for (i, &p) in template.positions.iter().enumerate() {
            let normal = template.normals.get(i).copied().unwrap_or(Vec3::Z);
            mesh.positions.push(m.transform_point3(p));
            mesh.normals.push((inst.rotation * normal).normalize_or_zero());
        }
        mesh.indices
            .extend(template.indices.iter().map(|&i| i + offset));
    }
    mesh
}

/// A unit quad in the XY plane facing +Z, usable as a leaf template.
pub fn unit_quad() -> Mesh {
    let mut mesh = Mesh::with_capacity(4, 6);
    for (x, y) in [(-0.5, 0.0), (0.5, 0.0), (0.5, 1.0), (-0.5, 1.0)] {
        mesh.push_vertex(Vec3::new(x, y, 0.0), Vec3::Z);
    }
    mesh.add_triangle(0, 1, 2);
    mesh.add_triangle(0, 2, 3);
    mesh
}
