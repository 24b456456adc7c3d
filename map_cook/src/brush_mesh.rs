//! Convex brush to triangle mesh conversion.
//!
//! A brush only stores its bounding planes, so the polyhedron is rebuilt from
//! scratch: every plane triple is intersected, points outside any half-space
//! are discarded, and each plane collects the surviving corners that lie on it.
//! Faces are wound counter-clockwise when seen from outside the brush.

use compat_quake::{Brush, Plane};
use engine_core::logging;
use rapier3d::na::{Matrix3, Vector3};

use crate::config::BrushCookConfig;

const MIN_BRUSH_PLANES: usize = 4;
const MIN_ROTATION_DEG: f32 = 0.01;
const UP_PARALLEL_LIMIT: f32 = 0.9;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
}

/// Triangle list ready for upload: three indices per triangle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|tri| [tri[0], tri[1], tri[2]])
    }

    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = self.vertices.first()?;
        let mut min = first.position;
        let mut max = first.position;
        for vertex in &self.vertices[1..] {
            for axis in 0..3 {
                min[axis] = min[axis].min(vertex.position[axis]);
                max[axis] = max[axis].max(vertex.position[axis]);
            }
        }
        Some((min, max))
    }
}

/// Result of converting one brush.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BrushMesh {
    pub mesh: Mesh,
    /// Distinct corners of the rebuilt polyhedron.
    pub corners: Vec<[f32; 3]>,
    pub face_count: usize,
}

impl BrushMesh {
    pub fn is_empty(&self) -> bool {
        self.mesh.is_empty()
    }
}

pub fn convert_brush(brush: &Brush, config: &BrushCookConfig) -> BrushMesh {
    convert_labeled(brush, config, "brush")
}

pub fn convert_brush_default(brush: &Brush) -> BrushMesh {
    convert_brush(brush, &BrushCookConfig::default())
}

/// Converts each brush and keeps the non-empty results in input order.
pub fn convert_brushes(brushes: &[Brush], config: &BrushCookConfig) -> Vec<BrushMesh> {
    brushes
        .iter()
        .enumerate()
        .map(|(index, brush)| convert_labeled(brush, config, &format!("brush {}", index)))
        .filter(|converted| !converted.is_empty())
        .collect()
}

pub(crate) fn convert_labeled(brush: &Brush, config: &BrushCookConfig, label: &str) -> BrushMesh {
    let planes = &brush.planes;
    if planes.len() < MIN_BRUSH_PLANES {
        logging::warn(format!(
            "{}: {} planes cannot bound a solid, skipping",
            label,
            planes.len()
        ));
        return BrushMesh::default();
    }

    let corners = solve_corners(planes, config);
    if corners.is_empty() {
        logging::warn(format!("{}: planes enclose no volume, skipping", label));
        return BrushMesh::default();
    }

    let mut mesh = Mesh::default();
    let mut faces: Vec<&Plane> = Vec::new();
    for (plane_index, plane) in planes.iter().enumerate() {
        let polygon = face_polygon(plane, &corners, config.epsilon);
        if polygon.len() < 3 {
            logging::debug(format!(
                "{}: plane {} touches {} corners, no face emitted",
                label,
                plane_index,
                polygon.len()
            ));
            continue;
        }
        let base = mesh.vertices.len() as u32;
        for position in &polygon {
            mesh.vertices.push(Vertex {
                position: [position.x, position.y, position.z],
                normal: plane.normal(),
                tex_coord: texture_coords(*position, plane, config.texel_grid),
            });
        }
        mesh.indices.extend(fan_indices(base, polygon.len() as u32));
        faces.push(plane);
    }

    let face_count = faces.len();
    if face_count == 0 {
        logging::warn(format!("{}: no face has 3 or more corners, skipping", label));
        return BrushMesh::default();
    }
    if !is_closed(&corners, &faces, config.epsilon) {
        logging::warn(format!(
            "{}: surface is open ({} faces from {} planes), brush is likely unbounded",
            label,
            face_count,
            planes.len()
        ));
    }
    logging::debug(format!(
        "{}: {} corners, {} faces, {} triangles",
        label,
        corners.len(),
        face_count,
        mesh.triangle_count()
    ));

    BrushMesh {
        mesh,
        corners: corners.iter().map(|v| [v.x, v.y, v.z]).collect(),
        face_count,
    }
}

fn solve_corners(planes: &[Plane], config: &BrushCookConfig) -> Vec<Vector3<f32>> {
    let mut corners: Vec<Vector3<f32>> = Vec::new();
    let count = planes.len();
    for i in 0..count {
        for j in (i + 1)..count {
            for k in (j + 1)..count {
                let point = match intersect_planes(
                    &planes[i],
                    &planes[j],
                    &planes[k],
                    config.determinant_epsilon,
                ) {
                    Some(point) => point,
                    None => continue,
                };
                if !is_inside(point, planes, config.epsilon) {
                    continue;
                }
                let duplicate = corners
                    .iter()
                    .any(|existing| (existing - point).norm() < config.epsilon);
                if !duplicate {
                    corners.push(point);
                }
            }
        }
    }
    corners
}

fn intersect_planes(
    a: &Plane,
    b: &Plane,
    c: &Plane,
    determinant_epsilon: f32,
) -> Option<Vector3<f32>> {
    let (na, nb, nc) = (a.normal(), b.normal(), c.normal());
    let matrix = Matrix3::new(
        na[0], na[1], na[2], //
        nb[0], nb[1], nb[2], //
        nc[0], nc[1], nc[2],
    );
    if matrix.determinant().abs() < determinant_epsilon {
        return None;
    }
    let inverse = matrix.try_inverse()?;
    let point = inverse * Vector3::new(a.distance(), b.distance(), c.distance());
    if point.iter().all(|component| component.is_finite()) {
        Some(point)
    } else {
        None
    }
}

fn is_inside(point: Vector3<f32>, planes: &[Plane], epsilon: f32) -> bool {
    planes
        .iter()
        .all(|plane| plane.signed_distance([point.x, point.y, point.z]) <= epsilon)
}

// Every corner of a closed convex polyhedron lies on at least three faces.
fn is_closed(corners: &[Vector3<f32>], faces: &[&Plane], epsilon: f32) -> bool {
    corners.iter().all(|corner| {
        let position = [corner.x, corner.y, corner.z];
        faces
            .iter()
            .filter(|plane| plane.signed_distance(position).abs() <= epsilon)
            .count()
            >= 3
    })
}

fn face_polygon(plane: &Plane, corners: &[Vector3<f32>], epsilon: f32) -> Vec<Vector3<f32>> {
    let mut polygon: Vec<Vector3<f32>> = corners
        .iter()
        .filter(|corner| {
            plane
                .signed_distance([corner.x, corner.y, corner.z])
                .abs()
                <= epsilon
        })
        .copied()
        .collect();
    if polygon.len() >= 3 {
        sort_winding(&mut polygon, plane.normal());
    }
    polygon
}

fn sort_winding(polygon: &mut [Vector3<f32>], normal: [f32; 3]) {
    let normal = Vector3::new(normal[0], normal[1], normal[2]);
    let centroid = polygon.iter().sum::<Vector3<f32>>() / polygon.len() as f32;
    let reference = if normal.y.abs() < UP_PARALLEL_LIMIT {
        Vector3::y()
    } else {
        Vector3::x()
    };
    let right = reference.cross(&normal).normalize();
    let up = normal.cross(&right);
    let angle = |point: &Vector3<f32>| {
        let offset = point - centroid;
        offset.dot(&up).atan2(offset.dot(&right))
    };
    polygon.sort_by(|a, b| angle(a).total_cmp(&angle(b)));
}

fn fan_indices(base: u32, count: u32) -> Vec<u32> {
    let mut indices = Vec::with_capacity(count.saturating_sub(2) as usize * 3);
    for i in 1..count.saturating_sub(1) {
        indices.extend_from_slice(&[base, base + i, base + i + 1]);
    }
    indices
}

/// Paraxial projection: the dominant normal axis picks the texture plane.
fn texture_coords(position: Vector3<f32>, plane: &Plane, texel_grid: f32) -> [f32; 2] {
    let normal = plane.normal();
    let abs = [normal[0].abs(), normal[1].abs(), normal[2].abs()];
    let (u_axis, v_axis) = if abs[2] > abs[0] && abs[2] > abs[1] {
        (Vector3::x(), -Vector3::y())
    } else if abs[1] > abs[0] {
        (Vector3::x(), -Vector3::z())
    } else {
        (Vector3::y(), -Vector3::z())
    };
    let scale = plane.scale();
    let offset = plane.offset();
    let mut u = position.dot(&u_axis) * scale[0] / texel_grid + offset[0] / texel_grid;
    let mut v = position.dot(&v_axis) * scale[1] / texel_grid + offset[1] / texel_grid;

    let rotation = plane.rotation_deg();
    if rotation.abs() > MIN_ROTATION_DEG {
        let (sin, cos) = rotation.to_radians().sin_cos();
        let rotated_u = u * cos - v * sin;
        let rotated_v = u * sin + v * cos;
        u = rotated_u;
        v = rotated_v;
    }
    [u, v]
}
