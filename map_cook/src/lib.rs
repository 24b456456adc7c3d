//! Map cooking: brush solids to render meshes, level batches and colliders.
#![forbid(unsafe_code)]

mod brush_mesh;
mod config;
mod level;

use rapier3d::prelude::{Collider, ColliderBuilder, Point, Real};

pub use brush_mesh::{
    convert_brush, convert_brush_default, convert_brushes, BrushMesh, Mesh, Vertex,
};
pub use config::{
    BrushCookConfig, BrushCookConfigValidation, DEFAULT_DETERMINANT_EPSILON, DEFAULT_EPSILON,
    DEFAULT_PARALLEL_THRESHOLD, DEFAULT_TEXEL_GRID,
};
pub use level::{
    brush_texture, cook_level, player_spawn, point_entities, LevelBatch, LevelGeometry,
    PointEntity, SpawnPoint, TextureId, TextureKeyCache, DEFAULT_SPAWN_ORIGIN,
    FALLBACK_TEXTURE, PLAYER_START,
};

#[derive(Clone, Debug)]
pub struct BrushCollider {
    pub index: usize,
    pub collider: Collider,
}

/// One convex hull collider per non-empty brush mesh, built from its corners.
///
/// `index` is the position of the source mesh in `meshes`.
pub fn build_brush_colliders(meshes: &[BrushMesh]) -> Result<Vec<BrushCollider>, String> {
    let mut colliders = Vec::new();
    for (index, brush) in meshes.iter().enumerate() {
        if brush.is_empty() {
            continue;
        }
        let points: Vec<Point<Real>> = brush
            .corners
            .iter()
            .map(|corner| Point::new(corner[0], corner[1], corner[2]))
            .collect();
        let collider = ColliderBuilder::convex_hull(&points)
            .ok_or_else(|| format!("brush {} has no convex hull", index))?
            .build();
        colliders.push(BrushCollider { index, collider });
    }
    Ok(colliders)
}

/// Runs `run` with a sink that records messages logged from this thread.
///
/// The sink and the max level are process-wide, so callers are serialized.
#[cfg(test)]
pub(crate) fn capture_log<R>(
    max_level: engine_core::logging::LogLevel,
    run: impl FnOnce() -> R,
) -> (R, Vec<(engine_core::logging::LogLevel, String)>) {
    use engine_core::logging;
    use std::sync::{Arc, Mutex};

    static CAPTURE_LOCK: Mutex<()> = Mutex::new(());
    let _serial = CAPTURE_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let owner = std::thread::current().id();
    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&records);
    logging::set_logger(move |level, message| {
        if std::thread::current().id() == owner {
            sink.lock()
                .expect("capture sink")
                .push((level, message.to_string()));
        }
    });
    let previous = logging::max_level();
    logging::set_max_level(max_level);
    let result = run();
    logging::set_max_level(previous);
    logging::reset_logger();
    let records = records.lock().expect("capture records").clone();
    (result, records)
}
