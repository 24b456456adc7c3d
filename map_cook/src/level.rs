use std::collections::HashMap;

use compat_quake::{Brush, Map, WORLDSPAWN};
use engine_core::logging;
use rayon::prelude::*;

use crate::brush_mesh::{convert_labeled, BrushMesh};
use crate::config::BrushCookConfig;

pub const FALLBACK_TEXTURE: &str = "test_texture";
pub const PLAYER_START: &str = "info_player_start";
pub const DEFAULT_SPAWN_ORIGIN: [f32; 3] = [0.0, 0.0, 32.0];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Texture names seen while cooking, each mapped to a stable id.
///
/// The renderer owns this across level loads and resolves ids to images; the
/// cook only hands out keys.
#[derive(Clone, Debug, Default)]
pub struct TextureKeyCache {
    ids: HashMap<String, TextureId>,
    names: Vec<String>,
}

impl TextureKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> TextureId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = TextureId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn get(&self, name: &str) -> Option<TextureId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: TextureId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.names.clear();
    }
}

#[derive(Clone, Debug)]
pub struct LevelBatch {
    pub entity_index: usize,
    pub brush_index: usize,
    pub texture: TextureId,
    pub brush: BrushMesh,
}

#[derive(Clone, Debug, Default)]
pub struct LevelGeometry {
    pub batches: Vec<LevelBatch>,
    pub skipped_brushes: usize,
}

impl LevelGeometry {
    pub fn triangle_count(&self) -> usize {
        self.batches
            .iter()
            .map(|batch| batch.brush.mesh.triangle_count())
            .sum()
    }

    pub fn vertex_count(&self) -> usize {
        self.batches
            .iter()
            .map(|batch| batch.brush.mesh.vertices.len())
            .sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnPoint {
    pub origin: [f32; 3],
    pub angle_deg: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PointEntity {
    pub entity_index: usize,
    pub classname: String,
    pub origin: [f32; 3],
}

/// Converts the level's brushes and interns their texture keys.
///
/// Only worldspawn brushes are cooked unless `include_brush_entities` is set,
/// in which case brushes owned by any other entity (doors, triggers) follow.
pub fn cook_level(
    map: &Map,
    config: &BrushCookConfig,
    textures: &mut TextureKeyCache,
) -> LevelGeometry {
    let jobs = collect_brush_jobs(map, config);
    logging::info(format!("converting {} brushes", jobs.len()));

    let convert = |(entity_index, brush_index, brush): &(usize, usize, &Brush)| {
        let label = format!("entity {} brush {}", entity_index, brush_index);
        convert_labeled(brush, config, &label)
    };
    let converted: Vec<BrushMesh> = if jobs.len() >= config.parallel_threshold {
        jobs.par_iter().map(convert).collect()
    } else {
        jobs.iter().map(convert).collect()
    };

    let mut level = LevelGeometry::default();
    for ((entity_index, brush_index, brush), brush_mesh) in jobs.into_iter().zip(converted) {
        if brush_mesh.is_empty() {
            level.skipped_brushes += 1;
            continue;
        }
        let texture = textures.intern(brush_texture(brush));
        level.batches.push(LevelBatch {
            entity_index,
            brush_index,
            texture,
            brush: brush_mesh,
        });
    }

    for entity in point_entities(map) {
        logging::info(format!(
            "entity {} '{}' at {:.1} {:.1} {:.1}",
            entity.entity_index,
            entity.classname,
            entity.origin[0],
            entity.origin[1],
            entity.origin[2]
        ));
    }
    logging::info(format!(
        "level cooked: {} batches, {} triangles, {} skipped brushes, {} textures",
        level.batches.len(),
        level.triangle_count(),
        level.skipped_brushes,
        textures.len()
    ));
    level
}

fn collect_brush_jobs<'a>(
    map: &'a Map,
    config: &BrushCookConfig,
) -> Vec<(usize, usize, &'a Brush)> {
    let mut jobs = Vec::new();
    for (entity_index, entity) in map.entities.iter().enumerate() {
        if entity_index > 0 && !config.include_brush_entities {
            break;
        }
        for (brush_index, brush) in entity.brushes.iter().enumerate() {
            jobs.push((entity_index, brush_index, brush));
        }
    }
    jobs
}

/// A brush is drawn with the texture of its first plane.
pub fn brush_texture(brush: &Brush) -> &str {
    brush
        .planes
        .first()
        .map(|plane| plane.texture())
        .unwrap_or(FALLBACK_TEXTURE)
}

pub fn player_spawn(map: &Map) -> SpawnPoint {
    match map.find_entity_by_class(PLAYER_START) {
        Some(entity) => SpawnPoint {
            origin: entity.origin(),
            angle_deg: entity.get_float("angle", 0.0),
        },
        None => {
            logging::warn(format!(
                "no {} found, spawning at {:?}",
                PLAYER_START, DEFAULT_SPAWN_ORIGIN
            ));
            SpawnPoint {
                origin: DEFAULT_SPAWN_ORIGIN,
                angle_deg: 0.0,
            }
        }
    }
}

/// Entities without brushes (lights, spawns, items), in source order.
pub fn point_entities(map: &Map) -> Vec<PointEntity> {
    map.entities
        .iter()
        .enumerate()
        .filter(|(_, entity)| entity.classname != WORLDSPAWN && entity.is_point_entity())
        .map(|(entity_index, entity)| PointEntity {
            entity_index,
            classname: entity.classname.clone(),
            origin: entity.origin(),
        })
        .collect()
}
