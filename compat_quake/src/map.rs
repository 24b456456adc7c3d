//! Quake-style `.map` text parsing into entities, brushes, and planes.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use engine_core::logging;

use crate::map_text::{is_quoted, remove_comments, split_into_blocks, strip_quotes, tokenize};

const PLANE_TOKEN_COUNT: usize = 21;
const PAREN_POSITIONS: [(usize, &str); 6] = [
    (0, "("),
    (4, ")"),
    (5, "("),
    (9, ")"),
    (10, "("),
    (14, ")"),
];
const NORMAL_EPS: f32 = 1.0e-6;

pub const WORLDSPAWN: &str = "worldspawn";

#[derive(Debug)]
pub enum MapError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Io { path, source } => {
                write!(f, "failed to open map file {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for MapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapError::Io { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaneParseError {
    TooFewTokens { found: usize },
    ExpectedParen { position: usize, found: String },
    InvalidNumber { position: usize, found: String },
    DegeneratePlane,
}

impl fmt::Display for PlaneParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaneParseError::TooFewTokens { found } => write!(
                f,
                "expected {} tokens, found {}",
                PLANE_TOKEN_COUNT, found
            ),
            PlaneParseError::ExpectedParen { position, found } => {
                write!(f, "expected parenthesis at token {}, found '{}'", position, found)
            }
            PlaneParseError::InvalidNumber { position, found } => {
                write!(f, "invalid number at token {}: '{}'", position, found)
            }
            PlaneParseError::DegeneratePlane => write!(f, "plane points are collinear"),
        }
    }
}

impl std::error::Error for PlaneParseError {}

/// One brush face: three points on the plane plus texture alignment.
///
/// The normal points out of the brush; a point `v` is inside when
/// `dot(normal, v) - distance <= eps`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    points: [[f32; 3]; 3],
    normal: [f32; 3],
    distance: f32,
    texture: String,
    offset: [f32; 2],
    rotation_deg: f32,
    scale: [f32; 2],
}

impl Plane {
    /// Computes the plane equation from the three defining points.
    ///
    /// The normal is `normalize(cross(p3 - p1, p2 - p1))`, which is outward for
    /// the winding written by Quake-family editors.
    pub fn from_points(
        p1: [f32; 3],
        p2: [f32; 3],
        p3: [f32; 3],
        texture: impl Into<String>,
    ) -> Result<Self, PlaneParseError> {
        let e1 = sub(p2, p1);
        let e2 = sub(p3, p1);
        let normal = normalize(cross(e2, e1)).ok_or(PlaneParseError::DegeneratePlane)?;
        Ok(Self {
            points: [p1, p2, p3],
            normal,
            distance: dot(normal, p1),
            texture: texture.into(),
            offset: [0.0, 0.0],
            rotation_deg: 0.0,
            scale: [1.0, 1.0],
        })
    }

    pub fn with_alignment(mut self, offset: [f32; 2], rotation_deg: f32, scale: [f32; 2]) -> Self {
        self.offset = offset;
        self.rotation_deg = rotation_deg;
        self.scale = scale;
        self
    }

    pub fn points(&self) -> [[f32; 3]; 3] {
        self.points
    }

    pub fn normal(&self) -> [f32; 3] {
        self.normal
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn texture(&self) -> &str {
        &self.texture
    }

    pub fn offset(&self) -> [f32; 2] {
        self.offset
    }

    pub fn rotation_deg(&self) -> f32 {
        self.rotation_deg
    }

    pub fn scale(&self) -> [f32; 2] {
        self.scale
    }

    /// Signed distance of `point` from the plane; positive is outside.
    pub fn signed_distance(&self, point: [f32; 3]) -> f32 {
        dot(self.normal, point) - self.distance
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Brush {
    pub planes: Vec<Plane>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    pub classname: String,
    pub properties: BTreeMap<String, String>,
    pub brushes: Vec<Brush>,
}

impl Entity {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn origin(&self) -> [f32; 3] {
        self.get_vector3("origin", [0.0, 0.0, 0.0])
    }

    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        self.get(key)
            .and_then(|value| leading_number(value).parse::<i32>().ok())
            .unwrap_or(default)
    }

    pub fn get_float(&self, key: &str, default: f32) -> f32 {
        self.get(key)
            .and_then(|value| leading_number(value).parse::<f32>().ok())
            .unwrap_or(default)
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Reads a whitespace separated `"x y z"` value; extra components are ignored.
    pub fn get_vector3(&self, key: &str, default: [f32; 3]) -> [f32; 3] {
        let value = match self.get(key) {
            Some(value) => value,
            None => return default,
        };
        let mut parts = value.split_whitespace().map(str::parse::<f32>);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(Ok(x)), Some(Ok(y)), Some(Ok(z))) => [x, y, z],
            _ => default,
        }
    }

    pub fn is_point_entity(&self) -> bool {
        self.brushes.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Map {
    pub entities: Vec<Entity>,
}

impl Map {
    /// Entity 0, which by convention owns the static level geometry.
    pub fn worldspawn(&self) -> Option<&Entity> {
        self.entities.first()
    }

    pub fn find_entity_by_class(&self, classname: &str) -> Option<&Entity> {
        self.entities
            .iter()
            .find(|entity| entity.classname == classname)
    }

    pub fn find_entities_by_class(&self, classname: &str) -> Vec<&Entity> {
        self.entities
            .iter()
            .filter(|entity| entity.classname == classname)
            .collect()
    }

    pub fn brush_count(&self) -> usize {
        self.entities.iter().map(|entity| entity.brushes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// A parsed map together with every recoverable diagnostic raised on the way.
#[derive(Debug, Clone, Default)]
pub struct MapLoad {
    pub map: Map,
    pub warnings: Vec<String>,
}

pub fn load_map_file(path: impl AsRef<Path>) -> Result<MapLoad, MapError> {
    let path = path.as_ref();
    logging::info(format!("loading map file: {}", path.display()));
    let text = fs::read_to_string(path).map_err(|source| {
        let err = MapError::Io {
            path: path.to_path_buf(),
            source,
        };
        logging::error(err.to_string());
        err
    })?;
    let load = parse_map(&text);
    logging::info(format!(
        "map loaded: {} entities, {} worldspawn brushes, {} warnings",
        load.map.entities.len(),
        load.map
            .worldspawn()
            .map(|entity| entity.brushes.len())
            .unwrap_or(0),
        load.warnings.len()
    ));
    Ok(load)
}

pub fn parse_map(text: &str) -> MapLoad {
    let mut parser = MapParser::default();
    let text = remove_comments(text);
    let blocks = split_into_blocks(&text, '{', '}');
    logging::debug(format!("found {} entity blocks", blocks.len()));
    for (index, block) in blocks.iter().enumerate() {
        let entity = parser.parse_entity(index, block);
        parser.map.entities.push(entity);
    }
    if let Some(first) = parser.map.worldspawn() {
        if first.classname != WORLDSPAWN {
            let message = format!(
                "first entity is '{}', expected {}",
                first.classname, WORLDSPAWN
            );
            parser.warn(message);
        }
    }
    MapLoad {
        map: parser.map,
        warnings: parser.warnings,
    }
}

pub fn parse_plane(line: &str) -> Result<Plane, PlaneParseError> {
    let tokens = tokenize(line);
    if tokens.len() < PLANE_TOKEN_COUNT {
        return Err(PlaneParseError::TooFewTokens {
            found: tokens.len(),
        });
    }
    for (position, expected) in PAREN_POSITIONS {
        if tokens[position] != expected {
            return Err(PlaneParseError::ExpectedParen {
                position,
                found: tokens[position].clone(),
            });
        }
    }
    let number = |position: usize| -> Result<f32, PlaneParseError> {
        let token = &tokens[position];
        match token.parse::<f32>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(PlaneParseError::InvalidNumber {
                position,
                found: token.clone(),
            }),
        }
    };
    let point = |start: usize| -> Result<[f32; 3], PlaneParseError> {
        Ok([number(start)?, number(start + 1)?, number(start + 2)?])
    };
    let p1 = point(1)?;
    let p2 = point(6)?;
    let p3 = point(11)?;
    let texture = strip_quotes(&tokens[15]).to_string();
    let offset = [number(16)?, number(17)?];
    let rotation_deg = number(18)?;
    let scale = [number(19)?, number(20)?];
    Ok(Plane::from_points(p1, p2, p3, texture)?.with_alignment(offset, rotation_deg, scale))
}

#[derive(Default)]
struct MapParser {
    map: Map,
    warnings: Vec<String>,
}

impl MapParser {
    fn warn(&mut self, message: String) {
        logging::warn(&message);
        self.warnings.push(message);
    }

    fn parse_entity(&mut self, entity_index: usize, block: &str) -> Entity {
        let mut entity = Entity::default();
        let mut lines = block.lines();
        while let Some(line) = lines.next() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix('{') {
                let mut brush_lines = vec![rest.to_string()];
                let mut depth = 1i32 + brace_delta(rest);
                let mut closed = depth <= 0;
                while !closed {
                    let next = match lines.next() {
                        Some(next) => next,
                        None => break,
                    };
                    depth += brace_delta(next);
                    if depth > 0 {
                        brush_lines.push(next.to_string());
                    } else {
                        closed = true;
                    }
                }
                if !closed {
                    self.warn(format!(
                        "entity {}: brush {} is missing its closing brace",
                        entity_index,
                        entity.brushes.len()
                    ));
                }
                let brush = self.parse_brush(entity_index, entity.brushes.len(), &brush_lines);
                entity.brushes.push(brush);
            } else if line.starts_with('"') {
                let tokens = tokenize(line);
                if tokens.len() < 2 {
                    self.warn(format!(
                        "entity {}: malformed property line: {}",
                        entity_index, line
                    ));
                    continue;
                }
                if !is_quoted(&tokens[0]) || !is_quoted(&tokens[1]) {
                    self.warn(format!(
                        "entity {}: unterminated quote in property line: {}",
                        entity_index, line
                    ));
                }
                let key = strip_quotes(&tokens[0]).trim_start_matches('"').to_string();
                let value = strip_quotes(&tokens[1]).trim_start_matches('"').to_string();
                if key == "classname" {
                    entity.classname = value;
                } else {
                    entity.properties.insert(key, value);
                }
            } else {
                logging::debug(format!(
                    "entity {}: skipping unrecognized line: {}",
                    entity_index, line
                ));
            }
        }
        entity
    }

    fn parse_brush(&mut self, entity_index: usize, brush_index: usize, lines: &[String]) -> Brush {
        let mut brush = Brush::default();
        for line in lines {
            let line = line.trim();
            if !line.starts_with('(') {
                continue;
            }
            match parse_plane(line) {
                Ok(plane) => brush.planes.push(plane),
                Err(err) => self.warn(format!(
                    "entity {} brush {}: dropping plane ({}): {}",
                    entity_index, brush_index, err, line
                )),
            }
        }
        brush
    }
}

fn brace_delta(line: &str) -> i32 {
    line.chars().fold(0, |depth, ch| match ch {
        '{' => depth + 1,
        '}' => depth - 1,
        _ => depth,
    })
}

// Only the first word counts: "12 units" reads as 12.
fn leading_number(value: &str) -> &str {
    let value = value.trim_start();
    value.split_whitespace().next().unwrap_or("")
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn normalize(v: [f32; 3]) -> Option<[f32; 3]> {
    let len = dot(v, v).sqrt();
    if !len.is_finite() || len <= NORMAL_EPS {
        return None;
    }
    Some([v[0] / len, v[1] / len, v[2] / len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    const CUBE_MAP: &str = r#"// Game: Quake
// Format: Standard
// entity 0
{
"classname" "worldspawn"
"wad" "base.wad"
// brush 0
{
( -32 -32 -32 ) ( -32 -31 -32 ) ( -32 -32 -31 ) stone 0 0 0 1 1
( -32 -32 -32 ) ( -32 -32 -31 ) ( -31 -32 -32 ) stone 0 0 0 1 1
( -32 -32 -32 ) ( -31 -32 -32 ) ( -32 -31 -32 ) floor 0 0 0 1 1
( 32 32 32 ) ( 32 33 32 ) ( 33 32 32 ) ceiling 0 0 0 1 1
( 32 32 32 ) ( 33 32 32 ) ( 32 32 33 ) stone 0 0 0 1 1
( 32 32 32 ) ( 32 32 33 ) ( 32 33 32 ) stone 0 0 0 1 1
}
}
// entity 1
{
"classname" "info_player_start"
"origin" "0 0 32"
"angle" "90"
}
"#;

    fn approx(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1.0e-5)
    }

    #[test]
    fn parse_two_entity_map() {
        let load = parse_map(CUBE_MAP);
        assert!(load.warnings.is_empty(), "{:?}", load.warnings);
        let map = &load.map;
        assert_eq!(map.entities.len(), 2);
        let world = map.worldspawn().expect("worldspawn");
        assert_eq!(world.classname, WORLDSPAWN);
        assert_eq!(world.get("wad"), Some("base.wad"));
        assert!(world.get("classname").is_none());
        assert_eq!(world.brushes.len(), 1);
        assert_eq!(world.brushes[0].planes.len(), 6);

        let start = map
            .find_entity_by_class("info_player_start")
            .expect("player start");
        assert_eq!(start.origin(), [0.0, 0.0, 32.0]);
        assert_eq!(start.get_float("angle", 0.0), 90.0);
        assert!(start.is_point_entity());
        assert_eq!(map.brush_count(), 1);
    }

    #[test]
    fn plane_normals_point_out_of_box() {
        let load = parse_map(CUBE_MAP);
        let brush = &load.map.entities[0].brushes[0];
        let expected = [
            ([-1.0, 0.0, 0.0], 32.0),
            ([0.0, -1.0, 0.0], 32.0),
            ([0.0, 0.0, -1.0], 32.0),
            ([0.0, 0.0, 1.0], 32.0),
            ([0.0, 1.0, 0.0], 32.0),
            ([1.0, 0.0, 0.0], 32.0),
        ];
        for (plane, (normal, distance)) in brush.planes.iter().zip(expected) {
            assert!(approx(plane.normal(), normal), "{:?}", plane.normal());
            assert!((plane.distance() - distance).abs() < 1.0e-4);
            assert!(plane.signed_distance([0.0, 0.0, 0.0]) < 0.0);
        }
    }

    #[test]
    fn parse_plane_reads_alignment() {
        let plane = parse_plane("( 0 0 0 ) ( 0 1 0 ) ( 1 0 0 ) metal/plate 16 -8 45 0.5 2")
            .expect("plane");
        assert_eq!(plane.texture(), "metal/plate");
        assert_eq!(plane.offset(), [16.0, -8.0]);
        assert_eq!(plane.rotation_deg(), 45.0);
        assert_eq!(plane.scale(), [0.5, 2.0]);
        assert!(approx(plane.normal(), [0.0, 0.0, 1.0]));
        assert_eq!(plane.points()[1], [0.0, 1.0, 0.0]);
    }

    #[test]
    fn parse_plane_rejects_short_line() {
        let err = parse_plane("( 0 0 0 ) ( 0 1 0 ) ( 1 0 0 ) base 0 0 0 1").expect_err("short");
        assert_eq!(err, PlaneParseError::TooFewTokens { found: 20 });
    }

    #[test]
    fn parse_plane_rejects_bad_number() {
        let err = parse_plane("( 0 0 x ) ( 0 1 0 ) ( 1 0 0 ) base 0 0 0 1 1").expect_err("bad");
        assert!(matches!(err, PlaneParseError::InvalidNumber { position: 3, .. }));
    }

    #[test]
    fn parse_plane_rejects_missing_paren() {
        let err = parse_plane("( 0 0 0 ( 0 1 0 ) ( 1 0 0 ) base 0 0 0 1 1 1").expect_err("paren");
        assert!(matches!(err, PlaneParseError::ExpectedParen { position: 4, .. }));
    }

    #[test]
    fn parse_plane_rejects_collinear_points() {
        let err = parse_plane("( 0 0 0 ) ( 1 0 0 ) ( 2 0 0 ) base 0 0 0 1 1").expect_err("line");
        assert_eq!(err, PlaneParseError::DegeneratePlane);
    }

    #[test]
    fn missing_token_drops_one_plane_only() {
        let broken = CUBE_MAP.replace(
            "( 32 32 32 ) ( 32 33 32 ) ( 33 32 32 ) ceiling 0 0 0 1 1",
            "( 32 32 32 ) ( 32 33 32 ) ( 33 32 32 ) ceiling 0 0 0 1",
        );
        let load = parse_map(&broken);
        assert_eq!(load.warnings.len(), 1);
        assert_eq!(load.map.entities.len(), 2);
        assert_eq!(load.map.entities[0].brushes.len(), 1);
        assert_eq!(load.map.entities[0].brushes[0].planes.len(), 5);
        assert_eq!(load.map.entities[1].origin(), [0.0, 0.0, 32.0]);
    }

    #[test]
    fn typed_accessors_fall_back() {
        let mut entity = Entity::default();
        entity.properties.insert("light".to_string(), "300".to_string());
        entity.properties.insert("wait".to_string(), "1.5".to_string());
        entity.properties.insert("origin".to_string(), "1 two 3".to_string());
        entity.properties.insert("target".to_string(), "t1".to_string());
        assert_eq!(entity.get_int("light", 0), 300);
        assert_eq!(entity.get_int("missing", 7), 7);
        assert_eq!(entity.get_int("target", -1), -1);
        assert_eq!(entity.get_float("wait", 0.0), 1.5);
        assert_eq!(entity.get_string("target", ""), "t1");
        assert_eq!(entity.get_string("missing", "none"), "none");
        assert_eq!(entity.origin(), [0.0, 0.0, 0.0]);
        assert_eq!(entity.get_vector3("origin", [9.0, 9.0, 9.0]), [9.0, 9.0, 9.0]);
    }

    #[test]
    fn find_entities_by_class_returns_all_in_order() {
        let text = r#"
{ "classname" "worldspawn" }
{
"classname" "light"
"light" "200"
}
{
"classname" "light"
"light" "300"
}
"#;
        let map = parse_map(text).map;
        let lights = map.find_entities_by_class("light");
        assert_eq!(lights.len(), 2);
        assert_eq!(lights[0].get_int("light", 0), 200);
        assert_eq!(lights[1].get_int("light", 0), 300);
        assert!(map.find_entity_by_class("monster_zombie").is_none());
    }

    #[test]
    fn unbalanced_entity_is_dropped() {
        let text = "{\n\"classname\" \"worldspawn\"\n{\n( 0 0 0 ) ( 0 1 0 ) ( 1 0 0 ) base 0 0 0 1 1\n}";
        let load = parse_map(text);
        assert!(load.map.is_empty());
    }

    #[test]
    fn plane_on_brush_open_line() {
        let text = "{\n\"classname\" \"worldspawn\"\n{ ( 0 0 0 ) ( 0 1 0 ) ( 1 0 0 ) base 0 0 0 1 1\n( 0 0 0 ) ( 1 0 0 ) ( 0 0 1 ) base 0 0 0 1 1\n}\n}";
        let load = parse_map(text);
        assert_eq!(load.map.entities.len(), 1);
        assert_eq!(load.map.entities[0].brushes.len(), 1);
        assert_eq!(load.map.entities[0].brushes[0].planes.len(), 2);
    }

    #[test]
    fn brace_inside_property_value_is_kept() {
        let text = "{\n\"classname\" \"worldspawn\"\n\"message\" \"a } b\"\n}\n{\n\"classname\" \"light\"\n}";
        let load = parse_map(text);
        assert!(load.warnings.is_empty());
        assert_eq!(load.map.entities.len(), 2);
        assert_eq!(load.map.entities[0].get("message"), Some("a } b"));
        assert_eq!(load.map.entities[1].classname, "light");
    }

    #[test]
    fn unterminated_property_quote_warns() {
        let text = "{\n\"classname\" \"worldspawn\"\n\"message\" \"hello there\n\"sounds\" \"1\"\n}";
        let load = parse_map(text);
        assert_eq!(load.warnings.len(), 1);
        assert!(load.warnings[0].contains("unterminated quote"));
        let world = &load.map.entities[0];
        assert_eq!(world.get("message"), Some("hello there"));
        assert_eq!(world.get_int("sounds", 0), 1);
    }

    #[test]
    fn first_entity_not_worldspawn_warns() {
        let load = parse_map("{\n\"classname\" \"light\"\n}");
        assert_eq!(load.map.entities.len(), 1);
        assert_eq!(load.warnings.len(), 1);
    }

    #[test]
    fn load_missing_file_is_error() {
        let mut path = std::env::temp_dir();
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        path.push(format!("compat_quake_missing_{}.map", stamp));
        let err = load_map_file(&path).expect_err("missing file");
        assert!(matches!(err, MapError::Io { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn load_map_file_from_disk() {
        let mut path: PathBuf = std::env::temp_dir();
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        path.push(format!("compat_quake_cube_{}.map", stamp));
        fs::write(&path, CUBE_MAP).expect("write map");
        let load = load_map_file(&path);
        let _ = fs::remove_file(&path);
        let load = load.expect("load map");
        assert_eq!(load.map.entities.len(), 2);
    }
}
