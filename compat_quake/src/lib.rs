//! Quake-family source formats: `.map` text scenes.
#![forbid(unsafe_code)]

pub mod map;
pub mod map_text;

pub use map::{
    load_map_file, parse_map, parse_plane, Brush, Entity, Map, MapError, MapLoad, Plane,
    PlaneParseError, WORLDSPAWN,
};
