use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use compat_quake::{load_map_file, Map};
use engine_core::logging::{self, LogLevel};
use engine_core::observability;
use map_cook::{build_brush_colliders, cook_level, player_spawn, BrushCookConfig, TextureKeyCache};

const EXIT_SUCCESS: i32 = 0;
const EXIT_USAGE: i32 = 2;
const EXIT_MAP: i32 = 10;
const EXIT_CONFIG: i32 = 11;

#[derive(Parser)]
#[command(name = "tools", version, about = "Map tools CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Map(MapArgs),
}

#[derive(Parser)]
struct MapArgs {
    #[command(subcommand)]
    command: MapCommand,
}

#[derive(Subcommand)]
enum MapCommand {
    /// Print entity and brush counts, the spawn point and classnames.
    Info {
        #[arg(long, value_name = "PATH")]
        map: PathBuf,
    },
    /// Convert the level's brushes and print per-batch statistics.
    Cook {
        #[arg(long, value_name = "PATH")]
        map: PathBuf,
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
        #[arg(long, value_name = "LEVEL")]
        log_level: Option<String>,
    },
}

fn main() {
    observability::install_panic_hook();
    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Map(args) => run_map(args),
    };
    std::process::exit(exit_code);
}

fn run_map(args: MapArgs) -> i32 {
    match args.command {
        MapCommand::Info { map } => map_info(&map),
        MapCommand::Cook {
            map,
            config,
            log_level,
        } => map_cook(&map, config.as_deref(), log_level.as_deref()),
    }
}

fn map_info(map_path: &Path) -> i32 {
    let map = match load_map(map_path) {
        Ok(map) => map,
        Err(code) => return code,
    };

    println!("map: {}", map_path.display());
    println!("entities: {}", map.entities.len());
    println!("brushes: {}", map.brush_count());
    let spawn = player_spawn(&map);
    println!(
        "spawn: {} {} {} (angle {})",
        spawn.origin[0], spawn.origin[1], spawn.origin[2], spawn.angle_deg
    );
    for (index, entity) in map.entities.iter().enumerate() {
        println!(
            "{:>4} {:<24} {:>4} brushes",
            index,
            entity.classname,
            entity.brushes.len()
        );
    }
    EXIT_SUCCESS
}

fn map_cook(map_path: &Path, config_path: Option<&Path>, log_level: Option<&str>) -> i32 {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let level = match log_level {
        Some(text) => match text.parse::<LogLevel>() {
            Ok(level) => Some(level),
            Err(err) => {
                eprintln!("{}", err);
                return EXIT_USAGE;
            }
        },
        None => config.log_level(),
    };
    if let Some(level) = level {
        logging::set_max_level(level);
    }

    let map = match load_map(map_path) {
        Ok(map) => map,
        Err(code) => return code,
    };

    let mut textures = TextureKeyCache::new();
    let geometry = cook_level(&map, &config, &mut textures);
    for batch in &geometry.batches {
        println!(
            "entity {:>3} brush {:>4} {:<24} {:>4} verts {:>4} tris",
            batch.entity_index,
            batch.brush_index,
            textures.name(batch.texture).unwrap_or("?"),
            batch.brush.mesh.vertices.len(),
            batch.brush.mesh.triangle_count()
        );
    }

    let meshes: Vec<_> = geometry
        .batches
        .iter()
        .map(|batch| batch.brush.clone())
        .collect();
    let colliders = match build_brush_colliders(&meshes) {
        Ok(colliders) => colliders,
        Err(err) => {
            observability::set_sticky_error("collider build", err.clone());
            eprintln!("collider build failed: {}", err);
            return EXIT_MAP;
        }
    };

    println!(
        "cooked {}: {} batches, {} triangles, {} colliders, {} textures, {} skipped",
        map_path.display(),
        geometry.batches.len(),
        geometry.triangle_count(),
        colliders.len(),
        textures.len(),
        geometry.skipped_brushes
    );
    EXIT_SUCCESS
}

fn load_map(map_path: &Path) -> Result<Map, i32> {
    match load_map_file(map_path) {
        Ok(load) => {
            if !load.warnings.is_empty() {
                eprintln!("{} warnings while parsing", load.warnings.len());
            }
            Ok(load.map)
        }
        Err(err) => {
            observability::set_sticky_error("map load", err.to_string());
            eprintln!("map load failed: {}", err);
            Err(EXIT_MAP)
        }
    }
}

fn load_config(config_path: Option<&Path>) -> Result<BrushCookConfig, i32> {
    let config_path = match config_path {
        Some(path) => path,
        None => return Ok(BrushCookConfig::default()),
    };
    let text = match std::fs::read_to_string(config_path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("config read failed: {}: {}", config_path.display(), err);
            return Err(EXIT_CONFIG);
        }
    };
    let config = match BrushCookConfig::parse_toml(&text) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config parse failed: {}", err);
            return Err(EXIT_CONFIG);
        }
    };
    let validation = config.validate();
    for warning in &validation.warnings {
        logging::warn(format!("config: {}", warning));
    }
    if !validation.is_ok() {
        for error in &validation.errors {
            eprintln!("config error: {}", error);
        }
        return Err(EXIT_CONFIG);
    }
    Ok(config)
}
