use engine_core::logging::LogLevel;
use serde::Deserialize;

pub const DEFAULT_EPSILON: f32 = 0.01;
pub const DEFAULT_DETERMINANT_EPSILON: f32 = 1.0e-4;
pub const DEFAULT_TEXEL_GRID: f32 = 64.0;
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

/// Tunables for turning brushes into meshes, usually read from a `cook.toml`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrushCookConfig {
    pub version: u32,
    /// Half-space and vertex-merge tolerance in map units.
    pub epsilon: f32,
    /// Plane triples whose normal matrix determinant is below this are skipped.
    pub determinant_epsilon: f32,
    /// Reference texture size that texture scale and offset are divided by.
    pub texel_grid: f32,
    pub parallel_threshold: usize,
    pub include_brush_entities: bool,
    pub log_level: Option<String>,
}

impl Default for BrushCookConfig {
    fn default() -> Self {
        Self {
            version: 1,
            epsilon: DEFAULT_EPSILON,
            determinant_epsilon: DEFAULT_DETERMINANT_EPSILON,
            texel_grid: DEFAULT_TEXEL_GRID,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            include_brush_entities: false,
            log_level: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BrushCookConfigValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl BrushCookConfigValidation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl BrushCookConfig {
    pub fn parse_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|err| err.to_string())
    }

    /// Parses and validates in one step; validation warnings are dropped.
    pub fn load_toml(text: &str) -> Result<Self, String> {
        let config = Self::parse_toml(text)?;
        let validation = config.validate();
        if !validation.is_ok() {
            return Err(validation.errors.join("; "));
        }
        Ok(config)
    }

    pub fn validate(&self) -> BrushCookConfigValidation {
        let mut validation = BrushCookConfigValidation::default();
        if self.version != 1 {
            validation
                .errors
                .push(format!("unsupported cook config version {}", self.version));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            validation
                .errors
                .push("epsilon must be finite and > 0".to_string());
        } else if self.epsilon > 1.0 {
            validation
                .warnings
                .push(format!("epsilon {} will merge nearby vertices", self.epsilon));
        }
        if !self.determinant_epsilon.is_finite() || self.determinant_epsilon <= 0.0 {
            validation
                .errors
                .push("determinant_epsilon must be finite and > 0".to_string());
        }
        if !self.texel_grid.is_finite() || self.texel_grid <= 0.0 {
            validation
                .errors
                .push("texel_grid must be finite and > 0".to_string());
        }
        if self.parallel_threshold == 0 {
            validation
                .warnings
                .push("parallel_threshold 0 converts every level in parallel".to_string());
        }
        if let Some(level) = &self.log_level {
            if let Err(err) = level.parse::<LogLevel>() {
                validation.errors.push(err);
            }
        }
        validation
    }

    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
            .as_deref()
            .and_then(|level| level.parse::<LogLevel>().ok())
    }
}
