use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to read configuration at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Straight RGBA colour parsed from `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const CYAN: Color = Color([0, 255, 255, 255]);

    pub fn rgba(self) -> [u8; 4] {
        self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        if a == 255 {
            write!(f, "#{r:02x}{g:02x}{b:02x}")
        } else {
            write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_color(&raw).map_err(de::Error::custom)
    }
}

pub fn parse_color(raw: &str) -> Result<Color, String> {
    let trimmed = raw.trim();
    let hex = trimmed
        .strip_prefix('#')
        .ok_or_else(|| format!("colour '{trimmed}' must start with '#'"))?;
    if !matches!(hex.len(), 6 | 8) || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(format!(
            "colour '{trimmed}' must be #rrggbb or #rrggbbaa hexadecimal"
        ));
    }
    let channel = |index: usize| u8::from_str_radix(&hex[index * 2..index * 2 + 2], 16);
    let parse = |index: usize| channel(index).map_err(|err| format!("colour '{trimmed}': {err}"));
    let alpha = if hex.len() == 8 { parse(3)? } else { 255 };
    Ok(Color([parse(0)?, parse(1)?, parse(2)?, alpha]))
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FlipConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub document: DocumentSection,
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub loader: LoaderSection,
    #[serde(default)]
    pub animation: AnimationSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DocumentSection {
    pub max_pages: usize,
    /// Directory holding a page pack; `None` falls back to generated pages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<PathBuf>,
}

impl Default for DocumentSection {
    fn default() -> Self {
        Self {
            max_pages: 20,
            pages: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderSection {
    pub background: Color,
    pub text_color: Color,
    pub raster_scale: f32,
    /// Canvas width at which the label sizes apply unscaled.
    pub reference_width: u32,
    pub page_number_size: f32,
    pub caption_size: f32,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            background: Color::CYAN,
            text_color: Color([255, 255, 255, 255]),
            raster_scale: 1.0,
            reference_width: 720,
            page_number_size: 80.0,
            caption_size: 16.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoaderSection {
    pub workers: usize,
    /// Pages on each side of the focus page decoded ahead of time.
    pub prefetch_radius: usize,
    pub cache_capacity: usize,
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            workers: 2,
            prefetch_radius: 1,
            cache_capacity: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnimationSection {
    #[serde(
        default = "default_flip_duration",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub duration: Duration,
    #[serde(
        default = "default_frame_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub frame_interval: Duration,
}

impl Default for AnimationSection {
    fn default() -> Self {
        Self {
            duration: default_flip_duration(),
            frame_interval: default_frame_interval(),
        }
    }
}

impl AnimationSection {
    /// Fraction of a flip covered by one rendered frame.
    pub fn progress_step(&self) -> f32 {
        let total = self.duration.as_secs_f32().max(f32::EPSILON);
        (self.frame_interval.as_secs_f32() / total).clamp(f32::EPSILON, 1.0)
    }
}

impl Default for FlipConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            document: DocumentSection::default(),
            render: RenderSection::default(),
            loader: LoaderSection::default(),
            animation: AnimationSection::default(),
        }
    }
}

fn default_version() -> u32 {
    1
}

fn default_flip_duration() -> Duration {
    Duration::from_millis(400)
}

fn default_frame_interval() -> Duration {
    Duration::from_millis(16)
}

fn serialize_duration<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&humantime::format_duration(*value))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl FlipConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: FlipConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reads `path` when it exists, otherwise returns the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.document.max_pages == 0 {
            return Err(ConfigError::Invalid(
                "document.max_pages must be greater than zero".into(),
            ));
        }

        let render = &self.render;
        if !(render.raster_scale.is_finite() && render.raster_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "render.raster_scale must be positive, got {}",
                render.raster_scale
            )));
        }
        if render.reference_width == 0 {
            return Err(ConfigError::Invalid(
                "render.reference_width must be greater than zero".into(),
            ));
        }
        for (name, size) in [
            ("page_number_size", render.page_number_size),
            ("caption_size", render.caption_size),
        ] {
            if !(size.is_finite() && size > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "render.{name} must be positive, got {size}"
                )));
            }
        }

        if self.loader.workers == 0 {
            return Err(ConfigError::Invalid(
                "loader.workers must be at least 1".into(),
            ));
        }
        if self.loader.cache_capacity < 2 * self.loader.prefetch_radius + 1 {
            return Err(ConfigError::Invalid(format!(
                "loader.cache_capacity ({}) cannot hold the prefetch window of {} pages",
                self.loader.cache_capacity,
                2 * self.loader.prefetch_radius + 1
            )));
        }

        if self.animation.duration.is_zero() {
            return Err(ConfigError::Invalid(
                "animation.duration must be greater than zero".into(),
            ));
        }
        if self.animation.frame_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "animation.frame_interval must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
