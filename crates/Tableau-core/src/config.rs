//! # Configuration
//!
//! Scene-wide settings, most importantly the rendering-mode hints that drive
//! drawable strategy selection.

use std::path::Path;

use bitflags::bitflags;
use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

bitflags! {
    /// Rendering techniques the host allows.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RenderModes: u32 {
        const IMMEDIATE = 1 << 0;
        const DISPLAY_LISTS = 1 << 1;
        const VERTEX_ARRAY = 1 << 2;
        const VBO = 1 << 3;
    }
}

impl Default for RenderModes {
    fn default() -> Self {
        Self::all()
    }
}

/// A concrete drawing technique. Exactly one per dynamic actor is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Technique {
    Immediate,
    DisplayLists,
    VertexArray,
    Vbo,
}

impl Technique {
    pub fn mode(self) -> RenderModes {
        match self {
            Self::Immediate => RenderModes::IMMEDIATE,
            Self::DisplayLists => RenderModes::DISPLAY_LISTS,
            Self::VertexArray => RenderModes::VERTEX_ARRAY,
            Self::Vbo => RenderModes::VBO,
        }
    }

    /// Whether the technique replays pre-built vertex data.
    pub fn uses_arrays(self) -> bool {
        matches!(self, Self::VertexArray | Self::Vbo)
    }
}

impl TryFrom<RenderModes> for Technique {
    type Error = Error;

    /// Only single known flags map to a technique.
    fn try_from(mode: RenderModes) -> Result<Self> {
        if mode == RenderModes::IMMEDIATE {
            Ok(Self::Immediate)
        } else if mode == RenderModes::DISPLAY_LISTS {
            Ok(Self::DisplayLists)
        } else if mode == RenderModes::VERTEX_ARRAY {
            Ok(Self::VertexArray)
        } else if mode == RenderModes::VBO {
            Ok(Self::Vbo)
        } else {
            Err(Error::UnhandledRenderMode(mode.bits()))
        }
    }
}

/// Named phases of the render loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawingPass {
    Background,
    #[default]
    Main,
    Overlay,
    Interface,
}

fn default_preference() -> Vec<RenderModes> {
    vec![
        RenderModes::VBO,
        RenderModes::VERTEX_ARRAY,
        RenderModes::DISPLAY_LISTS,
        RenderModes::IMMEDIATE,
    ]
}

fn default_clear_color() -> Vec4 {
    Vec4::new(0.0, 0.0, 0.0, 1.0)
}

/// Environment variable overriding [`SceneConfig::render_modes`].
pub const RENDER_MODES_ENV: &str = "TABLEAU_RENDER_MODES";
/// Environment variable overriding [`SceneConfig::preference`]; entries are separated by `,`.
pub const RENDER_PREFERENCE_ENV: &str = "TABLEAU_RENDER_PREFERENCE";

/// Configuration parameters for a scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Techniques the host allows. Default: all.
    #[serde(default)]
    pub render_modes: RenderModes,
    /// Techniques in priority order. Default: VBO, vertex array, display lists, immediate.
    #[serde(default = "default_preference")]
    pub preference: Vec<RenderModes>,
    /// Pass new actors are assigned to.
    #[serde(default)]
    pub default_pass: DrawingPass,
    #[serde(default = "default_clear_color")]
    pub clear_color: Vec4,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            render_modes: RenderModes::default(),
            preference: default_preference(),
            default_pass: DrawingPass::default(),
            clear_color: default_clear_color(),
        }
    }
}

impl SceneConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Every preference entry must name exactly one technique.
    pub fn validate(&self) -> Result<()> {
        validate_preference(&self.preference)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Applies `TABLEAU_RENDER_MODES` and `TABLEAU_RENDER_PREFERENCE` when set.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(
            std::env::var(RENDER_MODES_ENV).ok().as_deref(),
            std::env::var(RENDER_PREFERENCE_ENV).ok().as_deref(),
        )
    }

    /// Applies override strings in bitflags text syntax, e.g. `"VBO | DISPLAY_LISTS"`.
    pub fn with_overrides(mut self, modes: Option<&str>, preference: Option<&str>) -> Result<Self> {
        if let Some(text) = modes {
            self.render_modes = parse_modes(text)?;
        }
        if let Some(text) = preference {
            self.preference = text
                .split(',')
                .map(parse_modes)
                .collect::<Result<Vec<_>>>()?;
        }
        self.validate()?;
        Ok(self)
    }
}

pub(crate) fn validate_preference(preference: &[RenderModes]) -> Result<()> {
    for entry in preference {
        Technique::try_from(*entry)?;
    }
    Ok(())
}

fn parse_modes(text: &str) -> Result<RenderModes> {
    bitflags::parser::from_str::<RenderModes>(text.trim())
        .map_err(|e| Error::invalid(format!("render modes `{text}`: {e}")))
}
