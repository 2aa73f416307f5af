//! # Tableau
//!
//! `tableau_core` is a retained-mode 3D scene graph for fixed-function GPU
//! bindings. Actors are composed at runtime from independent capability
//! objects, and each drawable actor picks one of four drawing techniques
//! (immediate calls, display lists, vertex arrays, vertex buffers) from the
//! scene's rendering hints and the shape it draws.
//!
//! ## Core Architecture
//! - **Lookup (`src/lookup.rs`)**: Exact-type capability registry carried by every actor.
//! - **Actor (`src/actor.rs`)**: Composition root, drawing state and disposal.
//! - **Supports (`src/supports/`)**: Transform, colour, culling, blending, shader, hierarchy
//!   and shape supports.
//! - **Drawable (`src/drawable/`)**: Strategies, the strategy selector and the shared painter.
//! - **Reinit (`src/reinit.rs`)**: Coalesced cache invalidation and deferred GPU releases.
//! - **Shapes (`src/shapes/`)**: Shape-renderer dispatch and built-in shapes.
//! - **Scene (`src/scene.rs`)**: Actor arena, load gate and the render loop.
//!
//! The GPU is reached only through [`gl::GraphicsContext`]; the
//! [`gl::RecordingContext`] backend makes the whole engine testable headless.

pub mod actor;
pub mod camera;
pub mod config;
pub mod drawable;
pub mod error;
pub mod events;
pub mod gl;
pub mod lookup;
pub mod picking;
pub mod reinit;
pub mod scene;
pub mod scene_loader;
pub mod shapes;
pub mod supports;
mod sync;

// Re-exports for convenience
pub use actor::{Actor, ActorBuilder, ActorKey};
pub use camera::{Camera, FrameStats};
pub use config::{DrawingPass, RenderModes, SceneConfig, Technique};
pub use drawable::{DrawableStrategy, Frame};
pub use error::{Error, Result};
pub use events::{Fields, PropertyEvent};
pub use lookup::{Capability, Lookup};
pub use picking::{PickTarget, PickingFrame, PickingMode};
pub use scene::Scene;
