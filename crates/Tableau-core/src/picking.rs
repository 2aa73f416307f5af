//! # Picking
//!
//! Three picking draws are supported:
//! - `Select`: each actor is drawn with simplified geometry under its own
//!   name on the name stack;
//! - `Items`: like `Select`, with a second name per sub-item;
//! - `Color`: each actor (or item) is drawn in a unique solid colour that is
//!   registered in a [`ColorPickingMap`] and resolved from the pixel under
//!   the cursor.

use std::collections::HashMap;

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::actor::ActorKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickingMode {
    Select,
    Items,
    Color,
}

/// What a picking hit refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PickTarget {
    pub actor: ActorKey,
    pub item: Option<usize>,
}

/// Largest id that fits in 24 bits of RGB.
const MAX_PICK_ID: u32 = 0x00FF_FFFF;

/// Colour to target map for one picking frame. Id 0 (black) is the background.
#[derive(Clone, Debug, Default)]
pub struct ColorPickingMap {
    next: u32,
    targets: HashMap<u32, PickTarget>,
}

impl ColorPickingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a unique colour for `target`.
    ///
    /// Ids wrap after 2^24 - 1 registrations, which is far beyond a single frame.
    pub fn register(&mut self, target: PickTarget) -> Vec4 {
        self.next = if self.next >= MAX_PICK_ID { 1 } else { self.next + 1 };
        self.targets.insert(self.next, target);
        Self::encode(self.next)
    }

    pub fn resolve(&self, rgba: [u8; 4]) -> Option<PickTarget> {
        let id = (u32::from(rgba[0]) << 16) | (u32::from(rgba[1]) << 8) | u32::from(rgba[2]);
        self.targets.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn clear(&mut self) {
        self.next = 0;
        self.targets.clear();
    }

    fn encode(id: u32) -> Vec4 {
        let channel = |shift: u32| ((id >> shift) & 0xFF) as f32 / 255.0;
        Vec4::new(channel(16), channel(8), channel(0), 1.0)
    }

    /// Turns a picking colour back into the bytes a framebuffer read returns.
    pub fn to_rgba(color: Vec4) -> [u8; 4] {
        let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [byte(color.x), byte(color.y), byte(color.z), byte(color.w)]
    }
}

/// Result of a picking draw.
#[derive(Clone, Debug, Default)]
pub struct PickingFrame {
    /// Actor for each top-level name pushed during the draw (name = index).
    pub names: Vec<ActorKey>,
    pub colors: ColorPickingMap,
    pub vertices: usize,
}

impl PickingFrame {
    /// Resolves a selection hit record (`[actor name]` or `[actor name, item]`).
    pub fn resolve_names(&self, hit: &[u32]) -> Option<PickTarget> {
        let actor = *self.names.get(*hit.first()? as usize)?;
        Some(PickTarget {
            actor,
            item: hit.get(1).map(|item| *item as usize),
        })
    }

    pub fn resolve_color(&self, rgba: [u8; 4]) -> Option<PickTarget> {
        self.colors.resolve(rgba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colours_round_trip_through_bytes() {
        let mut map = ColorPickingMap::new();
        let target = PickTarget {
            actor: ActorKey::default(),
            item: Some(3),
        };
        let mut last = Vec4::ZERO;
        for _ in 0..300 {
            last = map.register(target);
        }
        assert_eq!(map.resolve(ColorPickingMap::to_rgba(last)), Some(target));
        assert_eq!(map.resolve([0, 0, 0, 255]), None);
    }
}
