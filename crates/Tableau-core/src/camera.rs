//! # Camera
//!
//! The engine only reads the camera: transform supports query its
//! orientation for billboarding, and frame statistics are accumulated per
//! frame for the host's performance counters.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A look-at camera.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 10.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3, up: Vec3) -> Self {
        Self {
            position,
            target,
            up,
        }
    }

    /// World-to-view transform.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Rotation that turns an object's +Z axis towards the camera.
    pub fn orientation(&self) -> Quat {
        let (_, rotation, _) = self.view_matrix().inverse().to_scale_rotation_translation();
        rotation
    }

    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }
}

/// Counters gathered while rendering one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStats {
    pub actors_drawn: usize,
    pub vertices: usize,
    /// Coalesced reinitialize tasks that ran at the start of the frame.
    pub reinitialized: usize,
    /// GPU handles released at the start of the frame.
    pub released: usize,
    /// Draw failures that were logged and skipped.
    pub failures: usize,
}

impl FrameStats {
    pub fn merge(&mut self, other: FrameStats) {
        self.actors_drawn += other.actors_drawn;
        self.vertices += other.vertices;
        self.reinitialized += other.reinitialized;
        self.released += other.released;
        self.failures += other.failures;
    }
}
