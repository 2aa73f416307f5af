use std::sync::Mutex;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::drawable::Frame;
use crate::error::Result;
use crate::events::Fields;
use crate::gl::GraphicsContext;
use crate::lookup::Capability;
use crate::supports::{SupportCore, replace};
use crate::sync::lock;

/// Local transform of an actor, applied around its draw and inherited by its
/// children.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub translation: Vec3,
    #[serde(default = "Transform::identity_rotation")]
    pub rotation: Quat,
    #[serde(default = "Transform::unit_scale")]
    pub scale: Vec3,
    /// Replace `rotation` with the camera's orientation so the actor always
    /// faces the viewer.
    #[serde(default)]
    pub billboard: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            billboard: false,
        }
    }
}

impl Transform {
    fn identity_rotation() -> Quat {
        Quat::IDENTITY
    }

    fn unit_scale() -> Vec3 {
        Vec3::ONE
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    /// Model matrix, using `facing` as the rotation for billboards.
    pub fn matrix(&self, facing: Quat) -> Mat4 {
        let rotation = if self.billboard { facing } else { self.rotation };
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.translation)
    }
}

#[derive(Debug)]
pub struct TransformSupport {
    core: SupportCore,
    transform: Mutex<Transform>,
}

impl TransformSupport {
    pub fn new(actor: &Actor, transform: Transform) -> Self {
        Self {
            core: SupportCore::new("transform", actor),
            transform: Mutex::new(transform),
        }
    }

    pub fn transform(&self) -> Transform {
        *lock(&self.transform)
    }

    pub fn set_transform(&self, transform: Transform) {
        if replace(&self.transform, transform) {
            self.core.changed(Fields::TRANSFORM);
        }
    }

    pub fn set_translation(&self, translation: Vec3) {
        self.update(|transform| transform.translation = translation);
    }

    pub fn set_rotation(&self, rotation: Quat) {
        self.update(|transform| transform.rotation = rotation);
    }

    pub fn set_scale(&self, scale: Vec3) {
        self.update(|transform| transform.scale = scale);
    }

    pub fn set_billboard(&self, billboard: bool) {
        self.update(|transform| transform.billboard = billboard);
    }

    /// Edits the transform in place under its lock.
    fn update(&self, apply: impl FnOnce(&mut Transform)) {
        let changed = {
            let mut transform = lock(&self.transform);
            let before = *transform;
            apply(&mut *transform);
            before != *transform
        };
        if changed {
            self.core.changed(Fields::TRANSFORM);
        }
    }
}

impl Capability for TransformSupport {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn support(&self) -> Option<&SupportCore> {
        Some(&self.core)
    }

    fn is_disposable(&self) -> bool {
        true
    }

    fn dispose(&self) {
        self.core.begin_dispose();
    }

    fn draw_order(&self) -> i32 {
        -100
    }

    fn pre_draw(&self, ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<()> {
        let transform = self.transform();
        let facing = if transform.billboard {
            frame.scene.camera().orientation()
        } else {
            Quat::IDENTITY
        };
        ctx.push_matrix();
        ctx.mult_matrix(transform.matrix(facing));
        Ok(())
    }

    fn post_draw(&self, ctx: &mut dyn GraphicsContext, _frame: &Frame<'_>) -> Result<()> {
        ctx.pop_matrix();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_setters_keep_each_other() {
        let scene = crate::Scene::new(crate::SceneConfig::default());
        let actor = scene
            .spawn(crate::ActorBuilder::new("shape", "moving"))
            .unwrap();
        let support = std::sync::Arc::new(TransformSupport::new(&actor, Transform::default()));
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let support = std::sync::Arc::clone(&support);
                std::thread::spawn(move || {
                    for step in 0..200 {
                        if i % 2 == 0 {
                            support.set_translation(Vec3::splat((step + 1) as f32));
                        } else {
                            support.set_billboard(true);
                            support.set_scale(Vec3::splat(2.0));
                        }
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        let transform = support.transform();
        assert!(transform.billboard);
        assert_eq!(transform.scale, Vec3::splat(2.0));
        assert_eq!(transform.translation, Vec3::splat(200.0));
    }

    #[test]
    fn test_billboard_ignores_own_rotation() {
        let transform = Transform {
            rotation: Quat::from_rotation_z(1.0),
            billboard: true,
            ..Transform::default()
        };
        assert_eq!(transform.matrix(Quat::IDENTITY), Mat4::IDENTITY);
    }
}
