use std::sync::Mutex;

use crate::actor::Actor;
use crate::drawable::Frame;
use crate::error::Result;
use crate::events::Fields;
use crate::gl::GraphicsContext;
use crate::lookup::Capability;
use crate::reinit::GpuRelease;
use crate::supports::SupportCore;
use crate::sync::lock;

#[derive(Clone, Debug, PartialEq)]
struct ShaderSources {
    vertex: String,
    fragment: String,
}

/// A GPU program bound around the actor's draw.
///
/// The program is compiled lazily on the render thread the first time the
/// actor is drawn. Changing the sources or disposing the support hands the
/// old program to the scene's release queue.
#[derive(Debug)]
pub struct ShaderSupport {
    core: SupportCore,
    sources: Mutex<ShaderSources>,
    program: Mutex<Option<u32>>,
}

impl ShaderSupport {
    pub fn new(actor: &Actor, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            core: SupportCore::new("shader", actor),
            sources: Mutex::new(ShaderSources {
                vertex: vertex.into(),
                fragment: fragment.into(),
            }),
            program: Mutex::new(None),
        }
    }

    /// The compiled program, if the support has been drawn since the last
    /// source change.
    pub fn program(&self) -> Option<u32> {
        *lock(&self.program)
    }

    pub fn set_sources(&self, vertex: impl Into<String>, fragment: impl Into<String>) {
        let sources = ShaderSources {
            vertex: vertex.into(),
            fragment: fragment.into(),
        };
        {
            let mut current = lock(&self.sources);
            if *current == sources {
                return;
            }
            *current = sources;
        }
        self.release_program();
        self.core.changed(Fields::SHADER);
    }

    fn release_program(&self) {
        let Some(program) = lock(&self.program).take() else {
            return;
        };
        match self.core.scene() {
            Some(scene) => scene.releases().push(GpuRelease::Program(program)),
            None => tracing::debug!(program, "Scene gone, dropping shader program handle"),
        }
    }

    fn ensure_program(&self, ctx: &mut dyn GraphicsContext) -> Result<u32> {
        let mut program = lock(&self.program);
        if let Some(existing) = *program {
            return Ok(existing);
        }
        let sources = lock(&self.sources).clone();
        let compiled = ctx.create_program(&sources.vertex, &sources.fragment)?;
        tracing::debug!(program = compiled, "Compiled shader program");
        *program = Some(compiled);
        Ok(compiled)
    }
}

impl Capability for ShaderSupport {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn support(&self) -> Option<&SupportCore> {
        Some(&self.core)
    }

    fn draw_order(&self) -> i32 {
        20
    }

    fn pre_draw(&self, ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<()> {
        if frame.picking.is_some() {
            return Ok(());
        }
        let program = self.ensure_program(ctx)?;
        ctx.use_program(Some(program));
        Ok(())
    }

    fn post_draw(&self, ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<()> {
        if frame.picking.is_none() && self.program().is_some() {
            ctx.use_program(None);
        }
        Ok(())
    }

    fn is_disposable(&self) -> bool {
        true
    }

    fn dispose(&self) {
        if self.core.begin_dispose() {
            self.release_program();
        }
    }
}
