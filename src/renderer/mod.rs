//! WebGPU rendering module
//!
//! Two passes share one render pass per frame: the tile world (one
//! full-viewport quad) and the sprite batch on top of it. All GPU handles
//! live in a [`GpuCache`] so a lost context can be dropped wholesale and
//! rebuilt lazily on the next frame.

pub mod cache;
pub mod gpu;
pub mod program;
pub mod sprite_pipeline;
pub mod texture;
pub mod tile_pipeline;
pub mod vertex;

pub use cache::{Fetched, GpuCache, OwnerKey};
pub use gpu::{GpuContext, request_device};
pub use program::{Program, ProgramInfo, compile};
pub use sprite_pipeline::{SpriteInstruction, SpriteRenderer, build_vertices, instructions_for};
pub use texture::GpuTexture;
pub use tile_pipeline::TileRenderer;

use crate::atlas::{TexturePack, Tileset};
use crate::error::GpuError;
use crate::geom::Viewport;
use crate::sim::WorldState;

pub type WgpuCache = GpuCache<Program, wgpu::Buffer, GpuTexture>;

/// Color of the letterbox bars
const LETTERBOX: wgpu::Color = wgpu::Color::BLACK;

/// What one frame draws
pub struct Scene<'a> {
    pub world: &'a mut WorldState,
    pub viewport: &'a Viewport,
    pub tileset: &'a Tileset,
    /// Sprites are skipped until the pack has finished building
    pub sprites: Option<&'a TexturePack>,
}

pub struct Renderer {
    pub gpu: GpuContext,
    cache: WgpuCache,
    tiles: TileRenderer,
    sprites: SpriteRenderer,
}

impl Renderer {
    pub fn new(gpu: GpuContext) -> Self {
        Self {
            gpu,
            cache: WgpuCache::new(),
            tiles: TileRenderer::new(),
            sprites: SpriteRenderer::new(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
    }

    pub fn is_lost(&self) -> bool {
        self.gpu.is_lost()
    }

    /// Forget every GPU handle; the next frame rebuilds them
    pub fn on_context_lost(&mut self) {
        self.cache.on_context_lost();
        self.sprites.on_context_lost();
    }

    /// Resume on a freshly requested device. The world-state texture is
    /// recreated, and so re-encoded, on the next frame.
    pub fn install_device(&mut self, device: wgpu::Device, queue: wgpu::Queue) {
        self.on_context_lost();
        self.gpu.install_device(device, queue);
    }

    pub fn cache(&self) -> &WgpuCache {
        &self.cache
    }

    pub fn render(&mut self, scene: Scene<'_>) -> Result<(), GpuError> {
        if self.gpu.is_lost() {
            return Err(GpuError::ContextLost);
        }

        let tile_bind = self.tiles.prepare(
            &self.gpu,
            &mut self.cache,
            &mut scene.world.grid,
            scene.tileset,
            scene.viewport,
        )?;
        let sprite_bind = match scene.sprites {
            Some(pack) => {
                let instructions = self.sprites.instructions(&scene.world.entities, pack);
                self.sprites
                    .prepare(&self.gpu, &mut self.cache, &instructions, pack, scene.viewport)?
            }
            None => None,
        };

        let output = self.gpu.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(LETTERBOX),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let (x, y, w, h) = clamp_rect(scene.viewport.drawable_pixels(), self.gpu.size);
            pass.set_viewport(x as f32, y as f32, w as f32, h as f32, 0.0, 1.0);
            pass.set_scissor_rect(x, y, w, h);

            if let Some(bind_group) = &tile_bind {
                self.tiles.draw(&mut pass, &self.cache, bind_group);
            }
            if let Some(bind_group) = &sprite_bind {
                self.sprites.draw(&mut pass, &self.cache, bind_group);
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

/// Keep a pixel rect inside the surface; viewport and scissor rects past
/// the attachment edge are validation errors
fn clamp_rect((x, y, w, h): (u32, u32, u32, u32), (sw, sh): (u32, u32)) -> (u32, u32, u32, u32) {
    let x = x.min(sw.saturating_sub(1));
    let y = y.min(sh.saturating_sub(1));
    let w = w.min(sw - x).max(1);
    let h = h.min(sh - y).max(1);
    (x, y, w, h)
}
