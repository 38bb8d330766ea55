//! Tile world pass
//!
//! The whole grid is drawn with one full-viewport quad. The fragment shader
//! maps each pixel to a grid cell, looks the cell up in the world-state
//! texture and samples the tileset atlas at the matching tile.

use wgpu::util::DeviceExt;

use super::cache::OwnerKey;
use super::gpu::GpuContext;
use super::program::{PipelineSpec, Program};
use super::texture::{GpuTexture, WORLD_STATE_FORMAT};
use super::vertex::{FULL_VIEWPORT_QUAD, QuadVertex, TileUniforms};
use super::WgpuCache;
use crate::atlas::Tileset;
use crate::error::GpuError;
use crate::geom::Viewport;
use crate::sim::TileGrid;

pub const TILE_PROGRAM: &str = "tile";
const ATTRIBUTES: &[&str] = &["position"];
const UNIFORMS: &[&str] = &["uniforms", "atlas", "world_state"];

fn layout_entries() -> [wgpu::BindGroupLayoutEntry; 3] {
    [
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Uint,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        },
    ]
}

pub fn build_program(device: &wgpu::Device, format: wgpu::TextureFormat) -> Result<Program, GpuError> {
    let entries = layout_entries();
    Program::new(
        device,
        &PipelineSpec {
            label: TILE_PROGRAM,
            source: include_str!("tile.wgsl"),
            attribute_names: ATTRIBUTES,
            uniform_names: UNIFORMS,
            layout_entries: &entries,
            vertex_buffers: &[QuadVertex::desc()],
            format,
            blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        },
    )
}

/// Cache slots owned by the tile pass
#[derive(Debug, Clone, Copy)]
struct TileKeys {
    quad: OwnerKey,
    uniforms: OwnerKey,
    atlas: OwnerKey,
    world_state: OwnerKey,
}

pub struct TileRenderer {
    keys: TileKeys,
}

impl Default for TileRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TileRenderer {
    pub fn new() -> Self {
        Self {
            keys: TileKeys {
                quad: OwnerKey::next(),
                uniforms: OwnerKey::next(),
                atlas: OwnerKey::next(),
                world_state: OwnerKey::next(),
            },
        }
    }

    /// Make every resource the pass needs current and return its bind
    /// group. `None` when there is nothing to draw.
    ///
    /// The world state is re-encoded only when the grid is dirty or the
    /// texture had to be (re)created.
    pub fn prepare(
        &self,
        gpu: &GpuContext,
        cache: &mut WgpuCache,
        grid: &mut TileGrid,
        tileset: &Tileset,
        viewport: &Viewport,
    ) -> Result<Option<wgpu::BindGroup>, GpuError> {
        if grid.width() == 0 || grid.height() == 0 || tileset.tile_count() == 0 {
            return Ok(None);
        }
        let device = &gpu.device;
        let keys = self.keys;

        cache.program_or_create(TILE_PROGRAM, || build_program(device, gpu.format()))?;

        cache.buffer(keys.quad, || {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("tile_quad"),
                contents: bytemuck::cast_slice(&FULL_VIEWPORT_QUAD),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });

        let uniforms = TileUniforms::new(&viewport.clip_to_world(), tileset.tile_size());
        let uniform_buffer = cache.buffer(keys.uniforms, || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("tile_uniforms"),
                size: std::mem::size_of::<TileUniforms>() as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        gpu.queue
            .write_buffer(uniform_buffer.resource, 0, bytemuck::bytes_of(&uniforms));

        let atlas = cache.texture(keys.atlas, || {
            GpuTexture::from_image(device, &gpu.queue, "tile_atlas", tileset.image())
        });
        if atlas.created {
            log::debug!("uploaded tile atlas {:?}", atlas.resource.size);
        }

        let grid_size = (grid.width(), grid.height());
        if cache
            .cached_texture(keys.world_state)
            .is_some_and(|t| t.size != grid_size)
        {
            cache.remove_texture(keys.world_state);
        }
        let world_state = cache.texture(keys.world_state, || {
            GpuTexture::new(device, "world_state", grid_size, WORLD_STATE_FORMAT)
        });
        // always consume the flag so a fresh texture doesn't leave it raised
        let dirty = grid.take_dirty();
        if dirty || world_state.created {
            world_state
                .resource
                .upload(&gpu.queue, &grid.encode_world_state(tileset));
        }

        let (Some(program), Some(uniform_buffer), Some(atlas), Some(world_state)) = (
            cache.program(TILE_PROGRAM),
            cache.cached_buffer(keys.uniforms),
            cache.cached_texture(keys.atlas),
            cache.cached_texture(keys.world_state),
        ) else {
            return Ok(None);
        };

        let binding = |name: &str| program.info.uniform(name).map_or(0, |(_, b)| b);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tile_bind_group"),
            layout: &program.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: binding("uniforms"),
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: binding("atlas"),
                    resource: wgpu::BindingResource::TextureView(&atlas.view),
                },
                wgpu::BindGroupEntry {
                    binding: binding("world_state"),
                    resource: wgpu::BindingResource::TextureView(&world_state.view),
                },
            ],
        });
        Ok(Some(bind_group))
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, cache: &WgpuCache, bind_group: &wgpu::BindGroup) {
        let (Some(program), Some(quad)) = (cache.program(TILE_PROGRAM), cache.cached_buffer(self.keys.quad)) else {
            return;
        };
        pass.set_pipeline(&program.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.set_vertex_buffer(0, quad.slice(..));
        pass.draw(0..FULL_VIEWPORT_QUAD.len() as u32, 0..1);
    }
}
