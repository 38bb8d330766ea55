//! Sprite batch pass
//!
//! Each instruction is one textured rectangle: a box in tile space and a
//! pixel rect in the texture pack. All instructions are flattened into two
//! parallel vertex streams and drawn with a single call.

use std::collections::HashSet;

use super::cache::OwnerKey;
use super::gpu::GpuContext;
use super::program::{PipelineSpec, Program};
use super::texture::GpuTexture;
use super::vertex::{SpriteUniforms, position_stream, tex_coord_stream};
use super::WgpuCache;
use crate::atlas::{AtlasRect, TexturePack};
use crate::error::GpuError;
use crate::geom::{BoundingBox, Viewport};
use crate::next_pow2;
use crate::sim::Entity;

pub const SPRITE_PROGRAM: &str = "sprite";
const ATTRIBUTES: &[&str] = &["position", "tex_coord"];
const UNIFORMS: &[&str] = &["uniforms", "atlas", "atlas_sampler"];

/// Smallest vertex buffer allocation, in bytes
const MIN_STREAM_BYTES: u64 = 1024;

/// One rectangle to draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteInstruction {
    /// Destination in tile space
    pub tile: BoundingBox,
    /// Source in texture-pack pixels
    pub source: AtlasRect,
}

/// Instructions for every entity whose sprite is in the pack.
/// Sprites the pack does not know are skipped, with one warning per name;
/// `missing` remembers the names already reported.
pub fn instructions_for(
    entities: &[Entity],
    pack: &TexturePack,
    missing: &mut HashSet<String>,
) -> Vec<SpriteInstruction> {
    entities
        .iter()
        .filter_map(|entity| {
            let Some(source) = pack.location(&entity.sprite) else {
                if missing.insert(entity.sprite.clone()) {
                    log::warn!("sprite '{}' is not in the texture pack, not drawing it", entity.sprite);
                }
                return None;
            };
            Some(SpriteInstruction {
                tile: entity.hitbox(),
                source,
            })
        })
        .collect()
}

/// Flatten instructions into position and texture-coordinate streams,
/// six vertices per rectangle. Atlas rows run top-down, so the top of the
/// destination box takes the top row of the source rect.
pub fn build_vertices(instructions: &[SpriteInstruction]) -> (Vec<[f32; 2]>, Vec<[f32; 2]>) {
    let mut positions = Vec::with_capacity(instructions.len() * 6);
    let mut tex_coords = Vec::with_capacity(instructions.len() * 6);
    for inst in instructions {
        let (x1, y1, x2, y2) = (inst.tile.x1, inst.tile.y1, inst.tile.x2(), inst.tile.y2());
        let r = inst.source;
        let (u1, v1) = (r.x as f32, r.y as f32);
        let (u2, v2) = ((r.x + r.w) as f32, (r.y + r.h) as f32);

        positions.extend_from_slice(&[[x1, y1], [x2, y1], [x1, y2], [x1, y2], [x2, y1], [x2, y2]]);
        tex_coords.extend_from_slice(&[[u1, v2], [u2, v2], [u1, v1], [u1, v1], [u2, v2], [u2, v1]]);
    }
    (positions, tex_coords)
}

fn layout_entries() -> [wgpu::BindGroupLayoutEntry; 3] {
    [
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
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
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
    ]
}

pub fn build_program(device: &wgpu::Device, format: wgpu::TextureFormat) -> Result<Program, GpuError> {
    let entries = layout_entries();
    Program::new(
        device,
        &PipelineSpec {
            label: SPRITE_PROGRAM,
            source: include_str!("sprite.wgsl"),
            attribute_names: ATTRIBUTES,
            uniform_names: UNIFORMS,
            layout_entries: &entries,
            vertex_buffers: &[position_stream(), tex_coord_stream()],
            format,
            blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        },
    )
}

#[derive(Debug, Clone, Copy)]
struct SpriteKeys {
    positions: OwnerKey,
    tex_coords: OwnerKey,
    uniforms: OwnerKey,
    atlas: OwnerKey,
}

pub struct SpriteRenderer {
    keys: SpriteKeys,
    sampler: Option<wgpu::Sampler>,
    vertex_count: u32,
    missing: HashSet<String>,
}

impl Default for SpriteRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Vertex stream for `data`, reallocated when it has outgrown the cached one
fn upload_stream(gpu: &GpuContext, cache: &mut WgpuCache, key: OwnerKey, label: &str, data: &[[f32; 2]]) {
    let bytes: &[u8] = bytemuck::cast_slice(data);
    let needed = bytes.len() as u64;
    let allocate = |size: u64| {
        gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    };

    let capacity = cache
        .buffer(key, || allocate(needed.max(MIN_STREAM_BYTES)))
        .resource
        .size();
    if capacity < needed {
        let grown = u64::from(next_pow2(needed as u32)).max(needed);
        log::debug!("growing {label} to {grown} bytes");
        cache.replace_buffer(key, allocate(grown));
    }
    if let Some(buffer) = cache.cached_buffer(key) {
        gpu.queue.write_buffer(buffer, 0, bytes);
    }
}

impl SpriteRenderer {
    pub fn new() -> Self {
        Self {
            keys: SpriteKeys {
                positions: OwnerKey::next(),
                tex_coords: OwnerKey::next(),
                uniforms: OwnerKey::next(),
                atlas: OwnerKey::next(),
            },
            sampler: None,
            vertex_count: 0,
            missing: HashSet::new(),
        }
    }

    /// This frame's batch for `entities`
    pub fn instructions(&mut self, entities: &[Entity], pack: &TexturePack) -> Vec<SpriteInstruction> {
        instructions_for(entities, pack, &mut self.missing)
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Drop the sampler along with the device it came from
    pub fn on_context_lost(&mut self) {
        self.sampler = None;
        self.vertex_count = 0;
    }

    /// Upload this frame's batch. `None` when there is nothing to draw.
    pub fn prepare(
        &mut self,
        gpu: &GpuContext,
        cache: &mut WgpuCache,
        instructions: &[SpriteInstruction],
        pack: &TexturePack,
        viewport: &Viewport,
    ) -> Result<Option<wgpu::BindGroup>, GpuError> {
        self.vertex_count = 0;
        if instructions.is_empty() || pack.is_empty() {
            return Ok(None);
        }
        let device = &gpu.device;
        let keys = self.keys;

        cache.program_or_create(SPRITE_PROGRAM, || build_program(device, gpu.format()))?;

        let (positions, tex_coords) = build_vertices(instructions);
        upload_stream(gpu, cache, keys.positions, "sprite_positions", &positions);
        upload_stream(gpu, cache, keys.tex_coords, "sprite_tex_coords", &tex_coords);
        self.vertex_count = positions.len() as u32;

        let uniforms = SpriteUniforms::new(&viewport.world_to_clip(), pack.width(), pack.height());
        let uniform_buffer = cache.buffer(keys.uniforms, || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("sprite_uniforms"),
                size: std::mem::size_of::<SpriteUniforms>() as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        gpu.queue
            .write_buffer(uniform_buffer.resource, 0, bytemuck::bytes_of(&uniforms));

        cache.texture(keys.atlas, || {
            GpuTexture::from_image(device, &gpu.queue, "sprite_atlas", pack.image())
        });

        let sampler = self.sampler.get_or_insert_with(|| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("sprite_sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Nearest,
                min_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        });

        let (Some(program), Some(uniform_buffer), Some(atlas)) = (
            cache.program(SPRITE_PROGRAM),
            cache.cached_buffer(keys.uniforms),
            cache.cached_texture(keys.atlas),
        ) else {
            self.vertex_count = 0;
            return Ok(None);
        };

        let binding = |name: &str| program.info.uniform(name).map_or(0, |(_, b)| b);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite_bind_group"),
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
                    binding: binding("atlas_sampler"),
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        Ok(Some(bind_group))
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, cache: &WgpuCache, bind_group: &wgpu::BindGroup) {
        if self.vertex_count == 0 {
            return;
        }
        let (Some(program), Some(positions), Some(tex_coords)) = (
            cache.program(SPRITE_PROGRAM),
            cache.cached_buffer(self.keys.positions),
            cache.cached_buffer(self.keys.tex_coords),
        ) else {
            return;
        };
        let used = u64::from(self.vertex_count) * std::mem::size_of::<[f32; 2]>() as u64;
        pass.set_pipeline(&program.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.set_vertex_buffer(0, positions.slice(..used));
        pass.set_vertex_buffer(1, tex_coords.slice(..used));
        pass.draw(0..self.vertex_count, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn rect(x: u32, y: u32, w: u32, h: u32) -> AtlasRect {
        AtlasRect { x, y, w, h }
    }

    #[test]
    fn test_vertices_map_top_of_box_to_top_of_rect() {
        let inst = SpriteInstruction {
            tile: BoundingBox::new(1.0, 2.0, 1.0, 2.0),
            source: rect(16, 0, 8, 16),
        };
        let (positions, tex_coords) = build_vertices(&[inst]);
        assert_eq!(positions.len(), 6);
        assert_eq!(tex_coords.len(), 6);

        // bottom-left corner samples the bottom-left of the rect
        assert_eq!(positions[0], [1.0, 2.0]);
        assert_eq!(tex_coords[0], [16.0, 16.0]);
        // top-right corner samples the top-right of the rect
        assert_eq!(positions[5], [2.0, 4.0]);
        assert_eq!(tex_coords[5], [24.0, 0.0]);
    }

    #[test]
    fn test_vertices_pair_up_per_corner() {
        let inst = SpriteInstruction {
            tile: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            source: rect(0, 0, 4, 4),
        };
        let (positions, tex_coords) = build_vertices(&[inst, inst]);
        assert_eq!(positions.len(), 12);
        for (p, t) in positions.iter().zip(&tex_coords) {
            // x grows with u, y shrinks as v grows
            assert_eq!(p[0] * 4.0, t[0]);
            assert_eq!((1.0 - p[1]) * 4.0, t[1]);
        }
    }

    #[test]
    fn test_empty_batch_has_no_vertices() {
        let (positions, tex_coords) = build_vertices(&[]);
        assert!(positions.is_empty() && tex_coords.is_empty());
    }

    #[test]
    fn test_instructions_skip_unknown_sprites() {
        let mut builder = crate::atlas::TexturePackBuilder::new();
        let h = builder.register("player");
        builder
            .deliver(h, crate::atlas::solid_image(8, 16, [255, 0, 0, 255]))
            .unwrap();
        let pack = builder.build().unwrap();

        let entities = vec![
            Entity::new(Vec2::new(2.0, 1.0), 0.8, 1.6, "player"),
            Entity::new(Vec2::new(5.0, 1.0), 1.0, 1.0, "ghost"),
        ];
        let mut missing = HashSet::new();
        let instructions = instructions_for(&entities, &pack, &mut missing);
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].source, rect(0, 0, 8, 16));
        assert_eq!(instructions[0].tile, entities[0].hitbox());
        assert_eq!(missing.len(), 1);
        assert!(missing.contains("ghost"));

        // reported once, however many frames or entities carry the name
        let mut crowd = entities.clone();
        crowd.push(Entity::new(Vec2::new(7.0, 1.0), 1.0, 1.0, "ghost"));
        assert_eq!(instructions_for(&crowd, &pack, &mut missing).len(), 1);
        assert_eq!(missing.len(), 1);
    }
}
