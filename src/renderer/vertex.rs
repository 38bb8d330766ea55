//! Vertex and uniform layouts shared with the WGSL shaders

use bytemuck::{Pod, Zeroable};

use crate::geom::ReducedTransform;

/// Corner of the full-viewport quad, in clip space
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
}

impl QuadVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            }],
        }
    }
}

/// Two triangles covering clip space
pub const FULL_VIEWPORT_QUAD: [QuadVertex; 6] = [
    QuadVertex { position: [-1.0, -1.0] },
    QuadVertex { position: [1.0, -1.0] },
    QuadVertex { position: [-1.0, 1.0] },
    QuadVertex { position: [-1.0, 1.0] },
    QuadVertex { position: [1.0, -1.0] },
    QuadVertex { position: [1.0, 1.0] },
];

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
const TEX_COORD_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];

fn vec2_stream(attributes: &'static [wgpu::VertexAttribute]) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

/// Sprite positions (tile space), `@location(0)`
pub fn position_stream() -> wgpu::VertexBufferLayout<'static> {
    vec2_stream(&POSITION_ATTRIBUTES)
}

/// Sprite texture coordinates (atlas pixels), `@location(1)`.
/// Positions and texture coordinates live in two parallel buffers.
pub fn tex_coord_stream() -> wgpu::VertexBufferLayout<'static> {
    vec2_stream(&TEX_COORD_ATTRIBUTES)
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TileUniforms {
    pub clip_to_world: [f32; 4],
    pub tile_size: f32,
    pub _pad: [f32; 3],
}

impl TileUniforms {
    pub fn new(clip_to_world: &ReducedTransform, tile_size: u32) -> Self {
        Self {
            clip_to_world: clip_to_world.to_array(),
            tile_size: tile_size as f32,
            _pad: [0.0; 3],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SpriteUniforms {
    pub world_to_clip: [f32; 4],
    pub atlas_size: [f32; 2],
    pub _pad: [f32; 2],
}

impl SpriteUniforms {
    pub fn new(world_to_clip: &ReducedTransform, atlas_width: u32, atlas_height: u32) -> Self {
        Self {
            world_to_clip: world_to_clip.to_array(),
            atlas_size: [atlas_width.max(1) as f32, atlas_height.max(1) as f32],
            _pad: [0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes_match_wgsl() {
        // both structs are 16-byte aligned blocks of 32 bytes in WGSL
        assert_eq!(std::mem::size_of::<TileUniforms>(), 32);
        assert_eq!(std::mem::size_of::<SpriteUniforms>(), 32);
    }

    #[test]
    fn test_quad_covers_clip_space() {
        let xs: Vec<f32> = FULL_VIEWPORT_QUAD.iter().map(|v| v.position[0]).collect();
        let ys: Vec<f32> = FULL_VIEWPORT_QUAD.iter().map(|v| v.position[1]).collect();
        assert!(xs.contains(&-1.0) && xs.contains(&1.0));
        assert!(ys.contains(&-1.0) && ys.contains(&1.0));
    }

    #[test]
    fn test_stream_locations() {
        assert_eq!(position_stream().attributes[0].shader_location, 0);
        assert_eq!(tex_coord_stream().attributes[0].shader_location, 1);
    }
}
