//! 2D textures uploaded from CPU-side images

use image::RgbaImage;

/// Atlas images are color data, authored in sRGB
pub const ATLAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
/// World-state texels are raw integers, read with `textureLoad`
pub const WORLD_STATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Uint;

pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: (u32, u32),
}

impl GpuTexture {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        size: (u32, u32),
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            size: (size.0.max(1), size.1.max(1)),
        }
    }

    /// Replace the whole texture with 4-byte texels in row order
    pub fn upload(&self, queue: &wgpu::Queue, texels: &[u8]) {
        let (width, height) = self.size;
        let expected = width as usize * height as usize * 4;
        if texels.len() != expected {
            log::error!(
                "texture upload size mismatch: got {} bytes, want {expected}",
                texels.len()
            );
            return;
        }
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            texels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            extent(self.size),
        );
    }

    pub fn from_image(device: &wgpu::Device, queue: &wgpu::Queue, label: &str, image: &RgbaImage) -> Self {
        let texture = Self::new(device, label, image.dimensions(), ATLAS_FORMAT);
        if image.width() > 0 && image.height() > 0 {
            texture.upload(queue, image.as_raw());
        }
        texture
    }
}

fn extent((width, height): (u32, u32)) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: width.max(1),
        height: height.max(1),
        depth_or_array_layers: 1,
    }
}
