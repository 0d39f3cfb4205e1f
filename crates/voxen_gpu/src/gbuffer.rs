use wgpu::Device;

pub const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
pub const VELOCITY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const WORLD_POSITION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// One G-buffer channel: the write target plus a same-format history
/// copy. A texture cannot be bound for both read and write within one
/// pass, so the interpolation pass reads the copy while writing the
/// original; the copy is refreshed by a GPU-to-GPU texture copy after
/// the sparse pass.
pub struct Channel {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub copy_texture: wgpu::Texture,
    pub copy_view: wgpu::TextureView,
    format: wgpu::TextureFormat,
}

fn channel_descriptor<'a>(
    label: &'a str,
    format: wgpu::TextureFormat,
    size: (u32, u32),
    usage: wgpu::TextureUsages,
) -> wgpu::TextureDescriptor<'a> {
    wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    }
}

impl Channel {
    fn new(device: &Device, label: &str, format: wgpu::TextureFormat, size: (u32, u32)) -> Self {
        let texture = device.create_texture(&channel_descriptor(
            label,
            format,
            size,
            wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        ));
        let copy_label = format!("{label} Copy");
        let copy_texture = device.create_texture(&channel_descriptor(
            &copy_label,
            format,
            size,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        ));
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let copy_view = copy_texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            copy_texture,
            copy_view,
            format,
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Encode the texture-to-copy refresh for this channel.
    pub fn copy_to_history(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_texture_to_texture(
            self.texture.as_image_copy(),
            self.copy_texture.as_image_copy(),
            self.texture.size(),
        );
    }
}

/// The five G-buffer channels handed downstream to lighting/post.
pub struct GBuffer {
    pub albedo: Channel,
    pub normal: Channel,
    pub depth: Channel,
    pub velocity: Channel,
    pub world_position: Channel,
    pub size: (u32, u32),
}

impl GBuffer {
    pub fn new(device: &Device, size: (u32, u32)) -> Self {
        Self {
            albedo: Channel::new(device, "GBuffer Albedo", ALBEDO_FORMAT, size),
            normal: Channel::new(device, "GBuffer Normal", NORMAL_FORMAT, size),
            depth: Channel::new(device, "GBuffer Depth", DEPTH_FORMAT, size),
            velocity: Channel::new(device, "GBuffer Velocity", VELOCITY_FORMAT, size),
            world_position: Channel::new(
                device,
                "GBuffer World Position",
                WORLD_POSITION_FORMAT,
                size,
            ),
            size,
        }
    }

    /// Refresh the history copies the interpolation pass reads. Encoded
    /// between the sparse pass and the interpolation pass so the copies
    /// hold this frame's tile centers plus last frame's dense results.
    pub fn copy_to_history(&self, encoder: &mut wgpu::CommandEncoder) {
        self.albedo.copy_to_history(encoder);
        self.normal.copy_to_history(encoder);
        self.depth.copy_to_history(encoder);
        self.velocity.copy_to_history(encoder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_descriptor_carries_label_through() {
        let label = String::from("GBuffer Albedo Copy");
        let descriptor = channel_descriptor(
            &label,
            ALBEDO_FORMAT,
            (1920, 1080),
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        assert_eq!(descriptor.label, Some(label.as_str()));
        assert_eq!(descriptor.format, ALBEDO_FORMAT);
        assert_eq!(descriptor.size.width, 1920);
        assert_eq!(descriptor.size.height, 1080);
        assert_eq!(descriptor.size.depth_or_array_layers, 1);
        assert!(descriptor.usage.contains(wgpu::TextureUsages::COPY_DST));
    }
}
