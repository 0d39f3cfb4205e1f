use anyhow::Result;
use wgpu::{Device, Instance, Queue, Surface, SurfaceConfiguration};

/// Core wgpu state: device, queue, and (for windowed use) the surface.
pub struct RenderContext {
    pub surface: Option<Surface<'static>>,
    pub device: Device,
    pub queue: Queue,
    pub config: Option<SurfaceConfiguration>,
    pub size: (u32, u32),
}

impl RenderContext {
    /// Create a context presenting to a window.
    pub async fn windowed(window: std::sync::Arc<winit::window::Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("Failed to find suitable GPU adapter"))?;

        let (device, queue) = request_device(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        log::info!(
            "Render context created: {:?}, surface {}x{} {:?}",
            adapter.get_info().name,
            size.width,
            size.height,
            surface_format
        );

        Ok(Self {
            surface: Some(surface),
            device,
            queue,
            config: Some(config),
            size: (size.width, size.height),
        })
    }

    /// Create a context with no surface, for offscreen rendering.
    pub async fn headless() -> Result<Self> {
        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("Failed to find suitable GPU adapter"))?;

        let (device, queue) = request_device(&adapter).await?;

        Ok(Self {
            surface: None,
            device,
            queue,
            config: None,
            size: (0, 0),
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config
            .as_ref()
            .map(|c| c.format)
            .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb)
    }

    /// Handle window resize. The frame graph recreates its render
    /// targets separately.
    pub fn resize(&mut self, new_size: (u32, u32)) {
        if new_size.0 == 0 || new_size.1 == 0 {
            return;
        }
        self.size = new_size;
        if let (Some(surface), Some(config)) = (&self.surface, &mut self.config) {
            config.width = new_size.0;
            config.height = new_size.1;
            surface.configure(&self.device, config);
        }
    }
}

async fn request_device(adapter: &wgpu::Adapter) -> Result<(Device, Queue)> {
    // Timestamp queries are optional; the frame timer disables itself
    // when the adapter lacks them.
    let mut features = wgpu::Features::empty();
    if adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY) {
        features |= wgpu::Features::TIMESTAMP_QUERY;
    }
    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Voxen Device"),
                required_features: features,
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        )
        .await?;
    Ok((device, queue))
}
