use anyhow::{anyhow, Result};

/// Device, queue and the window surface frames are presented to.
pub struct Renderer<'window> {
    pub surface: wgpu::Surface<'window>,
    pub surface_config: wgpu::SurfaceConfiguration,

    pub adapter: wgpu::Adapter,
    pub adapter_info: wgpu::AdapterInfo,

    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl<'window> Renderer<'window> {
    // depth clamping for light proxies
    const FEATURES: wgpu::Features = wgpu::Features::DEPTH_CLIP_CONTROL;

    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'window>>,
        size: (u32, u32),
    ) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface: Some(&surface),
                ..Default::default()
            })
            .await?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Using {} ({:?}, {})",
            adapter_info.name,
            adapter_info.backend,
            adapter_info.driver
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Renderer device"),
                required_features: Self::FEATURES,
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                ..Default::default()
            })
            .await?;

        let mut surface_config = surface
            .get_default_config(&adapter, size.0.max(1), size.1.max(1))
            .ok_or_else(|| anyhow!("Surface not compatible with adapter"))?;
        surface_config.format = surface_config.format.add_srgb_suffix();
        surface_config.present_mode = wgpu::PresentMode::AutoVsync;

        surface.configure(&device, &surface_config);

        Ok(Self {
            adapter,
            adapter_info,
            device,
            queue,
            surface,
            surface_config,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    pub fn resize(&mut self, (width, height): (u32, u32)) {
        if (width, height) == self.size() || width == 0 || height == 0 {
            return;
        }

        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    /// Reconfigures the surface after it was lost or outdated.
    pub fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.surface_config);
    }
}
