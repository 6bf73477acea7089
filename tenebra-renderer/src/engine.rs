use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::{
    passes::{
        AmbientLightPass, DirectionalLightPass, FrameContext, GBufferVisualizePass,
        GeometryDebugPass, GeometryPass, LightSourcesPass, PointLightsPass, StencilStampPass,
    },
    AllocationError, AnimationClock, Backend, CameraState, CommandList, FramePlan, GBuffer,
    Icosphere, InputEvent, MeshHandle, RenderMode, RendererConfig, RendererError, Scene,
    SceneProvider, Viewport,
};

/// Owns the per-frame state and sequences the passes of every frame.
pub struct Engine<B: Backend, S: SceneProvider> {
    backend: B,
    provider: S,
    config: RendererConfig,

    scene: Scene,
    gbuffer: GBuffer,
    viewport: Viewport,
    proxy: MeshHandle,

    mode: RenderMode,
    active_camera: usize,
    clock: AnimationClock,
    camera: CameraState,
    pending: VecDeque<InputEvent>,
    last_frame: Option<Instant>,
}

impl<B: Backend, S: SceneProvider> Engine<B, S> {
    pub fn new(mut backend: B, provider: S, config: RendererConfig) -> Result<Self, RendererError> {
        let scene = Scene::load(&mut backend, &provider, &config)?;
        let proxy = backend.upload_mesh(&Icosphere::default().mesh());

        let surface = backend.surface_size();
        let (width, height) = GBuffer::fit(config.gbuffer_size, surface);
        let gbuffer = GBuffer::allocate(&mut backend, width, height)?;

        Ok(Self {
            viewport: Viewport::centered(gbuffer.size(), surface),
            camera: CameraState::new(&provider.camera(0, Duration::ZERO), gbuffer.aspect()),
            mode: config.initial_mode,

            backend,
            provider,
            config,

            scene,
            gbuffer,
            proxy,

            active_camera: 0,
            clock: AnimationClock::default(),
            pending: VecDeque::new(),
            last_frame: None,
        })
    }

    pub fn resize(&mut self, size: (u32, u32)) -> Result<(), AllocationError> {
        if size.0 == 0 || size.1 == 0 {
            return Ok(());
        }

        self.backend.resize(size);

        let (width, height) = GBuffer::fit(self.config.gbuffer_size, size);
        if (width, height) != self.gbuffer.size() {
            self.gbuffer = GBuffer::allocate(&mut self.backend, width, height)?;
        }
        self.viewport = Viewport::centered(self.gbuffer.size(), size);

        Ok(())
    }

    /// Queues an event, applied at the start of the next frame.
    pub fn handle_input(&mut self, event: InputEvent) {
        log::debug!("Input: {event:?}");
        self.pending.push_back(event);
    }

    /// Advances by the wall-clock time since the previous frame and renders.
    pub fn frame(&mut self) -> Result<(), RendererError> {
        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|last| now.duration_since(last))
            .unwrap_or_default();
        self.last_frame = Some(now);

        self.advance(dt)
    }

    /// Advances animation by `dt`, then renders one frame in the current mode.
    pub fn advance(&mut self, dt: Duration) -> Result<(), RendererError> {
        while let Some(event) = self.pending.pop_front() {
            self.apply(event);
        }

        self.clock
            .advance(dt, self.config.animation_speed, self.provider.duration());
        let time = self.clock.time();

        self.camera = CameraState::new(
            &self.provider.camera(self.active_camera, time),
            self.gbuffer.aspect(),
        );
        self.scene.update(&self.provider, time);

        let commands = self.record(FramePlan::new(self.mode, &self.config));
        log::trace!("Frame at {time:?}: {} commands", commands.len());

        self.backend.submit(&commands)?;

        Ok(())
    }

    pub fn record(&self, plan: FramePlan) -> CommandList {
        let ctx = FrameContext {
            camera: &self.camera,
            gbuffer: &self.gbuffer,
            viewport: self.viewport,
            scene: &self.scene,
            proxy: self.proxy,
            config: &self.config,
        };

        let mut commands = CommandList::new();

        match plan {
            FramePlan::Deferred {
                ambient,
                light_sources,
            } => {
                GeometryPass.record(&ctx, &mut commands);
                StencilStampPass.record(&ctx, &mut commands);
                if ambient {
                    AmbientLightPass.record(&ctx, &mut commands);
                }
                DirectionalLightPass.record(&ctx, &mut commands);
                PointLightsPass.record(&ctx, &mut commands);
                if light_sources {
                    LightSourcesPass.record(&ctx, &mut commands);
                }
            }
            FramePlan::Visualize(attachment) => {
                GeometryPass.record(&ctx, &mut commands);
                GBufferVisualizePass { attachment }.record(&ctx, &mut commands);
            }
            FramePlan::GeometryDebug => GeometryDebugPass.record(&ctx, &mut commands),
        }

        commands
    }

    fn apply(&mut self, event: InputEvent) {
        let cameras = self.scene.camera_count.max(1);

        match event {
            InputEvent::NextRenderMode => self.set_mode(self.mode.next()),
            InputEvent::PreviousRenderMode => self.set_mode(self.mode.previous()),
            InputEvent::NextCamera => self.active_camera = (self.active_camera + 1) % cameras,
            InputEvent::PreviousCamera => {
                self.active_camera = (self.active_camera + cameras - 1) % cameras
            }
            InputEvent::TogglePause => self.clock.toggle_pause(),
        }
    }

    pub fn set_mode(&mut self, mode: RenderMode) {
        if mode != self.mode {
            log::info!("Render mode: {}", mode.name());
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn active_camera(&self) -> usize {
        self.active_camera
    }

    pub fn paused(&self) -> bool {
        self.clock.paused()
    }

    pub fn time(&self) -> Duration {
        self.clock.time()
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        raster::RasterBackend, CameraDesc, Command, LightDesc, MaterialDesc, MeshData, MeshNode,
        SceneDesc, Target,
    };
    use glam::{Mat4, Vec3};

    fn scene(cameras: usize) -> SceneDesc {
        let mut scene = SceneDesc {
            meshes: vec![MeshData::cube(0.5)],
            materials: vec![MaterialDesc::default()],
            cameras: vec![CameraDesc::default(); cameras],
            ..Default::default()
        };
        let node = scene.add_node(Mat4::IDENTITY);
        scene.mesh_nodes.push(MeshNode {
            mesh: 0,
            material: 0,
            node,
        });
        let light = scene.add_node(Mat4::from_translation(Vec3::new(0.0, 0.0, 1.5)));
        scene.lights.push(LightDesc::point(light, Vec3::ONE));
        scene
    }

    fn engine(cameras: usize) -> Engine<RasterBackend, SceneDesc> {
        Engine::new(
            RasterBackend::new(48, 32),
            scene(cameras),
            RendererConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn gbuffer_is_centered_in_the_surface() {
        let engine = engine(1);

        assert_eq!(engine.gbuffer().size(), (32, 32));
        assert_eq!(engine.viewport(), Viewport::centered((32, 32), (48, 32)));
        assert_eq!(engine.viewport().x, 8);
    }

    #[test]
    fn input_applies_on_the_next_frame() {
        let mut engine = engine(3);

        engine.handle_input(InputEvent::NextRenderMode);
        engine.handle_input(InputEvent::PreviousCamera);
        assert_eq!(engine.mode(), RenderMode::Deferred);

        engine.advance(Duration::ZERO).unwrap();
        assert_eq!(engine.mode(), RenderMode::Geometry);
        assert_eq!(engine.active_camera(), 2);

        engine.handle_input(InputEvent::NextCamera);
        engine.handle_input(InputEvent::TogglePause);
        engine.advance(Duration::ZERO).unwrap();
        assert_eq!(engine.active_camera(), 0);
        assert!(engine.paused());
    }

    #[test]
    fn every_mode_renders() {
        let mut engine = engine(1);

        for mode in RenderMode::ALL {
            engine.set_mode(mode);
            engine.advance(Duration::from_millis(16)).unwrap();
        }
    }

    #[test]
    fn debug_geometry_never_touches_the_gbuffer() {
        let engine = engine(1);
        let commands = engine.record(FramePlan::GeometryDebug);

        assert!(commands.iter().all(|command| !matches!(
            command,
            Command::BeginPass {
                target: Target::GBuffer,
                ..
            } | Command::BindGBuffer { .. }
        )));
    }

    #[test]
    fn resize_reallocates_the_gbuffer() {
        let mut engine = engine(1);

        engine.resize((80, 70)).unwrap();
        assert_eq!(engine.gbuffer().size(), (64, 64));
        assert_eq!(engine.viewport(), Viewport::centered((64, 64), (80, 70)));
        assert_eq!(engine.backend().surface_size(), (80, 70));
        engine.advance(Duration::ZERO).unwrap();
    }
}
