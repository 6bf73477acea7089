#![warn(clippy::all)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use glam::Mat4;
use tenebra::prelude::*;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, ModifiersState, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

mod scene;

use scene::ProceduralScene;

#[derive(Parser, Debug)]
#[command(name = "tenebra-demo")]
#[command(about = "Deferred lighting demo", long_about = None)]
struct Args {
    /// glTF scene to render, a procedural scene is generated when omitted
    scene: Option<PathBuf>,

    /// TOML renderer configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Internal resolution width
    #[arg(long, requires = "gbuffer_height")]
    gbuffer_width: Option<u32>,

    /// Internal resolution height
    #[arg(long, requires = "gbuffer_width")]
    gbuffer_height: Option<u32>,

    /// Render mode at start-up
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Seed of the procedural scene
    #[arg(long, default_value_t = 533)]
    seed: u64,

    /// Point lights in the procedural scene
    #[arg(long, default_value_t = 32)]
    lights: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Albedo,
    Normals,
    Depth,
    Deferred,
    Geometry,
}

impl From<Mode> for RenderMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Albedo => RenderMode::Albedo,
            Mode::Normals => RenderMode::Normals,
            Mode::Depth => RenderMode::Depth,
            Mode::Deferred => RenderMode::Deferred,
            Mode::Geometry => RenderMode::Geometry,
        }
    }
}

impl Args {
    fn renderer_config(&self) -> Result<RendererConfig> {
        let mut config = match &self.config {
            Some(path) => RendererConfig::load_from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => RendererConfig::default(),
        };

        if let (Some(width), Some(height)) = (self.gbuffer_width, self.gbuffer_height) {
            config.gbuffer_size = Some((width, height));
        }
        if let Some(mode) = self.mode {
            config.initial_mode = mode.into();
        }

        Ok(config)
    }

    fn load_scene(&self) -> Result<DemoScene> {
        Ok(match &self.scene {
            Some(path) => DemoScene::Gltf(GltfScene::load(path)?),
            None => DemoScene::Procedural(ProceduralScene::new(self.seed, self.lights)),
        })
    }
}

/// Scenes the demo can show.
enum DemoScene {
    Gltf(GltfScene),
    Procedural(ProceduralScene),
}

impl DemoScene {
    fn provider(&self) -> &dyn SceneProvider {
        match self {
            Self::Gltf(scene) => scene,
            Self::Procedural(scene) => scene,
        }
    }
}

impl SceneProvider for DemoScene {
    fn meshes(&self) -> &[MeshData] {
        self.provider().meshes()
    }

    fn materials(&self) -> &[MaterialDesc] {
        self.provider().materials()
    }

    fn mesh_nodes(&self) -> &[MeshNode] {
        self.provider().mesh_nodes()
    }

    fn lights(&self) -> &[LightDesc] {
        self.provider().lights()
    }

    fn camera_count(&self) -> usize {
        self.provider().camera_count()
    }

    fn camera(&self, index: usize, time: Duration) -> CameraDesc {
        self.provider().camera(index, time)
    }

    fn node_transform(&self, node: usize, time: Duration) -> Mat4 {
        self.provider().node_transform(node, time)
    }

    fn duration(&self) -> Duration {
        self.provider().duration()
    }
}

type DemoEngine = Engine<WgpuBackend<'static>, DemoScene>;

struct DemoState {
    window: Arc<Window>,
    engine: DemoEngine,
    kb_modifiers: ModifiersState,
    shown_mode: Option<RenderMode>,
}

impl DemoState {
    fn update_title(&mut self) {
        let mode = self.engine.mode();
        if self.shown_mode != Some(mode) {
            self.window.set_title(&format!("tenebra - {}", mode.name()));
            self.shown_mode = Some(mode);
        }
    }
}

struct DemoApp {
    args: Args,
    state: Option<DemoState>,
    error: Option<anyhow::Error>,
}

impl DemoApp {
    fn init(&self, event_loop: &ActiveEventLoop) -> Result<DemoState> {
        let config = self.args.renderer_config()?;
        let scene = self.args.load_scene()?;

        let window = Arc::new(
            event_loop.create_window(Window::default_attributes().with_title("tenebra"))?,
        );

        let renderer = pollster::block_on(Renderer::new(
            window.clone(),
            window.inner_size().into(),
        ))?;
        let backend = WgpuBackend::new(renderer)?;
        let engine = Engine::new(backend, scene, config)?;

        Ok(DemoState {
            window,
            engine,
            kb_modifiers: ModifiersState::empty(),
            shown_mode: None,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.init(event_loop) {
            Ok(mut state) => {
                state.update_title();
                self.state = Some(state);
            }
            Err(error) => self.fail(event_loop, error),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        match event {
            WindowEvent::RedrawRequested => {
                if let Err(error) = state.engine.frame() {
                    self.fail(event_loop, error.into());
                    return;
                }
                state.update_title();

                // Emits a new redraw requested event.
                state.window.request_redraw();
            }

            WindowEvent::Resized(size) => {
                if let Err(error) = state.engine.resize(size.into()) {
                    self.fail(event_loop, error.into());
                }
            }

            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),

            WindowEvent::ModifiersChanged(modifiers) => state.kb_modifiers = modifiers.state(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(code),
                        repeat: false,
                        ..
                    },
                ..
            } => match code {
                KeyCode::Enter if state.kb_modifiers.alt_key() => {
                    let window = &state.window;
                    window.set_fullscreen(match window.fullscreen() {
                        None => Some(Fullscreen::Borderless(None)),
                        _ => None,
                    });
                }
                code => {
                    if let Some(input) = InputEvent::from_key_code(code) {
                        state.engine.handle_input(input);
                    }
                }
            },
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = DemoApp {
        args,
        state: None,
        error: None,
    };
    event_loop.run_app(&mut app)?;

    match app.error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
