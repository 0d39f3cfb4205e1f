use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use glam::Vec3;
use voxen_core::{demo_scene, RenderSettings, Scene};
use voxen_gpu::{FrameGraph, RenderContext};
use voxen_math::Camera;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

/// Orbit controls around the scene center.
struct OrbitCamera {
    target: Vec3,
    yaw: f32,
    pitch: f32,
    distance: f32,
}

impl OrbitCamera {
    fn framing(scene: &Scene) -> Self {
        let bounds = scene.view().world_bounds();
        let (target, distance) = if scene.objects().is_empty() {
            (Vec3::ZERO, 50.0)
        } else {
            let center = bounds.centroid();
            let radius = (bounds.max - bounds.min).length() * 0.5;
            (center, radius * 2.5)
        };
        Self {
            target,
            yaw: 0.6,
            pitch: 0.4,
            distance,
        }
    }

    fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch = (self.pitch + delta_pitch).clamp(-1.5, 1.5);
    }

    fn dolly(&mut self, amount: f32) {
        self.distance = (self.distance * (1.0 + amount * 0.001)).max(1.0);
    }

    fn camera(&self, aspect: f32) -> Camera {
        let offset = Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        ) * self.distance;
        Camera::new(self.target + offset, self.target, aspect)
    }
}

struct App {
    settings: RenderSettings,
    window: Option<Arc<Window>>,
    context: Option<RenderContext>,
    frame: Option<FrameGraph>,
    scene: Scene,
    orbit: OrbitCamera,

    left_mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
    last_report: Instant,
}

impl App {
    fn new(settings: RenderSettings) -> Self {
        let scene = demo_scene(settings.object_count);
        let orbit = OrbitCamera::framing(&scene);
        Self {
            settings,
            window: None,
            context: None,
            frame: None,
            scene,
            orbit,
            left_mouse_pressed: false,
            last_mouse_pos: None,
            last_report: Instant::now(),
        }
    }

    fn aspect(&self) -> f32 {
        let size = self
            .context
            .as_ref()
            .map(|c| c.size)
            .unwrap_or((1280, 720));
        size.0.max(1) as f32 / size.1.max(1) as f32
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let camera = self.orbit.camera(self.aspect());
        if let (Some(context), Some(frame)) = (&self.context, &mut self.frame) {
            if let Err(e) = frame.render(context, &camera) {
                if let Some(surface_err) = e.downcast_ref::<wgpu::SurfaceError>() {
                    match surface_err {
                        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                            if let Some(context) = &mut self.context {
                                let size = context.size;
                                context.resize(size);
                            }
                        }
                        wgpu::SurfaceError::OutOfMemory => {
                            log::error!("Out of GPU memory, exiting");
                            event_loop.exit();
                        }
                        _ => log::error!("Surface error: {surface_err:?}"),
                    }
                } else {
                    log::error!("Render error: {e:?}");
                }
            }
            self.scene.commit_motion();

            if self.last_report.elapsed().as_secs_f32() > 2.0 {
                if let Some(ms) = frame.timer.last_frame_ms() {
                    log::info!("GPU frame time: {ms:.2} ms");
                }
                self.last_report = Instant::now();
            }
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window_attrs = Window::default_attributes()
            .with_title("Voxen Viewer")
            .with_inner_size(winit::dpi::PhysicalSize::new(1280, 720));
        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(RenderContext::windowed(window.clone()))
            .and_then(|context| {
                let mut frame = FrameGraph::new(&context, self.settings.clone())?;
                frame.load_scene(&context, &self.scene)?;
                Ok((context, frame))
            }) {
            Ok((context, frame)) => {
                self.context = Some(context);
                self.frame = Some(frame);
                self.window = Some(window);
                log::info!("Window and renderer initialized");
            }
            Err(e) => {
                log::error!("Failed to initialize renderer: {e:?}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(context) = &mut self.context {
                    context.resize((physical_size.width, physical_size.height));
                    if let Some(frame) = &mut self.frame {
                        frame.resize(context);
                    }
                }
            }
            WindowEvent::MouseInput { button, state, .. } => {
                if button == MouseButton::Left {
                    self.left_mouse_pressed = state == ElementState::Pressed;
                    if !self.left_mouse_pressed {
                        self.last_mouse_pos = None;
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.left_mouse_pressed {
                    if let Some(last_pos) = self.last_mouse_pos {
                        let delta_x = (position.x - last_pos.0) as f32;
                        let delta_y = (position.y - last_pos.1) as f32;
                        self.orbit.orbit(delta_x * 0.005, delta_y * 0.005);
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll_amount = match delta {
                    winit::event::MouseScrollDelta::LineDelta(_, y) => y * 100.0,
                    winit::event::MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
                };
                self.orbit.dolly(-scroll_amount);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}

/// Settings come from an optional JSON file given as the first
/// argument; anything unreadable falls back to the defaults.
fn load_settings() -> RenderSettings {
    let Some(path) = std::env::args().nth(1) else {
        return RenderSettings::default();
    };
    match std::fs::read_to_string(&path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(settings) => {
                log::info!("Loaded settings from {path}");
                settings
            }
            Err(e) => {
                log::warn!("Failed to parse {path}: {e}, using defaults");
                RenderSettings::default()
            }
        },
        Err(e) => {
            log::warn!("Failed to read {path}: {e}, using defaults");
            RenderSettings::default()
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting Voxen Viewer");

    let settings = load_settings();
    settings.validate()?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(settings);
    event_loop.run_app(&mut app)?;

    Ok(())
}
