// orbitview - interactive 3D rendering client
//
// Opens a window, brings up a Vulkan device and swapchain, and re-presents
// frames continuously: a ground plane and a floating cube under an orbit
// camera. The rendering context (src/backend) owns the device/swapchain
// lifecycle; this layer owns the window, the input state, the camera, and
// the drawable registry.

mod backend;
mod camera;
mod config;
mod scene;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowAttributes},
};

use backend::RenderContext;
use camera::OrbitCamera;
use config::Config;
use scene::{CubeRenderer, Drawable, PlaneRenderer};

fn main() {
    let config = Config::load();
    init_logging();
    log::info!("Starting orbitview");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );

    if let Err(e) = run(config) {
        log::error!("Fatal: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    use env_logger::Builder;
    use log::LevelFilter;

    let mut builder = Builder::from_default_env();
    builder.filter_level(LevelFilter::Info);
    builder.init();
}

fn run(config: Config) -> Result<()> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// A drawable plus where it sits in the world.
struct SceneObject {
    drawable: Box<dyn Drawable>,
    model: Mat4,
}

struct App {
    config: Config,

    window: Option<Arc<Window>>,
    ctx: Option<RenderContext>,
    scene: Vec<SceneObject>,

    cam: OrbitCamera,
    keys_down: HashSet<KeyCode>,
    dragging: bool,
    last_cursor: Option<(f64, f64)>,
    is_fullscreen: bool,

    last_frame: Instant,
    frame_count: u32,
    last_fps_update: Instant,

    /// Set when the frame loop hit an unrecoverable error; reported as the
    /// process result after the event loop winds down.
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        let is_fullscreen = config.window.fullscreen;
        let now = Instant::now();
        Self {
            config,
            window: None,
            ctx: None,
            scene: Vec::new(),
            cam: OrbitCamera::default(),
            keys_down: HashSet::new(),
            dragging: false,
            last_cursor: None,
            is_fullscreen,
            last_frame: now,
            frame_count: 0,
            last_fps_update: now,
            fatal: None,
        }
    }

    fn init_renderer(&mut self, window: Arc<Window>) -> Result<()> {
        self.ctx = Some(RenderContext::new(window, &self.config)?);

        self.scene = vec![
            SceneObject {
                drawable: Box::new(PlaneRenderer::new()),
                model: Mat4::IDENTITY,
            },
            SceneObject {
                drawable: Box::new(CubeRenderer::new()),
                // Float the cube 5 units above the plane
                model: Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)),
            },
        ];

        let ctx = self.ctx.as_ref().context("Context not initialized")?;
        let frame = ctx.frame_context()?;
        for obj in &mut self.scene {
            obj.drawable.init(&frame)?;
        }

        Ok(())
    }

    /// Render a single frame: camera update, then the context's present
    /// protocol with the scene recorded through the opaque callback.
    fn render_frame(&mut self) -> Result<bool> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        // WASD pans the orbit target; LeftArrow boosts
        let controls = &self.config.controls;
        let mut speed = controls.move_speed;
        if self.keys_down.contains(&KeyCode::ArrowLeft) {
            speed *= controls.boost_multiplier;
        }

        let mut dx = 0.0;
        let mut dz = 0.0;
        if self.keys_down.contains(&KeyCode::KeyW) {
            dz += speed * dt;
        }
        if self.keys_down.contains(&KeyCode::KeyS) {
            dz -= speed * dt;
        }
        if self.keys_down.contains(&KeyCode::KeyD) {
            dx += speed * dt;
        }
        if self.keys_down.contains(&KeyCode::KeyA) {
            dx -= speed * dt;
        }
        if dx != 0.0 || dz != 0.0 {
            self.cam.pan(dx, dz);
        }

        let Some(ctx) = self.ctx.as_mut() else {
            return Ok(false);
        };

        let (width, height) = ctx.extent();
        let aspect = width as f32 / height.max(1) as f32;
        let view = self.cam.view();
        let mut proj = Mat4::perspective_rh(60f32.to_radians(), aspect, 0.1, 2000.0);
        proj.y_axis.y *= -1.0; // Vulkan clip space Y points down
        let view_proj = proj * view;

        let scene = &mut self.scene;
        ctx.draw_frame(|cmd, frame| {
            for obj in scene.iter_mut() {
                obj.drawable.record(cmd, frame, view_proj * obj.model)?;
            }
            Ok(())
        })
    }

    fn toggle_fullscreen(&mut self) {
        if let Some(window) = &self.window {
            self.is_fullscreen = !self.is_fullscreen;

            if self.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                log::info!("Entered fullscreen mode");
            } else {
                window.set_fullscreen(None);
                log::info!("Exited fullscreen mode");
            }

            if let Some(ctx) = self.ctx.as_mut() {
                ctx.request_recreate();
            }
        }
    }

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        self.frame_count += 1;
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();

        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;
            if let Some(window) = &self.window {
                let mode = if self.is_fullscreen { "fullscreen" } else { "windowed" };
                window.set_title(&format!(
                    "{} - {:.0} FPS [{}]",
                    self.config.window.title, fps, mode
                ));
            }
            self.frame_count = 0;
            self.last_fps_update = now;
        }
    }

    /// Release everything in order: device idle, drawables, then the
    /// context. Idempotent; also runs from Drop.
    fn shutdown(&mut self) {
        if let Some(ctx) = &self.ctx {
            log::info!("Rendered {} frames", ctx.frame_count());
            let _ = ctx.device().wait_idle();
        }

        for obj in &mut self.scene {
            obj.drawable.release();
        }
        self.scene.clear();

        if let Some(mut ctx) = self.ctx.take() {
            ctx.cleanup();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut attrs = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        if self.config.window.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        if let Err(e) = self.init_renderer(window) {
            self.fatal = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown();
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                // Zero-size (minimized) is handled by the frame loop's gate
                if size.width > 0 && size.height > 0 {
                    if let Some(ctx) = self.ctx.as_mut() {
                        ctx.request_recreate();
                    }
                }
            }

            WindowEvent::RedrawRequested => match self.render_frame() {
                Ok(true) => self.update_fps(),
                Ok(false) => {}
                Err(e) => {
                    self.fatal = Some(e);
                    event_loop.exit();
                }
            },

            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.keys_down.insert(key);
                        match key {
                            KeyCode::Escape => {
                                log::info!("ESC pressed, exiting...");
                                self.shutdown();
                                event_loop.exit();
                            }
                            KeyCode::F11 => {
                                self.toggle_fullscreen();
                            }
                            _ => {}
                        }
                    } else {
                        self.keys_down.remove(&key);
                    }
                }
            }

            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Right {
                    self.dragging = state == ElementState::Pressed;
                    self.last_cursor = None;
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                if self.dragging {
                    if let Some((last_x, last_y)) = self.last_cursor {
                        let dx = (position.x - last_x) as f32;
                        let dy = (position.y - last_y) as f32;
                        self.cam.rotate(dx, dy, self.config.controls.rotate_speed);
                    }
                    self.last_cursor = Some((position.x, position.y));
                }
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 40.0,
                };
                if notches != 0.0 {
                    self.cam.zoom(notches, self.config.controls.zoom_step);
                }
            }

            _ => {}
        }
    }

    /// Request continuous redraws
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}
