//! Application shell: ties configuration, input, the scene and a render
//! backend together and drives them from the winit event loop.

use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cgmath::Vector2;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalPosition, PhysicalSize},
    event::{MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::config::AppConfig;
use crate::gfx::rendering::render_engine::RenderEngine;
use crate::gfx::rendering::sink::{PickBuffer, RenderSink};
use crate::gfx::resources::mesh::{MeshLoader, ObjLoader};
use crate::gfx::scene::scene::{InputAction, Scene, SceneAssets};
use crate::input::InputState;
use crate::time::Clock;

/// Ticks whose delta reaches this many seconds skip input and update.
pub const MAX_TICK_DELTA: f32 = 0.1;

const CAMERA_KEYS: [KeyCode; 4] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
];

/// Everything the viewer owns. There is no global state; the event loop
/// handler holds one of these.
pub struct Application<B> {
    config: AppConfig,
    input: InputState,
    scene: Scene,
    backend: B,
    clock: Rc<dyn Clock>,
    last_tick: f32,
}

impl<B: RenderSink + PickBuffer> Application<B> {
    /// Loads the scene named by the configuration into `backend`.
    pub fn load(
        config: AppConfig,
        assets: &SceneAssets,
        loader: &dyn MeshLoader,
        mut backend: B,
        clock: Rc<dyn Clock>,
    ) -> crate::error::Result<Self> {
        let scene = Scene::load_file(
            &config.scene_filename,
            assets,
            loader,
            &mut backend,
            clock.clone(),
        )?;
        Ok(Self::new(config, scene, backend, clock))
    }

    pub fn new(config: AppConfig, mut scene: Scene, backend: B, clock: Rc<dyn Clock>) -> Self {
        let input = InputState::new(config.window_width, config.window_height);
        scene.set_cameras_aspect_ratio(config.window_width as f32 / config.window_height as f32);
        let last_tick = clock.now();
        Self {
            config,
            input,
            scene,
            backend,
            clock,
            last_tick,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    /// Runs input handling and the scene update unless the time since the
    /// previous tick reached [`MAX_TICK_DELTA`]. Returns whether it ran.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now();
        let dt = now - self.last_tick;
        let ran = dt < MAX_TICK_DELTA;
        if ran {
            self.handle_input(dt);
            self.scene.update(dt);
        } else {
            log::debug!("Tick skipped after a {:.3}s stall", dt);
        }
        self.last_tick = now;
        ran
    }

    fn handle_input(&mut self, dt: f32) {
        let moves = [
            (KeyCode::KeyW, InputAction::MoveForward),
            (KeyCode::KeyS, InputAction::MoveBackward),
            (KeyCode::KeyA, InputAction::MoveLeft),
            (KeyCode::KeyD, InputAction::MoveRight),
        ];
        for (key, action) in moves {
            if self.input.is_key_pressed(key) {
                self.scene.process_input_action(action, dt);
            }
        }

        if self.input.is_key_pressed(KeyCode::KeyC) {
            self.input.force_release(KeyCode::KeyC);
            self.scene.toggle_spotlight();
        }
        if self.input.is_key_pressed(KeyCode::KeyV) {
            self.input.force_release(KeyCode::KeyV);
            self.scene.toggle_point_lights();
        }
        if self.input.is_chord_pressed(&[KeyCode::KeyB, KeyCode::AltLeft]) {
            self.input.force_release(KeyCode::KeyB);
            self.input.force_release(KeyCode::AltLeft);
            self.scene.toggle_camera_movement();
        }
        if let Some(index) = CAMERA_KEYS
            .iter()
            .position(|key| self.input.is_key_pressed(*key))
        {
            self.input.force_release(CAMERA_KEYS[index]);
            self.scene.set_active_camera(index);
        }

        if self.input.is_mouse_pressed(MouseButton::Left) {
            self.input.force_release_mouse(MouseButton::Left);
            self.scene.process_input_action(InputAction::Fire, dt);
            let click = self.input.last_click();
            let flipped = Vector2::new(click.x, self.input.window_size().y - click.y);
            self.scene.process_mouse_click(flipped, &self.backend);
        }

        self.scene
            .process_mouse_movement(self.input.mouse_offset(), dt);
        self.input.recenter();
    }

    pub fn render(&mut self) {
        self.backend.begin_frame();
        self.scene.render(&mut self.backend);
        self.backend.end_frame();
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.input.set_window_size(width, height);
        self.scene
            .set_cameras_aspect_ratio(width as f32 / height as f32);
        self.backend.resize(width, height);
    }
}

/// Fires at a fixed interval measured from the last time it fired.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval: Duration,
    next: Instant,
}

impl FrameScheduler {
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            next: start + interval,
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis), Instant::now())
    }

    pub fn deadline(&self) -> Instant {
        self.next
    }

    /// `true` when the deadline has passed; schedules the next one.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next = now + self.interval;
        true
    }
}

/// Event loop state. The window, the GPU backend and the scene only exist
/// after the first `resumed`.
struct ViewerHandler {
    config: AppConfig,
    assets: SceneAssets,
    loader: ObjLoader,
    clock: Rc<dyn Clock>,
    scheduler: FrameScheduler,
    window: Option<Arc<Window>>,
    app: Option<Application<RenderEngine>>,
    failure: Option<anyhow::Error>,
}

impl ViewerHandler {
    fn warp_cursor(&self) {
        let (Some(window), Some(app)) = (self.window.as_ref(), self.app.as_ref()) else {
            return;
        };
        let center = app.input().center();
        if let Err(e) =
            window.set_cursor_position(PhysicalPosition::new(center.x as f64, center.y as f64))
        {
            log::trace!("Cursor warp unsupported: {}", e);
        }
    }

    /// Creates the window, the render engine on top of it and loads the scene.
    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let attributes = WindowAttributes::default()
            .with_title(self.config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));
        let window = Arc::new(event_loop.create_window(attributes)?);
        let PhysicalSize { width, height } = window.inner_size();

        let engine = pollster::block_on(RenderEngine::new(window.clone(), width, height))?;
        let mut app = Application::load(
            self.config.clone(),
            &self.assets,
            &self.loader,
            engine,
            self.clock.clone(),
        )?;
        app.resize(width, height);

        window.set_cursor_visible(false);
        log::info!("Window created ({}x{})", width, height);
        self.window = Some(window);
        self.app = Some(app);
        self.warp_cursor();
        Ok(())
    }
}

impl ApplicationHandler for ViewerHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            log::error!("Failed to start viewer: {:#}", e);
            self.failure = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(app) = self.app.as_mut() else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput { ref event, .. }
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                event_loop.exit();
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                app.resize(width, height);
            }
            WindowEvent::RedrawRequested => app.render(),
            ref other => {
                app.input_mut().handle_window_event(other);
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.scheduler.poll(Instant::now()) {
            if let Some(app) = self.app.as_mut() {
                app.tick();
            }
            self.warp_cursor();
            if let Some(window) = self.window.as_ref() {
                window.request_redraw();
            }
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.scheduler.deadline()));
    }
}

/// Opens the window, renders the configured scene through wgpu and runs
/// until the window is closed or Escape is pressed.
pub fn run(config: AppConfig, clock: Rc<dyn Clock>) -> anyhow::Result<()> {
    let event_loop = EventLoop::new()?;
    let mut handler = ViewerHandler {
        scheduler: FrameScheduler::from_millis(config.target_tickrate),
        config,
        assets: SceneAssets::default(),
        loader: ObjLoader::default(),
        clock,
        window: None,
        app: None,
        failure: None,
    };
    event_loop.run_app(&mut handler)?;
    if let Some(e) = handler.failure {
        return Err(e);
    }
    log::info!("Event loop finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::gfx::rendering::recorder::RecordingSink;
    use crate::gfx::resources::mesh::MeshGeometry;
    use crate::gfx::scene::vertex::Vertex3D;
    use crate::time::ManualClock;
    use std::path::{Path, PathBuf};

    struct TriangleLoader;

    impl MeshLoader for TriangleLoader {
        fn load(&self, _path: &Path) -> Result<MeshGeometry> {
            Ok(MeshGeometry::new(vec![Vertex3D::default(); 3], vec![0, 1, 2]))
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            window_width: 800,
            window_height: 600,
            window_title: "test".to_string(),
            target_tickrate: 16,
            scene_filename: PathBuf::from("unused.txt"),
        }
    }

    fn app() -> (Application<RecordingSink>, ManualClock) {
        let clock = ManualClock::new(0.0);
        let mut sink = RecordingSink::new();
        let entries = crate::gfx::scene::loader::parse_scene(
            "Revolver 1 0.5 1 0 0 0 1 1 1 revolver.obj\n\
             Chest_Top 2 0.5 1 0 0 0 1 1 1 chest.obj\n",
        )
        .unwrap();
        let scene = Scene::load(
            &entries,
            &SceneAssets::default(),
            &TriangleLoader,
            &mut sink,
            Rc::new(clock.clone()),
        )
        .unwrap();
        (
            Application::new(config(), scene, sink, Rc::new(clock.clone())),
            clock,
        )
    }

    #[test]
    fn test_tick_runs_below_clamp() {
        let (mut app, clock) = app();
        let camera = app.scene().cameras()[0].node;
        let start = app.scene().graph().world_location(camera);

        app.input_mut().on_key_pressed(KeyCode::KeyW);
        clock.advance(0.05);
        assert!(app.tick());
        let moved = app.scene().graph().world_location(camera);
        assert!((moved.z - (start.z + 0.2)).abs() < 1e-4);

        clock.advance(0.5);
        assert!(!app.tick());
        assert_eq!(app.scene().graph().world_location(camera), moved);

        clock.advance(0.05);
        assert!(app.tick());
    }

    #[test]
    fn test_toggle_keys_fire_once_per_press() {
        let (mut app, clock) = app();
        app.input_mut().on_key_pressed(KeyCode::KeyC);
        clock.advance(0.02);
        app.tick();
        clock.advance(0.02);
        app.tick();
        assert!(app.scene().lighting().spotlight_active);
        assert!(!app.input().is_key_pressed(KeyCode::KeyC));
    }

    #[test]
    fn test_camera_keys_and_chord() {
        let (mut app, clock) = app();
        app.input_mut().on_key_pressed(KeyCode::Digit3);
        clock.advance(0.02);
        app.tick();
        assert_eq!(app.scene().active_camera_index(), 2);

        app.input_mut().on_key_pressed(KeyCode::KeyB);
        app.input_mut().on_key_pressed(KeyCode::AltLeft);
        clock.advance(0.02);
        app.tick();
        assert!(app.scene().cameras()[2].movable);
        assert!(!app.input().is_key_pressed(KeyCode::AltLeft));
    }

    #[test]
    fn test_click_picks_with_flipped_y() {
        let (mut app, clock) = app();
        app.backend.set_pick(100, 400, 1);
        app.input_mut().on_mouse_moved(100.0, 200.0);
        app.input_mut().on_mouse_pressed(MouseButton::Left);
        clock.advance(0.02);
        app.tick();

        let revolver = app.scene().find_object_by_name("Revolver").unwrap().node;
        let camera = app.scene().cameras()[0].node;
        assert_eq!(app.scene().graph().parent(revolver), Some(camera));
        assert!(!app.input().is_mouse_pressed(MouseButton::Left));
    }

    #[test]
    fn test_mouse_offset_turns_camera_and_recenters() {
        let (mut app, clock) = app();
        app.input_mut().on_mouse_moved(500.0, 300.0);
        clock.advance(0.05);
        app.tick();
        assert!((app.scene().cameras()[0].yaw() - -5.0).abs() < 1e-4);
        assert_eq!(app.input().cursor(), Vector2::new(400.0, 300.0));
    }

    #[test]
    fn test_render_replaces_previous_frame() {
        let (mut app, _) = app();
        app.render();
        let first = app.backend().commands().len();
        app.render();
        assert_eq!(app.backend().commands().len(), first);
        assert_eq!(app.backend().frames_finished(), 2);
        assert_eq!(
            app.backend().program_sequence(),
            vec!["Eagle", "light"]
        );
    }

    #[test]
    fn test_resize_updates_aspect() {
        let (mut app, _) = app();
        assert!((app.scene().cameras()[1].aspect_ratio() - 800.0 / 600.0).abs() < 1e-6);
        app.resize(1000, 500);
        assert_eq!(app.scene().cameras()[1].aspect_ratio(), 2.0);
        assert_eq!(app.backend().target_size(), Some((1000, 500)));
        app.resize(0, 0);
        assert_eq!(app.input().window_size(), Vector2::new(1000.0, 500.0));
        assert_eq!(app.backend().target_size(), Some((1000, 500)));
    }

    #[test]
    fn test_scheduler_fires_at_interval() {
        let start = Instant::now();
        let mut scheduler = FrameScheduler::new(Duration::from_millis(16), start);
        assert!(!scheduler.poll(start));
        assert!(scheduler.poll(start + Duration::from_millis(16)));
        assert!(!scheduler.poll(start + Duration::from_millis(20)));
        assert!(scheduler.poll(start + Duration::from_millis(40)));
        assert_eq!(scheduler.deadline(), start + Duration::from_millis(56));
    }
}
