//! Event loop, frame driver and application lifecycle.
//!
//! [`RenderLoop`] is the per-frame contract independent of any window: each
//! [`RenderLoop::tick`] first advances the orbit controls and then draws the
//! scene into a [`FrameTarget`]. [`App`] wires it into winit: it passes the
//! compatibility gate, builds the scene, issues the model load and forwards
//! the load result back into the loop as a [`FlowEvent`].

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::StreamExt;
use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

use crate::{
    camera::{Camera, OrbitControls, Projection},
    compat::{self, Capability},
    config::ViewerConfig,
    context::{Context, ContextError},
    data_structures::scene_graph::{LoadOutcome, SceneGraph},
    resources::{self, AssetSource, LoadError, LoadedModel},
    setup,
};

/// Something a frame can be drawn into: the window surface, or an off-screen texture in tests.
pub trait FrameTarget {
    type Error: std::fmt::Display;

    fn draw(
        &mut self,
        scene: &SceneGraph,
        camera: &Camera,
        projection: &Projection,
    ) -> Result<(), Self::Error>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Drawn,
    /// The stop handle was triggered; nothing was drawn.
    Stopped,
}

/// Requests the render loop to end. The next frame observes it and draws nothing.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct RenderLoop {
    pub camera: Camera,
    pub projection: Projection,
    pub controls: OrbitControls,
    stop: StopHandle,
    frames: u64,
}

impl RenderLoop {
    pub fn new(config: &ViewerConfig, (width, height): (u32, u32), stop: StopHandle) -> Self {
        let camera = Camera::new(config.camera_position, config.orbit_target);
        let projection = Projection::new(
            width.max(1),
            height.max(1),
            config.fovy,
            config.znear,
            config.zfar,
        );
        let mut controls = OrbitControls::new(config.orbit_target);
        if let Some(speed) = config.auto_rotate_speed {
            controls = controls.with_auto_rotate(speed);
        }
        controls.set_viewport_height(height.max(1));
        Self {
            camera,
            projection,
            controls,
            stop,
            frames: 0,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Frames drawn so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.projection.resize(width, height);
        self.controls.set_viewport_height(height);
    }

    /// One frame: controls update, then draw. Does nothing once stopped.
    pub fn tick<T: FrameTarget>(
        &mut self,
        dt: Duration,
        scene: &SceneGraph,
        target: &mut T,
    ) -> Result<FrameStatus, T::Error> {
        if self.stop.is_stopped() {
            return Ok(FrameStatus::Stopped);
        }
        self.controls.update(&mut self.camera, dt);
        target.draw(scene, &self.camera, &self.projection)?;
        self.frames += 1;
        Ok(FrameStatus::Drawn)
    }
}

pub struct AppState {
    pub ctx: Context,
    pub scene: SceneGraph,
    pub driver: RenderLoop,
}

impl AppState {
    async fn new(
        window: Arc<Window>,
        config: &ViewerConfig,
        stop: StopHandle,
    ) -> Result<Self, ContextError> {
        let size = window.inner_size();
        let driver = RenderLoop::new(config, (size.width, size.height), stop);
        let ctx = Context::new(window, config, &driver.camera, &driver.projection).await?;
        Ok(Self {
            ctx,
            scene: setup::build_scene(),
            driver,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
        self.driver.resize(width, height);
    }
}

pub enum FlowEvent {
    /// Context creation finished in `spawn_local`.
    #[cfg(target_arch = "wasm32")]
    Initialized(Result<Box<AppState>, ContextError>),
    ModelLoaded(Result<LoadedModel, LoadError>),
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: winit::event_loop::EventLoopProxy<FlowEvent>,
    config: ViewerConfig,
    stop: StopHandle,
    state: Option<AppState>,
    last_time: Instant,
}

impl App {
    fn new(
        event_loop: &EventLoop<FlowEvent>,
        config: ViewerConfig,
        stop: StopHandle,
    ) -> std::io::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            config,
            stop,
            state: None,
            last_time: Instant::now(),
        })
    }

    /// Takes over a fully initialized state and issues the single model load.
    fn start(&mut self, mut state: AppState) {
        let size = state.ctx.window.inner_size();
        state.resize(size.width, size.height);
        state.ctx.window.request_redraw();
        self.state = Some(state);
        self.last_time = Instant::now();
        self.spawn_model_load();
    }

    fn spawn_model_load(&self) {
        let source = AssetSource::new(self.config.asset_root.clone());
        let path = self.config.model_path.clone();
        let proxy = self.proxy.clone();
        let (progress_tx, mut progress_rx) = futures::channel::mpsc::unbounded();

        log::info!("loading model {}", path);
        let load = async move {
            let result = resources::load_model_gltf(&source, &path, Some(progress_tx)).await;
            if proxy.send_event(FlowEvent::ModelLoaded(result)).is_err() {
                log::warn!("event loop closed before {} finished loading", path);
            }
        };
        let report = async move {
            while let Some(fraction) = progress_rx.next().await {
                log::debug!("model loading: {:.0}%", fraction * 100.0);
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            self.async_runtime.spawn(load);
            self.async_runtime.spawn(report);
        }
        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(load);
            wasm_bindgen_futures::spawn_local(report);
        }
    }

    /// Drops all GPU state before leaving the loop.
    fn teardown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.take() {
            log::info!("shutting down after {} frames", state.driver.frames());
        }
        event_loop.exit();
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        #[allow(unused_mut)]
        let mut window_attributes =
            Window::default_attributes().with_title(self.config.window_title.clone());

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowAttributesExtWebSys;

            // Nothing is created when the page cannot render at all
            if let Capability::Unsupported(message) = compat::probe() {
                compat::show_diagnostic(&message, &self.config.container_id);
                return;
            }
            let canvas = web_sys::window()
                .and_then(|win| win.document())
                .and_then(|doc| doc.get_element_by_id(&self.config.canvas_id));
            match canvas {
                Some(canvas) => {
                    window_attributes = window_attributes.with_canvas(Some(canvas.unchecked_into()));
                }
                None => {
                    log::error!("no canvas with id {:?}", self.config.canvas_id);
                    return;
                }
            }
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let config = self.config.clone();
        let stop = self.stop.clone();
        let init_future = async move { AppState::new(window, &config, stop).await };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let result = self.async_runtime.block_on(init_future);
            let capability = match &result {
                Ok(_) => compat::probe(),
                Err(e) => {
                    log::error!("{}", e);
                    Capability::unsupported()
                }
            };
            let container_id = self.config.container_id.clone();
            let started = compat::gate(
                capability,
                || result.ok().map(|state| self.start(state)),
                |message| compat::show_diagnostic(message, &container_id),
            );
            if !matches!(started, Some(Some(()))) {
                event_loop.exit();
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = init_future.await.map(Box::new);
                if proxy.send_event(FlowEvent::Initialized(result)).is_err() {
                    log::error!("event loop closed during initialization");
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            #[cfg(target_arch = "wasm32")]
            FlowEvent::Initialized(result) => {
                // This is the message from our wasm `spawn_local`
                let capability = match &result {
                    Ok(_) => Capability::Supported,
                    Err(e) => {
                        log::error!("{}", e);
                        Capability::unsupported()
                    }
                };
                let container_id = self.config.container_id.clone();
                compat::gate(
                    capability,
                    || result.ok().map(|state| self.start(*state)),
                    |message| compat::show_diagnostic(message, &container_id),
                );
            }
            FlowEvent::ModelLoaded(result) => match &mut self.state {
                Some(state) => {
                    if let LoadOutcome::Attached(id) =
                        state.scene.attach_loaded(result, &self.config.model_placement)
                    {
                        log::debug!("scene now holds {} entities (model at {})", state.scene.len(), id.index());
                    }
                }
                None => log::warn!("model finished loading after shutdown"),
            },
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        state.driver.controls.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                self.stop.stop();
                self.teardown(event_loop);
            }
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                match state.driver.tick(dt, &state.scene, &mut state.ctx) {
                    Ok(FrameStatus::Drawn) => (),
                    Ok(FrameStatus::Stopped) => self.teardown(event_loop),
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                        state.ctx.window.request_redraw();
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("out of memory, stopping");
                        self.stop.stop();
                        self.teardown(event_loop);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                        state.ctx.window.request_redraw();
                    }
                }
            }
            _ => (),
        }
    }
}

/// Opens the viewer and blocks until its window is closed.
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    run_with_stop(config, StopHandle::new())
}

/// Like [`run`], but the loop also ends once `stop` is triggered.
pub fn run_with_stop(config: ViewerConfig, stop: StopHandle) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config, stop)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
