pub mod camera;
pub mod context;
pub mod gpu;
pub mod interaction;
pub mod scene;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use glam::Vec2;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    keyboard::{Key, ModifiersState, NamedKey},
    window::{CursorIcon, Window, WindowAttributes},
};

use crate::config::Configuration;
use crate::events::{AssetRequest, AssetResult, WallEvent};
use crate::tasks::loader::AssetSink;

use context::{Clipboard, CursorHint, WallContext};
use gpu::{FrameOutcome, WallRenderer};
use interaction::KeyInput;

impl AssetSink for EventLoopProxy<WallEvent> {
    fn deliver(&self, result: AssetResult) -> bool {
        self.send_event(WallEvent::Asset(result)).is_ok()
    }
}

/// System clipboard, opened on first use and kept alive so the copied text
/// stays available on platforms where the owner must outlive the copy.
#[derive(Default)]
struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: String) -> Result<()> {
        let clipboard = match self.inner.take() {
            Some(clipboard) => clipboard,
            None => arboard::Clipboard::new()?,
        };
        self.inner.insert(clipboard).set_text(text)?;
        Ok(())
    }
}

/// Shows a drag cursor for as long as it lives.
struct CursorGuard {
    window: Arc<Window>,
    hint: CursorHint,
}

impl CursorGuard {
    fn new(window: Arc<Window>, hint: CursorHint) -> Self {
        let icon = match hint {
            CursorHint::Move => CursorIcon::Move,
            CursorHint::Resize => CursorIcon::NwseResize,
            CursorHint::Default => CursorIcon::Default,
        };
        window.set_cursor(icon);
        Self { window, hint }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.window.set_cursor(CursorIcon::Default);
    }
}

fn map_key(key: &Key) -> Option<KeyInput> {
    match key {
        Key::Named(NamedKey::Escape) => Some(KeyInput::Escape),
        Key::Named(NamedKey::Tab) => Some(KeyInput::Tab),
        Key::Named(NamedKey::Enter) => Some(KeyInput::Enter),
        Key::Named(NamedKey::Backspace) => Some(KeyInput::Backspace),
        Key::Named(NamedKey::ArrowLeft) => Some(KeyInput::Left),
        Key::Named(NamedKey::ArrowRight) => Some(KeyInput::Right),
        Key::Named(NamedKey::ArrowUp) => Some(KeyInput::Up),
        Key::Named(NamedKey::ArrowDown) => Some(KeyInput::Down),
        Key::Character(text) => text.chars().next().map(KeyInput::Char),
        _ => None,
    }
}

struct WallApp {
    cfg: Configuration,
    cancel: CancellationToken,
    to_loader: UnboundedSender<AssetRequest>,
    window: Option<Arc<Window>>,
    renderer: Option<WallRenderer>,
    context: Option<WallContext>,
    modifiers: ModifiersState,
    pointer: Vec2,
    cursor: Option<CursorGuard>,
    title: String,
}

impl WallApp {
    fn new(cfg: Configuration, cancel: CancellationToken, to_loader: UnboundedSender<AssetRequest>) -> Self {
        Self {
            cfg,
            cancel,
            to_loader,
            window: None,
            renderer: None,
            context: None,
            modifiers: ModifiersState::empty(),
            pointer: Vec2::ZERO,
            cursor: None,
            title: String::new(),
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let attrs = WindowAttributes::default()
            .with_title("Museum Wall")
            .with_inner_size(LogicalSize::new(1200.0, 900.0));
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create wall window");
                None
            }
        }
    }

    fn init(&mut self, window: Arc<Window>) -> Result<()> {
        let renderer = WallRenderer::new(window.clone(), &self.cfg.rendering)?;
        let size = window.inner_size();
        let context = WallContext::new(
            self.cfg.clone(),
            Vec2::new(size.width as f32, size.height as f32),
            window.scale_factor() as f32,
        )
        .with_clipboard(Box::new(SystemClipboard::default()));
        self.renderer = Some(renderer);
        self.context = Some(context);
        self.flush_requests();
        Ok(())
    }

    fn flush_requests(&mut self) {
        let Some(context) = self.context.as_mut() else {
            return;
        };
        for request in context.take_requests() {
            if self.to_loader.send(request).is_err() {
                debug!("loader stopped; dropping asset request");
            }
        }
    }

    fn handle_resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        let scale_factor = self.window.as_ref().map_or(1.0, |w| w.scale_factor()) as f32;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.resize(new_size);
        }
        if let Some(context) = self.context.as_mut() {
            context.resize(
                Vec2::new(new_size.width as f32, new_size.height as f32),
                scale_factor,
            );
        }
    }

    fn sync_chrome(&mut self) {
        let (Some(window), Some(context)) = (self.window.as_ref(), self.context.as_ref()) else {
            return;
        };
        let title = context.title();
        if title != self.title {
            window.set_title(&title);
            if context.interaction().is_editing() {
                info!(hud = %title, "editing");
            }
            self.title = title;
        }
        let hint = context.cursor();
        let current = self.cursor.as_ref().map_or(CursorHint::Default, |c| c.hint);
        if current != hint {
            self.cursor = None;
            self.cursor = (hint != CursorHint::Default).then(|| CursorGuard::new(window.clone(), hint));
        }
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(renderer), Some(context)) = (self.renderer.as_mut(), self.context.as_mut()) else {
            return;
        };
        let now = Instant::now();
        context.tick(now);
        renderer.sync_textures(context.take_uploads(), context.take_releases());
        let list = context.draw_list(now);
        if let FrameOutcome::Fatal = renderer.render(&list) {
            error!("renderer cannot continue; exiting");
            self.shutdown(event_loop);
            return;
        }
        self.sync_chrome();
        self.flush_requests();
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.cancel.cancel();
        self.cursor = None;
        if let Some(mut context) = self.context.take() {
            context.teardown();
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.sync_textures(Vec::new(), context.take_releases());
            }
        }
        self.renderer = None;
        event_loop.exit();
    }
}

impl ApplicationHandler<WallEvent> for WallApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        let Some(window) = self.ensure_window(event_loop) else {
            event_loop.exit();
            return;
        };

        if self.renderer.is_none() {
            if let Err(err) = self.init(window.clone()) {
                error!(error = ?err, "failed to initialize GPU state");
                event_loop.exit();
                return;
            }
        }

        window.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("wall window close requested");
                self.shutdown(event_loop);
            }
            WindowEvent::Resized(new_size) => self.handle_resize(new_size),
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let size = window.inner_size();
                if let Err(err) = inner_size_writer.request_inner_size(size) {
                    debug!(error = %err, "window kept its scaled size");
                }
                self.handle_resize(size);
            }
            WindowEvent::ModifiersChanged(modifiers) => self.modifiers = modifiers.state(),
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer = Vec2::new(position.x as f32, position.y as f32);
                if let Some(context) = self.context.as_mut() {
                    context.pointer_moved(self.pointer);
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                if let Some(context) = self.context.as_mut() {
                    match state {
                        ElementState::Pressed => context.pointer_pressed(self.pointer),
                        ElementState::Released => context.pointer_released(self.pointer, Instant::now()),
                    }
                }
                self.flush_requests();
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                let shift = self.modifiers.shift_key();
                if let (Some(key), Some(context)) = (map_key(&event.logical_key), self.context.as_mut()) {
                    context.key(key, shift, Instant::now());
                }
            }
            WindowEvent::RedrawRequested => self.draw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: WallEvent) {
        match event {
            WallEvent::Asset(result) => {
                if let Some(context) = self.context.as_mut() {
                    context.handle_asset(result, Instant::now());
                }
                self.flush_requests();
            }
            WallEvent::Shutdown => {
                info!("wall received shutdown event");
                self.shutdown(event_loop);
            }
        }
    }
}

pub fn event_loop() -> Result<EventLoop<WallEvent>> {
    EventLoop::<WallEvent>::with_user_event()
        .build()
        .context("failed to build wall event loop")
}

/// Run the wall window on the calling thread until it closes or `cancel` fires.
pub fn run_windowed(
    event_loop: EventLoop<WallEvent>,
    cfg: Configuration,
    to_loader: UnboundedSender<AssetRequest>,
    cancel: CancellationToken,
) -> Result<()> {
    let proxy = event_loop.create_proxy();
    let cancel_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            if proxy.send_event(WallEvent::Shutdown).is_err() {
                debug!("event loop already closed; shutdown not delivered");
            }
        })
    };

    let mut app = WallApp::new(cfg, cancel, to_loader);
    let run_result = event_loop.run_app(&mut app);
    cancel_task.abort();

    run_result.context("wall event loop failed")
}
