//! Everything the window shows, minus the GPU.
//!
//! `WallContext` owns the layout, scene, camera, viewport and interaction
//! state. The window layer feeds it input and loader results, hands its
//! outgoing requests to the loader and draws whatever [`WallContext::draw_list`]
//! returns.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use anyhow::Result;
use glam::{Mat4, Vec2};
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::events::{AssetKind, AssetRequest, AssetResult, DecodedImage, Ticket};
use crate::export::LayoutExport;
use crate::layout::{
    FrameRect, LayoutPreset, LayoutRequest, Orientation, OrientationRotation, PhotoPools, PhotoSize,
    PhotoWithSize, Slot, WallConfig, WallSpec, create_wall_config_with,
};
use crate::processing::color::{TONE_SAMPLE_WIDTH, average_color, to_linear};
use crate::processing::cover::full_image_size;
use crate::processing::easing::{ease_in_out_quad, progress};

use super::camera::{CameraPose, CanvasRect, Viewport, WallCamera, fit_zoom};
use super::interaction::{
    ClickAction, DragMode, Interaction, KeyAction, KeyInput, corner_handle_hit, frame_under_pointer,
    pick_frame,
};
use super::scene::{Quad, Scene, TexelFormat, TextureBank, TextureId, TextureUpload, Z_WALL};

const OUTLINE_PX: f32 = 2.0;
const SELECTED_OUTLINE_PX: f32 = 3.0;
const OUTLINE_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 0.6];
const SELECTED_COLOR: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
const HANDLE_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const Z_EDIT_OVERLAY: f32 = 0.5;
const Z_FADE_VEIL: f32 = 0.9;

/// Receives the layout JSON when the HUD copies it.
pub trait Clipboard {
    fn set_text(&mut self, text: String) -> Result<()>;
}

/// Discards everything; used when no system clipboard is available.
#[derive(Debug, Default)]
pub struct NoClipboard;

impl Clipboard for NoClipboard {
    fn set_text(&mut self, _text: String) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorHint {
    Default,
    Move,
    Resize,
}

#[derive(Debug, Clone, PartialEq)]
enum Pending {
    Backdrop,
    Probe { entry: usize },
    FrameTexture { frame: usize, source: String, swap: bool },
}

#[derive(Debug, Clone, Copy)]
struct Backdrop {
    texture: TextureId,
    size: PhotoSize,
    /// Linear wall tone used to tint prints.
    tone: [f32; 3],
}

#[derive(Debug)]
struct ProbeEntry {
    slot: Slot,
    source: String,
    size: Option<Option<PhotoSize>>,
}

/// Snapshot of what to draw this frame.
#[derive(Debug, Clone)]
pub struct DrawList {
    /// Sorted back to front.
    pub quads: Vec<Quad>,
    pub view_proj: Mat4,
    pub canvas: CanvasRect,
    pub clear_color: [f32; 3],
    pub wall_tone: [f32; 3],
    pub tone_strength: f32,
    pub saturation: f32,
}

pub struct WallContext {
    config: Configuration,
    preset: LayoutPreset,
    pools: PhotoPools,
    rotation: OrientationRotation,
    wall: Option<WallConfig>,
    backdrop: Option<Backdrop>,
    probes: Vec<ProbeEntry>,
    scene: Scene,
    camera: WallCamera,
    viewport: Viewport,
    interaction: Interaction,
    bank: TextureBank,
    pending: HashMap<Ticket, Pending>,
    failed_sources: HashSet<String>,
    /// Frame index to the source it rotates to once that photo has loaded.
    rotating: HashMap<usize, String>,
    next_ticket: u64,
    requests: Vec<AssetRequest>,
    fade_start: Option<Instant>,
    clipboard: Box<dyn Clipboard>,
}

impl WallContext {
    pub fn new(config: Configuration, window: Vec2, scale_factor: f32) -> Self {
        let preset = config.layout;
        let pools = config.photo_pools();
        let rotation = OrientationRotation::new(preset.frame_counts());
        let viewport = Viewport::layout(window, scale_factor, window / scale_factor.max(1e-3), &config.viewport);
        let mut ctx = Self {
            preset,
            pools,
            rotation,
            wall: None,
            backdrop: None,
            probes: Vec::new(),
            scene: Scene::new(),
            camera: WallCamera::new(window.x, window.y),
            viewport,
            interaction: Interaction::new(),
            bank: TextureBank::default(),
            pending: HashMap::new(),
            failed_sources: HashSet::new(),
            rotating: HashMap::new(),
            next_ticket: 0,
            requests: Vec::new(),
            fade_start: None,
            clipboard: Box::new(NoClipboard),
            config,
        };
        let backdrop = ctx.config.backdrop_source();
        info!(backdrop = %backdrop, layout = %preset, "requesting backdrop");
        ctx.request(backdrop, AssetKind::Texture, Pending::Backdrop);
        ctx
    }

    pub fn with_clipboard(mut self, clipboard: Box<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn wall_config(&self) -> Option<&WallConfig> {
        self.wall.as_ref()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &WallCamera {
        &self.camera
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn textures(&self) -> &TextureBank {
        &self.bank
    }

    pub fn rotation(&self) -> &OrientationRotation {
        &self.rotation
    }

    pub fn take_requests(&mut self) -> Vec<AssetRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn take_uploads(&mut self) -> Vec<TextureUpload> {
        self.bank.take_uploads()
    }

    pub fn take_releases(&mut self) -> Vec<TextureId> {
        self.bank.take_releases()
    }

    fn request(&mut self, source: String, kind: AssetKind, pending: Pending) {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.pending.insert(ticket, pending);
        self.requests.push(AssetRequest { ticket, source, kind });
    }

    /// Returns false when `source` is known to fail and nothing will arrive.
    fn request_frame_texture(&mut self, frame: usize, source: String, swap: bool) -> bool {
        if self.failed_sources.contains(&source) {
            return false;
        }
        let in_flight = self.pending.values().any(|p| {
            matches!(p, Pending::FrameTexture { frame: f, source: s, .. } if *f == frame && *s == source)
        });
        if !in_flight {
            debug!(frame, source = %source, swap, "requesting frame texture");
            self.request(source.clone(), AssetKind::Texture, Pending::FrameTexture { frame, source, swap });
        }
        true
    }

    pub fn handle_asset(&mut self, result: AssetResult, now: Instant) {
        let Some(pending) = self.pending.remove(&result.ticket()) else {
            debug!(ticket = result.ticket().0, "dropping result for unknown ticket");
            return;
        };
        match (pending, result) {
            (Pending::Backdrop, AssetResult::Decoded { image, .. }) => self.on_backdrop(image, now),
            (Pending::Backdrop, AssetResult::Failed { source, reason, .. }) => {
                warn!(source = %source, reason = %reason, "backdrop failed to load; wall stays blank");
            }
            (Pending::Probe { entry }, AssetResult::Probed { size, .. }) => {
                if let Some(probe) = self.probes.get_mut(entry) {
                    probe.size = Some(size);
                }
                self.maybe_build_wall(now);
            }
            (Pending::FrameTexture { frame, source, swap }, AssetResult::Decoded { image, .. }) => {
                self.on_frame_texture(frame, &source, swap, image, now);
            }
            (Pending::FrameTexture { frame, source, swap }, AssetResult::Failed { reason, .. }) => {
                debug!(frame, source = %source, reason = %reason, "frame keeps its current visual");
                if swap && self.rotating.get(&frame) == Some(&source) {
                    self.rotating.remove(&frame);
                }
                self.failed_sources.insert(source);
            }
            (pending, other) => {
                debug!(?pending, ticket = other.ticket().0, "unexpected asset result");
            }
        }
    }

    fn on_backdrop(&mut self, image: DecodedImage, now: Instant) {
        let size = image.natural;
        let tone = to_linear(average_color(&image.pixels, TONE_SAMPLE_WIDTH));
        let texture = self.bank.upload(image.pixels, TexelFormat::Srgb);
        if let Some(old) = self.backdrop.replace(Backdrop { texture, size, tone }) {
            self.bank.release(old.texture);
        }
        self.camera.set_wall_extents(size.width as f32, size.height as f32);
        self.camera.set_pose(CameraPose::HOME);
        self.relayout();
        info!(
            width = size.width,
            height = size.height,
            canvas_w = self.viewport.canvas.width,
            canvas_h = self.viewport.canvas.height,
            "backdrop ready"
        );

        if !self.config.show_photos {
            self.install_wall(Vec::new(), now);
            return;
        }

        self.probes = self
            .preset
            .slots()
            .into_iter()
            .filter_map(|slot| {
                self.rotation
                    .source_for_slot(slot, &self.pools)
                    .map(|source| ProbeEntry {
                        slot,
                        source: source.to_string(),
                        size: None,
                    })
            })
            .collect();
        for entry in 0..self.probes.len() {
            let source = self.probes[entry].source.clone();
            self.request(source, AssetKind::Probe, Pending::Probe { entry });
        }
        self.maybe_build_wall(now);
    }

    fn maybe_build_wall(&mut self, now: Instant) {
        if self.wall.is_some() || self.probes.iter().any(|p| p.size.is_none()) {
            return;
        }
        let photos = self
            .probes
            .iter()
            .map(|p| PhotoWithSize {
                source: p.source.clone(),
                size: p.size.flatten(),
                is_landscape: p.slot.orientation == Orientation::Landscape,
            })
            .collect();
        self.install_wall(photos, now);
    }

    fn install_wall(&mut self, photos: Vec<PhotoWithSize>, now: Instant) {
        let Some(backdrop) = self.backdrop else {
            return;
        };
        let wall = WallSpec {
            image_source: self.config.backdrop_source(),
            width: backdrop.size.width as f32,
            height: backdrop.size.height as f32,
        };
        let placeholder = self.config.placeholder_source();
        let mut config = create_wall_config_with(LayoutRequest {
            wall,
            photos: &photos,
            preset: self.preset,
            style: self.config.frame_style,
            placeholder: &placeholder,
        });
        if !self.config.show_photos {
            config.frames.clear();
        }
        info!(frames = config.frames.len(), layout = %self.preset, "wall configured");
        self.wall = Some(config);
        self.rebuild_scene();
        self.fade_start = Some(now);
    }

    fn rebuild_scene(&mut self) {
        let Some(config) = &self.wall else {
            return;
        };
        let needs = self.scene.rebuild(config, &mut self.bank);
        let loads: Vec<(usize, String)> = needs
            .into_iter()
            .map(|idx| (idx, config.frames[idx].image_source.clone()))
            .collect();
        self.interaction.clamp_selection(config.frames.len());
        for (idx, source) in loads {
            self.request_frame_texture(idx, source, false);
        }
    }

    fn on_frame_texture(&mut self, frame: usize, source: &str, swap: bool, image: DecodedImage, now: Instant) {
        let expected = if swap {
            self.rotating.get(&frame).map(String::as_str)
        } else {
            self.wall
                .as_ref()
                .and_then(|w| w.frames.get(frame))
                .map(|f| f.image_source.as_str())
        };
        if expected != Some(source) {
            debug!(frame, source = %source, "discarding stale frame texture");
            return;
        }
        if swap {
            self.rotating.remove(&frame);
            let Some(spec) = self.wall.as_mut().and_then(|w| w.frames.get_mut(frame)) else {
                return;
            };
            spec.image_source = source.to_string();
            self.scene.set_source(frame, source);
        }
        let natural = image.natural;
        let texture = self.bank.upload(image.pixels, TexelFormat::Srgb);
        if swap {
            self.scene
                .swap_texture(frame, texture, natural, now, self.config.animation.crossfade, &mut self.bank);
        } else {
            self.scene.set_image(frame, texture, natural, &mut self.bank);
        }
        debug!(frame, width = natural.width, height = natural.height, swap, "frame texture attached");
    }

    pub fn resize(&mut self, window: Vec2, scale_factor: f32) {
        self.viewport = self.layout_for(window, scale_factor);
        debug!(
            window_w = window.x,
            window_h = window.y,
            canvas_w = self.viewport.canvas.width,
            canvas_h = self.viewport.canvas.height,
            "viewport resized"
        );
    }

    fn relayout(&mut self) {
        self.viewport = self.layout_for(self.viewport.window, self.viewport.scale_factor);
    }

    fn layout_for(&self, window: Vec2, scale_factor: f32) -> Viewport {
        let wall = match self.backdrop {
            Some(b) => Vec2::new(b.size.width as f32, b.size.height as f32),
            None => window / scale_factor.max(1e-3),
        };
        Viewport::layout(window, scale_factor, wall, &self.config.viewport)
    }

    fn hit_test(&self, pointer: Vec2, now: Instant) -> Option<usize> {
        let ndc = self.viewport.ndc_from_screen(pointer)?;
        let ray = self.camera.ray_from_ndc(ndc);
        pick_frame(&ray, self.scene.image_quads(now))
    }

    fn to_screen(&self) -> impl Fn(Vec2) -> Vec2 + '_ {
        move |world| self.viewport.world_to_screen(&self.camera, world)
    }

    pub fn pointer_pressed(&mut self, pointer: Vec2) {
        if !self.interaction.is_editing() {
            return;
        }
        let Some(config) = &self.wall else {
            return;
        };
        let rects: Vec<FrameRect> = config.frames.iter().map(|f| f.rect()).collect();
        let selected = self.interaction.selected();
        let target = match rects.get(selected) {
            Some(rect) if corner_handle_hit(*rect, pointer, self.to_screen()) => {
                Some((DragMode::Resize, selected))
            }
            _ => frame_under_pointer(&rects, pointer, self.to_screen()).map(|idx| (DragMode::Move, idx)),
        };
        if let Some((mode, idx)) = target {
            debug!(frame = idx, ?mode, "drag started");
            self.interaction.begin_drag(mode, idx, pointer, rects[idx]);
        }
    }

    pub fn pointer_moved(&mut self, pointer: Vec2) {
        let Some(drag) = self.interaction.drag().copied() else {
            return;
        };
        let pixel_delta = pointer - drag.start_pointer;
        let world_delta = self.viewport.screen_delta_to_world(&self.camera, pixel_delta);
        let rect = drag.apply(pixel_delta, world_delta);
        if let Some(frame) = self.wall.as_mut().and_then(|w| w.frames.get_mut(drag.frame_index)) {
            frame.set_rect(rect);
            self.rebuild_scene();
        }
    }

    pub fn pointer_released(&mut self, pointer: Vec2, now: Instant) {
        if let Some(drag) = self.interaction.end_drag() {
            debug!(frame = drag.frame_index, mode = ?drag.mode, "drag ended");
            return;
        }
        if self.wall.is_none() || self.viewport.ndc_from_screen(pointer).is_none() {
            return;
        }
        let hit = self.hit_test(pointer, now);
        let action = self.interaction.click(hit);
        debug!(?hit, ?action, "click");
        match action {
            ClickAction::Ignored => {}
            ClickAction::ZoomIn { frame } => self.zoom_into(frame, now),
            ClickAction::ZoomOut { frame } => {
                self.scene.set_full_image(frame, false, now, self.config.animation.morph);
                self.zoom_home(now);
            }
            ClickAction::Switch { from, to } => {
                self.scene.set_full_image(from, false, now, self.config.animation.morph);
                self.zoom_into(to, now);
            }
            ClickAction::AdvanceRotation => self.advance_rotation(),
        }
    }

    fn zoom_into(&mut self, frame: usize, now: Instant) {
        let Some(spec) = self.wall.as_ref().and_then(|w| w.frames.get(frame)) else {
            self.interaction.reset_view();
            return;
        };
        let (cx, cy) = spec.center();
        let (fw, fh) = match self.scene.frame(frame).and_then(|f| f.natural()) {
            Some(natural) => full_image_size(natural, spec.w, spec.h),
            None => (spec.w, spec.h),
        };
        let view = self.camera.wall_extents();
        let zoom = fit_zoom(view.x, view.y, fw, fh);
        self.scene.set_full_image(frame, true, now, self.config.animation.morph);
        self.camera
            .animate_to(CameraPose::new(cx, cy, zoom), self.config.animation.camera, now);
        info!(frame, zoom, "zooming into frame");
    }

    fn zoom_home(&mut self, now: Instant) {
        self.camera.animate_to(CameraPose::HOME, self.config.animation.camera, now);
    }

    /// Frames keep their current source until the rotated photo has loaded.
    fn advance_rotation(&mut self) {
        self.rotation.advance(&self.pools);
        let slots = self.preset.slots();
        let mut swaps = Vec::new();
        if let Some(config) = &self.wall {
            for (idx, frame) in config.frames.iter().enumerate() {
                let Some(slot) = slots.get(idx) else {
                    continue;
                };
                let Some(next) = self.rotation.source_for_slot(*slot, &self.pools) else {
                    continue;
                };
                if next == frame.image_source {
                    self.rotating.remove(&idx);
                } else {
                    swaps.push((idx, next.to_string()));
                }
            }
        }
        info!(
            landscape = ?self.rotation.indices(Orientation::Landscape),
            portrait = ?self.rotation.indices(Orientation::Portrait),
            swaps = swaps.len(),
            "rotation advanced"
        );
        for (idx, source) in swaps {
            if self.request_frame_texture(idx, source.clone(), true) {
                self.rotating.insert(idx, source);
            } else {
                debug!(frame = idx, source = %source, "rotation skips a photo that failed to load");
                self.rotating.remove(&idx);
            }
        }
    }

    pub fn key(&mut self, key: KeyInput, shift: bool, now: Instant) {
        let frame_count = self.wall.as_ref().map_or(0, |w| w.frames.len());
        let action = self.interaction.key(key, shift, frame_count);
        if action != KeyAction::None {
            debug!(?key, ?action, "key");
        }
        match action {
            KeyAction::None | KeyAction::EntryChanged | KeyAction::Select(_) => {}
            KeyAction::OpenEditing => info!("editing HUD opened"),
            KeyAction::CloseEditing => info!("editing HUD closed"),
            KeyAction::ZoomOut { unmorph } => {
                if let Some(frame) = unmorph {
                    self.scene.set_full_image(frame, false, now, self.config.animation.morph);
                }
                self.zoom_home(now);
            }
            KeyAction::Edit { frame, op } => {
                if let Some(spec) = self.wall.as_mut().and_then(|w| w.frames.get_mut(frame)) {
                    let rect = op.apply(spec.rect());
                    spec.set_rect(rect);
                    self.rebuild_scene();
                }
            }
            KeyAction::CopyExport => self.copy_export(),
        }
    }

    fn copy_export(&mut self) {
        let Some(config) = &self.wall else {
            return;
        };
        let export = LayoutExport::from_config(config);
        let json = match export.to_json() {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "layout export failed");
                return;
            }
        };
        match self.clipboard.set_text(json) {
            Ok(()) => info!(canvas = %export.canvas, frames = export.frames.len(), "layout copied to clipboard"),
            Err(err) => debug!(error = %err, "clipboard unavailable"),
        }
    }

    /// Advance animations. Returns true while anything is still moving.
    pub fn tick(&mut self, now: Instant) -> bool {
        let camera = self.camera.tick(now);
        let scene = self.scene.tick(now, &mut self.bank);
        camera || scene || self.fade_opacity(now) < 1.0
    }

    fn fade_opacity(&self, now: Instant) -> f32 {
        match self.fade_start {
            Some(start) => ease_in_out_quad(progress(start, self.config.animation.fade_in, now)),
            None => 0.0,
        }
    }

    pub fn cursor(&self) -> CursorHint {
        match self.interaction.drag().map(|d| d.mode) {
            Some(DragMode::Move) => CursorHint::Move,
            Some(DragMode::Resize) => CursorHint::Resize,
            None => CursorHint::Default,
        }
    }

    pub fn title(&self) -> String {
        match (&self.wall, self.interaction.is_editing()) {
            (Some(config), true) => self.interaction.hud_text(&config.frames),
            (None, true) => "editing: loading wall".to_string(),
            _ => format!("museum wall: {}", self.preset),
        }
    }

    pub fn draw_list(&self, now: Instant) -> DrawList {
        let clear_color = self.config.rendering.clear_color_linear();
        let mut quads = Vec::new();
        let tone = self.backdrop.map(|b| b.tone).unwrap_or([1.0; 3]);

        if let Some(backdrop) = self.backdrop {
            let wall = self.camera.wall_extents();
            quads.push(Quad::textured(Vec2::ZERO, wall, Z_WALL, backdrop.texture));
            self.scene.draw(now, &mut quads);
            if self.interaction.is_editing() {
                self.editing_overlay(&mut quads);
            }
            let veil = 1.0 - self.fade_opacity(now);
            if veil > 0.0 {
                let pose = self.camera.pose();
                let [r, g, b] = clear_color;
                quads.push(Quad::flat(
                    Vec2::new(pose.x, pose.y),
                    self.camera.view_extents(),
                    Z_FADE_VEIL,
                    [r, g, b, veil],
                ));
            }
        }
        quads.sort_by(|a, b| a.z.total_cmp(&b.z));

        DrawList {
            quads,
            view_proj: self.camera.view_projection(),
            canvas: self.viewport.canvas,
            clear_color,
            wall_tone: tone,
            tone_strength: self.config.rendering.tone_strength,
            saturation: self.config.rendering.saturation,
        }
    }

    fn editing_overlay(&self, out: &mut Vec<Quad>) {
        let Some(config) = &self.wall else {
            return;
        };
        let px = self.camera.view_extents().x / self.viewport.canvas.width.max(1.0);
        let selected = self.interaction.selected();
        for (idx, frame) in config.frames.iter().enumerate() {
            let rect = frame.rect();
            let (thickness, color) = if idx == selected {
                (SELECTED_OUTLINE_PX * px, SELECTED_COLOR)
            } else {
                (OUTLINE_PX * px, OUTLINE_COLOR)
            };
            push_outline(out, rect, thickness, color, Z_EDIT_OVERLAY + idx as f32 * 1e-4);
            if idx == selected {
                let handle = Vec2::splat(super::interaction::HANDLE_PX * px);
                for corner in [
                    Vec2::new(rect.x, rect.y),
                    Vec2::new(rect.x + rect.w, rect.y),
                    Vec2::new(rect.x, rect.y + rect.h),
                    Vec2::new(rect.x + rect.w, rect.y + rect.h),
                ] {
                    out.push(Quad::flat(corner, handle, Z_EDIT_OVERLAY + 0.01, HANDLE_COLOR));
                }
            }
        }
    }

    /// Release every texture; the context is unusable for drawing afterwards.
    pub fn teardown(&mut self) {
        self.scene.release_all(&mut self.bank);
        if let Some(backdrop) = self.backdrop.take() {
            self.bank.release(backdrop.texture);
        }
        self.bank.release_all();
        self.pending.clear();
        self.rotating.clear();
        self.requests.clear();
        info!("wall context torn down");
    }
}

fn push_outline(out: &mut Vec<Quad>, rect: FrameRect, t: f32, color: [f32; 4], z: f32) {
    let cx = rect.x + rect.w / 2.0;
    let cy = rect.y + rect.h / 2.0;
    out.push(Quad::flat(Vec2::new(cx, rect.y), Vec2::new(rect.w + t, t), z, color));
    out.push(Quad::flat(Vec2::new(cx, rect.y + rect.h), Vec2::new(rect.w + t, t), z, color));
    out.push(Quad::flat(Vec2::new(rect.x, cy), Vec2::new(t, rect.h + t), z, color));
    out.push(Quad::flat(Vec2::new(rect.x + rect.w, cy), Vec2::new(t, rect.h + t), z, color));
}
