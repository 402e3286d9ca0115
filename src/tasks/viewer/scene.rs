//! Retained per-frame visuals and the textures they reference.
//!
//! Nothing here touches the GPU. Texture creation and destruction are queued
//! on a [`TextureBank`] and applied by the renderer before the next draw.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use glam::Vec2;
use image::RgbaImage;
use tracing::debug;

use crate::layout::{FrameRect, FrameStyle, PhotoSize, WallConfig};
use crate::processing::cover::{UvTransform, cover_uv, full_image_size};
use crate::processing::easing::{ease_in_out_quad, progress};
use crate::processing::ornament::{border_rect, thumbtack_centers, thumbtack_diameter, thumbtack_raster};
use crate::processing::shadow::{ShadowGeometry, render_shadow};

pub const Z_STEP: f32 = 0.01;
pub const Z_SHADOW: f32 = 0.0;
pub const Z_BORDER: f32 = 0.001;
pub const Z_IMAGE: f32 = 0.002;
pub const Z_OVERLAY: f32 = Z_IMAGE + 0.0002;
pub const Z_TACKS: f32 = 0.003;
/// The backdrop sits behind every frame.
pub const Z_WALL: f32 = -1.0;

/// Linear-space `#cccccc`, drawn until a frame's photo arrives.
const PLACEHOLDER_COLOR: [f32; 4] = [0.604, 0.604, 0.604, 1.0];
const BORDER_COLOR: [f32; 4] = [0.92, 0.91, 0.88, 1.0];

pub fn frame_z(frame_index: usize) -> f32 {
    frame_index as f32 * Z_STEP
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

impl TextureId {
    /// A 1x1 opaque white texture owned by the renderer.
    pub const WHITE: Self = Self(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexelFormat {
    /// Photos and the backdrop.
    Srgb,
    /// Generated alpha masks.
    Linear,
}

#[derive(Debug)]
pub struct TextureUpload {
    pub id: TextureId,
    pub image: RgbaImage,
    pub format: TexelFormat,
}

/// Allocates texture ids and queues uploads and releases for the renderer.
#[derive(Debug)]
pub struct TextureBank {
    next: u32,
    live: HashSet<TextureId>,
    uploads: Vec<TextureUpload>,
    releases: Vec<TextureId>,
}

impl Default for TextureBank {
    fn default() -> Self {
        Self {
            next: TextureId::WHITE.0 + 1,
            live: HashSet::new(),
            uploads: Vec::new(),
            releases: Vec::new(),
        }
    }
}

impl TextureBank {
    pub fn upload(&mut self, image: RgbaImage, format: TexelFormat) -> TextureId {
        let id = TextureId(self.next);
        self.next += 1;
        self.live.insert(id);
        self.uploads.push(TextureUpload { id, image, format });
        id
    }

    pub fn release(&mut self, id: TextureId) {
        if id != TextureId::WHITE && self.live.remove(&id) {
            self.releases.push(id);
        }
    }

    pub fn is_live(&self, id: TextureId) -> bool {
        id == TextureId::WHITE || self.live.contains(&id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn take_uploads(&mut self) -> Vec<TextureUpload> {
        std::mem::take(&mut self.uploads)
    }

    pub fn take_releases(&mut self) -> Vec<TextureId> {
        std::mem::take(&mut self.releases)
    }

    pub fn release_all(&mut self) {
        let ids: Vec<TextureId> = self.live.drain().collect();
        self.releases.extend(ids);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shading {
    /// Texture times colour.
    Flat,
    /// Print look: slight desaturation and a tint toward the wall tone.
    Photo,
}

/// One textured rectangle in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub center: Vec2,
    pub size: Vec2,
    pub z: f32,
    pub texture: TextureId,
    pub uv: UvTransform,
    /// Straight-alpha multiplier; alpha carries opacity.
    pub color: [f32; 4],
    pub shading: Shading,
}

impl Quad {
    pub fn flat(center: Vec2, size: Vec2, z: f32, color: [f32; 4]) -> Self {
        Self {
            center,
            size,
            z,
            texture: TextureId::WHITE,
            uv: UvTransform::IDENTITY,
            color,
            shading: Shading::Flat,
        }
    }

    pub fn textured(center: Vec2, size: Vec2, z: f32, texture: TextureId) -> Self {
        Self {
            center,
            size,
            z,
            texture,
            uv: UvTransform::IDENTITY,
            color: [1.0; 4],
            shading: Shading::Flat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ShadowKey {
    w: u32,
    h: u32,
    frame_index: usize,
    opacity: u32,
}

#[derive(Debug, Clone, Copy)]
struct ShadowTexture {
    id: TextureId,
    key: ShadowKey,
    size: Vec2,
}

#[derive(Debug, Clone, Copy)]
struct Crossfade {
    texture: TextureId,
    natural: PhotoSize,
    start: Instant,
    duration: Duration,
}

impl Crossfade {
    fn opacity(&self, now: Instant) -> f32 {
        ease_in_out_quad(progress(self.start, self.duration, now))
    }
}

#[derive(Debug, Clone, Copy)]
struct SizeTween {
    from: Vec2,
    to: Vec2,
    start: Instant,
    duration: Duration,
}

impl SizeTween {
    fn at(&self, now: Instant) -> Vec2 {
        let t = ease_in_out_quad(progress(self.start, self.duration, now));
        self.from.lerp(self.to, t)
    }
}

#[derive(Debug)]
pub struct FrameVisual {
    rect: FrameRect,
    source: String,
    shadow: Option<ShadowTexture>,
    texture: Option<TextureId>,
    natural: Option<PhotoSize>,
    overlay: Option<Crossfade>,
    show_full: bool,
    size: Vec2,
    morph: Option<SizeTween>,
}

impl FrameVisual {
    pub fn rect(&self) -> FrameRect {
        self.rect
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.rect.x + self.rect.w / 2.0, self.rect.y + self.rect.h / 2.0)
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    /// Natural size of the displayed photo, once it has loaded.
    pub fn natural(&self) -> Option<PhotoSize> {
        self.natural
    }

    pub fn shows_full_image(&self) -> bool {
        self.show_full
    }

    pub fn is_crossfading(&self) -> bool {
        self.overlay.is_some()
    }

    pub fn is_morphing(&self) -> bool {
        self.morph.is_some()
    }

    /// Image quad size at `now`, mid-morph included.
    pub fn image_size(&self, now: Instant) -> Vec2 {
        self.morph.map(|m| m.at(now)).unwrap_or(self.size)
    }

    fn target_size(&self, show_full: bool) -> Vec2 {
        match (show_full, self.natural) {
            (true, Some(natural)) => {
                let (w, h) = full_image_size(natural, self.rect.w, self.rect.h);
                Vec2::new(w, h)
            }
            _ => Vec2::new(self.rect.w, self.rect.h),
        }
    }

    fn uv_for(&self, natural: Option<PhotoSize>) -> UvTransform {
        if self.show_full {
            UvTransform::IDENTITY
        } else {
            cover_uv(natural, self.rect.w, self.rect.h)
        }
    }

    fn release(self, bank: &mut TextureBank) {
        if let Some(shadow) = self.shadow {
            bank.release(shadow.id);
        }
        if let Some(tex) = self.texture {
            bank.release(tex);
        }
        if let Some(overlay) = self.overlay {
            bank.release(overlay.texture);
        }
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    frames: Vec<FrameVisual>,
    style: FrameStyle,
    thumbtack: Option<TextureId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[FrameVisual] {
        &self.frames
    }

    pub fn frame(&self, idx: usize) -> Option<&FrameVisual> {
        self.frames.get(idx)
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Regenerate every frame's visuals for `config`.
    ///
    /// Loaded photos survive when the frame keeps its source; shadow rasters
    /// survive when the frame keeps its size. Returns the indices of frames that
    /// now need their photo loaded.
    pub fn rebuild(&mut self, config: &WallConfig, bank: &mut TextureBank) -> Vec<usize> {
        self.style = config.frame_style;
        if self.style.thumbtacks && self.thumbtack.is_none() {
            self.thumbtack = Some(bank.upload(thumbtack_raster(), TexelFormat::Srgb));
        }

        let mut previous: Vec<Option<FrameVisual>> =
            std::mem::take(&mut self.frames).into_iter().map(Some).collect();
        let mut needs_texture = Vec::new();

        for (idx, spec) in config.frames.iter().enumerate() {
            let prev = previous.get_mut(idx).and_then(Option::take);
            let key = ShadowKey {
                w: spec.w.to_bits(),
                h: spec.h.to_bits(),
                frame_index: idx,
                opacity: config.frame_style.shadow_opacity.to_bits(),
            };

            let mut visual = FrameVisual {
                rect: spec.rect(),
                source: spec.image_source.clone(),
                shadow: None,
                texture: None,
                natural: None,
                overlay: None,
                show_full: false,
                size: Vec2::new(spec.w, spec.h),
                morph: None,
            };

            if let Some(mut prev) = prev {
                match prev.shadow.take() {
                    Some(shadow) if shadow.key == key => visual.shadow = Some(shadow),
                    Some(shadow) => bank.release(shadow.id),
                    None => {}
                }
                if prev.source == spec.image_source {
                    visual.texture = prev.texture.take();
                    visual.natural = prev.natural.take();
                    visual.overlay = prev.overlay.take();
                    visual.show_full = prev.show_full;
                    visual.morph = prev.morph.take();
                }
                prev.release(bank);
            }

            if visual.shadow.is_none() {
                let raster = render_shadow(spec.w, spec.h, idx, config.frame_style.shadow_opacity);
                let (sw, sh) = ShadowGeometry::for_frame(spec.w, spec.h, idx).quad_size(spec.w, spec.h);
                visual.shadow = Some(ShadowTexture {
                    id: bank.upload(raster, TexelFormat::Linear),
                    key,
                    size: Vec2::new(sw, sh),
                });
            }
            if visual.texture.is_none() && visual.overlay.is_none() {
                needs_texture.push(idx);
            }
            visual.size = visual.target_size(visual.show_full);
            if let Some(morph) = &mut visual.morph {
                morph.to = visual.size;
            }
            self.frames.push(visual);
        }

        for stale in previous.into_iter().flatten() {
            stale.release(bank);
        }
        debug!(
            frames = self.frames.len(),
            to_load = needs_texture.len(),
            "scene rebuilt"
        );
        needs_texture
    }

    /// Attach the first photo of a frame without a transition.
    pub fn set_image(
        &mut self,
        idx: usize,
        texture: TextureId,
        natural: PhotoSize,
        bank: &mut TextureBank,
    ) {
        let Some(frame) = self.frames.get_mut(idx) else {
            bank.release(texture);
            return;
        };
        if let Some(old) = frame.texture.replace(texture) {
            bank.release(old);
        }
        frame.natural = Some(natural);
        frame.size = frame.target_size(frame.show_full);
    }

    /// Fade a new photo in over the current one.
    pub fn swap_texture(
        &mut self,
        idx: usize,
        texture: TextureId,
        natural: PhotoSize,
        now: Instant,
        duration: Duration,
        bank: &mut TextureBank,
    ) {
        let Some(frame) = self.frames.get_mut(idx) else {
            bank.release(texture);
            return;
        };
        if frame.texture.is_none() {
            self.set_image(idx, texture, natural, bank);
            return;
        }
        let fade = Crossfade {
            texture,
            natural,
            start: now,
            duration,
        };
        if let Some(pending) = frame.overlay.replace(fade) {
            bank.release(pending.texture);
        }
    }

    /// Rebind a frame to a new source; its current photo stays until the new one arrives.
    pub fn set_source(&mut self, idx: usize, source: &str) {
        if let Some(frame) = self.frames.get_mut(idx) {
            frame.source = source.to_string();
        }
    }

    /// Switch a frame between cover crop and the whole photo, animating its size.
    /// Returns false when the photo's size is not known yet.
    pub fn set_full_image(&mut self, idx: usize, show: bool, now: Instant, duration: Duration) -> bool {
        let Some(frame) = self.frames.get_mut(idx) else {
            return false;
        };
        if frame.natural.is_none() {
            return false;
        }
        let from = frame.image_size(now);
        frame.show_full = show;
        let to = frame.target_size(show);
        frame.size = to;
        frame.morph = (!duration.is_zero() && from != to).then_some(SizeTween {
            from,
            to,
            start: now,
            duration,
        });
        true
    }

    /// Finish elapsed crossfades and morphs. Returns true while any is running.
    pub fn tick(&mut self, now: Instant, bank: &mut TextureBank) -> bool {
        let mut animating = false;
        for frame in &mut self.frames {
            if let Some(fade) = frame.overlay {
                if progress(fade.start, fade.duration, now) >= 1.0 {
                    if let Some(old) = frame.texture.replace(fade.texture) {
                        bank.release(old);
                    }
                    frame.natural = Some(fade.natural);
                    frame.overlay = None;
                    frame.size = frame.target_size(frame.show_full);
                    if let Some(morph) = &mut frame.morph {
                        morph.to = frame.size;
                    }
                } else {
                    animating = true;
                }
            }
            if let Some(morph) = frame.morph {
                if progress(morph.start, morph.duration, now) >= 1.0 {
                    frame.morph = None;
                } else {
                    animating = true;
                }
            }
        }
        animating
    }

    /// Center, size and z of each image quad, for hit testing.
    pub fn image_quads(&self, now: Instant) -> impl Iterator<Item = (usize, Vec2, Vec2, f32)> + '_ {
        self.frames
            .iter()
            .enumerate()
            .map(move |(idx, f)| (idx, f.center(), f.image_size(now), frame_z(idx) + Z_IMAGE))
    }

    /// Append every frame's quads to `out`, unsorted.
    pub fn draw(&self, now: Instant, out: &mut Vec<Quad>) {
        for (idx, frame) in self.frames.iter().enumerate() {
            let base_z = frame_z(idx);
            let center = frame.center();

            if let Some(shadow) = frame.shadow {
                out.push(Quad::textured(center, shadow.size, base_z + Z_SHADOW, shadow.id));
            }
            if let Some(border) = border_rect(frame.rect, &self.style) {
                out.push(Quad::flat(
                    Vec2::new(border.x + border.w / 2.0, border.y + border.h / 2.0),
                    Vec2::new(border.w, border.h),
                    base_z + Z_BORDER,
                    BORDER_COLOR,
                ));
            }

            let size = frame.image_size(now);
            match frame.texture {
                Some(texture) => out.push(Quad {
                    center,
                    size,
                    z: base_z + Z_IMAGE,
                    texture,
                    uv: frame.uv_for(frame.natural),
                    color: [1.0; 4],
                    shading: Shading::Photo,
                }),
                None => out.push(Quad::flat(center, size, base_z + Z_IMAGE, PLACEHOLDER_COLOR)),
            }
            if let Some(fade) = frame.overlay {
                out.push(Quad {
                    center,
                    size,
                    z: base_z + Z_OVERLAY,
                    texture: fade.texture,
                    uv: frame.uv_for(Some(fade.natural)),
                    color: [1.0, 1.0, 1.0, fade.opacity(now)],
                    shading: Shading::Photo,
                });
            }

            if let (Some(tack), Some(centers)) = (self.thumbtack, thumbtack_centers(frame.rect, &self.style)) {
                let d = thumbtack_diameter(frame.rect);
                for (x, y) in centers {
                    out.push(Quad::textured(Vec2::new(x, y), Vec2::splat(d), base_z + Z_TACKS, tack));
                }
            }
        }
    }

    pub fn release_all(&mut self, bank: &mut TextureBank) {
        for frame in self.frames.drain(..) {
            frame.release(bank);
        }
        if let Some(tack) = self.thumbtack.take() {
            bank.release(tack);
        }
    }
}
