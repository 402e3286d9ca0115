//! Soft drop shadow rasters for pinned prints.
//!
//! The print hangs from its two top corners, so the bottom edge sags away from
//! the wall. The shadow is a crescent under the bottom edge: thin at the
//! corners, thickest in the middle. A faint halo surrounds the whole print.

use image::{Rgba, RgbaImage, imageops};
use lyon::math::point;
use lyon::path::Path;
use lyon::tessellation::{BuffersBuilder, FillOptions, FillTessellator, FillVertex, VertexBuffers};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Alpha of the crescent before blurring.
const CRESCENT_ALPHA: f32 = 0.55;
const MAX_JITTER: f32 = 0.03;
/// Longest side of a shadow raster. Larger prints get a lower-resolution
/// raster stretched over the same world-space quad.
pub const MAX_SHADOW_RASTER: u32 = 1024;

/// Pixel metrics of a frame's shadow raster.
///
/// `pad` and `blur` are in world units; `scale` maps world units to raster pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowGeometry {
    pub pad: u32,
    pub blur: u32,
    pub raster_width: u32,
    pub raster_height: u32,
    pub scale: f32,
    pub variation: f32,
}

impl ShadowGeometry {
    pub fn for_frame(w: f32, h: f32, frame_index: usize) -> Self {
        let min_side = w.min(h);
        let pad = ((min_side * 0.025).round() as u32).max(12);
        let blur = ((min_side * 0.08).round() as u32).max(24);
        let (qw, qh) = (w + 2.0 * pad as f32, h + 2.0 * pad as f32);
        let scale = (MAX_SHADOW_RASTER as f32 / qw.max(qh)).min(1.0);
        let raster_side = |len: f32| ((len * scale).round() as u32).clamp(2, MAX_SHADOW_RASTER);
        Self {
            pad,
            blur,
            raster_width: raster_side(qw),
            raster_height: raster_side(qh),
            scale,
            variation: variation_for(frame_index),
        }
    }

    /// World-space size of the shadow quad, centered on the frame.
    pub fn quad_size(&self, w: f32, h: f32) -> (f32, f32) {
        (w + 2.0 * self.pad as f32, h + 2.0 * self.pad as f32)
    }

    fn crescent_blur_sigma(&self) -> f32 {
        (self.blur as f32 * 0.4).min(3.0) * self.scale
    }
}

/// `0.8 + index * 0.1` plus a small jitter seeded by the index, so a frame's
/// shadow is stable across rebuilds.
pub fn variation_for(frame_index: usize) -> f32 {
    let mut rng = StdRng::seed_from_u64(frame_index as u64);
    0.8 + frame_index as f32 * 0.1 + rng.random_range(-MAX_JITTER..=MAX_JITTER)
}

/// Rasterise the shadow for a `w x h` print. Pixels are black; only alpha varies.
pub fn render_shadow(w: f32, h: f32, frame_index: usize, ambient_opacity: f32) -> RgbaImage {
    let geometry = ShadowGeometry::for_frame(w, h, frame_index);
    let (rw, rh) = (geometry.raster_width, geometry.raster_height);
    let s = geometry.scale;
    let pad = geometry.pad as f32 * s;
    let len = rw as usize * rh as usize;

    let mut halo = vec![0f32; len];
    if ambient_opacity > 0.0 {
        fill_rect(&mut halo, rw, rh, pad, pad, pad + w * s, pad + h * s, ambient_opacity.min(1.0));
        halo = blur_alpha(&halo, rw, rh, pad / 2.0);
    }

    let mut crescent = vec![0f32; len];
    for [a, b, c] in crescent_triangles(w, h, geometry.pad as f32, geometry.variation, s) {
        fill_triangle(&mut crescent, rw, rh, a, b, c, CRESCENT_ALPHA);
    }
    let crescent = blur_alpha(&crescent, rw, rh, geometry.crescent_blur_sigma());

    let mut out = RgbaImage::new(rw, rh);
    for (pixel, (h_alpha, c_alpha)) in out.pixels_mut().zip(halo.iter().zip(crescent.iter())) {
        let a = c_alpha + h_alpha * (1.0 - c_alpha);
        *pixel = Rgba([0, 0, 0, (a * 255.0).round().clamp(0.0, 255.0) as u8]);
    }
    out
}

/// Crescent outline in world units, mapped to raster pixels by `scale`.
fn crescent_path(w: f32, h: f32, pad: f32, variation: f32, scale: f32) -> Path {
    let left = pad;
    let right = pad + w;
    let bottom = pad + h;
    let bow = (w * 0.015).min(10.0) * variation;
    let edge = 0.5 * variation;
    let at = |x: f32, y: f32| point(x * scale, y * scale);

    let mut builder = Path::builder();
    builder.begin(at(left, bottom));
    builder.cubic_bezier_to(
        at(left + w * 0.25, bottom + bow * 0.7),
        at(right - w * 0.25, bottom + bow * 0.7),
        at(right, bottom),
    );
    builder.cubic_bezier_to(
        at(right - w * 0.25, bottom + bow * 1.5),
        at(left + w * 0.25, bottom + bow * 1.5),
        at(left, bottom + edge),
    );
    builder.close();
    builder.build()
}

fn crescent_triangles(w: f32, h: f32, pad: f32, variation: f32, scale: f32) -> Vec<[[f32; 2]; 3]> {
    let path = crescent_path(w, h, pad, variation, scale);
    let mut buffers: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
    let result = FillTessellator::new().tessellate_path(
        &path,
        &FillOptions::tolerance(0.1),
        &mut BuffersBuilder::new(&mut buffers, |v: FillVertex| v.position().to_array()),
    );
    if let Err(err) = result {
        tracing::debug!(error = ?err, "shadow tessellation failed");
        return Vec::new();
    }
    buffers
        .indices
        .chunks_exact(3)
        .map(|tri| {
            [
                buffers.vertices[tri[0] as usize],
                buffers.vertices[tri[1] as usize],
                buffers.vertices[tri[2] as usize],
            ]
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn fill_rect(buf: &mut [f32], w: u32, h: u32, x0: f32, y0: f32, x1: f32, y1: f32, alpha: f32) {
    let xs = (x0.floor().max(0.0) as u32)..(x1.ceil().min(w as f32) as u32);
    let ys = (y0.floor().max(0.0) as u32)..(y1.ceil().min(h as f32) as u32);
    for y in ys {
        for x in xs.clone() {
            buf[y as usize * w as usize + x as usize] = alpha;
        }
    }
}

fn fill_triangle(buf: &mut [f32], w: u32, h: u32, a: [f32; 2], b: [f32; 2], c: [f32; 2], alpha: f32) {
    let min_x = a[0].min(b[0]).min(c[0]).floor().max(0.0) as u32;
    let max_x = a[0].max(b[0]).max(c[0]).ceil().min(w as f32) as u32;
    let min_y = a[1].min(b[1]).min(c[1]).floor().max(0.0) as u32;
    let max_y = a[1].max(b[1]).max(c[1]).ceil().min(h as f32) as u32;
    let area = edge(a, b, c);
    if area.abs() <= f32::EPSILON {
        return;
    }
    for y in min_y..max_y {
        for x in min_x..max_x {
            let p = [x as f32 + 0.5, y as f32 + 0.5];
            let w0 = edge(b, c, p) / area;
            let w1 = edge(c, a, p) / area;
            let w2 = edge(a, b, p) / area;
            if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                buf[y as usize * w as usize + x as usize] = alpha;
            }
        }
    }
}

fn edge(a: [f32; 2], b: [f32; 2], p: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

fn blur_alpha(alpha: &[f32], w: u32, h: u32, sigma: f32) -> Vec<f32> {
    if sigma <= 0.25 {
        return alpha.to_vec();
    }
    let mut img = RgbaImage::new(w, h);
    for (pixel, a) in img.pixels_mut().zip(alpha) {
        let v = (a * 255.0).round().clamp(0.0, 255.0) as u8;
        *pixel = Rgba([0, 0, 0, v]);
    }
    imageops::blur(&img, sigma)
        .pixels()
        .map(|p| p[3] as f32 / 255.0)
        .collect()
}
