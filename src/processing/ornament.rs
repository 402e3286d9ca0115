//! Border and thumbtack placement plus the procedural pin raster.

use image::{Rgba, RgbaImage};

use crate::layout::{FrameRect, FrameStyle};

/// Pixel size of the pin raster; the quad is scaled in world space.
pub const THUMBTACK_RASTER: u32 = 64;

const PIN_COLOR: [f32; 3] = [0.72, 0.16, 0.14];

/// Rectangle behind the print, `border_width` larger on every side.
pub fn border_rect(rect: FrameRect, style: &FrameStyle) -> Option<FrameRect> {
    (style.border_width > 0.0).then(|| FrameRect {
        x: rect.x - style.border_width,
        y: rect.y - style.border_width,
        w: rect.w + 2.0 * style.border_width,
        h: rect.h + 2.0 * style.border_width,
    })
}

pub fn thumbtack_diameter(rect: FrameRect) -> f32 {
    (rect.w.min(rect.h) * 0.04).clamp(8.0, 18.0)
}

/// Centers of the two pins, inset from the top corners.
pub fn thumbtack_centers(rect: FrameRect, style: &FrameStyle) -> Option<[(f32, f32); 2]> {
    if !style.thumbtacks {
        return None;
    }
    let d = thumbtack_diameter(rect);
    let inset = d * 0.9;
    let top = rect.y + rect.h - inset;
    Some([(rect.x + inset, top), (rect.x + rect.w - inset, top)])
}

/// A shaded pin head: a disc with a highlight toward the upper left and a soft edge.
pub fn thumbtack_raster() -> RgbaImage {
    let size = THUMBTACK_RASTER;
    let radius = size as f32 / 2.0;
    let mut img = RgbaImage::new(size, size);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let dx = (x as f32 + 0.5 - radius) / radius;
        let dy = (y as f32 + 0.5 - radius) / radius;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist > 1.0 {
            continue;
        }
        let edge = ((1.0 - dist) * radius / 1.5).clamp(0.0, 1.0);
        let hx = dx + 0.35;
        let hy = dy + 0.35;
        let highlight = (1.0 - (hx * hx + hy * hy).sqrt() * 1.8).clamp(0.0, 1.0);
        let shade = 0.75 + 0.25 * (1.0 - dist);
        let rgb = PIN_COLOR.map(|c| (c * shade + highlight * 0.6).min(1.0));
        *pixel = Rgba([
            (rgb[0] * 255.0).round() as u8,
            (rgb[1] * 255.0).round() as u8,
            (rgb[2] * 255.0).round() as u8,
            (edge * 255.0).round() as u8,
        ]);
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECT: FrameRect = FrameRect {
        x: 0.0,
        y: 0.0,
        w: 300.0,
        h: 200.0,
    };

    #[test]
    fn zero_border_width_disables_border() {
        let style = FrameStyle {
            border_width: 0.0,
            ..FrameStyle::default()
        };
        assert!(border_rect(RECT, &style).is_none());
        let border = border_rect(RECT, &FrameStyle::default()).unwrap();
        assert_eq!((border.x, border.w), (-4.0, 308.0));
    }

    #[test]
    fn thumbtacks_sit_near_top_corners() {
        let [left, right] = thumbtack_centers(RECT, &FrameStyle::default()).unwrap();
        assert!(left.0 < 30.0 && right.0 > 270.0);
        assert!(left.1 > 180.0 && left.1 < 200.0);
        let off = FrameStyle {
            thumbtacks: false,
            ..FrameStyle::default()
        };
        assert!(thumbtack_centers(RECT, &off).is_none());
    }

    #[test]
    fn pin_raster_is_round() {
        let img = thumbtack_raster();
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(img.get_pixel(32, 32)[3], 255);
    }
}
