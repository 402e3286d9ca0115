use std::str::FromStr;

use image::{RgbaImage, imageops};
use palette::{LinSrgb, Srgb};

/// Width the backdrop is reduced to before its tone is averaged.
pub const TONE_SAMPLE_WIDTH: u32 = 64;

/// Alpha-weighted mean colour of `img`, sampled at `sample_width` pixels wide.
/// Channels are sRGB-encoded in `[0, 1]`.
pub fn average_color(img: &RgbaImage, sample_width: u32) -> [f32; 3] {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return [0.5, 0.5, 0.5];
    }
    let sample_w = sample_width.clamp(1, w);
    let sample_h = ((h as f64 * sample_w as f64 / w as f64).round() as u32).max(1);
    let sample = if sample_w == w && sample_h == h {
        img.clone()
    } else {
        imageops::resize(img, sample_w, sample_h, imageops::FilterType::Triangle)
    };

    let mut accum = [0f64; 3];
    let mut total = 0f64;
    for pixel in sample.pixels() {
        let alpha = pixel[3] as f64 / 255.0;
        if alpha <= 0.0 {
            continue;
        }
        total += alpha;
        for c in 0..3 {
            accum[c] += pixel[c] as f64 * alpha;
        }
    }
    if total <= f64::EPSILON {
        return [0.5, 0.5, 0.5];
    }
    [
        (accum[0] / (255.0 * total)) as f32,
        (accum[1] / (255.0 * total)) as f32,
        (accum[2] / (255.0 * total)) as f32,
    ]
}

/// Convert an sRGB-encoded colour to the linear space the shader blends in.
pub fn to_linear(rgb: [f32; 3]) -> [f32; 3] {
    let lin: LinSrgb<f32> = Srgb::new(rgb[0], rgb[1], rgb[2]).into_linear();
    [lin.red, lin.green, lin.blue]
}

/// Parse `#rrggbb` into linear RGB.
pub fn parse_hex_color(input: &str) -> Option<[f32; 3]> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let rgb = Srgb::<u8>::from_str(trimmed).ok()?;
    let rgb: Srgb<f32> = rgb.into_format();
    Some(to_linear([rgb.red, rgb.green, rgb.blue]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn uniform_image_averages_to_its_colour() {
        let img = RgbaImage::from_pixel(640, 480, Rgba([255, 0, 51, 255]));
        let avg = average_color(&img, TONE_SAMPLE_WIDTH);
        assert!((avg[0] - 1.0).abs() < 1e-3);
        assert!(avg[1].abs() < 1e-3);
        assert!((avg[2] - 0.2).abs() < 1e-3);
    }

    #[test]
    fn transparent_pixels_are_ignored() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, Rgba([255, 255, 255, 255]));
        let avg = average_color(&img, TONE_SAMPLE_WIDTH);
        assert!(avg.iter().all(|c| (*c - 1.0).abs() < 1e-3));
    }

    #[test]
    fn hex_colours_parse_to_linear() {
        let white = parse_hex_color("#ffffff").unwrap();
        assert!(white.iter().all(|c| (*c - 1.0).abs() < 1e-4));
        let gray = parse_hex_color("#333333").unwrap();
        assert!(gray[0] > 0.02 && gray[0] < 0.05);
        assert!(parse_hex_color("not a colour").is_none());
    }
}
