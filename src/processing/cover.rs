use crate::layout::PhotoSize;

/// Texture-coordinate mapping `uv' = uv * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvTransform {
    pub scale: [f32; 2],
    pub offset: [f32; 2],
}

impl UvTransform {
    pub const IDENTITY: Self = Self {
        scale: [1.0, 1.0],
        offset: [0.0, 0.0],
    };
}

impl Default for UvTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Crop the centered sub-rectangle of the image that fills a `frame_w x frame_h`
/// quad without distortion. Unknown sizes sample the whole image.
pub fn cover_uv(image: Option<PhotoSize>, frame_w: f32, frame_h: f32) -> UvTransform {
    let Some(image) = image else {
        return UvTransform::IDENTITY;
    };
    if frame_w <= 0.0 || frame_h <= 0.0 {
        return UvTransform::IDENTITY;
    }
    let ia = image.aspect();
    let fa = frame_w / frame_h;
    if ia > fa {
        let scale = fa / ia;
        UvTransform {
            scale: [scale, 1.0],
            offset: [(1.0 - scale) / 2.0, 0.0],
        }
    } else {
        let scale = ia / fa;
        UvTransform {
            scale: [1.0, scale],
            offset: [0.0, (1.0 - scale) / 2.0],
        }
    }
}

/// Size of the uncropped image fitted inside the frame's box.
pub fn full_image_size(image: PhotoSize, frame_w: f32, frame_h: f32) -> (f32, f32) {
    let ia = image.aspect();
    let fa = frame_w / frame_h;
    if ia > fa {
        (frame_w, frame_w / ia)
    } else {
        (frame_h * ia, frame_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn wide_image_in_square_frame_crops_horizontally() {
        let uv = cover_uv(Some(PhotoSize::new(200, 100)), 100.0, 100.0);
        assert!(approx(uv.scale[0], 0.5));
        assert!(approx(uv.scale[1], 1.0));
        assert!(approx(uv.offset[0], 0.25));
        assert!(approx(uv.offset[1], 0.0));
    }

    #[test]
    fn tall_image_crops_vertically() {
        let uv = cover_uv(Some(PhotoSize::new(100, 400)), 100.0, 200.0);
        assert!(approx(uv.scale[0], 1.0));
        assert!(approx(uv.scale[1], 0.5));
        assert!(approx(uv.offset[1], 0.25));
    }

    #[test]
    fn matching_aspect_is_identity_and_unknown_size_too() {
        assert_eq!(cover_uv(Some(PhotoSize::new(300, 200)), 150.0, 100.0), UvTransform::IDENTITY);
        assert_eq!(cover_uv(None, 150.0, 100.0), UvTransform::IDENTITY);
    }

    #[test]
    fn full_image_size_fits_inside_box() {
        let (w, h) = full_image_size(PhotoSize::new(200, 100), 100.0, 100.0);
        assert!(approx(w, 100.0) && approx(h, 50.0));
        let (w, h) = full_image_size(PhotoSize::new(100, 200), 100.0, 100.0);
        assert!(approx(w, 50.0) && approx(h, 100.0));
    }
}
