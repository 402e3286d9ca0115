//! Orthographic wall camera, tweened moves and the canvas viewport.

use std::time::{Duration, Instant};

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::config::ViewportOptions;
use crate::processing::easing::{lerp, progress, smoothstep};

/// Fraction of the view a zoomed frame may fill.
pub const FIT_MARGIN: f32 = 0.9;
pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 8.0;

const EYE_Z: f32 = 10.0;
const NEAR: f32 = 0.1;
const FAR: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub x: f32,
    pub y: f32,
    pub zoom: f32,
}

impl CameraPose {
    pub const HOME: Self = Self {
        x: 0.0,
        y: 0.0,
        zoom: 1.0,
    };

    pub const fn new(x: f32, y: f32, zoom: f32) -> Self {
        Self { x, y, zoom }
    }

    fn lerp(self, to: Self, t: f32) -> Self {
        Self {
            x: lerp(self.x, to.x, t),
            y: lerp(self.y, to.y, t),
            zoom: lerp(self.zoom, to.zoom, t),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CameraTween {
    token: u64,
    start: Instant,
    duration: Duration,
    from: CameraPose,
    to: CameraPose,
}

/// A camera whose zoom-1 frustum is exactly the wall.
#[derive(Debug, Clone)]
pub struct WallCamera {
    half_width: f32,
    half_height: f32,
    pose: CameraPose,
    token: u64,
    tween: Option<CameraTween>,
}

impl WallCamera {
    pub fn new(wall_width: f32, wall_height: f32) -> Self {
        Self {
            half_width: wall_width.max(1.0) / 2.0,
            half_height: wall_height.max(1.0) / 2.0,
            pose: CameraPose::HOME,
            token: 0,
            tween: None,
        }
    }

    pub fn set_wall_extents(&mut self, wall_width: f32, wall_height: f32) {
        self.half_width = wall_width.max(1.0) / 2.0;
        self.half_height = wall_height.max(1.0) / 2.0;
    }

    /// Full wall size, the view extents at zoom 1.
    pub fn wall_extents(&self) -> Vec2 {
        Vec2::new(self.half_width * 2.0, self.half_height * 2.0)
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    /// Jump without animating; any running tween is abandoned.
    pub fn set_pose(&mut self, pose: CameraPose) {
        self.token += 1;
        self.tween = None;
        self.pose = pose;
    }

    pub fn target(&self) -> CameraPose {
        self.tween.map(|t| t.to).unwrap_or(self.pose)
    }

    /// Start a move from the current pose. Supersedes any move in progress.
    pub fn animate_to(&mut self, to: CameraPose, duration: Duration, now: Instant) -> u64 {
        self.token += 1;
        self.tween = Some(CameraTween {
            token: self.token,
            start: now,
            duration,
            from: self.pose,
            to,
        });
        self.token
    }

    /// Advance the running move. Returns true while one is still active.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(tween) = self.tween else {
            return false;
        };
        if tween.token != self.token {
            self.tween = None;
            return false;
        }
        let t = progress(tween.start, tween.duration, now);
        if t >= 1.0 {
            self.pose = tween.to;
            self.tween = None;
            return false;
        }
        self.pose = tween.from.lerp(tween.to, smoothstep(t));
        true
    }

    /// Visible world size at the current zoom.
    pub fn view_extents(&self) -> Vec2 {
        self.wall_extents() / self.pose.zoom.max(f32::EPSILON)
    }

    pub fn view_projection(&self) -> Mat4 {
        let zoom = self.pose.zoom.max(f32::EPSILON);
        let hw = self.half_width / zoom;
        let hh = self.half_height / zoom;
        let proj = Mat4::orthographic_rh(-hw, hw, -hh, hh, NEAR, FAR);
        let view = Mat4::from_translation(Vec3::new(-self.pose.x, -self.pose.y, -EYE_Z));
        proj * view
    }

    /// World-space ray through an NDC point: origin on the near plane, pointing into the wall.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let inv = self.view_projection().inverse();
        let near = inv * Vec4::new(ndc.x, ndc.y, 0.0, 1.0);
        let far = inv * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
        let near = near.truncate() / near.w;
        let far = far.truncate() / far.w;
        let direction = (far - near).normalize_or_zero();
        Ray {
            origin: near,
            direction: if direction == Vec3::ZERO { Vec3::NEG_Z } else { direction },
        }
    }

    pub fn world_to_ndc(&self, world: Vec2) -> Vec2 {
        let clip = self.view_projection() * Vec4::new(world.x, world.y, 0.0, 1.0);
        Vec2::new(clip.x, clip.y) / clip.w
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Distance along the ray to the plane `z = plane_z`, if in front of the origin.
    pub fn hit_plane_z(&self, plane_z: f32) -> Option<(f32, Vec3)> {
        if self.direction.z.abs() <= f32::EPSILON {
            return None;
        }
        let t = (plane_z - self.origin.z) / self.direction.z;
        (t >= 0.0).then(|| (t, self.origin + self.direction * t))
    }
}

/// Zoom at which a `fw x fh` frame fills [`FIT_MARGIN`] of the view.
pub fn fit_zoom(view_w: f32, view_h: f32, fw: f32, fh: f32) -> f32 {
    let zx = view_w / (fw / FIT_MARGIN);
    let zy = view_h / (fh / FIT_MARGIN);
    let z = zx.min(zy);
    if z.is_finite() {
        z.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        MIN_ZOOM
    }
}

/// Scale that fits the wall into the available box without enlarging it.
pub fn display_scale(avail_w: f32, max_h: f32, wall_w: f32, wall_h: f32) -> f32 {
    if wall_w <= 0.0 || wall_h <= 0.0 {
        return 1.0;
    }
    (avail_w / wall_w).min(max_h / wall_h).min(1.0).max(0.0)
}

/// On-screen rectangle the wall is drawn in, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CanvasRect {
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Window size in physical pixels.
    pub window: Vec2,
    pub scale_factor: f32,
    pub display_scale: f32,
    pub canvas: CanvasRect,
}

impl Viewport {
    pub fn layout(window: Vec2, scale_factor: f32, wall: Vec2, opts: &ViewportOptions) -> Self {
        let scale_factor = if scale_factor > 0.0 { scale_factor } else { 1.0 };
        let logical = window / scale_factor;
        let avail_w = logical.x.min(opts.max_width);
        let max_h = opts.max_height_for(logical.y);
        let scale = display_scale(avail_w, max_h, wall.x, wall.y);
        let cw = (wall.x * scale).round().max(1.0) * scale_factor;
        let ch = (wall.y * scale).round().max(1.0) * scale_factor;
        Self {
            window,
            scale_factor,
            display_scale: scale,
            canvas: CanvasRect {
                x: ((window.x - cw) / 2.0).max(0.0).floor(),
                y: ((window.y - ch) / 2.0).max(0.0).floor(),
                width: cw,
                height: ch,
            },
        }
    }

    /// A viewport whose canvas is exactly `width x height` at the window origin.
    pub fn fixed(width: f32, height: f32) -> Self {
        Self {
            window: Vec2::new(width, height),
            scale_factor: 1.0,
            display_scale: 1.0,
            canvas: CanvasRect {
                x: 0.0,
                y: 0.0,
                width,
                height,
            },
        }
    }

    /// NDC of a window pixel, or `None` outside the canvas.
    pub fn ndc_from_screen(&self, screen: Vec2) -> Option<Vec2> {
        if !self.canvas.contains(screen) || self.canvas.width <= 0.0 || self.canvas.height <= 0.0 {
            return None;
        }
        let u = (screen.x - self.canvas.x) / self.canvas.width;
        let v = (screen.y - self.canvas.y) / self.canvas.height;
        Some(Vec2::new(u * 2.0 - 1.0, 1.0 - v * 2.0))
    }

    pub fn screen_from_ndc(&self, ndc: Vec2) -> Vec2 {
        Vec2::new(
            self.canvas.x + (ndc.x + 1.0) * 0.5 * self.canvas.width,
            self.canvas.y + (1.0 - ndc.y) * 0.5 * self.canvas.height,
        )
    }

    pub fn world_to_screen(&self, camera: &WallCamera, world: Vec2) -> Vec2 {
        self.screen_from_ndc(camera.world_to_ndc(world))
    }

    pub fn screen_to_world(&self, camera: &WallCamera, screen: Vec2) -> Option<Vec2> {
        let ndc = self.ndc_from_screen(screen)?;
        let ray = camera.ray_from_ndc(ndc);
        Some(ray.origin.truncate())
    }

    /// World displacement for a pointer move of `delta` pixels.
    pub fn screen_delta_to_world(&self, camera: &WallCamera, delta: Vec2) -> Vec2 {
        let view = camera.view_extents();
        Vec2::new(
            delta.x / self.canvas.width.max(1.0) * view.x,
            -delta.y / self.canvas.height.max(1.0) * view.y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn tween_eases_and_snaps() {
        let now = Instant::now();
        let mut cam = WallCamera::new(2000.0, 1000.0);
        cam.animate_to(CameraPose::new(100.0, 50.0, 2.0), Duration::from_millis(500), now);
        assert!(cam.tick(now + Duration::from_millis(250)));
        let mid = cam.pose();
        assert!(approx(mid.x, 50.0) && approx(mid.zoom, 1.5));
        assert!(!cam.tick(now + Duration::from_millis(500)));
        assert_eq!(cam.pose(), CameraPose::new(100.0, 50.0, 2.0));
    }

    #[test]
    fn later_move_supersedes_earlier() {
        let now = Instant::now();
        let mut cam = WallCamera::new(2000.0, 1000.0);
        let first = cam.animate_to(CameraPose::new(300.0, 0.0, 4.0), Duration::from_millis(550), now);
        cam.tick(now + Duration::from_millis(100));
        let second = cam.animate_to(CameraPose::HOME, Duration::from_millis(550), now + Duration::from_millis(100));
        assert!(second > first);
        while cam.tick(now + Duration::from_secs(2)) {}
        assert_eq!(cam.pose(), CameraPose::HOME);
    }

    #[test]
    fn fit_zoom_clamps() {
        assert!(approx(fit_zoom(2000.0, 1000.0, 200.0, 100.0), 9.0_f32.min(8.0)));
        assert!(approx(fit_zoom(2000.0, 1000.0, 900.0, 450.0), 2.0));
        assert_eq!(fit_zoom(2000.0, 1000.0, 3000.0, 3000.0), 1.0);
    }

    #[test]
    fn display_scale_never_enlarges() {
        assert_eq!(display_scale(1000.0, 900.0, 500.0, 300.0), 1.0);
        assert!(approx(display_scale(1000.0, 700.0, 2000.0, 1000.0), 0.5));
        assert!(approx(display_scale(1000.0, 300.0, 2000.0, 1000.0), 0.3));
    }

    #[test]
    fn viewport_letterboxes_canvas() {
        let opts = ViewportOptions::default();
        let vp = Viewport::layout(Vec2::new(1600.0, 1000.0), 1.0, Vec2::new(2000.0, 1000.0), &opts);
        assert!(approx(vp.display_scale, 0.5));
        assert!(approx(vp.canvas.width, 1000.0) && approx(vp.canvas.height, 500.0));
        assert!(approx(vp.canvas.x, 300.0) && approx(vp.canvas.y, 250.0));
    }

    #[test]
    fn screen_and_world_round_trip() {
        let cam = WallCamera::new(2000.0, 1000.0);
        let vp = Viewport::fixed(1000.0, 500.0);
        let center = vp.screen_to_world(&cam, Vec2::new(500.0, 250.0)).unwrap();
        assert!(approx(center.x, 0.0) && approx(center.y, 0.0));
        let corner = vp.screen_to_world(&cam, Vec2::new(0.0, 0.0)).unwrap();
        assert!(approx(corner.x, -1000.0) && approx(corner.y, 500.0));
        let back = vp.world_to_screen(&cam, Vec2::new(-1000.0, 500.0));
        assert!(approx(back.x, 0.0) && approx(back.y, 0.0));
        assert!(vp.ndc_from_screen(Vec2::new(1200.0, 10.0)).is_none());
    }

    #[test]
    fn pixel_delta_scales_with_zoom() {
        let mut cam = WallCamera::new(2000.0, 1000.0);
        let vp = Viewport::fixed(1000.0, 500.0);
        let d = vp.screen_delta_to_world(&cam, Vec2::new(100.0, 0.0));
        assert!(approx(d.x, 200.0) && approx(d.y, 0.0));
        cam.set_pose(CameraPose::new(0.0, 0.0, 2.0));
        let d = vp.screen_delta_to_world(&cam, Vec2::new(100.0, -50.0));
        assert!(approx(d.x, 100.0) && approx(d.y, 50.0));
    }

    #[test]
    fn rays_travel_into_the_wall() {
        let cam = WallCamera::new(2000.0, 1000.0);
        let ray = cam.ray_from_ndc(Vec2::ZERO);
        assert!(ray.direction.z < 0.0);
        let (t_top, _) = ray.hit_plane_z(0.003).unwrap();
        let (t_low, hit) = ray.hit_plane_z(0.0).unwrap();
        assert!(t_top < t_low);
        assert!(approx(hit.x, 0.0) && approx(hit.y, 0.0));
    }
}
