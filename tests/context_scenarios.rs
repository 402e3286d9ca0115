use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use glam::Vec2;
use image::RgbaImage;
use museum_wall::config::Configuration;
use museum_wall::events::{AssetKind, AssetResult, DecodedImage};
use museum_wall::layout::PhotoSize;
use museum_wall::tasks::viewer::camera::{CameraPose, MAX_ZOOM, MIN_ZOOM};
use museum_wall::tasks::viewer::context::{Clipboard, WallContext};
use museum_wall::tasks::viewer::interaction::{KeyInput, ViewMode};

const WALL: (u32, u32) = (2000, 1000);

fn natural_size(source: &str) -> PhotoSize {
    if source.ends_with("background.jpg") {
        PhotoSize::new(WALL.0, WALL.1)
    } else if source.starts_with('P') {
        PhotoSize::new(1000, 1500)
    } else {
        PhotoSize::new(1500, 1000)
    }
}

/// Answer every outstanding request until the context stops asking.
/// Returns the number of texture decodes served.
fn serve(ctx: &mut WallContext, now: Instant) -> usize {
    serve_failing(ctx, now, &[])
}

/// Like `serve`, but texture decodes of `failing` sources report an error.
fn serve_failing(ctx: &mut WallContext, now: Instant, failing: &[&str]) -> usize {
    let mut decodes = 0;
    loop {
        let requests = ctx.take_requests();
        if requests.is_empty() {
            return decodes;
        }
        for req in requests {
            let size = natural_size(&req.source);
            let result = match req.kind {
                AssetKind::Probe => AssetResult::Probed {
                    ticket: req.ticket,
                    source: req.source,
                    size: Some(size),
                },
                AssetKind::Texture if failing.contains(&req.source.as_str()) => AssetResult::Failed {
                    ticket: req.ticket,
                    source: req.source,
                    reason: "corrupt file".into(),
                },
                AssetKind::Texture => {
                    decodes += 1;
                    AssetResult::Decoded {
                        ticket: req.ticket,
                        source: req.source,
                        image: DecodedImage {
                            natural: size,
                            pixels: RgbaImage::new(4, 4),
                        },
                    }
                }
            };
            ctx.handle_asset(result, now);
        }
    }
}

fn gallery_config() -> Configuration {
    let mut cfg = Configuration::from_yaml_str(
        r#"
landscape-photos: [L0, L1]
portrait-photos: [P0]
viewport:
  max-height-fraction: 1.0
"#,
    )
    .unwrap();
    cfg.backdrop = "background.jpg".into();
    cfg
}

/// A 1000x500 canvas over a 2000x1000 wall: two world units per pixel.
fn ready_wall(now: Instant) -> WallContext {
    let mut ctx = WallContext::new(gallery_config(), Vec2::new(1000.0, 500.0), 1.0);
    serve(&mut ctx, now);
    assert!(ctx.wall_config().is_some());
    ctx
}

fn frame_center_on_screen(ctx: &WallContext, idx: usize) -> Vec2 {
    let (cx, cy) = ctx.wall_config().unwrap().frames[idx].center();
    ctx.viewport().world_to_screen(ctx.camera(), Vec2::new(cx, cy))
}

fn click(ctx: &mut WallContext, at: Vec2, now: Instant) {
    ctx.pointer_pressed(at);
    ctx.pointer_released(at, now);
}

fn sources(ctx: &WallContext) -> Vec<String> {
    ctx.wall_config()
        .unwrap()
        .frames
        .iter()
        .map(|f| f.image_source.clone())
        .collect()
}

#[test]
fn startup_binds_default_preset() {
    let now = Instant::now();
    let ctx = ready_wall(now);
    assert_eq!(sources(&ctx), ["L0", "P0", "L1"]);
    assert_eq!(ctx.viewport().canvas.width, 1000.0);
    assert_eq!(ctx.viewport().canvas.height, 500.0);
    assert!(ctx.scene().frames().iter().all(|f| f.texture().is_some()));
}

#[test]
fn clicking_a_frame_zooms_to_it() {
    let t0 = Instant::now();
    let mut ctx = ready_wall(t0);
    let at = frame_center_on_screen(&ctx, 1);
    click(&mut ctx, at, t0);

    assert_eq!(ctx.interaction().mode(), ViewMode::Zoomed(1));
    let (cx, cy) = ctx.wall_config().unwrap().frames[1].center();
    let target = ctx.camera().target();
    assert_eq!((target.x, target.y), (cx, cy));
    assert!((MIN_ZOOM..=MAX_ZOOM).contains(&target.zoom));
    assert!(ctx.scene().frame(1).unwrap().shows_full_image());
}

#[test]
fn escape_after_zoom_returns_exactly_home() {
    let t0 = Instant::now();
    let mut ctx = ready_wall(t0);
    let at = frame_center_on_screen(&ctx, 0);
    click(&mut ctx, at, t0);
    ctx.tick(t0 + Duration::from_millis(200));

    let t1 = t0 + Duration::from_millis(300);
    ctx.key(KeyInput::Escape, false, t1);
    ctx.tick(t1 + Duration::from_secs(2));
    assert_eq!(ctx.camera().pose(), CameraPose::HOME);
    assert_eq!(ctx.interaction().mode(), ViewMode::Browsing);
    assert!(!ctx.scene().frame(0).unwrap().shows_full_image());
}

#[test]
fn clicking_the_zoomed_frame_again_zooms_out() {
    let t0 = Instant::now();
    let mut ctx = ready_wall(t0);
    let at = frame_center_on_screen(&ctx, 2);
    click(&mut ctx, at, t0);
    let t1 = t0 + Duration::from_secs(1);
    ctx.tick(t1);

    let again = frame_center_on_screen(&ctx, 2);
    click(&mut ctx, again, t1);
    ctx.tick(t1 + Duration::from_secs(1));
    assert_eq!(ctx.interaction().mode(), ViewMode::Browsing);
    assert_eq!(ctx.camera().pose(), CameraPose::HOME);
}

#[test]
fn wall_click_rotates_photos_with_crossfade() {
    let t0 = Instant::now();
    let mut ctx = ready_wall(t0);
    let empty_wall = ctx.viewport().world_to_screen(ctx.camera(), Vec2::new(0.0, 400.0));
    click(&mut ctx, empty_wall, t0);

    // sources switch only once the new photos have arrived
    assert_eq!(sources(&ctx), ["L0", "P0", "L1"]);
    assert_eq!(serve(&mut ctx, t0), 2);
    assert_eq!(sources(&ctx), ["L1", "P0", "L0"]);
    assert!(ctx.scene().frame(0).unwrap().is_crossfading());
    assert!(!ctx.scene().frame(1).unwrap().is_crossfading());

    ctx.tick(t0 + Duration::from_millis(300));
    assert!(!ctx.scene().frame(0).unwrap().is_crossfading());
    assert_eq!(ctx.scene().frame(0).unwrap().source(), "L1");
}

fn scene_sources(ctx: &WallContext) -> Vec<String> {
    ctx.scene().frames().iter().map(|f| f.source().to_string()).collect()
}

#[test]
fn rotation_onto_a_broken_photo_keeps_the_current_one() {
    let t0 = Instant::now();
    let mut ctx = ready_wall(t0);
    let empty_wall = ctx.viewport().world_to_screen(ctx.camera(), Vec2::new(0.0, 400.0));

    click(&mut ctx, empty_wall, t0);
    assert_eq!(serve_failing(&mut ctx, t0, &["L1"]), 1);
    assert_eq!(sources(&ctx), ["L0", "P0", "L0"]);
    assert_eq!(scene_sources(&ctx), sources(&ctx));
    assert!(!ctx.scene().frame(0).unwrap().is_crossfading());
    let export = museum_wall::export::LayoutExport::from_config(ctx.wall_config().unwrap());
    assert_eq!(export.frames.len(), 3);

    // the broken photo is not requested again
    let t1 = t0 + Duration::from_secs(1);
    ctx.tick(t1);
    click(&mut ctx, empty_wall, t1);
    let requests = ctx.take_requests();
    assert!(requests.iter().all(|r| r.source != "L1"), "{requests:?}");
    assert_eq!(sources(&ctx), ["L0", "P0", "L0"]);

    ctx.key(KeyInput::Char('p'), false, t1);
    ctx.key(KeyInput::Char('+'), false, t1);
    assert_eq!(scene_sources(&ctx), sources(&ctx));
}

#[test]
fn editing_drag_moves_by_world_delta() {
    let t0 = Instant::now();
    let mut ctx = ready_wall(t0);
    ctx.key(KeyInput::Char('p'), false, t0);
    assert!(ctx.interaction().is_editing());

    let before = ctx.wall_config().unwrap().frames[1].rect();
    let start = frame_center_on_screen(&ctx, 1);
    ctx.pointer_pressed(start);
    ctx.pointer_moved(start + Vec2::new(100.0, 0.0));
    ctx.pointer_released(start + Vec2::new(100.0, 0.0), t0);

    let after = ctx.wall_config().unwrap().frames[1].rect();
    assert!((after.x - (before.x + 200.0)).abs() < 1e-3);
    assert!((after.y - before.y).abs() < 1e-3);
    assert_eq!(ctx.interaction().selected(), 1);
    assert!(ctx.interaction().drag().is_none());
}

#[test]
fn clicks_are_ignored_while_editing() {
    let t0 = Instant::now();
    let mut ctx = ready_wall(t0);
    ctx.key(KeyInput::Char('p'), false, t0);
    let empty_wall = ctx.viewport().world_to_screen(ctx.camera(), Vec2::new(0.0, 400.0));
    click(&mut ctx, empty_wall, t0);
    assert_eq!(sources(&ctx), ["L0", "P0", "L1"]);
    assert_eq!(ctx.interaction().mode(), ViewMode::Browsing);
}

#[test]
fn edits_never_collapse_a_frame() {
    let t0 = Instant::now();
    let mut ctx = ready_wall(t0);
    ctx.key(KeyInput::Char('p'), false, t0);

    let rect = ctx.wall_config().unwrap().frames[0].rect();
    let corner = ctx
        .viewport()
        .world_to_screen(ctx.camera(), Vec2::new(rect.x + rect.w, rect.y + rect.h));
    ctx.pointer_pressed(corner);
    ctx.pointer_moved(corner + Vec2::new(-10_000.0, 0.0));
    ctx.pointer_released(corner, t0);

    for _ in 0..200 {
        ctx.key(KeyInput::Char('-'), false, t0);
    }
    for entry in ["w", "h"] {
        ctx.key(KeyInput::Char(entry.chars().next().unwrap()), false, t0);
        ctx.key(KeyInput::Char('-'), false, t0);
        ctx.key(KeyInput::Char('5'), false, t0);
        ctx.key(KeyInput::Enter, false, t0);
    }

    let frame = &ctx.wall_config().unwrap().frames[0];
    assert!(frame.w > 0.0 && frame.h > 0.0, "{frame:?}");
}

#[derive(Clone, Default)]
struct RecordingClipboard(Arc<Mutex<Vec<String>>>);

impl Clipboard for RecordingClipboard {
    fn set_text(&mut self, text: String) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(text);
        Ok(())
    }
}

#[test]
fn copy_puts_layout_json_on_clipboard() {
    let t0 = Instant::now();
    let clipboard = RecordingClipboard::default();
    let mut ctx = WallContext::new(gallery_config(), Vec2::new(1000.0, 500.0), 1.0)
        .with_clipboard(Box::new(clipboard.clone()));
    serve(&mut ctx, t0);

    ctx.key(KeyInput::Char('p'), false, t0);
    ctx.key(KeyInput::Char('c'), false, t0);

    let copied = clipboard.0.lock().unwrap();
    assert_eq!(copied.len(), 1);
    let export = museum_wall::export::LayoutExport::from_json(&copied[0]).unwrap();
    assert_eq!(export.canvas, "background");
    assert_eq!(export.frames.len(), 3);
    assert_eq!(export.frames[0].x, -918);
}

#[test]
fn missing_photos_fall_back_to_placeholder() {
    let t0 = Instant::now();
    let mut cfg = gallery_config();
    cfg.landscape_photos.truncate(1);
    let mut ctx = WallContext::new(cfg, Vec2::new(1000.0, 500.0), 1.0);
    serve(&mut ctx, t0);
    let placeholder = ctx.config().placeholder_source();
    assert_eq!(sources(&ctx), ["L0".to_string(), "P0".to_string(), placeholder]);
}
