use museum_wall::Error;
use museum_wall::export::{ExportedFrame, LayoutExport};
use museum_wall::layout::{LayoutPreset, WallConfig, create_wall_config};

fn tate() -> WallConfig {
    create_wall_config(2000.0, 1000.0, &[], LayoutPreset::TateModern)
}

#[test]
fn export_round_trip_reproduces_geometry() {
    let mut config = tate();
    config.frames[0].x = 12.4;
    config.frames[0].w = 99.6;

    let json = LayoutExport::from_config(&config).to_json().unwrap();
    let parsed = LayoutExport::from_json(&json).unwrap();
    assert_eq!(parsed.canvas, "background");
    assert_eq!(parsed.background_url, "background.jpg");
    assert_eq!(parsed.frames.len(), config.frames.len());

    for (exported, frame) in parsed.frames.iter().zip(&config.frames) {
        assert_eq!(exported.id, frame.id);
        assert!((exported.x as f32 - frame.x).abs() <= 0.5);
        assert!((exported.y as f32 - frame.y).abs() <= 0.5);
        assert!((exported.w as f32 - frame.w).abs() <= 0.5);
        assert!((exported.h as f32 - frame.h).abs() <= 0.5);
    }
}

#[test]
fn apply_patches_frames_by_id() {
    let mut config = tate();
    let export = LayoutExport {
        canvas: "background".into(),
        background_url: "background.jpg".into(),
        frames: vec![
            ExportedFrame {
                id: "frame-2".into(),
                x: 10,
                y: -20,
                w: 300,
                h: 0,
            },
        ],
    };
    let before_h = config.frames[2].h;
    export.apply_to(&mut config).unwrap();
    assert_eq!(config.frames[2].x, 10.0);
    assert_eq!(config.frames[2].y, -20.0);
    assert_eq!(config.frames[2].w, 300.0);
    assert_eq!(config.frames[2].h, before_h);
}

#[test]
fn apply_rejects_unknown_frames_without_partial_writes() {
    let mut config = tate();
    let mut export = LayoutExport::from_config(&config);
    export.frames[0].x += 500;
    export.frames[1].id = "frame-99".into();
    let before = config.clone();

    match export.apply_to(&mut config) {
        Err(Error::UnknownFrame(id)) => assert_eq!(id, "frame-99"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(config, before);
}

#[test]
fn malformed_json_is_an_export_error() {
    assert!(matches!(LayoutExport::from_json("{ nope"), Err(Error::Export(_))));
}
