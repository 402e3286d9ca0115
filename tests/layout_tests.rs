use museum_wall::layout::{
    FrameCounts, LayoutPreset, Orientation, OrientationRotation, PhotoPools, PhotoSize, PhotoWithSize,
    create_wall_config,
};

fn photo(source: &str, w: u32, h: u32) -> PhotoWithSize {
    let size = PhotoSize::new(w, h);
    PhotoWithSize {
        source: source.to_string(),
        size: Some(size),
        is_landscape: size.is_landscape(),
    }
}

fn sources(frames: &[museum_wall::layout::FrameSpec]) -> Vec<&str> {
    frames.iter().map(|f| f.image_source.as_str()).collect()
}

#[test]
fn default_preset_binds_in_slot_order() {
    let photos = [photo("L0", 1500, 1000), photo("L1", 1500, 1000), photo("P0", 1000, 1500)];
    let config = create_wall_config(2000.0, 1000.0, &photos, LayoutPreset::Default);
    assert_eq!(sources(&config.frames), ["L0", "P0", "L1"]);
    assert_eq!(config.wall.width, 2000.0);
    let ids: Vec<&str> = config.frames.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, ["frame-0", "frame-1", "frame-2"]);
}

#[test]
fn wall_click_rotation_swaps_landscapes() {
    let pools = PhotoPools {
        landscape: vec!["L0".into(), "L1".into()],
        portrait: vec!["P0".into()],
    };
    let preset = LayoutPreset::Default;
    let mut rotation = OrientationRotation::new(preset.frame_counts());
    rotation.advance(&pools);
    let bound: Vec<&str> = preset
        .slots()
        .into_iter()
        .map(|slot| rotation.source_for_slot(slot, &pools).unwrap())
        .collect();
    assert_eq!(bound, ["L1", "P0", "L0"]);
}

#[test]
fn rotation_returns_to_start_after_pool_length_advances() {
    let pools = PhotoPools {
        landscape: (0..3).map(|i| format!("L{i}")).collect(),
        portrait: (0..7).map(|i| format!("P{i}")).collect(),
    };
    let counts = FrameCounts {
        landscape: 3,
        portrait: 5,
    };
    let start = OrientationRotation::new(counts);
    let mut rotation = start.clone();
    for _ in 0..3 {
        rotation.advance(&pools);
    }
    assert_eq!(rotation.indices(Orientation::Landscape), start.indices(Orientation::Landscape));
    assert_ne!(rotation.indices(Orientation::Portrait), start.indices(Orientation::Portrait));
    for _ in 3..7 {
        rotation.advance(&pools);
    }
    assert_ne!(rotation, start);
}

#[test]
fn every_preset_matches_its_slot_counts() {
    for preset in LayoutPreset::ALL {
        let config = create_wall_config(2000.0, 1000.0, &[], *preset);
        let counts = preset.frame_counts();
        assert_eq!(config.frames.len(), counts.landscape + counts.portrait);
        assert!(config.frames.iter().all(|f| f.w > 0.0 && f.h > 0.0));
        assert_eq!(preset.as_str().parse::<LayoutPreset>().unwrap(), *preset);
    }
}

#[test]
fn tate_modern_frames_carry_gallery_labels() {
    let config = create_wall_config(2000.0, 1000.0, &[], LayoutPreset::TateModern);
    assert_eq!(config.frames.len(), 8);
    assert!(config.frames.iter().all(|f| f.label.is_some()));
    assert_eq!(config.frames[3].label.as_deref(), Some("Hauser & Wirth"));
}
