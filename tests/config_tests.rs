use museum_wall::config::Configuration;
use museum_wall::layout::LayoutPreset;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[test]
fn empty_document_is_all_defaults() {
    let cfg = Configuration::from_yaml_str("").unwrap().validated().unwrap();
    assert_eq!(cfg.layout, LayoutPreset::Default);
    assert!(cfg.show_photos);
    assert_eq!(cfg.animation.camera, Duration::from_millis(550));
    assert_eq!(cfg.animation.fade_in, Duration::from_secs(1));
    assert_eq!(cfg.loader_max_concurrent_decodes, 4);
}

#[test]
fn parse_kebab_case_config() {
    let yaml = r##"
backdrop: walls/tate.jpg
layout: tate-modern
show-photos: false
landscape-photos: [a.jpg, b.jpg]
portrait-photos: [c.jpg]
frame-style:
  border-width: 0
  thumbtacks: false
animation:
  crossfade: 400ms
viewport:
  max-height-fraction: 1.0
rendering:
  clear-color: "#202020"
"##;
    let cfg = Configuration::from_yaml_str(yaml).unwrap().validated().unwrap();
    assert_eq!(cfg.backdrop, PathBuf::from("walls/tate.jpg"));
    assert_eq!(cfg.layout, LayoutPreset::TateModern);
    assert!(!cfg.show_photos);
    assert_eq!(cfg.landscape_photos.len(), 2);
    assert_eq!(cfg.frame_style.border_width, 0.0);
    assert!(!cfg.frame_style.thumbtacks);
    assert!((cfg.frame_style.shadow_opacity - 0.04).abs() < f32::EPSILON);
    assert_eq!(cfg.animation.crossfade, Duration::from_millis(400));
    assert_eq!(cfg.animation.morph, Duration::from_millis(300));
    assert!((cfg.viewport.max_height_fraction - 1.0).abs() < f32::EPSILON);

    let pools = cfg.photo_pools();
    assert_eq!(pools.landscape, vec!["a.jpg", "b.jpg"]);
    assert_eq!(pools.portrait, vec!["c.jpg"]);
}

#[test]
fn unknown_layout_is_rejected() {
    assert!(Configuration::from_yaml_str("layout: louvre\n").is_err());
}

#[test]
fn validation_rejects_out_of_range_values() {
    let bad = [
        "loader-max-concurrent-decodes: 0\n",
        "frame-style:\n  shadow-opacity: 2.0\n",
        "viewport:\n  max-height-fraction: 0\n",
        "rendering:\n  anisotropy: 32\n",
        "rendering:\n  clear-color: grey\n",
    ];
    for yaml in bad {
        let cfg = Configuration::from_yaml_str(yaml).unwrap();
        assert!(cfg.validated().is_err(), "accepted: {yaml}");
    }
}

#[test]
fn relative_paths_resolve_against_config_dir() {
    let cfg = Configuration::from_yaml_str("backdrop: wall.jpg\nportrait-photos: [/abs/p.jpg, rel/q.jpg]\n")
        .unwrap()
        .resolve_paths(Path::new("/gallery"));
    assert_eq!(cfg.backdrop, PathBuf::from("/gallery/wall.jpg"));
    assert_eq!(cfg.portrait_photos[0], PathBuf::from("/abs/p.jpg"));
    assert_eq!(cfg.portrait_photos[1], PathBuf::from("/gallery/rel/q.jpg"));
}

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wall.yaml");
    std::fs::write(&path, "layout: art-gallery-ontario\n").unwrap();
    let cfg = Configuration::from_yaml_file(&path).unwrap();
    assert_eq!(cfg.layout, LayoutPreset::ArtGalleryOntario);
    assert!(Configuration::from_yaml_file(dir.path().join("missing.yaml")).is_err());
}
