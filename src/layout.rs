//! Wall layout model: frame placements, presets and photo-to-slot binding.
//!
//! World coordinates are centered on the backdrop with +x right and +y up.
//! A frame's `(x, y)` is its lower-left corner.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Source used for a slot whose orientation pool has run out.
pub const DEFAULT_PLACEHOLDER: &str = "photos/placeholder.jpg";
/// Backdrop used when the configuration does not name one.
pub const DEFAULT_BACKDROP: &str = "background.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoSize {
    pub width: u32,
    pub height: u32,
}

impl PhotoSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }

    pub fn is_landscape(&self) -> bool {
        self.width >= self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoWithSize {
    pub source: String,
    /// `None` when the probe failed; callers skip cover math in that case.
    pub size: Option<PhotoSize>,
    pub is_landscape: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Landscape,
    Portrait,
}

/// One frame position of a preset, bound to the `ordinal`-th photo of its
/// orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub orientation: Orientation,
    pub ordinal: usize,
}

impl Slot {
    const fn landscape(ordinal: usize) -> Self {
        Self {
            orientation: Orientation::Landscape,
            ordinal,
        }
    }

    const fn portrait(ordinal: usize) -> Self {
        Self {
            orientation: Orientation::Portrait,
            ordinal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCounts {
    pub landscape: usize,
    pub portrait: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutPreset {
    /// Two landscape frames flanking one portrait.
    #[default]
    Default,
    /// Five portraits and one landscape.
    ArtGalleryOntario,
    /// Five portraits and three landscapes, each with a gallery label.
    TateModern,
}

struct BakedFrame {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    slot: Slot,
    label: Option<&'static str>,
}

const fn baked(x: f32, y: f32, w: f32, h: f32, slot: Slot) -> BakedFrame {
    BakedFrame {
        x,
        y,
        w,
        h,
        slot,
        label: None,
    }
}

const fn labelled(x: f32, y: f32, w: f32, h: f32, slot: Slot, label: &'static str) -> BakedFrame {
    BakedFrame {
        x,
        y,
        w,
        h,
        slot,
        label: Some(label),
    }
}

// Positions were tuned by hand with the editing HUD against the matching backdrops.
const DEFAULT_FRAMES: &[BakedFrame] = &[
    baked(-917.5, -358.0, 572.0, 381.0, Slot::landscape(0)),
    baked(-48.0, -437.0, 364.0, 551.0, Slot::portrait(0)),
    baked(481.0, -253.0, 286.0, 186.0, Slot::landscape(1)),
];

const ART_GALLERY_ONTARIO_FRAMES: &[BakedFrame] = &[
    baked(-792.0, -114.0, 141.0, 210.0, Slot::portrait(0)),
    baked(-740.0, 316.0, 61.0, 92.0, Slot::portrait(1)),
    baked(-247.0, -124.0, 280.0, 421.0, Slot::portrait(2)),
    baked(185.0, -61.0, 178.0, 266.0, Slot::portrait(3)),
    baked(404.0, 143.0, 142.0, 213.0, Slot::portrait(4)),
    baked(526.0, -94.0, 215.0, 144.0, Slot::landscape(0)),
];

const TATE_MODERN_FRAMES: &[BakedFrame] = &[
    labelled(-754.0, -229.0, 122.0, 160.0, Slot::portrait(0), "David Zwirner Gallery in New York City"),
    labelled(195.0, -227.0, 84.0, 126.0, Slot::portrait(1), "Gagosian Gallery"),
    labelled(-832.0, 254.0, 114.0, 171.0, Slot::portrait(2), "White Cube London"),
    labelled(339.0, -70.0, 371.0, 553.0, Slot::portrait(3), "Hauser & Wirth"),
    labelled(702.0, -308.0, 124.0, 184.0, Slot::portrait(4), "Pace Gallery"),
    labelled(-280.0, 198.0, 174.0, 117.0, Slot::landscape(0), "Sadie Coles HQ"),
    labelled(-542.0, -363.0, 535.0, 355.0, Slot::landscape(1), "Lisson Gallery"),
    labelled(560.0, -248.0, 119.0, 80.0, Slot::landscape(2), "Marian Goodman Gallery"),
];

impl LayoutPreset {
    pub const ALL: &'static [Self] = &[Self::Default, Self::ArtGalleryOntario, Self::TateModern];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::ArtGalleryOntario => "art-gallery-ontario",
            Self::TateModern => "tate-modern",
        }
    }

    fn baked_frames(&self) -> &'static [BakedFrame] {
        match self {
            Self::Default => DEFAULT_FRAMES,
            Self::ArtGalleryOntario => ART_GALLERY_ONTARIO_FRAMES,
            Self::TateModern => TATE_MODERN_FRAMES,
        }
    }

    /// Slots in frame order.
    pub fn slots(&self) -> Vec<Slot> {
        self.baked_frames().iter().map(|f| f.slot).collect()
    }

    pub fn frame_counts(&self) -> FrameCounts {
        let mut counts = FrameCounts::default();
        for frame in self.baked_frames() {
            match frame.slot.orientation {
                Orientation::Landscape => counts.landscape += 1,
                Orientation::Portrait => counts.portrait += 1,
            }
        }
        counts
    }
}

impl fmt::Display for LayoutPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutPreset {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|preset| preset.as_str() == raw)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|p| p.as_str()).collect();
                format!("unknown layout `{raw}` (expected one of {})", names.join(", "))
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WallSpec {
    pub image_source: String,
    /// Natural width of the backdrop in pixels, which is also its world width.
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSpec {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub image_source: String,
    pub label: Option<String>,
}

impl FrameSpec {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn aspect(&self) -> f32 {
        self.w / self.h
    }

    pub fn rect(&self) -> FrameRect {
        FrameRect {
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
        }
    }

    pub fn set_rect(&mut self, rect: FrameRect) {
        self.x = rect.x;
        self.y = rect.y;
        self.w = rect.w;
        self.h = rect.h;
    }
}

/// Geometry of a frame, detached from its photo binding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl FrameRect {
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Replace the size while keeping the rectangle's center fixed.
    pub fn resized_about_center(&self, w: f32, h: f32) -> Self {
        Self {
            x: self.x + (self.w - w) / 2.0,
            y: self.y + (self.h - h) / 2.0,
            w,
            h,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.w && y >= self.y && y <= self.y + self.h
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FrameStyle {
    /// Border around each print in world units; `0` disables it.
    pub border_width: f32,
    /// Opacity of the faint halo drawn around every print.
    pub shadow_opacity: f32,
    /// Draw pins at the two top corners.
    pub thumbtacks: bool,
}

impl Default for FrameStyle {
    fn default() -> Self {
        Self {
            border_width: 4.0,
            shadow_opacity: 0.04,
            thumbtacks: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WallConfig {
    pub wall: WallSpec,
    pub frames: Vec<FrameSpec>,
    pub frame_style: FrameStyle,
}

/// Everything needed to lay out one wall.
#[derive(Debug, Clone)]
pub struct LayoutRequest<'a> {
    pub wall: WallSpec,
    pub photos: &'a [PhotoWithSize],
    pub preset: LayoutPreset,
    pub style: FrameStyle,
    pub placeholder: &'a str,
}

/// Lay out a wall with the default backdrop, style and placeholder.
pub fn create_wall_config(
    wall_width: f32,
    wall_height: f32,
    photos: &[PhotoWithSize],
    preset: LayoutPreset,
) -> WallConfig {
    create_wall_config_with(LayoutRequest {
        wall: WallSpec {
            image_source: DEFAULT_BACKDROP.to_string(),
            width: wall_width,
            height: wall_height,
        },
        photos,
        preset,
        style: FrameStyle::default(),
        placeholder: DEFAULT_PLACEHOLDER,
    })
}

/// Bind the first photos of each orientation to the preset's slots.
///
/// Frame geometry comes from the preset table; only the photo binding depends
/// on the input. Slots whose orientation pool is exhausted get the placeholder.
pub fn create_wall_config_with(request: LayoutRequest<'_>) -> WallConfig {
    let landscape: Vec<&PhotoWithSize> = request.photos.iter().filter(|p| p.is_landscape).collect();
    let portrait: Vec<&PhotoWithSize> = request.photos.iter().filter(|p| !p.is_landscape).collect();

    let frames = request
        .preset
        .baked_frames()
        .iter()
        .enumerate()
        .map(|(idx, baked)| {
            let pool = match baked.slot.orientation {
                Orientation::Landscape => &landscape,
                Orientation::Portrait => &portrait,
            };
            let image_source = pool
                .get(baked.slot.ordinal)
                .map(|p| p.source.clone())
                .unwrap_or_else(|| request.placeholder.to_string());
            FrameSpec {
                id: format!("frame-{idx}"),
                x: baked.x,
                y: baked.y,
                w: baked.w,
                h: baked.h,
                image_source,
                label: baked.label.map(str::to_string),
            }
        })
        .collect();

    WallConfig {
        wall: request.wall,
        frames,
        frame_style: request.style,
    }
}

/// Externally supplied photo sources, split by orientation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoPools {
    pub landscape: Vec<String>,
    pub portrait: Vec<String>,
}

impl PhotoPools {
    pub fn pool(&self, orientation: Orientation) -> &[String] {
        match orientation {
            Orientation::Landscape => &self.landscape,
            Orientation::Portrait => &self.portrait,
        }
    }
}

/// Which pool element each slot ordinal currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrientationRotation {
    landscape: Vec<usize>,
    portrait: Vec<usize>,
}

impl OrientationRotation {
    pub fn new(counts: FrameCounts) -> Self {
        Self {
            landscape: (0..counts.landscape).collect(),
            portrait: (0..counts.portrait).collect(),
        }
    }

    pub fn indices(&self, orientation: Orientation) -> &[usize] {
        match orientation {
            Orientation::Landscape => &self.landscape,
            Orientation::Portrait => &self.portrait,
        }
    }

    /// Step every ordinal to the next photo of its pool, wrapping around.
    pub fn advance(&mut self, pools: &PhotoPools) {
        let landscape_len = pools.landscape.len().max(1);
        let portrait_len = pools.portrait.len().max(1);
        for idx in &mut self.landscape {
            *idx = (*idx + 1) % landscape_len;
        }
        for idx in &mut self.portrait {
            *idx = (*idx + 1) % portrait_len;
        }
    }

    /// Source currently bound to `slot`, if its pool has one.
    pub fn source_for_slot<'p>(&self, slot: Slot, pools: &'p PhotoPools) -> Option<&'p str> {
        let idx = *self.indices(slot.orientation).get(slot.ordinal)?;
        pools.pool(slot.orientation).get(idx).map(String::as_str)
    }
}
