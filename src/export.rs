//! JSON snapshot of frame geometry, as copied from the editing HUD.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layout::WallConfig;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutExport {
    /// Backdrop name the layout was tuned against.
    pub canvas: String,
    pub background_url: String,
    pub frames: Vec<ExportedFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedFrame {
    pub id: String,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

/// Backdrop file stem without its image extension, or `"Unknown"`.
pub fn canvas_name(source: &str) -> String {
    let file = source.rsplit(['/', '\\']).next().unwrap_or_default();
    let path = Path::new(file);
    let stem = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
            path.file_stem().and_then(|s| s.to_str()).unwrap_or_default()
        }
        _ => file,
    };
    if stem.is_empty() {
        "Unknown".to_string()
    } else {
        stem.to_string()
    }
}

impl LayoutExport {
    pub fn from_config(config: &WallConfig) -> Self {
        Self {
            canvas: canvas_name(&config.wall.image_source),
            background_url: config.wall.image_source.clone(),
            frames: config
                .frames
                .iter()
                .map(|f| ExportedFrame {
                    id: f.id.clone(),
                    x: f.x.round() as i64,
                    y: f.y.round() as i64,
                    w: f.w.round() as i64,
                    h: f.h.round() as i64,
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Overwrite the geometry of each exported frame in `config`, matched by id.
    /// Non-positive sizes are left untouched. On error `config` is unchanged.
    pub fn apply_to(&self, config: &mut WallConfig) -> Result<()> {
        let targets = self
            .frames
            .iter()
            .map(|exported| {
                config
                    .frames
                    .iter()
                    .position(|f| f.id == exported.id)
                    .ok_or_else(|| Error::UnknownFrame(exported.id.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        for (exported, idx) in self.frames.iter().zip(targets) {
            let frame = &mut config.frames[idx];
            frame.x = exported.x as f32;
            frame.y = exported.y as f32;
            if exported.w > 0 {
                frame.w = exported.w as f32;
            }
            if exported.h > 0 {
                frame.h = exported.h as f32;
            }
        }
        Ok(())
    }
}
