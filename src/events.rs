use image::RgbaImage;

use crate::layout::PhotoSize;

/// Correlates a loader reply with the request that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Read intrinsic dimensions only.
    Probe,
    /// Decode to RGBA8 for upload.
    Texture,
}

#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub ticket: Ticket,
    pub source: String,
    pub kind: AssetKind,
}

#[derive(Debug)]
pub struct DecodedImage {
    /// Post-orientation size of the file, before any downscale.
    pub natural: PhotoSize,
    pub pixels: RgbaImage,
}

#[derive(Debug)]
pub enum AssetResult {
    Probed {
        ticket: Ticket,
        source: String,
        size: Option<PhotoSize>,
    },
    Decoded {
        ticket: Ticket,
        source: String,
        image: DecodedImage,
    },
    Failed {
        ticket: Ticket,
        source: String,
        reason: String,
    },
}

impl AssetResult {
    pub fn ticket(&self) -> Ticket {
        match self {
            Self::Probed { ticket, .. } | Self::Decoded { ticket, .. } | Self::Failed { ticket, .. } => {
                *ticket
            }
        }
    }
}

/// Events injected into the window's event loop.
#[derive(Debug)]
pub enum WallEvent {
    Asset(AssetResult),
    Shutdown,
}
