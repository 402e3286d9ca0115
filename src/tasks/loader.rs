use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Result;
use image::{RgbaImage, imageops};
use tokio::select;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Error;
use crate::events::{AssetKind, AssetRequest, AssetResult, DecodedImage};
use crate::layout::PhotoSize;

/// Where finished loads are delivered.
pub trait AssetSink: Send + 'static {
    /// Returns `false` once the receiver is gone.
    fn deliver(&self, result: AssetResult) -> bool;
}

impl AssetSink for UnboundedSender<AssetResult> {
    fn deliver(&self, result: AssetResult) -> bool {
        self.send(result).is_ok()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    pub max_in_flight: usize,
    pub max_texture_dim: u32,
}

fn image_error(path: &Path, source: image::ImageError) -> Error {
    Error::Image {
        path: path.display().to_string(),
        source,
    }
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = field.value.get_uint(0)? as u16;
    debug!(orientation = o, path = %path.display(), "exif orientation");
    Some(o)
}

/// EXIF orientations 5..=8 store the image rotated by a quarter turn.
fn swaps_axes(orientation: u16) -> bool {
    matches!(orientation, 5..=8)
}

fn orient(img: RgbaImage, orientation: u16) -> RgbaImage {
    match orientation {
        2 => imageops::flip_horizontal(&img),
        3 => imageops::rotate180(&img),
        4 => imageops::flip_vertical(&img),
        5 => imageops::flip_horizontal(&imageops::rotate90(&img)),
        6 => imageops::rotate90(&img),
        7 => imageops::flip_horizontal(&imageops::rotate270(&img)),
        8 => imageops::rotate270(&img),
        _ => img,
    }
}

/// Intrinsic display size of the image at `path`, honouring EXIF orientation.
pub fn probe_size(path: &Path) -> Result<PhotoSize, Error> {
    let (w, h) = image::ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|err| image_error(path, err))?;
    let orientation = read_orientation(path).unwrap_or(1);
    Ok(if swaps_axes(orientation) {
        PhotoSize::new(h, w)
    } else {
        PhotoSize::new(w, h)
    })
}

/// Decode to RGBA8, apply EXIF orientation and keep both sides within `max_dim`.
pub fn decode_texture(path: &Path, max_dim: u32) -> Result<DecodedImage, Error> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|err| image_error(path, err))?
        .to_rgba8();
    let img = orient(img, read_orientation(path).unwrap_or(1));
    let (w, h) = img.dimensions();
    let natural = PhotoSize::new(w, h);

    let longest = w.max(h);
    let pixels = if longest > max_dim && max_dim > 0 {
        let scale = max_dim as f64 / longest as f64;
        let nw = ((w as f64 * scale).round() as u32).max(1);
        let nh = ((h as f64 * scale).round() as u32).max(1);
        debug!(path = %path.display(), from_w = w, from_h = h, to_w = nw, to_h = nh, "downscaling texture");
        imageops::resize(&img, nw, nh, imageops::FilterType::Triangle)
    } else {
        img
    };
    Ok(DecodedImage { natural, pixels })
}

fn load(request: &AssetRequest, max_texture_dim: u32) -> AssetResult {
    let path = Path::new(&request.source);
    let ticket = request.ticket;
    let source = request.source.clone();
    match request.kind {
        AssetKind::Probe => match probe_size(path) {
            Ok(size) => AssetResult::Probed {
                ticket,
                source,
                size: Some(size),
            },
            Err(err) => {
                warn!(path = %path.display(), error = %err, "probe failed");
                AssetResult::Probed {
                    ticket,
                    source,
                    size: None,
                }
            }
        },
        AssetKind::Texture => match decode_texture(path, max_texture_dim) {
            Ok(image) => AssetResult::Decoded {
                ticket,
                source,
                image,
            },
            Err(err) => {
                warn!(path = %path.display(), error = %err, "texture load failed");
                AssetResult::Failed {
                    ticket,
                    source,
                    reason: err.to_string(),
                }
            }
        },
    }
}

/// Serve probe and decode requests on the blocking pool until cancelled or
/// until the request channel closes and every load has finished.
pub async fn run<S: AssetSink>(
    mut requests: UnboundedReceiver<AssetRequest>,
    sink: S,
    cancel: CancellationToken,
    options: LoaderOptions,
) -> Result<()> {
    let max_in_flight = options.max_in_flight.max(1);
    let mut tasks: JoinSet<AssetResult> = JoinSet::new();
    let mut open = true;

    loop {
        if !open && tasks.is_empty() {
            break;
        }
        select! {
            _ = cancel.cancelled() => {
                debug!(in_flight = tasks.len(), "loader cancelled");
                tasks.abort_all();
                break;
            },

            maybe_req = requests.recv(), if open && tasks.len() < max_in_flight => {
                match maybe_req {
                    Some(request) => {
                        debug!(ticket = request.ticket.0, source = %request.source, kind = ?request.kind, "load requested");
                        let max_dim = options.max_texture_dim;
                        tasks.spawn(async move {
                            let fallback = AssetResult::Failed {
                                ticket: request.ticket,
                                source: request.source.clone(),
                                reason: "decode task panicked".to_string(),
                            };
                            tokio::task::spawn_blocking(move || load(&request, max_dim))
                                .await
                                .unwrap_or(fallback)
                        });
                    }
                    None => open = false,
                }
            }

            Some(join_res) = tasks.join_next() => {
                match join_res {
                    Ok(result) => {
                        if !sink.deliver(result) {
                            debug!("asset receiver dropped; stopping loader");
                            tasks.abort_all();
                            break;
                        }
                    }
                    Err(err) => warn!(error = %err, "load task failed"),
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Ticket;
    use base64::Engine;
    use image::Rgba;
    use tokio::sync::mpsc;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> String {
        let path = dir.join(name);
        RgbaImage::from_pixel(w, h, Rgba([200, 100, 50, 255]))
            .save(&path)
            .unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn probe_swaps_axes_for_rotated_exif() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orient6.jpg");
        std::fs::write(&path, &bytes).unwrap();
        assert_eq!(probe_size(&path).unwrap(), PhotoSize::new(1, 2));
        let decoded = decode_texture(&path, 4096).unwrap();
        assert_eq!(decoded.pixels.dimensions(), (1, 2));
        assert_eq!(decoded.natural, PhotoSize::new(1, 2));
    }

    #[test]
    fn decode_downscales_but_reports_natural_size() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_png(dir.path(), "wide.png", 400, 100);
        let decoded = decode_texture(Path::new(&src), 100).unwrap();
        assert_eq!(decoded.natural, PhotoSize::new(400, 100));
        assert_eq!(decoded.pixels.dimensions(), (100, 25));
    }

    #[tokio::test]
    async fn serves_probes_and_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_png(dir.path(), "a.png", 30, 20);
        let missing = dir.path().join("missing.png").to_string_lossy().into_owned();

        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (res_tx, mut res_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let options = LoaderOptions {
            max_in_flight: 2,
            max_texture_dim: 4096,
        };
        let handle = tokio::spawn(run(req_rx, res_tx, cancel.clone(), options));

        for (id, source, kind) in [
            (1, src.clone(), AssetKind::Probe),
            (2, src.clone(), AssetKind::Texture),
            (3, missing.clone(), AssetKind::Probe),
            (4, missing, AssetKind::Texture),
        ] {
            req_tx
                .send(AssetRequest {
                    ticket: Ticket(id),
                    source,
                    kind,
                })
                .unwrap();
        }
        drop(req_tx);

        let mut results = Vec::new();
        while let Some(result) = res_rx.recv().await {
            results.push(result);
        }
        handle.await.unwrap().unwrap();
        results.sort_by_key(|r| r.ticket());
        assert_eq!(results.len(), 4);

        assert!(matches!(
            &results[0],
            AssetResult::Probed { size: Some(s), .. } if *s == PhotoSize::new(30, 20)
        ));
        assert!(matches!(
            &results[1],
            AssetResult::Decoded { image, .. } if image.pixels.dimensions() == (30, 20)
        ));
        assert!(matches!(&results[2], AssetResult::Probed { size: None, .. }));
        assert!(matches!(&results[3], AssetResult::Failed { .. }));
    }

    #[tokio::test]
    async fn stops_on_cancel() {
        let (_req_tx, req_rx) = mpsc::unbounded_channel::<AssetRequest>();
        let (res_tx, _res_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            req_rx,
            res_tx,
            cancel.clone(),
            LoaderOptions {
                max_in_flight: 1,
                max_texture_dim: 64,
            },
        ));
        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("loader did not stop")
            .unwrap()
            .unwrap();
    }
}
