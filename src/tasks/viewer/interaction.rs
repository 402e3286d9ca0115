//! Pointer and keyboard semantics: browsing, zoom, and the editing HUD.

use glam::Vec2;

use crate::layout::{FrameRect, FrameSpec};

use super::camera::Ray;

/// Side of the square corner handles on the selected frame, in pixels.
pub const HANDLE_PX: f32 = 12.0;
/// Horizontal drag distance that doubles a frame during resize.
const RESIZE_PX_PER_UNIT_SCALE: f32 = 200.0;
const RESIZE_MIN_SIDE: f32 = 50.0;
const SHRINK_MIN_SIDE: f32 = 10.0;
/// Largest side any edit can produce, in world units.
pub const MAX_SIDE: f32 = 100_000.0;
const NUDGE: f32 = 1.0;
const NUDGE_FAST: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Browsing,
    Zoomed(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Move,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub mode: DragMode,
    pub frame_index: usize,
    pub start_pointer: Vec2,
    pub initial_frame: FrameRect,
}

impl DragState {
    /// Frame geometry after the pointer moved `pixel_delta` (`world_delta` in world units).
    pub fn apply(&self, pixel_delta: Vec2, world_delta: Vec2) -> FrameRect {
        let initial = self.initial_frame;
        match self.mode {
            DragMode::Move => initial.translated(world_delta.x, world_delta.y),
            DragMode::Resize => {
                let scale = 1.0 + pixel_delta.x / RESIZE_PX_PER_UNIT_SCALE;
                let w = (initial.w * scale).clamp(RESIZE_MIN_SIDE, MAX_SIDE);
                let h = (initial.h * scale).clamp(RESIZE_MIN_SIDE, MAX_SIDE);
                initial.resized_about_center(w, h)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    X,
    Y,
    W,
    H,
}

impl Field {
    fn label(&self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::W => "W",
            Self::H => "H",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericEntry {
    pub field: Field,
    pub buffer: String,
}

/// A geometry change to the selected frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditOp {
    Nudge { dx: f32, dy: f32 },
    Grow,
    Shrink,
    Set(Field, f32),
}

impl EditOp {
    pub fn apply(self, rect: FrameRect) -> FrameRect {
        match self {
            Self::Nudge { dx, dy } => rect.translated(dx, dy),
            Self::Grow => {
                let w = (rect.w * 1.05).round().max(rect.w);
                let h = (rect.h * 1.05).round().max(rect.h);
                if w > MAX_SIDE || h > MAX_SIDE {
                    return rect.resized_about_center(w.min(MAX_SIDE), h.min(MAX_SIDE));
                }
                FrameRect {
                    x: rect.x - (w * 0.025).round(),
                    y: rect.y - (h * 0.025).round(),
                    w,
                    h,
                }
            }
            Self::Shrink => {
                let w = (rect.w * 0.95).round().max(SHRINK_MIN_SIDE.min(rect.w));
                let h = (rect.h * 0.95).round().max(SHRINK_MIN_SIDE.min(rect.h));
                rect.resized_about_center(w, h)
            }
            Self::Set(Field::X, v) => FrameRect { x: v, ..rect },
            Self::Set(Field::Y, v) => FrameRect { y: v, ..rect },
            Self::Set(Field::W, v) if v > 0.0 => {
                let v = v.min(MAX_SIDE);
                FrameRect {
                    x: rect.x - (v - rect.w) / 2.0,
                    w: v,
                    ..rect
                }
            }
            Self::Set(Field::H, v) if v > 0.0 => {
                let v = v.min(MAX_SIDE);
                FrameRect {
                    y: rect.y - (v - rect.h) / 2.0,
                    h: v,
                    ..rect
                }
            }
            Self::Set(Field::W | Field::H, _) => rect,
        }
    }
}

/// Keys the wall reacts to, decoupled from the windowing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Escape,
    Tab,
    Enter,
    Backspace,
    Left,
    Right,
    Up,
    Down,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClickAction {
    Ignored,
    ZoomIn { frame: usize },
    ZoomOut { frame: usize },
    Switch { from: usize, to: usize },
    AdvanceRotation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyAction {
    None,
    OpenEditing,
    CloseEditing,
    /// Return to the whole wall, restoring the crop of `unmorph` if set.
    ZoomOut { unmorph: Option<usize> },
    Select(usize),
    Edit { frame: usize, op: EditOp },
    CopyExport,
    /// The numeric entry buffer changed, was opened or was cancelled.
    EntryChanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    mode: ViewMode,
    editing: bool,
    selected: usize,
    entry: Option<NumericEntry>,
    drag: Option<DragState>,
}

impl Default for Interaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Interaction {
    pub fn new() -> Self {
        Self {
            mode: ViewMode::Browsing,
            editing: false,
            selected: 0,
            entry: None,
            drag: None,
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn entry(&self) -> Option<&NumericEntry> {
        self.entry.as_ref()
    }

    pub fn drag(&self) -> Option<&DragState> {
        self.drag.as_ref()
    }

    pub fn zoomed_frame(&self) -> Option<usize> {
        match self.mode {
            ViewMode::Zoomed(idx) => Some(idx),
            ViewMode::Browsing => None,
        }
    }

    /// Forget a zoom whose frame no longer exists.
    pub fn reset_view(&mut self) {
        self.mode = ViewMode::Browsing;
    }

    pub fn click(&mut self, hit: Option<usize>) -> ClickAction {
        if self.editing {
            return ClickAction::Ignored;
        }
        match (self.mode, hit) {
            (_, None) => ClickAction::AdvanceRotation,
            (ViewMode::Browsing, Some(frame)) => {
                self.mode = ViewMode::Zoomed(frame);
                ClickAction::ZoomIn { frame }
            }
            (ViewMode::Zoomed(current), Some(frame)) if current == frame => {
                self.mode = ViewMode::Browsing;
                ClickAction::ZoomOut { frame }
            }
            (ViewMode::Zoomed(from), Some(to)) => {
                self.mode = ViewMode::Zoomed(to);
                ClickAction::Switch { from, to }
            }
        }
    }

    pub fn key(&mut self, key: KeyInput, shift: bool, frame_count: usize) -> KeyAction {
        if let Some(entry) = &mut self.entry {
            return match key {
                KeyInput::Char(c) if c.is_ascii_digit() || c == '-' || c == '.' => {
                    entry.buffer.push(c);
                    KeyAction::EntryChanged
                }
                KeyInput::Backspace => {
                    entry.buffer.pop();
                    KeyAction::EntryChanged
                }
                KeyInput::Escape => {
                    self.entry = None;
                    KeyAction::EntryChanged
                }
                KeyInput::Enter => self.commit_entry(),
                _ => KeyAction::None,
            };
        }

        if let KeyInput::Char(c) = key {
            if c.eq_ignore_ascii_case(&'p') {
                return self.toggle_editing();
            }
        }

        if !self.editing {
            return match key {
                KeyInput::Escape => {
                    let unmorph = self.zoomed_frame();
                    self.mode = ViewMode::Browsing;
                    KeyAction::ZoomOut { unmorph }
                }
                _ => KeyAction::None,
            };
        }

        let frame = self.selected;
        let step = if shift { NUDGE_FAST } else { NUDGE };
        let edit = |op| KeyAction::Edit { frame, op };
        match key {
            KeyInput::Escape => self.toggle_editing(),
            KeyInput::Tab if frame_count > 0 => {
                self.selected = (self.selected + 1) % frame_count;
                KeyAction::Select(self.selected)
            }
            KeyInput::Left => edit(EditOp::Nudge { dx: -step, dy: 0.0 }),
            KeyInput::Right => edit(EditOp::Nudge { dx: step, dy: 0.0 }),
            KeyInput::Up => edit(EditOp::Nudge { dx: 0.0, dy: step }),
            KeyInput::Down => edit(EditOp::Nudge { dx: 0.0, dy: -step }),
            KeyInput::Char(c) => match c.to_ascii_lowercase() {
                d @ '1'..='9' => {
                    let idx = (d as u8 - b'1') as usize;
                    if idx < frame_count {
                        self.selected = idx;
                        KeyAction::Select(idx)
                    } else {
                        KeyAction::None
                    }
                }
                '=' | '+' => edit(EditOp::Grow),
                '-' => edit(EditOp::Shrink),
                'c' => KeyAction::CopyExport,
                'x' => self.open_entry(Field::X),
                'y' => self.open_entry(Field::Y),
                'w' => self.open_entry(Field::W),
                'h' => self.open_entry(Field::H),
                _ => KeyAction::None,
            },
            _ => KeyAction::None,
        }
    }

    fn toggle_editing(&mut self) -> KeyAction {
        self.editing = !self.editing;
        self.entry = None;
        self.drag = None;
        if self.editing {
            KeyAction::OpenEditing
        } else {
            KeyAction::CloseEditing
        }
    }

    fn open_entry(&mut self, field: Field) -> KeyAction {
        self.entry = Some(NumericEntry {
            field,
            buffer: String::new(),
        });
        KeyAction::EntryChanged
    }

    fn commit_entry(&mut self) -> KeyAction {
        let Some(entry) = self.entry.take() else {
            return KeyAction::None;
        };
        let parsed = entry.buffer.trim().parse::<f32>().ok().filter(|v| v.is_finite());
        let value = match entry.field {
            Field::X | Field::Y => parsed.unwrap_or(0.0),
            Field::W | Field::H => match parsed {
                Some(v) if v > 0.0 => v,
                _ => return KeyAction::EntryChanged,
            },
        };
        KeyAction::Edit {
            frame: self.selected,
            op: EditOp::Set(entry.field, value),
        }
    }

    /// Clamp the selection after the frame list changed.
    pub fn clamp_selection(&mut self, frame_count: usize) {
        if self.selected >= frame_count {
            self.selected = 0;
        }
    }

    pub fn begin_drag(&mut self, mode: DragMode, frame_index: usize, pointer: Vec2, initial: FrameRect) {
        if !self.editing {
            return;
        }
        self.selected = frame_index;
        self.entry = None;
        self.drag = Some(DragState {
            mode,
            frame_index,
            start_pointer: pointer,
            initial_frame: initial,
        });
    }

    pub fn end_drag(&mut self) -> Option<DragState> {
        self.drag.take()
    }

    /// One-line description of the editing state for the window title.
    pub fn hud_text(&self, frames: &[FrameSpec]) -> String {
        let Some(frame) = frames.get(self.selected) else {
            return "editing: loading wall".to_string();
        };
        let mut text = format!(
            "editing {} ({}/{}) x={} y={} w={} h={}",
            frame.id,
            self.selected + 1,
            frames.len(),
            frame.x.round(),
            frame.y.round(),
            frame.w.round(),
            frame.h.round()
        );
        if let Some(entry) = &self.entry {
            text.push_str(&format!(" | {}: {}_", entry.field.label(), entry.buffer));
        } else {
            text.push_str(" | drag to move, corners resize, arrows nudge, +/- scale, X/Y/W/H enter, C copy, Esc close");
        }
        text
    }
}

/// Index of the top-most image quad the ray passes through.
///
/// Quads are `(index, center, size, z)`. The nearest intersection along the
/// ray wins, which is the highest quad since rays travel toward -z.
pub fn pick_frame(ray: &Ray, quads: impl IntoIterator<Item = (usize, Vec2, Vec2, f32)>) -> Option<usize> {
    let mut best: Option<(f32, usize)> = None;
    for (idx, center, size, z) in quads {
        let Some((t, hit)) = ray.hit_plane_z(z) else {
            continue;
        };
        let local = hit.truncate() - center;
        if local.x.abs() > size.x / 2.0 || local.y.abs() > size.y / 2.0 {
            continue;
        }
        if best.is_none_or(|(best_t, _)| t < best_t) {
            best = Some((t, idx));
        }
    }
    best.map(|(_, idx)| idx)
}

/// Screen-space corners of a frame, as returned by `to_screen`.
pub fn corner_handle_hit(rect: FrameRect, pointer: Vec2, to_screen: impl Fn(Vec2) -> Vec2) -> bool {
    let corners = [
        Vec2::new(rect.x, rect.y),
        Vec2::new(rect.x + rect.w, rect.y),
        Vec2::new(rect.x, rect.y + rect.h),
        Vec2::new(rect.x + rect.w, rect.y + rect.h),
    ];
    corners.into_iter().any(|corner| {
        let c = to_screen(corner);
        (pointer.x - c.x).abs() <= HANDLE_PX / 2.0 && (pointer.y - c.y).abs() <= HANDLE_PX / 2.0
    })
}

/// Top-most frame whose on-screen rectangle contains the pointer.
pub fn frame_under_pointer(
    rects: &[FrameRect],
    pointer: Vec2,
    to_screen: impl Fn(Vec2) -> Vec2,
) -> Option<usize> {
    rects.iter().enumerate().rev().find_map(|(idx, rect)| {
        let a = to_screen(Vec2::new(rect.x, rect.y));
        let b = to_screen(Vec2::new(rect.x + rect.w, rect.y + rect.h));
        let min = a.min(b);
        let max = a.max(b);
        (pointer.x >= min.x && pointer.x <= max.x && pointer.y >= min.y && pointer.y <= max.y).then_some(idx)
    })
}
