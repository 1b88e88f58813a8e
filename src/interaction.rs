use crate::vocab_store::VocabId;
use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use std::time::{Duration, Instant};

/// A press held longer than this is no longer a tap.
pub const TAP_MAX_DURATION: Duration = Duration::from_millis(300);
/// Maximum cells of travel (Manhattan) before a press becomes a drag.
pub const TAP_MAX_TRAVEL: u16 = 1;
/// How far up the region tree a hit search is allowed to walk.
pub const MAX_HIT_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: u16,
    pub y: u16,
}

impl Point {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    fn travel(&self, other: &Point) -> u16 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// A classified pointer gesture. Taps open record detail; drags feed text
/// selection; a right drag is the explicit capture gesture carried over from
/// the old client (where it also suppressed the context menu).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Tap(Point),
    DragStart(Point),
    DragMove(Point),
    DragEnd(Point),
    RightDragStart(Point),
    RightDragMove(Point),
    RightDragEnd(Point),
    None,
}

#[derive(Debug, Clone, Copy)]
struct PressState {
    button: MouseButton,
    origin: Point,
    at: Instant,
    dragging: bool,
}

/// Classifies raw mouse events into gestures. Classification is synchronous
/// and purely positional; no I/O is involved, so hit-vs-selection decisions
/// never wait on the network.
#[derive(Debug, Default)]
pub struct GestureTracker {
    press: Option<PressState>,
}

impl GestureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_mouse(&mut self, event: MouseEvent) -> Gesture {
        let point = Point::new(event.column, event.row);
        match event.kind {
            MouseEventKind::Down(button @ (MouseButton::Left | MouseButton::Right)) => {
                self.press = Some(PressState {
                    button,
                    origin: point,
                    at: Instant::now(),
                    dragging: false,
                });
                Gesture::None
            }
            MouseEventKind::Drag(MouseButton::Left | MouseButton::Right) => {
                let Some(press) = self.press.as_mut() else {
                    return Gesture::None;
                };
                if !press.dragging && press.origin.travel(&point) <= TAP_MAX_TRAVEL {
                    // Jitter within the tap threshold is not a drag yet.
                    return Gesture::None;
                }
                let start = !press.dragging;
                press.dragging = true;
                match (press.button, start) {
                    (MouseButton::Right, true) => Gesture::RightDragStart(press.origin),
                    (MouseButton::Right, false) => Gesture::RightDragMove(point),
                    (_, true) => Gesture::DragStart(press.origin),
                    (_, false) => Gesture::DragMove(point),
                }
            }
            MouseEventKind::Up(MouseButton::Left | MouseButton::Right) => {
                let Some(press) = self.press.take() else {
                    return Gesture::None;
                };
                if press.dragging {
                    return match press.button {
                        MouseButton::Right => Gesture::RightDragEnd(point),
                        _ => Gesture::DragEnd(point),
                    };
                }
                let quick = press.at.elapsed() < TAP_MAX_DURATION;
                let near = press.origin.travel(&point) <= TAP_MAX_TRAVEL;
                if quick && near && press.button == MouseButton::Left {
                    Gesture::Tap(point)
                } else {
                    Gesture::None
                }
            }
            _ => Gesture::None,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.press.is_some()
    }
}

/// One rectangular region of the rendered view. The reader publishes a small
/// nesting (content area > line > span) each frame; leaves for highlight
/// spans carry the record id of the term they render.
#[derive(Debug, Clone, Default)]
pub struct HitRegion {
    pub rect: Rect,
    pub marker: Option<VocabId>,
    pub children: Vec<HitRegion>,
}

impl HitRegion {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            marker: None,
            children: Vec::new(),
        }
    }

    pub fn with_marker(rect: Rect, record_id: VocabId) -> Self {
        Self {
            rect,
            marker: Some(record_id),
            children: Vec::new(),
        }
    }

    fn contains(&self, point: Point) -> bool {
        point.x >= self.rect.x
            && point.x < self.rect.x.saturating_add(self.rect.width)
            && point.y >= self.rect.y
            && point.y < self.rect.y.saturating_add(self.rect.height)
    }

    /// Chain of regions from this root down to the innermost region
    /// containing the point, or empty when the point is outside.
    fn path_to<'a>(&'a self, point: Point) -> Vec<&'a HitRegion> {
        if !self.contains(point) {
            return Vec::new();
        }
        let mut path = vec![self];
        let mut current = self;
        while let Some(child) = current.children.iter().find(|c| c.contains(point)) {
            path.push(child);
            current = child;
        }
        path
    }
}

/// Outcome of resolving a finished gesture against the rendered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A saved term was tapped; open its record detail.
    VocabHit { record_id: VocabId },
    /// A selection gesture finished with a non-empty selection.
    Selection,
    /// Nothing actionable. Never an error.
    None,
}

/// Resolve a tap point against the region tree: walk from the innermost
/// region upward through at most `MAX_HIT_DEPTH` ancestors looking for a
/// highlight marker. A marker further away than that resolves to `None`.
pub fn resolve_tap(root: &HitRegion, point: Point) -> Resolution {
    let path = root.path_to(point);
    for region in path.iter().rev().take(MAX_HIT_DEPTH) {
        if let Some(record_id) = region.marker {
            return Resolution::VocabHit { record_id };
        }
    }
    Resolution::None
}

/// Resolve a finished drag: a non-empty selection becomes `Selection`, an
/// empty or collapsed one resolves to `None` (ambiguous gesture, not an
/// error).
pub fn resolve_drag(has_selection: bool) -> Resolution {
    if has_selection {
        Resolution::Selection
    } else {
        Resolution::None
    }
}
