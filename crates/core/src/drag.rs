//! Single-pointer drag handling for placed annotations.
//!
//! One controller serves every annotation. Annotations subscribe when they are
//! created and unsubscribe when they are replaced or cleared, so a removed
//! annotation can never be moved by a stale listener.

use std::collections::BTreeSet;

use crate::annotation::{Annotation, AnnotationId};
use crate::geometry::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerSource {
    Mouse,
    Pen,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    /// pointer-down / touch-start
    Down,
    /// pointer-move / touch-move
    Move,
    /// pointer-up / touch-end
    Up,
    /// pointer left the document
    Out,
}

/// A pointer or touch event in client coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub source: PointerSource,
    /// `None` for events without a position, e.g. a touch-end with no touches left.
    pub position: Option<Point>,
    /// The annotation directly under the pointer, if any.
    pub target: Option<AnnotationId>,
}

impl PointerEvent {
    pub fn mouse(phase: PointerPhase, position: Point, target: Option<AnnotationId>) -> Self {
        Self {
            phase,
            source: PointerSource::Mouse,
            position: Some(position),
            target,
        }
    }

    /// Build a touch event. Only the first touch point is tracked.
    pub fn touch(phase: PointerPhase, touches: &[Point], target: Option<AnnotationId>) -> Self {
        Self {
            phase,
            source: PointerSource::Touch,
            position: touches.first().copied(),
            target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        id: AnnotationId,
        /// Pointer offset from the annotation's top-left, captured on grab.
        grab: Point,
    },
}

#[derive(Debug)]
pub struct DragController {
    subscribers: BTreeSet<AnnotationId>,
    state: DragState,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new()
    }
}

impl DragController {
    pub fn new() -> Self {
        Self {
            subscribers: BTreeSet::new(),
            state: DragState::Idle,
        }
    }

    pub fn subscribe(&mut self, id: AnnotationId) {
        self.subscribers.insert(id);
    }

    pub fn unsubscribe(&mut self, id: AnnotationId) {
        self.subscribers.remove(&id);
        if matches!(self.state, DragState::Dragging { id: active, .. } if active == id) {
            self.state = DragState::Idle;
        }
    }

    pub fn is_subscribed(&self, id: AnnotationId) -> bool {
        self.subscribers.contains(&id)
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    /// Feed one event through the state machine.
    ///
    /// `viewport` is the document viewer's box in client coordinates; annotation
    /// rectangles are relative to its top-left. Returns the id of the annotation
    /// that moved, if any.
    pub fn handle(
        &mut self,
        event: &PointerEvent,
        viewport: &Rect,
        entries: &mut [Annotation],
    ) -> Option<AnnotationId> {
        match event.phase {
            PointerPhase::Down => {
                self.begin(event, viewport, entries);
                None
            }
            PointerPhase::Move => self.drag(event, viewport, entries),
            PointerPhase::Up | PointerPhase::Out => {
                if let DragState::Dragging { id, .. } = self.state {
                    log::debug!("[Drag] release {:?}", id);
                }
                self.state = DragState::Idle;
                None
            }
        }
    }

    fn begin(&mut self, event: &PointerEvent, viewport: &Rect, entries: &[Annotation]) {
        let (Some(id), Some(position)) = (event.target, event.position) else {
            return;
        };
        if !self.is_subscribed(id) {
            return;
        }
        let Some(entry) = entries.iter().find(|a| a.id == id) else {
            return;
        };

        let local = to_local(position, viewport);
        let grab = Point::new(local.x - entry.screen_rect.left, local.y - entry.screen_rect.top);
        log::debug!("[Drag] grab {:?} at offset ({:.1}, {:.1})", id, grab.x, grab.y);
        self.state = DragState::Dragging { id, grab };
    }

    fn drag(
        &mut self,
        event: &PointerEvent,
        viewport: &Rect,
        entries: &mut [Annotation],
    ) -> Option<AnnotationId> {
        let DragState::Dragging { id, grab } = self.state else {
            return None;
        };
        let position = event.position?;
        let entry = entries.iter_mut().find(|a| a.id == id)?;

        let local = to_local(position, viewport);
        let rect = &mut entry.screen_rect;
        rect.left = clamp_axis(local.x - grab.x, viewport.width, rect.width);
        rect.top = clamp_axis(local.y - grab.y, viewport.height, rect.height);
        Some(id)
    }
}

fn to_local(position: Point, viewport: &Rect) -> Point {
    Point::new(position.x - viewport.left, position.y - viewport.top)
}

/// Keep `[value, value + extent]` inside `[0, limit]`. An element larger than
/// the viewport is pinned to the origin.
pub(crate) fn clamp_axis(value: f64, limit: f64, extent: f64) -> f64 {
    let max = (limit - extent).max(0.0);
    value.max(0.0).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationContent;

    fn entry(id: u64, rect: Rect) -> Annotation {
        Annotation {
            id: AnnotationId(id),
            page: 1,
            screen_rect: rect,
            content: AnnotationContent::Text { text: "x".into() },
        }
    }

    fn viewport() -> Rect {
        Rect::new(100.0, 40.0, 600.0, 800.0)
    }

    #[test]
    fn test_grab_offset_prevents_jump() {
        let mut drag = DragController::new();
        let mut entries = vec![entry(1, Rect::new(50.0, 50.0, 80.0, 20.0))];
        drag.subscribe(AnnotationId(1));

        // grab 10px right and 5px below the top-left corner
        let down = PointerEvent::mouse(PointerPhase::Down, Point::new(160.0, 95.0), Some(AnnotationId(1)));
        drag.handle(&down, &viewport(), &mut entries);
        assert!(matches!(drag.state(), DragState::Dragging { .. }));

        let mv = PointerEvent::mouse(PointerPhase::Move, Point::new(260.0, 195.0), None);
        assert_eq!(drag.handle(&mv, &viewport(), &mut entries), Some(AnnotationId(1)));
        assert_eq!(entries[0].screen_rect.left, 150.0);
        assert_eq!(entries[0].screen_rect.top, 150.0);

        let up = PointerEvent::mouse(PointerPhase::Up, Point::new(260.0, 195.0), None);
        drag.handle(&up, &viewport(), &mut entries);
        assert_eq!(drag.state(), DragState::Idle);

        // moves after release are ignored
        let mv = PointerEvent::mouse(PointerPhase::Move, Point::new(400.0, 400.0), None);
        assert_eq!(drag.handle(&mv, &viewport(), &mut entries), None);
        assert_eq!(entries[0].screen_rect.left, 150.0);
    }

    #[test]
    fn test_down_on_other_target_does_not_grab() {
        let mut drag = DragController::new();
        let mut entries = vec![entry(1, Rect::new(0.0, 0.0, 10.0, 10.0))];
        drag.subscribe(AnnotationId(1));

        let down = PointerEvent::mouse(PointerPhase::Down, Point::new(105.0, 45.0), None);
        drag.handle(&down, &viewport(), &mut entries);
        assert_eq!(drag.state(), DragState::Idle);

        let down = PointerEvent::mouse(PointerPhase::Down, Point::new(105.0, 45.0), Some(AnnotationId(9)));
        drag.handle(&down, &viewport(), &mut entries);
        assert_eq!(drag.state(), DragState::Idle);
    }

    #[test]
    fn test_clamp_keeps_box_inside_viewport() {
        let mut drag = DragController::new();
        let mut entries = vec![entry(1, Rect::new(10.0, 10.0, 80.0, 20.0))];
        drag.subscribe(AnnotationId(1));
        let vp = viewport();

        let down = PointerEvent::mouse(PointerPhase::Down, Point::new(115.0, 55.0), Some(AnnotationId(1)));
        drag.handle(&down, &vp, &mut entries);

        let path = [
            Point::new(-500.0, -500.0),
            Point::new(5000.0, 30.0),
            Point::new(300.0, 9000.0),
            Point::new(650.0, 820.0),
            Point::new(120.0, 60.0),
        ];
        for p in path {
            let mv = PointerEvent::mouse(PointerPhase::Move, p, None);
            drag.handle(&mv, &vp, &mut entries);
            let local_vp = Rect::new(0.0, 0.0, vp.width, vp.height);
            assert!(local_vp.contains(&entries[0].screen_rect), "{:?}", entries[0].screen_rect);
        }
    }

    #[test]
    fn test_touch_uses_first_point_and_end_releases() {
        let mut drag = DragController::new();
        let mut entries = vec![entry(1, Rect::new(0.0, 0.0, 10.0, 10.0))];
        drag.subscribe(AnnotationId(1));

        let start = PointerEvent::touch(
            PointerPhase::Down,
            &[Point::new(100.0, 40.0), Point::new(500.0, 500.0)],
            Some(AnnotationId(1)),
        );
        drag.handle(&start, &viewport(), &mut entries);
        let mv = PointerEvent::touch(PointerPhase::Move, &[Point::new(130.0, 60.0)], None);
        drag.handle(&mv, &viewport(), &mut entries);
        assert_eq!(entries[0].screen_rect.left, 30.0);
        assert_eq!(entries[0].screen_rect.top, 20.0);

        let end = PointerEvent::touch(PointerPhase::Up, &[], None);
        drag.handle(&end, &viewport(), &mut entries);
        assert_eq!(drag.state(), DragState::Idle);
    }

    #[test]
    fn test_pointer_out_releases_grab() {
        let mut drag = DragController::new();
        let mut entries = vec![entry(1, Rect::new(20.0, 20.0, 40.0, 10.0))];
        drag.subscribe(AnnotationId(1));

        let down = PointerEvent::mouse(PointerPhase::Down, Point::new(125.0, 65.0), Some(AnnotationId(1)));
        drag.handle(&down, &viewport(), &mut entries);
        assert!(matches!(drag.state(), DragState::Dragging { .. }));

        let out = PointerEvent::mouse(PointerPhase::Out, Point::new(0.0, 0.0), None);
        assert_eq!(drag.handle(&out, &viewport(), &mut entries), None);
        assert_eq!(drag.state(), DragState::Idle);

        let mv = PointerEvent::mouse(PointerPhase::Move, Point::new(300.0, 300.0), None);
        assert_eq!(drag.handle(&mv, &viewport(), &mut entries), None);
        assert_eq!(entries[0].screen_rect, Rect::new(20.0, 20.0, 40.0, 10.0));
    }

    #[test]
    fn test_unsubscribe_cancels_active_drag() {
        let mut drag = DragController::new();
        let mut entries = vec![entry(1, Rect::new(0.0, 0.0, 10.0, 10.0))];
        drag.subscribe(AnnotationId(1));
        let down = PointerEvent::mouse(PointerPhase::Down, Point::new(101.0, 41.0), Some(AnnotationId(1)));
        drag.handle(&down, &viewport(), &mut entries);

        drag.unsubscribe(AnnotationId(1));
        assert_eq!(drag.state(), DragState::Idle);
        assert!(!drag.is_subscribed(AnnotationId(1)));
    }

    #[test]
    fn test_clamp_axis_oversized_element() {
        assert_eq!(clamp_axis(40.0, 100.0, 150.0), 0.0);
        assert_eq!(clamp_axis(-3.0, 100.0, 10.0), 0.0);
        assert_eq!(clamp_axis(95.0, 100.0, 10.0), 90.0);
    }
}
