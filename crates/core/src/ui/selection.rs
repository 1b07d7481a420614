//! Crop box interaction.
//!
//! Translates pointer drags on the displayed image into dialog actions.
//! A drag that starts inside the crop box moves it; a drag that starts
//! outside draws a new box, ratio-locked unless the preset is freeform.
//! Releasing the pointer completes the crop.

use crate::dialog::{Action, DialogState};
use crate::geometry::CropRect;
use eframe::egui;

/// Minimum distance (in pixels) for a drag to draw a new box.
pub const MIN_SELECTION_DISTANCE: f32 = 10.0;

/// What the current drag is doing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragMode {
    #[default]
    Idle,
    /// Drawing a new box from `start` (percent space).
    Drawing { start: (f32, f32) },
    /// Moving the box; `last` is the previous pointer position in percent.
    Moving { last: (f32, f32) },
}

/// Converts a screen position into percent of the displayed image.
pub fn to_percent(pos: egui::Pos2, image_rect: egui::Rect) -> (f32, f32) {
    (
        (pos.x - image_rect.min.x) / image_rect.width() * 100.0,
        (pos.y - image_rect.min.y) / image_rect.height() * 100.0,
    )
}

/// Determines if a drag is long enough to be an intentional new box
/// rather than an accidental click.
pub fn is_valid_selection(start: egui::Pos2, end: egui::Pos2) -> bool {
    start.distance(end) > MIN_SELECTION_DISTANCE
}

/// Processes drag events on the image area and returns the actions to
/// dispatch, in order.
///
/// # Arguments
/// * `response` - The egui response from the image area
/// * `image_rect` - Where the image is drawn on screen
/// * `state` - Current dialog state
/// * `drag` - Drag bookkeeping, updated in place
pub fn process_drag_event(
    response: &egui::Response,
    image_rect: egui::Rect,
    state: &DialogState,
    drag: &mut DragMode,
) -> Vec<Action> {
    let mut actions = Vec::new();
    let pointer = response.interact_pointer_pos();

    if response.drag_started() {
        if let Some(pos) = pointer {
            let pct = to_percent(pos, image_rect);
            *drag = if state.crop.contains(pct.0, pct.1) {
                DragMode::Moving { last: pct }
            } else {
                DragMode::Drawing { start: pct }
            };
        }
        return actions;
    }

    if response.dragged() {
        if let Some(pos) = pointer {
            let pct = to_percent(pos, image_rect);
            match *drag {
                DragMode::Moving { last } => {
                    let moved = state.crop.translated(pct.0 - last.0, pct.1 - last.1);
                    actions.push(Action::CropChanged(moved));
                    *drag = DragMode::Moving { last: pct };
                }
                DragMode::Drawing { start } => {
                    let start_pos = egui::pos2(
                        image_rect.min.x + start.0 / 100.0 * image_rect.width(),
                        image_rect.min.y + start.1 / 100.0 * image_rect.height(),
                    );
                    if is_valid_selection(start_pos, pos) {
                        let rect = CropRect::from_drag(start, pct, state.locked_ratio());
                        actions.push(Action::CropChanged(rect));
                    }
                }
                DragMode::Idle => {}
            }
        }
        return actions;
    }

    if response.drag_stopped() && *drag != DragMode::Idle {
        *drag = DragMode::Idle;
        if let Some(pixels) = state.realized_crop() {
            actions.push(Action::CropCompleted(pixels));
        }
    }

    actions
}
