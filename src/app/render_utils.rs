use eframe::egui::{Color32, Painter, Pos2, Rect, Shape, Stroke, Vec2};

use crate::engine::style::BACKGROUND;

pub(super) fn draw_background(painter: &Painter, rect: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, BACKGROUND);

    let step = (64.0 * zoom.clamp(0.5, 2.0)).max(24.0);
    let origin = rect.center() + pan;
    let dot = Color32::from_rgba_unmultiplied(90, 110, 140, 40);

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
        while y < rect.bottom() {
            painter.circle_filled(Pos2::new(x, y), 1.0, dot);
            y += step;
        }
        x += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    rect.expand(radius).contains(position)
}

/// Conservative: a segment whose bounding box meets `rect` counts as visible.
pub(super) fn segment_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    Rect::from_two_pos(start, end)
        .expand(padding)
        .intersects(rect)
}

/// Point `fraction` of the way from `start` to `end`.
pub(super) fn partial_end(start: Pos2, end: Pos2, fraction: f32) -> Pos2 {
    start + (end - start) * fraction.clamp(0.0, 1.0)
}

pub(super) fn draw_segment(
    painter: &Painter,
    start: Pos2,
    end: Pos2,
    stroke: Stroke,
    dash: Option<(f32, f32)>,
) {
    match dash {
        Some((dash, gap)) => {
            painter.extend(Shape::dashed_line(&[start, end], stroke, dash, gap));
        }
        None => {
            painter.line_segment([start, end], stroke);
        }
    }
}

/// Text size that follows zoom a little without becoming unreadable.
pub(super) fn label_size(base: f32, zoom: f32) -> f32 {
    (base * zoom.powf(0.4)).clamp(9.0, 18.0)
}
