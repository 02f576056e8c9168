use eframe::egui::{Pos2, Rect, Vec2};

pub const MIN_ZOOM: f32 = 0.05;
pub const MAX_ZOOM: f32 = 6.0;
pub const FOCUS_ZOOM: f32 = 1.2;
pub const FOCUS_DURATION: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Flight {
    from_pan: Vec2,
    from_zoom: f32,
    center: Vec2,
    zoom: f32,
    started_at: f64,
    duration: f64,
}

impl Flight {
    fn progress(&self, now: f64) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.started_at) / self.duration).clamp(0.0, 1.0) as f32
    }
}

/// Pan and zoom of the canvas.
///
/// A world point `w` lands on screen at `rect.center() + pan + w * zoom`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pan: Vec2,
    zoom: f32,
    flight: Option<Flight>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
            flight: None,
        }
    }
}

impl Camera {
    pub fn pan(&self) -> Vec2 {
        self.pan
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// World coordinate currently under the middle of the canvas.
    pub fn center(&self) -> Vec2 {
        -self.pan / self.zoom
    }

    pub fn world_to_screen(&self, rect: Rect, world: Vec2) -> Pos2 {
        rect.center() + self.pan + world * self.zoom
    }

    pub fn screen_to_world(&self, rect: Rect, screen: Pos2) -> Vec2 {
        (screen - rect.center() - self.pan) / self.zoom
    }

    /// Jumps straight to `center` at `zoom`.
    pub fn look_at(&mut self, center: Vec2, zoom: f32) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = -center * self.zoom;
        self.flight = None;
    }

    /// Starts an eased flight towards `center`; replaces any flight in progress.
    pub fn fly_to(&mut self, center: Vec2, zoom: f32, now: f64, duration: f64) {
        self.flight = Some(Flight {
            from_pan: self.pan,
            from_zoom: self.zoom,
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            started_at: now,
            duration,
        });
    }

    /// Moves the destination of the current flight, e.g. to follow a node still settling.
    pub fn retarget(&mut self, center: Vec2) {
        if let Some(flight) = &mut self.flight {
            flight.center = center;
        }
    }

    pub fn is_flying(&self) -> bool {
        self.flight.is_some()
    }

    pub fn destination(&self) -> Option<Vec2> {
        self.flight.map(|flight| flight.center)
    }

    /// Applies the current flight at `now`. Returns whether the camera is still moving.
    pub fn advance(&mut self, now: f64) -> bool {
        let Some(flight) = self.flight else {
            return false;
        };

        let t = ease_in_out(flight.progress(now));
        let target_pan = -flight.center * flight.zoom;
        if t >= 1.0 {
            self.zoom = flight.zoom;
            self.pan = target_pan;
            self.flight = None;
            return false;
        }

        self.zoom = flight.from_zoom + (flight.zoom - flight.from_zoom) * t;
        self.pan = flight.from_pan + (target_pan - flight.from_pan) * t;
        true
    }

    /// Zooms by `factor` keeping the world point under `pointer` fixed on screen.
    pub fn zoom_at(&mut self, rect: Rect, pointer: Pos2, factor: f32) {
        let world_before = self.screen_to_world(rect, pointer);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = pointer - rect.center() - world_before * self.zoom;
        self.flight = None;
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
        self.flight = None;
    }
}

fn ease_in_out(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}
