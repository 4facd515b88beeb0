//! Pointer interaction over a set of plane views sharing one crosshair.
//!
//! Display points are pixels with the origin at the top-left corner of a
//! view. Data points are continuous plane coordinates `[u, v]`, where voxel
//! `(u, v)` covers `[u - 0.5, u + 0.5] x [v - 0.5, v + 0.5]`.
//!
//! Only one button gesture runs at a time: a press while another gesture
//! is active is ignored, and only releasing the button that started the
//! gesture ends it.

use crate::config::ZoomSettings;
use crate::cube::CubeOffset;
use crate::enums::{InteractionState, MouseButton, Orientation, PointerMode};
use crate::events::ViewId;

/// Visible data bounds of a plane view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewWindow {
    pub u: (f64, f64),
    pub v: (f64, f64),
}

impl ViewWindow {
    /// The window that shows the whole plane.
    pub fn home(plane_shape: (usize, usize)) -> Self {
        Self {
            u: (-0.5, plane_shape.0 as f64 - 0.5),
            v: (-0.5, plane_shape.1 as f64 - 0.5),
        }
    }

    pub fn centered(center: [f64; 2], half: [f64; 2]) -> Self {
        Self {
            u: (center[0] - half[0], center[0] + half[0]),
            v: (center[1] - half[1], center[1] + half[1]),
        }
    }

    pub fn center(&self) -> [f64; 2] {
        [(self.u.0 + self.u.1) / 2.0, (self.v.0 + self.v.1) / 2.0]
    }

    pub fn half(&self) -> [f64; 2] {
        [(self.u.1 - self.u.0) / 2.0, (self.v.1 - self.v.0) / 2.0]
    }

    /// Display pixel to data point for a view of `display` pixels.
    pub fn to_data(&self, display: [f64; 2], point: [f64; 2]) -> [f64; 2] {
        let w = display[0].max(1.0);
        let h = display[1].max(1.0);
        [
            self.u.0 + point[0] / w * (self.u.1 - self.u.0),
            self.v.1 - point[1] / h * (self.v.1 - self.v.0),
        ]
    }

    fn clamp_point(&self, point: [f64; 2]) -> [f64; 2] {
        [
            point[0].clamp(self.u.0, self.u.1),
            point[1].clamp(self.v.0, self.v.1),
        ]
    }
}

/// One plane view: its orientation, window and zoom.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaneView {
    orientation: Orientation,
    home: ViewWindow,
    window: ViewWindow,
    scale: f64,
    display: [f64; 2],
}

impl PlaneView {
    fn new(orientation: Orientation, dim: [usize; 3], display: [f64; 2]) -> Self {
        let home = ViewWindow::home(orientation.plane_shape(dim));
        Self {
            orientation,
            home,
            window: home,
            scale: 1.0,
            display,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn window(&self) -> ViewWindow {
        self.window
    }

    pub fn home(&self) -> ViewWindow {
        self.home
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn display_size(&self) -> [f64; 2] {
        self.display
    }

    pub fn to_data(&self, point: [f64; 2]) -> [f64; 2] {
        self.window.to_data(self.display, point)
    }

    fn reset(&mut self) {
        self.window = self.home;
        self.scale = 1.0;
    }
}

/// Which views need repainting after an input event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Redraw {
    None,
    View(ViewId),
    /// The crosshair moved; every view depends on it.
    All,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Gesture {
    Idle,
    Crosshair {
        view: ViewId,
    },
    Pan {
        view: ViewId,
        press_window: ViewWindow,
        press_point: [f64; 2],
    },
    Zoom {
        view: ViewId,
        center: [f64; 2],
        press_half: [f64; 2],
        press_scale: f64,
        last_y: f64,
    },
    Magnifier {
        view: ViewId,
        start: [f64; 2],
        current: [f64; 2],
    },
}

impl Gesture {
    fn button(&self) -> Option<MouseButton> {
        match self {
            Gesture::Idle => None,
            Gesture::Zoom { .. } => Some(MouseButton::Secondary),
            _ => Some(MouseButton::Primary),
        }
    }
}

pub struct InteractionController {
    dim: [usize; 3],
    offset: CubeOffset,
    views: Vec<PlaneView>,
    mode: PointerMode,
    gesture: Gesture,
    crosshair: [usize; 3],
    zoom: ZoomSettings,
}

impl InteractionController {
    /// Views over a grid of shape `dim` whose original data occupies the
    /// region described by `offset`. The crosshair starts at the center of
    /// that region.
    pub fn new(
        dim: [usize; 3],
        offset: CubeOffset,
        orientations: &[Orientation],
        display: [f64; 2],
        zoom: ZoomSettings,
    ) -> Self {
        Self {
            dim,
            offset,
            views: orientations
                .iter()
                .map(|&o| PlaneView::new(o, dim, display))
                .collect(),
            mode: PointerMode::default(),
            gesture: Gesture::Idle,
            crosshair: offset.center(),
            zoom,
        }
    }

    pub fn mode(&self) -> PointerMode {
        self.mode
    }

    /// Takes effect on the next press.
    pub fn set_mode(&mut self, mode: PointerMode) {
        self.mode = mode;
    }

    pub fn state(&self) -> InteractionState {
        match self.gesture {
            Gesture::Idle => InteractionState::Idle,
            Gesture::Crosshair { .. } => InteractionState::DraggingCrosshair,
            Gesture::Pan { .. } => InteractionState::Panning,
            Gesture::Zoom { .. } => InteractionState::Zooming,
            Gesture::Magnifier { .. } => InteractionState::MagnifierSelecting,
        }
    }

    /// Shared crosshair in grid coordinates.
    pub fn crosshair(&self) -> [usize; 3] {
        self.crosshair
    }

    pub fn set_crosshair(&mut self, voxel: [usize; 3]) -> Redraw {
        self.apply_crosshair(voxel.map(|c| c as i64))
    }

    pub fn offset(&self) -> &CubeOffset {
        &self.offset
    }

    pub fn views(&self) -> &[PlaneView] {
        &self.views
    }

    pub fn view(&self, view: ViewId) -> Option<&PlaneView> {
        self.views.get(view)
    }

    pub fn set_display_size(&mut self, view: ViewId, size: [f64; 2]) {
        if let Some(v) = self.views.get_mut(view) {
            v.display = size;
        }
    }

    /// Current magnifier rectangle, while one is being drawn.
    pub fn magnifier_rect(&self) -> Option<(ViewId, ViewWindow)> {
        match self.gesture {
            Gesture::Magnifier {
                view,
                start,
                current,
            } => Some((
                view,
                ViewWindow {
                    u: (start[0].min(current[0]), start[0].max(current[0])),
                    v: (start[1].min(current[1]), start[1].max(current[1])),
                },
            )),
            _ => None,
        }
    }

    pub fn press(&mut self, view: ViewId, button: MouseButton, point: [f64; 2]) -> Redraw {
        if self.gesture != Gesture::Idle {
            log::debug!("Ignoring {button:?} press during {:?}", self.state());
            return Redraw::None;
        }
        let Some(plane) = self.views.get(view) else {
            return Redraw::None;
        };

        match (button, self.mode) {
            (MouseButton::Secondary, _) => {
                let window = plane.window;
                self.gesture = Gesture::Zoom {
                    view,
                    center: window.center(),
                    press_half: window.half(),
                    press_scale: plane.scale,
                    last_y: point[1],
                };
                Redraw::None
            }
            (MouseButton::Primary, PointerMode::Pointer) => {
                self.gesture = Gesture::Crosshair { view };
                self.move_crosshair(view, point)
            }
            (MouseButton::Primary, PointerMode::Glove) => {
                self.gesture = Gesture::Pan {
                    view,
                    press_window: plane.window,
                    press_point: plane.to_data(point),
                };
                Redraw::None
            }
            (MouseButton::Primary, PointerMode::Magnifier) => {
                let start = plane.window.clamp_point(plane.to_data(point));
                self.gesture = Gesture::Magnifier {
                    view,
                    start,
                    current: start,
                };
                Redraw::View(view)
            }
        }
    }

    pub fn motion(&mut self, point: [f64; 2]) -> Redraw {
        match self.gesture {
            Gesture::Idle => Redraw::None,
            Gesture::Crosshair { view } => self.move_crosshair(view, point),
            Gesture::Pan {
                view,
                press_window,
                press_point,
            } => {
                let plane = &mut self.views[view];
                let now = press_window.to_data(plane.display, point);
                let center = press_window.center();
                let moved = [
                    (center[0] - (now[0] - press_point[0])).clamp(plane.home.u.0, plane.home.u.1),
                    (center[1] - (now[1] - press_point[1])).clamp(plane.home.v.0, plane.home.v.1),
                ];
                plane.window = ViewWindow::centered(moved, press_window.half());
                Redraw::View(view)
            }
            Gesture::Zoom {
                view,
                center,
                press_half,
                press_scale,
                last_y,
            } => {
                let factor = 1.0 - (point[1] - last_y) / self.zoom.sensitivity;
                let plane = &mut self.views[view];
                plane.scale = (plane.scale * factor).clamp(self.zoom.min, self.zoom.max);
                let ratio = press_scale / plane.scale;
                plane.window =
                    ViewWindow::centered(center, [press_half[0] * ratio, press_half[1] * ratio]);
                self.gesture = Gesture::Zoom {
                    view,
                    center,
                    press_half,
                    press_scale,
                    last_y: point[1],
                };
                Redraw::View(view)
            }
            Gesture::Magnifier { view, start, .. } => {
                let plane = &self.views[view];
                let current = plane.window.clamp_point(plane.to_data(point));
                self.gesture = Gesture::Magnifier {
                    view,
                    start,
                    current,
                };
                Redraw::View(view)
            }
        }
    }

    pub fn release(&mut self, button: MouseButton) -> Redraw {
        if self.gesture.button() != Some(button) {
            return Redraw::None;
        }
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        match gesture {
            Gesture::Magnifier {
                view,
                start,
                current,
            } => {
                let side = (current[0] - start[0])
                    .abs()
                    .max((current[1] - start[1]).abs());
                if side <= 0.0 {
                    // A click without a drag leaves the view as it was.
                    return Redraw::View(view);
                }
                let center = [(start[0] + current[0]) / 2.0, (start[1] + current[1]) / 2.0];
                self.views[view].window = ViewWindow::centered(center, [side / 2.0; 2]);
                Redraw::View(view)
            }
            _ => Redraw::None,
        }
    }

    /// Steps the crosshair one voxel along the view's normal, regardless of
    /// the current gesture.
    pub fn scroll(&mut self, view: ViewId, delta: i32) -> Redraw {
        let Some(plane) = self.views.get(view) else {
            return Redraw::None;
        };
        let axis = plane.orientation.normal_axis();
        let mut target = self.crosshair.map(|c| c as i64);
        target[axis] += i64::from(delta.signum());
        self.apply_crosshair(target)
    }

    /// Restores every view's home window and unit zoom.
    pub fn reset_view(&mut self) -> Redraw {
        self.views.iter_mut().for_each(PlaneView::reset);
        self.gesture = Gesture::Idle;
        Redraw::All
    }

    fn move_crosshair(&mut self, view: ViewId, point: [f64; 2]) -> Redraw {
        let plane = &self.views[view];
        let [u, v] = plane.to_data(point);
        let orientation = plane.orientation;
        let k = self.crosshair[orientation.normal_axis()] as i64;
        let target = orientation.to_voxel(u.round() as i64, v.round() as i64, k, self.dim);
        self.apply_crosshair(target)
    }

    fn apply_crosshair(&mut self, target: [i64; 3]) -> Redraw {
        let clamped = self.offset.clamp(target);
        if clamped == self.crosshair {
            return Redraw::None;
        }
        self.crosshair = clamped;
        Redraw::All
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::Array3;

    use super::*;
    use crate::cube::to_cube;
    use crate::volume::Volume;

    const DISPLAY: [f64; 2] = [100.0, 100.0];

    fn controller(dim: [usize; 3]) -> InteractionController {
        InteractionController::new(
            dim,
            CubeOffset::identity(dim),
            &Orientation::ALL,
            DISPLAY,
            ZoomSettings::default(),
        )
    }

    #[test]
    fn display_to_data_flips_vertical_axis() {
        let ctl = controller([10, 10, 10]);
        let view = &ctl.views()[0];
        assert_eq!(view.to_data([0.0, 0.0]), [-0.5, 9.5]);
        assert_eq!(view.to_data([100.0, 100.0]), [9.5, -0.5]);
    }

    #[test]
    fn zoom_saturates_at_maximum() {
        let mut ctl = controller([10, 10, 10]);
        ctl.press(0, MouseButton::Secondary, [50.0, 50.0]);
        assert_eq!(ctl.state(), InteractionState::Zooming);
        let mut y = 50.0;
        for _ in 0..100 {
            y -= 10.0;
            ctl.motion([50.0, y]);
        }
        let view = &ctl.views()[0];
        assert_eq!(view.scale(), 2.0);
        assert_eq!(view.window().center(), [4.5, 4.5]);
        assert_relative_eq!(view.window().half()[0], 2.5);
        ctl.release(MouseButton::Secondary);
        assert_eq!(ctl.state(), InteractionState::Idle);
    }

    #[test]
    fn zoom_stays_in_bounds_for_any_motion() {
        let mut ctl = controller([8, 8, 8]);
        ctl.press(1, MouseButton::Secondary, [0.0, 0.0]);
        for (i, dy) in [30.0, -250.0, 400.0, -7.0, 1000.0, -90.0].iter().enumerate() {
            ctl.motion([0.0, dy * (i as f64 + 1.0)]);
            let scale = ctl.views()[1].scale();
            assert!((0.5..=2.0).contains(&scale), "scale {scale}");
        }
    }

    #[test]
    fn crosshair_drag_clamps_to_original_region() {
        let volume: Volume<u8> = Volume::new(Array3::zeros((2, 4, 4)));
        let (cube, offset) = to_cube(&volume);
        let mut ctl = InteractionController::new(
            cube.dim(),
            offset,
            &Orientation::ALL,
            DISPLAY,
            ZoomSettings::default(),
        );
        assert_eq!(ctl.crosshair(), [2, 2, 2]);

        // Axial view: u is x, which only spans cube coordinates 1..=2.
        assert_eq!(ctl.press(0, MouseButton::Primary, [-500.0, 50.0]), Redraw::All);
        assert_eq!(ctl.crosshair()[0], 1);
        ctl.motion([900.0, 900.0]);
        assert_eq!(ctl.crosshair(), [2, 0, 2]);
        ctl.release(MouseButton::Primary);
        assert_eq!(ctl.state(), InteractionState::Idle);
    }

    #[test]
    fn sagittal_drag_respects_mirrored_axis() {
        let mut ctl = controller([4, 4, 4]);
        // Left edge of the sagittal view is the highest y.
        ctl.press(1, MouseButton::Primary, [1.0, 50.0]);
        assert_eq!(ctl.crosshair()[1], 3);
    }

    #[test]
    fn second_button_is_ignored_during_a_gesture() {
        let mut ctl = controller([6, 6, 6]);
        ctl.press(0, MouseButton::Primary, [50.0, 50.0]);
        assert_eq!(ctl.press(0, MouseButton::Secondary, [10.0, 10.0]), Redraw::None);
        assert_eq!(ctl.state(), InteractionState::DraggingCrosshair);
        ctl.release(MouseButton::Secondary);
        assert_eq!(ctl.state(), InteractionState::DraggingCrosshair);
        ctl.release(MouseButton::Primary);
        assert_eq!(ctl.state(), InteractionState::Idle);
    }

    #[test]
    fn pan_follows_pointer_and_keeps_zoom() {
        let mut ctl = controller([10, 10, 10]);
        ctl.set_mode(PointerMode::Glove);
        ctl.press(0, MouseButton::Primary, [50.0, 50.0]);
        assert_eq!(ctl.state(), InteractionState::Panning);
        // 20 px right is 2 voxels of data; the window moves the other way.
        ctl.motion([70.0, 50.0]);
        let window = ctl.views()[0].window();
        assert_relative_eq!(window.center()[0], 2.5);
        assert_relative_eq!(window.half()[0], 5.0);
        assert_eq!(ctl.views()[0].scale(), 1.0);

        ctl.motion([5000.0, 50.0]);
        assert_relative_eq!(ctl.views()[0].window().center()[0], -0.5);
    }

    #[test]
    fn magnifier_zooms_to_centered_square() {
        let mut ctl = controller([10, 10, 10]);
        ctl.set_mode(PointerMode::Magnifier);
        ctl.press(2, MouseButton::Primary, [10.0, 90.0]);
        ctl.motion([50.0, 70.0]);
        assert!(ctl.magnifier_rect().is_some());
        ctl.release(MouseButton::Primary);

        let window = ctl.views()[2].window();
        assert_relative_eq!(window.half()[0], 2.0);
        assert_relative_eq!(window.half()[1], 2.0);
        assert_relative_eq!(window.center()[0], 2.5);
        assert_relative_eq!(window.center()[1], 1.5);
        assert!(ctl.magnifier_rect().is_none());
    }

    #[test]
    fn magnifier_click_without_drag_keeps_window() {
        let mut ctl = controller([10, 10, 10]);
        ctl.set_mode(PointerMode::Magnifier);
        let before = ctl.views()[0].window();
        ctl.press(0, MouseButton::Primary, [30.0, 30.0]);
        ctl.release(MouseButton::Primary);
        assert_eq!(ctl.views()[0].window(), before);
    }

    #[test]
    fn scroll_steps_normal_axis_and_clamps() {
        let mut ctl = controller([4, 4, 4]);
        assert_eq!(ctl.crosshair(), [2, 2, 2]);
        assert_eq!(ctl.scroll(0, 1), Redraw::All);
        assert_eq!(ctl.crosshair(), [2, 2, 3]);
        assert_eq!(ctl.scroll(0, 3), Redraw::None);
        assert_eq!(ctl.crosshair(), [2, 2, 3]);
        ctl.scroll(1, -1);
        assert_eq!(ctl.crosshair(), [1, 2, 3]);
    }

    #[test]
    fn reset_restores_home_windows() {
        let mut ctl = controller([10, 10, 10]);
        ctl.press(0, MouseButton::Secondary, [0.0, 50.0]);
        ctl.motion([0.0, 0.0]);
        assert_eq!(ctl.reset_view(), Redraw::All);
        assert_eq!(ctl.state(), InteractionState::Idle);
        for view in ctl.views() {
            assert_eq!(view.window(), view.home());
            assert_eq!(view.scale(), 1.0);
        }
    }
}
