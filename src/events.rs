//! Notifications from the core to the hosting GUI layer.
//!
//! The core never holds toolkit objects. It reports control availability,
//! redraw requests, capture progress and user-facing errors through
//! [`ViewerEvents`]; every method defaults to doing nothing.

use crate::enums::Category;

/// Controls whose availability the core decides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Control {
    LabelInput,
    PredictionInput,
    /// Selector entry for label id 1..=5.
    LabelSelector(u8),
    CategorySelector(Category),
    LabelOpacity,
    PredictionOpacity,
    OrientationSelector,
    SliceSlider,
    Render,
    SavePng,
    SaveVideo,
}

/// Identifies one plane view inside a viewer.
pub type ViewId = usize;

pub trait ViewerEvents {
    fn on_control_enabled(&mut self, _control: Control, _enabled: bool) {}

    /// Slider bounds changed, e.g. after an orientation switch.
    fn on_slice_range(&mut self, _min: usize, _max: usize, _value: usize) {}

    fn on_view_changed(&mut self, _view: ViewId) {}

    fn on_progress(&mut self, _current: usize, _total: usize) {}

    /// Fire-and-forget user-facing error surface.
    fn report_error(&mut self, _message: &str) {}
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl ViewerEvents for NoEvents {}

/// Forwards errors to the log; used by the command line front end.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEvents;

impl ViewerEvents for LogEvents {
    fn on_progress(&mut self, current: usize, total: usize) {
        log::debug!("Frame {current}/{total}");
    }

    fn report_error(&mut self, message: &str) {
        log::error!("{message}");
    }
}
