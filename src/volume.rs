use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::Array3;
use ndarray::Zip;

use crate::enums::{Category, Slot};
use crate::error::StoreError;
use crate::events::{Control, ViewerEvents};
use crate::mask::{self, DerivedMask};

/// Highest label id that gets a selector entry.
pub const MAX_LABEL_ID: u8 = 5;

static NEXT_VOLUME_ID: AtomicU64 = AtomicU64::new(1);

/// An immutable 3D grid indexed `[x, y, z]`.
#[derive(Debug, Clone)]
pub struct Volume<T> {
    data: Array3<T>,
    spacing: (f32, f32, f32),
    id: u64,
}

pub type IntensityVolume = Volume<f32>;
pub type LabelVolume = Volume<u8>;

impl<T> Volume<T> {
    pub fn new(data: Array3<T>) -> Self {
        Self::with_spacing(data, (1.0, 1.0, 1.0))
    }

    pub fn with_spacing(data: Array3<T>, spacing: (f32, f32, f32)) -> Self {
        Self {
            data,
            spacing,
            id: NEXT_VOLUME_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Get the dimensions of the volume `[nx, ny, nz]`
    pub fn dim(&self) -> [usize; 3] {
        let (nx, ny, nz) = self.data.dim();
        [nx, ny, nz]
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    /// Voxel spacing along x, y and z.
    pub fn spacing(&self) -> (f32, f32, f32) {
        self.spacing
    }

    /// Identity of this grid's contents; clones share it.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn get(&self, voxel: [usize; 3]) -> Option<&T> {
        self.data.get(voxel)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl IntensityVolume {
    /// Minimum and maximum intensity, used to normalise to grayscale.
    pub fn value_range(&self) -> (f32, f32) {
        Zip::from(&self.data).par_fold(
            || (f32::INFINITY, f32::NEG_INFINITY),
            |(lo, hi), &v| (lo.min(v), hi.max(v)),
            |(a_lo, a_hi), (b_lo, b_hi)| (a_lo.min(b_lo), a_hi.max(b_hi)),
        )
    }

    /// Rounds intensities to label ids, saturating at 0 and 255.
    pub fn to_labels(&self) -> LabelVolume {
        Volume::with_spacing(
            self.data.mapv(|v| v.round().clamp(0.0, 255.0) as u8),
            self.spacing,
        )
    }
}

impl LabelVolume {
    pub fn max_value(&self) -> u8 {
        Zip::from(&self.data).par_fold(|| 0u8, |acc, &v| acc.max(v), u8::max)
    }

    pub fn contains_value(&self, value: u8) -> bool {
        self.data.iter().any(|&v| v == value)
    }

    /// Number of non-background voxels.
    pub fn count_nonzero(&self) -> usize {
        Zip::from(&self.data).par_fold(|| 0usize, |acc, &v| acc + usize::from(v != 0), |a, b| a + b)
    }
}

/// Owns the intensity, label and prediction volumes of one viewer and the
/// derived classification masks computed from them.
///
/// Label and prediction volumes must share the intensity volume's shape.
/// Replacing or clearing a slot drops everything derived from it and
/// notifies the GUI layer about which inputs are now usable.
#[derive(Default)]
pub struct VolumeStore {
    intensity: Option<Arc<IntensityVolume>>,
    label: Option<Arc<LabelVolume>>,
    prediction: Option<Arc<LabelVolume>>,
    max_label: u8,
    derived: HashMap<Category, DerivedMask>,
}

impl VolumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intensity(&self) -> Option<&Arc<IntensityVolume>> {
        self.intensity.as_ref()
    }

    pub fn label(&self) -> Option<&Arc<LabelVolume>> {
        self.label.as_ref()
    }

    pub fn prediction(&self) -> Option<&Arc<LabelVolume>> {
        self.prediction.as_ref()
    }

    pub fn set_intensity(
        &mut self,
        volume: impl Into<Arc<IntensityVolume>>,
        events: &mut dyn ViewerEvents,
    ) -> Result<(), StoreError> {
        let volume = volume.into();
        if volume.is_empty() {
            return Err(StoreError::EmptyVolume(Slot::Intensity));
        }
        let dim = volume.dim();
        log::info!("Intensity volume set: {dim:?}");
        self.intensity = Some(volume);

        // Overlays that no longer line up with the new grid are dropped.
        if self.label.as_ref().is_some_and(|l| l.dim() != dim) {
            log::warn!("Dropping label volume: shape no longer matches intensity volume");
            self.clear(Slot::Label, events);
        }
        if self.prediction.as_ref().is_some_and(|p| p.dim() != dim) {
            log::warn!("Dropping prediction volume: shape no longer matches intensity volume");
            self.clear(Slot::Prediction, events);
        }

        for control in [Control::LabelInput, Control::OrientationSelector, Control::Render] {
            events.on_control_enabled(control, true);
        }
        Ok(())
    }

    pub fn set_label(
        &mut self,
        volume: impl Into<Arc<LabelVolume>>,
        events: &mut dyn ViewerEvents,
    ) -> Result<(), StoreError> {
        let volume = volume.into();
        self.check_shape(Slot::Label, &volume)?;
        self.max_label = volume.max_value().min(MAX_LABEL_ID);
        log::info!("Label volume set, highest label id {}", self.max_label);
        self.label = Some(volume);
        self.derived.clear();
        events.on_control_enabled(Control::PredictionInput, true);
        Ok(())
    }

    pub fn set_prediction(
        &mut self,
        volume: impl Into<Arc<LabelVolume>>,
        _events: &mut dyn ViewerEvents,
    ) -> Result<(), StoreError> {
        let volume = volume.into();
        self.check_shape(Slot::Prediction, &volume)?;
        log::info!("Prediction volume set");
        self.prediction = Some(volume);
        self.derived.clear();
        Ok(())
    }

    /// Empties `slot` and everything that depends on it.
    pub fn clear(&mut self, slot: Slot, events: &mut dyn ViewerEvents) {
        log::debug!("Clearing {slot} slot");
        match slot {
            Slot::Intensity => {
                self.intensity = None;
                self.clear(Slot::Label, events);
                for control in [
                    Control::LabelInput,
                    Control::OrientationSelector,
                    Control::SliceSlider,
                    Control::Render,
                    Control::SavePng,
                    Control::SaveVideo,
                ] {
                    events.on_control_enabled(control, false);
                }
            }
            Slot::Label => {
                self.label = None;
                self.max_label = 0;
                self.clear(Slot::Prediction, events);
                events.on_control_enabled(Control::LabelOpacity, false);
                events.on_control_enabled(Control::PredictionInput, false);
            }
            Slot::Prediction => {
                self.prediction = None;
                events.on_control_enabled(Control::PredictionOpacity, false);
            }
        }
        self.derived.clear();
    }

    /// Highest non-background label id present, capped at [`MAX_LABEL_ID`];
    /// 0 when no label volume is loaded.
    pub fn max_label_value(&self) -> u8 {
        self.max_label
    }

    /// The classification mask for `category`, computed on first use.
    pub fn derived(&mut self, category: Category) -> Result<&DerivedMask, StoreError> {
        if !self.derived.contains_key(&category) {
            let gt = self.label.as_ref().ok_or(StoreError::MissingVolume(Slot::Label))?;
            let pred = self
                .prediction
                .as_ref()
                .ok_or(StoreError::MissingVolume(Slot::Prediction))?;
            let mask = match category {
                Category::TruePositive => mask::and(gt, pred)?,
                Category::FalsePositive => mask::false_positive(gt, pred)?,
                Category::FalseNegative => mask::false_negative(gt, pred)?,
            };
            if mask.is_empty() {
                log::debug!("{} mask is empty", category.short_name());
            }
            self.derived.insert(category, mask);
        }
        Ok(&self.derived[&category])
    }

    fn check_shape(&self, slot: Slot, volume: &LabelVolume) -> Result<(), StoreError> {
        let intensity = self
            .intensity
            .as_ref()
            .ok_or(StoreError::MissingVolume(Slot::Intensity))?;
        if volume.dim() != intensity.dim() {
            log::warn!(
                "Rejected {slot} volume {:?}, expected {:?}",
                volume.dim(),
                intensity.dim()
            );
            return Err(StoreError::ShapeMismatch {
                slot,
                expected: intensity.dim(),
                found: volume.dim(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::testing::Recorder;

    fn intensity(dim: (usize, usize, usize)) -> IntensityVolume {
        Volume::new(Array3::zeros(dim))
    }

    fn labels(dim: (usize, usize, usize), fill: &[((usize, usize, usize), u8)]) -> LabelVolume {
        let mut data = Array3::zeros(dim);
        for &(voxel, value) in fill {
            data[voxel] = value;
        }
        Volume::new(data)
    }

    #[test]
    fn label_with_mismatched_shape_is_rejected_and_prior_state_kept() {
        let mut store = VolumeStore::new();
        let mut events = Recorder::default();
        store.set_intensity(intensity((4, 4, 4)), &mut events).unwrap();
        store
            .set_label(labels((4, 4, 4), &[((0, 0, 0), 2)]), &mut events)
            .unwrap();

        let err = store
            .set_label(labels((4, 4, 5), &[]), &mut events)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::ShapeMismatch { slot: Slot::Label, expected: [4, 4, 4], found: [4, 4, 5] }
        ));
        assert_eq!(store.max_label_value(), 2);
        assert!(store.label().is_some());
    }

    #[test]
    fn label_requires_intensity() {
        let mut store = VolumeStore::new();
        let err = store
            .set_label(labels((2, 2, 2), &[]), &mut Recorder::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingVolume(Slot::Intensity)));
    }

    #[test]
    fn max_label_value_is_capped() {
        let mut store = VolumeStore::new();
        let mut events = Recorder::default();
        store.set_intensity(intensity((3, 3, 3)), &mut events).unwrap();
        store
            .set_label(labels((3, 3, 3), &[((1, 1, 1), 9), ((0, 0, 0), 3)]), &mut events)
            .unwrap();
        assert_eq!(store.max_label_value(), 5);
    }

    #[test]
    fn clearing_label_drops_prediction_and_disables_dependents() {
        let mut store = VolumeStore::new();
        let mut events = Recorder::default();
        store.set_intensity(intensity((2, 2, 2)), &mut events).unwrap();
        store.set_label(labels((2, 2, 2), &[((0, 0, 0), 1)]), &mut events).unwrap();
        store.set_prediction(labels((2, 2, 2), &[]), &mut events).unwrap();
        assert!(store.derived(Category::FalseNegative).unwrap().volume().is_some());

        store.clear(Slot::Label, &mut events);
        assert!(store.prediction().is_none());
        assert_eq!(store.max_label_value(), 0);
        assert_eq!(events.enabled(Control::PredictionInput), Some(false));
        assert!(matches!(
            store.derived(Category::TruePositive),
            Err(StoreError::MissingVolume(Slot::Label))
        ));
    }

    #[test]
    fn new_intensity_of_other_shape_drops_overlays() {
        let mut store = VolumeStore::new();
        let mut events = Recorder::default();
        store.set_intensity(intensity((2, 2, 2)), &mut events).unwrap();
        store.set_label(labels((2, 2, 2), &[]), &mut events).unwrap();
        store.set_intensity(intensity((2, 2, 3)), &mut events).unwrap();
        assert!(store.label().is_none());

        store.set_label(labels((2, 2, 3), &[]), &mut events).unwrap();
        store.set_intensity(intensity((2, 2, 3)), &mut events).unwrap();
        assert!(store.label().is_some());
    }

    #[test]
    fn empty_grid_is_refused() {
        let mut store = VolumeStore::new();
        let err = store
            .set_intensity(intensity((0, 3, 3)), &mut Recorder::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::EmptyVolume(Slot::Intensity)));
    }

    #[test]
    fn value_range_spans_all_voxels() {
        let mut data = Array3::zeros((2, 2, 2));
        data[[1, 0, 1]] = 7.5;
        data[[0, 1, 0]] = -2.0;
        assert_eq!(Volume::new(data).value_range(), (-2.0, 7.5));
    }
}
