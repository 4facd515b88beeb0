//! Viewers that turn volumes into composited RGB rasters.
//!
//! - [`SliceViewer`]: one plane with label and classification overlays.
//! - [`OrthoViewer`]: three cube-padded planes following a shared crosshair.
//! - [`GridViewer`]: up to four volumes side by side at the same slice.
//!
//! Rasters are `[u, v]` planes of [`Rgb`]; as images they have `v = 0` in
//! the first row, which is the bottom of what is displayed.

use std::sync::Arc;

use image::{RgbImage, imageops};
use ndarray::Array2;

use crate::capture::{RenderTarget, SweepTarget};
use crate::config::ViewerConfig;
use crate::cube::{CubeOffset, to_cube};
use crate::enums::{Category, MouseButton, Orientation, PointerMode, Slot};
use crate::error::{CaptureError, StoreError};
use crate::events::{Control, ViewerEvents};
use crate::interaction::{InteractionController, Redraw};
use crate::overlay::{
    ColorMap, GrayWindow, LUT_SIZE, Lut, Rgb, apply_lut, blend, build_lut, composite_over,
    draw_crosshair, gray_to_rgb, to_rgb_image,
};
use crate::reslice::{PlaneCache, ReslicePlane, extract};
use crate::selection::{CategorySelection, LabelSelection, Selectors};
use crate::volume::{IntensityVolume, LabelVolume, VolumeStore};
use crate::worker::{PreparedGrid, PreparedPanel};

/// Raster as an image with the top row first, ready for display.
pub fn display_image(raster: &Array2<Rgb>) -> RgbImage {
    let mut image = to_rgb_image(raster.view());
    imageops::flip_vertical_in_place(&mut image);
    image
}

fn window_of(volume: &IntensityVolume) -> GrayWindow {
    let (min, max) = volume.value_range();
    GrayWindow::new(min, max)
}

/// Single reslice plane of an intensity volume with its label and
/// prediction overlays.
pub struct SliceViewer {
    store: VolumeStore,
    selectors: Selectors,
    label_colors: ColorMap,
    category_colors: [ColorMap; 3],
    label_opacity: f32,
    prediction_opacity: f32,
    position: Option<ReslicePlane>,
    window: GrayWindow,
    base_cache: PlaneCache<f32>,
    label_cache: PlaneCache<u8>,
    mask_caches: [PlaneCache<u8>; 3],
    labels: LabelSelection,
    categories: CategorySelection,
    label_lut: Lut,
    category_luts: [Lut; 3],
    raster: Option<Array2<Rgb>>,
    offscreen: bool,
}

impl SliceViewer {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            store: VolumeStore::new(),
            selectors: Selectors::new(&config.colors),
            label_colors: ColorMap::from_scheme(&config.colors),
            category_colors: Category::ALL.map(|c| ColorMap::single(config.colors.category_color(c))),
            label_opacity: config.label_opacity.clamp(0.0, 1.0),
            prediction_opacity: config.prediction_opacity.clamp(0.0, 1.0),
            position: None,
            window: GrayWindow::new(0.0, 1.0),
            base_cache: PlaneCache::default(),
            label_cache: PlaneCache::default(),
            mask_caches: Default::default(),
            labels: LabelSelection::default(),
            categories: CategorySelection::default(),
            label_lut: [[0.0; 4]; LUT_SIZE],
            category_luts: [[[0.0; 4]; LUT_SIZE]; 3],
            raster: None,
            offscreen: false,
        }
    }

    pub fn store(&self) -> &VolumeStore {
        &self.store
    }

    pub fn selectors(&self) -> &Selectors {
        &self.selectors
    }

    pub fn position(&self) -> Option<&ReslicePlane> {
        self.position.as_ref()
    }

    /// Last composited plane, if anything has been rendered.
    pub fn raster(&self) -> Option<&Array2<Rgb>> {
        self.raster.as_ref()
    }

    pub fn image(&self) -> Option<RgbImage> {
        self.raster.as_ref().map(display_image)
    }

    pub fn is_offscreen(&self) -> bool {
        self.offscreen
    }

    pub fn set_intensity(
        &mut self,
        volume: impl Into<Arc<IntensityVolume>>,
        events: &mut dyn ViewerEvents,
    ) -> Result<(), StoreError> {
        let volume = volume.into();
        self.store.set_intensity(volume.clone(), events)?;
        self.window = window_of(&volume);
        let orientation = self.position.map(|p| p.orientation()).unwrap_or_default();
        self.position = Some(ReslicePlane::new(volume.dim(), orientation));
        self.raster = None;
        self.sync_selectors(events);
        Ok(())
    }

    pub fn set_label(
        &mut self,
        volume: impl Into<Arc<LabelVolume>>,
        events: &mut dyn ViewerEvents,
    ) -> Result<(), StoreError> {
        self.store.set_label(volume, events)?;
        self.sync_selectors(events);
        Ok(())
    }

    pub fn set_prediction(
        &mut self,
        volume: impl Into<Arc<LabelVolume>>,
        events: &mut dyn ViewerEvents,
    ) -> Result<(), StoreError> {
        self.store.set_prediction(volume, events)?;
        self.sync_selectors(events);
        Ok(())
    }

    pub fn clear(&mut self, slot: Slot, events: &mut dyn ViewerEvents) {
        self.store.clear(slot, events);
        if slot == Slot::Intensity {
            self.position = None;
            self.raster = None;
        }
        self.sync_selectors(events);
    }

    pub fn set_label_checked(&mut self, id: u8, checked: bool, events: &mut dyn ViewerEvents) {
        self.selectors.set_label_checked(id, checked);
        self.selectors.update_opacity_controls(events);
    }

    pub fn set_category_checked(
        &mut self,
        category: Category,
        checked: bool,
        events: &mut dyn ViewerEvents,
    ) {
        self.selectors.set_category_checked(category, checked);
        self.selectors.update_opacity_controls(events);
    }

    fn sync_selectors(&mut self, events: &mut dyn ViewerEvents) {
        let comparable = self.store.label().is_some() && self.store.prediction().is_some();
        self.selectors
            .sync(self.store.max_label_value(), comparable, events);
        self.selectors.update_opacity_controls(events);
    }

    /// Takes a fresh selection snapshot and recomposes the plane.
    pub fn render(&mut self, events: &mut dyn ViewerEvents) -> Result<(), StoreError> {
        self.labels = self.selectors.label_snapshot();
        self.categories = self.selectors.category_snapshot();
        self.rebuild_luts();
        self.compose()?;

        if let Some(position) = self.position {
            let (min, max) = position.slice_range();
            events.on_slice_range(min, max, position.slice());
        }
        for control in [Control::SliceSlider, Control::SavePng, Control::SaveVideo] {
            events.on_control_enabled(control, true);
        }
        events.on_view_changed(0);
        Ok(())
    }

    /// Switches orientation; the slice resets to the new midpoint.
    pub fn set_orientation(
        &mut self,
        orientation: Orientation,
        events: &mut dyn ViewerEvents,
    ) -> Result<(), StoreError> {
        let position = self
            .position
            .as_mut()
            .ok_or(StoreError::MissingVolume(Slot::Intensity))?;
        let slice = position.set_orientation(orientation);
        let (min, max) = position.slice_range();
        log::debug!("Orientation {orientation}, slice {slice} of {max}");
        events.on_slice_range(min, max, slice);
        self.refresh(events)
    }

    /// Moves to `slice` (clamped) and returns the slice shown.
    pub fn set_slice(
        &mut self,
        slice: usize,
        events: &mut dyn ViewerEvents,
    ) -> Result<usize, StoreError> {
        let position = self
            .position
            .as_mut()
            .ok_or(StoreError::MissingVolume(Slot::Intensity))?;
        let slice = position.set_slice(slice);
        self.refresh(events)?;
        Ok(slice)
    }

    /// Only the lookup table changes; cached planes are reused.
    pub fn set_label_opacity(
        &mut self,
        opacity: f32,
        events: &mut dyn ViewerEvents,
    ) -> Result<(), StoreError> {
        self.label_opacity = opacity.clamp(0.0, 1.0);
        self.rebuild_luts();
        self.refresh(events)
    }

    pub fn set_prediction_opacity(
        &mut self,
        opacity: f32,
        events: &mut dyn ViewerEvents,
    ) -> Result<(), StoreError> {
        self.prediction_opacity = opacity.clamp(0.0, 1.0);
        self.rebuild_luts();
        self.refresh(events)
    }

    /// Recomposes an already rendered view with the current snapshot.
    fn refresh(&mut self, events: &mut dyn ViewerEvents) -> Result<(), StoreError> {
        if self.raster.is_some() {
            self.compose()?;
            events.on_view_changed(0);
        }
        Ok(())
    }

    fn rebuild_luts(&mut self) {
        self.label_lut = build_lut(&self.label_colors, self.label_opacity, Some(&self.labels));
        for category in Category::ALL {
            self.category_luts[category.index()] = build_lut(
                &self.category_colors[category.index()],
                self.prediction_opacity,
                None,
            );
        }
    }

    /// Base, then labels, then tp, fp and fn; Empty masks are skipped.
    fn compose(&mut self) -> Result<(), StoreError> {
        let (Some(intensity), Some(position)) = (self.store.intensity().cloned(), self.position)
        else {
            return Err(StoreError::MissingVolume(Slot::Intensity));
        };

        let mut raster = gray_to_rgb(self.base_cache.plane(&intensity, &position), self.window);

        if !self.labels.is_empty() {
            if let Some(label) = self.store.label().cloned() {
                let layer = apply_lut(self.label_cache.plane(&label, &position), &self.label_lut);
                composite_over(&mut raster, layer.view());
            }
        }

        let categories = self.categories;
        for category in categories.iter() {
            let Some(mask) = self.store.derived(category)?.volume().cloned() else {
                continue;
            };
            let i = category.index();
            let layer = apply_lut(self.mask_caches[i].plane(&mask, &position), &self.category_luts[i]);
            composite_over(&mut raster, layer.view());
        }

        self.raster = Some(raster);
        Ok(())
    }
}

impl RenderTarget for SliceViewer {
    fn set_offscreen(&mut self, offscreen: bool) {
        self.offscreen = offscreen;
    }

    fn render(&mut self) -> Result<(), CaptureError> {
        self.compose()
            .map_err(|err| CaptureError::Render(err.to_string()))
    }

    fn read_back(&mut self) -> Result<RgbImage, CaptureError> {
        self.raster
            .as_ref()
            .map(|raster| to_rgb_image(raster.view()))
            .ok_or_else(|| CaptureError::Render("nothing rendered".into()))
    }
}

impl SweepTarget for SliceViewer {
    fn slice_range(&self) -> (usize, usize) {
        self.position.map_or((1, 1), |p| p.slice_range())
    }

    fn current_slice(&self) -> usize {
        self.position.map_or(1, |p| p.slice())
    }

    fn set_slice(&mut self, slice: usize) {
        if let Some(position) = self.position.as_mut() {
            position.set_slice(slice);
        }
    }
}

/// Axial, sagittal and coronal planes through one crosshair.
///
/// Volumes are padded to a cube first so all three views share one scale.
/// Crosshair coordinates are cube coordinates, clamped to the original
/// region; slice numbers shown to users count from the original volume.
pub struct OrthoViewer {
    intensity: Arc<IntensityVolume>,
    label: Option<Arc<LabelVolume>>,
    offset: CubeOffset,
    window: GrayWindow,
    controller: InteractionController,
    colors: ColorMap,
    crosshair_color: Rgb,
    selection: LabelSelection,
    opacity: f32,
    caches: Vec<(PlaneCache<f32>, PlaneCache<u8>)>,
}

impl OrthoViewer {
    pub fn new(
        intensity: &IntensityVolume,
        label: Option<&LabelVolume>,
        config: &ViewerConfig,
        display: [f64; 2],
    ) -> Result<Self, StoreError> {
        if let Some(label) = label {
            if label.dim() != intensity.dim() {
                return Err(StoreError::ShapeMismatch {
                    slot: Slot::Label,
                    expected: intensity.dim(),
                    found: label.dim(),
                });
            }
        }
        let window = window_of(intensity);
        let (cube, offset) = to_cube(intensity);
        let label = label.map(|l| Arc::new(to_cube(l).0));
        log::debug!(
            "Padded {:?} to {:?}, offsets {:?}",
            intensity.dim(),
            cube.dim(),
            offset.before()
        );

        let controller = InteractionController::new(
            cube.dim(),
            offset,
            &Orientation::ALL,
            display,
            config.zoom,
        );
        Ok(Self {
            intensity: Arc::new(cube),
            label,
            offset,
            window,
            controller,
            colors: ColorMap::from_scheme(&config.colors),
            crosshair_color: config.crosshair_color,
            selection: LabelSelection::default(),
            opacity: config.label_opacity.clamp(0.0, 1.0),
            caches: Orientation::ALL
                .iter()
                .map(|_| (PlaneCache::default(), PlaneCache::default()))
                .collect(),
        })
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn offset(&self) -> &CubeOffset {
        &self.offset
    }

    pub fn set_mode(&mut self, mode: PointerMode) {
        self.controller.set_mode(mode);
    }

    pub fn set_selection(&mut self, selection: LabelSelection, events: &mut dyn ViewerEvents) {
        self.selection = selection;
        self.notify(Redraw::All, events);
    }

    pub fn set_opacity(&mut self, opacity: f32, events: &mut dyn ViewerEvents) {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.notify(Redraw::All, events);
    }

    pub fn press(
        &mut self,
        view: usize,
        button: MouseButton,
        point: [f64; 2],
        events: &mut dyn ViewerEvents,
    ) {
        let redraw = self.controller.press(view, button, point);
        self.notify(redraw, events);
    }

    pub fn motion(&mut self, point: [f64; 2], events: &mut dyn ViewerEvents) {
        let redraw = self.controller.motion(point);
        self.notify(redraw, events);
    }

    pub fn release(&mut self, button: MouseButton, events: &mut dyn ViewerEvents) {
        let redraw = self.controller.release(button);
        self.notify(redraw, events);
    }

    pub fn scroll(&mut self, view: usize, delta: i32, events: &mut dyn ViewerEvents) {
        let redraw = self.controller.scroll(view, delta);
        self.notify(redraw, events);
    }

    /// Home windows, unit zoom, and a redraw of every view with the current
    /// selection and opacity.
    pub fn reset_view(&mut self, events: &mut dyn ViewerEvents) {
        let redraw = self.controller.reset_view();
        self.notify(redraw, events);
    }

    fn notify(&self, redraw: Redraw, events: &mut dyn ViewerEvents) {
        match redraw {
            Redraw::None => {}
            Redraw::View(view) => events.on_view_changed(view),
            Redraw::All => (0..self.controller.views().len()).for_each(|v| events.on_view_changed(v)),
        }
    }

    /// 1-based slice numbers of the axial, sagittal and coronal views,
    /// counted in the original volume.
    pub fn slice_numbers(&self) -> [usize; 3] {
        let crosshair = self.controller.crosshair();
        Orientation::ALL.map(|o| {
            let axis = o.normal_axis();
            self.offset.display_slice(axis, crosshair[axis])
        })
    }

    /// Crosshair in original, unpadded voxel coordinates.
    pub fn crosshair(&self) -> [usize; 3] {
        let cube = self.controller.crosshair();
        self.offset
            .to_original(cube)
            .unwrap_or_else(|| self.offset.clamp(cube.map(|c| c as i64)))
    }

    /// Composited plane of `view` with the crosshair lines drawn in.
    pub fn render_view(&mut self, view: usize) -> Option<Array2<Rgb>> {
        let orientation = self.controller.view(view)?.orientation();
        let dim = self.intensity.dim();
        let (u, v, k) = orientation.to_plane(self.controller.crosshair(), dim);
        let mut position = ReslicePlane::new(dim, orientation);
        position.set_slice(k + 1);

        let (base_cache, label_cache) = self.caches.get_mut(view)?;
        let base = base_cache.plane(&self.intensity, &position);
        let mut raster = match &self.label {
            Some(label) => blend(
                base,
                self.window,
                label_cache.plane(label, &position),
                &self.selection,
                &self.colors,
                self.opacity,
            ),
            None => gray_to_rgb(base, self.window),
        };
        draw_crosshair(&mut raster, u, v, self.crosshair_color);
        Some(raster)
    }
}

/// Up to four volumes shown side by side at a shared orientation and slice.
///
/// Built only from a [`PreparedGrid`], once every panel has been loaded.
pub struct GridViewer {
    panels: Vec<PreparedPanel>,
    orientation: Orientation,
    slice: usize,
    colors: ColorMap,
    selection: LabelSelection,
    opacity: f32,
    raster: Option<Vec<Array2<Rgb>>>,
    offscreen: bool,
}

/// Grid overlays stay faint so the anatomy remains readable.
pub const MAX_GRID_OPACITY: f32 = 0.4;

impl GridViewer {
    pub fn from_prepared(grid: PreparedGrid, config: &ViewerConfig) -> Self {
        let panels = grid.into_panels();
        let orientation = Orientation::default();
        let mut viewer = Self {
            panels,
            orientation,
            slice: 1,
            colors: ColorMap::from_scheme(&config.colors),
            selection: LabelSelection::default(),
            opacity: config.grid_opacity.clamp(0.0, MAX_GRID_OPACITY),
            raster: None,
            offscreen: false,
        };
        viewer.slice = viewer.reference().map_or(1, |p| p.slice());
        viewer
    }

    /// Slice bounds follow the first panel.
    fn reference(&self) -> Option<ReslicePlane> {
        self.panels
            .first()
            .map(|p| ReslicePlane::new(p.intensity.dim(), self.orientation))
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn slice(&self) -> usize {
        self.slice
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_orientation(&mut self, orientation: Orientation, events: &mut dyn ViewerEvents) {
        self.orientation = orientation;
        if let Some(reference) = self.reference() {
            self.slice = reference.slice();
            let (min, max) = reference.slice_range();
            events.on_slice_range(min, max, self.slice);
        }
        self.raster = None;
    }

    pub fn set_slice(&mut self, slice: usize) -> usize {
        self.slice = match self.reference() {
            Some(mut reference) => reference.set_slice(slice),
            None => 1,
        };
        self.slice
    }

    pub fn set_selection(&mut self, selection: LabelSelection) {
        self.selection = selection;
    }

    /// Clamped to `[0, MAX_GRID_OPACITY]`.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, MAX_GRID_OPACITY);
    }

    /// One composited plane per panel.
    pub fn render_panels(&self) -> Vec<Array2<Rgb>> {
        self.panels
            .iter()
            .map(|panel| {
                let mut position = ReslicePlane::new(panel.intensity.dim(), self.orientation);
                position.set_slice(self.slice);
                let base = extract(&panel.intensity, self.orientation, position.slice());
                match &panel.label {
                    Some(label) => {
                        let labels = extract(label, self.orientation, position.slice());
                        blend(
                            base.view(),
                            panel.window,
                            labels.view(),
                            &self.selection,
                            &self.colors,
                            self.opacity,
                        )
                    }
                    None => gray_to_rgb(base.view(), panel.window),
                }
            })
            .collect()
    }

    /// Panels concatenated left to right, bottom row first. Shorter panels
    /// are padded with black at the top.
    pub fn concatenate(panels: &[Array2<Rgb>]) -> RgbImage {
        let width: usize = panels.iter().map(|p| p.dim().0).sum();
        let height = panels.iter().map(|p| p.dim().1).max().unwrap_or(0);
        let mut image = RgbImage::new(width as u32, height as u32);
        let mut x = 0;
        for panel in panels {
            imageops::replace(&mut image, &to_rgb_image(panel.view()), x as i64, 0);
            x += panel.dim().0;
        }
        image
    }
}

impl RenderTarget for GridViewer {
    fn set_offscreen(&mut self, offscreen: bool) {
        self.offscreen = offscreen;
    }

    fn render(&mut self) -> Result<(), CaptureError> {
        if self.panels.is_empty() {
            return Err(CaptureError::Render("grid has no panels".into()));
        }
        self.raster = Some(self.render_panels());
        Ok(())
    }

    fn read_back(&mut self) -> Result<RgbImage, CaptureError> {
        self.raster
            .as_deref()
            .map(Self::concatenate)
            .ok_or_else(|| CaptureError::Render("nothing rendered".into()))
    }
}

impl SweepTarget for GridViewer {
    fn slice_range(&self) -> (usize, usize) {
        self.reference().map_or((1, 1), |r| r.slice_range())
    }

    fn current_slice(&self) -> usize {
        self.slice
    }

    fn set_slice(&mut self, slice: usize) {
        GridViewer::set_slice(self, slice);
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::*;
    use crate::events::testing::Recorder;
    use crate::volume::Volume;

    fn ramp(dim: (usize, usize, usize)) -> IntensityVolume {
        Volume::new(Array3::from_shape_fn(dim, |(x, y, z)| (x + y + z) as f32))
    }

    fn loaded(dim: (usize, usize, usize)) -> (SliceViewer, Recorder) {
        let mut viewer = SliceViewer::new(&ViewerConfig::default());
        let mut events = Recorder::default();
        viewer.set_intensity(ramp(dim), &mut events).unwrap();
        (viewer, events)
    }

    #[test]
    fn render_enables_capture_controls_and_reports_range() {
        let (mut viewer, mut events) = loaded((4, 6, 8));
        assert_eq!(events.enabled(Control::Render), Some(true));
        assert_eq!(events.enabled(Control::SavePng), None);

        viewer.render(&mut events).unwrap();
        assert_eq!(events.enabled(Control::SavePng), Some(true));
        assert_eq!(events.slice_ranges.last(), Some(&(1, 8, 4)));
        assert_eq!(viewer.raster().unwrap().dim(), (4, 6));
    }

    #[test]
    fn orientation_change_resets_slice_and_range() {
        let (mut viewer, mut events) = loaded((4, 6, 8));
        viewer.render(&mut events).unwrap();
        viewer.set_slice(7, &mut events).unwrap();
        viewer
            .set_orientation(Orientation::Coronal, &mut events)
            .unwrap();
        assert_eq!(events.slice_ranges.last(), Some(&(1, 6, 3)));
        assert_eq!(viewer.raster().unwrap().dim(), (4, 8));
    }

    #[test]
    fn opacity_change_reuses_cached_planes() {
        let (mut viewer, mut events) = loaded((3, 3, 3));
        viewer.render(&mut events).unwrap();
        viewer.set_label_opacity(0.9, &mut events).unwrap();
        viewer.set_prediction_opacity(0.1, &mut events).unwrap();
        assert_eq!(viewer.base_cache.extractions(), 1);
    }

    #[test]
    fn unchecked_labels_are_not_drawn() {
        let (mut viewer, mut events) = loaded((2, 2, 1));
        let mut labels = Array3::zeros((2, 2, 1));
        labels[[0, 0, 0]] = 1u8;
        viewer.set_label(Volume::new(labels), &mut events).unwrap();
        viewer.render(&mut events).unwrap();
        let plain = viewer.raster().unwrap().clone();

        viewer.set_label_checked(1, true, &mut events);
        assert_eq!(events.enabled(Control::LabelOpacity), Some(true));
        viewer.render(&mut events).unwrap();
        let raster = viewer.raster().unwrap();
        assert_ne!(raster[[0, 0]], plain[[0, 0]]);
        assert_eq!(raster[[1, 1]], plain[[1, 1]]);
    }

    #[test]
    fn empty_category_mask_is_skipped() {
        let (mut viewer, mut events) = loaded((2, 2, 1));
        let labels = Volume::new(Array3::from_elem((2, 2, 1), 1u8));
        viewer.set_label(labels.clone(), &mut events).unwrap();
        viewer.set_prediction(labels, &mut events).unwrap();
        viewer.set_category_checked(Category::FalsePositive, true, &mut events);
        viewer.render(&mut events).unwrap();
        let without = viewer.raster().unwrap().clone();

        viewer.set_category_checked(Category::FalsePositive, false, &mut events);
        viewer.render(&mut events).unwrap();
        assert_eq!(viewer.raster().unwrap(), &without);
    }

    #[test]
    fn clearing_intensity_forgets_the_plane() {
        let (mut viewer, mut events) = loaded((2, 2, 2));
        viewer.render(&mut events).unwrap();
        viewer.clear(Slot::Intensity, &mut events);
        assert!(viewer.raster().is_none());
        assert!(matches!(
            viewer.render(&mut events),
            Err(StoreError::MissingVolume(Slot::Intensity))
        ));
        assert_eq!(events.enabled(Control::Render), Some(false));
    }

    #[test]
    fn ortho_viewer_reports_original_slice_numbers() {
        let viewer = OrthoViewer::new(
            &ramp((2, 4, 6)),
            None,
            &ViewerConfig::default(),
            [60.0, 60.0],
        )
        .unwrap();
        assert_eq!(viewer.offset().before(), [2, 1, 0]);
        assert_eq!(viewer.crosshair(), [1, 2, 3]);
        assert_eq!(viewer.slice_numbers(), [4, 2, 3]);
    }

    #[test]
    fn ortho_views_draw_crosshair() {
        let config = ViewerConfig::default();
        let mut viewer = OrthoViewer::new(&ramp((3, 3, 3)), None, &config, [30.0, 30.0]).unwrap();
        let raster = viewer.render_view(0).unwrap();
        assert_eq!(raster[[1, 0]], config.crosshair_color);
        assert_eq!(raster[[0, 1]], config.crosshair_color);
        assert_ne!(raster[[0, 0]], config.crosshair_color);
    }

    #[test]
    fn ortho_scroll_notifies_every_view() {
        let mut viewer =
            OrthoViewer::new(&ramp((3, 3, 3)), None, &ViewerConfig::default(), [30.0, 30.0]).unwrap();
        let mut events = Recorder::default();
        viewer.scroll(0, 1, &mut events);
        assert_eq!(events.views, vec![0, 1, 2]);
        assert_eq!(viewer.slice_numbers()[0], 3);
    }

    #[test]
    fn ortho_rejects_mismatched_label() {
        let label: LabelVolume = Volume::new(Array3::zeros((3, 3, 2)));
        assert!(OrthoViewer::new(&ramp((3, 3, 3)), Some(&label), &ViewerConfig::default(), [1.0, 1.0]).is_err());
    }

    #[test]
    fn grid_concatenates_panels_horizontally() {
        let a = Array2::from_elem((2, 3), [1.0, 0.0, 0.0]);
        let b = Array2::from_elem((4, 1), [0.0, 0.0, 1.0]);
        let image = GridViewer::concatenate(&[a, b]);
        assert_eq!(image.dimensions(), (6, 3));
        assert_eq!(image.get_pixel(1, 2).0, [255, 0, 0]);
        assert_eq!(image.get_pixel(5, 0).0, [0, 0, 255]);
        assert_eq!(image.get_pixel(5, 2).0, [0, 0, 0]);
    }
}
