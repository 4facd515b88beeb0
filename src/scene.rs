//! 3D surface scene: the brain surface plus one surface per selected label
//! and per selected classification mask, viewed by an orbiting camera.
//!
//! Surface extraction and rasterisation are external; this module decides
//! which layers exist and with what color and opacity.

use image::RgbImage;

use crate::capture::{OrbitTarget, RenderTarget};
use crate::config::ViewerConfig;
use crate::enums::{Category, Slot};
use crate::error::{CaptureError, StoreError};
use crate::overlay::{ColorMap, Rgb};
use crate::selection::{CategorySelection, LabelSelection};
use crate::volume::{IntensityVolume, LabelVolume, VolumeStore};

/// What a surface is extracted from.
#[derive(Clone, Copy, Debug)]
pub enum SurfaceInput<'a> {
    /// Outer surface of the intensity volume.
    Intensity(&'a IntensityVolume),
    /// Boundary of the voxels equal to `value`.
    Label { volume: &'a LabelVolume, value: u8 },
    /// Boundary of a 0/1 classification mask.
    Mask(&'a LabelVolume),
}

/// Iso-surface extraction.
pub trait SurfaceExtractor {
    type Surface;

    fn extract(&self, input: SurfaceInput<'_>) -> Self::Surface;
}

/// Draws surface layers seen from a camera.
pub trait SurfaceRenderer<S> {
    fn set_offscreen(&mut self, offscreen: bool);

    /// Returns the raster bottom row first.
    fn draw(
        &mut self,
        layers: &[SurfaceLayer<S>],
        camera: &OrbitCamera,
    ) -> Result<RgbImage, CaptureError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    Brain,
    Label(u8),
    Category(Category),
}

#[derive(Clone, Debug)]
pub struct SurfaceLayer<S> {
    pub kind: LayerKind,
    pub surface: S,
    pub color: Rgb,
    pub opacity: f32,
}

/// Camera rotating about the scene's vertical axis.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OrbitCamera {
    azimuth: f64,
}

impl OrbitCamera {
    /// Degrees in `[0, 360)`.
    pub fn azimuth(&self) -> f64 {
        self.azimuth
    }

    pub fn rotate(&mut self, degrees: f64) {
        self.azimuth = (self.azimuth + degrees).rem_euclid(360.0);
    }

    pub fn reset(&mut self) {
        self.azimuth = 0.0;
    }
}

pub struct SurfaceScene<E: SurfaceExtractor, R> {
    extractor: E,
    renderer: R,
    layers: Vec<SurfaceLayer<E::Surface>>,
    camera: OrbitCamera,
    brain_color: Rgb,
    label_colors: ColorMap,
    category_colors: [Rgb; 3],
    brain_opacity: f32,
    label_opacity: f32,
    prediction_opacity: f32,
    frame: Option<RgbImage>,
}

impl<E, R> SurfaceScene<E, R>
where
    E: SurfaceExtractor,
    R: SurfaceRenderer<E::Surface>,
{
    pub fn new(extractor: E, renderer: R, config: &ViewerConfig) -> Self {
        Self {
            extractor,
            renderer,
            layers: Vec::new(),
            camera: OrbitCamera::default(),
            brain_color: config.colors.brain,
            label_colors: ColorMap::from_scheme(&config.colors),
            category_colors: Category::ALL.map(|c| config.colors.category_color(c)),
            brain_opacity: config.brain_opacity.clamp(0.0, 1.0),
            label_opacity: config.label_opacity.clamp(0.0, 1.0),
            prediction_opacity: config.prediction_opacity.clamp(0.0, 1.0),
            frame: None,
        }
    }

    pub fn layers(&self) -> &[SurfaceLayer<E::Surface>] {
        &self.layers
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    /// Rebuilds every layer from the store and the selection snapshots.
    ///
    /// Labels absent from the label volume and empty masks get no layer.
    pub fn build(
        &mut self,
        store: &mut VolumeStore,
        labels: &LabelSelection,
        categories: &CategorySelection,
    ) -> Result<(), StoreError> {
        let intensity = store
            .intensity()
            .cloned()
            .ok_or(StoreError::MissingVolume(Slot::Intensity))?;
        let mut layers = vec![SurfaceLayer {
            kind: LayerKind::Brain,
            surface: self.extractor.extract(SurfaceInput::Intensity(&intensity)),
            color: self.brain_color,
            opacity: self.brain_opacity,
        }];

        if let Some(label) = store.label().cloned() {
            for id in labels.iter() {
                let Some(color) = self.label_colors.color(id) else {
                    continue;
                };
                if !label.contains_value(id) {
                    log::debug!("Label {id} not present, no surface");
                    continue;
                }
                layers.push(SurfaceLayer {
                    kind: LayerKind::Label(id),
                    surface: self.extractor.extract(SurfaceInput::Label {
                        volume: &label,
                        value: id,
                    }),
                    color,
                    opacity: self.label_opacity,
                });
            }
        }

        for category in categories.iter() {
            let Some(mask) = store.derived(category)?.volume().cloned() else {
                continue;
            };
            layers.push(SurfaceLayer {
                kind: LayerKind::Category(category),
                surface: self.extractor.extract(SurfaceInput::Mask(&mask)),
                color: self.category_colors[category.index()],
                opacity: self.prediction_opacity,
            });
        }

        log::debug!("Scene has {} surface layers", layers.len());
        self.layers = layers;
        Ok(())
    }

    fn set_opacity_where(&mut self, opacity: f32, matches: impl Fn(LayerKind) -> bool) -> f32 {
        let opacity = opacity.clamp(0.0, 1.0);
        for layer in self.layers.iter_mut().filter(|l| matches(l.kind)) {
            layer.opacity = opacity;
        }
        opacity
    }

    /// Adjusts existing layers without extracting surfaces again.
    pub fn set_brain_opacity(&mut self, opacity: f32) {
        self.brain_opacity = self.set_opacity_where(opacity, |k| k == LayerKind::Brain);
    }

    pub fn set_label_opacity(&mut self, opacity: f32) {
        self.label_opacity =
            self.set_opacity_where(opacity, |k| matches!(k, LayerKind::Label(_)));
    }

    pub fn set_prediction_opacity(&mut self, opacity: f32) {
        self.prediction_opacity =
            self.set_opacity_where(opacity, |k| matches!(k, LayerKind::Category(_)));
    }
}

impl<E, R> RenderTarget for SurfaceScene<E, R>
where
    E: SurfaceExtractor,
    R: SurfaceRenderer<E::Surface>,
{
    fn set_offscreen(&mut self, offscreen: bool) {
        self.renderer.set_offscreen(offscreen);
    }

    fn render(&mut self) -> Result<(), CaptureError> {
        self.frame = Some(self.renderer.draw(&self.layers, &self.camera)?);
        Ok(())
    }

    fn read_back(&mut self) -> Result<RgbImage, CaptureError> {
        self.frame
            .clone()
            .ok_or_else(|| CaptureError::Render("scene not rendered".into()))
    }
}

impl<E, R> OrbitTarget for SurfaceScene<E, R>
where
    E: SurfaceExtractor,
    R: SurfaceRenderer<E::Surface>,
{
    fn reset_camera(&mut self) {
        self.camera.reset();
    }

    fn azimuth(&mut self, degrees: f64) {
        self.camera.rotate(degrees);
    }
}
