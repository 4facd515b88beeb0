//! Color overlays on grayscale planes.
//!
//! Two paths produce the same colors: [`blend`] writes the label colors
//! straight into an RGB copy of the base, while [`build_lut`] +
//! [`apply_lut`] turn a label plane into an RGBA layer that
//! [`composite_over`] lays on top of the base. The LUT path lets opacity
//! changes recolor a cached plane without redoing the reslice.

use image::{ImageBuffer, RgbImage};
use ndarray::{Array, Array2, ArrayView, ArrayView2, Dimension, Zip};

use crate::config::ColorScheme;
use crate::selection::LabelSelection;

pub type Rgb = [f32; 3];
pub type Rgba = [f32; 4];

/// Entries in a label lookup table: background plus ids 1..=5.
pub const LUT_SIZE: usize = 6;

pub type Lut = [Rgba; LUT_SIZE];

/// Label id to color. Id 0 never has a color.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorMap {
    colors: [Option<Rgb>; LUT_SIZE],
}

impl ColorMap {
    pub fn from_scheme(scheme: &ColorScheme) -> Self {
        let mut colors = [None; LUT_SIZE];
        for (id, slot) in colors.iter_mut().enumerate().skip(1) {
            *slot = scheme.mask_color(id as u8);
        }
        Self { colors }
    }

    /// A map whose only entry is id 1; used for tp/fp/fn masks.
    pub fn single(color: Rgb) -> Self {
        let mut colors = [None; LUT_SIZE];
        colors[1] = Some(color);
        Self { colors }
    }

    pub fn color(&self, id: u8) -> Option<Rgb> {
        self.colors.get(id as usize).copied().flatten()
    }
}

/// Linear intensity window mapped onto `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GrayWindow {
    pub min: f32,
    pub max: f32,
}

impl GrayWindow {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn normalize(&self, value: f32) -> f32 {
        let span = self.max - self.min;
        if span <= 0.0 || !span.is_finite() {
            return 0.0;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }
}

#[inline]
fn mix(base: Rgb, color: Rgb, alpha: f32) -> Rgb {
    [0, 1, 2].map(|c| (1.0 - alpha).mul_add(base[c], alpha * color[c]))
}

pub fn gray_to_rgb<D: Dimension>(base: ArrayView<'_, f32, D>, window: GrayWindow) -> Array<Rgb, D> {
    let mut out = Array::from_elem(base.raw_dim(), [0.0; 3]);
    Zip::from(&mut out).and(base).par_for_each(|o, &v| {
        let g = window.normalize(v);
        *o = [g, g, g];
    });
    out
}

/// Blends label colors onto the grayscale base, plane or volume alike.
///
/// Every pixel whose label is in `selected` becomes
/// `(1 - alpha) * base + alpha * color[label]`; others keep the base.
/// Selected ids are applied in ascending order so a later id wins
/// wherever two would claim the same pixel. A single label grid assigns one
/// id per pixel, so that reduces to blending with the pixel's own id.
///
/// # Panics
///
/// If `base` and `labels` differ in shape.
pub fn blend<D: Dimension>(
    base: ArrayView<'_, f32, D>,
    window: GrayWindow,
    labels: ArrayView<'_, u8, D>,
    selected: &LabelSelection,
    colors: &ColorMap,
    alpha: f32,
) -> Array<Rgb, D> {
    let mut out = gray_to_rgb(base, window);
    if selected.is_empty() {
        return out;
    }
    let alpha = alpha.clamp(0.0, 1.0);
    Zip::from(&mut out).and(labels).par_for_each(|o, &label| {
        if !selected.contains(label) {
            return;
        }
        if let Some(color) = colors.color(label) {
            *o = mix(*o, color, alpha);
        }
    });
    out
}

/// Builds the 6-entry lookup table for a label plane.
///
/// With `selected`, only those ids get `(color, alpha)`. Without it, the
/// map's id-1 color is used, which is how single-category masks (tp/fp/fn)
/// are colored. Index 0 is always transparent.
pub fn build_lut(colors: &ColorMap, alpha: f32, selected: Option<&LabelSelection>) -> Lut {
    let alpha = alpha.clamp(0.0, 1.0);
    let mut lut = [[0.0; 4]; LUT_SIZE];
    let mut assign = |id: u8| {
        if let Some([r, g, b]) = colors.color(id) {
            lut[id as usize] = [r, g, b, alpha];
        }
    };
    match selected {
        Some(selection) => selection.iter().for_each(&mut assign),
        None => assign(1),
    }
    lut
}

/// Maps label ids through `lut`; ids past the table are transparent.
pub fn apply_lut(plane: ArrayView2<'_, u8>, lut: &Lut) -> Array2<Rgba> {
    plane.mapv(|id| lut.get(id as usize).copied().unwrap_or([0.0; 4]))
}

/// Alpha-composites `layer` over `base` in place.
pub fn composite_over(base: &mut Array2<Rgb>, layer: ArrayView2<'_, Rgba>) {
    Zip::from(base).and(layer).par_for_each(|o, &[r, g, b, a]| {
        if a > 0.0 {
            *o = mix(*o, [r, g, b], a);
        }
    });
}

/// Paints the row `v` and column `u` through a plane.
pub fn draw_crosshair(plane: &mut Array2<Rgb>, u: usize, v: usize, color: Rgb) {
    let (len_u, len_v) = plane.dim();
    if u < len_u {
        plane.row_mut(u).fill(color);
    }
    if v < len_v {
        plane.column_mut(v).fill(color);
    }
}

#[inline]
fn quantize(color: Rgb) -> image::Rgb<u8> {
    image::Rgb(color.map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8))
}

/// Rasterises a plane: width is the `u` extent, row `y` holds `v == y`.
pub fn to_rgb_image(plane: ArrayView2<'_, Rgb>) -> RgbImage {
    let (width, height) = plane.dim();
    ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
        quantize(plane[[x as usize, y as usize]])
    })
}
