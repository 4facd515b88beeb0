//! Plane extraction along the canonical orientations.
//!
//! Slice numbers are 1-based and clamped to `[1, extent]`. Plane arrays are
//! indexed `[u, v]` following [`Orientation::axes`]:
//!
//! - Axial: `plane[u, v] = volume[u, v, s]`
//! - Sagittal: `plane[u, v] = volume[s, ny - 1 - u, v]`
//! - Coronal: `plane[u, v] = volume[u, s, v]`

use ndarray::{Array2, Array3, ArrayView2, s};

use crate::enums::Orientation;
use crate::volume::Volume;

pub fn clamp_slice(slice: usize, extent: usize) -> usize {
    slice.clamp(1, extent.max(1))
}

/// Slice shown right after an orientation change.
pub fn midpoint(extent: usize) -> usize {
    clamp_slice(extent / 2, extent)
}

pub(crate) fn slice_view<T>(data: &Array3<T>, orientation: Orientation, index: usize) -> ArrayView2<'_, T> {
    match orientation {
        Orientation::Axial => data.slice(s![.., .., index]),
        Orientation::Sagittal => data.slice(s![index, ..;-1, ..]),
        Orientation::Coronal => data.slice(s![.., index, ..]),
    }
}

/// Copies the plane at 1-based `slice`; out-of-range slices are clamped.
pub fn extract<T: Clone>(volume: &Volume<T>, orientation: Orientation, slice: usize) -> Array2<T> {
    let slice = clamp_slice(slice, orientation.extent(volume.dim()));
    slice_view(volume.data(), orientation, slice - 1).to_owned()
}

/// Orientation and slice position of one plane view over a grid of shape
/// `dim`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReslicePlane {
    dim: [usize; 3],
    orientation: Orientation,
    slice: usize,
}

impl ReslicePlane {
    /// Starts at the middle slice of `orientation`.
    pub fn new(dim: [usize; 3], orientation: Orientation) -> Self {
        Self {
            dim,
            orientation,
            slice: midpoint(orientation.extent(dim)),
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn slice(&self) -> usize {
        self.slice
    }

    pub fn dim(&self) -> [usize; 3] {
        self.dim
    }

    /// Slider bounds `(1, extent)` for the current orientation.
    pub fn slice_range(&self) -> (usize, usize) {
        (1, self.orientation.extent(self.dim).max(1))
    }

    /// Switches orientation and resets the slice to the new midpoint.
    pub fn set_orientation(&mut self, orientation: Orientation) -> usize {
        self.orientation = orientation;
        self.slice = midpoint(orientation.extent(self.dim));
        self.slice
    }

    /// Moves to `slice`, clamped; returns the slice actually applied.
    pub fn set_slice(&mut self, slice: usize) -> usize {
        self.slice = clamp_slice(slice, self.orientation.extent(self.dim));
        self.slice
    }

    /// Steps the slice by `delta`, clamped to the volume.
    pub fn step(&mut self, delta: i64) -> usize {
        let target = (self.slice as i64 + delta).max(1) as usize;
        self.set_slice(target)
    }

    pub fn plane_shape(&self) -> (usize, usize) {
        self.orientation.plane_shape(self.dim)
    }
}

/// Lazily recomputed plane of one volume.
///
/// The plane is only re-extracted when the volume, orientation or slice
/// differ from the cached key; pan and zoom redraws reuse it.
#[derive(Debug)]
pub struct PlaneCache<T> {
    cached: Option<((u64, Orientation, usize), Array2<T>)>,
    extractions: usize,
}

impl<T> Default for PlaneCache<T> {
    fn default() -> Self {
        Self {
            cached: None,
            extractions: 0,
        }
    }
}

impl<T: Clone> PlaneCache<T> {
    pub fn plane(&mut self, volume: &Volume<T>, position: &ReslicePlane) -> ArrayView2<'_, T> {
        let key = (volume.id(), position.orientation(), position.slice());
        if self.cached.as_ref().is_some_and(|(cached, _)| *cached != key) {
            self.cached = None;
        }
        let extractions = &mut self.extractions;
        let (_, plane) = self.cached.get_or_insert_with(|| {
            *extractions += 1;
            (key, extract(volume, position.orientation(), position.slice()))
        });
        plane.view()
    }

    /// How many times the plane has been extracted.
    pub fn extractions(&self) -> usize {
        self.extractions
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}
