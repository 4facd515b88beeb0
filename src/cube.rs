//! Zero-padding of rectangular volumes to a cube, for viewers that treat
//! all three axes alike.

use ndarray::{Array3, s};

use crate::volume::Volume;

/// Placement of the original extent along one axis of the padded cube.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisOffset {
    pub before: usize,
    pub original_extent: usize,
}

impl AxisOffset {
    /// Inclusive cube-coordinate bounds of the original region.
    pub fn bounds(&self) -> (usize, usize) {
        (self.before, self.before + self.original_extent - 1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CubeOffset {
    pub axes: [AxisOffset; 3],
}

impl CubeOffset {
    /// Offset for an unpadded volume: the whole grid is original.
    pub fn identity(dim: [usize; 3]) -> Self {
        Self {
            axes: dim.map(|original_extent| AxisOffset {
                before: 0,
                original_extent,
            }),
        }
    }

    pub fn before(&self) -> [usize; 3] {
        self.axes.map(|a| a.before)
    }

    pub fn original_dim(&self) -> [usize; 3] {
        self.axes.map(|a| a.original_extent)
    }

    pub fn to_cube(&self, original: [usize; 3]) -> [usize; 3] {
        [0, 1, 2].map(|i| original[i] + self.axes[i].before)
    }

    /// Back to original coordinates; `None` inside the padding.
    pub fn to_original(&self, cube: [usize; 3]) -> Option<[usize; 3]> {
        let mut out = [0; 3];
        for (i, axis) in self.axes.iter().enumerate() {
            let (lo, hi) = axis.bounds();
            if cube[i] < lo || cube[i] > hi {
                return None;
            }
            out[i] = cube[i] - lo;
        }
        Some(out)
    }

    /// Clamps signed cube coordinates into the original region.
    pub fn clamp(&self, cube: [i64; 3]) -> [usize; 3] {
        [0, 1, 2].map(|i| {
            let (lo, hi) = self.axes[i].bounds();
            cube[i].clamp(lo as i64, hi as i64) as usize
        })
    }

    /// Center of the original region in cube coordinates.
    pub fn center(&self) -> [usize; 3] {
        self.axes.map(|a| a.before + a.original_extent / 2)
    }

    /// 1-based slice number along `axis`, relative to the original volume.
    pub fn display_slice(&self, axis: usize, cube_coord: usize) -> usize {
        cube_coord.saturating_sub(self.axes[axis].before) + 1
    }
}

/// Pads `volume` with zeros to a cube of side `max(nx, ny, nz)`, centering
/// the original data (the odd voxel of padding goes after).
pub fn to_cube<T>(volume: &Volume<T>) -> (Volume<T>, CubeOffset)
where
    T: Clone + Default,
{
    let dim = volume.dim();
    let side = dim.iter().copied().max().unwrap_or(0);
    let offset = CubeOffset {
        axes: dim.map(|extent| AxisOffset {
            before: (side - extent) / 2,
            original_extent: extent,
        }),
    };
    let [bx, by, bz] = offset.before();
    let [nx, ny, nz] = dim;

    let mut cube = Array3::<T>::default((side, side, side));
    cube.slice_mut(s![bx..bx + nx, by..by + ny, bz..bz + nz])
        .assign(volume.data());

    (Volume::with_spacing(cube, volume.spacing()), offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_rectangular_volume_to_cube() {
        let volume: Volume<u8> = Volume::new(Array3::from_elem((10, 20, 30), 1));
        let (cube, offset) = to_cube(&volume);
        assert_eq!(cube.dim(), [30, 30, 30]);
        assert_eq!(offset.before(), [10, 5, 0]);
        assert_eq!(offset.original_dim(), [10, 20, 30]);
        assert_eq!(cube.get([9, 5, 0]), Some(&0));
        assert_eq!(cube.get([10, 5, 0]), Some(&1));
        assert_eq!(cube.get([19, 24, 29]), Some(&1));
        assert_eq!(cube.get([20, 24, 29]), Some(&0));
    }

    #[test]
    fn odd_padding_goes_after() {
        let volume: Volume<u8> = Volume::new(Array3::zeros((2, 5, 5)));
        let (_, offset) = to_cube(&volume);
        assert_eq!(offset.axes[0], AxisOffset { before: 1, original_extent: 2 });
        assert_eq!(offset.axes[0].bounds(), (1, 2));
    }

    #[test]
    fn coordinates_round_trip_and_clamp_to_original_region() {
        let volume: Volume<f32> = Volume::new(Array3::zeros((10, 20, 30)));
        let (_, offset) = to_cube(&volume);
        assert_eq!(offset.to_cube([0, 0, 0]), [10, 5, 0]);
        assert_eq!(offset.to_original([10, 5, 0]), Some([0, 0, 0]));
        assert_eq!(offset.to_original([9, 5, 0]), None);
        assert_eq!(offset.clamp([-40, 100, 15]), [10, 24, 15]);
        assert_eq!(offset.center(), [15, 15, 15]);
        assert_eq!(offset.display_slice(0, 10), 1);
    }
}
