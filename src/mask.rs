//! Boolean algebra between a ground truth and a predicted label volume.
//!
//! Voxels count as set when their label is non-zero. Every operation yields
//! [`DerivedMask::Empty`] instead of an all-zero grid, so callers skip the
//! layer rather than render an invisible one.

use std::sync::Arc;

use ndarray::{Array3, Zip};

use crate::enums::Slot;
use crate::error::StoreError;
use crate::volume::{LabelVolume, Volume};

#[derive(Debug, Clone)]
pub enum DerivedMask {
    /// No voxel is set.
    Empty,
    /// 0/1 grid with at least one voxel set.
    Volume(Arc<LabelVolume>),
}

impl DerivedMask {
    pub fn is_empty(&self) -> bool {
        matches!(self, DerivedMask::Empty)
    }

    pub fn volume(&self) -> Option<&Arc<LabelVolume>> {
        match self {
            DerivedMask::Empty => None,
            DerivedMask::Volume(volume) => Some(volume),
        }
    }

    pub fn count(&self) -> usize {
        self.volume().map_or(0, |v| v.count_nonzero())
    }
}

fn combine(
    gt: &LabelVolume,
    pred: &LabelVolume,
    op: impl Fn(bool, bool) -> bool + Sync + Send,
) -> Result<DerivedMask, StoreError> {
    if gt.dim() != pred.dim() {
        return Err(StoreError::ShapeMismatch {
            slot: Slot::Prediction,
            expected: gt.dim(),
            found: pred.dim(),
        });
    }
    let mut out = Array3::<u8>::zeros(gt.data().raw_dim());
    Zip::from(&mut out)
        .and(gt.data())
        .and(pred.data())
        .par_for_each(|o, &g, &p| *o = u8::from(op(g != 0, p != 0)));

    if out.iter().all(|&v| v == 0) {
        return Ok(DerivedMask::Empty);
    }
    Ok(DerivedMask::Volume(Arc::new(Volume::with_spacing(
        out,
        gt.spacing(),
    ))))
}

/// Voxels set in both volumes (true positives).
pub fn and(gt: &LabelVolume, pred: &LabelVolume) -> Result<DerivedMask, StoreError> {
    combine(gt, pred, |g, p| g && p)
}

/// Voxels set in exactly one of the volumes.
pub fn xor(gt: &LabelVolume, pred: &LabelVolume) -> Result<DerivedMask, StoreError> {
    combine(gt, pred, |g, p| g != p)
}

/// `pred ∧ ¬gt`
pub fn false_positive(gt: &LabelVolume, pred: &LabelVolume) -> Result<DerivedMask, StoreError> {
    combine(gt, pred, |g, p| p && !g)
}

/// `gt ∧ ¬pred`
pub fn false_negative(gt: &LabelVolume, pred: &LabelVolume) -> Result<DerivedMask, StoreError> {
    combine(gt, pred, |g, p| g && !p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(values: &[u8]) -> LabelVolume {
        Volume::new(Array3::from_shape_vec((2, 2, 2), values.to_vec()).unwrap())
    }

    fn is_set(mask: &DerivedMask, voxel: [usize; 3]) -> bool {
        mask.volume().and_then(|v| v.get(voxel)).is_some_and(|&v| v != 0)
    }

    #[test]
    fn categories_partition_the_union() {
        let gt = volume(&[0, 1, 2, 0, 3, 0, 1, 0]);
        let pred = volume(&[0, 1, 0, 4, 3, 0, 0, 2]);
        let tp = and(&gt, &pred).unwrap();
        let fp = false_positive(&gt, &pred).unwrap();
        let fn_ = false_negative(&gt, &pred).unwrap();

        for (voxel, (&g, &p)) in gt.data().indexed_iter().map(|(i, g)| {
            ([i.0, i.1, i.2], (g, &pred.data()[i]))
        }) {
            let hits = [&tp, &fp, &fn_].iter().filter(|m| is_set(m, voxel)).count();
            let expected = usize::from(g != 0 || p != 0);
            assert_eq!(hits, expected, "voxel {voxel:?}");
        }
    }

    #[test]
    fn identical_volumes_have_empty_xor() {
        let gt = volume(&[0, 1, 2, 0, 3, 0, 1, 0]);
        assert!(xor(&gt, &gt.clone()).unwrap().is_empty());
        assert_eq!(and(&gt, &gt).unwrap().count(), 4);
    }

    #[test]
    fn missed_voxel_is_false_negative_only() {
        let gt = volume(&[1, 0, 0, 0, 0, 0, 0, 0]);
        let pred = volume(&[0; 8]);
        let fn_ = false_negative(&gt, &pred).unwrap();
        assert!(is_set(&fn_, [0, 0, 0]));
        assert_eq!(fn_.count(), 1);
        assert!(false_positive(&gt, &pred).unwrap().is_empty());
        assert!(and(&gt, &pred).unwrap().is_empty());
    }

    #[test]
    fn shape_mismatch_is_refused() {
        let gt = volume(&[0; 8]);
        let pred = Volume::new(Array3::zeros((2, 2, 3)));
        assert!(matches!(
            xor(&gt, &pred),
            Err(StoreError::ShapeMismatch { .. })
        ));
    }
}
