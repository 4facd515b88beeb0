//! Background preparation of the grid viewer's volumes.
//!
//! Loading up to four volume pairs runs on tokio's blocking pool. The
//! prepared data comes back through a oneshot channel as one
//! [`PreparedGrid`], so the viewer is only built once everything has been
//! loaded and checked.

use std::path::PathBuf;
use std::sync::Arc;

use futures::channel::oneshot;
use rayon::prelude::*;
use web_time::Instant;

use crate::enums::Slot;
use crate::error::{PrepareError, StoreError};
use crate::overlay::GrayWindow;
use crate::volume::{IntensityVolume, LabelVolume};
use crate::volume_loader::VolumeSource;

/// Number of panels in the grid viewer.
pub const GRID_SLOTS: usize = 4;

/// Files to show in one grid panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridSlot {
    pub intensity: PathBuf,
    pub label: Option<PathBuf>,
}

impl GridSlot {
    pub fn new(intensity: impl Into<PathBuf>) -> Self {
        Self {
            intensity: intensity.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<PathBuf>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct PreparedPanel {
    pub intensity: Arc<IntensityVolume>,
    pub label: Option<Arc<LabelVolume>>,
    pub window: GrayWindow,
}

/// Loaded panels in slot order; empty slots are skipped.
#[derive(Debug, Clone)]
pub struct PreparedGrid {
    panels: Vec<PreparedPanel>,
}

impl PreparedGrid {
    pub fn panels(&self) -> &[PreparedPanel] {
        &self.panels
    }

    pub fn into_panels(self) -> Vec<PreparedPanel> {
        self.panels
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }
}

fn prepare_panel<S>(source: &S, slot: &GridSlot) -> Result<PreparedPanel, PrepareError>
where
    S: VolumeSource + ?Sized,
{
    let intensity = source.load_intensity(&slot.intensity)?;
    let label = match &slot.label {
        Some(path) => {
            let label = source.load_label(path)?;
            if label.dim() != intensity.dim() {
                return Err(StoreError::ShapeMismatch {
                    slot: Slot::Label,
                    expected: intensity.dim(),
                    found: label.dim(),
                }
                .into());
            }
            Some(Arc::new(label))
        }
        None => None,
    };
    let (min, max) = intensity.value_range();
    Ok(PreparedPanel {
        intensity: Arc::new(intensity),
        label,
        window: GrayWindow::new(min, max),
    })
}

/// Loads every filled slot in parallel. Fails as a whole if any slot fails.
pub fn prepare_grid_blocking<S>(
    source: &S,
    slots: &[Option<GridSlot>; GRID_SLOTS],
) -> Result<PreparedGrid, PrepareError>
where
    S: VolumeSource + Sync + ?Sized,
{
    let requested: Vec<&GridSlot> = slots.iter().flatten().collect();
    if requested.is_empty() {
        return Err(PrepareError::NothingToPrepare);
    }
    let panels = requested
        .into_par_iter()
        .map(|slot| prepare_panel(source, slot))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PreparedGrid { panels })
}

/// Starts preparing `slots` on the blocking pool of the current tokio
/// runtime.
pub fn prepare_grid<S>(
    source: Arc<S>,
    slots: [Option<GridSlot>; GRID_SLOTS],
) -> oneshot::Receiver<Result<PreparedGrid, PrepareError>>
where
    S: VolumeSource + Send + Sync + ?Sized + 'static,
{
    let (sender, receiver) = oneshot::channel();
    tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        let result = prepare_grid_blocking(source.as_ref(), &slots);
        match &result {
            Ok(grid) => log::info!("Prepared {} grid panels in {:?}", grid.len(), start.elapsed()),
            Err(err) => log::warn!("Grid preparation failed: {err}"),
        }
        if sender.send(result).is_err() {
            log::debug!("Grid receiver dropped before preparation finished");
        }
    });
    receiver
}

/// Waits for the worker's handoff.
pub async fn receive_grid(
    receiver: oneshot::Receiver<Result<PreparedGrid, PrepareError>>,
) -> Result<PreparedGrid, PrepareError> {
    receiver.await.map_err(|_| PrepareError::WorkerLost)?
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use ndarray::Array3;

    use super::*;
    use crate::error::LoadError;
    use crate::volume::Volume;

    /// File stem `NxMxK` gives the shape; values ramp along x.
    struct Synthetic;

    impl VolumeSource for Synthetic {
        fn load_intensity(&self, path: &Path) -> Result<IntensityVolume, LoadError> {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            let dims: Vec<usize> = stem.split('x').filter_map(|d| d.parse().ok()).collect();
            match dims[..] {
                [x, y, z] => Ok(Volume::new(Array3::from_shape_fn((x, y, z), |(i, _, _)| i as f32))),
                _ => Err(LoadError::FileNotFound(path.to_path_buf())),
            }
        }
    }

    #[test]
    fn empty_slots_are_skipped() {
        let slots = [
            None,
            Some(GridSlot::new("2x2x2").with_label("2x2x2")),
            None,
            Some(GridSlot::new("3x2x2")),
        ];
        let grid = prepare_grid_blocking(&Synthetic, &slots).unwrap();
        assert_eq!(grid.len(), 2);
        assert!(grid.panels()[0].label.is_some());
        assert_eq!(grid.panels()[1].intensity.dim(), [3, 2, 2]);
        assert_eq!(grid.panels()[1].window, GrayWindow::new(0.0, 2.0));
    }

    #[test]
    fn nothing_to_prepare() {
        let slots: [Option<GridSlot>; GRID_SLOTS] = Default::default();
        assert!(matches!(
            prepare_grid_blocking(&Synthetic, &slots),
            Err(PrepareError::NothingToPrepare)
        ));
    }

    #[test]
    fn label_shape_is_checked() {
        let slots = [Some(GridSlot::new("2x2x2").with_label("2x2x3")), None, None, None];
        assert!(matches!(
            prepare_grid_blocking(&Synthetic, &slots),
            Err(PrepareError::Store(StoreError::ShapeMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn grid_is_handed_over_once_ready() {
        let slots = [Some(GridSlot::new("4x4x4")), None, Some(GridSlot::new("bad")), None];
        let err = receive_grid(prepare_grid(Arc::new(Synthetic), slots)).await.unwrap_err();
        assert!(matches!(err, PrepareError::Load(LoadError::FileNotFound(_))));

        let slots = [Some(GridSlot::new("4x4x4")), None, None, None];
        let grid = receive_grid(prepare_grid(Arc::new(Synthetic), slots)).await.unwrap();
        assert_eq!(grid.len(), 1);
    }
}
