//! Running an external segmentation model on a case directory and showing
//! the result.
//!
//! A case directory `<dir>/<name>` holds the four MRI modalities as
//! `<name>-t2f.nii.gz`, `<name>-t1n.nii.gz`, `<name>-t1c.nii.gz` and
//! `<name>-t2w.nii.gz`. The model writes `<name>-seg.nii.gz` next to them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use web_time::Instant;

use crate::enums::Slot;
use crate::error::{LoadError, SegmentationError, StoreError};
use crate::events::ViewerEvents;
use crate::viewer::SliceViewer;
use crate::volume::IntensityVolume;
use crate::volume_loader::VolumeSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modality {
    T2f,
    T1n,
    T1c,
    T2w,
}

impl Modality {
    /// Order in which the model expects its inputs.
    pub const ALL: [Modality; 4] = [Modality::T2f, Modality::T1n, Modality::T1c, Modality::T2w];

    pub fn suffix(self) -> &'static str {
        match self {
            Modality::T2f => "t2f",
            Modality::T1n => "t1n",
            Modality::T1c => "t1c",
            Modality::T2w => "t2w",
        }
    }
}

/// The inference collaborator.
pub trait SegmentationModel {
    /// Segments the case from its modalities, in [`Modality::ALL`] order,
    /// and returns the path of the written label volume.
    fn predict(
        &self,
        modalities: &[Arc<IntensityVolume>; 4],
        model_id: &str,
        output_dir: &Path,
        case_name: &str,
    ) -> Result<PathBuf, SegmentationError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentationCase {
    dir: PathBuf,
    name: String,
}

impl SegmentationCase {
    /// The case name is the directory's last component.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(LoadError::FileNotFound(dir));
        }
        let name = dir
            .components()
            .next_back()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .ok_or_else(|| LoadError::FileNotFound(dir.clone()))?;
        Ok(Self { dir, name })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn file(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}-{suffix}.nii.gz", self.name))
    }

    pub fn modality_path(&self, modality: Modality) -> PathBuf {
        self.file(modality.suffix())
    }

    /// All four inputs; the first missing one is reported.
    pub fn modality_paths(&self) -> Result<[PathBuf; 4], LoadError> {
        let paths = Modality::ALL.map(|m| self.modality_path(m));
        if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
            return Err(LoadError::FileNotFound(missing.clone()));
        }
        Ok(paths)
    }

    pub fn segmentation_path(&self) -> PathBuf {
        self.file("seg")
    }

    /// A segmentation from an earlier run, which a new run would overwrite.
    pub fn existing_segmentation(&self) -> Option<PathBuf> {
        let path = self.segmentation_path();
        path.is_file().then_some(path)
    }
}

pub struct SegmentationRunner<'a> {
    model: &'a dyn SegmentationModel,
    source: &'a dyn VolumeSource,
    model_id: String,
}

impl<'a> SegmentationRunner<'a> {
    pub fn new(
        model: &'a dyn SegmentationModel,
        source: &'a dyn VolumeSource,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            model,
            source,
            model_id: model_id.into(),
        }
    }

    /// Segments `case` and shows the t2f scan with the new labels in
    /// `viewer`. On failure the error is reported and the viewer keeps its
    /// previous volumes.
    pub fn run(
        &self,
        case: &SegmentationCase,
        viewer: &mut SliceViewer,
        events: &mut dyn ViewerEvents,
    ) -> Result<PathBuf, SegmentationError> {
        let result = self.segment(case, viewer, events);
        if let Err(err) = &result {
            log::error!("Segmentation of {} failed: {err}", case.name());
            events.report_error(&err.to_string());
        }
        result
    }

    fn segment(
        &self,
        case: &SegmentationCase,
        viewer: &mut SliceViewer,
        events: &mut dyn ViewerEvents,
    ) -> Result<PathBuf, SegmentationError> {
        let [t2f, t1n, t1c, t2w] = case.modality_paths()?;
        let start = Instant::now();
        let inputs = [
            Arc::new(self.source.load_intensity(&t2f)?),
            Arc::new(self.source.load_intensity(&t1n)?),
            Arc::new(self.source.load_intensity(&t1c)?),
            Arc::new(self.source.load_intensity(&t2w)?),
        ];
        log::info!("Segmenting {} with model {}", case.name(), self.model_id);
        let label_path = self
            .model
            .predict(&inputs, &self.model_id, case.dir(), case.name())?;
        log::info!("Segmentation written to {} after {:?}", label_path.display(), start.elapsed());

        let [brain, ..] = inputs;
        let label = self.source.load_label(&label_path)?;
        if label.dim() != brain.dim() {
            return Err(StoreError::ShapeMismatch {
                slot: Slot::Label,
                expected: brain.dim(),
                found: label.dim(),
            }
            .into());
        }

        viewer.clear(Slot::Prediction, events);
        viewer.set_intensity(brain, events)?;
        viewer.set_label(label, events)?;
        Ok(label_path)
    }
}
