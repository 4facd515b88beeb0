//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::enums::Slot;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("File does not exist: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Could not decode volume: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::NiftiError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{slot} volume shape {found:?} does not match intensity volume shape {expected:?}")]
    ShapeMismatch {
        slot: Slot,
        expected: [usize; 3],
        found: [usize; 3],
    },

    #[error("no {0} volume loaded")]
    MissingVolume(Slot),

    #[error("{0} volume has a zero-length axis")]
    EmptyVolume(Slot),
}

/// Failures while capturing frames. User cancellation is not an error; see
/// [`crate::capture::CaptureOutcome::Cancelled`].
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Encoder failed: {0}")]
    Encoder(String),
}

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no volumes to prepare")]
    NothingToPrepare,

    #[error("preparation worker stopped before delivering data")]
    WorkerLost,
}

#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Error predicting: {0}")]
    Inference(String),
}
