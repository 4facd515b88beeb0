//! # MPR overlay library
//!
//! This crate is the core of a viewer for 3D medical volumes with
//! segmentation overlays. It holds an intensity volume together with an
//! optional ground-truth label volume and an optional predicted label
//! volume, and it produces:
//!  - Axial, Sagittal and Coronal reslices at 1-based slice positions
//!  - Colored overlays of the selected label ids (1 to 5)
//!  - True-positive, false-positive and false-negative masks comparing
//!    prediction against ground truth
//!  - Synchronized orthogonal views with crosshair, pan, zoom and magnifier
//!    interaction
//!  - PNG snapshots and GIF/MP4 captures of slice sweeps and 3D orbits
//!
//! Drawing widgets, surface extraction and model inference are left to the
//! host. The core talks back through [`events::ViewerEvents`] and takes
//! rendering and inference collaborators as traits.
//!
//! DICOM series are loaded in parallel using rayon; NIfTI files through the
//! `nifti` crate. Volumes are indexed
//! `[x, y, z]`; slice numbers shown to users count from 1.
//!
//! # Examples
//!
//! ## Showing a slice with its labels
//!
//! Load a DICOM series and its segmentation, show label 1 on the middle
//! axial slice and save the view.
//!
//! ```no_run
//! # use mpr_overlay::{config::ViewerConfig, enums::SortBy, events::LogEvents};
//! # use mpr_overlay::capture::CaptureExporter;
//! # use mpr_overlay::viewer::SliceViewer;
//! # use mpr_overlay::volume_loader::{DicomSeriesLoader, VolumeSource};
//! # use std::path::Path;
//! let loader = DicomSeriesLoader::new(SortBy::InstanceNumber);
//! let mut events = LogEvents;
//! let mut viewer = SliceViewer::new(&ViewerConfig::default());
//! viewer
//!     .set_intensity(loader.load_intensity(Path::new("dicom"))?, &mut events)?;
//! viewer.set_label(loader.load_label(Path::new("labels"))?, &mut events)?;
//! viewer.set_label_checked(1, true, &mut events);
//! viewer.render(&mut events)?;
//! CaptureExporter::new().save_png(&mut viewer, "result.png", &mut events)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod capture;
pub mod config;
pub mod cube;
pub mod enums;
pub mod error;
pub mod events;
pub mod interaction;
pub mod mask;
pub mod nifti_loader;
pub mod overlay;
pub mod reslice;
pub mod scene;
pub mod segmentation;
pub mod selection;
pub mod viewer;
pub mod volume;
pub mod volume_loader;
pub mod worker;
