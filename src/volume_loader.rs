use crate::{
    enums::SortBy,
    error::LoadError,
    nifti_loader::NiftiLoader,
    volume::{IntensityVolume, LabelVolume, Volume},
};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, Array3, s};
use rayon::prelude::*;
use std::{fs, path::Path};
use web_time::Instant;

/// Produces volumes from files on disk.
pub trait VolumeSource {
    fn load_intensity(&self, path: &Path) -> Result<IntensityVolume, LoadError>;

    /// Reads `path` as a label volume. The default rounds intensities to
    /// label ids.
    fn load_label(&self, path: &Path) -> Result<LabelVolume, LoadError> {
        Ok(self.load_intensity(path)?.to_labels())
    }
}

/// Picks the reader from the path: a directory is read as a DICOM series,
/// a `.nii`/`.nii.gz` file as NIfTI.
#[derive(Clone, Copy, Debug, Default)]
pub struct VolumeFileLoader {
    dicom: DicomSeriesLoader,
}

impl VolumeFileLoader {
    pub fn new(sort_by: SortBy) -> Self {
        Self {
            dicom: DicomSeriesLoader::new(sort_by),
        }
    }
}

impl VolumeSource for VolumeFileLoader {
    fn load_intensity(&self, path: &Path) -> Result<IntensityVolume, LoadError> {
        if path.is_dir() {
            self.dicom.load_intensity(path)
        } else if NiftiLoader::handles(path) {
            NiftiLoader.load_intensity(path)
        } else if !path.exists() {
            Err(LoadError::FileNotFound(path.to_path_buf()))
        } else {
            Err(LoadError::Decode(format!(
                "unsupported volume file {}",
                path.display()
            )))
        }
    }
}

/// Loads a DICOM series (one directory of `.dcm` slices) into a volume
/// indexed `[x, y, z]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DicomSeriesLoader {
    sort_by: SortBy,
}

impl VolumeSource for DicomSeriesLoader {
    fn load_intensity(&self, path: &Path) -> Result<IntensityVolume, LoadError> {
        Self::load_from_directory(path, self.sort_by)
    }
}

impl DicomSeriesLoader {
    pub fn new(sort_by: SortBy) -> Self {
        Self { sort_by }
    }

    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or dimensions are inconsistent
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<IntensityVolume, LoadError> {
        let mut images_with_order: Vec<_> = dicom_objects
            .par_iter()
            .filter_map(|dicom_object| Self::extract_image_with_order(dicom_object, sort_by))
            .collect();

        if images_with_order.is_empty() {
            return Err(LoadError::NoValidImages);
        }

        Self::sort_images(&mut images_with_order, sort_by);

        let images: Vec<_> = images_with_order
            .into_iter()
            .map(|(_, image)| image)
            .collect();

        Self::validate_dimensions(&images)?;

        let volume_array = Self::build_volume_array(&images);
        let spacing = Self::get_spacing(dicom_objects).unwrap_or_else(|| {
            log::warn!("Series has no pixel spacing, assuming 1mm isotropic voxels");
            (1.0, 1.0, 1.0)
        });

        Ok(Volume::with_spacing(volume_array, spacing))
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path> + Sync],
        sort_by: SortBy,
    ) -> Result<IntensityVolume, LoadError> {
        let objects: Result<Vec<_>, _> = paths
            .par_iter()
            .map(|path| open_file(path.as_ref()))
            .collect();

        Self::load_from_dicom_objects(&objects?, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<IntensityVolume, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::FileNotFound(path.to_path_buf()));
        }
        let start = Instant::now();

        let paths: Vec<_> = fs::read_dir(path)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(LoadError::NoValidImages);
        }

        let volume = Self::load_from_file_paths(&paths, sort_by)?;
        log::info!(
            "Loaded {} slices from {} as {:?} in {:?}",
            paths.len(),
            path.display(),
            volume.dim(),
            start.elapsed()
        );
        Ok(volume)
    }

    fn extract_image_with_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: SortBy,
    ) -> Option<(Option<f32>, Array2<f32>)> {
        let order = Self::get_sort_order(dicom_object, sort_by)?;
        let image_2d = Self::decode_image(dicom_object)?;
        Some((order, image_2d))
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: SortBy,
    ) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let pos = dicom_object
                    .element(tags::IMAGE_POSITION_PATIENT)
                    .ok()?
                    .to_multi_float32()
                    .ok()?;
                Some(pos.get(2).copied())
            }
            SortBy::TablePosition => {
                let pos = dicom_object
                    .element(tags::TABLE_POSITION)
                    .ok()?
                    .to_float32()
                    .ok();
                Some(pos)
            }
            SortBy::InstanceNumber => {
                let num = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(|n| n as f32);
                Some(num)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    /// First frame, first sample, rescaled to modality values.
    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<f32>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::Identity);
        pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn sort_images(images_with_order: &mut [(Option<f32>, Array2<f32>)], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            images_with_order
                .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }

        if matches!(sort_by, SortBy::ImagePositionPatient) {
            images_with_order.reverse();
        }
    }

    fn validate_dimensions(images: &[Array2<f32>]) -> Result<(), LoadError> {
        let first_dim = images[0].dim();
        if images.iter().any(|img| img.dim() != first_dim) {
            return Err(LoadError::InconsistentDimensions);
        }
        Ok(())
    }

    /// Stacks `(rows, columns)` images into an `[x, y, z]` grid: x runs
    /// along columns, y along rows, z along the sorted slices.
    fn build_volume_array(images: &[Array2<f32>]) -> Array3<f32> {
        let (height, width) = images[0].dim();
        let depth = images.len();
        let mut volume = Array3::<f32>::zeros((width, height, depth));

        for (i, image) in images.iter().enumerate() {
            volume.slice_mut(s![.., .., i]).assign(&image.t());
        }

        volume
    }

    /// `(x, y, z)` spacing: column spacing, row spacing, slice thickness.
    fn get_spacing(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<(f32, f32, f32)> {
        dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float32()
                .ok()?;

            let slice_thickness = dicom_object
                .element(tags::SLICE_THICKNESS)
                .ok()?
                .to_float32()
                .ok()?;

            Some((*pixel_spacing.get(1)?, *pixel_spacing.first()?, slice_thickness))
        })
    }
}
