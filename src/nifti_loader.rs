use crate::{
    error::LoadError,
    volume::{IntensityVolume, Volume},
    volume_loader::VolumeSource,
};

use ndarray::Array3;
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use std::path::Path;
use web_time::Instant;

/// Loads a single `.nii` or `.nii.gz` file into a volume indexed
/// `[x, y, z]`, with spacing taken from the header's `pixdim`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NiftiLoader;

impl VolumeSource for NiftiLoader {
    fn load_intensity(&self, path: &Path) -> Result<IntensityVolume, LoadError> {
        Self::load_from_file(path)
    }
}

impl NiftiLoader {
    /// True for names ending in `.nii` or `.nii.gz`, in any case.
    pub fn handles(path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        name.ends_with(".nii") || name.ends_with(".nii.gz")
    }

    /// Load a volume from a NIfTI-1 file
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing, unreadable, or holds more than
    /// one 3D volume
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<IntensityVolume, LoadError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(LoadError::FileNotFound(path.to_path_buf()));
        }
        let start = Instant::now();

        let obj = ReaderOptions::new().read_file(path)?;
        let spacing = Self::get_spacing(&obj.header().pixdim);
        let array = obj.into_volume().into_ndarray::<f32>()?;

        let shape = array.shape().to_vec();
        if shape.len() > 3 && shape[3..].iter().any(|&d| d != 1) {
            return Err(LoadError::Decode(format!(
                "expected a single 3D volume, found shape {shape:?}"
            )));
        }
        let dim = |axis: usize| shape.get(axis).copied().unwrap_or(1);
        let data = Array3::from_shape_vec((dim(0), dim(1), dim(2)), array.iter().copied().collect())
            .map_err(|err| LoadError::Decode(err.to_string()))?;
        if data.is_empty() {
            return Err(LoadError::Decode(format!("empty volume in {}", path.display())));
        }

        let volume = Volume::with_spacing(data, spacing);
        log::info!(
            "Loaded {} as {:?} in {:?}",
            path.display(),
            volume.dim(),
            start.elapsed()
        );
        Ok(volume)
    }

    fn get_spacing(pixdim: &[f32; 8]) -> (f32, f32, f32) {
        let axis = |value: f32| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                log::warn!("Invalid pixdim {value}, using 1 mm");
                1.0
            }
        };
        (axis(pixdim[1]), axis(pixdim[2]), axis(pixdim[3]))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;

    /// Writes an uncompressed single-file NIfTI-1 volume of float32 values.
    /// `values` run with x fastest, as stored on disk.
    pub fn write_nifti(path: &Path, dims: [i16; 3], spacing: [f32; 3], values: &[f32]) {
        let mut header = [0u8; 348];
        header[0..4].copy_from_slice(&348i32.to_le_bytes());
        let dim: [i16; 8] = [3, dims[0], dims[1], dims[2], 1, 1, 1, 1];
        for (i, d) in dim.iter().enumerate() {
            header[40 + i * 2..42 + i * 2].copy_from_slice(&d.to_le_bytes());
        }
        // float32
        header[70..72].copy_from_slice(&16i16.to_le_bytes());
        header[72..74].copy_from_slice(&32i16.to_le_bytes());
        let pixdim = [1.0, spacing[0], spacing[1], spacing[2], 1.0, 1.0, 1.0, 1.0];
        for (i, p) in pixdim.iter().enumerate() {
            header[76 + i * 4..80 + i * 4].copy_from_slice(&p.to_le_bytes());
        }
        header[108..112].copy_from_slice(&352.0f32.to_le_bytes());
        header[112..116].copy_from_slice(&1.0f32.to_le_bytes());
        header[344..348].copy_from_slice(b"n+1\0");

        let mut bytes = header.to_vec();
        bytes.extend_from_slice(&[0; 4]);
        for value in values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }
}
