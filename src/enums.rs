use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical reslice orientations. The discriminant order matches the
/// orientation selector shown to users.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Axial,
    Sagittal,
    Coronal,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [
        Orientation::Axial,
        Orientation::Sagittal,
        Orientation::Coronal,
    ];

    /// Axis selection / reflection matrix.
    ///
    /// Rows are the in-plane `u` axis, the in-plane `v` axis and the normal,
    /// each expressed as a signed unit vector over the `[x, y, z]` voxel axes.
    /// A negative entry means the plane axis runs against storage order.
    pub const fn axes(self) -> [[i8; 3]; 3] {
        match self {
            Orientation::Axial => [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
            Orientation::Sagittal => [[0, -1, 0], [0, 0, 1], [1, 0, 0]],
            Orientation::Coronal => [[1, 0, 0], [0, 0, 1], [0, 1, 0]],
        }
    }

    fn decode(row: [i8; 3]) -> (usize, bool) {
        let axis = row.iter().position(|&c| c != 0).unwrap_or(0);
        (axis, row[axis] < 0)
    }

    /// Volume axis spanned by plane `u`, and whether it is mirrored.
    pub fn u_axis(self) -> (usize, bool) {
        Self::decode(self.axes()[0])
    }

    /// Volume axis spanned by plane `v`, and whether it is mirrored.
    pub fn v_axis(self) -> (usize, bool) {
        Self::decode(self.axes()[1])
    }

    pub fn normal_axis(self) -> usize {
        Self::decode(self.axes()[2]).0
    }

    /// Number of slices along the normal for a volume of shape `dim`.
    pub fn extent(self, dim: [usize; 3]) -> usize {
        dim[self.normal_axis()]
    }

    /// Shape `(len_u, len_v)` of a plane cut from a volume of shape `dim`.
    pub fn plane_shape(self, dim: [usize; 3]) -> (usize, usize) {
        (dim[self.u_axis().0], dim[self.v_axis().0])
    }

    /// Maps plane coordinates plus a 0-based slice position to voxel
    /// coordinates. Works on signed values so callers can clamp afterwards.
    pub fn to_voxel(self, u: i64, v: i64, k: i64, dim: [usize; 3]) -> [i64; 3] {
        let mut voxel = [0i64; 3];
        for ((axis, mirrored), value) in [(self.u_axis(), u), (self.v_axis(), v)] {
            voxel[axis] = if mirrored {
                dim[axis] as i64 - 1 - value
            } else {
                value
            };
        }
        voxel[self.normal_axis()] = k;
        voxel
    }

    /// Inverse of [`Orientation::to_voxel`]: returns `(u, v, k)`.
    pub fn to_plane(self, voxel: [usize; 3], dim: [usize; 3]) -> (usize, usize, usize) {
        let project = |(axis, mirrored): (usize, bool)| {
            if mirrored {
                dim[axis] - 1 - voxel[axis]
            } else {
                voxel[axis]
            }
        };
        (
            project(self.u_axis()),
            project(self.v_axis()),
            voxel[self.normal_axis()],
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Orientation::Axial => "axial",
            Orientation::Sagittal => "sagittal",
            Orientation::Coronal => "coronal",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "axial" | "xy" => Ok(Orientation::Axial),
            "sagittal" | "yz" => Ok(Orientation::Sagittal),
            "coronal" | "xz" => Ok(Orientation::Coronal),
            other => Err(format!("unknown orientation: {other}")),
        }
    }
}

/// Key used to order the slices of a DICOM series along z.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}

/// Volume slots held by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    Intensity,
    Label,
    Prediction,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Intensity => f.write_str("intensity"),
            Slot::Label => f.write_str("label"),
            Slot::Prediction => f.write_str("prediction"),
        }
    }
}

/// Classification categories derived from a ground truth / prediction pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "tp")]
    TruePositive,
    #[serde(rename = "fp")]
    FalsePositive,
    #[serde(rename = "fn")]
    FalseNegative,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::TruePositive,
        Category::FalsePositive,
        Category::FalseNegative,
    ];

    pub fn index(self) -> usize {
        match self {
            Category::TruePositive => 0,
            Category::FalsePositive => 1,
            Category::FalseNegative => 2,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Category::TruePositive => "tp",
            Category::FalsePositive => "fp",
            Category::FalseNegative => "fn",
        }
    }
}

/// What a primary-button press does over a plane view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointerMode {
    /// Moves the shared crosshair.
    #[default]
    Pointer,
    /// Pans the view window.
    Glove,
    /// Draws a zoom rectangle.
    Magnifier,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InteractionState {
    #[default]
    Idle,
    DraggingCrosshair,
    Panning,
    Zooming,
    MagnifierSelecting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Secondary,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    #[default]
    Gif,
    Mp4,
}

impl VideoFormat {
    pub fn extension(self) -> &'static str {
        match self {
            VideoFormat::Gif => "gif",
            VideoFormat::Mp4 => "mp4",
        }
    }

    /// Picks the format from a path's extension, if it names one.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("gif") {
            Some(VideoFormat::Gif)
        } else if ext.eq_ignore_ascii_case("mp4") {
            Some(VideoFormat::Mp4)
        } else {
            None
        }
    }
}
