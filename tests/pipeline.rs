use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use image::{AnimationDecoder, RgbImage, codecs::gif::GifDecoder};
use mpr_overlay::{
    capture::{
        CancelToken, CaptureExporter, CaptureOutcome, ExportJob, OrbitTarget, RenderTarget,
        SweepTarget,
    },
    config::{CaptureSettings, ViewerConfig},
    enums::{Category, Orientation, VideoFormat},
    error::{CaptureError, LoadError},
    events::{Control, NoEvents, ViewerEvents},
    selection::LabelSelection,
    viewer::{GridViewer, SliceViewer},
    volume::{IntensityVolume, LabelVolume, Volume},
    volume_loader::VolumeSource,
    worker::{GridSlot, prepare_grid, receive_grid},
};
use ndarray::Array3;

#[derive(Default)]
struct Events {
    controls: HashMap<Control, bool>,
    progress: Vec<(usize, usize)>,
    errors: Vec<String>,
}

impl ViewerEvents for Events {
    fn on_control_enabled(&mut self, control: Control, enabled: bool) {
        self.controls.insert(control, enabled);
    }

    fn on_progress(&mut self, current: usize, total: usize) {
        self.progress.push((current, total));
    }

    fn report_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}

fn ramp(n: usize) -> IntensityVolume {
    Volume::new(Array3::from_shape_fn((n, n, n), |(x, y, z)| (x + y + z) as f32))
}

fn labels_at(n: usize, voxels: &[([usize; 3], u8)]) -> LabelVolume {
    let mut data = Array3::zeros((n, n, n));
    for &(voxel, id) in voxels {
        data[voxel] = id;
    }
    Volume::new(data)
}

fn loaded_viewer() -> (SliceViewer, Events) {
    let mut events = Events::default();
    let mut viewer = SliceViewer::new(&ViewerConfig::default());
    viewer.set_intensity(ramp(4), &mut events).unwrap();
    viewer
        .set_label(labels_at(4, &[([0, 0, 0], 1), ([3, 3, 3], 2)]), &mut events)
        .unwrap();
    (viewer, events)
}

#[test]
fn selected_label_is_blended_on_its_slice_only() {
    let (mut viewer, mut events) = loaded_viewer();
    viewer.render(&mut events).unwrap();
    viewer.set_slice(1, &mut events).unwrap();
    let plain = viewer.raster().unwrap().clone();

    viewer.set_label_checked(1, true, &mut events);
    viewer.render(&mut events).unwrap();
    viewer.set_slice(1, &mut events).unwrap();
    let overlaid = viewer.raster().unwrap().clone();

    assert_ne!(plain[[0, 0]], overlaid[[0, 0]]);
    assert_eq!(plain[[1, 0]], overlaid[[1, 0]]);
    // label 2 sits on slice 4 and is not selected
    viewer.set_slice(4, &mut events).unwrap();
    assert_eq!(viewer.raster().unwrap()[[3, 3]], [1.0, 1.0, 1.0]);
    assert_eq!(events.controls.get(&Control::SaveVideo), Some(&true));
}

#[test]
fn prediction_is_compared_against_ground_truth() {
    let (mut viewer, mut events) = loaded_viewer();
    viewer
        .set_prediction(labels_at(4, &[([0, 0, 0], 1), ([1, 0, 0], 1)]), &mut events)
        .unwrap();
    assert_eq!(
        events.controls.get(&Control::CategorySelector(Category::FalsePositive)),
        Some(&true)
    );

    let mut store = mpr_overlay::volume::VolumeStore::new();
    store.set_intensity(ramp(4), &mut events).unwrap();
    store
        .set_label(labels_at(4, &[([0, 0, 0], 1), ([3, 3, 3], 2)]), &mut events)
        .unwrap();
    store
        .set_prediction(labels_at(4, &[([0, 0, 0], 1), ([1, 0, 0], 1)]), &mut events)
        .unwrap();
    assert_eq!(store.derived(Category::TruePositive).unwrap().count(), 1);
    assert_eq!(store.derived(Category::FalsePositive).unwrap().count(), 1);
    let missed = store.derived(Category::FalseNegative).unwrap();
    assert_eq!(missed.volume().unwrap().get([3, 3, 3]), Some(&1));
}

/// Cancels the capture from inside its tenth frame.
struct Turntable {
    token: CancelToken,
    frames: usize,
    angle: f64,
}

impl RenderTarget for Turntable {
    fn set_offscreen(&mut self, _offscreen: bool) {}

    fn render(&mut self) -> Result<(), CaptureError> {
        self.frames += 1;
        if self.frames == 10 {
            self.token.cancel();
        }
        Ok(())
    }

    fn read_back(&mut self) -> Result<RgbImage, CaptureError> {
        Ok(RgbImage::from_pixel(8, 8, image::Rgb([self.angle as u8, 0, 0])))
    }
}

impl OrbitTarget for Turntable {
    fn reset_camera(&mut self) {
        self.angle = 0.0;
    }

    fn azimuth(&mut self, degrees: f64) {
        self.angle += degrees;
    }
}

#[test]
fn cancelled_orbit_leaves_no_file_and_restores_controls() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = CaptureExporter::new();
    let mut target = Turntable {
        token: exporter.cancel_token(),
        frames: 0,
        angle: 45.0,
    };
    let settings = CaptureSettings::default();
    let job = ExportJob::from_settings(dir.path().join("orbit"), &settings);
    let mut events = Events::default();

    let outcome = exporter
        .orbit_from_settings(&mut target, &job, &settings, &mut events)
        .unwrap();

    assert_eq!(outcome, CaptureOutcome::Cancelled { frames: 10 });
    assert!(!job.path().exists());
    assert_eq!(events.progress.last(), Some(&(10, 360)));
    assert_eq!(target.angle, 10.0);
    assert_eq!(events.controls.get(&Control::SaveVideo), Some(&true));
    assert_eq!(events.controls.get(&Control::Render), Some(&true));
    assert!(events.errors.is_empty());
}

#[test]
fn sweep_writes_one_gif_frame_per_slice() {
    let (mut viewer, mut events) = loaded_viewer();
    viewer.render(&mut events).unwrap();
    viewer.set_orientation(Orientation::Coronal, &mut events).unwrap();
    let shown = viewer.set_slice(2, &mut events).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let job = ExportJob::new(dir.path().join("sweep.gif"), VideoFormat::Gif, 10);
    let outcome = CaptureExporter::new()
        .sweep(&mut viewer, &job, &mut events)
        .unwrap();

    assert_eq!(outcome, CaptureOutcome::Completed { frames: 4 });
    assert_eq!(viewer.position().unwrap().slice(), shown);
    assert!(!viewer.is_offscreen());

    let decoder = GifDecoder::new(BufReader::new(File::open(job.path()).unwrap())).unwrap();
    let frames = decoder.into_frames().collect_frames().unwrap();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0].buffer().dimensions(), (4, 4));
}

#[test]
fn failed_png_is_reported_and_controls_come_back() {
    let (mut viewer, mut events) = loaded_viewer();
    viewer.render(&mut events).unwrap();
    let err = CaptureExporter::new()
        .save_png(&mut viewer, "/no/such/dir/shot", &mut events)
        .unwrap_err();

    assert!(matches!(err, CaptureError::Image(_) | CaptureError::Io(_)));
    assert_eq!(events.errors.len(), 1);
    assert_eq!(events.controls.get(&Control::SavePng), Some(&true));
    assert!(!viewer.is_offscreen());
}

#[test]
fn nothing_to_capture_before_loading() {
    let mut viewer = SliceViewer::new(&ViewerConfig::default());
    let mut events = Events::default();
    let dir = tempfile::tempdir().unwrap();
    let result = CaptureExporter::new().save_png(&mut viewer, dir.path().join("x.png"), &mut events);
    assert!(result.is_err());
    assert_eq!(viewer.slice_range(), (1, 1));
    assert!(!dir.path().join("x.png").exists());
}

/// Shape comes from the file stem, e.g. `6x6x6`.
struct Cubes;

impl VolumeSource for Cubes {
    fn load_intensity(&self, path: &std::path::Path) -> Result<IntensityVolume, LoadError> {
        let n = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.split('x').next())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| LoadError::FileNotFound(path.to_path_buf()))?;
        Ok(ramp(n))
    }
}

#[tokio::test]
async fn prepared_grid_feeds_the_grid_viewer() {
    let slots = [
        Some(GridSlot::new("6x6x6").with_label("6x6x6")),
        None,
        Some(GridSlot::new("4x4x4")),
        None,
    ];
    let grid = receive_grid(prepare_grid(Arc::new(Cubes), slots)).await.unwrap();
    let mut viewer = GridViewer::from_prepared(grid, &ViewerConfig::default());
    assert_eq!(viewer.len(), 2);
    assert_eq!(viewer.slice(), 3);

    viewer.set_selection(LabelSelection::from_ids([1, 2, 3]));
    viewer.set_opacity(0.9);
    assert_eq!(viewer.opacity(), 0.4);

    let panels = viewer.render_panels();
    assert_eq!(panels[0].dim(), (6, 6));
    assert_eq!(panels[1].dim(), (4, 4));
    let image = GridViewer::concatenate(&panels);
    assert_eq!(image.dimensions(), (10, 6));

    // the host may ignore slice-range notifications
    viewer.set_orientation(Orientation::Sagittal, &mut NoEvents);
    assert_eq!(viewer.orientation(), Orientation::Sagittal);
    assert_eq!(viewer.slice(), 3);
}
