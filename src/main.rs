use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use mpr_overlay::{
    capture::{CaptureExporter, CaptureOutcome, ExportJob},
    config::ViewerConfig,
    enums::{Category, Orientation, SortBy},
    events::{Control, LogEvents},
    viewer::SliceViewer,
    volume::{IntensityVolume, LabelVolume},
    volume_loader::{VolumeFileLoader, VolumeSource},
};

/// Renders one reslice of a DICOM series or NIfTI volume with its
/// segmentation overlays.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Intensity volume: a directory of .dcm slices or a .nii/.nii.gz file
    #[arg(long)]
    input: PathBuf,

    /// Ground-truth label volume
    #[arg(long)]
    label: Option<PathBuf>,

    /// Predicted label volume; with --label, adds the TP/FP/FN masks
    #[arg(long)]
    prediction: Option<PathBuf>,

    #[arg(long, default_value = "axial")]
    orientation: Orientation,

    /// 1-based slice number; defaults to the middle slice
    #[arg(long)]
    slice: Option<usize>,

    /// Label ids to show, e.g. `1,3`; defaults to every present id
    #[arg(long, value_delimiter = ',')]
    labels: Vec<u8>,

    #[arg(long, default_value = "result.png")]
    png: PathBuf,

    /// Also write a sweep through all slices (.gif or .mp4)
    #[arg(long)]
    sweep: Option<PathBuf>,

    #[arg(long, default_value = "mpr-overlay.json")]
    config: PathBuf,
}

async fn load<T, F>(path: &Path, read: F) -> Result<T, Box<dyn std::error::Error>>
where
    T: Send + 'static,
    F: FnOnce(&VolumeFileLoader, &Path) -> Result<T, mpr_overlay::error::LoadError>
        + Send
        + 'static,
{
    let path = path.to_path_buf();
    let loader = VolumeFileLoader::new(SortBy::InstanceNumber);
    Ok(tokio::task::spawn_blocking(move || read(&loader, &path)).await??)
}

async fn run(args: Args, config: ViewerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = LogEvents;
    let mut viewer = SliceViewer::new(&config);

    let intensity: IntensityVolume = load(&args.input, |l, p| l.load_intensity(p)).await?;
    viewer.set_intensity(intensity, &mut events)?;
    if let Some(path) = &args.label {
        let label: LabelVolume = load(path, |l, p| l.load_label(p)).await?;
        viewer.set_label(label, &mut events)?;
    }
    if let Some(path) = &args.prediction {
        let prediction: LabelVolume = load(path, |l, p| l.load_label(p)).await?;
        viewer.set_prediction(prediction, &mut events)?;
    }

    let ids: Vec<u8> = if args.labels.is_empty() {
        (1..=viewer.store().max_label_value()).collect()
    } else {
        args.labels.clone()
    };
    for id in ids {
        viewer.set_label_checked(id, true, &mut events);
    }
    for category in Category::ALL {
        viewer.set_category_checked(category, true, &mut events);
    }

    viewer.render(&mut events)?;
    viewer.set_orientation(args.orientation, &mut events)?;
    if let Some(slice) = args.slice {
        let shown = viewer.set_slice(slice, &mut events)?;
        if shown != slice {
            log::warn!("Slice {slice} out of range, showing {shown}");
        }
    }

    let exporter = CaptureExporter::new();
    exporter.save_png(&mut viewer, args.png.clone(), &mut events)?;

    if let Some(path) = &args.sweep {
        let job = ExportJob::from_settings(path, &config.capture).with_trigger(Control::SaveVideo);
        match exporter.sweep(&mut viewer, &job, &mut events)? {
            CaptureOutcome::Completed { frames } => {
                log::info!("Wrote {frames} frames to {}", job.path().display())
            }
            CaptureOutcome::Cancelled { frames } => {
                log::warn!("Sweep stopped after {frames} frames")
            }
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config = match ViewerConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Could not read {}: {err}", args.config.display());
            return ExitCode::FAILURE;
        }
    };
    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
