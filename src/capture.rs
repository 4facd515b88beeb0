//! Still and video capture of a render target.
//!
//! Every capture runs inside a session that disables the triggering control
//! and the controls that would re-enter rendering, switches the target to
//! off-screen mode, and undoes both when it ends, whatever the outcome.
//! Output is written to a hidden sibling of the target path and renamed
//! into place on success, so a cancelled or failed capture leaves the
//! target path as it found it.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, ImageFormat, RgbImage, imageops};
use web_time::Instant;

use crate::config::CaptureSettings;
use crate::enums::VideoFormat;
use crate::error::CaptureError;
use crate::events::{Control, ViewerEvents};

/// Controls that must stay disabled while frames are being captured.
const RACING_CONTROLS: [Control; 5] = [
    Control::Render,
    Control::SavePng,
    Control::SaveVideo,
    Control::OrientationSelector,
    Control::SliceSlider,
];

/// Something that can render off-screen and hand back the raster.
pub trait RenderTarget {
    fn set_offscreen(&mut self, offscreen: bool);

    fn render(&mut self) -> Result<(), CaptureError>;

    /// The last rendered raster, bottom row first.
    fn read_back(&mut self) -> Result<RgbImage, CaptureError>;
}

/// A target with a camera that can rotate around the subject.
pub trait OrbitTarget: RenderTarget {
    /// Back to the canonical viewing pose.
    fn reset_camera(&mut self);

    /// Rotates the camera about the view-up axis.
    fn azimuth(&mut self, degrees: f64);
}

/// A target whose slice can be stepped.
pub trait SweepTarget: RenderTarget {
    /// Inclusive 1-based slice bounds.
    fn slice_range(&self) -> (usize, usize);

    fn current_slice(&self) -> usize;

    fn set_slice(&mut self, slice: usize);
}

/// Cooperative cancellation flag, polled once per captured frame.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    Completed { frames: usize },
    Cancelled { frames: usize },
}

/// Appends `.ext` unless the path already ends with it.
pub fn with_extension(path: PathBuf, ext: &str) -> PathBuf {
    let matches = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext));
    if matches {
        return path;
    }
    let mut raw = path.into_os_string();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

/// Hidden sibling of `path` that a capture writes to until it succeeds.
/// Keeps the extension so encoders still recognise the format.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_file_name(format!(".{name}.partial.{ext}")),
        None => path.with_file_name(format!(".{name}.partial")),
    }
}

fn commit(staging: &Path, path: &Path) -> Result<(), CaptureError> {
    fs::rename(staging, path)?;
    Ok(())
}

/// Where and how a video is written.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportJob {
    path: PathBuf,
    format: VideoFormat,
    fps: u32,
    trigger: Control,
    ffmpeg: PathBuf,
}

impl ExportJob {
    pub fn new(path: impl Into<PathBuf>, format: VideoFormat, fps: u32) -> Self {
        Self {
            path: with_extension(path.into(), format.extension()),
            format,
            fps: fps.max(1),
            trigger: Control::SaveVideo,
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }

    /// Takes the format from the path's extension, falling back to the
    /// configured one.
    pub fn from_settings(path: impl Into<PathBuf>, settings: &CaptureSettings) -> Self {
        let path = path.into();
        let format = VideoFormat::from_path(&path).unwrap_or(settings.video_format);
        Self::new(path, format, settings.fps).with_ffmpeg(settings.ffmpeg.clone())
    }

    /// Program used to encode MP4 output.
    pub fn with_ffmpeg(mut self, program: impl Into<PathBuf>) -> Self {
        self.ffmpeg = program.into();
        self
    }

    /// The control that started this job.
    pub fn with_trigger(mut self, trigger: Control) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> VideoFormat {
        self.format
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }
}

/// Consumer of captured frames, top row first.
pub trait FrameSink {
    fn push(&mut self, frame: &RgbImage) -> Result<(), CaptureError>;

    fn finish(self: Box<Self>) -> Result<(), CaptureError>;
}

/// Looping animated GIF.
pub struct GifSink {
    encoder: GifEncoder<BufWriter<File>>,
    delay: Delay,
}

impl GifSink {
    pub fn create(path: &Path, fps: u32) -> Result<Self, CaptureError> {
        let file = BufWriter::new(File::create(path)?);
        let mut encoder = GifEncoder::new_with_speed(file, 10);
        encoder.set_repeat(Repeat::Infinite)?;
        Ok(Self {
            encoder,
            delay: Delay::from_numer_denom_ms(1000, fps.max(1)),
        })
    }
}

impl FrameSink for GifSink {
    fn push(&mut self, frame: &RgbImage) -> Result<(), CaptureError> {
        let rgba = DynamicImage::ImageRgb8(frame.clone()).into_rgba8();
        self.encoder
            .encode_frame(Frame::from_parts(rgba, 0, 0, self.delay))?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), CaptureError> {
        // The trailer is written when the encoder goes away.
        drop(self.encoder);
        Ok(())
    }
}

/// H.264 MP4 written by an external `ffmpeg` reading raw RGB24 frames from
/// its stdin. The process starts with the first frame, once the frame size
/// is known.
pub struct FfmpegSink {
    program: PathBuf,
    path: PathBuf,
    fps: u32,
    size: Option<(u32, u32)>,
    process: Option<(Child, ChildStdin)>,
}

impl FfmpegSink {
    pub fn new(path: &Path, fps: u32) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            path: path.to_path_buf(),
            fps: fps.max(1),
            size: None,
            process: None,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Fixes the frame size on the first frame, returning `true` then;
    /// later frames must keep it.
    fn accept_size(&mut self, dimensions: (u32, u32)) -> Result<bool, CaptureError> {
        match self.size {
            None => {
                self.size = Some(dimensions);
                Ok(true)
            }
            Some(size) if size != dimensions => Err(CaptureError::Encoder(format!(
                "frame size changed from {size:?} to {dimensions:?}"
            ))),
            Some(_) => Ok(false),
        }
    }

    fn spawn(&self, width: u32, height: u32) -> Result<(Child, ChildStdin), CaptureError> {
        log::debug!("Starting {} for {width}x{height} frames", self.program.display());
        let mut child = Command::new(&self.program)
            .args(["-y", "-loglevel", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{width}x{height}")])
            .args(["-r", &self.fps.to_string()])
            .args(["-i", "-", "-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"])
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
            .arg(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CaptureError::Encoder("ffmpeg stdin unavailable".into()))?;
        Ok((child, stdin))
    }
}

impl FrameSink for FfmpegSink {
    fn push(&mut self, frame: &RgbImage) -> Result<(), CaptureError> {
        let (width, height) = frame.dimensions();
        if self.accept_size((width, height))? {
            self.process = Some(self.spawn(width, height)?);
        }
        if let Some((_, stdin)) = self.process.as_mut() {
            stdin.write_all(frame.as_raw())?;
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<(), CaptureError> {
        let Some((mut child, stdin)) = self.process.take() else {
            return Ok(());
        };
        drop(stdin);
        let status = child.wait()?;
        if !status.success() {
            return Err(CaptureError::Encoder(format!("ffmpeg exited with {status}")));
        }
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Some((mut child, stdin)) = self.process.take() {
            drop(stdin);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn open_sink(job: &ExportJob, path: &Path) -> Result<Box<dyn FrameSink>, CaptureError> {
    Ok(match job.format {
        VideoFormat::Gif => Box::new(GifSink::create(path, job.fps)?),
        VideoFormat::Mp4 => {
            Box::new(FfmpegSink::new(path, job.fps).with_program(job.ffmpeg.clone()))
        }
    })
}

fn remove_partial(path: &Path) {
    if !path.exists() {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => log::debug!("Removed partial output {}", path.display()),
        Err(err) => log::warn!("Could not remove partial output {}: {err}", path.display()),
    }
}

/// Off-screen rendering and disabled controls for the lifetime of a
/// capture.
struct Session<'a, T: RenderTarget + ?Sized> {
    target: &'a mut T,
    events: &'a mut dyn ViewerEvents,
    disabled: Vec<Control>,
}

impl<'a, T: RenderTarget + ?Sized> Session<'a, T> {
    fn begin(target: &'a mut T, events: &'a mut dyn ViewerEvents, trigger: Control) -> Self {
        let mut disabled = vec![trigger];
        disabled.extend(RACING_CONTROLS.into_iter().filter(|&c| c != trigger));
        for &control in &disabled {
            events.on_control_enabled(control, false);
        }
        target.set_offscreen(true);
        Self {
            target,
            events,
            disabled,
        }
    }

    fn frame(&mut self) -> Result<RgbImage, CaptureError> {
        self.target.render()?;
        let mut frame = self.target.read_back()?;
        imageops::flip_vertical_in_place(&mut frame);
        Ok(frame)
    }
}

impl<T: RenderTarget + ?Sized> Drop for Session<'_, T> {
    fn drop(&mut self) {
        self.target.set_offscreen(false);
        for &control in &self.disabled {
            self.events.on_control_enabled(control, true);
        }
    }
}

/// Runs captures against render targets.
#[derive(Debug, Default)]
pub struct CaptureExporter {
    cancel: CancelToken,
}

impl CaptureExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that stops the running capture after its current frame.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Rotates the camera `step_degrees` before each of `frames` frames,
    /// starting from the canonical pose.
    pub fn orbit<T: OrbitTarget + ?Sized>(
        &self,
        target: &mut T,
        job: &ExportJob,
        frames: usize,
        step_degrees: f64,
        events: &mut dyn ViewerEvents,
    ) -> Result<CaptureOutcome, CaptureError> {
        log::info!("Orbit capture of {frames} frames to {}", job.path.display());
        target.reset_camera();
        self.run(target, job, frames, events, |t, _| t.azimuth(step_degrees))
    }

    /// Orbit with the configured frame count and step.
    pub fn orbit_from_settings<T: OrbitTarget + ?Sized>(
        &self,
        target: &mut T,
        job: &ExportJob,
        settings: &CaptureSettings,
        events: &mut dyn ViewerEvents,
    ) -> Result<CaptureOutcome, CaptureError> {
        let frames = settings.orbit_frames as usize;
        self.orbit(target, job, frames, settings.orbit_step_degrees, events)
    }

    /// Steps through every slice from the first to the last, then returns
    /// to the slice shown before.
    pub fn sweep<T: SweepTarget + ?Sized>(
        &self,
        target: &mut T,
        job: &ExportJob,
        events: &mut dyn ViewerEvents,
    ) -> Result<CaptureOutcome, CaptureError> {
        let (first, last) = target.slice_range();
        let frames = last.saturating_sub(first) + 1;
        let shown = target.current_slice();
        log::info!(
            "Sweep capture of slices {first}..={last} to {}",
            job.path.display()
        );
        let outcome = self.run(target, job, frames, events, |t, i| t.set_slice(first + i));
        target.set_slice(shown);
        outcome
    }

    /// Renders a single frame to a PNG file; `.png` is appended to the path
    /// when missing.
    pub fn save_png<T: RenderTarget + ?Sized>(
        &self,
        target: &mut T,
        path: impl Into<PathBuf>,
        events: &mut dyn ViewerEvents,
    ) -> Result<PathBuf, CaptureError> {
        let path = with_extension(path.into(), "png");
        let staging = staging_path(&path);
        let mut session = Session::begin(target, events, Control::SavePng);
        let result = session.frame().and_then(|frame| {
            frame.save_with_format(&staging, ImageFormat::Png)?;
            commit(&staging, &path)
        });
        match result {
            Ok(()) => {
                log::info!("Saved {}", path.display());
                Ok(path)
            }
            Err(err) => {
                remove_partial(&staging);
                log::error!("Saving {} failed: {err}", path.display());
                session.events.report_error(&err.to_string());
                Err(err)
            }
        }
    }

    fn run<T: RenderTarget + ?Sized>(
        &self,
        target: &mut T,
        job: &ExportJob,
        frames: usize,
        events: &mut dyn ViewerEvents,
        mut step: impl FnMut(&mut T, usize),
    ) -> Result<CaptureOutcome, CaptureError> {
        let start = Instant::now();
        let staging = staging_path(&job.path);
        let mut session = Session::begin(target, events, job.trigger);
        let result = self.record(&mut session, job, &staging, frames, &mut step);

        match &result {
            Ok(CaptureOutcome::Completed { frames }) => log::info!(
                "Captured {frames} frames to {} in {:?}",
                job.path.display(),
                start.elapsed()
            ),
            Ok(CaptureOutcome::Cancelled { frames }) => {
                remove_partial(&staging);
                log::info!("Capture cancelled after {frames} frames");
            }
            Err(err) => {
                remove_partial(&staging);
                log::error!("Capture to {} failed: {err}", job.path.display());
                session.events.report_error(&err.to_string());
            }
        }
        // A cancel requested before this run started still applies to it.
        self.cancel.reset();
        result
    }

    fn record<T: RenderTarget + ?Sized>(
        &self,
        session: &mut Session<'_, T>,
        job: &ExportJob,
        staging: &Path,
        frames: usize,
        step: &mut impl FnMut(&mut T, usize),
    ) -> Result<CaptureOutcome, CaptureError> {
        let mut sink = open_sink(job, staging)?;
        for i in 0..frames {
            step(&mut *session.target, i);
            let frame = session.frame()?;
            sink.push(&frame)?;
            session.events.on_progress(i + 1, frames);
            if self.cancel.is_cancelled() {
                return Ok(CaptureOutcome::Cancelled { frames: i + 1 });
            }
        }
        sink.finish()?;
        commit(staging, &job.path)?;
        Ok(CaptureOutcome::Completed { frames })
    }
}
