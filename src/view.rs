//! Viewer sessions for inspecting projections and reconstructions.
//!
//! Each session owns the data it shows, is created with `open`, changed
//! through its update methods and given back with `close`. Every state can
//! be rendered to an 8-bit grayscale frame, or written out as PNG.

use std::path::Path;

use image::{GrayImage, Luma};
use ndarray::{s, ArrayView2, Axis};

use crate::{Attenuationf32, Frame, Result, TomoError, Volume, shift::shift_frame, utils::percentile};

/// Range of the shift sliders of `ProjectionDiffViewer`, in pixels
pub const SHIFT_LIMIT: f32 = 800.0;
/// Granularity of the shift sliders
pub const SHIFT_STEP: f32 = 0.5;
/// Half-width of the fixed colour scale of difference images
pub const DIFF_CLIM: Attenuationf32 = 0.1;

/// Grey-level window: `min` and below render black, `max` and above white
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clim { pub min: f32, pub max: f32 }

impl Clim {

    pub fn new(min: f32, max: f32) -> Self { Self { min, max } }

    /// 1st to 99th percentile of the finite `values`; `[0, 1]` if there
    /// are none
    pub fn robust<'a>(values: impl IntoIterator<Item = &'a f32> + Clone) -> Self {
        match (percentile(values.clone(), 1.0), percentile(values, 99.0)) {
            (Some(min), Some(max)) => Self { min, max },
            _ => Self { min: 0.0, max: 1.0 },
        }
    }

    fn grey(&self, v: f32) -> u8 {
        let span = self.max - self.min;
        if !(span > 0.0) { return if v > self.min { u8::MAX } else { 0 } }
        let level = ((v - self.min) / span * 255.0).round();
        // NaN lands on 0
        level.clamp(0.0, 255.0) as u8
    }
}

/// Map `frame` (`[row, column]`) to grey levels through `clim`
pub fn to_gray(frame: ArrayView2<f32>, clim: Clim) -> GrayImage {
    let (rows, cols) = frame.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| Luma([clim.grey(frame[[y as usize, x as usize]])]))
}

/// What every session can show
pub trait Viewer {
    fn title(&self) -> String;
    fn render(&self) -> GrayImage;

    fn save_png(&self, path: &Path) -> Result<()> {
        self.render().save_with_format(path, image::ImageFormat::Png)?;
        log::info!("saved '{}' to {}", self.title(), path.display());
        Ok(())
    }
}

fn slice_index(index: usize, len: usize) -> Result<usize> {
    if len == 0 { return Err(TomoError::EmptySelection("no slices to show".into())) }
    if index < len { Ok(index) }
    else { Err(TomoError::IndexOutOfRange { what: "slice", index, len }) }
}

// ----- Slices of one volume -------------------------------------------------
#[derive(Debug, Clone)]
pub struct SliceViewer {
    volume: Volume,
    labels: Vec<String>,
    index: usize,
    clim: Clim,
}

impl SliceViewer {

    /// Show the first slice of `volume`. `labels` name the slices in titles
    /// (their indices if absent); the colour scale starts at the 1st to 99th
    /// percentile of the whole volume.
    pub fn open(volume: Volume, labels: Option<Vec<String>>) -> Result<Self> {
        let n = volume.len_of(Axis(0));
        slice_index(0, n)?;
        let labels = labels.unwrap_or_else(|| (0..n).map(|i| i.to_string()).collect());
        if labels.len() != n {
            return Err(TomoError::ShapeMismatch { what: "slice labels", left: vec![labels.len()], right: vec![n] })
        }
        let clim = Clim::robust(volume.iter());
        Ok(Self { volume, labels, index: 0, clim })
    }

    pub fn set_slice(&mut self, index: usize) -> Result<()> {
        self.index = slice_index(index, self.labels.len())?;
        Ok(())
    }

    pub fn set_clim(&mut self, clim: Clim) { self.clim = clim }
    pub fn clim(&self) -> Clim { self.clim }
    pub fn current(&self) -> ArrayView2<f32> { self.volume.index_axis(Axis(0), self.index) }
    pub fn close(self) -> Volume { self.volume }
}

impl Viewer for SliceViewer {
    fn title(&self) -> String { format!("Slice {}", self.labels[self.index]) }
    fn render(&self) -> GrayImage { to_gray(self.current(), self.clim) }
}

// ----- The same slice reconstructed at several CORs -------------------------
#[derive(Debug, Clone)]
pub struct CorSweepViewer {
    slices: Vec<Frame>,
    cors: Vec<f32>,
    index: usize,
    clim: Clim,
}

impl CorSweepViewer {

    /// `recons[i]` was reconstructed with COR `cors[i]` (full-resolution
    /// pixels); the first slice of each is shown
    pub fn open(recons: Vec<Volume>, cors: Vec<f32>) -> Result<Self> {
        if recons.len() != cors.len() {
            return Err(TomoError::ShapeMismatch { what: "reconstructions vs CORs", left: vec![recons.len()], right: vec![cors.len()] })
        }
        let slices = recons.into_iter()
            .map(|volume| -> Result<Frame> {
                slice_index(0, volume.len_of(Axis(0)))?;
                Ok(volume.index_axis(Axis(0), 0).to_owned())
            })
            .collect::<Result<Vec<_>>>()?;
        let first = slices.first().ok_or_else(|| TomoError::EmptySelection("no reconstructions to sweep".into()))?;
        let clim = Clim::robust(first.iter());
        Ok(Self { slices, cors, index: 0, clim })
    }

    pub fn set_cor(&mut self, index: usize) -> Result<()> {
        self.index = slice_index(index, self.cors.len())?;
        Ok(())
    }

    pub fn cor(&self) -> f32 { self.cors[self.index] }
    pub fn set_clim(&mut self, clim: Clim) { self.clim = clim }
    pub fn close(self) -> Vec<Frame> { self.slices }
}

impl Viewer for CorSweepViewer {
    fn title(&self) -> String { format!("COR = {} pixels (at full res)", self.cor()) }
    fn render(&self) -> GrayImage { to_gray(self.slices[self.index].view(), self.clim) }
}

// ----- First projection minus the mirrored, shifted last one ----------------
/// Interactive COR search: the operator shifts the mirrored last projection
/// until the structure in the difference image cancels.
#[derive(Debug, Clone)]
pub struct ProjectionDiffViewer {
    first: Frame,
    last_flipped: Frame,
    downsample: usize,
    dx: f32,
    dy: f32,
    difference: Frame,
}

/// Keep a slider value in range and on its grid
fn slider(value: f32) -> f32 {
    (value.clamp(-SHIFT_LIMIT, SHIFT_LIMIT) / SHIFT_STEP).round() * SHIFT_STEP
}

impl ProjectionDiffViewer {

    /// `first` and `last` are the 0° and 180° projections, possibly
    /// downsampled by `downsample`; `initial_dx` is the starting horizontal
    /// shift
    pub fn open(first: Frame, last: Frame, downsample: usize, initial_dx: f32) -> Result<Self> {
        if first.dim() != last.dim() {
            return Err(TomoError::ShapeMismatch {
                what: "first and last projections",
                left: first.shape().to_vec(),
                right: last.shape().to_vec(),
            })
        }
        if downsample == 0 { return Err(TomoError::InvalidDownsampleFactor(0)) }
        let last_flipped = last.slice(s![.., ..;-1]).to_owned();
        let mut viewer = Self { difference: first.clone(), first, last_flipped, downsample, dx: 0.0, dy: 0.0 };
        viewer.set_shift(initial_dx, 0.0);
        Ok(viewer)
    }

    pub fn set_shift(&mut self, dx: f32, dy: f32) {
        self.dx = slider(dx);
        self.dy = slider(dy);
        let shifted = shift_frame(self.last_flipped.view(), self.dx, self.dy);
        self.difference = &self.first - &shifted;
    }

    pub fn shift(&self) -> (f32, f32) { (self.dx, self.dy) }

    /// Full-resolution COR offset implied by the current horizontal shift
    pub fn cor(&self) -> f32 { -(self.downsample as f32) * self.dx / 2.0 + 0.0 }

    pub fn y_shift(&self) -> f32 { self.downsample as f32 * self.dy / 2.0 + 0.0 }

    pub fn difference(&self) -> ArrayView2<f32> { self.difference.view() }

    pub fn close(self) -> (Frame, Frame) { (self.first, self.last_flipped) }
}

impl Viewer for ProjectionDiffViewer {
    fn title(&self) -> String { format!("COR: {}, y_shift: {}", self.cor(), self.y_shift()) }
    fn render(&self) -> GrayImage { to_gray(self.difference.view(), Clim::new(-DIFF_CLIM, DIFF_CLIM)) }
}

// ----- Two volumes side by side ---------------------------------------------
#[derive(Debug, Clone)]
pub struct ComparisonViewer {
    volumes: [Volume; 2],
    titles: [String; 2],
    index: usize,
    clims: [Clim; 2],
}

impl ComparisonViewer {

    /// Each volume gets its own colour scale, from the 1st to 99th
    /// percentile of its first slice
    pub fn open(left: Volume, right: Volume, titles: [String; 2]) -> Result<Self> {
        if left.dim() != right.dim() {
            return Err(TomoError::ShapeMismatch { what: "compared volumes", left: left.shape().to_vec(), right: right.shape().to_vec() })
        }
        slice_index(0, left.len_of(Axis(0)))?;
        let clim = |v: &Volume| Clim::robust(v.index_axis(Axis(0), 0).iter());
        let clims = [clim(&left), clim(&right)];
        Ok(Self { volumes: [left, right], titles, index: 0, clims })
    }

    pub fn set_slice(&mut self, index: usize) -> Result<()> {
        self.index = slice_index(index, self.volumes[0].len_of(Axis(0)))?;
        Ok(())
    }

    pub fn clims(&self) -> [Clim; 2] { self.clims }
    pub fn close(self) -> [Volume; 2] { self.volumes }
}

impl Viewer for ComparisonViewer {
    fn title(&self) -> String { format!("{} | {}", self.titles[0], self.titles[1]) }

    fn render(&self) -> GrayImage {
        let [left, right] = [0, 1].map(|i| to_gray(self.volumes[i].index_axis(Axis(0), self.index), self.clims[i]));
        let (w, h) = left.dimensions();
        GrayImage::from_fn(2 * w, h, |x, y| if x < w { *left.get_pixel(x, y) } else { *right.get_pixel(x - w, y) })
    }
}
