pub mod hdf5;
pub mod raw;

use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::{Angles, Frames, Projections, Result, TomoError, downsample};

/// Which projections to read: `start`, `start + step`, ... up to but
/// excluding `stop` (the end of the dataset when `None`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRange {
    pub start: usize,
    pub stop: Option<usize>,
    pub step: usize,
}

impl StepRange {
    pub fn all() -> Self { Self { start: 0, stop: None, step: 1 } }

    /// Concrete bounds, clipped to a dataset of length `len`
    pub fn resolve(&self, len: usize) -> Result<(usize, usize, usize)> {
        let stop = self.stop.map_or(len, |s| s.min(len));
        if self.step == 0 || self.start >= stop {
            return Err(TomoError::EmptySelection(format!("projections {self:?} of {len}")))
        }
        Ok((self.start, stop, self.step))
    }

    /// Number of selected elements in a dataset of length `len`
    pub fn count(&self, len: usize) -> Result<usize> {
        let (start, stop, step) = self.resolve(len)?;
        Ok((stop - start + step - 1) / step)
    }
}

/// Subset of a scan: projections along the angle axis, detector rows
/// (sinograms) along the vertical axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub projections: StepRange,
    /// `None` means all rows
    pub rows: Option<Range<usize>>,
}

impl Selection {
    pub fn all() -> Self { Self { projections: StepRange::all(), rows: None } }

    pub fn rows(rows: Range<usize>) -> Self { Self { projections: StepRange::all(), rows: Some(rows) } }

    /// The first (0°) and the last (180° in a half-turn scan) projection only
    pub fn first_and_last(n_angles: usize) -> Self {
        Self {
            projections: StepRange { start: 0, stop: None, step: n_angles.saturating_sub(1).max(1) },
            rows: None,
        }
    }

    /// Concrete row bounds, clipped to a detector of height `len`
    pub fn resolve_rows(&self, len: usize) -> Result<Range<usize>> {
        let rows = self.rows.clone().unwrap_or(0..len);
        let rows = rows.start..rows.end.min(len);
        if rows.is_empty() {
            return Err(TomoError::EmptySelection(format!("rows {rows:?} of {len}")))
        }
        Ok(rows)
    }
}

/// Projections, flat and dark frames as stored in the scan file, before
/// normalization
#[derive(Debug, Clone)]
pub struct RawScan {
    pub projections: Projections,
    pub flats: Option<Frames>,
    pub darks: Option<Frames>,
    /// Radians
    pub angles: Angles,
}

impl RawScan {
    /// Block-average every frame of every stack by `factor`
    pub fn downsample(self, factor: usize) -> Result<Self> {
        let Self { projections, flats, darks, angles } = self;
        let ds = |frames: Frames| downsample::stack(frames.view(), factor);
        Ok(Self {
            projections: ds(projections)?,
            flats: flats.map(ds).transpose()?,
            darks: darks.map(ds).transpose()?,
            angles,
        })
    }
}

/// All entries of `dir`, sorted by name. The last `max` of them are logged
/// with their indices, newest first.
pub fn list_scan_files(dir: &Path, max: usize) -> Result<Vec<PathBuf>> {
    let mut files = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    files.sort();
    for (index, path) in files.iter().enumerate().rev().take(max) {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        log::info!("{index}: {name}");
    }
    Ok(files)
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest(/**/ start, stop    , step, len, expected,
             case(0    , None    , 1   , 10 , 10      ),
             case(0    , None    , 9   , 10 , 2       ),
             case(2    , Some(8) , 3   , 10 , 2       ),
             case(0    , Some(20), 5   , 10 , 2       ),
    )]
    fn step_range_counts(start: usize, stop: Option<usize>, step: usize, len: usize, expected: usize) {
        assert_eq!(StepRange { start, stop, step }.count(len).unwrap(), expected);
    }

    #[test]
    fn empty_selections_are_rejected() {
        let past_end = StepRange { start: 10, stop: None, step: 1 };
        assert!(matches!(past_end.resolve(10), Err(TomoError::EmptySelection(_))));
        let rows = Selection::rows(5..5);
        assert!(matches!(rows.resolve_rows(10), Err(TomoError::EmptySelection(_))));
    }

    #[test]
    fn first_and_last_selects_two_projections() {
        let s = Selection::first_and_last(1313);
        assert_eq!(s.projections.count(1313).unwrap(), 2);
        let (start, stop, step) = s.projections.resolve(1313).unwrap();
        assert_eq!((start..stop).step_by(step).collect::<Vec<_>>(), vec![0, 1312]);
    }

    #[test]
    fn listing_is_sorted() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["b.h5", "a.h5", "c.h5"] {
            std::fs::write(dir.path().join(name), b"")?;
        }
        let names: Vec<_> = list_scan_files(dir.path(), 2)?
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.h5", "b.h5", "c.h5"]);
        Ok(())
    }
}
