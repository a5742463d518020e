/// Read / write float arrays as raw little-endian binary

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use ndarray::Array3;

use crate::{Result, TomoError};

pub fn write(data: impl Iterator<Item = f32>, path: &Path) -> std::io::Result<()> {
    let mut buf = BufWriter::new(File::create(path)?);
    for datum in data {
        buf.write_all(&datum.to_le_bytes())?;
    }
    buf.flush()
}

type IORes<T> = std::io::Result<T>;
pub fn read<'a>(path: &Path) -> IORes<impl Iterator<Item = IORes<f32>> + 'a> {
    let mut buf = BufReader::new(File::open(path)?);
    let mut buffer = [0; 4];

    Ok(std::iter::from_fn(move || {
        use std::io::ErrorKind::UnexpectedEof;
        match buf.read_exact(&mut buffer) {
            Ok(()) => Some(Ok(f32::from_le_bytes(buffer))),
            Err(e) if e.kind() == UnexpectedEof => None,
            Err(e) => Some(Err(e)),
        }
    }))
}

/// Write a volume in row-major order; the shape is not stored
pub fn write_volume(volume: &Array3<f32>, path: &Path) -> Result<()> {
    Ok(write(volume.iter().copied(), path)?)
}

/// Read a volume of known shape, failing if the file holds a different
/// number of values
pub fn read_volume(path: &Path, shape: (usize, usize, usize)) -> Result<Array3<f32>> {
    let data = read(path)?.collect::<IORes<Vec<_>>>()?;
    let expected = shape.0 * shape.1 * shape.2;
    if data.len() != expected {
        return Err(TomoError::ShapeMismatch {
            what: "raw file and requested volume",
            left: vec![data.len()],
            right: vec![shape.0, shape.1, shape.2],
        })
    }
    Array3::from_shape_vec(shape, data)
        .map_err(|_| TomoError::ShapeMismatch { what: "raw volume", left: vec![expected], right: vec![shape.0, shape.1, shape.2] })
}
