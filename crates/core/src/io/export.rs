//! Grid exporters
//!
//! Binary: raw little-endian `f32`, row-major `[time][trace]`, no header.
//! Text: tab separated `CDP TWT VEL` rows (plus `X Y` when trace coordinates
//! are known), one row per cell, grouped by trace.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::Result;
use crate::grid::VelocityGrid;

/// Write the grid as little-endian `f32` values
pub fn write_binary<P: AsRef<Path>>(grid: &VelocityGrid, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_binary_to(grid, &mut writer)?;
    writer.flush()?;
    Ok(())
}

pub fn write_binary_to<W: Write>(grid: &VelocityGrid, writer: &mut W) -> Result<()> {
    // Iteration over Array2 is logical row-major order regardless of layout
    for &v in grid.data().iter() {
        writer.write_f32::<LittleEndian>(v as f32)?;
    }
    Ok(())
}

/// Write the grid as a tab-separated table.
///
/// CDP numbers are 1-based (`trace + 1`); CDP, time and velocity are
/// truncated to integers. Cells without an estimate are written as `NaN`.
/// With `coordinates`, trace `i` takes `coordinates[i]` and traces past the
/// end of the list are left out.
pub fn write_text<P: AsRef<Path>>(
    grid: &VelocityGrid,
    coordinates: Option<&[(f64, f64)]>,
    path: P,
) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_text_to(grid, coordinates, &mut writer)?;
    writer.flush()?;
    Ok(())
}

pub fn write_text_to<W: Write>(
    grid: &VelocityGrid,
    coordinates: Option<&[(f64, f64)]>,
    writer: &mut W,
) -> Result<()> {
    let geometry = grid.geometry();

    match coordinates {
        Some(_) => writeln!(writer, "CDP\tX\tY\tTWT\tVEL")?,
        None => writeln!(writer, "CDP\tTWT\tVEL")?,
    }

    for (col, &trace) in geometry.trace_axis().iter().enumerate() {
        let cdp = truncate(trace).map(|t| t + 1);
        let xy = match (coordinates, cdp) {
            (None, _) => None,
            (Some(coords), Some(cdp)) if cdp >= 1 && (cdp as usize) <= coords.len() => {
                Some(coords[cdp as usize - 1])
            }
            // No matching trace header
            (Some(_), _) => continue,
        };

        for (row, &time) in geometry.time_axis().iter().enumerate() {
            let velocity = grid.data()[(row, col)];
            let cdp = format_int(cdp);
            let twt = format_int(truncate(time));
            let vel = format_int(truncate(velocity));
            match xy {
                Some((x, y)) => writeln!(writer, "{cdp}\t{x}\t{y}\t{twt}\t{vel}")?,
                None => writeln!(writer, "{cdp}\t{twt}\t{vel}")?,
            }
        }
    }
    Ok(())
}

/// Output file name for a grid derived from `volume_path`:
/// `<stem>_interpolated_2D.<extension>`.
pub fn export_file_name(volume_path: &Path, extension: &str) -> PathBuf {
    let stem = volume_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "velocity".to_owned());
    PathBuf::from(format!("{stem}_interpolated_2D.{extension}"))
}

fn truncate(value: f64) -> Option<i64> {
    num_traits::cast::<f64, i64>(value.trunc())
}

fn format_int(value: Option<i64>) -> String {
    value.map_or_else(|| "NaN".to_owned(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GridGeometry;
    use byteorder::ReadBytesExt;
    use std::io::Cursor;

    fn grid() -> VelocityGrid {
        let geometry = GridGeometry::from_axes(vec![0.0, 1.0], vec![0.0, 4.5]).unwrap();
        VelocityGrid::from_vec(geometry, vec![1500.7, 1510.0, 1600.2, f64::NAN]).unwrap()
    }

    #[test]
    fn test_binary_layout() {
        let mut buf = Vec::new();
        write_binary_to(&grid(), &mut buf).unwrap();
        assert_eq!(buf.len(), 4 * 4);

        let mut rdr = Cursor::new(buf);
        assert_eq!(rdr.read_f32::<LittleEndian>().unwrap(), 1500.7f32);
        assert_eq!(rdr.read_f32::<LittleEndian>().unwrap(), 1510.0f32);
        assert_eq!(rdr.read_f32::<LittleEndian>().unwrap(), 1600.2f32);
        assert!(rdr.read_f32::<LittleEndian>().unwrap().is_nan());
    }

    #[test]
    fn test_text_without_coordinates() {
        let mut buf = Vec::new();
        write_text_to(&grid(), None, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "CDP\tTWT\tVEL");
        assert_eq!(lines[1], "1\t0\t1500");
        assert_eq!(lines[2], "1\t4\t1600");
        assert_eq!(lines[3], "2\t0\t1510");
        assert_eq!(lines[4], "2\t4\tNaN");
    }

    #[test]
    fn test_text_with_coordinates() {
        let mut buf = Vec::new();
        // Only the first trace has a header entry
        write_text_to(&grid(), Some(&[(100.0, 200.0)][..]), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "CDP\tX\tY\tTWT\tVEL");
        assert_eq!(lines[1], "1\t100\t200\t0\t1500");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_files_written() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join(export_file_name(Path::new("/data/line_01.sgy"), "bin"));
        assert!(bin.ends_with("line_01_interpolated_2D.bin"));
        write_binary(&grid(), &bin).unwrap();
        assert_eq!(std::fs::metadata(&bin).unwrap().len(), 16);

        let dat = dir.path().join("out.dat");
        write_text(&grid(), None, &dat).unwrap();
        assert!(std::fs::read_to_string(&dat).unwrap().starts_with("CDP"));
    }
}
