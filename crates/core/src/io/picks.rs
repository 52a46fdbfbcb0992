//! Plain-text pick files
//!
//! Three columns (trace, time in ms, velocity in m/s) after one header row.
//! Columns are tab separated when any of the first lines contains a tab,
//! whitespace separated otherwise. Blank lines and `#` comments are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::pick::{Pick, PickSet};

/// Lines inspected when deciding on the delimiter
const SNIFF_LINES: usize = 3;

/// Read a pick file from disk
pub fn read_picks<P: AsRef<Path>>(path: P) -> Result<PickSet> {
    let file = File::open(path.as_ref())?;
    read_picks_from(BufReader::new(file))
}

/// Read picks from any buffered reader
pub fn read_picks_from<R: BufRead>(reader: R) -> Result<PickSet> {
    let lines = reader.lines().collect::<std::io::Result<Vec<_>>>()?;
    parse_lines(&lines)
}

/// Parse picks from an in-memory string
pub fn parse_picks(text: &str) -> Result<PickSet> {
    let lines: Vec<String> = text.lines().map(str::to_owned).collect();
    parse_lines(&lines)
}

fn parse_lines(lines: &[String]) -> Result<PickSet> {
    let tab_separated = lines.iter().take(SNIFF_LINES).any(|l| l.contains('\t'));

    let mut picks = Vec::new();
    // First line is the header
    for (index, raw) in lines.iter().enumerate().skip(1) {
        let line_no = index + 1;
        let content = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw.as_str(),
        };
        if content.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = if tab_separated {
            content.split('\t').map(str::trim).collect()
        } else {
            content.split_whitespace().collect()
        };
        if fields.len() < 3 {
            return Err(Error::Parse {
                line: line_no,
                reason: format!("expected 3 columns, found {}", fields.len()),
            });
        }

        let mut values = [0.0; 3];
        for (slot, field) in values.iter_mut().zip(&fields) {
            *slot = field.parse::<f64>().map_err(|_| Error::Parse {
                line: line_no,
                reason: format!("'{field}' is not a number"),
            })?;
        }

        let pick = Pick::new(values[0], values[1], values[2]);
        if !pick.velocity.is_finite() || pick.velocity <= 0.0 {
            return Err(Error::Parse {
                line: line_no,
                reason: format!("velocity {} is not positive", pick.velocity),
            });
        }
        picks.push(pick);
    }

    debug!(count = picks.len(), tab_separated, "parsed pick file");
    PickSet::new(picks).map_err(|e| Error::Parse {
        line: 0,
        reason: e.to_string(),
    })
}

/// Write picks in the format [`read_picks`] accepts
pub fn write_picks<P: AsRef<Path>>(picks: &PickSet, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_picks_to(picks, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write picks to any writer
pub fn write_picks_to<W: Write>(picks: &PickSet, writer: &mut W) -> Result<()> {
    writeln!(writer, "# Custom velocity picks - created by velgrid")?;
    writeln!(writer, "# CDP TWT(ms) Velocity(m/s)")?;
    for p in picks {
        writeln!(writer, "{:.0} {:.1} {:.0}", p.trace, p.time_ms, p.velocity)?;
    }
    Ok(())
}
