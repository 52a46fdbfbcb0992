//! Reading picks, describing seismic volumes and exporting grids

mod export;
mod picks;
mod seismic;

pub use export::{export_file_name, write_binary, write_binary_to, write_text, write_text_to};
pub use picks::{parse_picks, read_picks, read_picks_from, write_picks, write_picks_to};
pub use seismic::{SeismicHeader, SeismicVolume};
