use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use noodles::bgzf;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Compression detected from a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bgzf,
}

impl Compression {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("bgz") => Compression::Bgzf,
            Some("gz") => Compression::Gzip,
            _ => Compression::None,
        }
    }
}

/// Open a text input, decompressing `.gz` (gzip or BGZF) and `.bgz` (BGZF) files
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Could not open {}", path.display()))?;

    Ok(match Compression::from_path(path) {
        Compression::Bgzf => Box::new(BufReader::new(bgzf::io::reader::Reader::new(file))),
        Compression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(file))),
        Compression::None => Box::new(BufReader::new(file)),
    })
}

/// Read a file of filenames: one path per line, blank lines ignored.
/// Relative paths are taken as given (relative to the working directory).
pub fn read_file_of_filenames<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    let reader = open_input(path)?;
    let mut paths = Vec::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("Failed reading {}", path.display()))?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            paths.push(PathBuf::from(trimmed));
        }
    }
    Ok(paths)
}
