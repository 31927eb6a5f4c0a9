use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use crate::input::open_input;

/// Scaffold name -> sequence length, built once before linking
#[derive(Debug, Clone, Default)]
pub struct ScaffoldSizeIndex {
    sizes: HashMap<String, u64>,
}

impl ScaffoldSizeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a scaffold length; a later entry for the same name replaces the earlier one
    pub fn insert(&mut self, name: impl Into<String>, length: u64) {
        self.sizes.insert(name.into(), length);
    }

    /// Length of a scaffold, None if it was never loaded
    pub fn get(&self, name: &str) -> Option<u64> {
        self.sizes.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Load lengths from a FASTA or FASTQ file (optionally compressed)
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = open_input(path)?;
        let index = Self::from_reader(reader)
            .with_context(|| format!("Failed to read sequences from {}", path.display()))?;
        log::info!("Saw {} sequences in {}", index.len(), path.display());
        Ok(index)
    }

    /// Parse FASTA (`>`) or FASTQ (`@`) records; the format is chosen by the first header
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut index = ScaffoldSizeIndex::new();
        let mut lines = reader.lines();

        let mut current_name: Option<String> = None;
        let mut current_len: u64 = 0;

        while let Some(line) = lines.next() {
            let line = line?;
            let trimmed = line.trim_end();

            if let Some(header) = trimmed.strip_prefix('>') {
                if let Some(name) = current_name.take() {
                    index.insert(name, current_len);
                }
                current_name = Some(record_name(header).to_string());
                current_len = 0;
            } else if let Some(header) = trimmed.strip_prefix('@') {
                if current_name.is_some() {
                    bail!("FASTQ record '{}' found inside a FASTA file", header);
                }
                // FASTQ: sequence, '+' separator, quality; one line each
                let seq = match lines.next() {
                    Some(seq) => seq?,
                    None => bail!("Truncated FASTQ record '{}'", header),
                };
                let _separator = lines.next().transpose()?;
                let _quality = lines.next().transpose()?;
                index.insert(record_name(header), seq.trim_end().len() as u64);
            } else if !trimmed.is_empty() {
                if current_name.is_none() {
                    bail!("Sequence data found before the first header");
                }
                current_len += trimmed.len() as u64;
            }
        }

        if let Some(name) = current_name {
            index.insert(name, current_len);
        }

        Ok(index)
    }
}

impl FromIterator<(String, u64)> for ScaffoldSizeIndex {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        ScaffoldSizeIndex {
            sizes: iter.into_iter().collect(),
        }
    }
}

/// Sequence id: the first whitespace-delimited token of a header line
fn record_name(header: &str) -> &str {
    header.split_whitespace().next().unwrap_or("")
}
