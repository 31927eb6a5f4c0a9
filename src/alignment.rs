use anyhow::{bail, Context, Result};
use rust_htslib::bam::{self, record::Aux, Read as BamRead};
use std::io::BufRead;
use std::path::Path;

use crate::classify;
use crate::input::open_input;

/// The fields of one alignment line that linking needs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignmentRecord {
    pub read_name: String,
    pub flag: u16,
    pub scaffold: String,
    /// 1-based leftmost mapping position (0 when unmapped)
    pub position: i64,
    pub mapq: u8,
    pub cigar: String,
    pub sequence: String,
    /// Edit distance from the NM tag, 0 when absent
    pub edit_distance: i64,
}

impl AlignmentRecord {
    /// Percent identity of this read against its scaffold
    pub fn percent_identity(&self) -> f64 {
        classify::percent_identity(&self.cigar, self.edit_distance, self.sequence.len())
    }

    /// Parse one SAM body line (11 mandatory fields, then optional tags)
    pub fn from_sam_line(line: &str) -> Result<Self> {
        let mut fields = line.split_whitespace();
        let mut next = |name: &str| {
            fields
                .next()
                .with_context(|| format!("SAM line is missing the {name} field"))
        };

        let read_name = next("QNAME")?.to_string();
        let flag = next("FLAG")?;
        let scaffold = next("RNAME")?.to_string();
        let position = next("POS")?;
        let mapq = next("MAPQ")?;
        let cigar = next("CIGAR")?.to_string();
        let _rnext = next("RNEXT")?;
        let _pnext = next("PNEXT")?;
        let _tlen = next("TLEN")?;
        let sequence = next("SEQ")?.to_string();
        let _qual = next("QUAL")?;

        let flag: u16 = flag
            .parse()
            .with_context(|| format!("Invalid FLAG '{flag}'"))?;
        let position: i64 = position
            .parse()
            .with_context(|| format!("Invalid POS '{position}'"))?;
        let mapq: u8 = mapq
            .parse()
            .with_context(|| format!("Invalid MAPQ '{mapq}'"))?;

        Ok(AlignmentRecord {
            read_name,
            flag,
            scaffold,
            position,
            mapq,
            cigar,
            sequence,
            edit_distance: classify::edit_distance(line),
        })
    }

    /// Convert a BAM/CRAM record, resolving the reference name from the header
    fn from_bam(record: &bam::Record, target_names: &[String]) -> Result<Self> {
        let read_name = String::from_utf8_lossy(record.qname()).into_owned();
        let scaffold = usize::try_from(record.tid())
            .ok()
            .and_then(|tid| target_names.get(tid))
            .cloned()
            .unwrap_or_else(|| "*".to_string());
        let edit_distance = match record.aux(b"NM") {
            Ok(Aux::I8(v)) => v as i64,
            Ok(Aux::U8(v)) => v as i64,
            Ok(Aux::I16(v)) => v as i64,
            Ok(Aux::U16(v)) => v as i64,
            Ok(Aux::I32(v)) => v as i64,
            Ok(Aux::U32(v)) => v as i64,
            _ => 0,
        };
        let cigar = if record.cigar_len() == 0 {
            "*".to_string()
        } else {
            record.cigar().to_string()
        };
        // Missing SEQ reads back as "*", as it does in SAM text
        let sequence = if record.seq_len() == 0 {
            "*".to_string()
        } else {
            String::from_utf8(record.seq().as_bytes()).context("Read sequence is not valid UTF-8")?
        };

        Ok(AlignmentRecord {
            read_name,
            flag: record.flags(),
            scaffold,
            position: record.pos() + 1,
            mapq: record.mapq(),
            cigar,
            sequence,
            edit_distance,
        })
    }
}

/// Streams alignment records from SAM text or BAM/CRAM
pub enum AlignmentReader {
    Sam {
        reader: Box<dyn BufRead>,
        line: String,
        line_number: usize,
    },
    Bam {
        reader: bam::Reader,
        record: bam::Record,
        target_names: Vec<String>,
    },
}

impl AlignmentReader {
    /// Open by extension: `.bam`/`.cram` through htslib, anything else as SAM text
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let is_binary = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == "bam" || ext == "cram")
            .unwrap_or(false);

        if is_binary {
            let reader = bam::Reader::from_path(path)
                .with_context(|| format!("Could not open {}", path.display()))?;
            let target_names = reader
                .header()
                .target_names()
                .iter()
                .map(|name| String::from_utf8_lossy(name).into_owned())
                .collect();
            Ok(AlignmentReader::Bam {
                reader,
                record: bam::Record::new(),
                target_names,
            })
        } else {
            Ok(Self::from_sam(open_input(path)?))
        }
    }

    pub fn from_sam<R: BufRead + 'static>(reader: R) -> Self {
        AlignmentReader::Sam {
            reader: Box::new(reader),
            line: String::new(),
            line_number: 0,
        }
    }

    /// Next record, skipping SAM header lines; None at end of input
    pub fn read_record(&mut self) -> Result<Option<AlignmentRecord>> {
        match self {
            AlignmentReader::Sam {
                reader,
                line,
                line_number,
            } => loop {
                line.clear();
                if reader.read_line(line)? == 0 {
                    return Ok(None);
                }
                *line_number += 1;
                if line.starts_with('@') || line.trim().is_empty() {
                    continue;
                }
                let record = AlignmentRecord::from_sam_line(line)
                    .with_context(|| format!("Malformed SAM record at line {line_number}"))?;
                return Ok(Some(record));
            },
            AlignmentReader::Bam {
                reader,
                record,
                target_names,
            } => match reader.read(record) {
                None => Ok(None),
                Some(Err(e)) => bail!("Failed to read BAM record: {e}"),
                Some(Ok(())) => Ok(Some(AlignmentRecord::from_bam(record, target_names)?)),
            },
        }
    }
}

impl Iterator for AlignmentReader {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const LINE: &str =
        "r1_ACGT\t99\tscaf1\t100\t60\t100M\t=\t300\t300\tACGTACGTAC\tIIIIIIIIII\tNM:i:1\tAS:i:95";

    #[test]
    fn test_parse_sam_line() {
        let record = AlignmentRecord::from_sam_line(LINE).unwrap();
        assert_eq!(record.read_name, "r1_ACGT");
        assert_eq!(record.flag, 99);
        assert_eq!(record.scaffold, "scaf1");
        assert_eq!(record.position, 100);
        assert_eq!(record.mapq, 60);
        assert_eq!(record.cigar, "100M");
        assert_eq!(record.sequence, "ACGTACGTAC");
        assert_eq!(record.edit_distance, 1);
    }

    #[test]
    fn test_missing_sequence_matches_sam() {
        let line = LINE.replace("\tACGTACGTAC\tIIIIIIIIII\t", "\t*\t*\t");
        let from_sam = AlignmentRecord::from_sam_line(&line).unwrap();

        let mut record = bam::Record::new();
        record.set(b"r1_ACGT", None, b"", b"");
        let from_bam = AlignmentRecord::from_bam(&record, &[]).unwrap();

        assert_eq!(from_sam.sequence, "*");
        assert_eq!(from_bam.sequence, from_sam.sequence);
        assert_eq!(from_bam.cigar, "*");
    }

    #[test]
    fn test_short_sam_line_is_error() {
        let err = AlignmentRecord::from_sam_line("r1\t99\tscaf1").unwrap_err();
        assert!(err.to_string().contains("POS"));
    }

    #[test]
    fn test_non_numeric_position_is_error() {
        let line = LINE.replace("\t100\t60\t", "\tx\t60\t");
        assert!(AlignmentRecord::from_sam_line(&line).is_err());
    }

    #[test]
    fn test_reader_skips_header() {
        let sam = format!("@HD\tVN:1.6\n@SQ\tSN:scaf1\tLN:1000\n{LINE}\n\n{LINE}\n");
        let reader = AlignmentReader::from_sam(Cursor::new(sam.into_bytes()));
        let records: Vec<_> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_reader_reports_line_number() {
        let sam = format!("@HD\tVN:1.6\n{LINE}\nbroken\n");
        let mut reader = AlignmentReader::from_sam(Cursor::new(sam.into_bytes()));
        assert!(reader.read_record().unwrap().is_some());
        let err = reader.read_record().unwrap_err();
        assert!(format!("{err:#}").contains("line 3"));
    }
}
