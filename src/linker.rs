//! Paired-record linking: turns a name-sorted alignment stream into per-barcode
//! head/tail hit counts for each scaffold.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::alignment::{AlignmentReader, AlignmentRecord};
use crate::classify::{barcode_from_read_name, is_proper_pair_flag};
use crate::config::LinkConfig;
use crate::scaffold_sizes::ScaffoldSizeIndex;
use crate::stats::EndLabel;

/// Unpaired events between two rate-limited warnings
const UNPAIRED_WARNING_INTERVAL: u64 = 1_000_000;

/// Records between two progress messages
const PROGRESS_INTERVAL: u64 = 10_000_000;

/// Read-pair hits on both end regions of one scaffold under one barcode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndCounts {
    pub head: u32,
    pub tail: u32,
}

impl EndCounts {
    pub fn increment(&mut self, end: EndLabel) {
        match end {
            EndLabel::Head => self.head += 1,
            EndLabel::Tail => self.tail += 1,
        }
    }
}

/// Scaffold -> end counts for one barcode, ordered by scaffold name
pub type BarcodeHits = BTreeMap<String, EndCounts>;

/// Barcode -> scaffold -> end counts. Both ends of a scaffold exist as soon as
/// either one is touched.
pub type BarcodeIndex = HashMap<String, BarcodeHits>;

/// Barcode -> number of records carrying it, across all sources
pub type BarcodeMultiplicity = HashMap<String, u64>;

/// Counts accumulated while streaming one or more alignment sources
#[derive(Debug, Clone, Default)]
pub struct LinkCounts {
    pub index: BarcodeIndex,
    pub multiplicity: BarcodeMultiplicity,
}

impl LinkCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one read pair on an end of a scaffold under a barcode
    pub fn add_hit(&mut self, barcode: &str, scaffold: &str, end: EndLabel) {
        self.index
            .entry(barcode.to_string())
            .or_default()
            .entry(scaffold.to_string())
            .or_default()
            .increment(end);
    }

    /// Hits recorded for a scaffold under a barcode
    pub fn hits(&self, barcode: &str, scaffold: &str) -> Option<EndCounts> {
        self.index.get(barcode)?.get(scaffold).copied()
    }

    pub fn multiplicity_of(&self, barcode: &str) -> u64 {
        self.multiplicity.get(barcode).copied().unwrap_or(0)
    }

    /// Additive merge of counts from another source
    pub fn merge(&mut self, other: LinkCounts) {
        for (barcode, hits) in other.index {
            let target = self.index.entry(barcode).or_default();
            for (scaffold, counts) in hits {
                let entry = target.entry(scaffold).or_default();
                entry.head += counts.head;
                entry.tail += counts.tail;
            }
        }
        for (barcode, count) in other.multiplicity {
            *self.multiplicity.entry(barcode).or_insert(0) += count;
        }
    }
}

/// Per-source bookkeeping reported after linking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkerStats {
    pub records: u64,
    /// Pairs passing the flag, quality, identity and scaffold checks
    pub accepted_pairs: u64,
    /// Accepted pairs that landed in a head or tail region
    pub counted_pairs: u64,
    pub unpaired: u64,
}

impl LinkerStats {
    pub fn merge(&mut self, other: LinkerStats) {
        self.records += other.records;
        self.accepted_pairs += other.accepted_pairs;
        self.counted_pairs += other.counted_pairs;
        self.unpaired += other.unpaired;
    }
}

/// First mate of a pair, held until its partner arrives
#[derive(Debug, Clone)]
struct HeldMate {
    identity: i64,
    flag: u16,
    mapq: u8,
    scaffold: String,
    position: i64,
}

#[derive(Debug, Clone)]
enum MateState {
    AwaitingFirstMate,
    HoldingFirstMate(HeldMate),
}

/// A complete read pair waiting for the next read name before it is counted
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingPair {
    barcode: String,
    scaffold: String,
    position: i64,
}

/// State machine over one name-sorted alignment source.
///
/// Mates must be adjacent and share a read name. A read whose partner does not
/// follow is counted as unpaired and the new record becomes the pairing anchor.
/// A completed pair is only counted once the next read name shows up, so a third
/// record with the same name discards it. Nothing follows the last pair of a
/// source, so that pair is never counted.
pub struct PairedRecordLinker<'a> {
    sizes: &'a ScaffoldSizeIndex,
    config: &'a LinkConfig,
    state: MateState,
    current_name: String,
    pending: Option<PendingPair>,
    counts: LinkCounts,
    stats: LinkerStats,
}

impl<'a> PairedRecordLinker<'a> {
    pub fn new(sizes: &'a ScaffoldSizeIndex, config: &'a LinkConfig) -> Self {
        PairedRecordLinker {
            sizes,
            config,
            state: MateState::AwaitingFirstMate,
            current_name: String::new(),
            pending: None,
            counts: LinkCounts::new(),
            stats: LinkerStats::default(),
        }
    }

    /// Feed the next record of the source
    pub fn process(&mut self, record: &AlignmentRecord) {
        self.stats.records += 1;
        if self.stats.records % PROGRESS_INTERVAL == 0 {
            log::debug!("On record {}", self.stats.records);
        }

        let barcode = barcode_from_read_name(&record.read_name);
        if let Some(barcode) = barcode {
            *self
                .counts
                .multiplicity
                .entry(barcode.to_string())
                .or_insert(0) += 1;
        }

        // Whole percent, truncated toward zero
        let identity = record.percent_identity() as i64;

        if matches!(self.state, MateState::HoldingFirstMate(_))
            && record.read_name != self.current_name
        {
            self.report_unpaired(&record.read_name);
            self.state = MateState::AwaitingFirstMate;
        }

        match std::mem::replace(&mut self.state, MateState::AwaitingFirstMate) {
            MateState::AwaitingFirstMate => {
                if record.read_name == self.current_name {
                    // Third record for this read name: do not trust the pair
                    self.pending = None;
                } else {
                    self.current_name.clone_from(&record.read_name);
                    self.flush_pending();
                    self.state = MateState::HoldingFirstMate(HeldMate {
                        identity,
                        flag: record.flag,
                        mapq: record.mapq,
                        scaffold: record.scaffold.clone(),
                        position: record.position,
                    });
                }
            }
            MateState::HoldingFirstMate(first) => {
                if self.is_linkable_pair(&first, record, identity) {
                    if let Some(barcode) = barcode {
                        self.stats.accepted_pairs += 1;
                        self.pending = Some(PendingPair {
                            barcode: barcode.to_string(),
                            scaffold: record.scaffold.clone(),
                            position: (first.position + record.position) / 2,
                        });
                    }
                }
            }
        }
    }

    /// Return what was counted. A pair still pending has no successor and is dropped.
    pub fn finish(self) -> (LinkCounts, LinkerStats) {
        if self.pending.is_some() {
            log::debug!("Dropping the last read pair of the source");
        }
        if self.stats.unpaired > 0 {
            log::warn!(
                "Skipped {} unpaired reads. Alignments should be sorted by read name.",
                self.stats.unpaired
            );
        }
        (self.counts, self.stats)
    }

    fn is_linkable_pair(&self, first: &HeldMate, second: &AlignmentRecord, identity: i64) -> bool {
        !second.sequence.is_empty()
            && is_proper_pair_flag(first.flag)
            && is_proper_pair_flag(second.flag)
            && first.mapq != 0
            && second.mapq != 0
            && first.identity >= i64::from(self.config.min_identity)
            && identity >= i64::from(self.config.min_identity)
            && first.scaffold == second.scaffold
            && second.scaffold != "*"
            && !second.scaffold.is_empty()
    }

    fn report_unpaired(&mut self, read_name: &str) {
        if self.stats.unpaired == 0 {
            log::warn!(
                "Skipping an unpaired read. Alignments should be sorted by read name.\n  Prev read: {}\n  Curr read: {}",
                self.current_name,
                read_name
            );
        }
        self.stats.unpaired += 1;
        if self.stats.unpaired % UNPAIRED_WARNING_INTERVAL == 0 {
            log::warn!("Skipped {} unpaired reads.", self.stats.unpaired);
        }
    }

    /// Count the pending pair on the head or tail of its scaffold
    fn flush_pending(&mut self) {
        let Some(pair) = self.pending.take() else {
            return;
        };
        let Some(size) = self.sizes.get(&pair.scaffold) else {
            return;
        };
        if size < self.config.min_scaffold_length {
            return;
        }

        let cutoff = self.config.end_cutoff(size) as i64;
        let size = size as i64;
        let end = if pair.position <= cutoff {
            EndLabel::Head
        } else if pair.position > size - cutoff {
            EndLabel::Tail
        } else {
            return;
        };

        self.counts.add_hit(&pair.barcode, &pair.scaffold, end);
        self.stats.counted_pairs += 1;
    }
}

/// Stream every record of a reader through a fresh linker
pub fn link_records<I>(
    records: I,
    sizes: &ScaffoldSizeIndex,
    config: &LinkConfig,
) -> Result<(LinkCounts, LinkerStats)>
where
    I: IntoIterator<Item = Result<AlignmentRecord>>,
{
    let mut linker = PairedRecordLinker::new(sizes, config);
    for record in records {
        linker.process(&record?);
    }
    Ok(linker.finish())
}

/// Link one alignment file
pub fn link_alignment_file<P: AsRef<Path>>(
    path: P,
    sizes: &ScaffoldSizeIndex,
    config: &LinkConfig,
) -> Result<(LinkCounts, LinkerStats)> {
    let path = path.as_ref();
    log::info!("Reading alignments from {}", path.display());
    let reader = AlignmentReader::from_path(path)?;
    link_records(reader, sizes, config)
        .with_context(|| format!("Failed while linking {}", path.display()))
}

/// Link all alignment files, in parallel, and merge their counts.
/// The merge is additive, so the result does not depend on file order.
pub fn link_alignment_files(
    paths: &[PathBuf],
    sizes: &ScaffoldSizeIndex,
    config: &LinkConfig,
) -> Result<(LinkCounts, LinkerStats)> {
    paths
        .par_iter()
        .map(|path| link_alignment_file(path, sizes, config))
        .try_reduce(
            || (LinkCounts::new(), LinkerStats::default()),
            |(mut counts, mut stats), (other_counts, other_stats)| {
                counts.merge(other_counts);
                stats.merge(other_stats);
                Ok((counts, stats))
            },
        )
}
