use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::config::LinkConfig;
use crate::linker::{BarcodeHits, LinkCounts};
use crate::stats::{classify, EndLabel};

/// Which end of each scaffold a link joins, in fixed index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Orientation {
    HeadHead = 0,
    HeadTail = 1,
    TailHead = 2,
    TailTail = 3,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::HeadHead,
        Orientation::HeadTail,
        Orientation::TailHead,
        Orientation::TailTail,
    ];

    /// Orientation from the end of the first and second scaffold of a pair
    pub fn from_ends(first: EndLabel, second: EndLabel) -> Self {
        match (first, second) {
            (EndLabel::Head, EndLabel::Head) => Orientation::HeadHead,
            (EndLabel::Head, EndLabel::Tail) => Orientation::HeadTail,
            (EndLabel::Tail, EndLabel::Head) => Orientation::TailHead,
            (EndLabel::Tail, EndLabel::Tail) => Orientation::TailTail,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Unordered pair of distinct scaffolds, smaller name first
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    first: String,
    second: String,
}

impl PairKey {
    /// Canonical key for two scaffolds; None for a self-pair
    pub fn new(a: &str, b: &str) -> Option<Self> {
        match a.cmp(b) {
            std::cmp::Ordering::Less => Some(PairKey {
                first: a.to_string(),
                second: b.to_string(),
            }),
            std::cmp::Ordering::Greater => Some(PairKey {
                first: b.to_string(),
                second: a.to_string(),
            }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }
}

/// Link counts per orientation, indexed HH, HT, TH, TT
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrientationCounts(pub [u32; 4]);

impl OrientationCounts {
    pub fn increment(&mut self, orientation: Orientation) {
        self.0[orientation.index()] += 1;
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Largest count and its orientation; the lowest index wins ties
    pub fn max(&self) -> (u32, Orientation) {
        let mut max = 0;
        let mut index = 0;
        for (i, &count) in self.0.iter().enumerate() {
            if count > max {
                max = count;
                index = i;
            }
        }
        (max, Orientation::ALL[index])
    }

    /// Largest count that differs from the maximum, 0 if all counts equal it
    pub fn runner_up(&self) -> u32 {
        let (max, _) = self.max();
        self.0
            .iter()
            .copied()
            .filter(|&count| count != max)
            .max()
            .unwrap_or(0)
    }

    fn add(&mut self, other: &OrientationCounts) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += b;
        }
    }
}

/// Scaffold pair -> orientation counts, iterated in key order
pub type PairMap = BTreeMap<PairKey, OrientationCounts>;

/// Count, for every scaffold pair sharing a barcode, which ends the barcode supports.
///
/// Only barcodes whose multiplicity falls in the configured range are used. A
/// barcode contributes one link to a pair when both scaffolds get a significant
/// head/tail call from their own counts under that barcode.
pub fn aggregate_pairs(counts: &LinkCounts, config: &LinkConfig) -> PairMap {
    counts
        .index
        .par_iter()
        .filter(|(barcode, _)| config.multiplicity.contains(counts.multiplicity_of(barcode)))
        .fold(PairMap::new, |mut pairs, (_, hits)| {
            add_barcode_links(hits, config, &mut pairs);
            pairs
        })
        .reduce(PairMap::new, merge_pair_maps)
}

/// Add the links supported by one barcode
fn add_barcode_links(hits: &BarcodeHits, config: &LinkConfig, pairs: &mut PairMap) {
    // Hits are ordered by scaffold name, so i < j gives the canonical pair order
    let called: Vec<(&str, EndLabel)> = hits
        .iter()
        .filter_map(|(scaffold, ends)| {
            classify(ends.head, ends.tail, config.min_read_pairs, config.max_error)
                .end()
                .map(|end| (scaffold.as_str(), end))
        })
        .collect();

    for (i, &(scaf_a, end_a)) in called.iter().enumerate() {
        for &(scaf_b, end_b) in &called[i + 1..] {
            let Some(key) = PairKey::new(scaf_a, scaf_b) else {
                continue;
            };
            pairs
                .entry(key)
                .or_default()
                .increment(Orientation::from_ends(end_a, end_b));
        }
    }
}

fn merge_pair_maps(mut a: PairMap, b: PairMap) -> PairMap {
    if a.len() < b.len() {
        return merge_pair_maps(b, a);
    }
    for (key, counts) in b {
        a.entry(key).or_default().add(&counts);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MultiplicityRange;

    fn counts_with(barcode: &str, hits: &[(&str, EndLabel, u32)], multiplicity: u64) -> LinkCounts {
        let mut counts = LinkCounts::new();
        for &(scaffold, end, n) in hits {
            for _ in 0..n {
                counts.add_hit(barcode, scaffold, end);
            }
        }
        counts.multiplicity.insert(barcode.to_string(), multiplicity);
        counts
    }

    fn config() -> LinkConfig {
        LinkConfig {
            multiplicity: MultiplicityRange::new(1, 100),
            ..Default::default()
        }
    }

    #[test]
    fn test_pair_key_is_canonical() {
        let key = PairKey::new("b", "a").unwrap();
        assert_eq!(key.first(), "a");
        assert_eq!(key.second(), "b");
        assert_eq!(PairKey::new("a", "b"), Some(key));
        assert_eq!(PairKey::new("a", "a"), None);
    }

    #[test]
    fn test_max_prefers_lowest_index() {
        let counts = OrientationCounts([2, 5, 5, 1]);
        assert_eq!(counts.max(), (5, Orientation::HeadTail));
        assert_eq!(counts.runner_up(), 2);
        assert_eq!(OrientationCounts([0, 0, 0, 0]).max(), (0, Orientation::HeadHead));
    }

    #[test]
    fn test_orientation_follows_pair_order() {
        // "s1" < "s2": s1 tail, s2 head -> TH
        let counts = counts_with(
            "ACGT",
            &[("s2", EndLabel::Head, 6), ("s1", EndLabel::Tail, 6)],
            24,
        );
        let pairs = aggregate_pairs(&counts, &config());
        let key = PairKey::new("s1", "s2").unwrap();
        assert_eq!(pairs[&key], OrientationCounts([0, 0, 1, 0]));
    }

    #[test]
    fn test_insignificant_scaffold_contributes_nothing() {
        let mut counts = counts_with(
            "ACGT",
            &[
                ("s1", EndLabel::Head, 6),
                ("s2", EndLabel::Head, 3),
                ("s2", EndLabel::Tail, 3),
            ],
            24,
        );
        counts.add_hit("ACGT", "s3", EndLabel::Head);
        let pairs = aggregate_pairs(&counts, &config());
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_multiplicity_outside_range_is_ignored() {
        let counts = counts_with(
            "ACGT",
            &[("s1", EndLabel::Head, 6), ("s2", EndLabel::Head, 6)],
            200_000,
        );
        let config = LinkConfig {
            multiplicity: MultiplicityRange::new(50, 10_000),
            ..Default::default()
        };
        assert!(aggregate_pairs(&counts, &config).is_empty());
    }

    #[test]
    fn test_links_accumulate_across_barcodes() {
        let mut counts = LinkCounts::new();
        for barcode in ["AAAA", "CCCC", "GGGG"] {
            counts.merge(counts_with(
                barcode,
                &[("s1", EndLabel::Head, 5), ("s2", EndLabel::Tail, 5)],
                20,
            ));
        }
        let pairs = aggregate_pairs(&counts, &config());
        assert_eq!(pairs.len(), 1);
        let key = PairKey::new("s1", "s2").unwrap();
        assert_eq!(pairs[&key], OrientationCounts([0, 3, 0, 0]));
    }
}
