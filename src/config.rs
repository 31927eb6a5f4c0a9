use anyhow::{bail, Result};

/// Inclusive range of accepted barcode multiplicities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiplicityRange {
    pub min: u64,
    pub max: u64,
}

impl MultiplicityRange {
    pub fn new(min: u64, max: u64) -> Self {
        MultiplicityRange { min, max }
    }

    /// Check if a barcode multiplicity falls within the range
    pub fn contains(&self, multiplicity: u64) -> bool {
        multiplicity >= self.min && multiplicity <= self.max
    }
}

impl Default for MultiplicityRange {
    fn default() -> Self {
        MultiplicityRange::new(50, 10_000)
    }
}

impl std::str::FromStr for MultiplicityRange {
    type Err = String;

    /// Parse "min-max", e.g. "50-10000"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (min, max) = s
            .split_once('-')
            .ok_or_else(|| format!("Invalid multiplicity range '{s}'. Use: <min>-<max>"))?;
        let min: u64 = min
            .trim()
            .parse()
            .map_err(|_| format!("Invalid minimum multiplicity '{min}'"))?;
        let max: u64 = max
            .trim()
            .parse()
            .map_err(|_| format!("Invalid maximum multiplicity '{max}'"))?;
        if min > max {
            return Err(format!(
                "Minimum multiplicity {min} is greater than maximum {max}"
            ));
        }
        Ok(MultiplicityRange { min, max })
    }
}

impl std::fmt::Display for MultiplicityRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Thresholds and filters for a linking run
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub min_identity: u32,               // -s/--seq-id, whole percent
    pub min_read_pairs: u32,             // -c/--min-reads
    pub min_links: u32,                  // -l/--min-links
    pub min_scaffold_length: u64,        // -z/--min-size
    pub multiplicity: MultiplicityRange, // -m/--index-multiplicity
    pub max_degree: usize,               // -d/--max-degree, 0 disables pruning
    pub end_length: u64,                 // -e/--end-length, 0 splits scaffolds in half
    pub max_error: f64,                  // -r/--error-percent
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            min_identity: 98,
            min_read_pairs: 5,
            min_links: 0,
            min_scaffold_length: 500,
            multiplicity: MultiplicityRange::default(),
            max_degree: 0,
            end_length: 0,
            max_error: 0.05,
        }
    }
}

impl LinkConfig {
    /// Reject settings that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if !(self.max_error > 0.0 && self.max_error <= 1.0) {
            bail!(
                "Maximum error probability must be in (0, 1], got {}",
                self.max_error
            );
        }
        if self.multiplicity.min > self.multiplicity.max {
            bail!(
                "Invalid multiplicity range {}: minimum exceeds maximum",
                self.multiplicity
            );
        }
        Ok(())
    }

    /// Length of the head/tail region for a scaffold of the given size
    pub fn end_cutoff(&self, scaffold_length: u64) -> u64 {
        if self.end_length == 0 || scaffold_length <= self.end_length.saturating_mul(2) {
            scaffold_length / 2
        } else {
            self.end_length
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multiplicity_range() {
        let r: MultiplicityRange = "50-10000".parse().unwrap();
        assert_eq!(r, MultiplicityRange::new(50, 10_000));
        assert!(r.contains(50));
        assert!(r.contains(10_000));
        assert!(!r.contains(49));
        assert!(!r.contains(10_001));
    }

    #[test]
    fn test_parse_invalid_multiplicity_range() {
        assert!("50".parse::<MultiplicityRange>().is_err());
        assert!("a-10".parse::<MultiplicityRange>().is_err());
        assert!("100-10".parse::<MultiplicityRange>().is_err());
    }

    #[test]
    fn test_end_cutoff() {
        let mut config = LinkConfig::default();
        assert_eq!(config.end_cutoff(1000), 500);

        config.end_length = 100;
        assert_eq!(config.end_cutoff(1000), 100);
        // Exactly twice the end length falls back to half
        assert_eq!(config.end_cutoff(200), 100);
        assert_eq!(config.end_cutoff(150), 75);
    }

    #[test]
    fn test_validate() {
        assert!(LinkConfig::default().validate().is_ok());

        let config = LinkConfig {
            max_error: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
