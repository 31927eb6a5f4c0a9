//! Per-record checks applied while streaming alignments: barcode tokens,
//! proper-pair flags and percent identity.

/// SAM flags accepted as a correctly oriented, mapped read pair
/// (paired, proper, mate reverse/forward, first/second in pair)
pub const PROPER_PAIR_FLAGS: [u16; 4] = [99, 163, 83, 147];

/// Returns true if the token only contains A, C, G or T (any case).
/// The empty string passes; callers must exclude it themselves.
pub fn is_valid_barcode(token: &str) -> bool {
    token
        .bytes()
        .all(|b| matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T'))
}

/// Check if a SAM flag is one of the accepted proper-pair configurations
pub fn is_proper_pair_flag(flag: u16) -> bool {
    PROPER_PAIR_FLAGS.contains(&flag)
}

/// Extract the barcode from a read name of the form `<read>_<barcode>`.
/// Returns None when there is no underscore, or the suffix is empty or not a barcode.
pub fn barcode_from_read_name(read_name: &str) -> Option<&str> {
    let (_, suffix) = read_name.split_once('_')?;
    if !suffix.is_empty() && is_valid_barcode(suffix) {
        Some(suffix)
    } else {
        None
    }
}

/// CIGAR operations that consume query bases for identity purposes
fn consumes_query(op: char) -> bool {
    matches!(op, 'M' | '=' | 'X' | 'I')
}

/// Sum of the run lengths of M, =, X and I operations.
/// Malformed runs contribute nothing rather than failing the record.
pub fn aligned_query_length(cigar: &str) -> u64 {
    let mut total = 0u64;
    let mut run = 0u64;
    for ch in cigar.chars() {
        if let Some(d) = ch.to_digit(10) {
            run = run.saturating_mul(10).saturating_add(d as u64);
        } else {
            if consumes_query(ch) {
                total = total.saturating_add(run);
            }
            run = 0;
        }
    }
    total
}

/// Edit distance from the `NM:i:` annotation, 0 if absent or unparsable
pub fn edit_distance(annotation: &str) -> i64 {
    let Some(found) = annotation.find("NM:i:") else {
        return 0;
    };
    let rest = &annotation[found + 5..];
    let end = rest
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    rest[..end].parse().unwrap_or(0)
}

/// Percent identity of a read: 100 * (qalen - edit_distance) / read_len.
///
/// Returns 0 when nothing aligned or the read has no bases. The value is not
/// clamped: an edit distance above the aligned length yields a negative identity,
/// which simply fails any minimum-identity threshold.
pub fn percent_identity(cigar: &str, edit_distance: i64, read_len: usize) -> f64 {
    let qalen = aligned_query_length(cigar);
    if qalen == 0 || read_len == 0 {
        return 0.0;
    }
    100.0 * (qalen as f64 - edit_distance as f64) / read_len as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_barcodes() {
        assert!(is_valid_barcode("ACGTACGT"));
        assert!(is_valid_barcode("acgtAC"));
        assert!(is_valid_barcode(""));
        assert!(!is_valid_barcode("ACGN"));
        assert!(!is_valid_barcode("AC-GT"));
    }

    #[test]
    fn test_proper_pair_flags() {
        for flag in [99, 163, 83, 147] {
            assert!(is_proper_pair_flag(flag));
        }
        for flag in [0, 4, 65, 97, 129, 145, 161, 353] {
            assert!(!is_proper_pair_flag(flag));
        }
    }

    #[test]
    fn test_barcode_from_read_name() {
        assert_eq!(barcode_from_read_name("read1_ACGTACGT"), Some("ACGTACGT"));
        assert_eq!(barcode_from_read_name("read1_acgt"), Some("acgt"));
        assert_eq!(barcode_from_read_name("read1"), None);
        assert_eq!(barcode_from_read_name("read1_"), None);
        // Only the first underscore splits
        assert_eq!(barcode_from_read_name("read_1_ACGT"), None);
        assert_eq!(barcode_from_read_name("read1_ACGTN"), None);
    }

    #[test]
    fn test_aligned_query_length() {
        assert_eq!(aligned_query_length("100M"), 100);
        assert_eq!(aligned_query_length("10S80M2I8M"), 90);
        assert_eq!(aligned_query_length("50=1X49="), 100);
        assert_eq!(aligned_query_length("20M5D30M"), 50);
        assert_eq!(aligned_query_length("*"), 0);
        assert_eq!(aligned_query_length(""), 0);
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("NM:i:3\tAS:i:90"), 3);
        assert_eq!(edit_distance("AS:i:90\tNM:i:12"), 12);
        assert_eq!(edit_distance("AS:i:90"), 0);
        assert_eq!(edit_distance("NM:i:x"), 0);
    }

    #[test]
    fn test_percent_identity() {
        assert_eq!(percent_identity("100M", 2, 100), 98.0);
        assert_eq!(percent_identity("*", 0, 100), 0.0);
        assert_eq!(percent_identity("100M", 0, 0), 0.0);
        // Soft-clipped bases count against identity through the read length
        assert_eq!(percent_identity("50S50M", 0, 100), 50.0);
        // Edit distance beyond the aligned length goes negative
        assert!(percent_identity("10M", 20, 10) < 0.0);
    }
}
