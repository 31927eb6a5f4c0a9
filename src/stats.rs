//! Normal approximation to the binomial, shared by head/tail calls and the
//! edge orientation margin test.

/// One of the two end regions of a scaffold.
///
/// The label is arbitrary with respect to strand: Head is the first `cutoff`
/// bases of the scaffold sequence and Tail the last `cutoff` bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EndLabel {
    Head,
    Tail,
}

/// Result of classifying one scaffold's head/tail counts under a barcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndCall {
    pub significant: bool,
    pub favors_head: bool,
}

impl EndCall {
    pub const NOT_SIGNIFICANT: EndCall = EndCall {
        significant: false,
        favors_head: false,
    };

    /// The supported end, if the call is significant
    pub fn end(&self) -> Option<EndLabel> {
        match (self.significant, self.favors_head) {
            (false, _) => None,
            (true, true) => Some(EndLabel::Head),
            (true, false) => Some(EndLabel::Tail),
        }
    }
}

/// Complementary error function (Numerical Recipes Chebyshev fit, |error| < 1.2e-7)
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let tau = t
        * (-z * z - 1.26551223
            + t * (1.00002368
                + t * (0.37409196
                    + t * (0.09678418
                        + t * (-0.18628806
                            + t * (0.27886807
                                + t * (-1.13520398
                                    + t * (1.48851587 + t * (-0.82215223 + t * 0.17087277)))))))))
            .exp();
    if x >= 0.0 {
        tau
    } else {
        2.0 - tau
    }
}

pub fn erf(x: f64) -> f64 {
    1.0 - erfc(x)
}

/// P(X <= x) for X ~ Binomial(n, p), using the normal approximation.
///
/// With n = 0 the standard deviation is zero: any positive x yields 1.0 and
/// x = 0 yields NaN, which fails every significance comparison.
pub fn normal_estimation(x: u32, p: f64, n: u32) -> f64 {
    let n = n as f64;
    let mean = n * p;
    let sd = (n * p * (1.0 - p)).sqrt();
    0.5 * (1.0 + erf((x as f64 - mean) / (sd * std::f64::consts::SQRT_2)))
}

/// True if `winner` successes out of `population` trials is unlikely under a fair coin.
///
/// For end calls `population` is head + tail. For edge orientation it is the
/// runner-up orientation count, which makes this a margin-of-victory test
/// rather than a proper binomial tail.
pub fn is_dominant(winner: u32, population: u32, max_error: f64) -> bool {
    1.0 - normal_estimation(winner, 0.5, population) < max_error
}

/// Decide whether a barcode's read pairs favour the head or tail of a scaffold
pub fn classify(head: u32, tail: u32, min_support: u32, max_error: f64) -> EndCall {
    let total = head.saturating_add(tail);
    if total < min_support {
        return EndCall::NOT_SIGNIFICANT;
    }
    let max = head.max(tail);
    if is_dominant(max, total, max_error) {
        EndCall {
            significant: true,
            favors_head: max == head,
        }
    } else {
        EndCall::NOT_SIGNIFICANT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erf_reference_values() {
        assert!(erf(0.0).abs() < 1e-7);
        assert!((erf(1.0) - 0.8427007929).abs() < 1e-6);
        assert!((erf(-1.0) + 0.8427007929).abs() < 1e-6);
        assert!((erf(2.0) - 0.9953222650).abs() < 1e-6);
        assert_eq!(erf(f64::INFINITY), 1.0);
        assert_eq!(erf(f64::NEG_INFINITY), -1.0);
    }

    #[test]
    fn test_normal_estimation_midpoint() {
        // x at the mean gives one half
        assert!((normal_estimation(5, 0.5, 10) - 0.5).abs() < 1e-7);
        // Positive count against an empty population saturates
        assert_eq!(normal_estimation(8, 0.5, 0), 1.0);
        assert!(normal_estimation(0, 0.5, 0).is_nan());
    }

    #[test]
    fn test_classify_insufficient_support() {
        assert_eq!(classify(4, 0, 5, 0.05), EndCall::NOT_SIGNIFICANT);
    }

    #[test]
    fn test_classify_head_and_tail() {
        let call = classify(5, 0, 5, 0.05);
        assert_eq!(call.end(), Some(EndLabel::Head));

        let call = classify(1, 9, 5, 0.05);
        assert_eq!(call.end(), Some(EndLabel::Tail));
    }

    #[test]
    fn test_classify_balanced_is_not_significant() {
        assert_eq!(classify(5, 5, 5, 0.05).end(), None);
        assert_eq!(classify(6, 4, 5, 0.05).end(), None);
    }

    #[test]
    fn test_is_dominant_margin() {
        // Winner with no competitor is always dominant
        assert!(is_dominant(1, 0, 0.05));
        // Small counts are not enough to separate winner from runner-up
        assert!(!is_dominant(2, 2, 0.05));
        assert!(is_dominant(10, 10, 0.05));
    }
}
