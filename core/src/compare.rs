//! Line-by-line output comparison.
//!
//! Expected and found output are walked with two independent cursors.
//! When blank-line skipping is enabled, a blank line on either side is
//! skipped without touching the other cursor, so a blank expected line
//! and a blank found line need not be paired up.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOutcome {
    Equal,
    Diverged { expected: usize, found: usize },
}

/// How a divergence relates to the two line sequences. Drives which
/// discrepancy message and highlight the presenter picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivergenceKind {
    /// Found output contains a line beyond the end of the expected output.
    ExtraLine,
    /// Expected output contains a line the found output never produced.
    MissingLine,
    /// Both sides have a line at the divergence point and they differ.
    DifferentLine,
}

impl ComparisonOutcome {
    pub fn is_equal(&self) -> bool {
        matches!(self, Self::Equal)
    }
}

/// Returns `Equal`, or the pair of cursor positions at the first point of
/// divergence. The two indices may differ because of blank-line skipping.
pub fn compare_lines<E, F>(expected: &[E], found: &[F], ignore_blank: bool) -> ComparisonOutcome
where
    E: AsRef<str>,
    F: AsRef<str>,
{
    let mut i = 0;
    let mut j = 0;

    while i < expected.len() && j < found.len() {
        let line_expected = expected[i].as_ref();
        let line_found = found[j].as_ref();

        if ignore_blank && line_expected.is_empty() {
            i += 1;
            continue;
        }
        if ignore_blank && line_found.is_empty() {
            j += 1;
            continue;
        }

        if line_expected != line_found {
            return ComparisonOutcome::Diverged {
                expected: i,
                found: j,
            };
        }
        i += 1;
        j += 1;
    }

    // Leftover non-blank found lines: the program printed too much.
    while j < found.len() {
        if ignore_blank && found[j].as_ref().is_empty() {
            j += 1;
            continue;
        }
        return ComparisonOutcome::Diverged {
            expected: j,
            found: j,
        };
    }

    // Leftover non-blank expected lines: the program printed too little.
    while i < expected.len() {
        if ignore_blank && expected[i].as_ref().is_empty() {
            i += 1;
            continue;
        }
        return ComparisonOutcome::Diverged {
            expected: i,
            found: i,
        };
    }

    ComparisonOutcome::Equal
}

/// Classifies a divergence against the lengths of the two sequences.
pub fn classify_divergence(
    expected_index: usize,
    found_index: usize,
    expected_len: usize,
    found_len: usize,
) -> DivergenceKind {
    if expected_index >= expected_len {
        DivergenceKind::ExtraLine
    } else if found_index >= found_len {
        DivergenceKind::MissingLine
    } else {
        DivergenceKind::DifferentLine
    }
}
