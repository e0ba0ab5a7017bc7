//! Page alignment: which page of the second document a page of the first
//! one is compared against.
//!
//! An `offset` models pages inserted in the second document. Before
//! `start_offset` pages line up one to one; from `start_offset` on, page `i`
//! of the first document is compared to page `i + offset` of the second.
//! The inserted pages `[start_offset, start_offset + offset)` of the second
//! document are never a diff target. They are copied into their own slots of
//! the output sequence by [`passthrough_window`] so the aligned range stays
//! contiguous.

use crate::error::PdfDiffError;
use std::ops::Range;

/// Aligned index of job `index`.
pub fn target_index(index: usize, offset: usize, start_offset: usize) -> usize {
    if index < start_offset {
        index
    } else {
        index + offset
    }
}

/// Pages of the second document copied verbatim instead of being diffed.
pub fn passthrough_window(offset: usize, start_offset: usize) -> Range<usize> {
    start_offset..start_offset + offset
}

/// Number of page jobs: one per page of the longer document.
pub fn job_count(pages_a: usize, pages_b: usize) -> usize {
    pages_a.max(pages_b)
}

/// Length of the aligned output sequence.
pub fn aligned_len(pages_a: usize, pages_b: usize, offset: usize) -> usize {
    (pages_a + offset).max(pages_b + offset)
}

/// Check `offset < pages_b` and `start_offset < pages_a`.
pub fn validate(
    pages_a: usize,
    pages_b: usize,
    offset: usize,
    start_offset: usize,
) -> Result<(), PdfDiffError> {
    if offset >= pages_b {
        return Err(PdfDiffError::OffsetOutOfRange {
            offset,
            max: pages_b.saturating_sub(1),
        });
    }
    if start_offset >= pages_a {
        return Err(PdfDiffError::StartOffsetOutOfRange {
            start_offset,
            max: pages_a.saturating_sub(1),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn no_offset_is_identity() {
        for i in 0..3 {
            assert_eq!(target_index(i, 0, 0), i);
        }
    }

    #[test]
    fn offset_applies_from_start_offset() {
        assert_eq!(target_index(0, 2, 3), 0);
        assert_eq!(target_index(2, 2, 3), 2);
        assert_eq!(target_index(3, 2, 3), 5);
        assert_eq!(target_index(4, 2, 3), 6);
    }

    #[test]
    fn mapping_is_injective_and_increasing_after_start() {
        let (pages_a, pages_b, offset, start) = (9, 6, 2, 4);
        let n = job_count(pages_a, pages_b);
        let targets: Vec<usize> = (0..n).map(|i| target_index(i, offset, start)).collect();

        let unique: HashSet<_> = targets.iter().collect();
        assert_eq!(unique.len(), n);

        for pair in targets[start..].windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn targets_and_window_cover_aligned_range_exactly_once() {
        let (pages_a, pages_b, offset, start) = (5, 7, 3, 2);
        let mut covered: Vec<usize> = (0..job_count(pages_a, pages_b))
            .map(|i| target_index(i, offset, start))
            .chain(passthrough_window(offset, start))
            .collect();
        covered.sort_unstable();
        let expected: Vec<usize> = (0..aligned_len(pages_a, pages_b, offset)).collect();
        assert_eq!(covered, expected);
    }

    #[test]
    fn window_is_empty_without_offset() {
        assert!(passthrough_window(0, 4).is_empty());
        assert_eq!(passthrough_window(2, 0), 0..2);
    }

    #[test]
    fn aligned_len_adds_offset_to_longest() {
        assert_eq!(aligned_len(3, 3, 0), 3);
        assert_eq!(aligned_len(5, 3, 0), 5);
        assert_eq!(aligned_len(4, 6, 2), 8);
    }

    #[test]
    fn validate_rejects_out_of_range_offsets() {
        assert!(validate(3, 3, 0, 0).is_ok());
        assert!(validate(3, 3, 2, 2).is_ok());
        assert!(matches!(
            validate(3, 3, 3, 0),
            Err(PdfDiffError::OffsetOutOfRange { offset: 3, max: 2 })
        ));
        assert!(matches!(
            validate(3, 3, 0, 3),
            Err(PdfDiffError::StartOffsetOutOfRange {
                start_offset: 3,
                max: 2
            })
        ));
    }
}
