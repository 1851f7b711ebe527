//! Bounded-rank approximation of least-recently-used ordering.
//!
//! Every line of a set carries a rank in `0..=ways`. A rank of zero marks a
//! slot that was never filled. Among the valid lines of a set the ranks are
//! dense and distinct, ending at `ways` for the most recently used line, so a
//! full set always holds exactly one line with rank one.

use crate::cache::Line;

/// Marks the line at `idx` as the most recently used line of `set`.
///
/// Valid lines ranked strictly above the touched line move down by one.
pub fn touch(set: &mut [Line], idx: usize) {
    let old_rank = set[idx].rank;
    let max_rank = set.len();
    for (way, line) in set.iter_mut().enumerate() {
        if way != idx && line.valid && line.rank > old_rank {
            line.rank -= 1;
        }
    }
    set[idx].rank = max_rank;
}

/// Returns the least recently used line of a full set.
#[must_use]
pub fn victim(set: &[Line]) -> Option<usize> {
    set.iter().position(|line| line.valid && line.rank == 1)
}

/// Checks the ranking invariant of a single set.
///
/// With `k` valid lines in a set of `ways` lines, the valid ranks must be
/// exactly `ways - k + 1 ..= ways` and every invalid line must be unranked.
#[must_use]
pub fn is_ordered(set: &[Line]) -> bool {
    let ways = set.len();
    if set.iter().any(|line| !line.valid && line.rank != 0) {
        return false;
    }
    let valid = set.iter().filter(|line| line.valid).count();
    let lowest = ways + 1 - valid;
    // k distinct ranks inside a range of k values cover the whole range
    set.iter().enumerate().all(|(way, line)| {
        !line.valid
            || ((lowest..=ways).contains(&line.rank)
                && set[way + 1..]
                    .iter()
                    .all(|other| !other.valid || other.rank != line.rank))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions_sorted::assert_eq;

    fn empty_set(ways: usize) -> Vec<Line> {
        vec![Line::default(); ways]
    }

    fn fill(set: &mut [Line], idx: usize, tag: u64) {
        set[idx].valid = true;
        set[idx].tag = tag;
        touch(set, idx);
    }

    fn ranks(set: &[Line]) -> Vec<usize> {
        set.iter().map(Line::rank).collect()
    }

    #[test]
    fn filling_shifts_older_lines_down() {
        let mut set = empty_set(4);
        for way in 0..4 {
            fill(&mut set, way, way as u64);
            assert!(is_ordered(&set));
        }
        assert_eq!(ranks(&set), vec![1, 2, 3, 4]);
        assert_eq!(victim(&set), Some(0));
    }

    #[test]
    fn touching_partial_set_keeps_unfilled_slots_unranked() {
        let mut set = empty_set(4);
        fill(&mut set, 0, 10);
        fill(&mut set, 1, 11);
        assert_eq!(ranks(&set), vec![3, 4, 0, 0]);

        touch(&mut set, 0);
        assert_eq!(ranks(&set), vec![4, 3, 0, 0]);
        assert!(is_ordered(&set));
        assert_eq!(victim(&set), None);
    }

    #[test]
    fn touching_middle_line_only_shifts_more_recent_lines() {
        let mut set = empty_set(4);
        for way in 0..4 {
            fill(&mut set, way, way as u64);
        }
        touch(&mut set, 1);
        assert_eq!(ranks(&set), vec![1, 4, 2, 3]);
        assert_eq!(victim(&set), Some(0));

        touch(&mut set, 0);
        assert_eq!(ranks(&set), vec![4, 3, 1, 2]);
        assert_eq!(victim(&set), Some(2));
        assert!(is_ordered(&set));
    }

    #[test]
    fn touching_most_recent_line_is_stable() {
        let mut set = empty_set(3);
        for way in 0..3 {
            fill(&mut set, way, way as u64);
        }
        touch(&mut set, 2);
        touch(&mut set, 2);
        assert_eq!(ranks(&set), vec![1, 2, 3]);
    }

    #[test]
    fn single_way_set_always_has_rank_one() {
        let mut set = empty_set(1);
        fill(&mut set, 0, 7);
        assert_eq!(ranks(&set), vec![1]);
        touch(&mut set, 0);
        assert_eq!(victim(&set), Some(0));
    }

    #[test]
    fn detects_broken_rankings() {
        let mut set = empty_set(3);
        for way in 0..3 {
            fill(&mut set, way, way as u64);
        }
        set[1].rank = 3;
        assert!(!is_ordered(&set));

        let mut set = empty_set(2);
        set[1].rank = 2;
        assert!(!is_ordered(&set));
    }

    #[test]
    fn checks_partial_sets_against_their_top_ranks() {
        let mut set = empty_set(3);
        assert!(is_ordered(&set));

        fill(&mut set, 0, 10);
        fill(&mut set, 1, 11);
        assert_eq!(ranks(&set), vec![2, 3, 0]);
        assert!(is_ordered(&set));

        set[0].rank = 3;
        assert!(!is_ordered(&set), "duplicate rank");

        set[0].rank = 1;
        assert!(!is_ordered(&set), "rank below the valid range");
    }
}
