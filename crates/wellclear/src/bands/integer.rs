use serde::Serialize;
use std::fmt;

/**
 * ## Integer bands
 *
 * The kinematic scanner works on integer step indices: step k in direction
 * dir stands for the candidate maneuver `own_value + dir·k·step`. Per half
 * axis the scan produces the maximal runs of conflict-free indices; the
 * left-hand runs are negated and glued to the right-hand runs to form a
 * single partition of the step range.
 */
#[derive(Debug, PartialEq, Eq, Serialize, Copy, Clone)]
pub struct Integerval {
    pub lb: i32,
    pub ub: i32,
}

impl Integerval {
    pub fn new(lb: i32, ub: i32) -> Self {
        Integerval { lb, ub }
    }
}

impl fmt::Display for Integerval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lb, self.ub)
    }
}

/// Maximal runs of indices in [0, max] for which `free` holds. The scan is
/// cut at `search_index` when non-negative: every index at or beyond the
/// cut counts as conflict.
pub fn half_bands(max: i32, search_index: i32, mut free: impl FnMut(i32) -> bool) -> Vec<Integerval> {
    let mut runs = Vec::new();
    let mut current: Option<Integerval> = None;
    for k in 0..=max {
        let ok = (search_index < 0 || k < search_index) && free(k);
        match (&mut current, ok) {
            (None, true) => current = Some(Integerval::new(k, k)),
            (Some(run), true) => run.ub = k,
            (Some(run), false) => {
                runs.push(*run);
                current = None;
            }
            (None, false) => {}
        }
    }
    if let Some(run) = current {
        runs.push(run);
    }
    runs
}

/// First index in [0, max] at which `broken` holds, or -1 when the
/// property holds over the whole half axis. Used to cut the scan at the
/// first repulsive-criterion break.
pub fn first_break(max: i32, mut broken: impl FnMut(i32) -> bool) -> i32 {
    for k in 0..=max {
        if broken(k) {
            return k;
        }
    }
    -1
}

/// Negate a list of intervals in place: [lb, ub] becomes [-ub, -lb] and
/// the order reverses, keeping the list sorted.
pub fn negate(runs: &mut Vec<Integerval>) {
    for run in runs.iter_mut() {
        *run = Integerval::new(-run.ub, -run.lb);
    }
    runs.reverse();
}

/// Glue the (already negated) left runs to the right runs into one sorted,
/// non-overlapping list. Runs touching at zero (or adjacent indices) merge.
pub fn append(mut left: Vec<Integerval>, right: Vec<Integerval>) -> Vec<Integerval> {
    for run in right {
        match left.last_mut() {
            Some(last) if run.lb <= last.ub + 1 => {
                last.ub = last.ub.max(run.ub);
            }
            _ => left.push(run),
        }
    }
    left
}

/// Complement of a sorted, non-overlapping run list within [lo, hi].
pub fn complement(runs: &[Integerval], lo: i32, hi: i32) -> Vec<Integerval> {
    let mut out = Vec::new();
    let mut cur = lo;
    for run in runs {
        if run.lb > cur {
            out.push(Integerval::new(cur, run.lb - 1));
        }
        cur = cur.max(run.ub + 1);
    }
    if cur <= hi {
        out.push(Integerval::new(cur, hi));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_bands_runs() {
        // free at 0..=2 and 5..=7 out of 0..=9
        let free = |k: i32| (0..=2).contains(&k) || (5..=7).contains(&k);
        let runs = half_bands(9, -1, free);
        assert_eq!(runs, vec![Integerval::new(0, 2), Integerval::new(5, 7)]);
    }

    #[test]
    fn test_half_bands_cut() {
        let free = |_: i32| true;
        let runs = half_bands(9, 4, free);
        assert_eq!(runs, vec![Integerval::new(0, 3)]);
        assert!(half_bands(9, 0, free).is_empty());
    }

    #[test]
    fn test_first_break() {
        assert_eq!(first_break(10, |k| k >= 4), 4);
        assert_eq!(first_break(10, |_| false), -1);
        assert_eq!(first_break(10, |_| true), 0);
    }

    #[test]
    fn test_negate_append_glue() {
        // left: free at 0..=3; right: free at 0..=2 and 6..=8
        let mut left = vec![Integerval::new(0, 3)];
        negate(&mut left);
        assert_eq!(left, vec![Integerval::new(-3, 0)]);
        let combined = append(left, vec![Integerval::new(0, 2), Integerval::new(6, 8)]);
        assert_eq!(
            combined,
            vec![Integerval::new(-3, 2), Integerval::new(6, 8)]
        );
    }

    #[test]
    fn test_complement() {
        let none = vec![Integerval::new(-3, 2), Integerval::new(6, 8)];
        let conflict = complement(&none, -10, 10);
        assert_eq!(
            conflict,
            vec![
                Integerval::new(-10, -4),
                Integerval::new(3, 5),
                Integerval::new(9, 10)
            ]
        );
        assert!(complement(&[Integerval::new(0, 5)], 0, 5).is_empty());
        assert_eq!(
            complement(&[], 0, 5),
            vec![Integerval::new(0, 5)]
        );
    }

    #[test]
    fn test_combined_non_overlapping_sorted() {
        let mut left = vec![Integerval::new(1, 4), Integerval::new(8, 9)];
        negate(&mut left);
        assert_eq!(
            left,
            vec![Integerval::new(-9, -8), Integerval::new(-4, -1)]
        );
        let combined = append(left, vec![Integerval::new(2, 5)]);
        assert_eq!(
            combined,
            vec![
                Integerval::new(-9, -8),
                Integerval::new(-4, -1),
                Integerval::new(2, 5)
            ]
        );
        // sorted and pairwise disjoint
        for w in combined.windows(2) {
            assert!(w[0].ub < w[1].lb);
        }
    }
}
