use crate::alert::BandsRegion;
use crate::geom::interval::Interval;
use crate::geom::{almost_equals, almost_geq, almost_leq};
use serde::Serialize;
use std::fmt;

/**
 * ## Colored partition of a parameter axis
 *
 * A band is a sorted list of `ColorValue` points: each point carries the
 * color of the segment on its left and on its right. The list is
 * consistent when adjacent points agree on the color of the segment
 * between them. Insertions may only strengthen a color: a more severe
 * region overwrites a less severe one, and `Unknown` (outside the
 * configured range) is never overwritten.
 */
#[derive(Debug, PartialEq, Serialize, Copy, Clone)]
pub struct ColorValue {
    pub lower: BandsRegion,
    pub val: f64,
    pub upper: BandsRegion,
}

impl ColorValue {
    pub fn new(lower: BandsRegion, val: f64, upper: BandsRegion) -> Self {
        ColorValue { lower, val, upper }
    }
}

impl fmt::Display for ColorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {:.4}, {}>", self.lower, self.val, self.upper)
    }
}

/// A contiguous range of the axis and its conflict region.
#[derive(Debug, PartialEq, Serialize, Clone)]
pub struct BandsRange {
    pub interval: Interval,
    pub region: BandsRegion,
}

impl BandsRange {
    pub fn new(interval: Interval, region: BandsRegion) -> Self {
        BandsRange { interval, region }
    }
}

impl fmt::Display for BandsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.interval, self.region)
    }
}

/// Flat initialization: one interior color over [min, max].
pub fn init(min: f64, max: f64, interior: BandsRegion) -> Vec<ColorValue> {
    vec![
        ColorValue::new(BandsRegion::Unknown, min, interior),
        ColorValue::new(interior, max, BandsRegion::Unknown),
    ]
}

/// Clamped initialization: the interior color over [min_val, max_val],
/// Unknown outside, within the enclosing [min, max].
pub fn init_clamped(
    min: f64,
    max: f64,
    min_val: f64,
    max_val: f64,
    interior: BandsRegion,
) -> Vec<ColorValue> {
    if almost_leq(min_val, min) && almost_geq(max_val, max) {
        return init(min, max, interior);
    }
    vec![
        ColorValue::new(BandsRegion::Unknown, min, BandsRegion::Unknown),
        ColorValue::new(BandsRegion::Unknown, min_val, interior),
        ColorValue::new(interior, max_val, BandsRegion::Unknown),
        ColorValue::new(BandsRegion::Unknown, max, BandsRegion::Unknown),
    ]
}

/// Modular initialization over [0, mod]: the interior color covers the arc
/// from min to max clockwise, wrapping through 0 when min > max. A
/// circular list identifies the first left color with the last right
/// color.
pub fn init_mod(modulo: f64, min: f64, max: f64, interior: BandsRegion) -> Vec<ColorValue> {
    if almost_equals(min, max) || almost_equals(libm::fabs(max - min), modulo) {
        // full circle
        return vec![
            ColorValue::new(interior, 0.0, interior),
            ColorValue::new(interior, modulo, interior),
        ];
    }
    if min < max {
        vec![
            ColorValue::new(BandsRegion::Unknown, 0.0, BandsRegion::Unknown),
            ColorValue::new(BandsRegion::Unknown, min, interior),
            ColorValue::new(interior, max, BandsRegion::Unknown),
            ColorValue::new(BandsRegion::Unknown, modulo, BandsRegion::Unknown),
        ]
    } else {
        vec![
            ColorValue::new(interior, 0.0, interior),
            ColorValue::new(interior, max, BandsRegion::Unknown),
            ColorValue::new(BandsRegion::Unknown, min, interior),
            ColorValue::new(interior, modulo, interior),
        ]
    }
}

/// Only a strictly more severe color overwrites; Unknown is protected.
fn strengthen(current: BandsRegion, color: BandsRegion) -> BandsRegion {
    if current == BandsRegion::Unknown {
        current
    } else if color.order() > current.order() {
        color
    } else {
        current
    }
}

/// Make sure a point exists at value `v`, splitting the segment it falls
/// into. Returns the index of the point.
fn ensure_point(list: &mut Vec<ColorValue>, v: f64) -> usize {
    for (i, p) in list.iter().enumerate() {
        if almost_equals(p.val, v) {
            return i;
        }
        if p.val > v {
            // the segment color between i-1 and i is p.lower
            let color = p.lower;
            list.insert(i, ColorValue::new(color, v, color));
            return i;
        }
    }
    // past the last point: should not happen with clamped bounds
    list.len() - 1
}

/// Insert the interior color over [lb, ub], strengthening only.
pub fn insert(list: &mut Vec<ColorValue>, lb: f64, ub: f64, color: BandsRegion) {
    if list.is_empty() || almost_geq(lb, ub) {
        return;
    }
    let first = list[0].val;
    let last = list[list.len() - 1].val;
    let lb = lb.max(first);
    let ub = ub.min(last);
    if almost_geq(lb, ub) {
        return;
    }
    let i_lb = ensure_point(list, lb);
    let i_ub = ensure_point(list, ub);
    list[i_lb].upper = strengthen(list[i_lb].upper, color);
    for p in &mut list[i_lb + 1..i_ub] {
        p.lower = strengthen(p.lower, color);
        p.upper = strengthen(p.upper, color);
    }
    list[i_ub].lower = strengthen(list[i_ub].lower, color);
}

/// Modular insertion over [0, mod]: the range wraps through 0 when
/// lb > ub.
pub fn insert_mod(list: &mut Vec<ColorValue>, lb: f64, ub: f64, modulo: f64, color: BandsRegion) {
    let lb = crate::units::to_2pi_mod(lb, modulo);
    let ub = crate::units::to_2pi_mod(ub, modulo);
    if almost_equals(lb, ub) {
        return;
    }
    if lb < ub {
        insert(list, lb, ub, color);
    } else {
        insert(list, lb, modulo, color);
        insert(list, 0.0, ub, color);
        // keep the circular identification of the outer colors
        let n = list.len();
        let wrap = strengthen(list[0].lower, strengthen(list[n - 1].upper, color));
        list[0].lower = wrap;
        let n = list.len();
        list[n - 1].upper = wrap;
    }
}

/// Walk a consistent list and merge equal adjacent colors into ranges.
/// Inside recovery bands the conflict-free color is relabeled RECOVERY.
pub fn make_ranges(list: &[ColorValue], recovery: bool) -> Vec<BandsRange> {
    let mut ranges = Vec::new();
    if list.len() < 2 {
        return ranges;
    }
    let relabel = |color: BandsRegion| {
        if recovery && color == BandsRegion::None {
            BandsRegion::Recovery
        } else {
            color
        }
    };
    let mut start = list[0].val;
    let mut color = list[0].upper;
    for p in &list[1..] {
        if p.upper != color || almost_equals(p.val, list[list.len() - 1].val) {
            ranges.push(BandsRange::new(
                Interval::new(start, p.val),
                relabel(color),
            ));
            start = p.val;
            color = p.upper;
        }
    }
    ranges
}

/// Index of the range containing `val`, -1 when outside. On a boundary,
/// a resolution-colored current range wins; otherwise the more severe
/// neighbor wins. `modulo > 0` wraps the neighbor lookup.
pub fn index_of(ranges: &[BandsRange], val: f64, modulo: f64) -> i32 {
    let n = ranges.len();
    if n == 0 {
        return -1;
    }
    let val = if modulo > 0.0 {
        crate::units::to_2pi_mod(val, modulo)
    } else {
        val
    };
    for (i, range) in ranges.iter().enumerate() {
        if !(almost_geq(val, range.interval.low) && almost_leq(val, range.interval.up)) {
            continue;
        }
        if range.region.is_resolution() {
            return i as i32;
        }
        if almost_equals(val, range.interval.low) {
            let prev = if i > 0 {
                Some(i - 1)
            } else if modulo > 0.0 {
                Some(n - 1)
            } else {
                None
            };
            if let Some(j) = prev {
                if ranges[j].region.is_valid() && ranges[j].region > range.region {
                    return j as i32;
                }
            }
        }
        if almost_equals(val, range.interval.up) {
            let next = if i + 1 < n {
                Some(i + 1)
            } else if modulo > 0.0 {
                Some(0)
            } else {
                None
            };
            if let Some(j) = next {
                if ranges[j].region.is_valid() && ranges[j].region > range.region {
                    return j as i32;
                }
            }
        }
        return i as i32;
    }
    -1
}

/// Consistency predicate: adjacent points share the color of the segment
/// between them.
pub fn is_consistent(list: &[ColorValue]) -> bool {
    list.windows(2).all(|w| w[0].upper == w[1].lower && w[0].val <= w[1].val)
}

#[cfg(test)]
mod tests {
    use super::*;
    use BandsRegion::*;

    #[test]
    fn test_flat_init_and_insert() {
        let mut list = init(0.0, 100.0, None);
        assert!(is_consistent(&list));
        insert(&mut list, 20.0, 40.0, Mid);
        assert!(is_consistent(&list));
        let ranges = make_ranges(&list, false);
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].region, None);
        assert_eq!(ranges[1].region, Mid);
        assert_eq!(ranges[1].interval, Interval::new(20.0, 40.0));
        assert_eq!(ranges[2].region, None);
    }

    #[test]
    fn test_strengthen_only() {
        let mut list = init(0.0, 100.0, None);
        insert(&mut list, 20.0, 60.0, Near);
        insert(&mut list, 40.0, 80.0, Far);
        assert!(is_consistent(&list));
        let ranges = make_ranges(&list, false);
        // Near survives over Far in the overlap
        assert_eq!(ranges[1].region, Near);
        assert_eq!(ranges[1].interval, Interval::new(20.0, 60.0));
        assert_eq!(ranges[2].region, Far);
        assert_eq!(ranges[2].interval, Interval::new(60.0, 80.0));
    }

    #[test]
    fn test_unknown_protected() {
        let mut list = init_clamped(0.0, 100.0, 10.0, 90.0, None);
        insert(&mut list, 0.0, 20.0, Near);
        assert!(is_consistent(&list));
        let ranges = make_ranges(&list, false);
        // the [0, 10] segment stays Unknown
        assert_eq!(ranges[0].region, Unknown);
        assert_eq!(ranges[1].region, Near);
        assert_eq!(ranges[1].interval, Interval::new(10.0, 20.0));
    }

    #[test]
    fn test_modular_insert_wrap() {
        let two_pi = 2.0 * std::f64::consts::PI;
        let mut list = init_mod(two_pi, 0.0, two_pi, None);
        // wedge across north: from 350° to 10°
        let lb = 350.0_f64.to_radians();
        let ub = 10.0_f64.to_radians();
        insert_mod(&mut list, lb, ub, two_pi, Near);
        assert!(is_consistent(&list));
        let ranges = make_ranges(&list, false);
        assert_eq!(ranges.first().unwrap().region, Near);
        assert_eq!(ranges.last().unwrap().region, Near);
        assert_eq!(index_of(&ranges, 0.0, two_pi), 0);
        assert_eq!(index_of(&ranges, 180.0_f64.to_radians(), two_pi), 1);
    }

    #[test]
    fn test_make_ranges_recovery_relabel() {
        let mut list = init(0.0, 100.0, None);
        insert(&mut list, 20.0, 40.0, Near);
        let ranges = make_ranges(&list, true);
        assert_eq!(ranges[0].region, Recovery);
        assert_eq!(ranges[1].region, Near);
        assert_eq!(ranges[2].region, Recovery);
    }

    #[test]
    fn test_index_of_boundary_tie_break() {
        let mut list = init(0.0, 100.0, None);
        insert(&mut list, 20.0, 40.0, Mid);
        insert(&mut list, 40.0, 60.0, Near);
        let ranges = make_ranges(&list, false);
        // [0,20] None, [20,40] Mid, [40,60] Near, [60,100] None
        // inside a conflict range
        assert_eq!(index_of(&ranges, 30.0, 0.0), 1);
        // on the Mid/Near boundary the more severe Near wins
        assert_eq!(index_of(&ranges, 40.0, 0.0), 2);
        // walking from the resolution side, the resolution range wins
        assert_eq!(index_of(&ranges, 20.0, 0.0), 0);
        // the Near range keeps its upper boundary against a less severe
        // neighbor
        assert_eq!(index_of(&ranges, 60.0, 0.0), 2);
        // outside
        assert_eq!(index_of(&ranges, 200.0, 0.0), -1);
    }
}
