use crate::alert::BandsRegion;
use crate::bands::color::{self, BandsRange, ColorValue};
use crate::geom::almost_equals;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::trace;

/**
 * ## Temporal smoothing
 *
 * Raw alert levels and band colors chatter when the geometry sits close
 * to a threshold. Three interacting filters stabilize the outputs, all
 * keyed by the same hysteresis window and persistence period:
 *
 * - an M-of-N filter over the last N samples,
 * - a persistence rule suppressing decreases for a while,
 * - a reset on backward time or on an input gap larger than the window.
 */
#[derive(Debug, Clone, Serialize)]
pub struct MofN {
    pub m: usize,
    pub n: usize,
    queue: VecDeque<i32>,
}

impl MofN {
    pub fn new(m: usize, n: usize) -> Self {
        let mut filter = MofN {
            m,
            n,
            queue: VecDeque::new(),
        };
        filter.reset(0);
        filter
    }

    pub fn enabled(&self) -> bool {
        self.m > 0 && self.n > 0 && self.m <= self.n
    }

    /// Wipe the memory, seeding the whole window with `seed`.
    pub fn reset(&mut self, seed: i32) {
        self.queue.clear();
        for _ in 0..self.n {
            self.queue.push_back(seed);
        }
    }

    /// Highest value v such that at least M of the last N samples were
    /// ≥ v, or -1 when no value meets the bar.
    pub fn m_of_n(&self) -> i32 {
        let mut values: Vec<i32> = self.queue.iter().copied().collect();
        values.sort_unstable_by(|a, b| b.cmp(a));
        for (count, value) in values.iter().enumerate() {
            if count + 1 >= self.m {
                return *value;
            }
        }
        -1
    }

    /// Push a sample and return the filtered value.
    pub fn input(&mut self, value: i32) -> i32 {
        if !self.enabled() {
            return value;
        }
        self.queue.push_back(value);
        while self.queue.len() > self.n {
            self.queue.pop_front();
        }
        self.m_of_n()
    }
}

/// M-of-N plus persistence over scalar alert levels, keyed per intruder.
#[derive(Debug, Clone, Serialize)]
pub struct AlertingHysteresis {
    mofn: MofN,
    hysteresis_time: f64,
    persistence_time: f64,
    last_time: f64,
    last_value: i32,
    /// Time of the last output increase
    init_time: f64,
}

impl AlertingHysteresis {
    pub fn new(m: usize, n: usize, hysteresis_time: f64, persistence_time: f64) -> Self {
        AlertingHysteresis {
            mofn: MofN::new(m, n),
            hysteresis_time,
            persistence_time,
            last_time: f64::NAN,
            last_value: -1,
            init_time: f64::NAN,
        }
    }

    pub fn reset(&mut self) {
        self.mofn.reset(0);
        self.last_time = f64::NAN;
        self.last_value = -1;
        self.init_time = f64::NAN;
    }

    /// Filter a raw alert level at the given time. Re-querying at the
    /// same time returns the cached output.
    pub fn alerting_hysteresis(&mut self, value: i32, time: f64) -> i32 {
        if !self.last_time.is_nan() && time == self.last_time {
            return self.last_value;
        }
        if self.last_time.is_nan()
            || time < self.last_time
            || time - self.last_time > self.hysteresis_time
        {
            trace!(time, "alerting hysteresis reset");
            self.mofn.reset(0);
            self.init_time = f64::NAN;
            self.last_value = -1;
        }
        let filtered = self.mofn.input(value);
        let output = if self.last_value >= 0
            && filtered < self.last_value
            && !self.init_time.is_nan()
            && time - self.init_time < self.persistence_time
        {
            self.last_value
        } else {
            filtered
        };
        if output > self.last_value {
            self.init_time = time;
        }
        self.last_value = output;
        self.last_time = time;
        output
    }
}

/// One stabilized color boundary: an M-of-N queue per side, keyed by the
/// boundary value.
#[derive(Debug, Clone, Serialize)]
struct BandsMofN {
    val: f64,
    left: MofN,
    right: MofN,
}

fn region_from_order(order: i32) -> BandsRegion {
    match order {
        0 => BandsRegion::None,
        1 => BandsRegion::Far,
        2 => BandsRegion::Mid,
        3 => BandsRegion::Near,
        4 => BandsRegion::Recovery,
        _ => BandsRegion::Unknown,
    }
}

/// The band-level hysteresis: per-boundary color M-of-N, conflict-region
/// persistence around the current value, resolution persistence, and
/// preferred-direction persistence.
#[derive(Debug, Clone, Serialize)]
pub struct BandsHysteresis {
    m: usize,
    n: usize,
    hysteresis_time: f64,
    persistence_time: f64,
    /// Tolerance on resolution movement and preferred-direction flips
    delta: f64,
    last_time: f64,
    boundaries: Vec<BandsMofN>,
    conflict_region: BandsRegion,
    conflict_region_time: f64,
    resolution_low: f64,
    resolution_up: f64,
    resolution_time: f64,
    resolution_nfactor: i32,
    preferred_up: Option<bool>,
}

impl BandsHysteresis {
    pub fn new(m: usize, n: usize, hysteresis_time: f64, persistence_time: f64, delta: f64) -> Self {
        BandsHysteresis {
            m,
            n,
            hysteresis_time,
            persistence_time,
            delta,
            last_time: f64::NAN,
            boundaries: Vec::new(),
            conflict_region: BandsRegion::Unknown,
            conflict_region_time: f64::NAN,
            resolution_low: f64::NAN,
            resolution_up: f64::NAN,
            resolution_time: f64::NAN,
            resolution_nfactor: -1,
            preferred_up: None,
        }
    }

    pub fn reset(&mut self) {
        self.last_time = f64::NAN;
        self.boundaries.clear();
        self.conflict_region = BandsRegion::Unknown;
        self.conflict_region_time = f64::NAN;
        self.resolution_low = f64::NAN;
        self.resolution_up = f64::NAN;
        self.resolution_time = f64::NAN;
        self.resolution_nfactor = -1;
        self.preferred_up = None;
    }

    fn check_time(&mut self, time: f64) {
        if self.last_time.is_nan()
            || time < self.last_time
            || time - self.last_time > self.hysteresis_time
        {
            trace!(time, "bands hysteresis reset");
            self.reset();
        }
        self.last_time = time;
    }

    /// Stabilize the color-value list. The boundary set must be stable for
    /// the M-of-N filters to engage; when the boundaries move, the queues
    /// reseed with the current colors.
    fn filter_colors(&mut self, colors: &[ColorValue]) -> Vec<ColorValue> {
        if self.m == 0 || self.n == 0 {
            return colors.to_vec();
        }
        let aligned = self.boundaries.len() == colors.len()
            && self
                .boundaries
                .iter()
                .zip(colors.iter())
                .all(|(b, c)| almost_equals(b.val, c.val));
        if !aligned {
            self.boundaries = colors
                .iter()
                .map(|c| {
                    let mut left = MofN::new(self.m, self.n);
                    left.reset(c.lower.order());
                    let mut right = MofN::new(self.m, self.n);
                    right.reset(c.upper.order());
                    BandsMofN {
                        val: c.val,
                        left,
                        right,
                    }
                })
                .collect();
            return colors.to_vec();
        }
        let mut filtered = Vec::with_capacity(colors.len());
        for (boundary, c) in self.boundaries.iter_mut().zip(colors.iter()) {
            let lower = region_from_order(boundary.left.input(c.lower.order()));
            let upper = region_from_order(boundary.right.input(c.upper.order()));
            filtered.push(ColorValue::new(lower, c.val, upper));
        }
        // the filters run per side; restore the adjacency invariant by
        // taking the more severe color of each shared segment
        for i in 1..filtered.len() {
            let shared = if filtered[i - 1].upper >= filtered[i].lower {
                filtered[i - 1].upper
            } else {
                filtered[i].lower
            };
            filtered[i - 1].upper = shared;
            filtered[i].lower = shared;
        }
        filtered
    }

    /// Conflict-region persistence: a less severe region at the current
    /// value is overridden by the recent one until the persistence period
    /// elapses.
    fn persist_conflict_region(
        &mut self,
        colors: &mut Vec<ColorValue>,
        ranges: &[BandsRange],
        own_val: f64,
        modulo: f64,
        time: f64,
    ) -> bool {
        let idx = color::index_of(ranges, own_val, modulo);
        let current = if idx >= 0 {
            ranges[idx as usize].region
        } else {
            BandsRegion::Unknown
        };
        let expired = self.conflict_region_time.is_nan()
            || time - self.conflict_region_time >= self.persistence_time;
        if !self.conflict_region.is_conflict()
            || current.order() >= self.conflict_region.order()
            || expired
        {
            if current.is_conflict() {
                if current != self.conflict_region {
                    self.conflict_region = current;
                    self.conflict_region_time = time;
                }
            } else if expired {
                self.conflict_region = current;
                self.conflict_region_time = time;
            }
            return false;
        }
        // re-insert the persisted region over the range containing the
        // current value
        if idx >= 0 {
            let interval = ranges[idx as usize].interval;
            if modulo > 0.0 {
                color::insert_mod(colors, interval.low, interval.up, modulo, self.conflict_region);
            } else {
                color::insert(colors, interval.low, interval.up, self.conflict_region);
            }
        }
        true
    }

    /// Resolution persistence: the previous resolution survives while it
    /// stays on the same side of the current value, the volume did not
    /// shrink further, and the fresh resolution moved less than delta.
    fn persist_resolutions(
        &mut self,
        low: f64,
        up: f64,
        own_val: f64,
        nfactor: i32,
        time: f64,
    ) -> (f64, f64) {
        let expired = self.resolution_time.is_nan()
            || time - self.resolution_time >= self.persistence_time;
        let keep_low = !expired
            && self.resolution_low.is_finite()
            && low.is_finite()
            && self.resolution_low <= own_val
            && nfactor <= self.resolution_nfactor
            && (low - self.resolution_low).abs() <= self.delta;
        let keep_up = !expired
            && self.resolution_up.is_finite()
            && up.is_finite()
            && self.resolution_up >= own_val
            && nfactor <= self.resolution_nfactor
            && (up - self.resolution_up).abs() <= self.delta;
        let out_low = if keep_low { self.resolution_low } else { low };
        let out_up = if keep_up { self.resolution_up } else { up };
        if !keep_low || !keep_up {
            self.resolution_time = time;
        }
        self.resolution_low = out_low;
        self.resolution_up = out_up;
        self.resolution_nfactor = nfactor;
        (out_low, out_up)
    }

    /// Preferred-direction persistence: the side only swaps when the other
    /// side's opportunity beats the current one by more than delta, or
    /// when the recovery volume had to shrink further.
    fn persist_preferred(
        &mut self,
        computed_up: bool,
        dist_up: f64,
        dist_down: f64,
        shrunk_further: bool,
    ) -> bool {
        let current = match self.preferred_up {
            None => {
                self.preferred_up = Some(computed_up);
                return computed_up;
            }
            Some(current) => current,
        };
        if computed_up == current {
            return current;
        }
        let (kept_dist, other_dist) = if current {
            (dist_up, dist_down)
        } else {
            (dist_down, dist_up)
        };
        if other_dist + self.delta < kept_dist || shrunk_further {
            self.preferred_up = Some(computed_up);
            computed_up
        } else {
            current
        }
    }

    /// Apply every layer to a fresh bands computation. Returns the
    /// stabilized ranges, resolutions and preferred direction.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &mut self,
        colors: &[ColorValue],
        recovery: bool,
        nfactor: i32,
        resolution_low: f64,
        resolution_up: f64,
        preferred_up: bool,
        own_val: f64,
        modulo: f64,
        time: f64,
    ) -> (Vec<BandsRange>, f64, f64, bool) {
        self.check_time(time);
        let mut colors = self.filter_colors(colors);
        let ranges = color::make_ranges(&colors, recovery);
        self.persist_conflict_region(&mut colors, &ranges, own_val, modulo, time);
        let ranges = color::make_ranges(&colors, recovery);
        let shrunk_further = self.resolution_nfactor >= 0 && nfactor > self.resolution_nfactor;
        let (low, up) = self.persist_resolutions(resolution_low, resolution_up, own_val, nfactor, time);
        let dist_up = if up.is_finite() {
            (up - own_val).abs()
        } else {
            f64::INFINITY
        };
        let dist_down = if low.is_finite() {
            (own_val - low).abs()
        } else {
            f64::INFINITY
        };
        let preferred = self.persist_preferred(preferred_up, dist_up, dist_down, shrunk_further);
        (ranges, low, up, preferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_m_of_n_correctness() {
        let mut filter = MofN::new(3, 5);
        // seeded with zeros: 0 always meets the bar
        assert_eq!(filter.m_of_n(), 0);
        filter.input(2);
        filter.input(2);
        assert_eq!(filter.m_of_n(), 0);
        filter.input(2);
        // three of the last five are >= 2
        assert_eq!(filter.m_of_n(), 2);
        filter.input(0);
        filter.input(0);
        // queue [2,2,2,0,0]: still three >= 2
        assert_eq!(filter.m_of_n(), 2);
        filter.input(0);
        // queue [2,2,0,0,0]
        assert_eq!(filter.m_of_n(), 0);
    }

    #[test]
    fn test_m_of_n_disabled_passthrough() {
        let mut filter = MofN::new(0, 0);
        assert_eq!(filter.input(3), 3);
        assert_eq!(filter.input(0), 0);
    }

    #[test]
    fn test_alerting_hysteresis_smoothing() {
        // the S5 timeline: M=3, N=5, hysteresis 5 s, persistence 4 s
        let mut hysteresis = AlertingHysteresis::new(3, 5, 5.0, 4.0);
        let inputs = [0, 0, 2, 0, 2, 0, 2];
        let mut outputs = Vec::new();
        for (t, v) in inputs.iter().enumerate() {
            outputs.push(hysteresis.alerting_hysteresis(*v, t as f64));
        }
        assert_eq!(outputs, vec![0, 0, 0, 0, 0, 0, 2]);
        // raw drops to 0: persistence holds the alert through t = 9
        assert_eq!(hysteresis.alerting_hysteresis(0, 7.0), 2);
        assert_eq!(hysteresis.alerting_hysteresis(0, 8.0), 2);
        assert_eq!(hysteresis.alerting_hysteresis(0, 9.0), 2);
        assert_eq!(hysteresis.alerting_hysteresis(0, 10.0), 0);
    }

    #[test]
    fn test_hysteresis_idempotent_at_same_time() {
        let mut hysteresis = AlertingHysteresis::new(3, 5, 5.0, 4.0);
        let first = hysteresis.alerting_hysteresis(2, 1.0);
        assert_eq!(hysteresis.alerting_hysteresis(0, 1.0), first);
        assert_eq!(hysteresis.alerting_hysteresis(2, 1.0), first);
    }

    #[test]
    fn test_reset_on_gap_and_backward_time() {
        let mut hysteresis = AlertingHysteresis::new(1, 1, 5.0, 0.0);
        assert_eq!(hysteresis.alerting_hysteresis(2, 0.0), 2);
        // gap larger than the hysteresis window wipes the memory
        assert_eq!(hysteresis.alerting_hysteresis(2, 10.0), 2);
        assert_eq!(hysteresis.alerting_hysteresis(0, 11.0), 0);
        // backward time wipes too
        assert_eq!(hysteresis.alerting_hysteresis(1, 5.0), 1);
    }

    #[test]
    fn test_bands_color_filter_needs_stable_boundaries() {
        use BandsRegion::*;
        let mut hysteresis = BandsHysteresis::new(2, 3, 10.0, 0.0, 0.1);
        let mut colors = color::init(0.0, 100.0, None);
        color::insert(&mut colors, 40.0, 60.0, Near);
        // first tick seeds the queues: output equals input
        let (ranges, _, _, _) =
            hysteresis.apply(&colors, false, -1, f64::NAN, f64::NAN, true, 10.0, 0.0, 0.0);
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[1].region, Near);
        // the conflict vanishes entirely: the boundary set changes (2
        // points instead of 4) and the filters reseed
        let clear = color::init(0.0, 100.0, None);
        let (ranges, _, _, _) =
            hysteresis.apply(&clear, false, -1, f64::NAN, f64::NAN, true, 10.0, 0.0, 1.0);
        assert!(ranges.iter().all(|r| r.region == None));
    }

    #[test]
    fn test_bands_mofn_suppresses_single_tick_flicker() {
        use BandsRegion::*;
        let mut hysteresis = BandsHysteresis::new(2, 3, 10.0, 0.0, 0.1);
        let mut near = color::init(0.0, 100.0, None);
        color::insert(&mut near, 40.0, 60.0, Near);
        let mut mid = color::init(0.0, 100.0, None);
        color::insert(&mut mid, 40.0, 60.0, Mid);
        hysteresis.apply(&near, false, -1, f64::NAN, f64::NAN, true, 10.0, 0.0, 0.0);
        hysteresis.apply(&near, false, -1, f64::NAN, f64::NAN, true, 10.0, 0.0, 1.0);
        // a single Mid tick on the same boundaries: 2-of-3 still Near
        let (ranges, _, _, _) =
            hysteresis.apply(&mid, false, -1, f64::NAN, f64::NAN, true, 10.0, 0.0, 2.0);
        assert_eq!(ranges[1].region, Near);
    }

    #[test]
    fn test_preferred_direction_persistence() {
        let mut hysteresis = BandsHysteresis::new(0, 0, 10.0, 5.0, 1.0);
        let colors = color::init(0.0, 100.0, BandsRegion::None);
        // first tick prefers up
        let (_, _, _, up) =
            hysteresis.apply(&colors, false, -1, 40.0, 60.0, true, 50.0, 0.0, 0.0);
        assert!(up);
        // the down side barely wins: within delta, no flip
        let (_, _, _, up) =
            hysteresis.apply(&colors, false, -1, 40.5, 60.0, false, 50.0, 0.0, 1.0);
        assert!(up);
        // the down side wins by more than delta: flip
        let (_, _, _, up) =
            hysteresis.apply(&colors, false, -1, 45.0, 60.0, false, 50.0, 0.0, 2.0);
        assert!(!up);
    }
}
