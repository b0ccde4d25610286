use crate::alert::BandsRegion;
use crate::bands::real::{self, Axis, AxisBands, BandsInput, RecoveryInformation};
use crate::geom::interval::Interval;
use crate::geom::vect::{Vect2, Vect3};
use crate::hysteresis::{AlertingHysteresis, BandsHysteresis};
use crate::params::DaaParameters;
use crate::traffic::TrafficState;
use crate::units;
use crate::urgency::{coordination_epsilons, UrgencyStrategy};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/**
 * ## The detect-and-avoid engine
 *
 * Owns the ownship, the traffic list, the parameters, the wind, the
 * hysteresis memory and a cache of derived outputs. Mutations invalidate
 * the cache eagerly; queries recompute it lazily and are idempotent
 * between mutations. A single instance is meant to be driven from one
 * thread; callers wanting parallelism shard by ownship.
 */
#[derive(Debug, Serialize, Clone)]
pub struct ConflictRegionCache {
    pub region: BandsRegion,
    /// Identifiers of the intruders in conflict at this region
    pub aircraft: Vec<String>,
    /// Hull of the conflict time intervals, relative to now
    pub time_interval: Interval,
}

#[derive(Debug, Serialize, Clone)]
pub struct Daa {
    params: DaaParameters,
    ownship: Option<TrafficState>,
    traffic: Vec<TrafficState>,
    wind: Vect2,
    current_time: f64,
    pub urgency: UrgencyStrategy,

    #[serde(skip)]
    fresh: bool,
    #[serde(skip)]
    mua: Option<usize>,
    #[serde(skip)]
    eps_h: i32,
    #[serde(skip)]
    eps_v: i32,
    #[serde(skip)]
    alert_levels: Vec<i32>,
    #[serde(skip)]
    region_cache: Vec<ConflictRegionCache>,
    #[serde(skip)]
    bands_cache: HashMap<&'static str, AxisBands>,
    #[serde(skip)]
    alerting_hysteresis: HashMap<String, AlertingHysteresis>,
    #[serde(skip)]
    bands_hysteresis: HashMap<&'static str, BandsHysteresis>,
}

fn axis_key(axis: Axis) -> &'static str {
    match axis {
        Axis::Dir => "dir",
        Axis::Hs => "hs",
        Axis::Vs => "vs",
        Axis::Alt => "alt",
    }
}

impl Default for Daa {
    fn default() -> Self {
        Daa::new(DaaParameters::default())
    }
}

impl Daa {
    pub fn new(mut params: DaaParameters) -> Self {
        params.sanitize();
        Daa {
            params,
            ownship: None,
            traffic: Vec::new(),
            wind: Vect2::ZERO,
            current_time: 0.0,
            urgency: UrgencyStrategy::default(),
            fresh: false,
            mua: None,
            eps_h: 0,
            eps_v: 0,
            alert_levels: Vec::new(),
            region_cache: Vec::new(),
            bands_cache: HashMap::new(),
            alerting_hysteresis: HashMap::new(),
            bands_hysteresis: HashMap::new(),
        }
    }

    pub fn parameters(&self) -> &DaaParameters {
        &self.params
    }

    /// Changing parameters invalidates the cache and wipes the hysteresis
    /// memory.
    pub fn set_parameters(&mut self, mut params: DaaParameters) {
        params.sanitize();
        self.params = params;
        self.stale(true);
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn ownship(&self) -> Option<&TrafficState> {
        self.ownship.as_ref()
    }

    pub fn traffic(&self) -> &[TrafficState] {
        &self.traffic
    }

    /// Invalidate derived outputs; `hysteresis` additionally clears the
    /// temporal memory.
    fn stale(&mut self, hysteresis: bool) {
        self.fresh = false;
        self.bands_cache.clear();
        self.region_cache.clear();
        self.alert_levels.clear();
        if hysteresis {
            self.alerting_hysteresis.clear();
            self.bands_hysteresis.clear();
        }
    }

    /// Set the ownship state and advance the engine time. Intruder states
    /// linearly propagate to the new time.
    pub fn set_ownship_state(&mut self, id: &str, pos: Vect3, vel: Vect3, time: f64) {
        let mut own = TrafficState::new(id, pos, vel, time);
        own.apply_wind(self.wind);
        self.ownship = Some(own);
        self.current_time = time;
        for ac in &mut self.traffic {
            *ac = ac.linear_to(time);
        }
        self.stale(false);
    }

    /// Add or replace an intruder by identifier. Returns the 0-based
    /// index of the aircraft in the traffic list, or -1 when the state is
    /// unusable.
    pub fn set_traffic_state(&mut self, id: &str, pos: Vect3, vel: Vect3, time: f64) -> i32 {
        let mut ac = TrafficState::new(id, pos, vel, time);
        if !ac.is_valid() {
            return -1;
        }
        ac.apply_wind(self.wind);
        let ac = ac.linear_to(self.current_time);
        self.stale(false);
        if let Some(k) = self.traffic.iter().position(|t| t.id == id) {
            self.traffic[k] = ac;
            k as i32
        } else {
            self.traffic.push(ac);
            (self.traffic.len() - 1) as i32
        }
    }

    /// Attach sensor uncertainty deviations to an aircraft ("ownship" or
    /// an intruder identifier).
    pub fn set_sum_data(&mut self, id: &str, sum: crate::detect::wcv_sum::SumData) {
        if let Some(own) = &mut self.ownship {
            if own.id == id {
                own.sum = sum;
                self.stale(false);
                return;
            }
        }
        if let Some(ac) = self.traffic.iter_mut().find(|t| t.id == id) {
            ac.sum = sum;
            self.stale(false);
        }
    }

    /// Select the alerter (1-based) an aircraft is evaluated against.
    pub fn set_alerter(&mut self, id: &str, alerter: usize) {
        if let Some(own) = &mut self.ownship {
            if own.id == id {
                own.alerter = alerter;
                self.stale(false);
                return;
            }
        }
        if let Some(ac) = self.traffic.iter_mut().find(|t| t.id == id) {
            ac.alerter = alerter;
            self.stale(false);
        }
    }

    /// Set the wind and re-derive every aircraft's air velocity.
    pub fn set_wind_velocity(&mut self, wind: Vect2) {
        self.wind = wind;
        if let Some(own) = &mut self.ownship {
            own.apply_wind(wind);
        }
        for ac in &mut self.traffic {
            ac.apply_wind(wind);
        }
        self.stale(false);
    }

    /// Swap an intruder with the ownship, re-linking the remaining
    /// traffic against the new ownship frame.
    pub fn reset_ownship(&mut self, index: usize) -> bool {
        if index >= self.traffic.len() || self.ownship.is_none() {
            return false;
        }
        let own = self.ownship.take().unwrap();
        let new_own = std::mem::replace(&mut self.traffic[index], own);
        self.ownship = Some(new_own);
        self.stale(true);
        true
    }

    /// Number of intruders currently tracked.
    pub fn traffic_size(&self) -> usize {
        self.traffic.len()
    }

    pub fn traffic_index(&self, id: &str) -> i32 {
        self.traffic
            .iter()
            .position(|t| t.id == id)
            .map_or(-1, |k| k as i32)
    }

    /// Lazily recompute every derived output for the current input
    /// snapshot.
    fn refresh(&mut self) {
        if self.fresh || self.ownship.is_none() {
            return;
        }
        debug!(time = self.current_time, "refreshing cache");
        self.compute_urgency();
        self.compute_alerts();
        self.compute_region_cache();
        for axis in [Axis::Dir, Axis::Hs, Axis::Vs, Axis::Alt] {
            self.compute_bands(axis);
        }
        self.fresh = true;
    }

    fn compute_urgency(&mut self) {
        let own = self.ownship.as_ref().unwrap();
        let corrective = real::recovery_seed(&self.params, own);
        self.mua = self.urgency.most_urgent(
            own,
            &self.traffic,
            corrective.d,
            corrective.h,
            self.params.lookahead_time,
        );
        (self.eps_h, self.eps_v) = match self.mua {
            Some(k) if self.params.conflict_crit || self.params.recovery_crit => {
                coordination_epsilons(own, &self.traffic[k])
            }
            _ => (0, 0),
        };
    }

    /// Raw alert level of one intruder: the highest level whose conflict
    /// probe (or maneuver-spread probe) fires.
    fn raw_alert_level(&self, intruder: &TrafficState) -> i32 {
        let own = self.ownship.as_ref().unwrap();
        if !intruder.is_valid() {
            return -1;
        }
        let alerter = self.params.alerter_for(intruder.alerter);
        for level_index in (1..=alerter.most_severe_alert_level()).rev() {
            let level = alerter.level(level_index).unwrap();
            let detector = level.detector.for_pair(own, intruder);
            let horizon = if level.alerting_time <= 0.0 {
                0.0
            } else {
                self.params.lookahead_time.min(level.alerting_time)
            };
            let fires = detector
                .conflict_detection(own.pos, own.gvel, intruder.pos, intruder.gvel, 0.0, horizon)
                .conflict()
                || self.spread_fires(level, &detector, intruder, horizon);
            if fires {
                return level_index as i32;
            }
        }
        0
    }

    /// The maneuver-spread test: the level also fires when every reachable
    /// state within the configured spread is in conflict.
    fn spread_fires(
        &self,
        level: &crate::alert::AlertThresholds,
        detector: &crate::detect::Detector,
        intruder: &TrafficState,
        horizon: f64,
    ) -> bool {
        let own = self.ownship.as_ref().unwrap();
        let spreads = [
            (Axis::Dir, level.spread_hdir),
            (Axis::Hs, level.spread_hs),
            (Axis::Vs, level.spread_vs),
            (Axis::Alt, level.spread_alt),
        ];
        for (axis, spread) in spreads {
            if spread <= 0.0 {
                continue;
            }
            let step = axis.step(&self.params);
            let steps = libm::ceil(spread / step) as i32;
            let own_val = axis.own_val(own);
            let mut all_conflict = true;
            'scan: for dir in [-1, 1] {
                for k in 0..=steps {
                    let target = own_val + f64::from(dir * k) * step;
                    let rollout = real::trajectory(axis, &self.params, own, target, dir);
                    if !real::any_conflict(&rollout, intruder, detector, horizon) {
                        all_conflict = false;
                        break 'scan;
                    }
                }
            }
            if all_conflict {
                return true;
            }
        }
        false
    }

    fn compute_alerts(&mut self) {
        let use_hysteresis = self.params.hysteresis_time > 0.0;
        let raw: Vec<(String, i32)> = self
            .traffic
            .iter()
            .map(|ac| (ac.id.clone(), self.raw_alert_level(ac)))
            .collect();
        self.alert_levels = raw
            .into_iter()
            .map(|(id, level)| {
                if !use_hysteresis || level < 0 {
                    return level;
                }
                let filter = self.alerting_hysteresis.entry(id).or_insert_with(|| {
                    AlertingHysteresis::new(
                        self.params.alerting_m,
                        self.params.alerting_n,
                        self.params.hysteresis_time,
                        self.params.persistence_time,
                    )
                });
                filter.alerting_hysteresis(level, self.current_time)
            })
            .collect();
    }

    fn compute_region_cache(&mut self) {
        let own = self.ownship.as_ref().unwrap();
        let mut cache = Vec::new();
        for region in [BandsRegion::Near, BandsRegion::Mid, BandsRegion::Far] {
            let mut aircraft = Vec::new();
            let mut time_interval = Interval::EMPTY;
            for intruder in self.traffic.iter().filter(|ac| ac.is_valid()) {
                let alerter = self.params.alerter_for(intruder.alerter);
                let level_index = alerter.alert_level_for_region(region);
                if level_index <= 0 {
                    continue;
                }
                let level = alerter.level(level_index as usize).unwrap();
                let detector = level.detector.for_pair(own, intruder);
                let horizon = self.params.lookahead_time.min(level.early_alerting_time);
                let cd = detector.conflict_detection(
                    own.pos,
                    own.gvel,
                    intruder.pos,
                    intruder.gvel,
                    0.0,
                    horizon,
                );
                if cd.conflict() {
                    aircraft.push(intruder.id.clone());
                    time_interval = time_interval.hull(cd.interval());
                }
            }
            cache.push(ConflictRegionCache {
                region,
                aircraft,
                time_interval,
            });
        }
        self.region_cache = cache;
    }

    fn compute_bands(&mut self, axis: Axis) {
        let own = self.ownship.as_ref().unwrap();
        let input = BandsInput {
            params: &self.params,
            ownship: own,
            traffic: &self.traffic,
            eps_h: self.eps_h,
            eps_v: self.eps_v,
            mua: self.mua,
        };
        let mut bands = real::compute(axis, &input);
        if self.params.hysteresis_time > 0.0 {
            let own_val = units::to_2pi_mod(axis.own_val(own), axis.modulo());
            let modulo = axis.modulo();
            let nfactor = bands.recovery.map_or(-1, |r| r.nfactor);
            let recovery = bands
                .recovery
                .map_or(false, |r| r.nfactor >= 0);
            let delta = axis.step(&self.params);
            let time = self.current_time;
            let filter = self
                .bands_hysteresis
                .entry(axis_key(axis))
                .or_insert_with(|| {
                    BandsHysteresis::new(
                        self.params.alerting_m,
                        self.params.alerting_n,
                        self.params.hysteresis_time,
                        self.params.persistence_time,
                        delta,
                    )
                });
            let (ranges, low, up, preferred) = filter.apply(
                &bands.colors,
                recovery,
                nfactor,
                bands.resolution_low,
                bands.resolution_up,
                bands.preferred_up,
                own_val,
                modulo,
                time,
            );
            bands.ranges = ranges;
            bands.resolution_low = low;
            bands.resolution_up = up;
            bands.preferred_up = preferred;
        }
        self.bands_cache.insert(axis_key(axis), bands);
    }

    /// Alert level of the intruder at `index` (0-based), 0 when no level
    /// fires, -1 for an invalid index.
    pub fn alert_level(&mut self, index: usize) -> i32 {
        self.refresh();
        self.alert_levels.get(index).copied().unwrap_or(-1)
    }

    /// Identifiers of the aircraft in conflict at the given region.
    pub fn conflict_aircraft(&mut self, region: BandsRegion) -> Vec<String> {
        self.refresh();
        self.region_cache
            .iter()
            .find(|c| c.region == region)
            .map(|c| c.aircraft.clone())
            .unwrap_or_default()
    }

    /// Hull of the time-to-loss intervals of the region's conflicts.
    pub fn conflict_time_interval(&mut self, region: BandsRegion) -> Interval {
        self.refresh();
        self.region_cache
            .iter()
            .find(|c| c.region == region)
            .map(|c| c.time_interval)
            .unwrap_or(Interval::EMPTY)
    }

    /// The maneuver bands of one axis, hysteresis applied.
    pub fn bands(&mut self, axis: Axis) -> Option<&AxisBands> {
        self.refresh();
        self.bands_cache.get(axis_key(axis))
    }

    /// Recovery information of one axis; None when the primary bands are
    /// not saturated.
    pub fn recovery_information(&mut self, axis: Axis) -> Option<RecoveryInformation> {
        self.refresh();
        self.bands_cache
            .get(axis_key(axis))
            .and_then(|b| b.recovery)
    }

    /// Time until well-clear is regained along the recovery guidance. NaN
    /// when no recovery is needed, -∞ when recovery is unreachable.
    pub fn time_to_recovery(&mut self, axis: Axis) -> f64 {
        match self.recovery_information(axis) {
            Some(info) => info.time_to_recovery,
            None => f64::NAN,
        }
    }

    /// Relative-bearing outline of the conflict zone against one
    /// intruder: the track angles (bounded by the contour threshold)
    /// whose straight trajectory runs into the corrective volume.
    pub fn horizontal_contour(&mut self, index: usize) -> Vec<Interval> {
        self.refresh();
        let own = match &self.ownship {
            Some(own) => own.clone(),
            None => return Vec::new(),
        };
        let intruder = match self.traffic.get(index) {
            Some(ac) if ac.is_valid() => ac.clone(),
            _ => return Vec::new(),
        };
        let alerter = self.params.alerter_for(intruder.alerter);
        let level_index = alerter.alert_level_for_region(BandsRegion::Mid);
        let detector = match alerter.detector_for_level(level_index.max(1) as usize) {
            Some(detector) => detector.for_pair(&own, &intruder),
            None => return Vec::new(),
        };
        let step = self.params.step_hdir;
        let threshold = self.params.horizontal_contour_threshold;
        let steps = libm::floor(threshold / step) as i32;
        let track = own.track();
        let gs = own.gs();
        let vz = own.vs();
        let mut contours = Vec::new();
        let mut current: Option<Interval> = None;
        for k in -steps..=steps {
            let trk = track + f64::from(k) * step;
            let vel = Vect2::from_track_gs(trk, gs).with_z(vz);
            let conflict = detector
                .conflict_detection(
                    own.pos,
                    vel,
                    intruder.pos,
                    intruder.gvel,
                    0.0,
                    self.params.lookahead_time,
                )
                .conflict();
            match (&mut current, conflict) {
                (None, true) => current = Some(Interval::new(trk, trk)),
                (Some(interval), true) => interval.up = trk,
                (Some(interval), false) => {
                    contours.push(*interval);
                    current = None;
                }
                (None, false) => {}
            }
        }
        if let Some(interval) = current {
            contours.push(interval);
        }
        contours
    }

    /// A serializable snapshot of the whole tick: alert levels and bands.
    pub fn snapshot(&mut self) -> TickSnapshot {
        self.refresh();
        TickSnapshot {
            time: self.current_time,
            alerts: self
                .traffic
                .iter()
                .zip(self.alert_levels.iter())
                .map(|(ac, level)| AlertOutput {
                    id: ac.id.clone(),
                    alert_level: *level,
                })
                .collect(),
            bands: self.bands_cache.values().cloned().collect(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct AlertOutput {
    pub id: String,
    pub alert_level: i32,
}

impl std::fmt::Display for AlertOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: alert {}", self.id, self.alert_level)
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct TickSnapshot {
    pub time: f64,
    pub alerts: Vec<AlertOutput>,
    pub bands: Vec<AxisBands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::presets;
    use crate::bands::color;
    use approx::assert_relative_eq;

    const FL300: f64 = 30_000.0 * 0.3048;

    fn head_on_daa(distance_nmi: f64) -> Daa {
        let mut daa = Daa::default();
        daa.set_ownship_state(
            "own",
            Vect3::new(0.0, 0.0, FL300),
            Vect2::from_track_gs(90.0 * units::DEG, units::from(500.0, "kn")).with_z(0.0),
            0.0,
        );
        daa.set_traffic_state(
            "intr",
            Vect3::new(units::from(distance_nmi, "nmi"), 0.0, FL300),
            Vect2::from_track_gs(270.0 * units::DEG, units::from(500.0, "kn")).with_z(0.0),
            0.0,
        );
        daa
    }

    #[test]
    fn test_head_on_warning_alert() {
        let _ = tracing_subscriber::fmt::try_init();
        // 10 nmi head-on at 500 kn each, DO-365 Phase I
        let mut daa = head_on_daa(10.0);
        assert_eq!(daa.alert_level(0), 3);
        let near = daa.conflict_aircraft(BandsRegion::Near);
        assert_eq!(near, vec!["intr".to_string()]);
        let interval = daa.conflict_time_interval(BandsRegion::Near);
        assert!(!interval.is_empty());
        // the well-clear entry is imminent (the tau threshold is crossed
        // about one second from now, 36 s before closest approach)
        assert!(interval.low < 25.0);
        // the direction bands flag the current track
        let bands = daa.bands(Axis::Dir).unwrap().clone();
        let two_pi = 2.0 * std::f64::consts::PI;
        let idx = color::index_of(&bands.ranges, 90.0 * units::DEG, two_pi);
        assert!(idx >= 0);
        assert!(bands.ranges[idx as usize].region.is_conflict());
    }

    #[test]
    fn test_head_on_wedge_with_more_room() {
        // a 15 nmi head-on leaves clear headings on both sides
        let mut daa = head_on_daa(15.0);
        assert_eq!(daa.alert_level(0), 3);
        let bands = daa.bands(Axis::Dir).unwrap().clone();
        let two_pi = 2.0 * std::f64::consts::PI;
        let at_track = color::index_of(&bands.ranges, 90.0 * units::DEG, two_pi);
        assert!(bands.ranges[at_track as usize].region.is_conflict());
        let north = color::index_of(&bands.ranges, 0.0, two_pi);
        assert!(!bands.ranges[north as usize].region.is_conflict());
        assert!(bands.resolution_low.is_finite());
        assert!(bands.resolution_up.is_finite());
    }

    #[test]
    fn test_level_crossing_below_prefers_climb() {
        // S2: intruder 300 ft below, still within the corrective volume
        let mut daa = Daa::default();
        daa.set_ownship_state(
            "own",
            Vect3::new(0.0, 0.0, FL300),
            Vect2::from_track_gs(90.0 * units::DEG, units::from(500.0, "kn")).with_z(0.0),
            0.0,
        );
        daa.set_traffic_state(
            "intr",
            Vect3::new(units::from(10.0, "nmi"), 0.0, FL300 - units::from(300.0, "ft")),
            Vect2::from_track_gs(270.0 * units::DEG, units::from(500.0, "kn")).with_z(0.0),
            0.0,
        );
        assert_eq!(daa.alert_level(0), 3);
        let bands = daa.bands(Axis::Vs).unwrap();
        assert!(bands.preferred_up);
        assert!(bands.resolution_up > 0.0);
    }

    #[test]
    fn test_diverging_all_clear() {
        // S3: intruder behind and below, opening
        let mut daa = Daa::default();
        daa.set_ownship_state(
            "own",
            Vect3::new(0.0, 0.0, FL300),
            Vect2::from_track_gs(90.0 * units::DEG, units::from(450.0, "kn")).with_z(0.0),
            0.0,
        );
        daa.set_traffic_state(
            "intr",
            Vect3::new(-units::from(5.0, "nmi"), 0.0, FL300 - units::from(2000.0, "ft")),
            Vect2::from_track_gs(270.0 * units::DEG, units::from(400.0, "kn")).with_z(0.0),
            0.0,
        );
        assert_eq!(daa.alert_level(0), 0);
        assert!(daa.conflict_aircraft(BandsRegion::Near).is_empty());
        assert!(daa.conflict_aircraft(BandsRegion::Mid).is_empty());
        for axis in [Axis::Dir, Axis::Hs, Axis::Vs, Axis::Alt] {
            let bands = daa.bands(axis).unwrap();
            assert!(bands.ranges.iter().all(|r| !r.region.is_conflict()));
            assert!(daa.time_to_recovery(axis).is_nan());
        }
    }

    #[test]
    fn test_tcasii_resolution_advisory() {
        // S4: ownship at 10000 ft, closing fast, tau below the RA
        // threshold, miss distance below DMOD
        let mut params = DaaParameters::default();
        params.alerters = vec![presets::tcasii()];
        let mut daa = Daa::new(params);
        let alt = units::from(10_000.0, "ft");
        daa.set_ownship_state(
            "own",
            Vect3::new(0.0, 0.0, alt),
            Vect2::from_track_gs(90.0 * units::DEG, units::from(400.0, "kn")).with_z(0.0),
            0.0,
        );
        daa.set_traffic_state(
            "intr",
            Vect3::new(units::from(1.5, "nmi"), 0.0, alt),
            Vect2::from_track_gs(270.0 * units::DEG, units::from(400.0, "kn")).with_z(0.0),
            0.0,
        );
        // level 2 (RA) fires; level 1 (TA) necessarily fires too
        assert_eq!(daa.alert_level(0), 2);
        let near = daa.conflict_aircraft(BandsRegion::Near);
        assert_eq!(near.len(), 1);
    }

    #[test]
    fn test_queries_idempotent_between_mutations() {
        let mut daa = head_on_daa(10.0);
        let first = daa.alert_level(0);
        let bands_first = daa.bands(Axis::Dir).unwrap().ranges.clone();
        assert_eq!(daa.alert_level(0), first);
        assert_eq!(daa.bands(Axis::Dir).unwrap().ranges, bands_first);
        // unknown aircraft index
        assert_eq!(daa.alert_level(7), -1);
    }

    #[test]
    fn test_recovery_on_loss_of_separation() {
        // S6: already inside the corrective volume
        let mut daa = head_on_daa(0.4);
        let info = daa
            .recovery_information(Axis::Vs)
            .expect("recovery bands expected");
        assert!(info.nfactor >= 0);
        assert!(info.time_to_recovery > 0.0);
        assert!(info.time_to_recovery <= daa.parameters().lookahead_time);
        assert!(info.horizontal_distance <= 0.66 * units::NMI);
        assert!(info.vertical_distance.is_finite());
    }

    #[test]
    fn test_alerting_hysteresis_through_engine() {
        // S5 driven through the orchestrator: a conflict flickering at
        // 1 Hz, M=3/N=5 filtering and a 4 s persistence
        let mut params = DaaParameters::default();
        params.hysteresis_time = 5.0;
        params.persistence_time = 4.0;
        params.alerting_m = 3;
        params.alerting_n = 5;
        let mut daa = Daa::new(params);
        let own_vel =
            Vect2::from_track_gs(90.0 * units::DEG, units::from(500.0, "kn")).with_z(0.0);
        let intr_vel =
            Vect2::from_track_gs(270.0 * units::DEG, units::from(500.0, "kn")).with_z(0.0);
        let close = Vect3::new(units::from(10.0, "nmi"), 0.0, FL300);
        let far = Vect3::new(units::from(100.0, "nmi"), units::from(50.0, "nmi"), FL300);
        let raw = [0, 0, 3, 0, 3, 0, 3];
        let mut outputs = Vec::new();
        for (t, level) in raw.iter().enumerate() {
            let t = t as f64;
            daa.set_ownship_state("own", Vect3::new(0.0, 0.0, FL300), own_vel, t);
            let pos = if *level > 0 { close } else { far };
            daa.set_traffic_state("intr", pos, intr_vel, t);
            outputs.push(daa.alert_level(0));
        }
        assert_eq!(outputs, vec![0, 0, 0, 0, 0, 0, 3]);
        // the raw level drops, persistence holds the alert for 4 s
        for t in 7..10 {
            daa.set_ownship_state("own", Vect3::new(0.0, 0.0, FL300), own_vel, t as f64);
            daa.set_traffic_state("intr", far, intr_vel, t as f64);
            assert_eq!(daa.alert_level(0), 3, "persistence at t = {t}");
        }
        daa.set_ownship_state("own", Vect3::new(0.0, 0.0, FL300), own_vel, 10.0);
        daa.set_traffic_state("intr", far, intr_vel, 10.0);
        assert_eq!(daa.alert_level(0), 0);
    }

    #[test]
    fn test_dta_mode_saturates_descent() {
        // inside the departure/terminal area, altitude guidance below the
        // current altitude degrades to corrective and recovery is off
        let mut params = DaaParameters::default();
        params.dta_logic = true;
        params.dta_latitude = 0.0;
        params.dta_longitude = 0.0;
        params.dta_radius = units::from(10.0, "nmi");
        params.dta_height = units::from(3000.0, "ft");
        let mut daa = Daa::new(params);
        let alt = units::from(2000.0, "ft");
        daa.set_ownship_state(
            "own",
            Vect3::new(0.0, 0.0, alt),
            Vect2::from_track_gs(90.0 * units::DEG, units::from(150.0, "kn")).with_z(0.0),
            0.0,
        );
        let bands = daa.bands(Axis::Alt).unwrap().clone();
        let below = color::index_of(&bands.ranges, units::from(500.0, "ft"), 0.0);
        assert!(below >= 0);
        assert_eq!(bands.ranges[below as usize].region, BandsRegion::Mid);
        let above = color::index_of(&bands.ranges, units::from(10_000.0, "ft"), 0.0);
        assert!(above >= 0);
        assert_eq!(bands.ranges[above as usize].region, BandsRegion::None);
        assert!(daa.recovery_information(Axis::Alt).is_none());
    }

    #[test]
    fn test_wind_changes_air_frame_only() {
        let mut daa = head_on_daa(10.0);
        let ground_track = daa.ownship().unwrap().gvel.vect2().compass_angle();
        daa.set_wind_velocity(Vect2::new(0.0, 30.0));
        let own = daa.ownship().unwrap();
        assert_relative_eq!(own.gvel.vect2().compass_angle(), ground_track);
        assert_ne!(own.avel, own.gvel);
        // relative geometry in the ground frame is unchanged: same alert
        assert_eq!(daa.alert_level(0), 3);
    }

    #[test]
    fn test_reset_ownship_swaps_frames() {
        let mut daa = head_on_daa(10.0);
        assert!(daa.reset_ownship(0));
        assert_eq!(daa.ownship().unwrap().id, "intr");
        assert_eq!(daa.traffic()[0].id, "own");
        // symmetric geometry: the swapped pair still alerts at warning
        assert_eq!(daa.alert_level(0), 3);
        assert!(!daa.reset_ownship(5));
    }

    #[test]
    fn test_traffic_propagated_to_ownship_time() {
        let mut daa = Daa::default();
        daa.set_ownship_state(
            "own",
            Vect3::new(0.0, 0.0, FL300),
            Vect3::new(250.0, 0.0, 0.0),
            100.0,
        );
        // intruder state is 10 s old: it gets propagated forward
        let k = daa.set_traffic_state(
            "intr",
            Vect3::new(50_000.0, 0.0, FL300),
            Vect3::new(-250.0, 0.0, 0.0),
            90.0,
        );
        assert_eq!(k, 0);
        let ac = &daa.traffic()[0];
        assert_relative_eq!(ac.time, 100.0);
        assert_relative_eq!(ac.pos.x, 50_000.0 - 2500.0);
    }

    #[test]
    fn test_horizontal_contour_head_on() {
        let mut daa = head_on_daa(10.0);
        let contours = daa.horizontal_contour(0);
        assert!(!contours.is_empty());
        // the conflict outline straddles the current track
        let track = 90.0 * units::DEG;
        assert!(contours
            .iter()
            .any(|c| c.low <= track && track <= c.up));
        assert!(daa.horizontal_contour(9).is_empty());
    }

    #[test]
    fn test_alert_monotonicity() {
        // a firing level implies every less severe level fires too
        let mut daa = head_on_daa(10.0);
        assert_eq!(daa.alert_level(0), 3);
        let own = daa.ownship().unwrap().clone();
        let intruder = daa.traffic()[0].clone();
        let alerter = daa.parameters().alerter_for(intruder.alerter).clone();
        for level_index in 1..=alerter.most_severe_alert_level() {
            let level = alerter.level(level_index).unwrap();
            let horizon = daa
                .parameters()
                .lookahead_time
                .min(level.alerting_time.max(0.0));
            let cd = level.detector.conflict_detection(
                own.pos,
                own.gvel,
                intruder.pos,
                intruder.gvel,
                0.0,
                horizon,
            );
            assert!(cd.conflict(), "level {level_index} must fire");
        }
    }

    #[test]
    fn test_bands_form_contiguous_partition() {
        let mut daa = head_on_daa(15.0);
        for axis in [Axis::Dir, Axis::Hs, Axis::Vs, Axis::Alt] {
            let bands = daa.bands(axis).unwrap().clone();
            assert!(!bands.ranges.is_empty());
            for pair in bands.ranges.windows(2) {
                assert_relative_eq!(pair[0].interval.up, pair[1].interval.low);
            }
        }
    }

    #[test]
    fn test_recovery_unreachable_saturates() {
        // an intruder glued to the ownship leaves no escape within the
        // lookahead: recovery saturates
        let mut daa = Daa::default();
        daa.set_ownship_state(
            "own",
            Vect3::new(0.0, 0.0, FL300),
            Vect3::new(250.0, 0.0, 0.0),
            0.0,
        );
        daa.set_traffic_state(
            "shadow",
            Vect3::new(10.0, 0.0, FL300),
            Vect3::new(250.0, 0.0, 0.0),
            0.0,
        );
        let info = daa
            .recovery_information(Axis::Hs)
            .expect("saturated bands expected");
        assert_eq!(info.nfactor, -1);
        assert_eq!(info.time_to_recovery, f64::NEG_INFINITY);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut daa = head_on_daa(10.0);
        let snapshot = daa.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"alert_level\":3"));
        assert!(json.contains("\"bands\""));
    }

    #[test]
    fn test_invalid_traffic_rejected() {
        let mut daa = head_on_daa(10.0);
        let k = daa.set_traffic_state(
            "bad",
            Vect3::new(f64::NAN, 0.0, 0.0),
            Vect3::ZERO,
            0.0,
        );
        assert_eq!(k, -1);
        assert_eq!(daa.traffic_size(), 1);
    }
}
