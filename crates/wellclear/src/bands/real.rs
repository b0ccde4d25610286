use super::color::{self, BandsRange, ColorValue};
use super::integer::{self, Integerval};
use crate::alert::BandsRegion;
use crate::detect::{CdCylinder, Detector};
use crate::geom::vect::{Vect2, Vect3};
use crate::params::DaaParameters;
use crate::traffic::TrafficState;
use crate::units;
use crate::urgency::{horizontal_repulsive, vertical_repulsive};
use serde::Serialize;
use tracing::debug;

/**
 * ## Real-axis maneuver bands
 *
 * Each maneuver axis plugs its own value extraction, step size, value
 * range and trajectory rollout into the integer-bands scanner. The scan
 * walks candidate maneuvers outward from the current value in both
 * directions, probes every intruder's detectors along the rollout, and
 * paints the conflict regions into a colored partition of the axis.
 */

/// Sampling period of kinematic rollouts, seconds
const TIME_STEP: f64 = 1.0;

/// Deepest recovery-volume reduction attempted before giving up
const MAX_RECOVERY_FACTOR: i32 = 8;

#[derive(Debug, PartialEq, Eq, Serialize, Copy, Clone)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Dir,
    Hs,
    Vs,
    Alt,
}

impl Axis {
    pub fn own_val(&self, own: &TrafficState) -> f64 {
        match self {
            Axis::Dir => own.track(),
            Axis::Hs => own.gs(),
            Axis::Vs => own.vs(),
            Axis::Alt => own.alt(),
        }
    }

    pub fn step(&self, p: &DaaParameters) -> f64 {
        match self {
            Axis::Dir => p.step_hdir,
            Axis::Hs => p.step_hs,
            Axis::Vs => p.step_vs,
            Axis::Alt => p.step_alt,
        }
    }

    /// 2π for the direction axis, 0 for the linear axes
    pub fn modulo(&self) -> f64 {
        match self {
            Axis::Dir => 2.0 * std::f64::consts::PI,
            _ => 0.0,
        }
    }

    pub fn min_max(&self, p: &DaaParameters) -> (f64, f64) {
        match self {
            Axis::Dir => (0.0, 2.0 * std::f64::consts::PI),
            Axis::Hs => (p.min_hs, p.max_hs),
            Axis::Vs => (p.min_vs, p.max_vs),
            Axis::Alt => (p.min_alt, p.max_alt),
        }
    }

    pub fn recovery_enabled(&self, p: &DaaParameters) -> bool {
        match self {
            Axis::Dir => p.recovery_hdir,
            Axis::Hs => p.recovery_hs,
            Axis::Vs => p.recovery_vs,
            Axis::Alt => p.recovery_alt,
        }
    }
}

/// Recovery bands metadata: how far the recovery volume had to shrink and
/// how long until well-clear is regained.
#[derive(Debug, PartialEq, Serialize, Copy, Clone)]
pub struct RecoveryInformation {
    /// -∞ when recovery is unreachable
    pub time_to_recovery: f64,
    /// Number of volume reductions, -1 when recovery is unreachable
    pub nfactor: i32,
    pub horizontal_distance: f64,
    pub vertical_distance: f64,
}

impl RecoveryInformation {
    fn unreachable() -> Self {
        RecoveryInformation {
            time_to_recovery: f64::NEG_INFINITY,
            nfactor: -1,
            horizontal_distance: f64::INFINITY,
            vertical_distance: f64::INFINITY,
        }
    }
}

/// The bands of one maneuver axis: the colored partition, resolutions,
/// and recovery information when recovery bands were computed.
#[derive(Debug, Serialize, Clone)]
pub struct AxisBands {
    pub axis: Axis,
    pub ranges: Vec<BandsRange>,
    pub recovery: Option<RecoveryInformation>,
    /// Nearest conflict-free value below/above the current one; NaN when
    /// the current value is already conflict free, ±∞ when saturated
    pub resolution_low: f64,
    pub resolution_up: f64,
    pub preferred_up: bool,
    #[serde(skip)]
    pub colors: Vec<ColorValue>,
}

/// Everything the scanner needs for one computation tick.
pub struct BandsInput<'a> {
    pub params: &'a DaaParameters,
    pub ownship: &'a TrafficState,
    pub traffic: &'a [TrafficState],
    pub eps_h: i32,
    pub eps_v: i32,
    /// Index of the most urgent aircraft in `traffic`
    pub mua: Option<usize>,
}

/// One candidate trajectory: sampled states while maneuvering, then a
/// straight line from (pos, vel) at t_end.
pub struct Rollout {
    pub samples: Vec<(f64, Vect3, Vect3)>,
    pub t_end: f64,
    pub pos: Vect3,
    pub vel: Vect3,
}

impl Rollout {
    fn instantaneous(pos: Vect3, vel: Vect3) -> Self {
        Rollout {
            samples: Vec::new(),
            t_end: 0.0,
            pos,
            vel,
        }
    }
}

/// Roll the ownship out toward the target value of the axis. Maneuvers
/// happen in the air frame; the wind is added back for the ground-frame
/// states the detectors consume.
pub fn trajectory(
    axis: Axis,
    p: &DaaParameters,
    own: &TrafficState,
    target: f64,
    dir: i32,
) -> Rollout {
    let wind = (own.gvel - own.avel).vect2();
    let track = own.track();
    let gs = own.gs();
    let vz = own.vs();
    match axis {
        Axis::Dir => {
            let omega = p.effective_turn_rate(gs);
            if omega <= 0.0 {
                let vel = Vect2::from_track_gs(target, gs).with_z(vz) + wind.with_z(0.0);
                return Rollout::instantaneous(own.pos, vel);
            }
            let delta = if dir > 0 {
                units::to_2pi(target - track)
            } else {
                units::to_2pi(track - target)
            };
            let t_end = delta / omega;
            let omega_s = f64::from(dir.signum()) * omega;
            let state_at = |t: f64| {
                let h = track + omega_s * t;
                let pos = Vect3::new(
                    own.pos.x + gs / omega_s * (libm::cos(track) - libm::cos(h)) + wind.x * t,
                    own.pos.y + gs / omega_s * (libm::sin(h) - libm::sin(track)) + wind.y * t,
                    own.pos.z + vz * t,
                );
                let vel = Vect2::from_track_gs(h, gs).with_z(vz) + wind.with_z(0.0);
                (pos, vel)
            };
            rollout_from(state_at, t_end, p.lookahead_time)
        }
        Axis::Hs => {
            let target = target.max(0.0);
            let u = Vect2::from_track_gs(track, 1.0);
            if p.horizontal_accel <= 0.0 {
                let vel = (u * target).with_z(vz) + wind.with_z(0.0);
                return Rollout::instantaneous(own.pos, vel);
            }
            let accel = if target >= gs {
                p.horizontal_accel
            } else {
                -p.horizontal_accel
            };
            let t_end = (target - gs).abs() / p.horizontal_accel;
            let state_at = |t: f64| {
                let along = gs * t + 0.5 * accel * t * t;
                let pos = Vect3::new(
                    own.pos.x + u.x * along + wind.x * t,
                    own.pos.y + u.y * along + wind.y * t,
                    own.pos.z + vz * t,
                );
                let vel = (u * (gs + accel * t)).with_z(vz) + wind.with_z(0.0);
                (pos, vel)
            };
            rollout_from(state_at, t_end, p.lookahead_time)
        }
        Axis::Vs => {
            if p.vertical_accel <= 0.0 {
                let vel = own.avel.vect2().with_z(target) + wind.with_z(0.0);
                return Rollout::instantaneous(own.pos, vel);
            }
            let accel = if target >= vz {
                p.vertical_accel
            } else {
                -p.vertical_accel
            };
            let t_end = (target - vz).abs() / p.vertical_accel;
            let hvel = own.gvel.vect2();
            let state_at = |t: f64| {
                let pos = Vect3::new(
                    own.pos.x + hvel.x * t,
                    own.pos.y + hvel.y * t,
                    own.pos.z + vz * t + 0.5 * accel * t * t,
                );
                let vel = hvel.with_z(vz + accel * t);
                (pos, vel)
            };
            rollout_from(state_at, t_end, p.lookahead_time)
        }
        Axis::Alt => vs_level_off(p, own, target),
    }
}

/// Sample the maneuver at the rollout period. Sampling stops at the
/// lookahead: a maneuver still in progress past the horizon can never be
/// probed there.
fn rollout_from(
    state_at: impl Fn(f64) -> (Vect3, Vect3),
    t_end: f64,
    lookahead: f64,
) -> Rollout {
    let mut samples = Vec::new();
    let mut t = TIME_STEP;
    while t < t_end && t <= lookahead {
        let (pos, vel) = state_at(t);
        samples.push((t, pos, vel));
        t += TIME_STEP;
    }
    let (pos, vel) = state_at(t_end);
    Rollout {
        samples,
        t_end,
        pos,
        vel,
    }
}

/// The altitude maneuver: accelerate the vertical rate toward the target
/// climb/descent rate, hold it, decelerate to level off at the target
/// altitude. Degenerates to a triangular profile for short altitude
/// changes.
fn vs_level_off(p: &DaaParameters, own: &TrafficState, target_alt: f64) -> Rollout {
    let hvel = own.gvel.vect2();
    let dz = target_alt - own.pos.z;
    if p.vertical_accel <= 0.0 || p.vertical_rate <= 0.0 {
        // instantaneous altitude bands: level flight at the target
        let pos = Vect3::new(own.pos.x, own.pos.y, target_alt);
        return Rollout::instantaneous(pos, hvel.with_z(0.0));
    }
    let sign = if dz >= 0.0 { 1.0 } else { -1.0 };
    let a = p.vertical_accel;
    let vz0 = own.vs();
    let mut vzt = sign * p.vertical_rate;
    let mut t1 = (vzt - vz0).abs() / a;
    let dz1 = 0.5 * (vz0 + vzt) * t1;
    let mut t3 = vzt.abs() / a;
    let dz3 = 0.5 * vzt * t3;
    let mut t2 = (dz - dz1 - dz3) / vzt;
    if t2 < 0.0 {
        // not enough altitude to reach the full rate
        let vp2 = sign * a * dz + 0.5 * vz0 * vz0;
        vzt = sign * libm::sqrt(vp2.max(0.0)).min(p.vertical_rate);
        t1 = (vzt - vz0).abs() / a;
        t2 = 0.0;
        t3 = vzt.abs() / a;
    }
    let t_end = t1 + t2 + t3;
    let accel1 = if vzt >= vz0 { a } else { -a };
    let accel3 = -sign * a;
    let state_at = |t: f64| {
        let (z, vz) = if t <= t1 {
            (
                own.pos.z + vz0 * t + 0.5 * accel1 * t * t,
                vz0 + accel1 * t,
            )
        } else if t <= t1 + t2 {
            let z1 = own.pos.z + 0.5 * (vz0 + vzt) * t1;
            (z1 + vzt * (t - t1), vzt)
        } else if t < t_end {
            let z2 = own.pos.z + 0.5 * (vz0 + vzt) * t1 + vzt * t2;
            let u = t - t1 - t2;
            (z2 + vzt * u + 0.5 * accel3 * u * u, vzt + accel3 * u)
        } else {
            (target_alt, 0.0)
        };
        (
            Vect3::new(own.pos.x + hvel.x * t, own.pos.y + hvel.y * t, z),
            hvel.with_z(vz),
        )
    };
    rollout_from(state_at, t_end, p.lookahead_time)
}

/// Any conflict along the rollout against one intruder: sampled violation
/// checks while maneuvering, then a continuous probe over the remaining
/// horizon.
pub fn any_conflict(
    rollout: &Rollout,
    intruder: &TrafficState,
    detector: &Detector,
    horizon: f64,
) -> bool {
    for &(t, pos, vel) in &rollout.samples {
        if t > horizon {
            return false;
        }
        let si = intruder.pos.linear(intruder.gvel, t);
        if detector.violation(pos, vel, si, intruder.gvel) {
            return true;
        }
    }
    if rollout.t_end <= horizon {
        let si = intruder.pos.linear(intruder.gvel, rollout.t_end);
        detector
            .conflict_detection(
                rollout.pos,
                rollout.vel,
                si,
                intruder.gvel,
                0.0,
                horizon - rollout.t_end,
            )
            .conflict()
    } else {
        false
    }
}

/// The repulsive criterion: across three consecutive control samples of
/// the rollout, the velocity change must not move the coordination
/// criterion against the most urgent aircraft.
fn repulsive_ok(
    rollout: &Rollout,
    own: &TrafficState,
    mua: &TrafficState,
    eps_h: i32,
    eps_v: i32,
) -> bool {
    let mut controls: Vec<(f64, Vect3, Vect3)> = vec![(0.0, own.pos, own.gvel)];
    controls.extend(rollout.samples.iter().take(2).copied());
    controls.push((rollout.t_end, rollout.pos, rollout.vel));
    for pair in controls.windows(2) {
        let (t0, p0, w0) = pair[0];
        let (_, _, w1) = pair[1];
        let mi = mua.pos.linear(mua.gvel, t0);
        let s = p0 - mi;
        let v0 = w0 - mua.gvel;
        let v1 = w1 - mua.gvel;
        if !horizontal_repulsive(s.vect2(), v0.vect2(), v1.vect2(), eps_h) {
            return false;
        }
        if !vertical_repulsive(v0.z, v1.z, eps_v) {
            return false;
        }
    }
    true
}

/// Corrective volume of the ownship's alerter as a plain cylinder, the
/// seed of the recovery volume reduction and of the urgency ordering.
pub fn recovery_seed(params: &DaaParameters, ownship: &TrafficState) -> CdCylinder {
    let alerter = params.alerter_for(ownship.alerter);
    let level = alerter
        .levels()
        .iter()
        .find(|l| l.region == BandsRegion::Mid)
        .or_else(|| alerter.levels().iter().rev().find(|l| l.region.is_conflict()))
        .or_else(|| alerter.levels().last());
    match level.map(|l| &l.detector) {
        Some(Detector::Cylinder(c)) => c.clone(),
        Some(Detector::Taumod(w)) => CdCylinder::new(w.table.dthr, w.table.zthr),
        Some(Detector::Tcpa(w)) => CdCylinder::new(w.table.dthr, w.table.zthr),
        Some(Detector::Tep(w)) => CdCylinder::new(w.table.dthr, w.table.zthr),
        Some(Detector::Hz(w)) => CdCylinder::new(w.table.dthr, w.table.zthr),
        Some(Detector::TaumodSum(w)) => CdCylinder::new(
            w.taumod.table.dthr + w.sum.sigma_s,
            w.taumod.table.zthr + w.sum.sigma_sz,
        ),
        Some(Detector::Tcas3d(t)) => CdCylinder::new(
            t.dmod_at(ownship.alt()).max(units::NMI),
            450.0 * units::FT,
        ),
        None => CdCylinder::default(),
    }
}

struct PaintGeometry {
    own_val: f64,
    step: f64,
    modulo: f64,
    min_val: f64,
    max_val: f64,
    left_steps: i32,
    right_steps: i32,
}

/// Insert the conflict runs of one (intruder, detector) pair into the
/// colored partition: the complement of the conflict-free step runs,
/// mapped back to axis values.
#[allow(clippy::too_many_arguments)]
fn paint(
    g: &PaintGeometry,
    colors: &mut Vec<ColorValue>,
    left: &HalfAxis,
    right: &HalfAxis,
    intruder: &TrafficState,
    detector: &Detector,
    horizon: f64,
    region: BandsRegion,
) {
    let mut none_left = none_runs(left, intruder, detector, horizon);
    integer::negate(&mut none_left);
    let none = integer::append(none_left, none_runs(right, intruder, detector, horizon));
    for run in integer::complement(&none, -g.left_steps, g.right_steps) {
        let lo = g.own_val + f64::from(run.lb - 1) * g.step;
        let hi = g.own_val + f64::from(run.ub + 1) * g.step;
        if g.modulo > 0.0 {
            // a run covering the whole circle must not collapse under the
            // modular reduction of its endpoints
            if hi - lo >= g.modulo {
                color::insert(colors, 0.0, g.modulo, region);
            } else {
                color::insert_mod(colors, lo, hi, g.modulo, region);
            }
        } else {
            color::insert(colors, lo.max(g.min_val), hi.min(g.max_val), region);
        }
    }
}

struct HalfAxis {
    /// Conflict-free flags indexed by step, detector conflicts only
    rollouts: Vec<Rollout>,
    /// First step breaking the repulsive criterion, -1 when none does
    cut: i32,
}

/// Precompute the rollouts and the repulsive cut for one scan direction.
fn half_axis(axis: Axis, input: &BandsInput, steps: i32, dir: i32, crit: bool) -> HalfAxis {
    let p = input.params;
    let own = input.ownship;
    let own_val = axis.own_val(own);
    let step = axis.step(p);
    let rollouts: Vec<Rollout> = (0..=steps)
        .map(|k| trajectory(axis, p, own, own_val + f64::from(dir * k) * step, dir))
        .collect();
    let cut = if crit && (input.eps_h != 0 || input.eps_v != 0) {
        match input.mua.map(|i| &input.traffic[i]) {
            Some(mua) => integer::first_break(steps, |k| {
                !repulsive_ok(&rollouts[k as usize], own, mua, input.eps_h, input.eps_v)
            }),
            None => -1,
        }
    } else {
        -1
    };
    HalfAxis { rollouts, cut }
}

/// Conflict-free step runs of a half axis against one detector.
fn none_runs(
    half: &HalfAxis,
    intruder: &TrafficState,
    detector: &Detector,
    horizon: f64,
) -> Vec<Integerval> {
    integer::half_bands(half.rollouts.len() as i32 - 1, half.cut, |k| {
        !any_conflict(&half.rollouts[k as usize], intruder, detector, horizon)
    })
}

pub fn compute(axis: Axis, input: &BandsInput) -> AxisBands {
    let p = input.params;
    let own = input.ownship;
    let own_val = axis.own_val(own);
    let step = axis.step(p);
    let modulo = axis.modulo();
    let (min_val, max_val) = axis.min_max(p);

    let dta_active = p.dta_logic
        && matches!(axis, Axis::Vs | Axis::Alt)
        && (own.pos.vect2() - Vect2::new(p.dta_longitude, p.dta_latitude)).norm() <= p.dta_radius
        && own.alt() <= p.dta_height;

    // scan extents in steps
    let (left_steps, right_steps) = if modulo > 0.0 {
        let mut left = libm::floor(p.left_hdir / step + 1e-8) as i32;
        let mut right = libm::floor(p.right_hdir / step + 1e-8) as i32;
        let full = libm::floor(modulo / step + 1e-8) as i32;
        if left + right > full {
            left = left.min(full / 2);
            right = full - left;
        }
        (left, right)
    } else {
        (
            libm::floor(((own_val - min_val) / step).max(0.0) + 1e-8) as i32,
            libm::floor(((max_val - own_val) / step).max(0.0) + 1e-8) as i32,
        )
    };
    let left_steps = if dta_active { 0 } else { left_steps };

    let left = half_axis(axis, input, left_steps, -1, p.conflict_crit);
    let right = half_axis(axis, input, right_steps, 1, p.conflict_crit);

    // initialize the partition
    let full_circle = modulo > 0.0
        && f64::from(left_steps + right_steps) * step >= modulo - step / 2.0;
    let init_colors = || {
        if modulo > 0.0 {
            if full_circle {
                color::init_mod(modulo, 0.0, modulo, BandsRegion::None)
            } else {
                color::init_mod(
                    modulo,
                    units::to_2pi_mod(own_val - f64::from(left_steps) * step, modulo),
                    units::to_2pi_mod(own_val + f64::from(right_steps) * step, modulo),
                    BandsRegion::None,
                )
            }
        } else {
            color::init(min_val, max_val, BandsRegion::None)
        }
    };
    let mut colors = init_colors();

    if dta_active {
        // the departure/terminal mode saturates everything below the
        // current value as corrective
        color::insert(&mut colors, min_val, own_val, BandsRegion::Mid);
    }

    let geometry = PaintGeometry {
        own_val,
        step,
        modulo,
        min_val,
        max_val,
        left_steps,
        right_steps,
    };

    // paint every intruder's alert levels, least severe colors are
    // strengthened by more severe ones
    for intruder in input.traffic.iter().filter(|ac| ac.is_valid()) {
        let alerter = p.alerter_for(intruder.alerter);
        for level in alerter.levels() {
            if !level.region.is_conflict() {
                continue;
            }
            let detector = level.detector.for_pair(own, intruder);
            let horizon = p.lookahead_time.min(level.early_alerting_time);
            paint(
                &geometry, &mut colors, &left, &right, intruder, &detector, horizon,
                level.region,
            );
        }
    }

    let mut ranges = color::make_ranges(&colors, false);
    let has_none = ranges.iter().any(|r| r.region == BandsRegion::None);

    // recovery bands: shrink the corrective volume until clearance appears
    let mut recovery = None;
    if !has_none && axis.recovery_enabled(p) && !dta_active {
        let seed = recovery_seed(p, own);
        let rec_left = half_axis(axis, input, left_steps, -1, p.recovery_crit);
        let rec_right = half_axis(axis, input, right_steps, 1, p.recovery_crit);
        let mut found = false;
        for nfactor in 0..=MAX_RECOVERY_FACTOR {
            let shrunk = seed.shrink(nfactor, p.horizontal_nmac, p.vertical_nmac);
            let detector = Detector::Cylinder(shrunk.clone());
            let mut all_none: Option<Vec<Integerval>> = None;
            for intruder in input.traffic.iter().filter(|ac| ac.is_valid()) {
                let mut none_left = none_runs(&rec_left, intruder, &detector, p.lookahead_time);
                integer::negate(&mut none_left);
                let none = integer::append(
                    none_left,
                    none_runs(&rec_right, intruder, &detector, p.lookahead_time),
                );
                all_none = Some(match all_none {
                    None => none,
                    Some(acc) => intersect_runs(&acc, &none),
                });
            }
            let all_none = all_none.unwrap_or_else(|| {
                vec![Integerval::new(-left_steps, right_steps)]
            });
            if all_none.is_empty() {
                continue;
            }
            debug!(axis = ?axis, nfactor, "recovery clearance found");
            // repaint against the recovery volume; conflict-free space is
            // relabeled RECOVERY
            let mut rec_colors = init_colors();
            for intruder in input.traffic.iter().filter(|ac| ac.is_valid()) {
                paint(
                    &geometry,
                    &mut rec_colors,
                    &rec_left,
                    &rec_right,
                    intruder,
                    &detector,
                    p.lookahead_time,
                    BandsRegion::Near,
                );
            }
            ranges = color::make_ranges(&rec_colors, true);
            colors = rec_colors;
            // time to recovery along the smallest clearing maneuver
            let best = all_none
                .iter()
                .flat_map(|run| [run.lb, run.ub])
                .min_by_key(|k| k.abs())
                .unwrap_or(0);
            let rollout = if best < 0 {
                &rec_left.rollouts[(-best) as usize]
            } else {
                &rec_right.rollouts[best as usize]
            };
            let mut t_rec = rollout.t_end;
            for intruder in input.traffic.iter().filter(|ac| ac.is_valid()) {
                let si = intruder.pos.linear(intruder.gvel, rollout.t_end);
                let cd = detector.conflict_detection(
                    rollout.pos,
                    rollout.vel,
                    si,
                    intruder.gvel,
                    0.0,
                    p.lookahead_time,
                );
                if cd.conflict() {
                    t_rec = t_rec.max(rollout.t_end + cd.time_out);
                }
            }
            recovery = Some(RecoveryInformation {
                time_to_recovery: t_rec.min(p.lookahead_time),
                nfactor,
                horizontal_distance: shrunk.d,
                vertical_distance: shrunk.h,
            });
            found = true;
            break;
        }
        if !found {
            recovery = Some(RecoveryInformation::unreachable());
        }
    }

    // resolutions from the final partition
    let own_pos = units::to_2pi_mod(own_val, modulo);
    let idx = color::index_of(&ranges, own_pos, modulo);
    let (resolution_low, resolution_up) = if idx >= 0 && ranges[idx as usize].region.is_conflict()
    {
        (
            resolution_down(&ranges, idx as usize, modulo),
            resolution_up_from(&ranges, idx as usize, modulo),
        )
    } else {
        (f64::NAN, f64::NAN)
    };
    let dist_up = directed_distance(own_pos, resolution_up, modulo, 1);
    let dist_down = directed_distance(own_pos, resolution_low, modulo, -1);
    let preferred_up = dist_up <= dist_down;

    AxisBands {
        axis,
        ranges,
        recovery,
        resolution_low,
        resolution_up,
        preferred_up,
        colors,
    }
}

/// Intersection of two sorted run lists.
fn intersect_runs(a: &[Integerval], b: &[Integerval]) -> Vec<Integerval> {
    let mut out = Vec::new();
    for ra in a {
        for rb in b {
            let lb = ra.lb.max(rb.lb);
            let ub = ra.ub.min(rb.ub);
            if lb <= ub {
                out.push(Integerval::new(lb, ub));
            }
        }
    }
    out.sort_by_key(|r| r.lb);
    out
}

fn resolution_down(ranges: &[BandsRange], idx: usize, modulo: f64) -> f64 {
    let n = ranges.len();
    for off in 1..n {
        let j = if modulo > 0.0 {
            (idx + n - off) % n
        } else if off <= idx {
            idx - off
        } else {
            return f64::NEG_INFINITY;
        };
        let region = ranges[j].region;
        if region.is_resolution() {
            return ranges[j].interval.up;
        }
        if !region.is_conflict() {
            // Unknown blocks the way down
            return f64::NEG_INFINITY;
        }
    }
    f64::NEG_INFINITY
}

fn resolution_up_from(ranges: &[BandsRange], idx: usize, modulo: f64) -> f64 {
    let n = ranges.len();
    for off in 1..n {
        let j = if modulo > 0.0 {
            (idx + off) % n
        } else if idx + off < n {
            idx + off
        } else {
            return f64::INFINITY;
        };
        let region = ranges[j].region;
        if region.is_resolution() {
            return ranges[j].interval.low;
        }
        if !region.is_conflict() {
            return f64::INFINITY;
        }
    }
    f64::INFINITY
}

/// Distance from `from` to `to` walking in `dir`; ∞ when `to` is not
/// finite. Wraps on a modular axis.
fn directed_distance(from: f64, to: f64, modulo: f64, dir: i32) -> f64 {
    if !to.is_finite() {
        return f64::INFINITY;
    }
    let d = if dir > 0 { to - from } else { from - to };
    if modulo > 0.0 {
        units::to_2pi_mod(d, modulo)
    } else {
        d.abs()
    }
}
