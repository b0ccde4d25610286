pub mod cylinder;
pub mod tcas;
pub mod wcv;
pub mod wcv_sum;

use crate::geom::interval::Interval;
use crate::geom::vect::{Vect2, Vect3};
use crate::traffic::TrafficState;
use serde::Serialize;
use std::fmt;

pub use cylinder::CdCylinder;
pub use tcas::Tcas3d;
pub use wcv::{WcvTable, WcvTaumod, WcvTcpa, WcvTep, WcvHz};
pub use wcv_sum::WcvTaumodSum;

/**
 * The result of a state-based conflict probe over a window [B, T].
 *
 * A conflict is reported iff `time_in <= time_out`; both are clamped to the
 * window. `time_crit` is a severity time inside the conflict interval (not
 * necessarily the closest point of approach) and `dist_crit` the
 * cylinder-normalized distance at that time, 0 at coincidence.
 */
#[derive(Debug, PartialEq, Serialize, Copy, Clone)]
pub struct ConflictData {
    pub time_in: f64,
    pub time_out: f64,
    pub time_crit: f64,
    pub dist_crit: f64,
    #[serde(skip)]
    pub s: Vect3,
    #[serde(skip)]
    pub v: Vect3,
}

impl ConflictData {
    /// Well-formed "no conflict" value, also the answer to invalid inputs
    pub const EMPTY: ConflictData = ConflictData {
        time_in: f64::INFINITY,
        time_out: f64::NEG_INFINITY,
        time_crit: f64::INFINITY,
        dist_crit: f64::INFINITY,
        s: Vect3::ZERO,
        v: Vect3::ZERO,
    };

    pub fn new(interval: Interval, time_crit: f64, dist_crit: f64, s: Vect3, v: Vect3) -> Self {
        if interval.is_empty() {
            ConflictData { s, v, ..Self::EMPTY }
        } else {
            ConflictData {
                time_in: interval.low,
                time_out: interval.up,
                time_crit,
                dist_crit,
                s,
                v,
            }
        }
    }

    pub fn conflict(&self) -> bool {
        self.time_in <= self.time_out
    }

    pub fn conflict_before(&self, t: f64) -> bool {
        self.conflict() && self.time_in <= t
    }

    pub fn interval(&self) -> Interval {
        Interval::new(self.time_in, self.time_out)
    }
}

impl fmt::Display for ConflictData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflict() {
            write!(
                f,
                "conflict [{:.2}, {:.2}] crit {:.2} dist {:.4}",
                self.time_in, self.time_out, self.time_crit, self.dist_crit
            )
        } else {
            write!(f, "no conflict")
        }
    }
}

/**
 * The family of separation volumes. Every variant answers the same
 * questions: does a conflict occur inside a window, is the current state a
 * violation, does this volume contain another one.
 *
 * | Variant         | Volume                                             |
 * | --------------- | -------------------------------------------------- |
 * | `Cylinder`      | disk of radius D, slab of half-height H            |
 * | `Taumod`        | modified-tau well-clear volume (DO-365)            |
 * | `Tcpa`          | time-to-CPA well-clear volume                      |
 * | `Tep`           | time-to-entry-point well-clear volume              |
 * | `Hz`            | hazard-zone well-clear volume (non-cooperative)    |
 * | `TaumodSum`     | modified-tau with sensor uncertainty mitigation    |
 * | `Tcas3d`        | TCAS II RA volume, sensitivity level by altitude   |
 */
#[derive(Debug, PartialEq, Serialize, Clone)]
#[serde(tag = "class")]
pub enum Detector {
    Cylinder(CdCylinder),
    Taumod(WcvTaumod),
    Tcpa(WcvTcpa),
    Tep(WcvTep),
    Hz(WcvHz),
    TaumodSum(WcvTaumodSum),
    Tcas3d(Tcas3d),
}

impl Detector {
    /// Conflict probe over [b, t]; t < 0 means unbounded. Invalid inputs
    /// (non-finite state, b > t) report no conflict.
    pub fn conflict_detection(
        &self,
        so: Vect3,
        vo: Vect3,
        si: Vect3,
        vi: Vect3,
        b: f64,
        t: f64,
    ) -> ConflictData {
        let t = if t < 0.0 { f64::INFINITY } else { t };
        if !so.is_finite() || !vo.is_finite() || !si.is_finite() || !vi.is_finite() {
            return ConflictData::EMPTY;
        }
        if !(0.0 <= b) || b > t {
            return ConflictData::EMPTY;
        }
        match self {
            Detector::Cylinder(d) => d.conflict_detection(so, vo, si, vi, b, t),
            Detector::Taumod(d) => d.conflict_detection(so, vo, si, vi, b, t),
            Detector::Tcpa(d) => d.conflict_detection(so, vo, si, vi, b, t),
            Detector::Tep(d) => d.conflict_detection(so, vo, si, vi, b, t),
            Detector::Hz(d) => d.conflict_detection(so, vo, si, vi, b, t),
            Detector::TaumodSum(d) => d.conflict_detection(so, vo, si, vi, b, t),
            Detector::Tcas3d(d) => d.conflict_detection(so, vo, si, vi, b, t),
        }
    }

    /// Current-state violation, i.e. a conflict at the zero-width window
    pub fn violation(&self, so: Vect3, vo: Vect3, si: Vect3, vi: Vect3) -> bool {
        self.conflict_detection(so, vo, si, vi, 0.0, 0.0).conflict()
    }

    /// True iff the two detectors are of the same class and this volume
    /// contains the other one.
    pub fn contains(&self, other: &Detector) -> bool {
        match (self, other) {
            (Detector::Cylinder(a), Detector::Cylinder(b)) => a.contains(b),
            (Detector::Taumod(a), Detector::Taumod(b)) => a.table.contains(&b.table),
            (Detector::Tcpa(a), Detector::Tcpa(b)) => a.table.contains(&b.table),
            (Detector::Tep(a), Detector::Tep(b)) => a.table.contains(&b.table),
            (Detector::Hz(a), Detector::Hz(b)) => a.table.contains(&b.table),
            (Detector::TaumodSum(a), Detector::TaumodSum(b)) => a.contains(b),
            (Detector::Tcas3d(a), Detector::Tcas3d(b)) => a.contains(b),
            _ => false,
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            Detector::Cylinder(d) => &d.id,
            Detector::Taumod(d) => &d.id,
            Detector::Tcpa(d) => &d.id,
            Detector::Tep(d) => &d.id,
            Detector::Hz(d) => &d.id,
            Detector::TaumodSum(d) => &d.id,
            Detector::Tcas3d(d) => &d.id,
        }
    }

    pub fn set_identifier(&mut self, id: &str) {
        let field = match self {
            Detector::Cylinder(d) => &mut d.id,
            Detector::Taumod(d) => &mut d.id,
            Detector::Tcpa(d) => &mut d.id,
            Detector::Tep(d) => &mut d.id,
            Detector::Hz(d) => &mut d.id,
            Detector::TaumodSum(d) => &mut d.id,
            Detector::Tcas3d(d) => &mut d.id,
        };
        *field = id.to_string();
    }

    pub fn canonical_name(&self) -> &'static str {
        match self {
            Detector::Cylinder(_) => "CD3D",
            Detector::Taumod(_) => "WCV_TAUMOD",
            Detector::Tcpa(_) => "WCV_TCPA",
            Detector::Tep(_) => "WCV_TEP",
            Detector::Hz(_) => "WCV_HZ",
            Detector::TaumodSum(_) => "WCV_TAUMOD_SUM",
            Detector::Tcas3d(_) => "TCAS3D",
        }
    }

    /// The detector instantiated for a pair of aircraft: uncertainty-aware
    /// volumes pick up the combined sensor deviations of the pair.
    pub fn for_pair(&self, ownship: &TrafficState, intruder: &TrafficState) -> Detector {
        match self {
            Detector::TaumodSum(d) => {
                let mut paired = d.clone();
                paired.sum = ownship.sum.combine(&intruder.sum);
                Detector::TaumodSum(paired)
            }
            _ => self.clone(),
        }
    }

    /// Counter-clockwise polygon approximating the horizontal hazard
    /// outline around the intruder, for display purposes only.
    pub fn horizontal_hazard_zone(
        &self,
        ownship: &TrafficState,
        intruder: &TrafficState,
        t: f64,
    ) -> Vec<Vect2> {
        let d = match self {
            Detector::Cylinder(c) => c.d,
            Detector::Taumod(w) => w.table.dthr,
            Detector::Tcpa(w) => w.table.dthr,
            Detector::Tep(w) => w.table.dthr,
            Detector::Hz(w) => w.table.dthr,
            Detector::TaumodSum(w) => w.taumod.table.dthr + w.sum.sigma_s,
            Detector::Tcas3d(x) => x.dmod_at(ownship.pos.z),
        };
        let tthr = match self {
            Detector::Taumod(w) => w.table.tthr,
            Detector::Tcpa(w) => w.table.tthr,
            Detector::Tep(w) => w.table.tthr,
            Detector::Hz(w) => w.table.tthr,
            Detector::TaumodSum(w) => w.taumod.table.tthr,
            Detector::Tcas3d(x) => x.tau_at(ownship.pos.z),
            Detector::Cylinder(_) => 0.0,
        };
        hazard_outline(intruder.avel.vect2(), d, tthr.min(t))
    }
}

/// The tau-extended hazard outline: the DTHR disk stretched against the
/// intruder velocity by the time threshold. 32-point CCW polygon, relative
/// to the intruder position.
fn hazard_outline(vi: Vect2, d: f64, tthr: f64) -> Vec<Vect2> {
    let n = 32;
    let mut polygon = Vec::with_capacity(n);
    for k in 0..n {
        let ang = 2.0 * std::f64::consts::PI * k as f64 / n as f64;
        let p = Vect2::new(d * libm::cos(ang), d * libm::sin(ang));
        // stretch the half facing the traffic stream
        let stretch = if p.dot(vi) < 0.0 && tthr > 0.0 {
            vi * (-tthr * 0.5)
        } else {
            Vect2::ZERO
        };
        polygon.push(p + stretch);
    }
    polygon
}

impl Default for Detector {
    fn default() -> Self {
        Detector::Taumod(WcvTaumod::default())
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detector::Cylinder(d) => {
                write!(f, "CD3D(D={:.0} m, H={:.0} m)", d.d, d.h)
            }
            Detector::Taumod(d) => write!(f, "WCV_TAUMOD{}", d.table),
            Detector::Tcpa(d) => write!(f, "WCV_TCPA{}", d.table),
            Detector::Tep(d) => write!(f, "WCV_TEP{}", d.table),
            Detector::Hz(d) => write!(f, "WCV_HZ{}", d.table),
            Detector::TaumodSum(d) => {
                write!(f, "WCV_TAUMOD_SUM{}", d.taumod.table)
            }
            Detector::Tcas3d(_) => write!(f, "TCAS3D"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units;

    fn head_on() -> (Vect3, Vect3, Vect3, Vect3) {
        let so = Vect3::new(0.0, 0.0, 9144.0);
        let vo = Vect3::new(units::from(500.0, "kn"), 0.0, 0.0);
        let si = Vect3::new(units::from(10.0, "nmi"), 0.0, 9144.0);
        let vi = Vect3::new(-units::from(500.0, "kn"), 0.0, 0.0);
        (so, vo, si, vi)
    }

    #[test]
    fn test_invalid_inputs_no_conflict() {
        let (so, vo, si, vi) = head_on();
        let det = Detector::default();
        let cd = det.conflict_detection(so, vo, si, vi, 30.0, 10.0);
        assert!(!cd.conflict());
        let cd = det.conflict_detection(Vect3::new(f64::NAN, 0.0, 0.0), vo, si, vi, 0.0, 100.0);
        assert!(!cd.conflict());
    }

    #[test]
    fn test_unbounded_window() {
        let (so, vo, si, vi) = head_on();
        let det = Detector::default();
        let cd = det.conflict_detection(so, vo, si, vi, 0.0, -1.0);
        assert!(cd.conflict());
    }

    #[test]
    fn test_containment_cross_class() {
        let a = Detector::Cylinder(CdCylinder::new(10_000.0, 300.0));
        let b = Detector::default();
        assert!(!a.contains(&b));
    }

    #[test]
    fn test_containment_implies_conflict() {
        // if A contains B, every conflict of B is a conflict of A
        let a = Detector::Taumod(crate::detect::wcv::WcvTaumod::new(
            crate::detect::wcv::WcvTable::new(2.0 * units::NMI, 300.0, 45.0, 20.0),
        ));
        let b = Detector::default();
        assert!(a.contains(&b));
        let states = [
            (0.0, 0.0, 250.0, 0.0, 18_520.0, 0.0, -250.0, 0.0),
            (0.0, 0.0, 250.0, 0.0, 9_000.0, 1_000.0, -200.0, 10.0),
            (0.0, 0.0, 150.0, 30.0, 12_000.0, -2_000.0, -180.0, -20.0),
            (0.0, 0.0, 250.0, 0.0, 40_000.0, 0.0, 250.0, 0.0),
        ];
        for (sx, sy, vx, vy, ix, iy, wx, wy) in states {
            let so = Vect3::new(sx, sy, 9144.0);
            let vo = Vect3::new(vx, vy, 0.0);
            let si = Vect3::new(ix, iy, 9144.0);
            let vi = Vect3::new(wx, wy, 0.0);
            let inner = b.conflict_detection(so, vo, si, vi, 0.0, 120.0);
            let outer = a.conflict_detection(so, vo, si, vi, 0.0, 120.0);
            if inner.conflict() {
                assert!(outer.conflict());
                assert!(outer.time_in <= inner.time_in + 1e-9);
            }
        }
    }

    #[test]
    fn test_hazard_zone_is_polygon() {
        let det = Detector::default();
        let own = crate::traffic::TrafficState::new(
            "own",
            Vect3::new(0.0, 0.0, 9144.0),
            Vect3::new(250.0, 0.0, 0.0),
            0.0,
        );
        let intr = crate::traffic::TrafficState::new(
            "intr",
            Vect3::new(18_520.0, 0.0, 9144.0),
            Vect3::new(-250.0, 0.0, 0.0),
            0.0,
        );
        let poly = det.horizontal_hazard_zone(&own, &intr, 60.0);
        assert_eq!(poly.len(), 32);
    }
}
