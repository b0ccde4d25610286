use super::ConflictData;
use crate::geom::horizontal::{dcpa, delta, tcpa, theta_d};
use crate::geom::interval::Interval;
use crate::geom::vect::{Vect2, Vect3};
use crate::geom::{almost_equals, almost_leq, sq};
use crate::units::{FT, NMI};
use serde::Serialize;

/**
 * ## TCAS II resolution/traffic advisory volume (TCAS3D)
 *
 * The legacy collision avoidance logic. A sensitivity level is selected
 * from the ownship altitude; each level carries its own tau threshold,
 * range threshold DMOD, altitude threshold ZTHR and (for resolution
 * advisories) a horizontal miss distance filter HMD.
 *
 * The RA predicate combines a 2-D tau test
 * `s·v < 0 ∧ (‖s‖² − DMOD²)/(−s·v) ≤ TAU`, the range test `‖s‖ ≤ DMOD`,
 * the HMD filter, and the vertical co-altitude test. Detection over a
 * window splits it wherever the ownship altitude crosses a sensitivity
 * level boundary and unions the per-level loss intervals.
 */
#[derive(Debug, PartialEq, Serialize, Copy, Clone)]
pub struct TcasLevel {
    /// Sensitivity level number
    pub sl: u8,
    /// Ownship altitude floor of this level, meters
    pub alt_lo: f64,
    /// Ownship altitude ceiling, meters
    pub alt_hi: f64,
    /// Tau threshold, seconds
    pub tau: f64,
    /// Time-to-co-altitude threshold, seconds
    pub tcoa: f64,
    /// Range threshold, meters
    pub dmod: f64,
    /// Altitude threshold, meters
    pub zthr: f64,
    /// Horizontal miss distance threshold, meters
    pub hmd: f64,
}

impl TcasLevel {
    fn new(sl: u8, alt_ft: (f64, f64), tau: f64, dmod_nmi: f64, zthr_ft: f64, hmd_nmi: f64) -> Self {
        TcasLevel {
            sl,
            alt_lo: alt_ft.0 * FT,
            alt_hi: alt_ft.1 * FT,
            tau,
            tcoa: tau,
            dmod: dmod_nmi * NMI,
            zthr: zthr_ft * FT,
            hmd: hmd_nmi * NMI,
        }
    }

    fn active(&self) -> bool {
        self.dmod > 0.0
    }
}

#[derive(Debug, PartialEq, Serialize, Clone)]
pub struct Tcas3d {
    #[serde(skip)]
    pub id: String,
    pub levels: Vec<TcasLevel>,
    /// Apply the horizontal miss distance filter (RA logic); traffic
    /// advisories do not filter on miss distance.
    pub hmd_filter: bool,
}

impl Tcas3d {
    /// Resolution advisory thresholds (TCAS II version 7.1). No RA is
    /// issued below 1000 ft.
    pub fn ra() -> Self {
        Tcas3d {
            id: String::new(),
            levels: vec![
                TcasLevel::new(2, (0.0, 1000.0), 0.0, 0.0, 0.0, 0.0),
                TcasLevel::new(3, (1000.0, 2350.0), 15.0, 0.20, 600.0, 0.40),
                TcasLevel::new(4, (2350.0, 5000.0), 20.0, 0.35, 600.0, 0.57),
                TcasLevel::new(5, (5000.0, 10000.0), 25.0, 0.55, 600.0, 0.74),
                TcasLevel::new(6, (10000.0, 20000.0), 30.0, 0.80, 600.0, 0.82),
                TcasLevel::new(7, (20000.0, 42000.0), 35.0, 1.10, 700.0, 0.98),
                TcasLevel::new(8, (42000.0, f64::INFINITY), 35.0, 1.10, 800.0, 1.15),
            ],
            hmd_filter: true,
        }
    }

    /// Traffic advisory thresholds.
    pub fn ta() -> Self {
        Tcas3d {
            id: String::new(),
            levels: vec![
                TcasLevel::new(2, (0.0, 1000.0), 20.0, 0.30, 850.0, 0.30),
                TcasLevel::new(3, (1000.0, 2350.0), 25.0, 0.33, 850.0, 0.33),
                TcasLevel::new(4, (2350.0, 5000.0), 30.0, 0.48, 850.0, 0.48),
                TcasLevel::new(5, (5000.0, 10000.0), 40.0, 0.75, 850.0, 0.75),
                TcasLevel::new(6, (10000.0, 20000.0), 45.0, 1.00, 850.0, 1.00),
                TcasLevel::new(7, (20000.0, 42000.0), 48.0, 1.30, 850.0, 1.30),
                TcasLevel::new(8, (42000.0, f64::INFINITY), 48.0, 1.30, 1200.0, 1.30),
            ],
            hmd_filter: false,
        }
    }

    pub fn level_at(&self, alt: f64) -> Option<&TcasLevel> {
        self.levels
            .iter()
            .find(|l| l.alt_lo <= alt && alt < l.alt_hi)
    }

    pub fn dmod_at(&self, alt: f64) -> f64 {
        self.level_at(alt).map_or(0.0, |l| l.dmod)
    }

    pub fn tau_at(&self, alt: f64) -> f64 {
        self.level_at(alt).map_or(0.0, |l| l.tau)
    }

    /// Horizontal loss interval of the tau test unioned with the range
    /// test. The tau region only counts while converging.
    fn horizontal_interval(dmod: f64, tau: f64, s: Vect2, v: Vect2) -> Interval {
        let a = v.sqv();
        if almost_equals(a, 0.0) {
            return if s.norm() <= dmod {
                Interval::new(f64::NEG_INFINITY, f64::INFINITY)
            } else {
                Interval::EMPTY
            };
        }
        let t_cpa = -s.dot(v) / a;
        let disk = if delta(s, v, dmod) >= 0.0 {
            Interval::new(theta_d(s, v, -1, dmod), theta_d(s, v, 1, dmod))
        } else {
            Interval::EMPTY
        };
        let b = 2.0 * s.dot(v) + tau * a;
        let c = s.sqv() + tau * s.dot(v) - sq(dmod);
        let discr = sq(b) - 4.0 * a * c;
        let tau_region = if discr >= 0.0 && tau > 0.0 {
            let r1 = (-b - libm::sqrt(discr)) / (2.0 * a);
            let r2 = (-b + libm::sqrt(discr)) / (2.0 * a);
            if r1 <= t_cpa {
                Interval::new(r1, r2.min(t_cpa))
            } else {
                Interval::EMPTY
            }
        } else {
            Interval::EMPTY
        };
        disk.hull(tau_region)
    }

    pub fn conflict_detection(
        &self,
        so: Vect3,
        vo: Vect3,
        si: Vect3,
        vi: Vect3,
        b: f64,
        t: f64,
    ) -> ConflictData {
        let s = so - si;
        let v = vo - vi;
        let t_end = if t.is_finite() { t } else { b + 86400.0 };

        // split the window at sensitivity level boundary crossings of the
        // ownship altitude
        let mut cuts = vec![b, t_end];
        if !almost_equals(vo.z, 0.0) {
            for level in &self.levels {
                for boundary in [level.alt_lo, level.alt_hi] {
                    if boundary.is_finite() {
                        let tk = (boundary - so.z) / vo.z;
                        if b < tk && tk < t_end {
                            cuts.push(tk);
                        }
                    }
                }
            }
        }
        cuts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        cuts.dedup();

        let mut loss = Interval::EMPTY;
        let mut crit_level: Option<&TcasLevel> = None;
        for w in cuts.windows(2) {
            let (w0, w1) = (w[0], w[1]);
            let mid = 0.5 * (w0 + w1);
            let own_alt = so.z + vo.z * mid;
            let level = match self.level_at(own_alt) {
                Some(l) if l.active() => l,
                _ => continue,
            };
            let mut horizontal =
                Self::horizontal_interval(level.dmod, level.tau, s.vect2(), v.vect2());
            if self.hmd_filter && dcpa(s.vect2(), v.vect2()) > level.hmd {
                // miss distance too large: only the range test applies
                horizontal = if delta(s.vect2(), v.vect2(), level.dmod) >= 0.0 {
                    Interval::new(
                        theta_d(s.vect2(), v.vect2(), -1, level.dmod),
                        theta_d(s.vect2(), v.vect2(), 1, level.dmod),
                    )
                } else {
                    Interval::EMPTY
                };
            }
            let vertical = WcvVertical {
                zthr: level.zthr,
                tcoa: level.tcoa,
            }
            .interval(s.z, v.z);
            let sub = horizontal.intersect(vertical).clamp_to(w0, w1);
            if !sub.is_empty() {
                loss = loss.hull(sub);
                if crit_level.is_none() {
                    crit_level = Some(level);
                }
            }
        }

        let loss = loss.clamp_to(b, t);
        let level = crit_level.or_else(|| self.level_at(so.z));
        let (dmod, zthr) = level.map_or((NMI, 300.0 * FT), |l| {
            (l.dmod.max(1.0), l.zthr.max(1.0))
        });
        let time_crit = tcpa(s.vect2(), v.vect2()).clamp(
            if loss.is_empty() { b } else { loss.low },
            if loss.is_empty() { t_end } else { loss.up },
        );
        let dist_crit = s.linear(v, time_crit).cyl_norm(dmod, zthr);
        ConflictData::new(loss, time_crit, dist_crit, s, v)
    }

    pub fn contains(&self, other: &Tcas3d) -> bool {
        if self.levels.len() != other.levels.len() {
            return false;
        }
        // filtering on miss distance shrinks the volume: a filtered
        // detector never contains an unfiltered one
        if self.hmd_filter && !other.hmd_filter {
            return false;
        }
        self.levels.iter().zip(other.levels.iter()).all(|(a, b)| {
            almost_leq(b.tau, a.tau)
                && almost_leq(b.dmod, a.dmod)
                && almost_leq(b.zthr, a.zthr)
                && (!self.hmd_filter || almost_leq(b.hmd, a.hmd))
        })
    }
}

/// Vertical logic shared with the well-clear volumes, local to avoid a
/// dependency cycle on the WCV table type.
struct WcvVertical {
    zthr: f64,
    tcoa: f64,
}

impl WcvVertical {
    fn interval(&self, sz: f64, vz: f64) -> Interval {
        if almost_equals(vz, 0.0) {
            return if libm::fabs(sz) <= self.zthr {
                Interval::new(f64::NEG_INFINITY, f64::INFINITY)
            } else {
                Interval::EMPTY
            };
        }
        let sign = if vz > 0.0 { 1.0 } else { -1.0 };
        let act_h = self.zthr.max(self.tcoa * libm::fabs(vz));
        Interval::new((-sign * act_h - sz) / vz, (sign * self.zthr - sz) / vz)
    }
}
