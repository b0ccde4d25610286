use super::ConflictData;
use crate::geom::horizontal::{delta, tcpa, theta_d};
use crate::geom::interval::Interval;
use crate::geom::vect::{Vect2, Vect3};
use crate::geom::{almost_equals, almost_leq, sq};
use crate::units;
use serde::Serialize;
use std::fmt;

/**
 * ## Well-clear volumes (WCV)
 *
 * A well-clear violation combines a horizontal test against a time variable
 * (modified tau, time to closest approach, or time to entry point) with a
 * vertical test against the slab |z| ≤ ZTHR extended by the time to
 * co-altitude. The four variants share the vertical logic and differ only
 * in the horizontal time variable.
 *
 * The horizontal loss-of-well-clear interval always carries the horizontal
 * miss distance filter: no violation is possible when the closest approach
 * distance exceeds DTHR.
 */
#[derive(Debug, PartialEq, Serialize, Copy, Clone)]
pub struct WcvTable {
    /// Horizontal distance threshold in meters
    pub dthr: f64,
    /// Vertical distance threshold in meters
    pub zthr: f64,
    /// Time threshold on the horizontal time variable, in seconds
    pub tthr: f64,
    /// Time-to-co-altitude threshold in seconds
    pub tcoa: f64,
}

impl Default for WcvTable {
    fn default() -> Self {
        // DO-365 Phase I en-route values
        WcvTable {
            dthr: 0.66 * units::NMI,
            zthr: 450.0 * units::FT,
            tthr: 35.0,
            tcoa: 0.0,
        }
    }
}

impl WcvTable {
    pub fn new(dthr: f64, zthr: f64, tthr: f64, tcoa: f64) -> Self {
        WcvTable {
            dthr,
            zthr,
            tthr,
            tcoa,
        }
    }

    pub fn contains(&self, other: &WcvTable) -> bool {
        almost_leq(other.dthr, self.dthr)
            && almost_leq(other.zthr, self.zthr)
            && almost_leq(other.tthr, self.tthr)
            && almost_leq(other.tcoa, self.tcoa)
    }

    pub fn is_valid(&self) -> bool {
        self.dthr > 0.0 && self.zthr > 0.0 && self.tthr >= 0.0 && self.tcoa >= 0.0
    }

    /// Unclamped vertical loss interval. While converging toward
    /// co-altitude the effective half-height is max(ZTHR, TCOA·|vz|);
    /// once past co-altitude only the slab remains.
    pub fn vertical_interval(&self, sz: f64, vz: f64) -> Interval {
        if almost_equals(vz, 0.0) {
            return if libm::fabs(sz) <= self.zthr {
                Interval::new(f64::NEG_INFINITY, f64::INFINITY)
            } else {
                Interval::EMPTY
            };
        }
        let sign = if vz > 0.0 { 1.0 } else { -1.0 };
        let act_h = self.zthr.max(self.tcoa * libm::fabs(vz));
        let entry = (-sign * act_h - sz) / vz;
        let exit = (sign * self.zthr - sz) / vz;
        Interval::new(entry, exit)
    }
}

impl fmt::Display for WcvTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(DTHR={:.2} nmi, ZTHR={:.0} ft, TTHR={:.0} s, TCOA={:.0} s)",
            units::to(self.dthr, "nmi"),
            units::to(self.zthr, "ft"),
            self.tthr,
            self.tcoa
        )
    }
}

/// Horizontal time variable selecting the well-clear variant.
#[derive(Debug, PartialEq, Serialize, Copy, Clone)]
pub enum TimeVariable {
    /// Modified tau: (DTHR² − ‖s‖²)/(s·v)
    Taumod,
    /// Time to horizontal closest point of approach
    Tcpa,
    /// Time to entry into the DTHR disk
    Tep,
}

/// Unclamped horizontal loss-of-well-clear interval for a time variable.
pub fn horizontal_wcv_interval(
    table: &WcvTable,
    tvar: TimeVariable,
    s: Vect2,
    v: Vect2,
) -> Interval {
    let a = v.sqv();
    if almost_equals(a, 0.0) {
        return if s.norm() <= table.dthr {
            Interval::new(f64::NEG_INFINITY, f64::INFINITY)
        } else {
            Interval::EMPTY
        };
    }
    // horizontal miss distance filter
    if delta(s, v, table.dthr) < 0.0 {
        return Interval::EMPTY;
    }
    let d_entry = theta_d(s, v, -1, table.dthr);
    let d_exit = theta_d(s, v, 1, table.dthr);
    let entry = match tvar {
        TimeVariable::Taumod => {
            let sdotv = s.dot(v);
            let b = 2.0 * sdotv + table.tthr * a;
            let c = s.sqv() + table.tthr * sdotv - sq(table.dthr);
            let discr = sq(b) - 4.0 * a * c;
            if discr >= 0.0 {
                d_entry.min((-b - libm::sqrt(discr)) / (2.0 * a))
            } else {
                d_entry
            }
        }
        TimeVariable::Tcpa => {
            let t_cpa = -s.dot(v) / a;
            d_entry.min(t_cpa - table.tthr)
        }
        TimeVariable::Tep => d_entry - table.tthr,
    };
    Interval::new(entry, d_exit)
}

/// The horizontal time variable of the variant: the time metric driving the
/// alerting threshold TTHR. NaN when diverging.
pub fn horizontal_tvar(table: &WcvTable, tvar: TimeVariable, s: Vect2, v: Vect2) -> f64 {
    let sdotv = s.dot(v);
    match tvar {
        TimeVariable::Taumod => {
            if sdotv < 0.0 {
                (sq(table.dthr) - s.sqv()) / sdotv
            } else {
                f64::NAN
            }
        }
        TimeVariable::Tcpa => {
            if sdotv < 0.0 {
                tcpa(s, v)
            } else {
                f64::NAN
            }
        }
        TimeVariable::Tep => {
            if sdotv < 0.0 && delta(s, v, table.dthr) >= 0.0 {
                theta_d(s, v, -1, table.dthr)
            } else {
                f64::NAN
            }
        }
    }
}

fn wcv_detection(
    table: &WcvTable,
    tvar: TimeVariable,
    so: Vect3,
    vo: Vect3,
    si: Vect3,
    vi: Vect3,
    b: f64,
    t: f64,
) -> ConflictData {
    if !table.is_valid() {
        return ConflictData::EMPTY;
    }
    let s = so - si;
    let v = vo - vi;
    let horizontal = horizontal_wcv_interval(table, tvar, s.vect2(), v.vect2());
    let vertical = table.vertical_interval(s.z, v.z);
    let interval = horizontal.intersect(vertical).clamp_to(b, t);
    let time_crit = tcpa(s.vect2(), v.vect2()).clamp(
        if interval.is_empty() { b } else { interval.low },
        if interval.is_empty() { t } else { interval.up },
    );
    let dist_crit = s.linear(v, time_crit).cyl_norm(table.dthr, table.zthr);
    ConflictData::new(interval, time_crit, dist_crit, s, v)
}

macro_rules! wcv_variant {
    ($name:ident, $tvar:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, PartialEq, Serialize, Clone)]
        pub struct $name {
            #[serde(skip)]
            pub id: String,
            #[serde(flatten)]
            pub table: WcvTable,
        }

        impl $name {
            pub fn new(table: WcvTable) -> Self {
                $name {
                    id: String::new(),
                    table,
                }
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
                wcv_detection(&self.table, $tvar, so, vo, si, vi, b, t)
            }

            pub fn horizontal_tvar(&self, s: Vect2, v: Vect2) -> f64 {
                horizontal_tvar(&self.table, $tvar, s, v)
            }
        }
    };
}

wcv_variant!(
    WcvTaumod,
    TimeVariable::Taumod,
    "Well-clear volume on the modified-tau time variable (DO-365)."
);
wcv_variant!(
    WcvTcpa,
    TimeVariable::Tcpa,
    "Well-clear volume on the time to closest point of approach."
);
wcv_variant!(
    WcvTep,
    TimeVariable::Tep,
    "Well-clear volume on the time to entry point into the DTHR disk."
);
wcv_variant!(
    WcvHz,
    TimeVariable::Taumod,
    "Hazard-zone well-clear volume: the modified-tau family instantiated \
     with the non-cooperative hazard-zone distances (no time extension)."
);

impl Default for WcvTaumod {
    fn default() -> Self {
        WcvTaumod::new(WcvTable::default())
    }
}

impl Default for WcvTcpa {
    fn default() -> Self {
        WcvTcpa::new(WcvTable::default())
    }
}

impl Default for WcvTep {
    fn default() -> Self {
        WcvTep::new(WcvTable::default())
    }
}

impl Default for WcvHz {
    fn default() -> Self {
        WcvHz::new(WcvTable::new(
            2200.0 * units::FT,
            450.0 * units::FT,
            0.0,
            0.0,
        ))
    }
}
