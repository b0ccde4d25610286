use super::wcv::{horizontal_wcv_interval, TimeVariable, WcvTable, WcvTaumod};
use super::ConflictData;
use crate::geom::horizontal::tcpa;
use crate::geom::interval::Interval;
use crate::geom::vect::{Vect2, Vect3};
use crate::geom::almost_equals;
use serde::Serialize;

/**
 * ## Modified-tau well-clear volume with Sensor Uncertainty Mitigation
 *
 * The conflict test is the worst case over the Minkowski sum of the
 * relative state with the position and velocity uncertainty disks. The
 * standard deviations are expected pre-multiplied by the configured
 * z-score.
 *
 * Position uncertainty inflates the distance thresholds directly. Velocity
 * uncertainty is handled by probing an optimal pair of tangent velocities
 * on the uncertainty circle: the candidates facing the hazard produce the
 * earliest entry and latest exit, and the hull of their loss intervals is
 * the worst-case interval. With all deviations at zero the detector
 * degenerates exactly to the underlying modified-tau volume.
 */
#[derive(Debug, PartialEq, Serialize, Copy, Clone, Default)]
pub struct SumData {
    /// Horizontal position standard deviation, meters
    pub sigma_s: f64,
    /// Vertical position standard deviation, meters
    pub sigma_sz: f64,
    /// Horizontal velocity standard deviation, m/s
    pub sigma_v: f64,
    /// Vertical velocity standard deviation, m/s
    pub sigma_vz: f64,
}

impl SumData {
    pub fn new(sigma_s: f64, sigma_sz: f64, sigma_v: f64, sigma_vz: f64) -> Self {
        SumData {
            sigma_s,
            sigma_sz,
            sigma_v,
            sigma_vz,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.sigma_s == 0.0 && self.sigma_sz == 0.0 && self.sigma_v == 0.0 && self.sigma_vz == 0.0
    }

    /// Combined uncertainty of two aircraft, variances adding up
    pub fn combine(&self, other: &SumData) -> SumData {
        SumData::new(
            libm::hypot(self.sigma_s, other.sigma_s),
            libm::hypot(self.sigma_sz, other.sigma_sz),
            libm::hypot(self.sigma_v, other.sigma_v),
            libm::hypot(self.sigma_vz, other.sigma_vz),
        )
    }
}

#[derive(Debug, PartialEq, Serialize, Clone, Default)]
pub struct WcvTaumodSum {
    #[serde(skip)]
    pub id: String,
    #[serde(flatten)]
    pub taumod: WcvTaumod,
    pub sum: SumData,
}

impl WcvTaumodSum {
    pub fn new(table: WcvTable, sum: SumData) -> Self {
        WcvTaumodSum {
            id: String::new(),
            taumod: WcvTaumod::new(table),
            sum,
        }
    }

    /// Distance thresholds inflated by the position uncertainty
    fn effective_table(&self) -> WcvTable {
        let t = &self.taumod.table;
        WcvTable::new(
            t.dthr + self.sum.sigma_s,
            t.zthr + self.sum.sigma_sz,
            t.tthr,
            t.tcoa,
        )
    }

    /// Worst-case horizontal loss interval over the velocity uncertainty
    /// circle: hull of the loss intervals of the candidate velocities
    /// facing the hazard.
    fn horizontal_sum_interval(&self, table: &WcvTable, s: Vect2, v: Vect2) -> Interval {
        let sigma = self.sum.sigma_v;
        if almost_equals(sigma, 0.0) {
            return horizontal_wcv_interval(table, TimeVariable::Taumod, s, v);
        }
        if v.norm() <= sigma {
            // the true velocity may point anywhere: only the range rules
            if s.norm() <= table.dthr {
                return Interval::new(f64::NEG_INFINITY, f64::INFINITY);
            }
            let entry = (s.norm() - table.dthr) / (sigma + v.norm());
            return Interval::new(entry, f64::INFINITY);
        }
        let toward = -s.hat();
        let side = toward.perp_r();
        let diag = std::f64::consts::FRAC_1_SQRT_2;
        let candidates = [
            v,
            v + toward * sigma,
            v + side * sigma,
            v - side * sigma,
            v + (toward + side) * (sigma * diag),
            v + (toward - side) * (sigma * diag),
        ];
        let mut hull = Interval::EMPTY;
        for w in candidates {
            hull = hull.hull(horizontal_wcv_interval(table, TimeVariable::Taumod, s, w));
        }
        hull
    }

    /// Worst-case vertical loss interval over the vertical rate range
    fn vertical_sum_interval(&self, table: &WcvTable, sz: f64, vz: f64) -> Interval {
        let sigma = self.sum.sigma_vz;
        if almost_equals(sigma, 0.0) {
            return table.vertical_interval(sz, vz);
        }
        let mut hull = table
            .vertical_interval(sz, vz - sigma)
            .hull(table.vertical_interval(sz, vz + sigma));
        hull = hull.hull(table.vertical_interval(sz, vz));
        if vz - sigma <= 0.0 && 0.0 <= vz + sigma {
            hull = hull.hull(table.vertical_interval(sz, 0.0));
        }
        hull
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
        if self.sum.is_zero() {
            return self.taumod.conflict_detection(so, vo, si, vi, b, t);
        }
        let table = self.effective_table();
        if !table.is_valid() {
            return ConflictData::EMPTY;
        }
        let s = so - si;
        let v = vo - vi;
        let horizontal = self.horizontal_sum_interval(&table, s.vect2(), v.vect2());
        let vertical = self.vertical_sum_interval(&table, s.z, v.z);
        let interval = horizontal.intersect(vertical).clamp_to(b, t);
        let time_crit = tcpa(s.vect2(), v.vect2()).clamp(
            if interval.is_empty() { b } else { interval.low },
            if interval.is_empty() { t } else { interval.up },
        );
        let dist_crit = s.linear(v, time_crit).cyl_norm(table.dthr, table.zthr);
        ConflictData::new(interval, time_crit, dist_crit, s, v)
    }

    pub fn contains(&self, other: &WcvTaumodSum) -> bool {
        self.effective_table().contains(&other.effective_table())
    }
}
