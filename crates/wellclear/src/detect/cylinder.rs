use super::ConflictData;
use crate::geom::horizontal::{delta, tcpa, theta_d};
use crate::geom::interval::Interval;
use crate::geom::vect::Vect3;
use crate::geom::vertical::theta_h;
use crate::geom::{almost_equals, almost_leq};
use serde::Serialize;

/**
 * ## Cylindrical separation volume (CD3D)
 *
 * Loss of separation iff the horizontal distance is below D and the
 * vertical distance below H at the same time. Entry and exit times are
 * closed-form: the disk crossing on the horizontal plane intersected with
 * the slab crossing on the vertical axis.
 */
#[derive(Debug, PartialEq, Serialize, Clone)]
pub struct CdCylinder {
    #[serde(skip)]
    pub id: String,
    /// Horizontal radius in meters
    pub d: f64,
    /// Vertical half-height in meters
    pub h: f64,
}

impl Default for CdCylinder {
    fn default() -> Self {
        // 5 nmi, 1000 ft: traditional en-route loss of separation
        CdCylinder::new(5.0 * crate::units::NMI, 1000.0 * crate::units::FT)
    }
}

impl CdCylinder {
    pub fn new(d: f64, h: f64) -> Self {
        CdCylinder {
            id: String::new(),
            d,
            h,
        }
    }

    /// Conflict-free loss interval of the relative state, unclamped
    pub fn loss_interval(&self, s: Vect3, v: Vect3) -> Interval {
        let s2 = s.vect2();
        let v2 = v.vect2();
        let horizontal = if almost_equals(v2.sqv(), 0.0) {
            if s2.norm() <= self.d {
                Interval::new(f64::NEG_INFINITY, f64::INFINITY)
            } else {
                Interval::EMPTY
            }
        } else if delta(s2, v2, self.d) >= 0.0 {
            Interval::new(theta_d(s2, v2, -1, self.d), theta_d(s2, v2, 1, self.d))
        } else {
            Interval::EMPTY
        };
        if horizontal.is_empty() {
            return Interval::EMPTY;
        }
        let entry = theta_h(s.z, v.z, -1, self.h);
        let exit = theta_h(s.z, v.z, 1, self.h);
        if entry.is_nan() || exit.is_nan() {
            return Interval::EMPTY;
        }
        horizontal.intersect(Interval::new(entry, exit))
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
        let interval = self.loss_interval(s, v).clamp_to(b, t);
        let time_crit = tcpa(s.vect2(), v.vect2()).clamp(
            if interval.is_empty() { b } else { interval.low },
            if interval.is_empty() { t } else { interval.up },
        );
        let dist_crit = s.linear(v, time_crit).cyl_norm(self.d, self.h);
        ConflictData::new(interval, time_crit, dist_crit, s, v)
    }

    pub fn contains(&self, other: &CdCylinder) -> bool {
        almost_leq(other.d, self.d) && almost_leq(other.h, self.h)
    }

    /// The same cylinder shrunk toward the NMAC volume; used for recovery
    /// bands. `factor = 0` is the cylinder itself, each further step
    /// halves the margin above the floor.
    pub fn shrink(&self, factor: i32, d_floor: f64, h_floor: f64) -> CdCylinder {
        let k = libm::pow(2.0, -f64::from(factor));
        CdCylinder::new(
            d_floor.max(self.d * k),
            h_floor.max(self.h * k),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units;
    use approx::assert_relative_eq;

    #[test]
    fn test_head_on_interval() {
        let cyl = CdCylinder::new(5.0 * units::NMI, 1000.0 * units::FT);
        let so = Vect3::new(0.0, 0.0, 9144.0);
        let vo = Vect3::new(units::from(500.0, "kn"), 0.0, 0.0);
        let si = Vect3::new(units::from(20.0, "nmi"), 0.0, 9144.0);
        let vi = Vect3::new(-units::from(500.0, "kn"), 0.0, 0.0);
        let cd = cyl.conflict_detection(so, vo, si, vi, 0.0, 300.0);
        assert!(cd.conflict());
        // closing at 1000 kn over 20 nmi, 5 nmi radius: entry at 15/1000 h
        assert_relative_eq!(cd.time_in, 15.0 * 3.6, max_relative = 1e-9);
        assert_relative_eq!(cd.time_out, 25.0 * 3.6, max_relative = 1e-9);
        assert!(cd.time_in <= cd.time_crit && cd.time_crit <= cd.time_out);
        assert_relative_eq!(cd.dist_crit, 0.0);
    }

    #[test]
    fn test_vertical_separation_no_conflict() {
        let cyl = CdCylinder::new(5.0 * units::NMI, 300.0 * units::FT);
        let so = Vect3::new(0.0, 0.0, 9144.0);
        let vo = Vect3::new(250.0, 0.0, 0.0);
        // crossing 2000 ft above, both level
        let si = Vect3::new(units::from(20.0, "nmi"), 0.0, 9144.0 + 2000.0 * units::FT);
        let vi = Vect3::new(-250.0, 0.0, 0.0);
        let cd = cyl.conflict_detection(so, vo, si, vi, 0.0, 300.0);
        assert!(!cd.conflict());
    }

    #[test]
    fn test_interval_clamped_to_window() {
        let cyl = CdCylinder::default();
        let so = Vect3::new(0.0, 0.0, 9144.0);
        let vo = Vect3::new(250.0, 0.0, 0.0);
        let si = Vect3::new(30_000.0, 0.0, 9144.0);
        let vi = Vect3::new(-250.0, 0.0, 0.0);
        let unclamped = cyl.conflict_detection(so, vo, si, vi, 0.0, 1000.0);
        assert!(unclamped.conflict());
        let clamped = cyl.conflict_detection(so, vo, si, vi, 0.0, unclamped.time_in + 1.0);
        assert!(clamped.conflict());
        assert_relative_eq!(clamped.time_out, unclamped.time_in + 1.0);
    }

    #[test]
    fn test_containment() {
        let big = CdCylinder::new(10_000.0, 500.0);
        let small = CdCylinder::new(5_000.0, 300.0);
        assert!(big.contains(&small));
        assert!(!small.contains(&big));
        assert!(big.contains(&big.clone()));
    }

    #[test]
    fn test_shrink_floors() {
        let cyl = CdCylinder::new(10_000.0, 500.0);
        let s1 = cyl.shrink(1, 926.0, 30.0);
        assert_relative_eq!(s1.d, 5_000.0);
        let deep = cyl.shrink(10, 926.0, 30.0);
        assert_relative_eq!(deep.d, 926.0);
        assert_relative_eq!(deep.h, 30.0);
    }
}
