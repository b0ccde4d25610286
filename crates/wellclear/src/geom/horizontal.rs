/**
 * Closed-form geometry on the horizontal (east/north) plane: time of closest
 * approach, distance at closest approach, and the entry/exit times of the
 * relative trajectory through a disk of radius D.
 *
 * Conventions: `s` is the relative position (ownship minus intruder), `v`
 * the relative velocity. Times are relative to now; functions return NaN
 * only when the geometry is undefined (no crossing, degenerate velocity).
 */
use super::vect::{Vect2, Vect3};
use super::{almost_equals, sq};

/// Time of horizontal closest point of approach. Returns 0 when the
/// aircraft are diverging or the relative speed is almost zero.
pub fn tcpa(s: Vect2, v: Vect2) -> f64 {
    let sdotv = s.dot(v);
    if sdotv >= 0.0 || almost_equals(v.sqv(), 0.0) {
        0.0
    } else {
        -sdotv / v.sqv()
    }
}

/// Time of closest point of approach of the full 3-D relative distance,
/// with the same convention as the horizontal form: 0 when diverging or
/// when the relative speed is almost zero.
pub fn tcpa3d(s: Vect3, v: Vect3) -> f64 {
    let sdotv = s.dot(v);
    if sdotv >= 0.0 || almost_equals(v.sqv(), 0.0) {
        0.0
    } else {
        -sdotv / v.sqv()
    }
}

/// Horizontal distance at closest point of approach.
pub fn dcpa(s: Vect2, v: Vect2) -> f64 {
    (s + v * tcpa(s, v)).norm()
}

/// Discriminant of the disk-crossing quadratic: non-negative iff the
/// relative line crosses the disk of radius `d`.
pub fn delta(s: Vect2, v: Vect2, d: f64) -> f64 {
    sq(d) * v.sqv() - sq(s.det(v))
}

/// Entry (`eps = -1`) or exit (`eps = 1`) time of the relative trajectory
/// through the disk of radius `d`. NaN when the line misses the disk or
/// the relative speed is almost zero.
pub fn theta_d(s: Vect2, v: Vect2, eps: i32, d: f64) -> f64 {
    let a = v.sqv();
    if almost_equals(a, 0.0) {
        return f64::NAN;
    }
    let disc = delta(s, v, d);
    if disc < 0.0 {
        return f64::NAN;
    }
    (-s.dot(v) + eps as f64 * libm::sqrt(disc)) / a
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tcpa_head_on() {
        // 10 km apart, closing at 200 m/s
        let s = Vect2::new(10_000.0, 0.0);
        let v = Vect2::new(-200.0, 0.0);
        assert_relative_eq!(tcpa(s, v), 50.0);
        assert_relative_eq!(dcpa(s, v), 0.0);
    }

    #[test]
    fn test_tcpa_diverging() {
        let s = Vect2::new(10_000.0, 0.0);
        let v = Vect2::new(200.0, 0.0);
        assert_relative_eq!(tcpa(s, v), 0.0);
        assert_relative_eq!(dcpa(s, v), 10_000.0);
    }

    #[test]
    fn test_tcpa3d_vertical_closure() {
        // level pair converging vertically only: the horizontal form sees
        // no closure, the 3-D form does
        let s = Vect3::new(0.0, 0.0, 1000.0);
        let v = Vect3::new(0.0, 0.0, -10.0);
        assert_relative_eq!(tcpa(s.vect2(), v.vect2()), 0.0);
        assert_relative_eq!(tcpa3d(s, v), 100.0);
        // diverging in 3-D
        assert_relative_eq!(tcpa3d(s, -v), 0.0);
    }

    #[test]
    fn test_tcpa3d_mixed_closure() {
        // 10 km abeam closing at 200 m/s, 1000 m above descending
        let s = Vect3::new(10_000.0, 0.0, 1000.0);
        let v = Vect3::new(-200.0, 0.0, -10.0);
        let t = tcpa3d(s, v);
        // the vertical component barely shifts the horizontal answer
        assert_relative_eq!(t, 2_010_000.0 / 40_100.0, max_relative = 1e-12);
        assert!((t - tcpa(s.vect2(), v.vect2())).abs() < 1.0);
    }

    #[test]
    fn test_theta_d_crossing() {
        let s = Vect2::new(10_000.0, 0.0);
        let v = Vect2::new(-200.0, 0.0);
        let d = 2_000.0;
        let entry = theta_d(s, v, -1, d);
        let exit = theta_d(s, v, 1, d);
        assert_relative_eq!(entry, 40.0);
        assert_relative_eq!(exit, 60.0);
        assert!(entry < exit);
    }

    #[test]
    fn test_theta_d_miss() {
        // Offset track passing 3 km abeam a 2 km disk
        let s = Vect2::new(10_000.0, 3_000.0);
        let v = Vect2::new(-200.0, 0.0);
        assert!(theta_d(s, v, -1, 2_000.0).is_nan());
        assert!(delta(s, v, 2_000.0) < 0.0);
    }

    #[test]
    fn test_theta_d_degenerate() {
        let s = Vect2::new(1_000.0, 0.0);
        assert!(theta_d(s, Vect2::ZERO, -1, 2_000.0).is_nan());
    }
}
