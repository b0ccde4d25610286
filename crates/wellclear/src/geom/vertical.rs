/**
 * Vertical geometry: entry/exit times through the slab |z| ≤ H and the time
 * to co-altitude. `sz` is the relative altitude (ownship minus intruder),
 * `vz` the relative vertical speed.
 */
use super::almost_equals;

/// Entry (`eps = -1`) or exit (`eps = 1`) time of the relative vertical
/// trajectory through the slab of half-height `h`. When the vertical closure
/// is almost zero, returns ∓∞ inside the slab and NaN outside.
pub fn theta_h(sz: f64, vz: f64, eps: i32, h: f64) -> f64 {
    if almost_equals(vz, 0.0) {
        if libm::fabs(sz) <= h {
            return if eps < 0 {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            };
        }
        return f64::NAN;
    }
    let t1 = (-h - sz) / vz;
    let t2 = (h - sz) / vz;
    if eps < 0 {
        t1.min(t2)
    } else {
        t1.max(t2)
    }
}

/// Time to co-altitude, NaN when there is no vertical closure.
pub fn time_coalt(sz: f64, vz: f64) -> f64 {
    if almost_equals(vz, 0.0) {
        return f64::NAN;
    }
    -sz / vz
}
