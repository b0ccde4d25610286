use crate::geom::horizontal::tcpa3d;
use crate::geom::vect::Vect2;
use crate::geom::{almost_equals_with, sign_eps, PRECISION5};
use crate::traffic::TrafficState;
use serde::Serialize;

/**
 * Selection of the most urgent aircraft (MUA): the single intruder the
 * implicit-coordination criteria are evaluated against when computing
 * recovery bands. The coordination signs derived from the MUA keep the
 * ownship and an equipped intruder from maneuvering into each other.
 */
#[derive(Debug, PartialEq, Serialize, Clone, Default)]
pub enum UrgencyStrategy {
    /// No criteria aircraft is ever selected
    #[default]
    None,
    /// A constant aircraft identifier
    Fixed(String),
    /// Smallest cylinder-normalized distance at closest point of approach
    Dcpa,
}

impl UrgencyStrategy {
    /// Index of the most urgent aircraft in `traffic`, or None.
    ///
    /// The DCPA strategy prefers the smallest normalized distance at
    /// closest approach, breaking near-ties by the smallest time to
    /// closest approach. Inside the unit recovery cylinder the ordering
    /// flips to time-dominant: whoever gets to the closest approach first
    /// is the most urgent.
    pub fn most_urgent(
        &self,
        ownship: &TrafficState,
        traffic: &[TrafficState],
        d: f64,
        h: f64,
        lookahead: f64,
    ) -> Option<usize> {
        match self {
            UrgencyStrategy::None => None,
            UrgencyStrategy::Fixed(id) => traffic.iter().position(|ac| &ac.id == id),
            UrgencyStrategy::Dcpa => {
                let mut best: Option<(usize, f64, f64)> = None;
                for (k, intruder) in traffic.iter().enumerate() {
                    if !intruder.is_valid() {
                        continue;
                    }
                    let s = ownship.pos - intruder.pos;
                    let v = ownship.gvel - intruder.gvel;
                    let t = tcpa3d(s, v).clamp(0.0, lookahead);
                    let dist = s.linear(v, t).cyl_norm(d, h);
                    let better = match best {
                        None => true,
                        Some((_, best_dist, best_t)) => {
                            if dist <= 1.0 && best_dist <= 1.0 {
                                // both inside the recovery cylinder:
                                // time-dominant ordering
                                t < best_t
                                    || (almost_equals_with(t, best_t, PRECISION5)
                                        && dist < best_dist)
                            } else {
                                dist < best_dist
                                    && !almost_equals_with(dist, best_dist, PRECISION5)
                                    || (almost_equals_with(dist, best_dist, PRECISION5)
                                        && t < best_t)
                            }
                        }
                    };
                    if better {
                        best = Some((k, dist, t));
                    }
                }
                best.map(|(k, _, _)| k)
            }
        }
    }
}

/// Horizontal and vertical coordination signs against the most urgent
/// aircraft. Both are 0 when no MUA is selected or the corresponding
/// geometry is degenerate; a 0 sign disables the repulsive checks.
pub fn coordination_epsilons(ownship: &TrafficState, mua: &TrafficState) -> (i32, i32) {
    let s = ownship.pos - mua.pos;
    let v = ownship.gvel - mua.gvel;
    // sign of the angular momentum of the relative motion: which way the
    // pair is already passing each other
    let eps_h = sign_eps(s.vect2().det(v.vect2()));
    // ownship above the MUA resolves upward, below resolves downward
    let eps_v = sign_eps(s.z);
    (eps_h, eps_v)
}

/// A horizontal velocity change is repulsive iff it does not decrease the
/// coordination criterion in the direction of the sign.
pub fn horizontal_repulsive(s: Vect2, v_old: Vect2, v_new: Vect2, eps: i32) -> bool {
    if eps == 0 {
        return true;
    }
    let eps = f64::from(eps);
    eps * s.det(v_new) >= eps * s.det(v_old)
}

/// Vertical analog: the relative vertical rate must move in the
/// coordinated direction.
pub fn vertical_repulsive(vz_old: f64, vz_new: f64, eps: i32) -> bool {
    if eps == 0 {
        return true;
    }
    let eps = f64::from(eps);
    eps * vz_new >= eps * vz_old
}
