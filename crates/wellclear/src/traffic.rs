use crate::detect::wcv_sum::SumData;
use crate::geom::vect::{Vect2, Vect3};
use serde::Serialize;
use std::fmt;

/**
 * The kinematic state of one aircraft: position in a local east/north/up
 * frame (meters), ground velocity and wind-corrected air velocity (m/s),
 * the time of the state, the alerter the aircraft is evaluated against,
 * and its sensor uncertainty standard deviations.
 *
 * States are pure data; the orchestrator owns their lifecycle, propagates
 * intruders to the ownship time and re-applies the wind on every change.
 */
#[derive(Debug, PartialEq, Serialize, Clone)]
pub struct TrafficState {
    pub id: String,
    pub pos: Vect3,
    /// Ground velocity
    pub gvel: Vect3,
    /// Air velocity: ground velocity minus wind
    pub avel: Vect3,
    pub time: f64,
    /// 1-based index into the orchestrator's alerter list
    pub alerter: usize,
    pub sum: SumData,
}

impl TrafficState {
    pub fn new(id: &str, pos: Vect3, vel: Vect3, time: f64) -> Self {
        TrafficState {
            id: id.to_string(),
            pos,
            gvel: vel,
            avel: vel,
            time,
            alerter: 1,
            sum: SumData::default(),
        }
    }

    pub fn invalid() -> Self {
        TrafficState {
            id: String::new(),
            pos: Vect3::new(f64::NAN, f64::NAN, f64::NAN),
            gvel: Vect3::ZERO,
            avel: Vect3::ZERO,
            time: f64::NAN,
            alerter: 0,
            sum: SumData::default(),
        }
    }

    pub fn with_alerter(mut self, alerter: usize) -> Self {
        self.alerter = alerter;
        self
    }

    pub fn with_sum(mut self, sum: SumData) -> Self {
        self.sum = sum;
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
            && self.pos.is_finite()
            && self.gvel.is_finite()
            && self.time.is_finite()
    }

    /// Subtract the wind to obtain the air-frame velocity
    pub fn apply_wind(&mut self, wind: Vect2) {
        self.avel = self.gvel - wind.with_z(0.0);
    }

    /// Linearly propagate the position to time `t` (ground velocity)
    pub fn linear_to(&self, t: f64) -> TrafficState {
        let dt = t - self.time;
        TrafficState {
            pos: self.pos.linear(self.gvel, dt),
            time: t,
            ..self.clone()
        }
    }

    /// Compass track of the air velocity, in [0, 2π)
    pub fn track(&self) -> f64 {
        self.avel.vect2().compass_angle()
    }

    /// Horizontal air speed
    pub fn gs(&self) -> f64 {
        self.avel.vect2().norm()
    }

    pub fn vs(&self) -> f64 {
        self.avel.z
    }

    pub fn alt(&self) -> f64 {
        self.pos.z
    }
}

impl fmt::Display for TrafficState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: pos {} trk {:.1}° gs {:.1} m/s vs {:.2} m/s",
            self.id,
            self.pos,
            self.track().to_degrees(),
            self.gs(),
            self.vs()
        )
    }
}
