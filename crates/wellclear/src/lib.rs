#![allow(rustdoc::broken_intra_doc_links)]
#![doc = include_str!("../readme.md")]
pub mod alert;
pub mod bands;
pub mod core;
pub mod detect;
pub mod geom;
pub mod hysteresis;
pub mod params;
pub mod traffic;
pub mod units;
pub mod urgency;

pub mod prelude {
    pub use crate::alert::presets;
    pub use crate::alert::{AlertThresholds, Alerter, BandsRegion};
    pub use crate::bands::color::BandsRange;
    pub use crate::bands::real::Axis;
    /// The root structure holding ownship, traffic and parameters
    pub use crate::core::Daa;
    pub use crate::detect::{ConflictData, Detector};
    pub use crate::geom::interval::Interval;
    pub use crate::geom::vect::{Vect2, Vect3};
    pub use crate::params::DaaParameters;
    pub use crate::traffic::TrafficState;
    pub use crate::units;
}
