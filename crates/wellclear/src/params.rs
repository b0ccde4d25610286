use crate::alert::{presets, Alerter, BandsRegion};
use crate::units;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/**
 * ## Parameter dictionary
 *
 * Every knob of the engine, held in SI units (meters, meters per second,
 * radians, seconds). The text form is a flat `key = value [unit]` file;
 * unknown keys are ignored, inconsistent ranges are clamped, nothing is
 * fatal.
 */
#[derive(Debug, PartialEq, Serialize, Clone)]
pub struct DaaParameters {
    /// Conflict horizon for bands and alerting, seconds
    pub lookahead_time: f64,

    /// Relative direction range scanned left/right of the current track
    pub left_hdir: f64,
    pub right_hdir: f64,
    pub step_hdir: f64,

    pub min_hs: f64,
    pub max_hs: f64,
    pub step_hs: f64,

    pub min_vs: f64,
    pub max_vs: f64,
    pub step_vs: f64,

    pub min_alt: f64,
    pub max_alt: f64,
    pub step_alt: f64,

    /// Turn rate for kinematic direction bands; 0 falls back to the bank
    /// angle, both 0 means instantaneous
    pub turn_rate: f64,
    pub bank_angle: f64,
    /// Linear acceleration for speed bands; 0 means instantaneous
    pub horizontal_accel: f64,
    /// Linear acceleration for vertical speed bands; 0 means instantaneous
    pub vertical_accel: f64,
    /// Target climb/descent rate of the altitude level-off maneuver
    pub vertical_rate: f64,

    /// Near mid-air collision thresholds, the recovery volume floor
    pub horizontal_nmac: f64,
    pub vertical_nmac: f64,

    pub recovery_hdir: bool,
    pub recovery_hs: bool,
    pub recovery_vs: bool,
    pub recovery_alt: bool,

    /// Hysteresis windows, seconds
    pub hysteresis_time: f64,
    pub persistence_time: f64,
    /// M-of-N alerting filter; 0/0 disables the filter
    pub alerting_m: usize,
    pub alerting_n: usize,

    /// Apply the repulsive criteria to conflict and recovery bands
    pub conflict_crit: bool,
    pub recovery_crit: bool,

    /// Departure/Terminal Area special mode
    pub dta_logic: bool,
    pub dta_latitude: f64,
    pub dta_longitude: f64,
    pub dta_radius: f64,
    pub dta_height: f64,

    /// Relative bearing threshold for horizontal contours
    pub horizontal_contour_threshold: f64,

    /// The ordered alerter list, referenced 1-based from traffic states
    pub alerters: Vec<Alerter>,
}

impl Default for DaaParameters {
    fn default() -> Self {
        DaaParameters {
            lookahead_time: 180.0,
            left_hdir: std::f64::consts::PI,
            right_hdir: std::f64::consts::PI,
            step_hdir: 1.0 * units::DEG,
            min_hs: units::from(100.0, "kn"),
            max_hs: units::from(700.0, "kn"),
            step_hs: units::from(5.0, "kn"),
            min_vs: units::from(-5000.0, "fpm"),
            max_vs: units::from(5000.0, "fpm"),
            step_vs: units::from(100.0, "fpm"),
            min_alt: units::from(100.0, "ft"),
            max_alt: units::from(50000.0, "ft"),
            step_alt: units::from(500.0, "ft"),
            turn_rate: units::from(3.0, "deg"),
            bank_angle: 0.0,
            horizontal_accel: 2.0,
            vertical_accel: 0.25 * units::G,
            vertical_rate: units::from(500.0, "fpm"),
            horizontal_nmac: units::from(500.0, "ft"),
            vertical_nmac: units::from(100.0, "ft"),
            recovery_hdir: true,
            recovery_hs: true,
            recovery_vs: true,
            recovery_alt: true,
            hysteresis_time: 0.0,
            persistence_time: 0.0,
            alerting_m: 0,
            alerting_n: 0,
            conflict_crit: false,
            recovery_crit: false,
            dta_logic: false,
            dta_latitude: 0.0,
            dta_longitude: 0.0,
            dta_radius: 0.0,
            dta_height: 0.0,
            horizontal_contour_threshold: std::f64::consts::PI,
            alerters: vec![presets::do365_phase1()],
        }
    }
}

impl DaaParameters {
    /// Resolve an aircraft's 1-based alerter index, falling back to the
    /// first alerter.
    pub fn alerter_for(&self, index: usize) -> &Alerter {
        if index >= 1 && index <= self.alerters.len() {
            &self.alerters[index - 1]
        } else {
            &self.alerters[0]
        }
    }

    /// Effective turn rate: the configured one, or the coordinated-turn
    /// rate of the bank angle at the given ground speed.
    pub fn effective_turn_rate(&self, gs: f64) -> f64 {
        if self.turn_rate > 0.0 {
            self.turn_rate
        } else if self.bank_angle > 0.0 && gs > 0.0 {
            units::G * libm::tan(self.bank_angle) / gs
        } else {
            0.0
        }
    }

    /// Swap inconsistent min/max pairs and force steps positive. Never
    /// fails; every fix is logged.
    pub fn sanitize(&mut self) {
        for (name, min, max) in [
            ("hs", &mut self.min_hs, &mut self.max_hs),
            ("vs", &mut self.min_vs, &mut self.max_vs),
            ("alt", &mut self.min_alt, &mut self.max_alt),
        ] {
            if *min > *max {
                warn!("min_{name} > max_{name}: swapping");
                std::mem::swap(min, max);
            }
        }
        for (name, step) in [
            ("step_hdir", &mut self.step_hdir),
            ("step_hs", &mut self.step_hs),
            ("step_vs", &mut self.step_vs),
            ("step_alt", &mut self.step_alt),
        ] {
            if *step <= 0.0 {
                warn!("{name} must be positive: resetting to default");
                *step = match name {
                    "step_hdir" => units::DEG,
                    "step_hs" => units::from(5.0, "kn"),
                    "step_vs" => units::from(100.0, "fpm"),
                    _ => units::from(500.0, "ft"),
                };
            }
        }
        if self.lookahead_time <= 0.0 {
            warn!("lookahead_time must be positive: resetting to 180 s");
            self.lookahead_time = 180.0;
        }
        if self.alerting_n > 0 && self.alerting_m > self.alerting_n {
            warn!("alerting_m > alerting_n: clamping");
            self.alerting_m = self.alerting_n;
        }
        if self.alerters.is_empty() {
            self.alerters.push(presets::do365_phase1());
        }
    }
}

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.+?)\s*$").unwrap()
});

impl FromStr for DaaParameters {
    type Err = String;

    /// Parse the flat `key = value [unit]` text form on top of the
    /// defaults. Unknown keys are ignored.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut params = DaaParameters::default();
        let mut alerters: Vec<(usize, Alerter)> = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let caps = match LINE_RE.captures(line) {
                Some(caps) => caps,
                None => {
                    debug!("ignoring unparseable line: {line}");
                    continue;
                }
            };
            let key = caps[1].to_ascii_lowercase();
            let value = &caps[2];
            if let Some(index) = key.strip_prefix("alerter_") {
                let index: usize = index
                    .parse()
                    .map_err(|e| format!("Invalid alerter index: {e}"))?;
                match presets::by_name(value.trim()) {
                    Some(alerter) => alerters.push((index, alerter)),
                    None => warn!("unknown alerter preset: {value}"),
                }
                continue;
            }
            if let Some(rest) = key.strip_prefix("alert_") {
                apply_alert_override(&mut alerters, rest, value)?;
                continue;
            }
            let number = units::parse(value).unwrap_or(0.0);
            let boolean = matches!(value.trim(), "true" | "1") || number == 1.0;
            match key.as_str() {
                "lookahead_time" => params.lookahead_time = number,
                "left_hdir" => params.left_hdir = number,
                "right_hdir" => params.right_hdir = number,
                "step_hdir" => params.step_hdir = number,
                "min_hs" => params.min_hs = number,
                "max_hs" => params.max_hs = number,
                "step_hs" => params.step_hs = number,
                "min_vs" => params.min_vs = number,
                "max_vs" => params.max_vs = number,
                "step_vs" => params.step_vs = number,
                "min_alt" => params.min_alt = number,
                "max_alt" => params.max_alt = number,
                "step_alt" => params.step_alt = number,
                "turn_rate" => params.turn_rate = number,
                "bank_angle" => params.bank_angle = number,
                "horizontal_accel" => params.horizontal_accel = number,
                "vertical_accel" => params.vertical_accel = number,
                "vertical_rate" => params.vertical_rate = number,
                "horizontal_nmac" => params.horizontal_nmac = number,
                "vertical_nmac" => params.vertical_nmac = number,
                "recovery_hdir_bands" => params.recovery_hdir = boolean,
                "recovery_hs_bands" => params.recovery_hs = boolean,
                "recovery_vs_bands" => params.recovery_vs = boolean,
                "recovery_alt_bands" => params.recovery_alt = boolean,
                "hysteresis_time" => params.hysteresis_time = number,
                "persistence_time" => params.persistence_time = number,
                "alerting_m" => params.alerting_m = number as usize,
                "alerting_n" => params.alerting_n = number as usize,
                "conflict_crit" => params.conflict_crit = boolean,
                "recovery_crit" => params.recovery_crit = boolean,
                "dta_logic" => params.dta_logic = boolean,
                "dta_latitude" => params.dta_latitude = number,
                "dta_longitude" => params.dta_longitude = number,
                "dta_radius" => params.dta_radius = number,
                "dta_height" => params.dta_height = number,
                "horizontal_contour_threshold" | "contour_thr" => {
                    params.horizontal_contour_threshold = number
                }
                _ => debug!("ignoring unknown parameter: {key}"),
            }
        }
        if !alerters.is_empty() {
            alerters.sort_by_key(|(i, _)| *i);
            params.alerters = alerters.into_iter().map(|(_, a)| a).collect();
        }
        params.sanitize();
        Ok(params)
    }
}

/// Apply a namespaced `alert_<i>_level_<k>_<field>` override on top of a
/// previously loaded alerter.
fn apply_alert_override(
    alerters: &mut [(usize, Alerter)],
    rest: &str,
    value: &str,
) -> Result<(), String> {
    static OVERRIDE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^([0-9]+)_level_([0-9]+)_([a-z_]+)$").unwrap());
    let caps = match OVERRIDE_RE.captures(rest) {
        Some(caps) => caps,
        None => {
            debug!("ignoring unknown alert key: alert_{rest}");
            return Ok(());
        }
    };
    let alerter_idx: usize = caps[1].parse().map_err(|e| format!("{e}"))?;
    let level_idx: usize = caps[2].parse().map_err(|e| format!("{e}"))?;
    let alerter = match alerters.iter_mut().find(|(i, _)| *i == alerter_idx) {
        Some((_, alerter)) => alerter,
        None => {
            warn!("alert override before alerter_{alerter_idx} definition");
            return Ok(());
        }
    };
    let mut level = match alerter.level(level_idx) {
        Some(level) => level.clone(),
        None => {
            warn!("alert override for missing level {level_idx}");
            return Ok(());
        }
    };
    match &caps[3] {
        "alerting_time" => level.alerting_time = units::parse(value)?,
        "early_alerting_time" => level.early_alerting_time = units::parse(value)?,
        "region" => {
            level.region = match value.trim() {
                "NONE" => BandsRegion::None,
                "FAR" => BandsRegion::Far,
                "MID" => BandsRegion::Mid,
                "NEAR" => BandsRegion::Near,
                "RECOVERY" => BandsRegion::Recovery,
                _ => BandsRegion::Unknown,
            }
        }
        field => debug!("ignoring unknown alert field: {field}"),
    }
    alerter.set_level(level_idx, level);
    Ok(())
}

impl fmt::Display for DaaParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "lookahead_time = {} [s]", self.lookahead_time)?;
        writeln!(f, "left_hdir = {} [deg]", units::to(self.left_hdir, "deg"))?;
        writeln!(f, "right_hdir = {} [deg]", units::to(self.right_hdir, "deg"))?;
        writeln!(f, "step_hdir = {} [deg]", units::to(self.step_hdir, "deg"))?;
        writeln!(f, "min_hs = {} [kn]", units::to(self.min_hs, "kn"))?;
        writeln!(f, "max_hs = {} [kn]", units::to(self.max_hs, "kn"))?;
        writeln!(f, "step_hs = {} [kn]", units::to(self.step_hs, "kn"))?;
        writeln!(f, "min_vs = {} [fpm]", units::to(self.min_vs, "fpm"))?;
        writeln!(f, "max_vs = {} [fpm]", units::to(self.max_vs, "fpm"))?;
        writeln!(f, "step_vs = {} [fpm]", units::to(self.step_vs, "fpm"))?;
        writeln!(f, "min_alt = {} [ft]", units::to(self.min_alt, "ft"))?;
        writeln!(f, "max_alt = {} [ft]", units::to(self.max_alt, "ft"))?;
        writeln!(f, "step_alt = {} [ft]", units::to(self.step_alt, "ft"))?;
        writeln!(f, "turn_rate = {} [deg/s]", units::to(self.turn_rate, "deg"))?;
        writeln!(f, "bank_angle = {} [deg]", units::to(self.bank_angle, "deg"))?;
        writeln!(f, "horizontal_accel = {} [m/s^2]", self.horizontal_accel)?;
        writeln!(f, "vertical_accel = {} [m/s^2]", self.vertical_accel)?;
        writeln!(f, "vertical_rate = {} [fpm]", units::to(self.vertical_rate, "fpm"))?;
        writeln!(f, "horizontal_nmac = {} [ft]", units::to(self.horizontal_nmac, "ft"))?;
        writeln!(f, "vertical_nmac = {} [ft]", units::to(self.vertical_nmac, "ft"))?;
        writeln!(f, "recovery_hdir_bands = {}", self.recovery_hdir)?;
        writeln!(f, "recovery_hs_bands = {}", self.recovery_hs)?;
        writeln!(f, "recovery_vs_bands = {}", self.recovery_vs)?;
        writeln!(f, "recovery_alt_bands = {}", self.recovery_alt)?;
        writeln!(f, "hysteresis_time = {} [s]", self.hysteresis_time)?;
        writeln!(f, "persistence_time = {} [s]", self.persistence_time)?;
        writeln!(f, "alerting_m = {}", self.alerting_m)?;
        writeln!(f, "alerting_n = {}", self.alerting_n)?;
        writeln!(f, "conflict_crit = {}", self.conflict_crit)?;
        writeln!(f, "recovery_crit = {}", self.recovery_crit)?;
        writeln!(f, "dta_logic = {}", self.dta_logic)?;
        writeln!(f, "dta_latitude = {} [m]", self.dta_latitude)?;
        writeln!(f, "dta_longitude = {} [m]", self.dta_longitude)?;
        writeln!(f, "dta_radius = {} [m]", self.dta_radius)?;
        writeln!(f, "dta_height = {} [ft]", units::to(self.dta_height, "ft"))?;
        writeln!(
            f,
            "horizontal_contour_threshold = {} [deg]",
            units::to(self.horizontal_contour_threshold, "deg")
        )?;
        for (i, alerter) in self.alerters.iter().enumerate() {
            writeln!(f, "alerter_{} = {}", i + 1, alerter.id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_sane() {
        let params = DaaParameters::default();
        assert!(params.min_hs < params.max_hs);
        assert!(params.min_vs < params.max_vs);
        assert!(params.min_alt < params.max_alt);
        assert_eq!(params.alerters.len(), 1);
        assert_eq!(params.alerters[0].id, "DWC_Phase_I");
    }

    #[test]
    fn test_parse_round_trip() {
        let params = DaaParameters::default();
        let text = params.to_string();
        let reparsed: DaaParameters = text.parse().unwrap();
        assert_relative_eq!(reparsed.lookahead_time, params.lookahead_time);
        assert_relative_eq!(reparsed.step_hdir, params.step_hdir, max_relative = 1e-9);
        assert_relative_eq!(reparsed.min_hs, params.min_hs, max_relative = 1e-9);
        assert_eq!(reparsed.recovery_alt, params.recovery_alt);
        assert_eq!(reparsed.alerters[0].id, "DWC_Phase_I");
    }

    #[test]
    fn test_parse_with_units() {
        let text = "lookahead_time = 120 [s]\nmin_hs = 80 [kn]\nstep_alt = 100 [ft]\n";
        let params: DaaParameters = text.parse().unwrap();
        assert_relative_eq!(params.lookahead_time, 120.0);
        assert_relative_eq!(params.min_hs, units::from(80.0, "kn"));
        assert_relative_eq!(params.step_alt, units::from(100.0, "ft"));
    }

    #[test]
    fn test_clamping_on_inconsistency() {
        let text = "min_hs = 400 [kn]\nmax_hs = 200 [kn]\nstep_hs = -1 [kn]\n";
        let params: DaaParameters = text.parse().unwrap();
        assert!(params.min_hs < params.max_hs);
        assert!(params.step_hs > 0.0);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let text = "no_such_key = 42\nlookahead_time = 90\n";
        let params: DaaParameters = text.parse().unwrap();
        assert_relative_eq!(params.lookahead_time, 90.0);
    }

    #[test]
    fn test_alerter_selection_and_override() {
        let text = "alerter_1 = TCASII\nalerter_2 = DWC_Phase_I\n\
                    alert_2_level_3_alerting_time = 20 [s]\n";
        let params: DaaParameters = text.parse().unwrap();
        assert_eq!(params.alerters.len(), 2);
        assert_eq!(params.alerters[0].id, "TCASII");
        assert_relative_eq!(
            params.alerters[1].level(3).unwrap().alerting_time,
            20.0
        );
        // out-of-range alerter indices fall back to the first
        assert_eq!(params.alerter_for(7).id, "TCASII");
        assert_eq!(params.alerter_for(2).id, "DWC_Phase_I");
    }

    #[test]
    fn test_effective_turn_rate() {
        let mut params = DaaParameters::default();
        assert_relative_eq!(params.effective_turn_rate(200.0), 3.0 * units::DEG);
        params.turn_rate = 0.0;
        params.bank_angle = units::from(30.0, "deg");
        // coordinated turn: omega = g tan(bank) / gs
        let expected = units::G * libm::tan(params.bank_angle) / 200.0;
        assert_relative_eq!(params.effective_turn_rate(200.0), expected);
        params.bank_angle = 0.0;
        assert_relative_eq!(params.effective_turn_rate(200.0), 0.0);
    }
}
