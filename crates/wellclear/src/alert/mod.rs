pub mod presets;

use crate::detect::Detector;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/**
 * ## Conflict regions
 *
 * The color of a band or an alert. For conflict purposes the regions are
 * totally ordered by severity; `Recovery` and `None` are resolution
 * colors, `Unknown` marks values outside the configured range.
 */
#[derive(Debug, PartialEq, Eq, Serialize, Copy, Clone)]
#[serde(rename_all = "UPPERCASE")]
pub enum BandsRegion {
    Unknown,
    None,
    Far,
    Mid,
    Near,
    Recovery,
}

impl BandsRegion {
    pub fn order(&self) -> i32 {
        match self {
            BandsRegion::Unknown => -1,
            BandsRegion::None => 0,
            BandsRegion::Far => 1,
            BandsRegion::Mid => 2,
            BandsRegion::Near => 3,
            BandsRegion::Recovery => 4,
        }
    }

    pub fn is_valid(&self) -> bool {
        *self != BandsRegion::Unknown
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, BandsRegion::None | BandsRegion::Recovery)
    }

    pub fn is_conflict(&self) -> bool {
        self.is_valid() && !self.is_resolution()
    }
}

impl PartialOrd for BandsRegion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BandsRegion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order().cmp(&other.order())
    }
}

impl fmt::Display for BandsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                BandsRegion::Unknown => "UNKNOWN",
                BandsRegion::None => "NONE",
                BandsRegion::Far => "FAR",
                BandsRegion::Mid => "MID",
                BandsRegion::Near => "NEAR",
                BandsRegion::Recovery => "RECOVERY",
            }
        )
    }
}

/**
 * One alert level: a detector, an alerting horizon, an early horizon for
 * maneuver guidance, the conflict region the level paints, and optional
 * maneuver spreads widening the alert test to nearby reachable states.
 *
 * An `alerting_time` of 0 means the level fires on current violation only.
 */
#[derive(Debug, PartialEq, Serialize, Clone)]
pub struct AlertThresholds {
    pub detector: Detector,
    /// Conflict horizon for alerting, seconds
    pub alerting_time: f64,
    /// Horizon used to compute guidance bands for this level, seconds
    pub early_alerting_time: f64,
    pub region: BandsRegion,
    /// Half-width spreads per maneuver axis (rad, m/s, m/s, m); 0 disables
    pub spread_hdir: f64,
    pub spread_hs: f64,
    pub spread_vs: f64,
    pub spread_alt: f64,
}

impl AlertThresholds {
    pub fn new(
        detector: Detector,
        alerting_time: f64,
        early_alerting_time: f64,
        region: BandsRegion,
    ) -> Self {
        AlertThresholds {
            detector,
            alerting_time: alerting_time.max(0.0),
            // the early horizon extends, never shortens, the alerting one
            early_alerting_time: early_alerting_time.max(alerting_time).max(0.0),
            region,
            spread_hdir: 0.0,
            spread_hs: 0.0,
            spread_vs: 0.0,
            spread_alt: 0.0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.alerting_time >= 0.0 && self.early_alerting_time >= self.alerting_time
    }
}

impl fmt::Display for AlertThresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} alerting ({:.0} s, {:.0} s) region {}",
            self.detector, self.alerting_time, self.early_alerting_time, self.region
        )
    }
}

/**
 * An ordered, 1-indexed list of alert levels. The list must be
 * increasingly severe: the conflict volume of level i+1 is contained in
 * the volume of level i, so a firing level implies all lower ones.
 */
#[derive(Debug, PartialEq, Serialize, Clone, Default)]
pub struct Alerter {
    pub id: String,
    levels: Vec<AlertThresholds>,
}

impl Alerter {
    pub fn new(id: &str) -> Self {
        Alerter {
            id: id.to_string(),
            levels: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.levels.is_empty()
            && self.levels.iter().any(|l| l.region != BandsRegion::None)
            && self.levels.iter().all(|l| l.is_valid())
    }

    /// Append a level and return its 1-based index
    pub fn add_level(&mut self, thresholds: AlertThresholds) -> usize {
        self.levels.push(thresholds);
        self.levels.len()
    }

    /// 1-based access, None when out of range
    pub fn level(&self, i: usize) -> Option<&AlertThresholds> {
        if i == 0 {
            return None;
        }
        self.levels.get(i - 1)
    }

    pub fn set_level(&mut self, i: usize, thresholds: AlertThresholds) -> bool {
        if i == 0 || i > self.levels.len() {
            return false;
        }
        self.levels[i - 1] = thresholds;
        true
    }

    pub fn levels(&self) -> &[AlertThresholds] {
        &self.levels
    }

    pub fn most_severe_alert_level(&self) -> usize {
        self.levels.len()
    }

    /// First (least severe) level painting the given region, or -1 when no
    /// level matches. 0 stays reserved for "no alert".
    pub fn alert_level_for_region(&self, region: BandsRegion) -> i32 {
        for (k, level) in self.levels.iter().enumerate() {
            if level.region == region {
                return (k + 1) as i32;
            }
        }
        -1
    }

    pub fn detector_for_level(&self, i: usize) -> Option<&Detector> {
        self.level(i).map(|l| &l.detector)
    }
}

impl fmt::Display for Alerter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Alerter {}:", self.id)?;
        for (k, level) in self.levels.iter().enumerate() {
            writeln!(f, "  {}: {}", k + 1, level)?;
        }
        Ok(())
    }
}
