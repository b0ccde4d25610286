use super::{AlertThresholds, Alerter, BandsRegion};
use crate::detect::wcv::{WcvHz, WcvTable, WcvTaumod};
use crate::detect::wcv_sum::{SumData, WcvTaumodSum};
use crate::detect::{Detector, Tcas3d};
use crate::units::{FT, NMI};

/**
 * Predefined alerters reproducing the standardized detect-and-avoid
 * threshold tables bit-exact. Distances are stored in meters, times in
 * seconds; the constants below are quoted in their source units.
 */

fn taumod(dthr: f64, zthr: f64, tthr: f64, tcoa: f64) -> Detector {
    Detector::Taumod(WcvTaumod::new(WcvTable::new(dthr, zthr, tthr, tcoa)))
}

fn taumod_sum(dthr: f64, zthr: f64, tthr: f64, tcoa: f64) -> Detector {
    Detector::TaumodSum(WcvTaumodSum::new(
        WcvTable::new(dthr, zthr, tthr, tcoa),
        SumData::default(),
    ))
}

/// DO-365 Phase I (en-route): preventive, corrective and warning volumes
/// on the modified-tau well-clear with DTHR = 0.66 nmi, TTHR = 35 s. The
/// preventive volume extends vertically to 700 ft.
pub fn do365_phase1() -> Alerter {
    let mut alerter = Alerter::new("DWC_Phase_I");
    alerter.add_level(AlertThresholds::new(
        taumod(0.66 * NMI, 700.0 * FT, 35.0, 0.0),
        55.0,
        75.0,
        BandsRegion::None,
    ));
    alerter.add_level(AlertThresholds::new(
        taumod(0.66 * NMI, 450.0 * FT, 35.0, 0.0),
        55.0,
        75.0,
        BandsRegion::Mid,
    ));
    alerter.add_level(AlertThresholds::new(
        taumod(0.66 * NMI, 450.0 * FT, 35.0, 0.0),
        25.0,
        55.0,
        BandsRegion::Near,
    ));
    alerter
}

/// DO-365A Phase II (departure/terminal area): a single tighter volume,
/// uniform alerting times.
pub fn do365a_phase2() -> Alerter {
    let mut alerter = Alerter::new("DWC_Phase_II");
    let detector = || taumod(1500.0 * FT, 450.0 * FT, 0.0, 0.0);
    alerter.add_level(AlertThresholds::new(
        detector(),
        45.0,
        75.0,
        BandsRegion::None,
    ));
    alerter.add_level(AlertThresholds::new(
        detector(),
        45.0,
        75.0,
        BandsRegion::Mid,
    ));
    alerter.add_level(AlertThresholds::new(
        detector(),
        45.0,
        75.0,
        BandsRegion::Near,
    ));
    alerter
}

/// DO-365B non-cooperative sensors: hazard-zone volume with DTHR = 2200 ft.
pub fn do365b_noncoop() -> Alerter {
    let mut alerter = Alerter::new("DWC_Non_Coop");
    let detector = || {
        Detector::Hz(WcvHz::new(WcvTable::new(
            2200.0 * FT,
            450.0 * FT,
            0.0,
            0.0,
        )))
    };
    alerter.add_level(AlertThresholds::new(
        detector(),
        55.0,
        110.0,
        BandsRegion::None,
    ));
    alerter.add_level(AlertThresholds::new(
        detector(),
        55.0,
        110.0,
        BandsRegion::Mid,
    ));
    alerter.add_level(AlertThresholds::new(
        detector(),
        25.0,
        90.0,
        BandsRegion::Near,
    ));
    alerter
}

/// Buffered Phase I: the en-route volume grown to DTHR = 1.0 nmi with a
/// 20 s co-altitude buffer.
pub fn buffered_phase1() -> Alerter {
    let mut alerter = Alerter::new("Buffered_DWC_Phase_I");
    alerter.add_level(AlertThresholds::new(
        taumod(1.0 * NMI, 750.0 * FT, 35.0, 20.0),
        60.0,
        75.0,
        BandsRegion::None,
    ));
    alerter.add_level(AlertThresholds::new(
        taumod(1.0 * NMI, 450.0 * FT, 35.0, 20.0),
        60.0,
        75.0,
        BandsRegion::Mid,
    ));
    alerter.add_level(AlertThresholds::new(
        taumod(1.0 * NMI, 450.0 * FT, 35.0, 20.0),
        30.0,
        55.0,
        BandsRegion::Near,
    ));
    alerter
}

/// TCAS II: traffic advisory (no band color) and resolution advisory.
/// Alerting is on current violation only.
pub fn tcasii() -> Alerter {
    let mut alerter = Alerter::new("TCASII");
    alerter.add_level(AlertThresholds::new(
        Detector::Tcas3d(Tcas3d::ta()),
        0.0,
        0.0,
        BandsRegion::None,
    ));
    alerter.add_level(AlertThresholds::new(
        Detector::Tcas3d(Tcas3d::ra()),
        0.0,
        0.0,
        BandsRegion::Near,
    ));
    alerter
}

/// DO-365 Phase I with sensor uncertainty mitigation. The preventive
/// alerting time drops to 50 s.
pub fn do365_phase1_sum() -> Alerter {
    let mut alerter = Alerter::new("DWC_Phase_I_SUM");
    alerter.add_level(AlertThresholds::new(
        taumod_sum(0.66 * NMI, 700.0 * FT, 35.0, 0.0),
        50.0,
        75.0,
        BandsRegion::None,
    ));
    alerter.add_level(AlertThresholds::new(
        taumod_sum(0.66 * NMI, 450.0 * FT, 35.0, 0.0),
        55.0,
        75.0,
        BandsRegion::Mid,
    ));
    alerter.add_level(AlertThresholds::new(
        taumod_sum(0.66 * NMI, 450.0 * FT, 35.0, 0.0),
        25.0,
        55.0,
        BandsRegion::Near,
    ));
    alerter
}

/// DO-365A Phase II with sensor uncertainty mitigation. The warning level
/// is constructed with the NEAR region.
pub fn do365a_phase2_sum() -> Alerter {
    let mut alerter = Alerter::new("DWC_Phase_II_SUM");
    let detector = || taumod_sum(1500.0 * FT, 450.0 * FT, 0.0, 0.0);
    alerter.add_level(AlertThresholds::new(
        detector(),
        45.0,
        75.0,
        BandsRegion::None,
    ));
    alerter.add_level(AlertThresholds::new(
        detector(),
        45.0,
        75.0,
        BandsRegion::Mid,
    ));
    alerter.add_level(AlertThresholds::new(
        detector(),
        45.0,
        75.0,
        BandsRegion::Near,
    ));
    alerter
}

/// Look a preset up by its identifier.
pub fn by_name(name: &str) -> Option<Alerter> {
    match name {
        "DWC_Phase_I" => Some(do365_phase1()),
        "DWC_Phase_II" => Some(do365a_phase2()),
        "DWC_Non_Coop" => Some(do365b_noncoop()),
        "Buffered_DWC_Phase_I" => Some(buffered_phase1()),
        "TCASII" => Some(tcasii()),
        "DWC_Phase_I_SUM" => Some(do365_phase1_sum()),
        "DWC_Phase_II_SUM" => Some(do365a_phase2_sum()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_phase1_constants() {
        let alerter = do365_phase1();
        assert!(alerter.is_valid());
        assert_eq!(alerter.most_severe_alert_level(), 3);
        let preventive = alerter.level(1).unwrap();
        assert_eq!(preventive.region, BandsRegion::None);
        assert_relative_eq!(preventive.alerting_time, 55.0);
        assert_relative_eq!(preventive.early_alerting_time, 75.0);
        if let Detector::Taumod(wcv) = &preventive.detector {
            assert_relative_eq!(wcv.table.dthr, 0.66 * NMI);
            assert_relative_eq!(wcv.table.zthr, 700.0 * FT);
            assert_relative_eq!(wcv.table.tthr, 35.0);
        } else {
            unreachable!();
        }
        let warning = alerter.level(3).unwrap();
        assert_eq!(warning.region, BandsRegion::Near);
        assert_relative_eq!(warning.alerting_time, 25.0);
        assert_relative_eq!(warning.early_alerting_time, 55.0);
    }

    #[test]
    fn test_containment_across_levels() {
        // each preset's more severe volume is contained in the less severe
        for alerter in [do365_phase1(), buffered_phase1(), do365b_noncoop()] {
            for i in 1..alerter.most_severe_alert_level() {
                let outer = alerter.detector_for_level(i).unwrap();
                let inner = alerter.detector_for_level(i + 1).unwrap();
                assert!(
                    outer.contains(inner),
                    "{}: level {} does not contain level {}",
                    alerter.id,
                    i,
                    i + 1
                );
            }
        }
    }

    #[test]
    fn test_phase1_sum_preventive_time() {
        let alerter = do365_phase1_sum();
        assert_relative_eq!(alerter.level(1).unwrap().alerting_time, 50.0);
        assert_relative_eq!(alerter.level(2).unwrap().alerting_time, 55.0);
    }

    #[test]
    fn test_phase2_sum_warning_region() {
        let alerter = do365a_phase2_sum();
        assert_eq!(alerter.level(3).unwrap().region, BandsRegion::Near);
    }

    #[test]
    fn test_tcasii_alerting_on_violation_only() {
        let alerter = tcasii();
        assert_relative_eq!(alerter.level(1).unwrap().alerting_time, 0.0);
        assert_relative_eq!(alerter.level(2).unwrap().alerting_time, 0.0);
        assert_eq!(alerter.alert_level_for_region(BandsRegion::Near), 2);
        assert_eq!(alerter.alert_level_for_region(BandsRegion::Far), -1);
    }

    #[test]
    fn test_lookup_by_name() {
        assert!(by_name("DWC_Phase_I").is_some());
        assert!(by_name("TCASII").is_some());
        assert!(by_name("unheard_of").is_none());
    }
}
