//! Volume reconciliation.
//!
//! One enforcement pass compares every configured target with the live
//! device volume and corrects the ones that drifted.

use crate::audio::{DeviceGateway, DeviceId};
use crate::config::{clamp_volume, Configuration, Target};
use tracing::{debug, info, warn};

/// Slack, in percentage points, before a correction is issued.
pub const TOLERANCE_PERCENT: f64 = 0.5;

/// What happened to one target during a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetOutcome {
    /// The device was set to the target volume
    Corrected { from: f64, to: u8 },

    /// Already within tolerance; nothing written
    WithinTolerance,

    /// The stored device id does not parse
    InvalidId,

    /// Device unplugged, inactive or not a capture device
    Unavailable,

    /// A gateway call failed; retried next pass
    Failed(String),
}

/// Result of one enforcement pass, in target order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnforcementReport {
    pub outcomes: Vec<(String, TargetOutcome)>,
}

impl EnforcementReport {
    /// Number of volume writes issued.
    pub fn corrected(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Corrected { .. }))
    }

    /// Number of targets skipped for an invalid id or missing device.
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::InvalidId | TargetOutcome::Unavailable))
    }

    /// Number of targets whose gateway calls failed.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&TargetOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// True when `current` is far enough from `target` to need a write.
pub fn needs_correction(current: f64, target: u8) -> bool {
    (current - f64::from(target)).abs() > TOLERANCE_PERCENT
}

/// Run one enforcement pass.
///
/// Targets are handled independently; a failure on one never stops the
/// others.
pub fn enforce<G: DeviceGateway + ?Sized>(config: &Configuration, gateway: &G) -> EnforcementReport {
    let outcomes = config
        .targets
        .iter()
        .map(|target| (target.device_id.clone(), enforce_target(target, gateway)))
        .collect();

    let report = EnforcementReport { outcomes };
    debug!(
        targets = config.targets.len(),
        corrected = report.corrected(),
        skipped = report.skipped(),
        failed = report.failed(),
        "Enforcement pass complete"
    );
    report
}

fn enforce_target<G: DeviceGateway + ?Sized>(target: &Target, gateway: &G) -> TargetOutcome {
    let volume = clamp_volume(target.volume);

    let Ok(id) = target.device_id.parse::<DeviceId>() else {
        warn!(device_id = %target.device_id, "Skipping target with invalid device id");
        return TargetOutcome::InvalidId;
    };

    let reading = match gateway.get_active_device(&id) {
        Ok(Some(reading)) if reading.is_active_capture() => reading,
        Ok(_) => {
            debug!(device_id = %id, "Device unavailable, skipping");
            return TargetOutcome::Unavailable;
        }
        Err(e) => {
            warn!(device_id = %id, error = %e, "Failed to read device volume");
            return TargetOutcome::Failed(e.to_string());
        }
    };

    let current = reading.volume_percent;
    if !needs_correction(current, volume) {
        return TargetOutcome::WithinTolerance;
    }

    match gateway.set_device_volume(&id, volume) {
        Ok(()) => {
            info!(device_id = %id, current, volume, "Corrected device volume");
            TargetOutcome::Corrected {
                from: current,
                to: volume,
            }
        }
        Err(e) => {
            warn!(device_id = %id, volume, error = %e, "Failed to set device volume");
            TargetOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{DeviceState, DeviceType, MemoryGateway, SimulatedDevice};

    const MIC_X: &str = "8c9d1f0e-2b3a-4c5d-9e8f-0a1b2c3d4e5f";
    const MIC_Y: &str = "11111111-2222-3333-4444-555555555555";

    fn id(text: &str) -> DeviceId {
        text.parse().unwrap()
    }

    fn config(targets: Vec<Target>) -> Configuration {
        Configuration {
            targets,
            ..Configuration::default()
        }
    }

    #[test]
    fn test_corrects_drifted_volume_then_goes_quiet() {
        let gateway = MemoryGateway::new(vec![SimulatedDevice::microphone(id(MIC_X), "X", 60.0)]);
        let config = config(vec![Target::new(MIC_X, "X", 80)]);

        let report = enforce(&config, &gateway);
        assert_eq!(
            report.outcomes,
            vec![(MIC_X.to_string(), TargetOutcome::Corrected { from: 60.0, to: 80 })]
        );
        assert_eq!(gateway.writes(), vec![(id(MIC_X), 80)]);

        gateway.set_external_volume(&id(MIC_X), 80.0);
        let report = enforce(&config, &gateway);
        assert_eq!(report.corrected(), 0);
        assert_eq!(gateway.writes().len(), 1);
    }

    #[test]
    fn test_tolerance_band_boundaries() {
        assert!(!needs_correction(80.0, 80));
        assert!(!needs_correction(80.5, 80));
        assert!(!needs_correction(79.5, 80));
        assert!(needs_correction(80.51, 80));
        assert!(needs_correction(79.49, 80));
    }

    #[test]
    fn test_writes_iff_outside_tolerance_across_domain() {
        for target in (0..=100).step_by(10) {
            for current in [0.0, 0.4, 25.0, 49.6, 50.0, 50.5, 50.6, 99.5, 100.0] {
                let gateway =
                    MemoryGateway::new(vec![SimulatedDevice::microphone(id(MIC_X), "X", current)]);
                enforce(&config(vec![Target::new(MIC_X, "X", target)]), &gateway);

                let expected = (current - f64::from(target)).abs() > 0.5;
                assert_eq!(
                    !gateway.writes().is_empty(),
                    expected,
                    "current={} target={}",
                    current,
                    target
                );
            }
        }
    }

    #[test]
    fn test_out_of_range_volume_is_clamped() {
        let gateway = MemoryGateway::new(vec![
            SimulatedDevice::microphone(id(MIC_X), "X", 50.0),
            SimulatedDevice::microphone(id(MIC_Y), "Y", 50.0),
        ]);
        enforce(
            &config(vec![Target::new(MIC_X, "X", 150), Target::new(MIC_Y, "Y", -20)]),
            &gateway,
        );

        assert_eq!(gateway.writes(), vec![(id(MIC_X), 100), (id(MIC_Y), 0)]);
    }

    #[test]
    fn test_idempotent_without_external_change() {
        let gateway = MemoryGateway::new(vec![
            SimulatedDevice::microphone(id(MIC_X), "X", 10.0),
            SimulatedDevice::microphone(id(MIC_Y), "Y", 42.2),
        ]);
        let config = config(vec![Target::new(MIC_X, "X", 65), Target::new(MIC_Y, "Y", 42)]);

        enforce(&config, &gateway);
        enforce(&config, &gateway);

        assert_eq!(gateway.writes(), vec![(id(MIC_X), 65)]);
    }

    #[test]
    fn test_invalid_id_and_missing_devices_are_skipped() {
        let mut speaker = SimulatedDevice::microphone(id(MIC_Y), "Speakers", 10.0);
        speaker.device_type = DeviceType::Render;
        let gateway = MemoryGateway::new(vec![speaker]);

        let report = enforce(
            &config(vec![
                Target::new("not-a-guid", "Broken", 50),
                Target::new(MIC_X, "Unplugged", 50),
                Target::new(MIC_Y, "Speakers", 50),
            ]),
            &gateway,
        );

        let outcomes: Vec<_> = report.outcomes.into_iter().map(|(_, o)| o).collect();
        assert_eq!(
            outcomes,
            vec![
                TargetOutcome::InvalidId,
                TargetOutcome::Unavailable,
                TargetOutcome::Unavailable
            ]
        );
        assert!(gateway.writes().is_empty());
    }

    #[test]
    fn test_inactive_device_is_skipped() {
        let gateway = MemoryGateway::new(vec![SimulatedDevice::microphone(id(MIC_X), "X", 10.0)]);
        gateway.set_state(&id(MIC_X), DeviceState::Unplugged);

        let report = enforce(&config(vec![Target::new(MIC_X, "X", 90)]), &gateway);
        assert_eq!(report.skipped(), 1);
        assert!(gateway.writes().is_empty());
    }

    #[test]
    fn test_failure_on_one_target_does_not_stop_others() {
        let gateway = MemoryGateway::new(vec![
            SimulatedDevice::microphone(id(MIC_X), "X", 10.0),
            SimulatedDevice::microphone(id(MIC_Y), "Y", 10.0),
        ]);
        gateway.fail_device(id(MIC_X));

        let report = enforce(
            &config(vec![Target::new(MIC_X, "X", 70), Target::new(MIC_Y, "Y", 70)]),
            &gateway,
        );

        assert_eq!(report.failed(), 1);
        assert_eq!(report.corrected(), 1);
        assert_eq!(gateway.writes(), vec![(id(MIC_Y), 70)]);
    }

    #[test]
    fn test_braced_id_matches_device() {
        let gateway = MemoryGateway::new(vec![SimulatedDevice::microphone(id(MIC_X), "X", 0.0)]);
        let braced = format!("{{{}}}", MIC_X.to_uppercase());

        enforce(&config(vec![Target::new(braced, "X", 30)]), &gateway);
        assert_eq!(gateway.writes(), vec![(id(MIC_X), 30)]);
    }
}
