//! Engine-level unit tests.

use super::Feed;
use crate::presets::volkswagen::*;
use crate::*;

fn tsk06(status: u8) -> [u8; 8] {
    [0, 0, 0, status & 0x07, 0, 0, 0, 0]
}

fn esp05(brake: bool) -> [u8; 8] {
    [0, 0, 0, if brake { 0x04 } else { 0 }, 0, 0, 0, 0]
}

fn esp19(speed: u16) -> [u8; 8] {
    let [low, high] = speed.to_le_bytes();
    [low, high, low, high, low, high, low, high]
}

fn motor20(gas: u8) -> [u8; 8] {
    [0, (gas & 0x0F) << 4, gas >> 4, 0, 0, 0, 0, 0]
}

fn hca01(torque: i16) -> [u8; 8] {
    let magnitude = torque.unsigned_abs();
    let [low, high] = magnitude.to_le_bytes();
    let sign = if torque < 0 { 0x80 } else { 0 };
    [0, 0, low, (high & 0x3F) | sign, 0, 0, 0, 0]
}

struct Rig {
    engine: SafetyEngine,
    config: VehicleConfig,
    feed: Feed,
}

impl Rig {
    fn new(config: VehicleConfig) -> SafetyResult<Self> {
        Ok(Self {
            engine: SafetyEngine::new(config.clone())?,
            config,
            feed: Feed::default(),
        })
    }

    fn mqb() -> SafetyResult<Self> {
        Self::new(VehicleConfig::volkswagen_mqb()?)
    }

    fn rx(&mut self, id: u32, data: [u8; 8]) -> ValidityOutcome {
        let frame = self.feed.frame(&self.config, id, data);
        self.engine.process_received(&frame)
    }

    fn engage(&mut self) {
        assert!(self.rx(TSK_06, tsk06(2)).is_valid());
        assert!(self.rx(TSK_06, tsk06(3)).is_valid());
        assert!(self.engine.controls_allowed());
    }
}

#[test]
fn test_engine_starts_safe() -> SafetyResult<()> {
    let rig = Rig::mqb()?;
    assert!(!rig.engine.controls_allowed());
    assert_eq!(rig.engine.actuation_state(), ActuationState::default());
    assert_eq!(rig.engine.relay_malfunction(), None);
    assert_eq!(rig.engine.now(), 0);
    Ok(())
}

#[test]
fn test_new_rejects_invalid_config() -> SafetyResult<()> {
    let mut config = VehicleConfig::volkswagen_mqb()?;
    config.engagement.max_consecutive_invalid = 0;
    let err = SafetyEngine::new(config).err();
    assert!(err.is_some_and(|e| e.is_config_error()));
    Ok(())
}

#[test]
fn test_rate_up_scenario() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    rig.engine.set_controls_allowed(true);
    assert_eq!(rig.engine.evaluate_outbound(HCA_01, 0, 4), TxVerdict::Accept);

    let mut rig = Rig::mqb()?;
    rig.engine.set_controls_allowed(true);
    assert_eq!(
        rig.engine.evaluate_outbound(HCA_01, 0, 5),
        TxVerdict::Reject(RejectReason::Actuation(ActuationViolation::RateUpExceeded))
    );
    Ok(())
}

#[test]
fn test_driver_override_scenario() -> SafetyResult<()> {
    let limits = SteeringLimits::volkswagen_mxb();
    let mut rig = Rig::mqb()?;
    rig.engine.set_controls_allowed(true);
    rig.engine.set_desired_value_last(limits.max_value);
    rig.engine.set_realtime_value_last(limits.max_value);

    let opposing = -(limits.driver_torque_allowance + 1);
    rig.engine.set_driver_torque(opposing, opposing);
    assert!(matches!(
        rig.engine.evaluate_outbound(HCA_01, 0, limits.max_value),
        TxVerdict::Reject(RejectReason::Actuation(ActuationViolation::DriverOverride { .. }))
    ));

    let at_allowance = -limits.driver_torque_allowance;
    rig.engine.set_driver_torque(at_allowance, at_allowance);
    assert!(rig.engine.evaluate_outbound(HCA_01, 0, limits.max_value).is_accepted());
    Ok(())
}

#[test]
fn test_brake_at_standstill_keeps_engagement() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    rig.engage();
    assert!(rig.rx(ESP_19, esp19(0)).is_valid());
    assert!(rig.rx(ESP_05, esp05(true)).is_valid());
    assert!(rig.engine.vehicle_state().brake_pressed);
    assert!(rig.engine.controls_allowed());

    // Vehicle starts rolling with the brake still pressed.
    assert!(rig.rx(ESP_19, esp19(100)).is_valid());
    assert!(!rig.engine.vehicle_state().standstill);
    assert!(!rig.engine.controls_allowed());
    Ok(())
}

#[test]
fn test_brake_while_moving_disengages() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    rig.engage();
    assert!(rig.rx(ESP_19, esp19(100)).is_valid());
    assert!(rig.engine.controls_allowed());
    assert!(rig.rx(ESP_05, esp05(true)).is_valid());
    assert!(!rig.engine.controls_allowed());
    Ok(())
}

#[test]
fn test_gas_edge_disengages() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    rig.engage();
    assert!(rig.rx(MOTOR_20, motor20(0x40)).is_valid());
    assert!(rig.engine.vehicle_state().gas_pressed);
    assert!(!rig.engine.controls_allowed());
    assert!(!rig.engine.longitudinal_allowed());
    Ok(())
}

#[test]
fn test_cancel_button_disengages() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    rig.engage();
    // Buttons are not integrity checked on MQB, but still update state.
    let outcome = rig.rx(GRA_ACC_01, [0, 0x20, 0, 0, 0, 0, 0, 0]);
    assert_eq!(outcome, ValidityOutcome::Untracked);
    assert!(!rig.engine.controls_allowed());
    Ok(())
}

#[test]
fn test_sustained_counter_failure_disengages() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    rig.engage();
    let max = rig.config.engagement.max_consecutive_invalid;

    // Counter stuck at a wrong value.
    let stuck = super::sealed(&rig.config, 0, TSK_06, tsk06(3), 9);
    for _ in 0..max {
        assert!(!rig.engine.process_received(&stuck).is_valid());
    }
    assert!(!rig.engine.controls_allowed());

    // The next in-sequence frame is valid but does not re-engage.
    let next = super::sealed(&rig.config, 0, TSK_06, tsk06(3), 10);
    assert!(rig.engine.process_received(&next).is_valid());
    assert!(!rig.engine.controls_allowed());
    Ok(())
}

#[test]
fn test_transient_corruption_tolerated() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    rig.engage();
    let sealed = super::sealed(&rig.config, 0, TSK_06, tsk06(3), 2);
    let mut data = [0u8; 8];
    data.copy_from_slice(sealed.data());
    if let Some(checksum) = data.first_mut() {
        *checksum ^= 0xFF;
    }
    let corrupted = CanFrame::classic(0, TSK_06, data);
    assert!(matches!(
        rig.engine.process_received(&corrupted),
        ValidityOutcome::Invalid(IntegrityFault::Checksum { .. })
    ));
    assert!(rig.engine.controls_allowed());
    Ok(())
}

#[test]
fn test_relay_timeout_scenario() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    rig.engage();
    assert!(rig.engine.evaluate_outbound(HCA_01, 0, 0).is_accepted());

    rig.engine.tick(500_001);
    assert!(matches!(
        rig.engine.relay_malfunction(),
        Some(RelayFault::EchoTimeout { .. })
    ));
    assert!(!rig.engine.controls_allowed());

    // Nothing brings it back short of a reset.
    assert!(rig.rx(TSK_06, tsk06(2)).is_valid());
    assert!(rig.rx(TSK_06, tsk06(3)).is_valid());
    assert!(!rig.engine.controls_allowed());
    assert_eq!(
        rig.engine.evaluate_outbound(HCA_01, 0, 0),
        TxVerdict::Reject(RejectReason::RelayMalfunction)
    );
    let frame = CanFrame::classic(0, ESP_19, [0; 8]);
    assert_eq!(rig.engine.should_forward(&frame, 0), None);

    rig.engine.reset();
    assert_eq!(rig.engine.relay_malfunction(), None);
    assert_eq!(rig.engine.should_forward(&frame, 0), Some(2));
    Ok(())
}

#[test]
fn test_relay_echo_keeps_engagement() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    rig.engage();
    assert!(rig.engine.evaluate_outbound(HCA_01, 0, 0).is_accepted());
    let echo = CanFrame::classic(LOOPBACK_BUS_FLAG, HCA_01, hca01(0));
    assert_eq!(rig.engine.process_received(&echo), ValidityOutcome::Untracked);
    rig.engine.tick(10_000_000);
    assert_eq!(rig.engine.relay_malfunction(), None);
    Ok(())
}

#[test]
fn test_stock_steering_on_vehicle_bus_latches_relay() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    rig.engage();
    let stock = CanFrame::classic(0, HCA_01, hca01(50));
    assert_eq!(rig.engine.process_received(&stock), ValidityOutcome::Untracked);
    assert_eq!(
        rig.engine.relay_malfunction(),
        Some(RelayFault::SeenOnFaultBus { bus: 0 })
    );
    assert!(!rig.engine.controls_allowed());
    Ok(())
}

#[test]
fn test_lagging_identifier_disengages() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    rig.engage();
    rig.engine.tick(20_000 * 10);
    assert!(rig.engine.controls_allowed());
    rig.engine.tick(20_000 * 10 + 1);
    assert!(!rig.engine.controls_allowed());
    Ok(())
}

#[test]
fn test_tick_never_moves_backwards() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    rig.engine.tick(1_000);
    rig.engine.tick(10);
    assert_eq!(rig.engine.now(), 1_000);
    Ok(())
}

#[test]
fn test_not_whitelisted() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    rig.engine.set_controls_allowed(true);
    assert_eq!(
        rig.engine.evaluate_outbound(HCA_01, 2, 0),
        TxVerdict::Reject(RejectReason::NotWhitelisted)
    );
    assert_eq!(
        rig.engine.evaluate_outbound(0x7FF, 0, 0),
        TxVerdict::Reject(RejectReason::NotWhitelisted)
    );
    Ok(())
}

#[test]
fn test_evaluate_frame_decodes_torque() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    rig.engine.set_controls_allowed(true);
    let frame = CanFrame::classic(0, HCA_01, hca01(-4));
    assert!(rig.engine.evaluate_frame(&frame).is_accepted());
    assert_eq!(rig.engine.actuation_state().desired_value_last, -4);

    let frame = CanFrame::classic(0, HCA_01, hca01(-9));
    assert!(!rig.engine.evaluate_frame(&frame).is_accepted());
    assert_eq!(rig.engine.actuation_state().desired_value_last, -4);

    let short = CanFrame::new(0, HCA_01, &[0, 0])?;
    assert_eq!(
        rig.engine.evaluate_frame(&short),
        TxVerdict::Reject(RejectReason::Malformed)
    );
    Ok(())
}

#[test]
fn test_force_cancel_buttons() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    let cancel = CanFrame::classic(2, GRA_ACC_01, [0, 0x20, 0, 0, 0, 0, 0, 0]);
    assert!(rig.engine.evaluate_frame(&cancel).is_accepted());
    let resume = CanFrame::classic(2, GRA_ACC_01, [0, 0, 0x08, 0, 0, 0, 0, 0]);
    assert_eq!(
        rig.engine.evaluate_frame(&resume),
        TxVerdict::Reject(RejectReason::Actuation(ActuationViolation::ForceCancel))
    );
    rig.engine.set_controls_allowed(true);
    assert!(rig.engine.evaluate_frame(&resume).is_accepted());
    Ok(())
}

#[test]
fn test_mqb_forwarding() -> SafetyResult<()> {
    let rig = Rig::mqb()?;
    let route = |bus: u8, id: u32| rig.engine.should_forward(&CanFrame::classic(bus, id, [0; 8]), bus);
    assert_eq!(route(0, HCA_01), Some(2));
    assert_eq!(route(0, ESP_19), Some(2));
    assert_eq!(route(2, HCA_01), None);
    assert_eq!(route(2, LDW_02), None);
    assert_eq!(route(2, ACC_02), Some(0));
    assert_eq!(route(1, ESP_19), None);
    Ok(())
}

#[test]
fn test_longitudinal_button_engagement() -> SafetyResult<()> {
    let mut rig = Rig::new(VehicleConfig::volkswagen_mqb_longitudinal()?)?;
    assert!(rig.rx(TSK_06, tsk06(2)).is_valid());
    assert_eq!(rig.rx(GRA_ACC_01, [0, 0, 0x01, 0, 0, 0, 0, 0]), ValidityOutcome::Untracked);
    assert!(!rig.engine.controls_allowed());
    assert_eq!(rig.rx(GRA_ACC_01, [0; 8]), ValidityOutcome::Untracked);
    assert!(rig.engine.controls_allowed());
    assert!(rig.engine.longitudinal_allowed());

    // Acceleration inside the envelope.
    assert!(rig.engine.evaluate_outbound(ACC_06, 0, 1000).is_accepted());
    assert_eq!(
        rig.engine.evaluate_outbound(ACC_06, 0, 2005),
        TxVerdict::Reject(RejectReason::Actuation(ActuationViolation::AccelOutOfRange))
    );

    // Main switch off.
    assert!(rig.rx(TSK_06, tsk06(0)).is_valid());
    assert!(!rig.engine.controls_allowed());
    assert_eq!(
        rig.engine.evaluate_outbound(ACC_06, 0, 1000),
        TxVerdict::Reject(RejectReason::Actuation(ActuationViolation::LongitudinalNotAllowed))
    );
    assert!(rig.engine.evaluate_outbound(ACC_06, 0, 3010).is_accepted());
    Ok(())
}

#[test]
fn test_pinned_secondary_accel() -> SafetyResult<()> {
    let config = VehicleConfig::volkswagen_mqb_longitudinal()?;
    let mut engine = SafetyEngine::new(config.clone())?;
    let rule = config.tx_rule(ACC_07, 0).copied();
    let (Some(value), Some(pinned)) = (rule.and_then(|r| r.value), rule.and_then(|r| r.pinned)) else {
        return Err(SafetyError::invalid_config("test", "ACC_07 rule missing"));
    };

    let mut data = [0u8; 8];
    assert_eq!(value.encode(&mut data, 3010), Some(()));
    assert_eq!(pinned.value.encode(&mut data, 3020), Some(()));
    assert!(engine.evaluate_frame(&CanFrame::classic(0, ACC_07, data)).is_accepted());

    assert_eq!(pinned.value.encode(&mut data, 2990), Some(()));
    assert_eq!(
        engine.evaluate_frame(&CanFrame::classic(0, ACC_07, data)),
        TxVerdict::Reject(RejectReason::PinnedSignal { found: Some(2990) })
    );
    Ok(())
}

#[test]
fn test_reset_is_idempotent() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    rig.engage();
    assert!(rig.rx(ESP_19, esp19(40)).is_valid());
    assert!(rig.engine.evaluate_outbound(HCA_01, 0, 4).is_accepted());

    rig.engine.reset();
    let once = format!("{:?}", rig.engine);
    rig.engine.reset();
    let twice = format!("{:?}", rig.engine);
    assert_eq!(once, twice);

    let fresh = SafetyEngine::new(rig.config.clone())?;
    assert_eq!(rig.engine.vehicle_state(), fresh.vehicle_state());
    assert_eq!(rig.engine.actuation_state(), fresh.actuation_state());
    assert!(!rig.engine.controls_allowed());
    Ok(())
}

#[test]
fn test_set_expected_counter_back_door() -> SafetyResult<()> {
    let mut rig = Rig::mqb()?;
    assert!(rig.engine.set_expected_counter(TSK_06, 0, 7));
    assert!(!rig.engine.set_expected_counter(0x7FF, 0, 7));
    let frame = super::sealed(&rig.config, 0, TSK_06, tsk06(2), 7);
    assert!(rig.engine.process_received(&frame).is_valid());
    Ok(())
}
