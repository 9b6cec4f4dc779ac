//! End-to-end scenarios against the Volkswagen presets.
//!
//! Each test drives a complete engine through frames as they would arrive
//! from the vehicle, with in-sequence counters and checksums:
//! - Steering ramp-up, hold and release
//! - Driver override and pedal disengagement
//! - Integrity faults, lag and relay malfunction
//! - Longitudinal control on the gateway-longitudinal preset

use cangate_safety::presets::volkswagen::*;
use cangate_safety::prelude::*;
use cangate_safety::LOOPBACK_BUS_FLAG;
use cangate_test_helpers::prelude::*;

const PERIOD: u64 = 20_000;

/// Keep every rx-checked MQB identifier fresh for one period.
fn heartbeat(scenario: &mut Scenario, cruise: u8) {
    scenario.rx(ESP_19, vw::wheel_speeds(2000));
    scenario.rx(LH_EPS_03, vw::driver_torque(0));
    scenario.rx(ESP_05, vw::brake_pressure(false));
    scenario.rx(TSK_06, vw::cruise_status(cruise));
    scenario.rx(MOTOR_20, vw::accelerator(0));
    scenario.rx(MOTOR_14, vw::brake_switch(false));
    scenario.advance(PERIOD);
}

#[test]
fn test_steering_ramp_hold_and_release() -> SafetyResult<()> {
    let mut scenario = Scenario::preset(Preset::VolkswagenMqb)?;
    heartbeat(&mut scenario, tsk_status::STANDBY);
    heartbeat(&mut scenario, tsk_status::ACTIVE);
    assert!(scenario.engine().controls_allowed());

    let limits = SteeringLimits::volkswagen_mxb();
    let mut torque = 0i16;
    for _ in 0..60 {
        torque = (torque + 4).min(300);
        assert_accepted!(scenario.steer(torque), "ramp to {torque}");
        heartbeat(&mut scenario, tsk_status::ACTIVE);
    }
    assert_eq!(torque, 240);
    assert_in_range!(
        scenario.engine().actuation_state().desired_value_last,
        0,
        limits.max_value
    );

    // Release faster than the ramp-up.
    while torque > 0 {
        torque = (torque - 10).max(0);
        assert_accepted!(scenario.steer(torque), "release to {torque}");
        heartbeat(&mut scenario, tsk_status::ACTIVE);
    }
    assert_eq!(scenario.engine().relay_malfunction(), None);
    assert!(scenario.engine().controls_allowed());
    Ok(())
}

#[test]
fn test_rate_up_rejection_keeps_last_value() -> SafetyResult<()> {
    let mut scenario = Scenario::preset(Preset::VolkswagenMqb)?;
    assert!(scenario.engage_stock());
    assert_accepted!(scenario.steer(4));
    assert_rejected!(
        scenario.steer(9),
        RejectReason::Actuation(ActuationViolation::RateUpExceeded)
    );
    assert_eq!(scenario.engine().actuation_state().desired_value_last, 4);
    assert_accepted!(scenario.steer(8));
    Ok(())
}

#[test]
fn test_driver_override_shrinks_limit() -> SafetyResult<()> {
    let mut scenario = Scenario::preset(Preset::VolkswagenMqb)?;
    assert!(scenario.engage_stock());
    scenario.engine_mut().set_desired_value_last(300);
    scenario.engine_mut().set_realtime_value_last(300);

    // Seven samples flush the neutral reading out of the window.
    for _ in 0..7 {
        scenario.rx(LH_EPS_03, vw::driver_torque(-81));
    }
    assert_eq!(scenario.engine().vehicle_state().driver_torque_max(), -81);
    assert_rejected!(
        scenario.steer(300),
        RejectReason::Actuation(ActuationViolation::DriverOverride { limit: 297 })
    );
    assert_accepted!(scenario.steer(297));
    Ok(())
}

#[test]
fn test_gas_press_disengages_and_blocks_steering() -> SafetyResult<()> {
    let mut scenario = Scenario::preset(Preset::VolkswagenMqb)?;
    assert!(scenario.engage_stock());
    assert_accepted!(scenario.steer(4));

    scenario.rx(MOTOR_20, vw::accelerator(30));
    assert!(!scenario.engine().controls_allowed());
    assert_rejected!(
        scenario.steer(8),
        RejectReason::Actuation(ActuationViolation::NotAllowed)
    );
    // Winding down is always allowed.
    assert_accepted!(scenario.steer(2));
    assert_accepted!(scenario.steer(0));
    Ok(())
}

/// Engage on stock cruise and ramp steering up to `target` at the up rate.
fn engage_and_ramp(scenario: &mut Scenario, target: i16) {
    heartbeat(scenario, tsk_status::STANDBY);
    heartbeat(scenario, tsk_status::ACTIVE);
    let mut torque = 0i16;
    while torque < target {
        torque = (torque + 4).min(target);
        assert_accepted!(scenario.steer(torque), "ramp to {torque}");
        heartbeat(scenario, tsk_status::ACTIVE);
    }
}

#[test]
fn test_torque_cannot_be_held_after_brake() -> SafetyResult<()> {
    let mut scenario = Scenario::preset(Preset::VolkswagenMqb)?;
    engage_and_ramp(&mut scenario, 100);

    scenario.rx(MOTOR_14, vw::brake_switch(true));
    assert!(!scenario.engine().controls_allowed());
    assert_rejected!(
        scenario.steer(100),
        RejectReason::Actuation(ActuationViolation::NotAllowed)
    );

    // Each request has to move closer to zero.
    assert_accepted!(scenario.steer(96));
    assert_rejected!(
        scenario.steer(96),
        RejectReason::Actuation(ActuationViolation::NotAllowed)
    );
    assert_accepted!(scenario.steer(0));
    assert_accepted!(scenario.steer(0));
    Ok(())
}

#[test]
fn test_reengage_starts_from_neutral() -> SafetyResult<()> {
    let mut scenario = Scenario::preset(Preset::VolkswagenMqb)?;
    engage_and_ramp(&mut scenario, 100);

    for _ in 0..100 {
        heartbeat(&mut scenario, tsk_status::STANDBY);
    }
    assert!(!scenario.engine().controls_allowed());
    heartbeat(&mut scenario, tsk_status::ACTIVE);
    assert!(scenario.engine().controls_allowed());
    assert_eq!(scenario.engine().actuation_state().desired_value_last, 0);
    assert_eq!(scenario.engine().actuation_state().realtime_value_last, 0);

    assert_rejected!(
        scenario.steer(100),
        RejectReason::Actuation(ActuationViolation::RateUpExceeded)
    );
    assert_accepted!(scenario.steer(4));
    Ok(())
}

#[test]
fn test_gas_disengage_can_be_disabled() -> SafetyResult<()> {
    let mut config = VehicleConfig::volkswagen_mqb()?;
    config.alternative_experience.disable_disengage_on_gas = true;
    let mut scenario = Scenario::new(config)?;
    assert!(scenario.engage_stock());
    scenario.rx(MOTOR_20, vw::accelerator(30));
    assert!(scenario.engine().controls_allowed());
    Ok(())
}

#[test]
fn test_brake_switch_while_moving() -> SafetyResult<()> {
    let mut scenario = Scenario::preset(Preset::VolkswagenMqb)?;
    assert!(scenario.engage_stock());
    scenario.rx(ESP_19, vw::wheel_speeds(500));
    scenario.rx(MOTOR_14, vw::brake_switch(true));
    assert!(!scenario.engine().controls_allowed());
    assert!(scenario.engine().vehicle_state().brake_pressed);

    // Brake released: the other source alone keeps it pressed.
    scenario.rx(ESP_05, vw::brake_pressure(true));
    scenario.rx(MOTOR_14, vw::brake_switch(false));
    assert!(scenario.engine().vehicle_state().brake_pressed);
    Ok(())
}

#[test]
fn test_corrupted_frames_disengage_after_streak() -> SafetyResult<()> {
    let mut scenario = Scenario::preset(Preset::VolkswagenMqb)?;
    assert!(scenario.engage_stock());

    for streak in 1..=5 {
        let frame = scenario
            .packer_mut()
            .corrupted(VEHICLE_BUS, ESP_05, vw::brake_pressure(false));
        assert!(!scenario.rx_frame(&frame).is_trusted());
        assert_eq!(scenario.engine().controls_allowed(), streak < 5);
    }
    let state = must_some(scenario.engine().integrity().state(ESP_05, VEHICLE_BUS), "tracked");
    assert_eq!(state.consecutive_mismatches, 5);

    // Checksum failures never advanced the expected counter, so the first
    // good frame resyncs and the second one ends the streak.
    assert!(matches!(
        scenario.rx(ESP_05, vw::brake_pressure(false)),
        ValidityOutcome::Invalid(IntegrityFault::Counter { expected: 0, observed: 5 })
    ));
    assert!(scenario.rx(ESP_05, vw::brake_pressure(false)).is_valid());
    assert!(!scenario.engine().controls_allowed());

    // Engagement needs a new rising edge.
    scenario.rx(TSK_06, vw::cruise_status(tsk_status::STANDBY));
    scenario.rx(TSK_06, vw::cruise_status(tsk_status::ACTIVE));
    assert!(scenario.engine().controls_allowed());
    Ok(())
}

#[test]
fn test_engage_refused_while_lagging() -> SafetyResult<()> {
    let mut scenario = Scenario::preset(Preset::VolkswagenMqb)?;
    heartbeat(&mut scenario, tsk_status::STANDBY);

    // Wheel speeds stop; everything else keeps arriving.
    for _ in 0..12 {
        scenario.rx(ESP_05, vw::brake_pressure(false));
        scenario.rx(MOTOR_20, vw::accelerator(0));
        scenario.rx(TSK_06, vw::cruise_status(tsk_status::STANDBY));
        scenario.advance(PERIOD);
    }
    scenario.rx(TSK_06, vw::cruise_status(tsk_status::ACTIVE));
    assert!(!scenario.engine().controls_allowed());
    Ok(())
}

#[test]
fn test_missing_echo_latches_relay() -> SafetyResult<()> {
    let mut scenario = Scenario::preset(Preset::VolkswagenMqb)?.without_echo();
    assert!(scenario.engage_stock());
    assert_accepted!(scenario.steer(0));
    scenario.advance(100_000);
    scenario.rx(TSK_06, vw::cruise_status(tsk_status::ACTIVE));
    assert_eq!(scenario.engine().relay_malfunction(), None);

    scenario.advance(400_001);
    assert!(matches!(
        scenario.engine().relay_malfunction(),
        Some(RelayFault::EchoTimeout { waited: 500_001 })
    ));
    assert_eq!(scenario.engine().engagement_state(), EngagementState::Disengaged);
    assert_rejected!(scenario.steer(0), RejectReason::RelayMalfunction);

    let frame = CanFrame::classic(VEHICLE_BUS, ESP_19, [0; 8]);
    assert_eq!(scenario.engine().should_forward(&frame, VEHICLE_BUS), None);
    Ok(())
}

#[test]
fn test_echo_keeps_relay_healthy() -> SafetyResult<()> {
    let mut scenario = Scenario::preset(Preset::VolkswagenMqb)?;
    heartbeat(&mut scenario, tsk_status::STANDBY);
    heartbeat(&mut scenario, tsk_status::ACTIVE);
    for _ in 0..50 {
        assert_accepted!(scenario.steer(0));
        heartbeat(&mut scenario, tsk_status::ACTIVE);
    }
    assert_eq!(scenario.engine().relay_malfunction(), None);
    assert!(scenario.engine().controls_allowed());
    Ok(())
}

#[test]
fn test_stock_camera_on_vehicle_bus() -> SafetyResult<()> {
    let mut scenario = Scenario::preset(Preset::VolkswagenMqb)?;
    assert!(scenario.engage_stock());
    let stock = CanFrame::classic(VEHICLE_BUS, HCA_01, vw::steering_request(12));
    scenario.rx_frame(&stock);
    assert_eq!(
        scenario.engine().relay_malfunction(),
        Some(RelayFault::SeenOnFaultBus { bus: VEHICLE_BUS })
    );

    // Echoes and resets are the only ways out; an echo does not clear it.
    let echo = CanFrame::classic(LOOPBACK_BUS_FLAG, HCA_01, vw::steering_request(0));
    scenario.rx_frame(&echo);
    assert!(scenario.engine().relay_malfunction().is_some());
    scenario.engine_mut().reset();
    assert!(scenario.engine().relay_malfunction().is_none());
    Ok(())
}

#[test]
fn test_longitudinal_preset() -> SafetyResult<()> {
    let mut scenario = Scenario::preset(Preset::VolkswagenMqbLongitudinal)?;
    scenario.rx(TSK_06, vw::cruise_status(tsk_status::STANDBY));

    // Stock cruise state alone does not engage this preset.
    scenario.rx(TSK_06, vw::cruise_status(tsk_status::ACTIVE));
    assert!(!scenario.engine().controls_allowed());

    let resume = Buttons {
        resume: true,
        ..Buttons::RELEASED
    };
    scenario.rx(GRA_ACC_01, resume.payload());
    scenario.rx(GRA_ACC_01, Buttons::RELEASED.payload());
    assert!(scenario.engine().controls_allowed());
    assert!(scenario.engine().longitudinal_allowed());

    assert_accepted!(scenario.engine_mut().evaluate_outbound(ACC_06, VEHICLE_BUS, -3500));
    assert_rejected!(
        scenario.engine_mut().evaluate_outbound(ACC_06, VEHICLE_BUS, -3505),
        RejectReason::Actuation(ActuationViolation::AccelOutOfRange)
    );

    let cancel = Buttons {
        cancel: true,
        ..Buttons::RELEASED
    };
    scenario.rx(GRA_ACC_01, cancel.payload());
    assert!(!scenario.engine().controls_allowed());
    assert_rejected!(
        scenario.engine_mut().evaluate_outbound(ACC_06, VEHICLE_BUS, 0),
        RejectReason::Actuation(ActuationViolation::LongitudinalNotAllowed)
    );
    Ok(())
}

#[test]
fn test_cancel_held_blocks_engagement() -> SafetyResult<()> {
    let mut scenario = Scenario::preset(Preset::VolkswagenMqbLongitudinal)?;
    scenario.rx(TSK_06, vw::cruise_status(tsk_status::STANDBY));
    let set_and_cancel = Buttons {
        cancel: true,
        set: true,
        resume: false,
    };
    scenario.rx(GRA_ACC_01, set_and_cancel.payload());
    scenario.rx(
        GRA_ACC_01,
        Buttons {
            cancel: true,
            ..Buttons::RELEASED
        }
        .payload(),
    );
    assert!(!scenario.engine().controls_allowed());
    Ok(())
}

#[test]
fn test_mlb_counter_only_integrity() -> SafetyResult<()> {
    let mut scenario = Scenario::preset(Preset::VolkswagenMlb)?;
    scenario.rx(TSK_02, vw::mlb_cruise(false));
    scenario.rx(TSK_02, vw::mlb_cruise(true));
    assert!(scenario.engine().controls_allowed());

    // Any checksum byte is fine, the counter is what matters.
    assert!(scenario.rx(TSK_02, [0xEE, 0, 1, 0, 0, 0, 0, 0]).is_valid());

    scenario.rx(ESP_03, vw::mlb_wheel_speeds(0x200));
    scenario.rx(MOTOR_03, [0, 0, 0, 0, 0x08, 0, 0, 0]);
    assert!(scenario.engine().vehicle_state().brake_pressed);
    assert!(!scenario.engine().controls_allowed());
    Ok(())
}

#[test]
fn test_disengage_reason_text() {
    assert_eq!(
        DisengageReason::IntegrityFailure { id: ESP_05 }.to_string(),
        "integrity failure on 0x106"
    );
    assert_eq!(
        DisengageReason::RxLagging { id: ESP_19 }.to_string(),
        "0x0b2 stopped arriving"
    );
}
