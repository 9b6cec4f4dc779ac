//! Preset tables, text formats and configuration round trips.

use cangate_safety::presets::volkswagen::*;
use cangate_safety::prelude::*;
use cangate_safety::{ForwardingPolicy, TransmitPolicy};
use cangate_test_helpers::prelude::*;

#[test]
fn test_preset_names() {
    let names: Vec<&str> = Preset::ALL.iter().map(|preset| preset.name()).collect();
    insta::assert_snapshot!(
        names.join("\n"),
        @r"
    volkswagen-mqb
    volkswagen-mqb-long
    volkswagen-mlb
    stellantis
    forward-only
    "
    );
}

#[test]
fn test_whitelists() -> SafetyResult<()> {
    let describe = |config: &VehicleConfig| {
        TransmitPolicy::new(config)
            .rules()
            .iter()
            .map(|rule| format!("{}:{:03X}", rule.bus, rule.id))
            .collect::<Vec<_>>()
            .join(" ")
    };
    insta::assert_snapshot!(describe(&VehicleConfig::volkswagen_mqb()?), @"0:126 0:12B 2:12B 0:397");
    insta::assert_snapshot!(
        describe(&VehicleConfig::volkswagen_mqb_longitudinal()?),
        @"0:126 0:397 0:30C 0:122 0:12E"
    );
    insta::assert_snapshot!(describe(&VehicleConfig::volkswagen_mlb()?), @"0:126 0:10B 2:10B");
    insta::assert_snapshot!(describe(&VehicleConfig::stellantis()?), @"0:0A6 0:0FA 2:0B1");
    insta::assert_snapshot!(describe(&VehicleConfig::forward_only()?), @"");
    Ok(())
}

#[test]
fn test_forward_only_never_transmits() -> SafetyResult<()> {
    let mut engine = SafetyEngine::new(VehicleConfig::forward_only()?)?;
    engine.set_controls_allowed(true);
    assert_rejected!(
        engine.evaluate_outbound(HCA_01, 0, 0),
        RejectReason::NotWhitelisted
    );
    let frame = CanFrame::classic(2, HCA_01, [0; 8]);
    assert_eq!(engine.should_forward(&frame, 2), Some(0));
    assert_eq!(engine.should_forward(&frame.with_bus(0), 0), Some(2));
    assert_eq!(engine.should_forward(&frame.with_bus(1), 1), None);
    Ok(())
}

#[test]
fn test_longitudinal_forwarding_blocks_gateway_messages() -> SafetyResult<()> {
    let policy = ForwardingPolicy::new(&VehicleConfig::volkswagen_mqb_longitudinal()?);
    for id in [HCA_01, LDW_02, ACC_02, ACC_06, ACC_07] {
        assert_eq!(policy.route(2, id), None, "{id:#x}");
    }
    assert_eq!(policy.route(2, GRA_ACC_01), Some(0));
    assert_eq!(policy.route(0, ACC_06), Some(2));
    Ok(())
}

#[test]
fn test_stellantis_forwarding_blocks_camera_messages() -> SafetyResult<()> {
    use cangate_safety::presets::stellantis::*;

    let policy = ForwardingPolicy::new(&VehicleConfig::stellantis()?);
    assert_eq!(policy.route(2, DASM_LKAS), None);
    assert_eq!(policy.route(2, DASM_HUD), None);
    assert_eq!(policy.route(2, ACC_BUTTONS), Some(0));
    assert_eq!(policy.route(0, DASM_LKAS), Some(2));
    assert_eq!(policy.route(1, EPS_2), None);
    Ok(())
}

#[test]
fn test_stellantis_steering_envelope() -> SafetyResult<()> {
    use cangate_safety::presets::stellantis::DASM_LKAS;

    let limits = SteeringLimits::stellantis();
    let mut engine = SafetyEngine::new(VehicleConfig::stellantis()?)?;
    for enabled in [false, true] {
        for torque in -500..500 {
            engine.set_controls_allowed(enabled);
            engine.set_desired_value_last(torque);
            engine.set_realtime_value_last(torque);
            let blocked = torque.abs() > limits.max_value || (!enabled && torque != 0);
            let verdict = engine.evaluate_outbound(DASM_LKAS, 0, torque);
            assert_eq!(verdict.is_accepted(), !blocked, "enabled {enabled}, torque {torque}");
        }
    }

    engine.set_controls_allowed(true);
    for torque in [limits.max_rate_up, -limits.max_rate_up] {
        engine.set_desired_value_last(0);
        engine.set_realtime_value_last(0);
        assert_accepted!(engine.evaluate_outbound(DASM_LKAS, 0, torque));
    }
    engine.set_desired_value_last(0);
    assert_rejected!(
        engine.evaluate_outbound(DASM_LKAS, 0, limits.max_rate_up + 1),
        RejectReason::Actuation(ActuationViolation::RateUpExceeded)
    );
    Ok(())
}

#[test]
fn test_stellantis_cancel_only_while_disengaged() -> SafetyResult<()> {
    use cangate_safety::presets::stellantis::*;

    let mut engine = SafetyEngine::new(VehicleConfig::stellantis()?)?;
    let resume = 0x10;
    let set = 0x04;
    assert_accepted!(engine.evaluate_outbound(ACC_BUTTONS, 2, 0x01));
    for button in [resume, set] {
        assert_rejected!(
            engine.evaluate_outbound(ACC_BUTTONS, 2, button),
            RejectReason::Actuation(ActuationViolation::ForceCancel)
        );
    }
    engine.set_controls_allowed(true);
    assert_accepted!(engine.evaluate_outbound(ACC_BUTTONS, 2, resume));
    Ok(())
}

#[test]
fn test_stellantis_engagement_from_frames() -> SafetyResult<()> {
    use cangate_safety::presets::stellantis::*;

    let wheel_speeds = |raw: u16| {
        let [low, high] = raw.to_le_bytes();
        [low, high, low, high, low, high, low, high]
    };
    let mut scenario = Scenario::preset(Preset::Stellantis)?;
    assert!(scenario.rx(DASM_ACC, [1, 0, 0, 0, 0, 0, 0, 0]).is_valid());
    assert!(scenario.rx(DASM_ACC, [3, 0, 0, 0, 0, 0, 0, 0]).is_valid());
    assert!(scenario.engine().controls_allowed());

    // At the standstill threshold the brake does not disengage.
    scenario.rx(WHEEL_SPEEDS, wheel_speeds(1));
    scenario.rx(ABS_1, [1, 0, 0, 0, 0, 0, 0, 0]);
    assert!(scenario.engine().vehicle_state().standstill);
    assert!(scenario.engine().controls_allowed());

    scenario.rx(WHEEL_SPEEDS, wheel_speeds(2));
    scenario.rx(ABS_1, [1, 0, 0, 0, 0, 0, 0, 0]);
    assert!(!scenario.engine().controls_allowed());

    // Counter-only integrity: a skipped counter is invalid.
    let skipped = CanFrame::classic(0, TPS_1, [0, 0, 0, 0, 0, 0, 0x90, 0]);
    assert!(matches!(
        scenario.rx_frame(&skipped),
        ValidityOutcome::Invalid(IntegrityFault::Counter { .. })
    ));
    Ok(())
}

#[test]
fn test_frame_display() -> SafetyResult<()> {
    let frame = CanFrame::new(2, HCA_01, &[0xDE, 0xAD, 0xBE, 0xEF])?;
    insta::assert_snapshot!(frame.to_string(), @"2:126#DEADBEEF");
    Ok(())
}

#[test]
fn test_reject_reason_text() {
    let reasons = [
        RejectReason::RelayMalfunction,
        RejectReason::NotWhitelisted,
        RejectReason::Malformed,
        RejectReason::PinnedSignal { found: Some(2990) },
        RejectReason::PinnedSignal { found: None },
        RejectReason::Actuation(ActuationViolation::DriverOverride { limit: 297 }),
    ];
    let text: Vec<String> = reasons.iter().map(ToString::to_string).collect();
    insta::assert_snapshot!(text.join("\n"), @r"
    relay malfunction
    not whitelisted
    malformed payload
    pinned signal holds 2990
    pinned signal missing
    driver override, limit 297
    ");
}

#[test]
fn test_verdict_json() -> Result<(), serde_json::Error> {
    let verdict = TxVerdict::Reject(RejectReason::Actuation(ActuationViolation::RateUpExceeded));
    insta::assert_snapshot!(
        serde_json::to_string(&verdict)?,
        @r#"{"verdict":"reject","reason":"actuation","rule":"rate_up_exceeded"}"#
    );
    let fault = RelayFault::EchoTimeout { waited: 500_001 };
    insta::assert_snapshot!(
        serde_json::to_string(&fault)?,
        @r#"{"fault":"echo_timeout","waited":500001}"#
    );
    Ok(())
}

#[test]
fn test_config_json_round_trip() -> TestResult {
    for preset in Preset::ALL {
        let config = preset.config()?;
        let json = serde_json::to_string(&config)?;
        let parsed: VehicleConfig = serde_json::from_str(&json)?;
        assert_eq!(parsed, config, "{preset}");
        parsed.validate()?;
    }
    Ok(())
}

#[test]
fn test_invalid_config_rejected_by_engine() -> SafetyResult<()> {
    let mut config = VehicleConfig::volkswagen_mqb()?;
    if let Some(steering) = config.steering.as_mut() {
        steering.max_rate_up = 0;
    }
    let err = must_some(SafetyEngine::new(config).err(), "invalid limits accepted");
    assert!(err.is_config_error());
    insta::assert_snapshot!(err.to_string(), @"Invalid configuration for 'steering.max_rate_up': must be greater than 0");
    Ok(())
}
