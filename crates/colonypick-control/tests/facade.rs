//! Facade behavior against a scripted serial port: latch refusal, the
//! emergency stop sequence, jog log debouncing, LED clamping, and scrub
//! scopes.

mod common;

use colonypick_communication::{DispatcherConfig, SerialTransport};
use colonypick_control::{ControlActions, JogDirection, ScrubScope};
use colonypick_core::{MachineFlags, MessageDispatcher};
use colonypick_settings::{Settings, SettingsStore};
use common::{fake_port, wait_until, Recorder, Wire};
use std::sync::Arc;
use std::time::Duration;

const SOON: Duration = Duration::from_secs(2);

struct Rig {
    actions: Arc<ControlActions>,
    flags: Arc<MachineFlags>,
    recorder: Arc<Recorder>,
}

fn rig(auto_ack: bool, ack_timeout_ms: u64) -> (Rig, Arc<Wire>) {
    rig_with_settings(auto_ack, ack_timeout_ms, Settings::default())
}

fn rig_with_settings(
    auto_ack: bool,
    ack_timeout_ms: u64,
    settings: Settings,
) -> (Rig, Arc<Wire>) {
    let flags = Arc::new(MachineFlags::new());
    let transport = Arc::new(SerialTransport::new(flags.clone()));
    let (port, wire) = fake_port(auto_ack);
    transport.attach(Box::new(port), "/dev/ttyTEST", 250_000);

    let messages = Arc::new(MessageDispatcher::new());
    let recorder = Recorder::new();
    messages.register(recorder.clone());

    let dir = std::env::temp_dir().join(format!("colonypick-test-{}", std::process::id()));
    let store = SettingsStore::in_memory(settings, dir.join("settings.json"));

    let actions = ControlActions::with_config(
        transport,
        flags.clone(),
        messages,
        store,
        DispatcherConfig {
            ack_timeout: Duration::from_millis(ack_timeout_ms),
        },
    );
    actions.start_pipeline();

    (
        Rig {
            actions,
            flags,
            recorder,
        },
        wire,
    )
}

#[test]
fn latch_refuses_everything_but_the_recovery_set() {
    let (rig, wire) = rig(true, 500);

    rig.actions.emergency_stop(None, false).unwrap();
    assert!(rig.flags.is_latched());
    assert!(wire.has_line(|l| l == "M112"));

    let wire_before = wire.lines().len();
    assert!(rig
        .actions
        .manual_jog(JogDirection::XPlus, 5.0, 3000)
        .unwrap_err()
        .is_refused());
    assert!(rig.actions.move_xy(1.0, 2.0, 6000).unwrap_err().is_refused());
    assert!(rig.actions.led_pwm(100).unwrap_err().is_refused());
    assert!(rig.actions.home(&[]).unwrap_err().is_refused());
    assert!(rig.actions.save_settings().unwrap_err().is_refused());

    // Nothing refused ever reaches the wire.
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(wire.lines().len(), wire_before);
    assert!(rig.recorder.count_containing("Refused") >= 5);

    // Reading the firmware's stored parameters stays allowed.
    rig.actions.query_settings().unwrap();
    assert!(wait_until(SOON, || wire.has_line(|l| l == "M503")));

    rig.actions.recover_from_emergency().unwrap();
    assert!(!rig.flags.is_latched());
    assert!(wire.has_line(|l| l == "M999"));

    rig.actions.manual_jog(JogDirection::XPlus, 5.0, 3000).unwrap();
    assert!(wait_until(SOON, || wire.has_line(|l| l == "G1 X5 F3000")));
}

#[test]
fn emergency_stop_scrubs_everything_queued() {
    let (rig, wire) = rig(false, 400);

    rig.actions.move_xy(100.0, 100.0, 6000).unwrap();
    assert!(wait_until(SOON, || wire
        .has_line(|l| l == "G0 X100 Y100 F6000")));
    rig.actions.move_xy(200.0, 100.0, 6000).unwrap();
    rig.actions.move_xy(200.0, 200.0, 6000).unwrap();
    // Let the funnel hand both to the XY lane queue.
    assert!(wait_until(SOON, || rig.flags.pending_motion() == 3));

    rig.actions.emergency_stop(Some("test"), false).unwrap();
    assert_eq!(rig.flags.pending_motion(), 0);

    // The in-flight move's wait expires; the scrubbed moves never follow.
    assert!(wait_until(SOON, || wire.has_line(|l| l == "M112")));
    std::thread::sleep(Duration::from_millis(500));
    assert!(!wire.has_line(|l| l.contains("X200")));
    assert!(rig.recorder.count_containing("EMERGENCY STOP (test)") == 1);
}

#[test]
fn emergency_stop_with_reset_clears_the_latch() {
    let (rig, wire) = rig(true, 500);
    rig.actions.emergency_stop(None, true).unwrap();
    assert!(!rig.flags.is_latched());
    assert!(wait_until(SOON, || wire.has_line(|l| l == "M999")));
}

#[test]
fn jog_commands_all_transmit_but_the_log_is_debounced() {
    let (rig, wire) = rig(true, 500);

    for _ in 0..5 {
        rig.actions
            .manual_jog(JogDirection::YMinus, 15.0, 3000)
            .unwrap();
    }

    assert!(wait_until(SOON, || wire
        .count_lines(|l| l == "G1 Y-15 F3000")
        == 5));
    assert_eq!(wire.count_lines(|l| l == "G91"), 5);
    // Five rapid-fire jogs, at most one debounce window's worth of log.
    let logged = rig.recorder.count_containing("Jog Y-");
    assert!((1..=2).contains(&logged), "got {} jog log entries", logged);
}

#[test]
fn led_pwm_clamps_and_requires_a_connection() {
    let (rig, wire) = rig(true, 500);

    rig.actions.led_pwm(300).unwrap();
    rig.actions.led_pwm(-42).unwrap();
    rig.actions.led_pwm(128).unwrap();

    assert!(wait_until(SOON, || wire.has_line(|l| l == "M106 S128")));
    assert!(wire.has_line(|l| l == "M106 S255"));
    assert!(wire.has_line(|l| l == "M106 S0"));

    rig.actions.disconnect();
    let err = rig.actions.led_pwm(10).unwrap_err();
    assert!(err.is_refused());
    assert!(rig.recorder.count_containing("Cannot set LED") == 1);
}

#[test]
fn scrub_scopes_separate_jogs_from_other_motion() {
    let (rig, wire) = rig(false, 400);

    // Hold the X lane with an in-flight jog, then queue more of both kinds.
    rig.actions.manual_jog(JogDirection::XPlus, 1.0, 3000).unwrap();
    assert!(wait_until(SOON, || wire.has_line(|l| l == "G1 X1 F3000")));
    rig.actions.manual_jog(JogDirection::XPlus, 2.0, 3000).unwrap();
    rig.actions.manual_jog(JogDirection::XPlus, 3.0, 3000).unwrap();
    rig.actions.move_xy(50.0, 60.0, 6000).unwrap();
    assert!(wait_until(SOON, || rig.flags.pending_motion() == 4));

    // Jog scrub drops only the queued jogs.
    assert_eq!(rig.actions.clear_pending(ScrubScope::Jog), 2);
    // Motion scrub takes whatever motion is still queued.
    let motion_removed = rig.actions.clear_pending(ScrubScope::Motion);
    assert!(motion_removed <= 1);

    assert!(wait_until(SOON, || rig.flags.pending_motion() == 0));
    std::thread::sleep(Duration::from_millis(100));
    assert!(!wire.has_line(|l| l == "G1 X2 F3000"));
    assert!(!wire.has_line(|l| l == "G1 X3 F3000"));
}

#[test]
fn reconnect_saved_tries_the_recorded_pair_first() {
    // Seed a saved connection that cannot exist on this machine.
    let settings = Settings {
        selected_port: Some("/dev/ttyCPTEST9".to_string()),
        baud: Some(250_000),
        ..Settings::default()
    };
    let (rig, _wire) = rig_with_settings(true, 500, settings);

    let err = rig.actions.reconnect_saved(false);
    assert!(err.is_err());
    // Exactly the persisted pair was retried.
    assert_eq!(
        rig.recorder
            .count_containing("Saved connection /dev/ttyCPTEST9 @ 250000 failed"),
        1
    );
}
