//! ColonyPick operator console
//!
//! Line-based terminal front end over the control facade: connect to the
//! rig, jog the gantry, run a picking plan, and recover from emergency
//! stops, all without a widget toolkit in sight.

use colonypick::{
    init_logging, Axis, ControlActions, JogDirection, MachineFlags, Message, MessageDispatcher,
    MessageSink, MotionActions, PickPlan, PickState, PickingEngine, PixelPoint, ScrubScope,
    SerialTransport, Settings, SettingsStore,
};
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

/// Picking engine tick period (~10 Hz)
const TICK: Duration = Duration::from_millis(100);

/// Prints operator messages to the terminal
struct ConsoleSink;

impl MessageSink for ConsoleSink {
    fn message(&self, message: &Message) {
        println!("[{}] {}", message.level, message.text);
    }
}

fn main() -> anyhow::Result<()> {
    init_logging()?;
    println!(
        "ColonyPick operator console {} ({})",
        colonypick::VERSION,
        colonypick::BUILD_DATE
    );

    let flags = Arc::new(MachineFlags::new());
    let messages = Arc::new(MessageDispatcher::new());
    messages.register(Arc::new(ConsoleSink));

    let transport = Arc::new(SerialTransport::new(flags.clone()));
    let store = SettingsStore::load_or_default(Settings::default_path());
    let actions = ControlActions::new(transport, flags.clone(), messages.clone(), store);

    if actions.reconnect_saved(true).is_err() {
        println!("No rig found; use `connect <port> <baud>` once it is plugged in.");
    }

    repl(&actions, &flags, &messages)
}

fn repl(
    actions: &Arc<ControlActions>,
    flags: &Arc<MachineFlags>,
    messages: &Arc<MessageDispatcher>,
) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let result = match words.as_slice() {
            [] => Ok(()),
            ["quit"] | ["exit"] => break,
            ["help"] => {
                print_help();
                Ok(())
            }
            ["status"] => {
                let snapshot = actions.snapshot();
                println!(
                    "connected={} latched={} pending_motion={}",
                    snapshot.connected, snapshot.emergency_latched, snapshot.pending_motion
                );
                Ok(())
            }
            ["ports"] => {
                match colonypick::list_ports() {
                    Ok(ports) if !ports.is_empty() => {
                        for port in ports {
                            println!("{}  {}", port.port_name, port.description);
                        }
                    }
                    Ok(_) => println!("No candidate ports."),
                    Err(e) => println!("Port enumeration failed: {}", e),
                }
                Ok(())
            }
            ["connect"] => actions.reconnect_saved(true),
            ["connect", port, baud] => match baud.parse() {
                Ok(baud) => actions.connect(port, baud),
                Err(_) => {
                    println!("Baud must be a number.");
                    Ok(())
                }
            },
            ["jog", direction, step] => jog(actions, direction, step, 3000),
            ["jog", direction, step, feed] => match feed.parse() {
                Ok(feed) => jog(actions, direction, step, feed),
                Err(_) => {
                    println!("Feedrate must be a number.");
                    Ok(())
                }
            },
            ["move", x, y] => match (x.parse(), y.parse()) {
                (Ok(x), Ok(y)) => actions.move_xy(x, y, 6000),
                _ => {
                    println!("Coordinates must be numbers.");
                    Ok(())
                }
            },
            ["led", value] => match value.parse() {
                Ok(value) => actions.led_pwm(value),
                Err(_) => {
                    println!("LED value must be a number.");
                    Ok(())
                }
            },
            ["home"] => actions.home(&[]),
            ["home", "x"] => actions.home(&[Axis::X]),
            ["home", "y"] => actions.home(&[Axis::Y]),
            ["endstops", "on"] => actions.soft_endstops(true),
            ["endstops", "off"] => actions.soft_endstops(false),
            ["steppers", "on"] => actions.enable_steppers(),
            ["steppers", "off"] => actions.disable_steppers(),
            ["pin", pin, value] => match (pin.parse(), value.parse()) {
                (Ok(pin), Ok(value)) => actions.pin_write(pin, value),
                _ => {
                    println!("Pin and value must be numbers in 0-255.");
                    Ok(())
                }
            },
            ["query"] => actions.query_settings(),
            ["position"] => actions.query_position(),
            ["estop"] => actions.emergency_stop(Some("operator"), false),
            ["reset"] => actions.emergency_stop(Some("operator"), true),
            ["recover"] => actions.recover_from_emergency(),
            ["clear", scope] => {
                let scope = match *scope {
                    "jog" => Some(ScrubScope::Jog),
                    "motion" => Some(ScrubScope::Motion),
                    "all" => Some(ScrubScope::All),
                    _ => None,
                };
                match scope {
                    Some(scope) => {
                        println!("Removed {} queued command(s).", actions.clear_pending(scope));
                    }
                    None => println!("Usage: clear <jog|motion|all>"),
                }
                Ok(())
            }
            ["pick", path] => run_pick(actions, flags, messages, path),
            _ => {
                println!("Unknown command; try `help`.");
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("[error] {}", e);
        }
    }

    actions.disconnect();
    Ok(())
}

fn jog(
    actions: &Arc<ControlActions>,
    direction: &str,
    step: &str,
    feedrate: u32,
) -> colonypick::Result<()> {
    let direction = match direction {
        "x+" => JogDirection::XPlus,
        "x-" => JogDirection::XMinus,
        "y+" => JogDirection::YPlus,
        "y-" => JogDirection::YMinus,
        _ => {
            println!("Direction must be one of x+ x- y+ y-.");
            return Ok(());
        }
    };
    let Ok(step) = step.parse::<f64>() else {
        println!("Step must be a number of millimetres.");
        return Ok(());
    };
    actions.manual_jog(direction, step, feedrate)
}

/// Load a plan of `x,y` lines and drive the engine to completion
fn run_pick(
    actions: &Arc<ControlActions>,
    flags: &Arc<MachineFlags>,
    messages: &Arc<MessageDispatcher>,
    path: &str,
) -> colonypick::Result<()> {
    let plan = load_plan(path)?;
    let motion: Arc<dyn MotionActions> = actions.clone();
    let mut engine = PickingEngine::new(plan, motion, flags.clone(), messages.clone());
    engine.start()?;

    loop {
        engine.step();
        match engine.state() {
            PickState::Done => break,
            PickState::Stopped => {
                println!(
                    "Run stopped at point {}; resume_available={}",
                    engine.index(),
                    engine.resume_available()
                );
                break;
            }
            _ => std::thread::sleep(TICK),
        }
    }
    Ok(())
}

/// Parse a CSV of `x,y` integer pixel coordinates, one target per line
fn load_plan(path: &str) -> colonypick::Result<PickPlan> {
    let content = std::fs::read_to_string(path)?;
    let mut points = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (x, y) = line.split_once(',').ok_or_else(|| {
            colonypick::Error::other(format!("{}:{}: expected `x,y`", path, number + 1))
        })?;
        let x = x.trim().parse().map_err(|_| {
            colonypick::Error::other(format!("{}:{}: x is not an integer", path, number + 1))
        })?;
        let y = y.trim().parse().map_err(|_| {
            colonypick::Error::other(format!("{}:{}: y is not an integer", path, number + 1))
        })?;
        points.push(PixelPoint::new(x, y));
    }
    Ok(PickPlan::new(points))
}

fn print_help() {
    println!(
        "\
status                    show connection, latch, and pending-motion state
ports                     list candidate serial ports
connect [port baud]       reconnect saved pair, or open a specific port
jog <x+|x-|y+|y-> <mm> [feed]   relative jog
move <x> <y>              absolute move (mm)
led <0-255>               ring light brightness
home [x|y]                home all or one axis
endstops on|off           firmware soft endstops
steppers on|off           enable or release the stepper drivers
pin <p> <0-255>           direct pin write
query                     report firmware settings
position                  report position
estop                     emergency stop (latches)
reset                     emergency stop followed by M999
recover                   recover from emergency stop
clear <jog|motion|all>    scrub queued commands
pick <file.csv>           visit every x,y point in the file
quit"
    );
}
