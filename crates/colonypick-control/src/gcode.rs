//! Marlin command builders
//!
//! Every command string the facade sends is assembled here, so the wire
//! dialect lives in one place. Builders return plain strings; routing and
//! completion semantics are the dispatcher's concern.

use colonypick_settings::{AxisValues, MarlinSettings};

/// Emergency stop
pub const EMERGENCY_STOP: &str = "M112";
/// Reset from halted state
pub const RESET: &str = "M999";
/// Unconditional pause
pub const PAUSE: &str = "M0";
/// Break out of a pause
pub const RESUME: &str = "M108";
/// Enable steppers
pub const STEPPERS_ON: &str = "M17";
/// Disable steppers
pub const STEPPERS_OFF: &str = "M84";
/// Report current position
pub const QUERY_POSITION: &str = "M114";
/// Report endstop states
pub const QUERY_ENDSTOPS: &str = "M119";
/// Report the stored parameter set
pub const QUERY_SETTINGS: &str = "M503";
/// Persist the parameter set to firmware EEPROM
pub const SAVE_SETTINGS: &str = "M500";

/// Gantry axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Horizontal gantry axis
    X,
    /// Vertical gantry axis
    Y,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
        }
    }
}

/// Jog button direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogDirection {
    /// X towards positive
    XPlus,
    /// X towards negative
    XMinus,
    /// Y towards positive
    YPlus,
    /// Y towards negative
    YMinus,
}

impl JogDirection {
    /// The axis this direction moves
    pub fn axis(self) -> Axis {
        match self {
            JogDirection::XPlus | JogDirection::XMinus => Axis::X,
            JogDirection::YPlus | JogDirection::YMinus => Axis::Y,
        }
    }

    /// +1.0 or -1.0
    pub fn sign(self) -> f64 {
        match self {
            JogDirection::XPlus | JogDirection::YPlus => 1.0,
            JogDirection::XMinus | JogDirection::YMinus => -1.0,
        }
    }
}

impl std::fmt::Display for JogDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JogDirection::XPlus => write!(f, "X+"),
            JogDirection::XMinus => write!(f, "X-"),
            JogDirection::YPlus => write!(f, "Y+"),
            JogDirection::YMinus => write!(f, "Y-"),
        }
    }
}

/// Two-line relative jog: switch to relative mode, then one signed step
pub fn relative_jog(direction: JogDirection, step_mm: f64, feedrate: u32) -> String {
    format!(
        "G91\nG1 {}{} F{}",
        direction.axis(),
        direction.sign() * step_mm,
        feedrate
    )
}

/// Absolute combined-axis move.
///
/// Prefixed with `G90` so a preceding relative jog cannot leak its mode
/// into the move.
pub fn absolute_move(x: f64, y: f64, feedrate: u32) -> String {
    format!("G90\nG0 X{} Y{} F{}", x, y, feedrate)
}

/// LED / fan PWM, clamped to the valid duty range `[0, 255]`
pub fn led_pwm(value: i32) -> String {
    format!("M106 S{}", value.clamp(0, 255))
}

/// Home; an empty axis list homes everything
pub fn home(axes: &[Axis]) -> String {
    if axes.is_empty() {
        "G28".to_string()
    } else {
        let mut command = "G28".to_string();
        for axis in axes {
            command.push(' ');
            command.push_str(&axis.to_string());
        }
        command
    }
}

/// Enable or disable firmware soft endstops
pub fn soft_endstops(enabled: bool) -> String {
    format!("M211 S{}", if enabled { 1 } else { 0 })
}

/// Direct pin write
pub fn pin_write(pin: u8, value: u8) -> String {
    format!("M42 P{} S{}", pin, value)
}

/// Steps-per-millimetre update
pub fn steps_per_mm(axes: &AxisValues) -> String {
    with_axis_words("M92", axes)
}

/// Logical position override
pub fn set_position(axes: &AxisValues) -> String {
    with_axis_words("G92", axes)
}

/// Append `X… Y… Z… E…` words for the axes that are set
fn with_axis_words(command: &str, axes: &AxisValues) -> String {
    let mut out = command.to_string();
    for (letter, value) in axes.entries() {
        out.push(' ');
        out.push(letter);
        out.push_str(&value.to_string());
    }
    out
}

/// The firmware commands that mirror a stored Marlin parameter set.
///
/// Key-to-command mapping, in the order they are sent on connect:
///
/// | Parameter | Command |
/// |-----------|---------|
/// | `steps_per_mm` | `M92` per axis |
/// | `motor_current` | `M906`, one scalar per axis |
/// | `acceleration` | `M204 P… T…` |
/// | `jerk` | `M205` per axis |
/// | `max_feedrate` | `M203` per axis |
/// | `max_acceleration` | `M201` per axis |
/// | `feedrate` | `G1 F…` |
/// | `home_position` | `G92` per axis |
pub fn marlin_commands(settings: &MarlinSettings) -> Vec<String> {
    let mut commands = Vec::new();

    if let Some(axes) = &settings.steps_per_mm {
        if !axes.is_empty() {
            commands.push(with_axis_words("M92", axes));
        }
    }
    if let Some(current) = settings.motor_current {
        commands.push(format!("M906 X{0} Y{0} Z{0}", current));
    }
    if let Some(acceleration) = settings.acceleration {
        commands.push(format!("M204 P{0} T{0}", acceleration));
    }
    if let Some(axes) = &settings.jerk {
        if !axes.is_empty() {
            commands.push(with_axis_words("M205", axes));
        }
    }
    if let Some(axes) = &settings.max_feedrate {
        if !axes.is_empty() {
            commands.push(with_axis_words("M203", axes));
        }
    }
    if let Some(axes) = &settings.max_acceleration {
        if !axes.is_empty() {
            commands.push(with_axis_words("M201", axes));
        }
    }
    if let Some(feedrate) = settings.feedrate {
        commands.push(format!("G1 F{}", feedrate));
    }
    if let Some(axes) = &settings.home_position {
        if !axes.is_empty() {
            commands.push(with_axis_words("G92", axes));
        }
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_jog_pairs() {
        assert_eq!(
            relative_jog(JogDirection::XPlus, 15.0, 3000),
            "G91\nG1 X15 F3000"
        );
        assert_eq!(
            relative_jog(JogDirection::YMinus, 15.0, 3000),
            "G91\nG1 Y-15 F3000"
        );
        assert_eq!(
            relative_jog(JogDirection::XMinus, 0.5, 1200),
            "G91\nG1 X-0.5 F1200"
        );
    }

    #[test]
    fn absolute_moves() {
        assert_eq!(absolute_move(10.0, 20.0, 6000), "G90\nG0 X10 Y20 F6000");
        assert_eq!(absolute_move(1.25, -3.5, 6000), "G90\nG0 X1.25 Y-3.5 F6000");
    }

    #[test]
    fn home_variants() {
        assert_eq!(home(&[]), "G28");
        assert_eq!(home(&[Axis::X]), "G28 X");
        assert_eq!(home(&[Axis::X, Axis::Y]), "G28 X Y");
    }

    #[test]
    fn marlin_mirror_covers_every_set_parameter() {
        let settings = MarlinSettings {
            steps_per_mm: Some(AxisValues {
                x: Some(80.0),
                y: Some(80.0),
                z: Some(400.0),
                e: None,
            }),
            motor_current: Some(800.0),
            acceleration: Some(500.0),
            jerk: Some(AxisValues {
                x: Some(8.0),
                y: Some(8.0),
                ..AxisValues::default()
            }),
            max_feedrate: None,
            max_acceleration: None,
            feedrate: Some(3000.0),
            home_position: Some(AxisValues {
                x: Some(0.0),
                y: Some(0.0),
                ..AxisValues::default()
            }),
        };

        let commands = marlin_commands(&settings);
        assert_eq!(
            commands,
            vec![
                "M92 X80 Y80 Z400",
                "M906 X800 Y800 Z800",
                "M204 P500 T500",
                "M205 X8 Y8",
                "G1 F3000",
                "G92 X0 Y0",
            ]
        );
    }

    #[test]
    fn unset_parameters_emit_nothing() {
        assert!(marlin_commands(&MarlinSettings::default()).is_empty());
    }
}
