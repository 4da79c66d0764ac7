//! Property tests for the LED PWM builder.

use colonypick_control::gcode::led_pwm;
use proptest::prelude::*;

proptest! {
    /// Every input produces `M106 S<v>` with `v` clamped into `[0, 255]`.
    #[test]
    fn led_duty_is_always_in_range(value in any::<i32>()) {
        let command = led_pwm(value);
        let duty: i32 = command
            .strip_prefix("M106 S")
            .expect("builder shape")
            .parse()
            .expect("numeric duty");
        prop_assert!((0..=255).contains(&duty));
        if (0..=255).contains(&value) {
            prop_assert_eq!(duty, value);
        }
    }

    /// Out-of-range inputs pin to the nearest bound.
    #[test]
    fn led_duty_pins_to_bounds(value in any::<i32>()) {
        let command = led_pwm(value);
        if value < 0 {
            prop_assert_eq!(command, "M106 S0");
        } else if value > 255 {
            prop_assert_eq!(command, "M106 S255");
        }
    }
}
