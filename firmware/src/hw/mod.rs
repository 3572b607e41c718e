//! Pin assignment and PWM scaling for the rover board.
//!
//! | Function               | Pins                         | Peripheral       |
//! |------------------------|------------------------------|------------------|
//! | Line sensors (R → L)   | PA0, PA1, PA4, PA5, PA8      | GPIO, pull-up    |
//! | Wheel PWM (LF LB RF RB)| PA6, PA7, PB0, PB1           | TIM3 CH1..CH4    |
//! | Wheel direction        | PB4, PB5, PB12, PB13         | GPIO             |
//! | Servos (base arm grip) | PA15, PB3, PB10              | TIM2 CH1..CH3    |
//! | Network co-processor   | PB8 (TX), PB9 (RX)           | USART3           |
//!
//! TIM1 is reserved for the embassy time driver.

#[cfg(target_os = "none")]
mod drivers;

#[cfg(target_os = "none")]
pub use drivers::{LineSensors, Motors, Servos};

use rover_core::ports::{Angle, Duty};

/// Wheel PWM carrier frequency.
pub const MOTOR_PWM_HZ: u32 = 1_000;
/// Hobby-servo frame rate.
pub const SERVO_PWM_HZ: u32 = 50;
/// Servo frame length at [`SERVO_PWM_HZ`].
pub const SERVO_PERIOD_US: u32 = 1_000_000 / SERVO_PWM_HZ;
/// Pulse width commanding 0°.
pub const SERVO_MIN_PULSE_US: u32 = 500;
/// Pulse width commanding 180°.
pub const SERVO_MAX_PULSE_US: u32 = 2_500;
/// A sensor reads high while it sits over the line.
pub const LINE_ACTIVE_HIGH: bool = true;

/// Pulse width for `angle`, linear between the 0° and 180° endpoints.
pub fn servo_pulse_us(angle: Angle) -> u32 {
    let span = SERVO_MAX_PULSE_US - SERVO_MIN_PULSE_US;
    SERVO_MIN_PULSE_US + span * u32::from(angle.degrees()) / u32::from(Angle::MAX_DEGREES)
}

/// Compare value producing the servo pulse for `angle` on a timer whose full
/// period is `max_duty`.
pub fn servo_compare(angle: Angle, max_duty: u16) -> u16 {
    let compare = servo_pulse_us(angle) * u32::from(max_duty) / SERVO_PERIOD_US;
    u16::try_from(compare).unwrap_or(max_duty)
}

/// Compare value for a wheel duty percentage.
pub fn motor_compare(duty: Duty, max_duty: u16) -> u16 {
    let compare = u32::from(max_duty) * u32::from(duty.percent()) / 100;
    u16::try_from(compare).unwrap_or(max_duty)
}
