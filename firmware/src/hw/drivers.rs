//! Port implementations over the STM32G0 peripherals.

use embassy_stm32::gpio::{Input, Level, Output};
use embassy_stm32::peripherals::{TIM2, TIM3};
use embassy_stm32::timer::Channel;
use embassy_stm32::timer::simple_pwm::SimplePwm;
use rover_core::decision::{SENSOR_COUNT, SensorSnapshot};
use rover_core::ports::{
    Angle, ArmChannel, ArmPort, Duty, MotorPort, PortFault, SensorPort, Wheel, WheelDirection,
};

use super::{LINE_ACTIVE_HIGH, motor_compare, servo_compare};

/// TIM3 channel driving each wheel, in [`Wheel::index`] order.
const WHEEL_CHANNELS: [Channel; 4] = [Channel::Ch1, Channel::Ch2, Channel::Ch3, Channel::Ch4];

/// TIM2 channel for each servo, in controller channel order.
const SERVO_CHANNELS: [Channel; 3] = [Channel::Ch1, Channel::Ch2, Channel::Ch3];

pub struct Motors {
    pwm: SimplePwm<'static, TIM3>,
    direction: [Output<'static>; 4],
}

impl Motors {
    pub fn new(mut pwm: SimplePwm<'static, TIM3>, direction: [Output<'static>; 4]) -> Self {
        for channel in WHEEL_CHANNELS {
            let mut output = pwm.channel(channel);
            output.set_duty_cycle_fully_off();
            output.enable();
        }
        Self { pwm, direction }
    }
}

impl MotorPort for Motors {
    fn drive(
        &mut self,
        wheel: Wheel,
        direction: WheelDirection,
        duty: Duty,
    ) -> Result<(), PortFault> {
        let index = wheel.index();
        self.direction[index].set_level(match direction {
            WheelDirection::Forward => Level::High,
            WheelDirection::Backward => Level::Low,
        });
        let mut output = self.pwm.channel(WHEEL_CHANNELS[index]);
        let max = output.max_duty_cycle();
        output.set_duty_cycle(motor_compare(duty, max));
        Ok(())
    }

    fn stop_all(&mut self) -> Result<(), PortFault> {
        for channel in WHEEL_CHANNELS {
            self.pwm.channel(channel).set_duty_cycle_fully_off();
        }
        Ok(())
    }
}

pub struct Servos {
    pwm: SimplePwm<'static, TIM2>,
}

impl Servos {
    pub fn new(mut pwm: SimplePwm<'static, TIM2>) -> Self {
        for channel in SERVO_CHANNELS {
            pwm.channel(channel).enable();
        }
        Self { pwm }
    }
}

impl ArmPort for Servos {
    fn set_angle(&mut self, channel: ArmChannel, angle: Angle) -> Result<(), PortFault> {
        let mut output = self.pwm.channel(SERVO_CHANNELS[usize::from(channel.channel())]);
        let max = output.max_duty_cycle();
        output.set_duty_cycle(servo_compare(angle, max));
        Ok(())
    }
}

/// Five reflectance sensors, rightmost first.
pub struct LineSensors {
    inputs: [Input<'static>; SENSOR_COUNT],
}

impl LineSensors {
    pub fn new(inputs: [Input<'static>; SENSOR_COUNT]) -> Self {
        Self { inputs }
    }
}

impl SensorPort for LineSensors {
    fn sample(&mut self) -> Result<SensorSnapshot, PortFault> {
        Ok(SensorSnapshot::new(
            self.inputs.each_ref().map(|input| input.is_high() == LINE_ACTIVE_HIGH),
        ))
    }
}
