use core::cell::RefCell;

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, OutputType, Pull, Speed};
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_sync::blocking_mutex::Mutex;
use portable_atomic::AtomicU32;
use rover_core::gate::{ActuationPlan, ActuatorGate, DispatchOutcome};
use rover_core::ports::PortFault;
use rover_core::state::SharedState;
use static_cell::StaticCell;

use crate::hw::{self, LineSensors, Motors, Servos};
use crate::instant::RoverInstant;
use crate::shared::{RoverMutex, SharedCell, new_shared, with_state};
use crate::{status, telemetry};

mod control_task;
mod line_follow_task;
mod mission_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) type GateCell = Mutex<RoverMutex, RefCell<ActuatorGate<Motors, Servos>>>;

pub(super) static SHARED: SharedCell<RoverInstant> = new_shared();
/// Id of the next mission event the tasks have not logged yet.
pub(super) static EVENT_CURSOR: AtomicU32 = AtomicU32::new(0);
static GATE: StaticCell<GateCell> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA4,
        PA5,
        PA6,
        PA7,
        PA8,
        PA15,
        PB0,
        PB1,
        PB3,
        PB4,
        PB5,
        PB8,
        PB9,
        PB10,
        PB12,
        PB13,
        TIM2,
        TIM3,
        USART3,
        ..
    } = hal::init(config);

    let sensors = LineSensors::new([
        Input::new(PA0, Pull::Up),
        Input::new(PA1, Pull::Up),
        Input::new(PA4, Pull::Up),
        Input::new(PA5, Pull::Up),
        Input::new(PA8, Pull::Up),
    ]);

    let wheel_pwm = SimplePwm::new(
        TIM3,
        Some(PwmPin::new(PA6, OutputType::PushPull)),
        Some(PwmPin::new(PA7, OutputType::PushPull)),
        Some(PwmPin::new(PB0, OutputType::PushPull)),
        Some(PwmPin::new(PB1, OutputType::PushPull)),
        Hertz(hw::MOTOR_PWM_HZ),
        CountingMode::EdgeAlignedUp,
    );
    let motors = Motors::new(
        wheel_pwm,
        [
            Output::new(PB4, Level::High, Speed::Low),
            Output::new(PB5, Level::High, Speed::Low),
            Output::new(PB12, Level::High, Speed::Low),
            Output::new(PB13, Level::High, Speed::Low),
        ],
    );

    let servo_pwm = SimplePwm::new(
        TIM2,
        Some(PwmPin::new(PA15, OutputType::PushPull)),
        Some(PwmPin::new(PB3, OutputType::PushPull)),
        Some(PwmPin::new(PB10, OutputType::PushPull)),
        None,
        Hertz(hw::SERVO_PWM_HZ),
        CountingMode::EdgeAlignedUp,
    );
    let servos = Servos::new(servo_pwm);

    let gate: &'static GateCell = GATE.init(Mutex::new(RefCell::new(ActuatorGate::new(
        motors, servos,
    ))));

    defmt::info!("rover: peripherals ready");

    spawner
        .spawn(line_follow_task::run(gate, sensors))
        .expect("failed to spawn line-follow task");

    spawner
        .spawn(mission_task::run(gate))
        .expect("failed to spawn mission task");

    spawner
        .spawn(control_task::run(gate, USART3, PB8, PB9))
        .expect("failed to spawn control task");

    core::future::pending::<()>().await;
}

/// Hands `plan` to the gate and folds the outcome into the fault monitor.
///
/// Must be called with [`SHARED`] unlocked.
pub(super) fn dispatch(gate: &GateCell, plan: &ActuationPlan, now: RoverInstant) {
    let outcome = gate.lock(|gate| gate.borrow_mut().dispatch(plan));
    match outcome {
        Ok(DispatchOutcome::Applied) => with_state(&SHARED, SharedState::record_healthy),
        Ok(DispatchOutcome::Superseded { plan_epoch, fence }) => {
            defmt::debug!("gate: dropped plan {} behind fence {}", plan_epoch, fence);
            status::record_superseded();
        }
        Err(fault) => note_fault(gate, fault, now),
    }
}

/// Records a port fault and issues the fail-safe stop once the streak trips.
pub(super) fn note_fault(gate: &GateCell, fault: PortFault, now: RoverInstant) {
    telemetry::log_fault(&fault);
    let fail_safe = with_state(&SHARED, |state| state.record_fault(fault, now));
    if let Some(plan) = fail_safe {
        defmt::error!("fault streak tripped the fail-safe; stopping all wheels");
        if let Err(fault) = gate.lock(|gate| gate.borrow_mut().dispatch(&plan)) {
            telemetry::log_fault(&fault);
        }
    }
}
