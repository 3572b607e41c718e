//! Terminal status panel redrawn in place with crossterm.

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use rover_core::ports::{ArmChannel, Wheel, WheelDirection};

use crate::runtime::PanelView;

/// Formats the panel body, one entry per terminal row.
#[must_use]
pub fn render_lines(view: &PanelView) -> Vec<String> {
    let status = &view.status;
    let world = &view.world;

    let sensors: String = status
        .sensors
        .iter()
        .rev()
        .map(|level| if *level == 0 { '.' } else { '#' })
        .collect();

    let wheels = Wheel::ALL
        .iter()
        .map(|wheel| {
            let (direction, duty) = world.wheels[wheel.index()];
            let sign = match direction {
                WheelDirection::Forward => '+',
                WheelDirection::Backward => '-',
            };
            format!("{wheel} {sign}{:>3}%", duty.percent())
        })
        .collect::<Vec<_>>()
        .join("  ");

    let arm = ArmChannel::ALL
        .iter()
        .map(|channel| {
            let angle = world.arm[usize::from(channel.channel())];
            format!("{channel} {:>3}", angle.degrees())
        })
        .collect::<Vec<_>>()
        .join("  ");

    vec![
        format!(
            "mode {:<10} stage {}  {}",
            status.mode.name(),
            status.stage.index(),
            status.mission_status
        ),
        format!(
            "line [{sensors}]  {}  {}",
            status.action_label(),
            if status.running { "running" } else { "stopped" }
        ),
        format!("wheels {wheels}"),
        format!("arm {arm}"),
        format!(
            "pose x {:>7.1} cm  offset {:>5.1} cm  heading {:>6.1} deg",
            world.position_cm, world.offset_cm, world.heading_deg
        ),
        match view.last_fault {
            Some(fault) => format!("port faults {}  last {fault}", view.fault_total),
            None => format!("port faults {}", view.fault_total),
        },
    ]
}

/// Repaints the panel from the top-left corner.
pub fn draw<W: Write>(out: &mut W, view: &PanelView) -> io::Result<()> {
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;
    for (row, line) in render_lines(view).into_iter().enumerate() {
        let row = u16::try_from(row).unwrap_or(u16::MAX);
        queue!(out, MoveTo(0, row), Print(line))?;
    }
    out.flush()
}
