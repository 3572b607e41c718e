use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embedded_io_async::{Read, Write};
use heapless::String;
use rover_core::control::{self, Reply, ReplyBody};
use static_cell::StaticCell;

use super::{EVENT_CURSOR, GateCell, SHARED, dispatch};
use crate::instant::RoverInstant;
use crate::link::{
    LINK_BAUD, LinkError, MAX_REQUEST_BYTES, REPLY_TERMINATOR, RESPONSE_CAPACITY,
    RequestAssembler, render_response,
};
use crate::shared::{drain_events, with_state};
use crate::{status, telemetry};

const UART_BUFFER_SIZE: usize = 256;

static UART_TX_BUFFER: StaticCell<[u8; UART_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; UART_BUFFER_SIZE]> = StaticCell::new();
static RESPONSE: StaticCell<String<RESPONSE_CAPACITY>> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART3>;
});

/// Serves control requests forwarded by the network co-processor.
#[embassy_executor::task]
pub async fn run(
    gate: &'static GateCell,
    usart: Peri<'static, hal::peripherals::USART3>,
    tx_pin: Peri<'static, hal::peripherals::PB8>,
    rx_pin: Peri<'static, hal::peripherals::PB9>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = LINK_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        UART_TX_BUFFER.init([0; UART_BUFFER_SIZE]),
        UART_RX_BUFFER.init([0; UART_BUFFER_SIZE]),
        UartIrqs,
        config,
    )
    .expect("failed to initialize control link UART");
    let (mut uart_tx, mut uart_rx) = uart.split();

    let response = RESPONSE.init(String::new());
    let mut assembler = RequestAssembler::<MAX_REQUEST_BYTES>::new();
    let mut chunk = [0u8; 64];

    defmt::info!("control: listening at {} baud", LINK_BAUD);

    loop {
        let count = match uart_rx.read(&mut chunk).await {
            Ok(count) => count,
            Err(_) => {
                defmt::warn!("control: {}", LinkError::Uart);
                status::record_link_error();
                assembler.reset();
                continue;
            }
        };

        // One chunk may carry the end of one head and the start of the next.
        let mut pending = &chunk[..count];
        while !pending.is_empty() {
            let (consumed, framed) = assembler.feed_slice(pending);
            pending = &pending[consumed..];
            let Some(framed) = framed else {
                break;
            };

            let request = framed.and_then(|()| assembler.request());
            respond(gate, request, response);
            assembler.reset();
            serve_response(&mut uart_tx, response.as_str()).await;
        }
    }
}

async fn serve_response<W: Write>(tx: &mut W, response: &str) {
    match send_response(tx, response).await {
        Ok(()) => {
            status::record_request();
            let counters = status::counters();
            defmt::debug!(
                "control: served={} link_errors={} superseded={}",
                counters.requests_served,
                counters.link_errors,
                counters.superseded_plans
            );
        }
        Err(_) => {
            defmt::warn!("control: UART write error");
            status::record_link_error();
        }
    }
}

async fn send_response<W: Write>(tx: &mut W, response: &str) -> Result<(), W::Error> {
    tx.write_all(response.as_bytes()).await?;
    tx.write_all(&[REPLY_TERMINATOR]).await?;
    tx.flush().await
}

/// Executes one framed request and renders its response into `out`.
fn respond(
    gate: &GateCell,
    request: Result<&str, LinkError>,
    out: &mut String<RESPONSE_CAPACITY>,
) {
    let now = RoverInstant::now();
    let reply = match request {
        Ok(raw) => {
            let handled = with_state(&SHARED, |state| control::handle(state, raw, now));
            if let Some(summary) = handled.overrides
                && summary.skipped > 0
            {
                telemetry::log_skipped_overrides(summary.applied, summary.skipped);
            }
            if let Some(plan) = &handled.plan {
                dispatch(gate, plan, now);
            }
            handled.reply
        }
        Err(error) => {
            defmt::warn!("control: {}", error);
            status::record_link_error();
            Reply::new(ReplyBody::BadRequest)
        }
    };
    drain_events(&SHARED, &EVENT_CURSOR);

    if !render_response(&reply, out) {
        defmt::warn!("control: response exceeded {} bytes", RESPONSE_CAPACITY);
    }
}
