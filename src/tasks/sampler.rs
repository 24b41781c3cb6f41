use embassy_executor::task;
use embassy_futures::yield_now;
use embassy_stm32::usart::BufferedUart;
use embassy_time::{Duration, Instant};

use crate::board::Board;
use crate::clock::SystemClock;
use crate::config::{Config, DEVICE_ID, UPLINK_REPLY_TIMEOUT_MS};
use crate::cycle::CycleState;
use crate::drivers::{create_default_ppg, Max30102, Max30205};
use crate::session::Session;
use crate::source::{Acquisition, Mode};
use crate::uplink::UartUplink;

// Anything slower eats into the 10ms PPG period noticeably
const SLOW_ITERATION: Duration = Duration::from_millis(1);

pub type FirmwareSession = Session<
    Acquisition<Max30102, Max30205>,
    UartUplink<BufferedUart<'static>, SystemClock>,
    SystemClock,
>;

/// Probe the peripherals, fix the acquisition mode for the rest of the run
/// and build the session.
pub fn build_session(board: Board) -> FirmwareSession {
    let ppg = create_default_ppg(board.sensor_bus);
    let temperature = Max30205::new(board.sensor_bus);

    let mut uplink = UartUplink::new(board.uplink, SystemClock, DEVICE_ID, UPLINK_REPLY_TIMEOUT_MS);
    let link_up = uplink.probe();
    if !link_up {
        warn!("uplink unavailable, publishing disabled for this session");
    }

    let mode = Mode::probe(ppg.is_some(), link_up);
    // the uptime at this point depends on probe timing, good enough to seed noise
    let seed = Instant::now().as_ticks();
    let source = Acquisition::select(mode, ppg, temperature, seed);

    Session::new(Config::DEFAULT, source, uplink, SystemClock)
}

#[task]
pub async fn sampler_task(session: &'static mut FirmwareSession) {
    info!("sampler task started in {:?} mode", session.mode());
    let mut state = session.state();
    let mut iterations = 0u32;
    let mut max_iteration_us = 0u64;

    loop {
        let start = Instant::now();
        let next = session.poll();
        let elapsed_us = start.elapsed().as_micros();
        if elapsed_us > max_iteration_us {
            max_iteration_us = elapsed_us;
        }
        iterations = iterations.wrapping_add(1);

        if next != state {
            if state == CycleState::Collecting {
                info!(
                    "collection loop: {} iterations, worst {}us, uplink retries left {}",
                    iterations,
                    max_iteration_us,
                    session.link().attempts_left()
                );
            }
            iterations = 0;
            max_iteration_us = 0;
            state = next;
        }

        if state == CycleState::Collecting && elapsed_us > SLOW_ITERATION.as_micros() {
            debug!("slow iteration: {}us", elapsed_us);
        }
        yield_now().await;
    }
}
