#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use vitals_sampler::{
    tasks::{build_session, sampler_task, FirmwareSession},
    Board,
};

// The session carries the payload buffer, keep it out of the task arena
static SESSION: StaticCell<FirmwareSession> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("=== vitals-sampler: PPG & temperature ===");
    let board = Board::init();

    let session = SESSION.init_with(|| build_session(board));
    spawner.spawn(sampler_task(session)).unwrap();
    info!("Sampler task spawned on main executor");

    core::future::pending::<()>().await;
}
