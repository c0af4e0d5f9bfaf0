// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![no_main]
#![no_std]
#![forbid(unsafe_op_in_unsafe_fn)]

use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::{
    config::{Config, HfclkSource, LfclkSource},
    gpio::{self, Pin},
    nvmc::Nvmc,
};
use static_cell::StaticCell;
use thrustcell::{
    blocking_hal::Delay as SysTickDelay,
    console::{self, Pipes, UsbConsole},
    nonvolatile::Nvm,
    pac,
    weight::{self, Hx711},
};

fn config() -> Config {
    let mut config = Config::default();
    // USB needs the crystal
    config.hfclk_source = HfclkSource::ExternalXtal;
    config.lfclk_source = LfclkSource::ExternalXtal;
    config
}

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    defmt::println!("Start {=str}!", core::env!("CARGO_BIN_NAME"));

    let p = embassy_nrf::init(config());
    let Some(core_peripherals) = pac::CorePeripherals::take() else {
        defmt::panic!("Core peripherals already taken");
    };
    let delay = SysTickDelay::new(core_peripherals.SYST);

    // DOUT 0.17
    let hx711_data = gpio::Input::new(p.P0_17.degrade(), gpio::Pull::None);
    // PD_SCK 0.20
    let hx711_clock = gpio::Output::new(
        p.P0_20.degrade(),
        // Set high initially to power down chip
        gpio::Level::High,
        gpio::OutputDrive::Standard,
    );
    let hx711 = Hx711::new(hx711_data, hx711_clock, delay);

    let nvm = Nvm::new(Nvmc::new(p.NVMC));

    static PIPES: StaticCell<Pipes> = StaticCell::new();
    let pipes: &'static Pipes = PIPES.init(Pipes::new());
    let (usb, class) = console::board::setup_usb(p.USBD);
    spawner.must_spawn(console::task::usb_task(usb));
    spawner.must_spawn(console::task::bridge_task(class, pipes));

    spawner.must_spawn(weight::task_function(
        thrustcell_core::Config::default(),
        hx711,
        nvm,
        UsbConsole::new(pipes),
    ));

    loop {
        core::future::pending::<()>().await;
    }
}
