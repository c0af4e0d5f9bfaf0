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

use super::Hx711;
use crate::console::UsbConsole;
use crate::nonvolatile::Nvm;
use embassy_time::{Duration, Instant, Timer};
use thrustcell_core::{Config, Instrument};

/// Give the USB tasks a chance to run between passes
const THREAD_SLEEP_DELAY: Duration = Duration::from_millis(1);

fn now_ms() -> u64 {
    Instant::now().as_millis()
}

#[embassy_executor::task]
pub async fn task_function(config: Config, adc: Hx711<'static>, nvm: Nvm, console: UsbConsole) {
    defmt::info!("Starting control task: {}", config);
    let mut instrument = Instrument::new(config, adc, console, nvm, now_ms());

    match instrument.startup(now_ms()).await {
        Ok(source) => defmt::info!("Calibration factor source: {}", source),
        Err(fault) => {
            defmt::error!("Halting on sensor fault: {}", fault);
            // The console keeps running so the operator can read the fault
            core::future::pending::<()>().await;
        }
    }

    loop {
        instrument.poll(now_ms()).await;
        Timer::after(THREAD_SLEEP_DELAY).await;
    }
}
