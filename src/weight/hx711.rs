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

//! Hx711 driver using embassy_nrf-friendly types
//!
//! Runs at 80 SPS (RATE pin high) on channel A with a gain of 128.

use crate::blocking_hal::prelude::_embedded_hal_blocking_delay_DelayUs;
use crate::blocking_hal::Delay as SysTickDelay;
use embassy_nrf::gpio::{AnyPin, Input, Output};
use embassy_time::{with_timeout, Duration, Instant, Timer};
use thrustcell_core::convert_signed_to_i32;
use thrustcell_core::smoothing::{Smoother, DATASET_SIZE};
use thrustcell_core::LoadCell;

/// Longest gap between conversions at 80 SPS before the ADC is considered gone
const SIGNAL_TIMEOUT: Duration = Duration::from_millis(100);
/// A blocking tare has this long per conversion in its dataset
const TARE_TIMEOUT_PER_SAMPLE: Duration = Duration::from_millis(150);
/// The HX711 sometimes spontaneously returns -1 (0xFFFFFF)
const MAX_CONSECUTIVE_SKIPS: usize = 3;

pub struct Hx711<'d> {
    data: Input<'d, AnyPin>,
    clock: Output<'d, AnyPin>,
    delay: SysTickDelay,
    smoother: Smoother,
    last_conversion: Instant,
    n_skips: usize,
    tare_timed_out: bool,
    signal_timed_out: bool,
}

impl<'d> Hx711<'d> {
    pub fn new(
        data: Input<'d, AnyPin>,
        mut clock: Output<'d, AnyPin>,
        delay: SysTickDelay,
    ) -> Self {
        // Held high, the chip stays powered down until `start`
        clock.set_high();
        Self {
            data,
            clock,
            delay,
            smoother: Smoother::new(),
            last_conversion: Instant::now(),
            n_skips: 0,
            tare_timed_out: false,
            signal_timed_out: false,
        }
    }

    async fn power_up(&mut self) {
        self.clock.set_low();
        // Typical output settling time is 400ms at 10Hz or 50ms at 80Hz sample rate
        Timer::after(Duration::from_millis(50)).await;
        self.last_conversion = Instant::now();
    }

    /// Clock out one 24-bit conversion. Only valid while DOUT is low.
    fn shift_in(&mut self) -> u32 {
        let delay = &mut self.delay;
        let clock = &mut self.clock;
        let data = &self.data;
        // Use a critical section to minimize the chance of interrupts causing unexpected delays.
        // Holding the clock high for more than 60us powers the chip down.
        critical_section::with(|_| {
            let mut reading = 0;
            for i in (0..24).rev() {
                clock.set_high();
                delay.delay_us(1_u8);
                if data.is_high() {
                    reading |= 1 << i;
                }
                delay.delay_us(1_u8);
                clock.set_low();
                delay.delay_us(1_u8);
            }

            // Additional pulses
            // 1 => (CH1) gain = 128
            // 2 => (CH2) gain = 32 (not connected)
            // 3 => (CH1) gain = 64
            let n_pulses = 1;
            for _ in 0..n_pulses {
                clock.set_high();
                delay.delay_us(1_u8);
                clock.set_low();
                delay.delay_us(1_u8);
            }
            reading
        })
    }

    /// Read a ready conversion into the dataset. Returns false if it was skipped.
    fn convert(&mut self) -> bool {
        let value = convert_signed_to_i32::<24>(self.shift_in());
        self.last_conversion = Instant::now();
        if value == -1 && self.n_skips < MAX_CONSECUTIVE_SKIPS {
            self.n_skips += 1;
            defmt::info!("Skipping -1 reading");
            return false;
        }
        self.n_skips = 0;
        defmt::trace!("Raw = {}", value);
        self.smoother.add_sample(value);
        true
    }

    /// Wait for the next conversion and add it to the dataset
    async fn next_conversion(&mut self) -> bool {
        loop {
            if with_timeout(SIGNAL_TIMEOUT, self.data.wait_for_low()).await.is_err() {
                defmt::error!("HX711 stopped signalling conversions");
                self.signal_timed_out = true;
                return false;
            }
            if self.convert() {
                return true;
            }
        }
    }
}

impl<'d> LoadCell for Hx711<'d> {
    async fn start(&mut self, stabilization_ms: u32, tare: bool) {
        self.power_up().await;
        let settled = Instant::now() + Duration::from_millis(stabilization_ms.into());
        while Instant::now() < settled {
            if !self.next_conversion().await {
                return;
            }
        }
        if !tare {
            return;
        }

        self.smoother.request_tare();
        let deadline = Instant::now() + TARE_TIMEOUT_PER_SAMPLE * DATASET_SIZE as u32;
        while self.smoother.tare_in_progress() {
            if Instant::now() > deadline {
                defmt::error!("Startup tare timed out");
                self.tare_timed_out = true;
                return;
            }
            if !self.next_conversion().await {
                return;
            }
        }
        // Only operator-requested tares are reported
        self.smoother.take_tare_status();
    }

    fn update(&mut self) -> bool {
        if self.data.is_low() {
            return self.convert();
        }
        if self.last_conversion.elapsed() > SIGNAL_TIMEOUT && !self.signal_timed_out {
            defmt::warn!("No HX711 conversion for {} ms", SIGNAL_TIMEOUT.as_millis());
            self.signal_timed_out = true;
        }
        false
    }

    fn data(&self) -> f32 {
        self.smoother.data()
    }

    fn tare_no_delay(&mut self) {
        self.smoother.request_tare();
    }

    fn tare_status(&mut self) -> bool {
        self.smoother.take_tare_status()
    }

    fn tare_timed_out(&self) -> bool {
        self.tare_timed_out
    }

    fn signal_timed_out(&self) -> bool {
        self.signal_timed_out
    }

    async fn refresh_data_set(&mut self) {
        for _ in 0..DATASET_SIZE {
            if !self.next_conversion().await {
                return;
            }
        }
    }

    fn new_calibration(&mut self, known_mass: f32) -> f32 {
        self.smoother.new_calibration(known_mass)
    }

    fn set_cal_factor(&mut self, factor: f32) {
        self.smoother.set_cal_factor(factor);
    }

    fn cal_factor(&self) -> f32 {
        self.smoother.cal_factor()
    }
}
