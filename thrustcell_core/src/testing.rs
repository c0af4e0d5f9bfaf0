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

//! Scripted stand-ins for the hardware

use crate::ports::{Console, LoadCell, NonVolatile};
use crate::store::is_valid_factor;
use std::collections::VecDeque;

/// Load cell whose readings and calibration results are set by the test
#[derive(Debug)]
pub struct FakeLoadCell {
    pub reading: f32,
    pub cal_factor: f32,
    /// Returned (and applied) by the next `new_calibration`
    pub next_calibration: f32,
    pub tare_timeout: bool,
    pub signal_timeout: bool,
    pub starts: usize,
    pub updates: usize,
    pub tare_requests: usize,
    pub refreshes: usize,
    pub known_masses: Vec<f32>,
    tare_pending: bool,
    tare_complete: bool,
}

impl FakeLoadCell {
    pub fn new() -> Self {
        Self {
            reading: 0.0,
            cal_factor: 1.0,
            next_calibration: 1.0,
            tare_timeout: false,
            signal_timeout: false,
            starts: 0,
            updates: 0,
            tare_requests: 0,
            refreshes: 0,
            known_masses: Vec::new(),
            tare_pending: false,
            tare_complete: false,
        }
    }
}

impl LoadCell for FakeLoadCell {
    async fn start(&mut self, _stabilization_ms: u32, _tare: bool) {
        self.starts += 1;
    }

    /// A requested tare completes on the following update
    fn update(&mut self) -> bool {
        self.updates += 1;
        if self.tare_pending {
            self.tare_pending = false;
            self.tare_complete = true;
        }
        true
    }

    fn data(&self) -> f32 {
        self.reading
    }

    fn tare_no_delay(&mut self) {
        self.tare_requests += 1;
        self.tare_pending = true;
    }

    fn tare_status(&mut self) -> bool {
        core::mem::take(&mut self.tare_complete)
    }

    fn tare_timed_out(&self) -> bool {
        self.tare_timeout
    }

    fn signal_timed_out(&self) -> bool {
        self.signal_timeout
    }

    async fn refresh_data_set(&mut self) {
        self.refreshes += 1;
    }

    fn new_calibration(&mut self, known_mass: f32) -> f32 {
        self.known_masses.push(known_mass);
        if is_valid_factor(self.next_calibration) {
            self.cal_factor = self.next_calibration;
        }
        self.next_calibration
    }

    fn set_cal_factor(&mut self, factor: f32) {
        self.cal_factor = factor;
    }

    fn cal_factor(&self) -> f32 {
        self.cal_factor
    }
}

/// Console fed from a byte queue, capturing everything written
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    input: VecDeque<u8>,
    pub output: String,
}

impl ScriptedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_str(&mut self, s: &str) {
        self.input.extend(s.bytes());
    }

    /// Everything written since the last call
    pub fn take_output(&mut self) -> String {
        core::mem::take(&mut self.output)
    }
}

impl core::fmt::Write for ScriptedConsole {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.output.push_str(s);
        Ok(())
    }
}

impl Console for ScriptedConsole {
    fn read(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn peek(&mut self) -> Option<u8> {
        self.input.front().copied()
    }
}

/// Storage that commits staged values on flush
#[derive(Debug)]
pub struct MemoryNvm {
    committed: f32,
    staged: Option<f32>,
    pub flushes: usize,
    /// Simulate a cell that doesn't take writes
    pub stuck_at: Option<f32>,
}

impl MemoryNvm {
    pub fn holding(value: f32) -> Self {
        Self {
            committed: value,
            staged: None,
            flushes: 0,
            stuck_at: None,
        }
    }

    pub fn erased() -> Self {
        Self::holding(f32::from_bits(u32::MAX))
    }

    pub fn committed(&self) -> f32 {
        self.committed
    }
}

impl NonVolatile for MemoryNvm {
    fn read_cal_factor(&mut self) -> f32 {
        self.committed
    }

    fn write_cal_factor(&mut self, value: f32) {
        self.staged = Some(value);
    }

    fn flush(&mut self) {
        self.flushes += 1;
        if let Some(value) = self.staged.take() {
            self.committed = self.stuck_at.unwrap_or(value);
        }
    }
}
