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

//! ADC-side arithmetic for a load-cell driver: moving average, tare offset and scale factor
//!
//! reading = (average(dataset) - tare_offset) / cal_factor

use crate::store::{is_valid_factor, DEFAULT_CAL_FACTOR};

/// Number of conversions averaged into one reading
pub const DATASET_SIZE: usize = 16;

type RawReading = i32;

/// Sliding window over the last [`DATASET_SIZE`] raw conversions
#[derive(Debug)]
struct Dataset {
    samples: [RawReading; DATASET_SIZE],
    next: usize,
    n_samples: usize,
    accumulator: i64,
}

impl Dataset {
    const fn new() -> Self {
        Self {
            samples: [0; DATASET_SIZE],
            next: 0,
            n_samples: 0,
            accumulator: 0,
        }
    }

    fn add_sample(&mut self, sample: RawReading) {
        if self.n_samples == DATASET_SIZE {
            self.accumulator -= i64::from(self.samples[self.next]);
        } else {
            self.n_samples += 1;
        }
        self.samples[self.next] = sample;
        self.accumulator += i64::from(sample);
        self.next = (self.next + 1) % DATASET_SIZE;
    }

    fn average(&self) -> f64 {
        if self.n_samples == 0 {
            return 0.0;
        }
        self.accumulator as f64 / self.n_samples as f64
    }
}

#[derive(Debug)]
pub struct Smoother {
    dataset: Dataset,
    tare_offset: f64,
    /// Conversions still needed before a requested tare completes
    tare_remaining: Option<usize>,
    tare_complete: bool,
    cal_factor: f32,
}

impl Default for Smoother {
    fn default() -> Self {
        Self::new()
    }
}

impl Smoother {
    pub const fn new() -> Self {
        Self {
            dataset: Dataset::new(),
            tare_offset: 0.0,
            tare_remaining: None,
            tare_complete: false,
            cal_factor: DEFAULT_CAL_FACTOR,
        }
    }

    pub fn add_sample(&mut self, raw: RawReading) {
        self.dataset.add_sample(raw);
        if let Some(remaining) = self.tare_remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                self.tare_offset = self.dataset.average();
                self.tare_remaining = None;
                self.tare_complete = true;
                debug!("Tare offset {}", self.tare_offset);
            }
        }
    }

    /// The next full dataset of conversions becomes the new zero
    pub fn request_tare(&mut self) {
        self.tare_remaining = Some(DATASET_SIZE);
    }

    pub fn tare_in_progress(&self) -> bool {
        self.tare_remaining.is_some()
    }

    /// Reports a completed tare once
    pub fn take_tare_status(&mut self) -> bool {
        core::mem::take(&mut self.tare_complete)
    }

    pub fn data(&self) -> f32 {
        ((self.dataset.average() - self.tare_offset) / f64::from(self.cal_factor)) as f32
    }

    pub fn cal_factor(&self) -> f32 {
        self.cal_factor
    }

    /// Zero and non-finite factors are ignored
    pub fn set_cal_factor(&mut self, factor: f32) {
        if is_valid_factor(factor) {
            self.cal_factor = factor;
        } else {
            warn!("Ignoring calibration factor {}", factor);
        }
    }

    /// Factor that turns the current reading into `known_mass`. Applied if it is usable.
    pub fn new_calibration(&mut self, known_mass: f32) -> f32 {
        let factor = self.data() * self.cal_factor / known_mass;
        self.set_cal_factor(factor);
        factor
    }
}
