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

//! Collaborators the control loop talks to
//!
//! The firmware implements these for the HX711, the USB console and internal Flash. Tests
//! implement them with scripted fakes.

#![allow(async_fn_in_trait)]

/// Driver-level failure reported by [`LoadCell::start`]. Fatal at startup.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorFault {
    /// The startup tare did not collect a full dataset in time
    TareTimeout,
    /// The ADC stopped signalling conversions
    SignalTimeout,
}

/// Strain-gauge amplifier with smoothing, tare and scale factor
///
/// Construction plays the role of `begin()`.
pub trait LoadCell {
    /// Power up, let the signal settle for `stabilization_ms` and optionally tare. Check
    /// [`tare_timed_out`](Self::tare_timed_out) and
    /// [`signal_timed_out`](Self::signal_timed_out) afterwards.
    async fn start(&mut self, stabilization_ms: u32, tare: bool);

    /// Service the ADC. Returns true if a new conversion was added to the dataset.
    fn update(&mut self) -> bool;

    /// Smoothed, tared reading divided by the calibration factor
    fn data(&self) -> f32;

    /// Request a tare that completes after a full dataset of fresh conversions
    fn tare_no_delay(&mut self);

    /// Returns true once per completed [`tare_no_delay`](Self::tare_no_delay) request
    fn tare_status(&mut self) -> bool;

    fn tare_timed_out(&self) -> bool;

    fn signal_timed_out(&self) -> bool;

    /// Replace the whole dataset with fresh conversions
    async fn refresh_data_set(&mut self);

    /// Compute and apply the factor that makes the current reading equal `known_mass`
    fn new_calibration(&mut self, known_mass: f32) -> f32;

    fn set_cal_factor(&mut self, factor: f32);

    fn cal_factor(&self) -> f32;
}

/// Single interactive text channel to the operator
pub trait Console: core::fmt::Write {
    /// Next pending byte, if any
    fn read(&mut self) -> Option<u8>;

    /// Next pending byte without consuming it
    fn peek(&mut self) -> Option<u8>;

    fn available(&mut self) -> bool {
        self.peek().is_some()
    }
}

/// Byte store holding the calibration record
pub trait NonVolatile {
    /// Read the committed value. Uninitialized or corrupt storage reads back as NaN.
    fn read_cal_factor(&mut self) -> f32;

    /// Stage a new value. Nothing is persisted until [`flush`](Self::flush).
    fn write_cal_factor(&mut self, value: f32);

    fn flush(&mut self);
}
