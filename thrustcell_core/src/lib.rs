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

//! Hardware-independent control loop for a single-channel load-cell instrument
//!
//! Everything in here runs on the host under `cargo test`. The firmware supplies the three
//! collaborators in [`ports`] (ADC driver, operator console, non-volatile storage) and calls
//! [`Instrument::poll`] from its control task.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_op_in_unsafe_fn)]

#[macro_use]
mod log;
#[macro_use]
pub mod output;
pub mod calibration;
pub mod config;
pub mod dispatcher;
pub mod input;
pub mod ports;
pub mod scheduler;
pub mod smoothing;
pub mod store;
#[cfg(test)]
mod testing;

pub use config::Config;
pub use dispatcher::Instrument;
pub use ports::{Console, LoadCell, NonVolatile, SensorFault};

/// Convert a signed integer in a u32 container to a signed integer
pub const fn convert_signed_to_i32<const BITS: u32>(mut input: u32) -> i32 {
    assert!(input < (1 << BITS), "Out of range");
    // Extend sign bits if negative
    if input & (1 << (BITS - 1)) != 0 {
        input |= u32::MAX & !((1 << BITS) - 1);
    }
    input as i32
}
