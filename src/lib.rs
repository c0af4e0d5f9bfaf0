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

#![no_std]
#![forbid(unsafe_op_in_unsafe_fn)]

pub mod console;
pub mod nonvolatile;
pub mod weight;

pub use embassy_nrf::pac;
pub use nrf52840_hal as blocking_hal;
use panic_probe as _;

#[cfg(not(feature = "nrf52840"))]
compile_error!("the USB console needs the nRF52840, enable feature `nrf52840`");

embassy_nrf::bind_interrupts!(pub struct Irqs {
    USBD => embassy_nrf::usb::InterruptHandler<embassy_nrf::peripherals::USBD>;
    POWER_CLOCK => embassy_nrf::usb::vbus_detect::InterruptHandler;
});
