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

//! Operator console over USB CDC-ACM
//!
//! The USB tasks move bytes between the host and two pipes. The control task only ever touches
//! the pipes through [`UsbConsole`], which never waits: input is polled and a line that doesn't
//! fit is dropped whole.

pub mod board;
pub mod task;

use embassy_nrf::peripherals::USBD;
use embassy_nrf::usb::vbus_detect::HardwareVbusDetect;
use embassy_nrf::usb::Driver;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;
use thrustcell_core::Console;

pub type UsbDriver = Driver<'static, USBD, HardwareVbusDetect>;

/// Full-speed bulk endpoint size
pub const MAX_PACKET_SIZE: u16 = 64;
const RX_BUFFER_SIZE: usize = 256;
// Room for the help text plus a few readings while the host isn't reading
const TX_BUFFER_SIZE: usize = 1024;

pub struct Pipes {
    rx: Pipe<CriticalSectionRawMutex, RX_BUFFER_SIZE>,
    tx: Pipe<CriticalSectionRawMutex, TX_BUFFER_SIZE>,
}

impl Pipes {
    pub const fn new() -> Self {
        Self {
            rx: Pipe::new(),
            tx: Pipe::new(),
        }
    }
}

impl Default for Pipes {
    fn default() -> Self {
        Self::new()
    }
}

pub struct UsbConsole {
    pipes: &'static Pipes,
    peeked: Option<u8>,
    /// Bytes of output lost to a full transmit pipe
    dropped: usize,
    dropping: bool,
}

impl UsbConsole {
    pub fn new(pipes: &'static Pipes) -> Self {
        Self {
            pipes,
            peeked: None,
            dropped: 0,
            dropping: false,
        }
    }
}

impl core::fmt::Write for UsbConsole {
    /// Writes all of `s` or, if the pipe can't take all of it, none of it
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        if s.len() > self.pipes.tx.free_capacity() {
            self.dropped += s.len();
            if !self.dropping {
                defmt::warn!("Console output dropped, {} bytes so far", self.dropped);
                self.dropping = true;
            }
            return Ok(());
        }
        self.dropping = false;
        // Only the bridge task drains the pipe, so the space checked above stays free
        let mut bytes = s.as_bytes();
        while let Ok(n) = self.pipes.tx.try_write(bytes) {
            bytes = &bytes[n..];
            if bytes.is_empty() {
                break;
            }
        }
        Ok(())
    }
}

impl Console for UsbConsole {
    fn read(&mut self) -> Option<u8> {
        self.peek();
        self.peeked.take()
    }

    fn peek(&mut self) -> Option<u8> {
        if self.peeked.is_none() {
            let mut byte = [0];
            if let Ok(1) = self.pipes.rx.try_read(&mut byte) {
                self.peeked = Some(byte[0]);
            }
        }
        self.peeked
    }
}
