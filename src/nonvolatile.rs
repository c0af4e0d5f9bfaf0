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

//! Calibration record in internal Flash
//!
//! One 4kB page is reserved at the end of application Flash (see memory.x). The record is stored
//! as is, followed by a CRC-32 of the record in the last word of the page. An erased page or a
//! checksum mismatch reads back as NaN, which the calibration store treats as "nothing stored".

use aligned::{Aligned, A32};
use as_slice::AsMutSlice;
use bytemuck_derive::{Pod, Zeroable};
use crc::{Crc, CRC_32_ISCSI};
use embassy_nrf::nvmc::Nvmc;
use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};
use thrustcell_core::NonVolatile;

/// Address of start of Flash page
const MIN_ADDR: u32 = 0xDF000;
/// Address of start of next Flash page
const MAX_ADDR: u32 = 0xE0000;
const CHECKSUM_ADDR: u32 = MAX_ADDR - 4;

/// Data stored in Flash
///
/// Adding fields changes the checksum, which makes previously stored records read back as absent.
#[derive(Copy, Clone, Pod, Zeroable)]
#[repr(C, packed)]
struct Record {
    calibration_factor: f32,
}
// Nvmc writes whole words
type AlignedRecord = Aligned<A32, Record>;

const _: () = assert!(core::mem::size_of::<Record>() % 4 == 0);
const _: () = assert!(core::mem::size_of::<Record>() + 4 <= (MAX_ADDR - MIN_ADDR) as usize);

const ABSENT: Record = Record {
    calibration_factor: f32::NAN,
};

fn checksum(bytes: &[u8]) -> [u8; 4] {
    let crc = Crc::<u32>::new(&CRC_32_ISCSI);
    crc.checksum(bytes).to_le_bytes()
}

pub struct Nvm {
    flash: Nvmc<'static>,
    staged: AlignedRecord,
    dirty: bool,
}

impl Nvm {
    pub fn new(flash: Nvmc<'static>) -> Self {
        Self {
            flash,
            staged: Aligned(ABSENT),
            dirty: false,
        }
    }

    /// Read the committed record straight from Flash
    fn load(&mut self) -> Record {
        let mut record: AlignedRecord = Aligned(ABSENT);
        let mut stored_checksum: Aligned<A32, [u8; 4]> = Aligned::default();
        if let Err(e) = self
            .flash
            .read(MIN_ADDR, bytemuck::bytes_of_mut(&mut *record))
            .and_then(|()| self.flash.read(CHECKSUM_ADDR, stored_checksum.as_mut_slice()))
        {
            defmt::error!("Flash read failed: {}", e);
            return ABSENT;
        }
        if *stored_checksum != checksum(bytemuck::bytes_of(&*record)) {
            defmt::info!("No calibration record in Flash");
            return ABSENT;
        }
        *record
    }

    fn commit(&mut self) -> Result<(), embassy_nrf::nvmc::Error> {
        let raw_record = bytemuck::bytes_of(&*self.staged);
        let mut aligned_checksum: Aligned<A32, [u8; 4]> = Aligned::default();
        *aligned_checksum = checksum(raw_record);
        self.flash.erase(MIN_ADDR, MAX_ADDR)?;
        self.flash.write(MIN_ADDR, raw_record)?;
        self.flash.write(CHECKSUM_ADDR, &*aligned_checksum)
    }
}

impl NonVolatile for Nvm {
    fn read_cal_factor(&mut self) -> f32 {
        let record = self.load();
        record.calibration_factor
    }

    fn write_cal_factor(&mut self, value: f32) {
        self.staged.calibration_factor = value;
        self.dirty = true;
    }

    fn flush(&mut self) {
        if !self.dirty {
            return;
        }
        match self.commit() {
            Ok(()) => defmt::info!("Calibration record written"),
            // The caller's readback shows the operator what actually got stored
            Err(e) => defmt::error!("Flash write failed: {}", e),
        }
        self.dirty = false;
    }
}
