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

use crate::ports::NonVolatile;

pub const DEFAULT_CAL_FACTOR: f32 = 1.0;

/// Where the active calibration factor came from at boot
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FactorSource {
    Stored,
    Default,
}

/// A factor that is zero, NaN or infinite would make every reading meaningless
pub fn is_valid_factor(factor: f32) -> bool {
    factor.is_finite() && factor != 0.0
}

/// The one persisted calibration factor
///
/// Writes only happen on explicit operator confirmation, so there's no wear leveling.
pub struct CalibrationStore<N> {
    nvm: N,
    default_factor: f32,
}

impl<N: NonVolatile> CalibrationStore<N> {
    pub fn new(nvm: N, default_factor: f32) -> Self {
        Self {
            nvm,
            default_factor,
        }
    }

    /// Stored factor, or the default if storage holds nothing usable
    pub fn load(&mut self) -> (f32, FactorSource) {
        let stored = self.nvm.read_cal_factor();
        if is_valid_factor(stored) {
            info!("Loaded calibration factor {}", stored);
            (stored, FactorSource::Stored)
        } else {
            info!("No valid calibration factor stored, using {}", self.default_factor);
            (self.default_factor, FactorSource::Default)
        }
    }

    /// Persist `factor` and return what storage actually holds afterwards
    pub fn save(&mut self, factor: f32) -> f32 {
        self.nvm.write_cal_factor(factor);
        self.nvm.flush();
        let stored = self.nvm.read_cal_factor();
        if stored.to_bits() != factor.to_bits() {
            error!("Readback mismatch: wrote {} read {}", factor, stored);
        }
        stored
    }

    pub fn nvm(&self) -> &N {
        &self.nvm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryNvm;

    #[test]
    fn invalid_stored_values_fall_back_to_default() {
        for raw in [f32::NAN, 0.0, -0.0, f32::INFINITY, f32::NEG_INFINITY] {
            let mut store = CalibrationStore::new(MemoryNvm::holding(raw), DEFAULT_CAL_FACTOR);
            assert_eq!(store.load(), (1.0, FactorSource::Default));
        }
    }

    #[test]
    fn erased_flash_is_nan() {
        let erased = f32::from_bits(u32::MAX);
        let mut store = CalibrationStore::new(MemoryNvm::holding(erased), 1.0);
        assert_eq!(store.load().1, FactorSource::Default);
    }

    #[test]
    fn stored_value_used_as_is() {
        let mut store = CalibrationStore::new(MemoryNvm::holding(-696.0), 1.0);
        assert_eq!(store.load(), (-696.0, FactorSource::Stored));
    }

    #[test]
    fn save_then_load() {
        let mut store = CalibrationStore::new(MemoryNvm::erased(), 1.0);
        for factor in [250.5, -12.75, 1e-3, 7.0e6] {
            assert_eq!(store.save(factor), factor);
            assert_eq!(store.load(), (factor, FactorSource::Stored));
        }
        assert_eq!(store.nvm().flushes, 4);
    }

    #[test]
    fn save_reports_readback_not_input() {
        let mut nvm = MemoryNvm::erased();
        nvm.stuck_at = Some(42.0);
        let mut store = CalibrationStore::new(nvm, 1.0);
        assert_eq!(store.save(250.5), 42.0);
    }
}
