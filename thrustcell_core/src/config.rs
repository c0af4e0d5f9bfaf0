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

use crate::store::DEFAULT_CAL_FACTOR;

/// Build-time settings for an [`Instrument`](crate::Instrument)
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Period between emitted readings until the operator picks another frequency
    pub sample_interval_ms: u32,
    /// How long the ADC converts after power-up before the startup tare
    pub stabilization_ms: u32,
    /// How long the `f` command waits for a frequency
    pub frequency_prompt_timeout_ms: u32,
    /// A number being typed is complete once no byte has arrived for this long
    pub parse_timeout_ms: u32,
    /// Used when storage holds no valid calibration factor
    pub default_cal_factor: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_interval_ms: 100,
            stabilization_ms: 2000,
            frequency_prompt_timeout_ms: 5000,
            parse_timeout_ms: 1000,
            default_cal_factor: DEFAULT_CAL_FACTOR,
        }
    }
}
