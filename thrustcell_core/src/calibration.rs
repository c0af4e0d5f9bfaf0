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

//! Operator-attended calibration dialogs
//!
//! Each dialog is polled once per main-loop iteration and owns the console until it is done.
//! Nothing here times out: the instrument waits for the operator.

use crate::input::{read_decision, Decision, NumberReader};
use crate::ports::{Console, LoadCell, NonVolatile};
use crate::store::{is_valid_factor, CalibrationStore};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    AwaitingTare,
    AwaitingKnownMass,
    AwaitingSaveDecision,
    Done,
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// The driver finished a tare
    TareComplete,
    /// The operator entered a reference mass. 0 means nothing was entered.
    KnownMass(f32),
    Decision(Decision),
}

impl Stage {
    /// Events that don't belong to the current stage are ignored
    pub fn step(self, event: Event) -> Self {
        match (self, event) {
            (Stage::AwaitingTare, Event::TareComplete) => Stage::AwaitingKnownMass,
            (Stage::AwaitingKnownMass, Event::KnownMass(mass)) if is_reference_mass(mass) => {
                Stage::AwaitingSaveDecision
            }
            (Stage::AwaitingSaveDecision, Event::Decision(_)) => Stage::Done,
            (stage, _) => stage,
        }
    }

    pub fn is_done(self) -> bool {
        self == Stage::Done
    }
}

// Zero reads as "nothing entered yet", so a zero reference mass can't be used
fn is_reference_mass(mass: f32) -> bool {
    mass != 0.0 && mass.is_finite()
}

fn prompt_save<C: Console>(console: &mut C) {
    say!(console, "Save this value to calibration storage? y/n");
}

fn settle_save<C, N>(
    decision: Decision,
    factor: f32,
    console: &mut C,
    store: &mut CalibrationStore<N>,
) where
    C: Console,
    N: NonVolatile,
{
    match decision {
        Decision::Save => {
            let stored = store.save(factor);
            say!(console, "Value {} saved to calibration storage", stored);
            if stored.to_bits() != factor.to_bits() {
                say!(console, "Warning: wrote {} but storage reads back {}", factor, stored);
            }
        }
        Decision::Discard => {
            say!(console, "Value not saved, it stays active until restart");
        }
    }
}

/// Tare, then a known mass, then save or discard the resulting factor
#[derive(Debug)]
pub struct CalibrationSession {
    stage: Stage,
    mass_reader: NumberReader,
    known_mass: Option<f32>,
    new_factor: Option<f32>,
}

impl CalibrationSession {
    pub fn begin<C: Console>(console: &mut C, parse_timeout_ms: u32) -> Self {
        info!("Calibration started");
        say!(console, "***");
        say!(console, "Start calibration:");
        say!(console, "Place the load cell on a level, stable surface.");
        say!(console, "Remove any load applied to the load cell.");
        say!(console, "Send 't' to set the tare offset.");
        Self {
            stage: Stage::AwaitingTare,
            mass_reader: NumberReader::new(parse_timeout_ms),
            known_mass: None,
            new_factor: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[cfg(test)]
    pub(crate) fn known_mass(&self) -> Option<f32> {
        self.known_mass
    }

    pub fn new_factor(&self) -> Option<f32> {
        self.new_factor
    }

    fn advance(&mut self, event: Event) -> Stage {
        let next = self.stage.step(event);
        if next != self.stage {
            debug!("Calibration {} -> {}", self.stage, next);
        }
        self.stage = next;
        next
    }

    pub async fn poll<L, C, N>(
        &mut self,
        now_ms: u64,
        loadcell: &mut L,
        console: &mut C,
        store: &mut CalibrationStore<N>,
    ) -> Stage
    where
        L: LoadCell,
        C: Console,
        N: NonVolatile,
    {
        match self.stage {
            Stage::AwaitingTare => {
                loadcell.update();
                if console.read() == Some(b't') {
                    loadcell.tare_no_delay();
                }
                if loadcell.tare_status() {
                    self.advance(Event::TareComplete);
                    say!(console, "Tare complete");
                    say!(console, "Now, place your known mass on the load cell.");
                    say!(console, "Then send the mass of this reference (e.g. 100.0).");
                }
            }
            Stage::AwaitingKnownMass => {
                loadcell.update();
                let Some(mass) = self.mass_reader.poll(console, now_ms) else {
                    return self.stage;
                };
                if self.stage.step(Event::KnownMass(mass)) != Stage::AwaitingSaveDecision {
                    return self.stage;
                }
                say!(console, "Known mass is: {}", mass);
                loadcell.refresh_data_set().await;
                let factor = loadcell.new_calibration(mass);
                if !is_valid_factor(factor) {
                    warn!("Calibration against {} gave factor {}", mass, factor);
                    say!(console, "Calibration factor {} is unusable, nothing changed.", factor);
                    say!(console, "Check that the known mass is on the load cell.");
                    say!(console, "Then send the mass of this reference (e.g. 100.0).");
                    return self.stage;
                }
                self.advance(Event::KnownMass(mass));
                self.known_mass = Some(mass);
                self.new_factor = Some(factor);
                say!(console, "New calibration factor has been set to: {}", factor);
                prompt_save(console);
            }
            Stage::AwaitingSaveDecision => {
                let Some(decision) = read_decision(console) else {
                    return self.stage;
                };
                if let Some(factor) = self.new_factor {
                    settle_save(decision, factor, console, store);
                }
                self.advance(Event::Decision(decision));
                say!(console, "End calibration");
                say!(console, "***");
                say!(console, "To re-calibrate, send 'r'.");
                say!(console, "To edit the calibration factor directly, send 'c'.");
                say!(console, "For all commands, send 'h'.");
                say!(console, "***");
            }
            Stage::Done => (),
        }
        self.stage
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FactorStage {
    AwaitingFactor,
    AwaitingSaveDecision,
    Done,
}

/// Replace the calibration factor with one typed by the operator
#[derive(Debug)]
pub struct FactorEntry {
    stage: FactorStage,
    reader: NumberReader,
    new_factor: Option<f32>,
}

impl FactorEntry {
    pub fn begin<C: Console>(console: &mut C, current: f32, parse_timeout_ms: u32) -> Self {
        say!(console, "***");
        say!(console, "Current value is: {}", current);
        say!(console, "Now, send the new value (e.g. 696.0).");
        Self {
            stage: FactorStage::AwaitingFactor,
            reader: NumberReader::new(parse_timeout_ms),
            new_factor: None,
        }
    }

    pub fn stage(&self) -> FactorStage {
        self.stage
    }

    pub fn poll<L, C, N>(
        &mut self,
        now_ms: u64,
        loadcell: &mut L,
        console: &mut C,
        store: &mut CalibrationStore<N>,
    ) -> FactorStage
    where
        L: LoadCell,
        C: Console,
        N: NonVolatile,
    {
        match self.stage {
            FactorStage::AwaitingFactor => {
                let Some(factor) = self.reader.poll(console, now_ms) else {
                    return self.stage;
                };
                if !is_valid_factor(factor) {
                    say!(console, "Calibration value must be a nonzero number, try again.");
                    return self.stage;
                }
                say!(console, "New calibration value is: {}", factor);
                loadcell.set_cal_factor(factor);
                self.new_factor = Some(factor);
                prompt_save(console);
                self.stage = FactorStage::AwaitingSaveDecision;
            }
            FactorStage::AwaitingSaveDecision => {
                let Some(decision) = read_decision(console) else {
                    return self.stage;
                };
                if let Some(factor) = self.new_factor {
                    settle_save(decision, factor, console, store);
                }
                say!(console, "End change calibration value");
                say!(console, "***");
                self.stage = FactorStage::Done;
            }
            FactorStage::Done => (),
        }
        self.stage
    }
}
