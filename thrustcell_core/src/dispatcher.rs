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

//! The instrument's main loop: emit readings on schedule and act on single-byte commands

use crate::calibration::{CalibrationSession, FactorEntry, FactorStage};
use crate::config::Config;
use crate::input::NumberReader;
use crate::output::OutputFormatter;
use crate::ports::{Console, LoadCell, NonVolatile, SensorFault};
use crate::scheduler::{clamp_reading, interval_from_hz, SampleScheduler};
use crate::store::{CalibrationStore, FactorSource};

const HELP: &[&str] = &[
    "***",
    "Commands:",
    "  t  tare the load cell",
    "  r  recalibrate against a known mass",
    "  c  enter a new calibration factor",
    "  m  toggle between human readable and CSV output",
    "  f  set the sample frequency in Hz",
    "  h  show this help",
    "***",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Tare,
    Recalibrate,
    SetFactor,
    ToggleMode,
    SetFrequency,
    Help,
}

impl Command {
    /// Commands are case-sensitive. Anything else is ignored.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b't' => Some(Command::Tare),
            b'r' => Some(Command::Recalibrate),
            b'c' => Some(Command::SetFactor),
            b'm' => Some(Command::ToggleMode),
            b'f' => Some(Command::SetFrequency),
            b'h' => Some(Command::Help),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct FrequencyPrompt {
    deadline_ms: u64,
    reader: NumberReader,
}

/// What currently owns the console. Readings are only emitted while sampling.
#[derive(Debug)]
enum Activity {
    Sampling,
    Calibrating(CalibrationSession),
    EnteringFactor(FactorEntry),
    SettingFrequency(FrequencyPrompt),
}

pub struct Instrument<L, C, N> {
    config: Config,
    loadcell: L,
    console: C,
    store: CalibrationStore<N>,
    scheduler: SampleScheduler,
    formatter: OutputFormatter,
    activity: Activity,
}

impl<L, C, N> Instrument<L, C, N>
where
    L: LoadCell,
    C: Console,
    N: NonVolatile,
{
    pub fn new(config: Config, loadcell: L, console: C, nvm: N, now_ms: u64) -> Self {
        Self {
            config,
            loadcell,
            console,
            store: CalibrationStore::new(nvm, config.default_cal_factor),
            scheduler: SampleScheduler::new(now_ms, config.sample_interval_ms),
            formatter: OutputFormatter::new(),
            activity: Activity::Sampling,
        }
    }

    /// Bring up the load cell, restore the calibration factor and start an attended calibration
    ///
    /// A sensor fault is fatal: the caller must stop polling.
    pub async fn startup(&mut self, now_ms: u64) -> Result<FactorSource, SensorFault> {
        say!(&mut self.console);
        say!(&mut self.console, "Starting...");
        self.loadcell.start(self.config.stabilization_ms, true).await;
        let fault = if self.loadcell.tare_timed_out() {
            Some(SensorFault::TareTimeout)
        } else if self.loadcell.signal_timed_out() {
            Some(SensorFault::SignalTimeout)
        } else {
            None
        };
        if let Some(fault) = fault {
            error!("Load cell fault: {}", fault);
            say!(&mut self.console, "Timeout, check MCU>HX711 wiring and pin designations");
            return Err(fault);
        }

        let (factor, source) = self.store.load();
        self.loadcell.set_cal_factor(factor);
        match source {
            FactorSource::Stored => say!(&mut self.console, "Calibration factor {} loaded", factor),
            FactorSource::Default => say!(
                &mut self.console,
                "No calibration factor stored, using {}",
                factor
            ),
        }
        say!(&mut self.console, "Startup is complete");
        self.scheduler.restart(now_ms);
        self.start_calibration();
        Ok(source)
    }

    /// One pass of the main loop. Call as often as possible.
    pub async fn poll(&mut self, now_ms: u64) {
        match &mut self.activity {
            Activity::Sampling => (),
            Activity::Calibrating(session) => {
                let stage = session
                    .poll(now_ms, &mut self.loadcell, &mut self.console, &mut self.store)
                    .await;
                if stage.is_done() {
                    self.resume_sampling(now_ms);
                }
                return;
            }
            Activity::EnteringFactor(entry) => {
                let stage =
                    entry.poll(now_ms, &mut self.loadcell, &mut self.console, &mut self.store);
                if stage == FactorStage::Done {
                    self.activity = Activity::Sampling;
                }
                return;
            }
            Activity::SettingFrequency(prompt) => {
                let hz = match prompt.reader.poll(&mut self.console, now_ms) {
                    Some(hz) => hz,
                    None if now_ms >= prompt.deadline_ms => {
                        prompt.reader.take_pending().unwrap_or(0.0)
                    }
                    None => return,
                };
                self.apply_frequency(hz);
                self.activity = Activity::Sampling;
                return;
            }
        }
        self.sample(now_ms);
    }

    fn sample(&mut self, now_ms: u64) {
        self.loadcell.update();
        if let Some(elapsed_ms) = self.scheduler.tick(now_ms) {
            let reading = clamp_reading(self.loadcell.data());
            let _ = self
                .formatter
                .write_reading(&mut self.console, elapsed_ms, reading);
        }
        if self.loadcell.tare_status() {
            say!(&mut self.console, "Tare complete");
        }
        if let Some(byte) = self.console.read() {
            self.discard_line_ending();
            match Command::from_byte(byte) {
                Some(command) => self.dispatch(command, now_ms),
                None => trace!("Ignoring byte {=u8:#x}", byte),
            }
        }
    }

    // Terminals send the command byte followed by a line ending
    fn discard_line_ending(&mut self) {
        while matches!(self.console.peek(), Some(b'\r' | b'\n')) {
            self.console.read();
        }
    }

    pub fn dispatch(&mut self, command: Command, now_ms: u64) {
        debug!("Command {}", command);
        match command {
            Command::Tare => self.loadcell.tare_no_delay(),
            Command::Recalibrate => self.start_calibration(),
            Command::SetFactor => {
                let current = self.loadcell.cal_factor();
                let entry =
                    FactorEntry::begin(&mut self.console, current, self.config.parse_timeout_ms);
                self.activity = Activity::EnteringFactor(entry);
            }
            Command::ToggleMode => {
                let _ = self.formatter.toggle(&mut self.console);
            }
            Command::SetFrequency => {
                let timeout_ms = self.config.frequency_prompt_timeout_ms;
                say!(
                    &mut self.console,
                    "Send the sample frequency in Hz within {} s",
                    timeout_ms / 1000
                );
                self.activity = Activity::SettingFrequency(FrequencyPrompt {
                    deadline_ms: now_ms + u64::from(timeout_ms),
                    reader: NumberReader::new(self.config.parse_timeout_ms),
                });
            }
            Command::Help => {
                for line in HELP {
                    say!(&mut self.console, "{}", line);
                }
            }
        }
    }

    fn start_calibration(&mut self) {
        let session = CalibrationSession::begin(&mut self.console, self.config.parse_timeout_ms);
        self.activity = Activity::Calibrating(session);
    }

    // Readings after a calibration start a new epoch at t = 0
    fn resume_sampling(&mut self, now_ms: u64) {
        self.scheduler.restart(now_ms);
        self.activity = Activity::Sampling;
    }

    fn apply_frequency(&mut self, hz: f32) {
        match interval_from_hz(hz) {
            Some(interval_ms) => {
                info!("Sample interval {} ms", interval_ms);
                self.scheduler.set_interval_ms(interval_ms);
                say!(&mut self.console, "Sample interval set to {} ms", interval_ms);
            }
            None => say!(
                &mut self.console,
                "No valid frequency received, sample interval stays {} ms",
                self.scheduler.interval_ms()
            ),
        }
    }

    pub fn is_sampling(&self) -> bool {
        matches!(self.activity, Activity::Sampling)
    }

    pub fn scheduler(&self) -> &SampleScheduler {
        &self.scheduler
    }

    pub fn formatter(&self) -> &OutputFormatter {
        &self.formatter
    }

    pub fn loadcell(&self) -> &L {
        &self.loadcell
    }

    #[cfg(test)]
    pub(crate) fn loadcell_mut(&mut self) -> &mut L {
        &mut self.loadcell
    }

    #[cfg(test)]
    pub(crate) fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut CalibrationStore<N> {
        &mut self.store
    }
}
