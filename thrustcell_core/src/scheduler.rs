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

use num_traits::float::FloatCore;

/// Negative force is noise. NaN is treated the same way.
pub fn clamp_reading(raw: f32) -> f32 {
    if raw > 0.0 {
        raw
    } else {
        0.0
    }
}

/// Convert an operator-supplied frequency into a sample interval
///
/// Returns `None` for frequencies that aren't strictly positive. Frequencies above 1 kHz are
/// limited to a 1 ms interval.
pub fn interval_from_hz(hz: f32) -> Option<u32> {
    if !(hz > 0.0) || !hz.is_finite() {
        return None;
    }
    let interval = FloatCore::round(1000.0 / hz);
    if interval >= u32::MAX as f32 {
        return Some(u32::MAX);
    }
    Some((interval as u32).max(1))
}

/// Fixed-rate output clock driven by an irregular poll
///
/// The reference point advances by exactly one interval per tick, so a late poll makes the next
/// tick due sooner instead of shifting every later tick. At most one tick fires per poll.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleScheduler {
    start_ms: u64,
    last_emit_ms: u64,
    interval_ms: u32,
}

impl SampleScheduler {
    pub fn new(now_ms: u64, interval_ms: u32) -> Self {
        Self {
            start_ms: now_ms,
            last_emit_ms: now_ms,
            interval_ms: interval_ms.max(1),
        }
    }

    /// Start a new epoch: elapsed time counts from `now_ms` again
    pub fn restart(&mut self, now_ms: u64) {
        self.start_ms = now_ms;
        self.last_emit_ms = now_ms;
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Takes effect on the next [`tick`](Self::tick) without moving the reference point
    pub fn set_interval_ms(&mut self, interval_ms: u32) {
        self.interval_ms = interval_ms.max(1);
    }

    /// Returns the elapsed time of the tick that became due, if any
    ///
    /// The elapsed value is the tick's scheduled time relative to the start of the epoch, so
    /// consecutive ticks are always exactly one interval apart, however irregular the polls.
    pub fn tick(&mut self, now_ms: u64) -> Option<u64> {
        let interval = u64::from(self.interval_ms);
        if now_ms.saturating_sub(self.last_emit_ms) < interval {
            return None;
        }
        self.last_emit_ms += interval;
        Some(self.last_emit_ms - self.start_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_ticks(scheduler: &mut SampleScheduler, polls: &[u64]) -> Vec<u64> {
        polls
            .iter()
            .filter_map(|&now| scheduler.tick(now))
            .collect()
    }

    #[test]
    fn jittery_polls_give_evenly_spaced_ticks() {
        let mut scheduler = SampleScheduler::new(1_000, 20);
        let polls = [
            1_003, 1_019, 1_021, 1_038, 1_044, 1_059, 1_061, 1_062, 1_083, 1_100, 1_101, 1_127,
            1_139, 1_141, 1_160, 1_181, 1_199, 1_203,
        ];
        let ticks = collect_ticks(&mut scheduler, &polls);
        assert!(ticks.len() >= 8);
        for (n, elapsed) in ticks.iter().enumerate() {
            assert_eq!(*elapsed, 20 * (n as u64 + 1));
        }
    }

    #[test]
    fn nothing_before_first_interval() {
        let mut scheduler = SampleScheduler::new(500, 100);
        assert_eq!(scheduler.tick(500), None);
        assert_eq!(scheduler.tick(599), None);
        assert_eq!(scheduler.tick(600), Some(100));
        assert_eq!(scheduler.tick(600), None);
    }

    #[test]
    fn late_poll_makes_next_tick_due_sooner() {
        let mut scheduler = SampleScheduler::new(0, 100);
        // Poll delayed by a blocking dialog
        assert_eq!(scheduler.tick(170), Some(100));
        // Due at 200, not 270
        assert_eq!(scheduler.tick(199), None);
        assert_eq!(scheduler.tick(200), Some(200));
    }

    #[test]
    fn stall_keeps_elapsed_sequence() {
        let mut scheduler = SampleScheduler::new(0, 10);
        assert_eq!(scheduler.tick(10), Some(10));
        // One tick per poll, one interval apart
        assert_eq!(scheduler.tick(55), Some(20));
        assert_eq!(scheduler.tick(55), Some(30));
        assert_eq!(scheduler.tick(56), Some(40));
        assert_eq!(scheduler.tick(57), Some(50));
        assert_eq!(scheduler.tick(58), None);
        assert_eq!(scheduler.tick(60), Some(60));
        assert_eq!(scheduler.tick(71), Some(70));
    }

    #[test]
    fn interval_change_keeps_reference_point() {
        let mut scheduler = SampleScheduler::new(0, 100);
        assert_eq!(scheduler.tick(100), Some(100));
        scheduler.set_interval_ms(20);
        assert_eq!(scheduler.interval_ms(), 20);
        assert_eq!(scheduler.tick(119), None);
        assert_eq!(scheduler.tick(120), Some(120));
        assert_eq!(scheduler.tick(140), Some(140));
    }

    #[test]
    fn restart_resets_elapsed_origin() {
        let mut scheduler = SampleScheduler::new(0, 50);
        assert_eq!(scheduler.tick(50), Some(50));
        scheduler.restart(10_000);
        assert_eq!(scheduler.tick(10_049), None);
        assert_eq!(scheduler.tick(10_050), Some(50));
    }

    #[test]
    fn interval_shorter_than_polling_fires_every_poll() {
        let mut scheduler = SampleScheduler::new(0, 1);
        for now in [5, 9, 14, 20] {
            assert!(scheduler.tick(now).is_some());
        }
    }

    #[test]
    fn zero_interval_is_never_stored() {
        let mut scheduler = SampleScheduler::new(0, 0);
        assert_eq!(scheduler.interval_ms(), 1);
        scheduler.set_interval_ms(0);
        assert_eq!(scheduler.interval_ms(), 1);
    }

    #[test]
    fn clamp() {
        assert_eq!(clamp_reading(12.5), 12.5);
        assert_eq!(clamp_reading(0.0), 0.0);
        assert_eq!(clamp_reading(-0.0).to_bits(), 0.0_f32.to_bits());
        assert_eq!(clamp_reading(-3.25), 0.0);
        assert_eq!(clamp_reading(f32::NAN), 0.0);
        for x in [-100.0, -1e-6, 0.0, 1e-6, 42.0, 1e9] {
            assert_eq!(clamp_reading(clamp_reading(x)), clamp_reading(x));
        }
    }

    #[test]
    fn frequency_conversion() {
        assert_eq!(interval_from_hz(50.0), Some(20));
        assert_eq!(interval_from_hz(10.0), Some(100));
        assert_eq!(interval_from_hz(3.0), Some(333));
        assert_eq!(interval_from_hz(0.5), Some(2000));
        assert_eq!(interval_from_hz(5000.0), Some(1));
        assert_eq!(interval_from_hz(0.0), None);
        assert_eq!(interval_from_hz(-10.0), None);
        assert_eq!(interval_from_hz(f32::NAN), None);
        assert_eq!(interval_from_hz(f32::INFINITY), None);
    }
}
