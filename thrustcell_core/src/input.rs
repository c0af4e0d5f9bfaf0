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

//! Operator input that spans more than one byte

use crate::ports::Console;
use arrayvec::ArrayString;

const NUMBER_CAPACITY: usize = 24;

/// Incremental `parseFloat`
///
/// Bytes that can't start a number are skipped. A number ends at the first byte that can't
/// continue it (left in the console) or once no byte has arrived for the idle timeout. Text that
/// doesn't parse reads as 0, which callers treat as "nothing entered".
#[derive(Debug)]
pub struct NumberReader {
    buf: ArrayString<NUMBER_CAPACITY>,
    last_byte_ms: u64,
    idle_timeout_ms: u32,
}

impl NumberReader {
    pub fn new(idle_timeout_ms: u32) -> Self {
        Self {
            buf: ArrayString::new(),
            last_byte_ms: 0,
            idle_timeout_ms,
        }
    }

    fn continues_number(&self, byte: u8) -> bool {
        match byte {
            b'0'..=b'9' => true,
            b'.' => !self.buf.contains('.'),
            b'-' | b'+' => self.buf.is_empty(),
            _ => false,
        }
    }

    pub fn poll<C: Console>(&mut self, console: &mut C, now_ms: u64) -> Option<f32> {
        while let Some(byte) = console.peek() {
            if self.continues_number(byte) {
                console.read();
                self.last_byte_ms = now_ms;
                if self.buf.try_push(char::from(byte)).is_err() {
                    return self.take_pending();
                }
            } else if self.buf.is_empty() {
                console.read();
            } else {
                return self.take_pending();
            }
        }
        let idle = now_ms.saturating_sub(self.last_byte_ms);
        if !self.buf.is_empty() && idle >= u64::from(self.idle_timeout_ms) {
            return self.take_pending();
        }
        None
    }

    /// Finish whatever has been typed so far
    pub fn take_pending(&mut self) -> Option<f32> {
        if self.buf.is_empty() {
            return None;
        }
        let value = self.buf.parse::<f32>().unwrap_or(0.0);
        trace!("Parsed {} from operator input", value);
        self.buf.clear();
        Some(value)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Decision {
    Save,
    Discard,
}

/// Consume bytes until a `y` or `n` shows up
pub fn read_decision<C: Console>(console: &mut C) -> Option<Decision> {
    while let Some(byte) = console.read() {
        match byte {
            b'y' => return Some(Decision::Save),
            b'n' => return Some(Decision::Discard),
            _ => (),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedConsole;

    #[test]
    fn newline_terminates_number() {
        let mut console = ScriptedConsole::new();
        let mut reader = NumberReader::new(1000);
        console.type_str("100.0\n");
        assert_eq!(reader.poll(&mut console, 0), Some(100.0));
        // Terminator stays in the console like parseFloat leaves it in the stream
        assert_eq!(console.read(), Some(b'\n'));
    }

    #[test]
    fn number_split_across_polls() {
        let mut console = ScriptedConsole::new();
        let mut reader = NumberReader::new(1000);
        console.type_str("2");
        assert_eq!(reader.poll(&mut console, 0), None);
        console.type_str("5");
        assert_eq!(reader.poll(&mut console, 300), None);
        console.type_str(".5\r\n");
        assert_eq!(reader.poll(&mut console, 600), Some(25.5));
    }

    #[test]
    fn idle_timeout_completes_number() {
        let mut console = ScriptedConsole::new();
        let mut reader = NumberReader::new(1000);
        console.type_str("50");
        assert_eq!(reader.poll(&mut console, 10), None);
        assert_eq!(reader.poll(&mut console, 1009), None);
        assert_eq!(reader.poll(&mut console, 1010), Some(50.0));
        assert_eq!(reader.poll(&mut console, 5000), None);
    }

    #[test]
    fn leading_junk_skipped() {
        let mut console = ScriptedConsole::new();
        let mut reader = NumberReader::new(1000);
        console.type_str("\r\nmass -12.5 kg");
        assert_eq!(reader.poll(&mut console, 0), Some(-12.5));
    }

    #[test]
    fn lone_sign_reads_as_zero() {
        let mut console = ScriptedConsole::new();
        let mut reader = NumberReader::new(1000);
        console.type_str("-x");
        assert_eq!(reader.poll(&mut console, 0), Some(0.0));
    }

    #[test]
    fn second_decimal_point_ends_number() {
        let mut console = ScriptedConsole::new();
        let mut reader = NumberReader::new(1000);
        console.type_str("1.5.2\n");
        assert_eq!(reader.poll(&mut console, 0), Some(1.5));
        assert_eq!(reader.poll(&mut console, 0), Some(0.2));
    }

    #[test]
    fn junk_alone_never_completes() {
        let mut console = ScriptedConsole::new();
        let mut reader = NumberReader::new(1000);
        console.type_str("abc\n");
        assert_eq!(reader.poll(&mut console, 0), None);
        assert_eq!(reader.poll(&mut console, 10_000), None);
        assert!(!console.available());
    }

    #[test]
    fn decision_skips_other_bytes() {
        let mut console = ScriptedConsole::new();
        assert_eq!(read_decision(&mut console), None);
        console.type_str("\nxn");
        assert_eq!(read_decision(&mut console), Some(Decision::Discard));
        console.type_str("Y y");
        assert_eq!(read_decision(&mut console), Some(Decision::Save));
    }
}
