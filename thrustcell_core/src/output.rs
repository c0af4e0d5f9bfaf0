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

//! Reading lines sent to the operator
//!
//! These formats are consumed by downstream tooling and must not change:
//! * Human: `t = <seconds, 4 decimals> s\tForce(N) = <reading, 4 decimals>`
//! * CSV: `<seconds, 3 decimals>,<reading, 2 decimals>`, preceded once per boot by
//!   [`CSV_HEADER`]

use arrayvec::ArrayString;
use core::fmt::{self, Write};

/// Write one CRLF-terminated line to the operator. Console errors are dropped: there is nowhere
/// else to report them.
macro_rules! say {
    ($out:expr) => {{
        let _ = ::core::fmt::Write::write_str($out, "\r\n");
    }};
    ($out:expr, $($arg:tt)*) => {{
        let _ = $crate::output::write_line(&mut *$out, format_args!($($arg)*));
    }};
}

pub const CSV_HEADER: &str = "time_s,load";

/// Longest line assembled before it is written
pub const LINE_CAPACITY: usize = 128;

/// Write `args` and a CRLF as a single `write_str`
///
/// A console that drops output when it is full then loses whole lines, never the tail of one.
/// Lines longer than [`LINE_CAPACITY`] are written in pieces.
pub fn write_line<W: Write>(out: &mut W, args: fmt::Arguments) -> fmt::Result {
    let mut line = ArrayString::<LINE_CAPACITY>::new();
    if line.write_fmt(args).is_err() || line.try_push_str("\r\n").is_err() {
        out.write_fmt(args)?;
        return out.write_str("\r\n");
    }
    out.write_str(&line)
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputMode {
    #[default]
    Human,
    Csv,
}

#[derive(Debug, Default)]
pub struct OutputFormatter {
    mode: OutputMode,
    /// Latched the first time CSV mode is entered
    header_sent: bool,
}

impl OutputFormatter {
    pub const fn new() -> Self {
        Self {
            mode: OutputMode::Human,
            header_sent: false,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Switch between human and CSV lines. The CSV header is only written on the first switch.
    pub fn toggle<W: Write>(&mut self, out: &mut W) -> fmt::Result {
        self.mode = match self.mode {
            OutputMode::Human => OutputMode::Csv,
            OutputMode::Csv => OutputMode::Human,
        };
        debug!("Output mode {}", self.mode);
        if self.mode == OutputMode::Csv && !self.header_sent {
            self.header_sent = true;
            write_line(out, format_args!("{}", CSV_HEADER))?;
        }
        Ok(())
    }

    pub fn write_reading<W: Write>(
        &self,
        out: &mut W,
        elapsed_ms: u64,
        reading: f32,
    ) -> fmt::Result {
        let seconds = elapsed_ms as f64 / 1000.0;
        match self.mode {
            OutputMode::Human => {
                write_line(out, format_args!("t = {:.4} s\tForce(N) = {:.4}", seconds, reading))
            }
            OutputMode::Csv => write_line(out, format_args!("{:.3},{:.2}", seconds, reading)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_line() {
        let formatter = OutputFormatter::new();
        let mut out = String::new();
        formatter.write_reading(&mut out, 1_234, 12.5).unwrap();
        formatter.write_reading(&mut out, 60_000, 0.0).unwrap();
        assert_eq!(
            out,
            "t = 1.2340 s\tForce(N) = 12.5000\r\nt = 60.0000 s\tForce(N) = 0.0000\r\n"
        );
    }

    #[test]
    fn csv_line() {
        let mut formatter = OutputFormatter::new();
        let mut out = String::new();
        formatter.toggle(&mut out).unwrap();
        out.clear();
        formatter.write_reading(&mut out, 1_250, 3.14159).unwrap();
        formatter.write_reading(&mut out, 20, 250.0).unwrap();
        assert_eq!(out, "1.250,3.14\r\n0.020,250.00\r\n");
    }

    #[test]
    fn defaults_to_human() {
        assert_eq!(OutputFormatter::new().mode(), OutputMode::Human);
        assert_eq!(OutputFormatter::default().mode(), OutputMode::Human);
    }

    #[test]
    fn csv_header_once_per_boot() {
        let mut formatter = OutputFormatter::new();
        let mut out = String::new();
        formatter.toggle(&mut out).unwrap();
        assert_eq!(formatter.mode(), OutputMode::Csv);
        formatter.toggle(&mut out).unwrap();
        assert_eq!(formatter.mode(), OutputMode::Human);
        formatter.toggle(&mut out).unwrap();
        assert_eq!(formatter.mode(), OutputMode::Csv);
        assert_eq!(out, "time_s,load\r\n");
    }

    #[test]
    fn say_appends_crlf() {
        let mut out = String::new();
        say!(&mut out, "Known mass is: {}", 100.5);
        say!(&mut out);
        assert_eq!(out, "Known mass is: 100.5\r\n\r\n");
    }

    /// Keeps each `write_str` separate and refuses those that don't fit, like a full USB pipe
    struct Bounded {
        free: usize,
        writes: Vec<String>,
    }

    impl Write for Bounded {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            if s.len() <= self.free {
                self.free -= s.len();
                self.writes.push(s.into());
            }
            Ok(())
        }
    }

    #[test]
    fn full_console_drops_whole_lines() {
        let mut formatter = OutputFormatter::new();
        let mut out = Bounded {
            free: 40,
            writes: Vec::new(),
        };
        formatter.toggle(&mut out).unwrap();
        formatter.write_reading(&mut out, 1_250, 3.14159).unwrap();
        formatter.write_reading(&mut out, 1_500, 1234.5).unwrap();
        say!(&mut out, "Sample interval set to {} ms", 20);
        assert_eq!(out.writes, ["time_s,load\r\n", "1.250,3.14\r\n", "1.500,1234.50\r\n"]);

        let mut out = Bounded {
            free: 30,
            writes: Vec::new(),
        };
        formatter.toggle(&mut out).unwrap();
        formatter.write_reading(&mut out, 100, 12.5).unwrap();
        assert!(out.writes.is_empty());
    }

    #[test]
    fn long_line_still_written() {
        let mut out = String::new();
        let long = "x".repeat(LINE_CAPACITY + 10);
        say!(&mut out, "{}", long);
        assert_eq!(out, format!("{long}\r\n"));
    }
}
