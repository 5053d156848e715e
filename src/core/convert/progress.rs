//! Reads the encoder's machine-readable progress stream.
//!
//! `ffmpeg -progress pipe:1` writes `key=value` lines in blocks, each block
//! terminated by `progress=continue` or `progress=end`. [`ProgressStream`]
//! turns any line reader into a lazy sequence of [`ProgressSample`]s, one per
//! block, and knows nothing about processes.

use regex::Regex;
use std::io::{self, BufRead};

/// One block of encoder progress
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressSample {
    /// Position in the output, seconds
    pub out_time_seconds: Option<f64>,
    /// Realtime multiplier
    pub speed: Option<f64>,
    /// This was the final block
    pub finished: bool,
}

/// Lazy, finite sequence of progress samples over a line reader
pub struct ProgressStream<R> {
    reader: R,
    line: String,
    current: ProgressSample,
    done: bool,
    out_time: Regex,
    speed: Regex,
}

impl<R: BufRead> ProgressStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            current: ProgressSample::default(),
            done: false,
            out_time: Regex::new(r"^out_time=(\d+):(\d{2}):(\d{2}(?:\.\d+)?)$").expect("valid regex"),
            speed: Regex::new(r"^speed=\s*(\d+(?:\.\d+)?)x$").expect("valid regex"),
        }
    }

    /// Fold one `key=value` line into the current block.
    /// Returns true when the line closes the block.
    fn absorb(&mut self, line: &str) -> bool {
        if let Some(value) = line.strip_prefix("out_time_us=") {
            if let Ok(us) = value.parse::<i64>() {
                if us >= 0 {
                    self.current.out_time_seconds = Some(us as f64 / 1_000_000.0);
                }
            }
        } else if let Some(caps) = self.out_time.captures(line) {
            // Only used when out_time_us was absent or N/A
            if self.current.out_time_seconds.is_none() {
                let hours: f64 = caps[1].parse().unwrap_or(0.0);
                let minutes: f64 = caps[2].parse().unwrap_or(0.0);
                let seconds: f64 = caps[3].parse().unwrap_or(0.0);
                self.current.out_time_seconds = Some(hours * 3600.0 + minutes * 60.0 + seconds);
            }
        } else if let Some(caps) = self.speed.captures(line) {
            self.current.speed = caps[1].parse().ok();
        } else if let Some(state) = line.strip_prefix("progress=") {
            self.current.finished = state == "end";
            return true;
        }
        false
    }
}

impl<R: BufRead> Iterator for ProgressStream<R> {
    type Item = io::Result<ProgressSample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {
                    let line = std::mem::take(&mut self.line);
                    let closed = self.absorb(line.trim());
                    self.line = line;
                    if closed {
                        let sample = std::mem::take(&mut self.current);
                        self.done = sample.finished;
                        return Some(Ok(sample));
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Percentage complete and seconds remaining.
///
/// Either is `None` when it cannot be derived: unknown or zero duration, or
/// no progress yet. The estimate assumes the rate so far holds.
pub fn estimate(
    out_time_seconds: Option<f64>,
    duration_seconds: Option<f64>,
    elapsed_seconds: f64,
) -> (Option<f64>, Option<f64>) {
    let (Some(position), Some(duration)) = (out_time_seconds, duration_seconds) else {
        return (None, None);
    };
    if duration <= 0.0 {
        return (None, None);
    }

    let fraction = (position / duration).clamp(0.0, 1.0);
    let percent = fraction * 100.0;
    let eta = if fraction > 0.0 && elapsed_seconds > 0.0 {
        Some((elapsed_seconds / fraction - elapsed_seconds).max(0.0))
    } else {
        None
    };
    (Some(percent), eta)
}
