//! Time-of-day testing windows
//!
//! The bot only picks up work inside configured hour windows, so a shared
//! desktop can run it overnight. A window whose start is past its end wraps
//! around midnight, and a degenerate window like "0-0" is always open.

use chrono::{Local, Timelike};

use crate::error::{PatchbotError, Result};

/// Parsed `"start-end[,start-end...]"` hour windows. A bare hour `"h"`
/// means the one-hour window `h` to `h+1`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindows(Vec<(f64, f64)>);

impl TimeWindows {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut windows = Vec::new();
        for part in raw.split(',') {
            windows.push(parse_interval(part.trim())?);
        }
        Ok(Self(windows))
    }

    /// Is the given fractional hour (e.g. 13.5 for 13:30) inside any window?
    pub fn contains(&self, hour: f64) -> bool {
        self.0.iter().any(|&(start, end)| {
            if start < end {
                start <= hour && hour <= end
            } else {
                // wraps midnight; start == end covers the whole day
                hour <= end || start <= hour
            }
        })
    }

    /// Check against the local wall clock.
    pub fn is_open_now(&self) -> bool {
        let now = Local::now();
        let hour = f64::from(now.hour()) + f64::from(now.minute()) / 60.0;
        self.contains(hour)
    }
}

fn parse_interval(part: &str) -> Result<(f64, f64)> {
    let bad = || PatchbotError::Config(format!("bad time_of_day interval: {part:?}"));
    if let Some((start, end)) = part.split_once('-') {
        let start: f64 = start.trim().parse().map_err(|_| bad())?;
        let end: f64 = end.trim().parse().map_err(|_| bad())?;
        Ok((start, end))
    } else {
        let start: f64 = part.parse().map_err(|_| bad())?;
        Ok((start, start + 1.0))
    }
}
