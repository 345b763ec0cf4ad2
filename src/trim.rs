// Dual-handle trim range.
// - Holds start/end seconds bounded by the media duration.
// - Keeps the text mirrors and slider fill percentages in lock-step with the values.
// - Handles never cross: a handle pushed past the other drags the other along.
use crate::time_codec::{format_time, parse_time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrimRange {
    start: u64,
    end: u64,
    bound: u64,
    start_text: String,
    end_text: String,
    start_percent: f32,
    end_percent: f32,
}

impl Default for TrimRange {
    fn default() -> Self {
        Self::new(0)
    }
}

impl TrimRange {
    pub fn new(duration: u64) -> Self {
        let mut range = Self {
            start: 0,
            end: 0,
            bound: 0,
            start_text: String::new(),
            end_text: String::new(),
            start_percent: 0.0,
            end_percent: 0.0,
        };
        range.set_bound(duration);
        range
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn bound(&self) -> u64 {
        self.bound
    }

    pub fn start_text(&self) -> &str {
        &self.start_text
    }

    pub fn end_text(&self) -> &str {
        &self.end_text
    }

    /// Left edge of the selected fill, in percent of the track.
    pub fn fill_left(&self) -> f32 {
        self.start_percent
    }

    /// Width of the selected fill, in percent of the track.
    pub fn fill_width(&self) -> f32 {
        self.end_percent - self.start_percent
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Resets the selection to the whole `[0, duration]` span.
    pub fn set_bound(&mut self, duration: u64) {
        self.bound = duration;
        self.start = 0;
        self.end = duration;
        self.refresh();
    }

    pub fn set_from_handle(&mut self, handle: Handle, raw: u64) {
        self.apply(handle, raw);
        self.refresh();
    }

    /// Applies both text inputs, start first. Unparsable text leaves that side as it was.
    pub fn set_from_text(&mut self, start_text: &str, end_text: &str) {
        if let Some(start) = parse_time(start_text) {
            self.apply(Handle::Start, start);
        }
        if let Some(end) = parse_time(end_text) {
            self.apply(Handle::End, end);
        }
        self.refresh();
    }

    fn apply(&mut self, handle: Handle, raw: u64) {
        let value = raw.min(self.bound);
        match handle {
            Handle::Start => {
                self.start = value;
                if self.start > self.end {
                    self.end = self.start;
                }
            }
            Handle::End => {
                self.end = value;
                if self.start > self.end {
                    self.start = self.end;
                }
            }
        }
    }

    fn refresh(&mut self) {
        self.start_text = format_time(self.start);
        self.end_text = format_time(self.end);
        self.start_percent = percent_of(self.start, 0, self.bound);
        self.end_percent = percent_of(self.end, 0, self.bound);
    }
}

fn percent_of(value: u64, min: u64, max: u64) -> f32 {
    if max <= min {
        return 0.0;
    }
    ((value - min) as f64 / (max - min) as f64 * 100.0) as f32
}
