//! Single-line stderr level meter shown while recording.

use std::io::{self, Write};

/// Characters for the meter bar.
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Width of the bar in characters.
const METER_WIDTH: usize = 24;

/// Format a horizontal level meter for a loudness in `[0.0, 1.0]`.
#[must_use]
pub(crate) fn format_level_meter(level: f32) -> String {
    let pos = level.clamp(0.0, 1.0);
    let filled = (pos * METER_WIDTH as f32).round() as usize;
    let filled = filled.min(METER_WIDTH);

    let mut bar = String::with_capacity(METER_WIDTH + 2);
    bar.push('[');
    for i in 0..METER_WIDTH {
        bar.push(if i < filled { BAR_FULL } else { BAR_EMPTY });
    }
    bar.push(']');
    bar
}

/// Redraws one stderr line in place with carriage returns so the meter
/// never scrolls the terminal.
pub(crate) struct MeterLine {
    visible: bool,
}

impl MeterLine {
    pub(crate) fn new() -> Self {
        Self { visible: false }
    }

    pub(crate) fn draw(&mut self, level: f32) {
        let mut err = io::stderr();
        let _ = write!(err, "\r{} rec", format_level_meter(level));
        let _ = err.flush();
        self.visible = true;
    }

    /// Blank the line if one was drawn. Safe to call repeatedly.
    pub(crate) fn clear(&mut self) {
        if !self.visible {
            return;
        }
        let mut err = io::stderr();
        let _ = write!(err, "\r{}\r", " ".repeat(METER_WIDTH + 6));
        let _ = err.flush();
        self.visible = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_level_meter_silent() {
        let meter = format_level_meter(0.0);
        assert!(meter.contains(BAR_EMPTY));
        assert!(!meter.contains(BAR_FULL));
    }

    #[test]
    fn format_level_meter_full() {
        let meter = format_level_meter(1.0);
        assert!(meter.contains(BAR_FULL));
        assert!(!meter.contains(BAR_EMPTY));
    }

    #[test]
    fn format_level_meter_clamps_out_of_range() {
        assert_eq!(format_level_meter(2.5), format_level_meter(1.0));
        assert_eq!(format_level_meter(-1.0), format_level_meter(0.0));
    }

    #[test]
    fn format_level_meter_has_fixed_width() {
        for level in [0.0, 0.3, 0.7, 1.0] {
            assert_eq!(format_level_meter(level).chars().count(), METER_WIDTH + 2);
        }
    }

    #[test]
    fn half_level_fills_half_the_bar() {
        let meter = format_level_meter(0.5);
        let filled = meter.chars().filter(|&c| c == BAR_FULL).count();
        assert_eq!(filled, METER_WIDTH / 2);
    }
}
