//! Text layout of the throughput table.
//!
//! ```text
//! +------------------+------------------+
//! |          offered |         accepted |
//! +------------------+------------------+
//! |              12K |            9999  |
//! ```
//!
//! Log consumers parse this layout, so column widths are fixed.

/// Default seconds between report rows.
pub const DEFAULT_INTERVAL_SECS: u64 = 5;

/// The header is reprinted every this many rows so it stays on screen on a
/// 24 line terminal.
pub const HEADER_EVERY: u32 = 21;

/// Magnitude suffixes, one per factor of 1000.
pub const SUFFIXES: [char; 9] = [' ', 'K', 'M', 'G', 'T', 'P', 'E', 'Z', 'Y'];

const BORDER_SEGMENT: &str = "+------------------";

/// Scale a per-second rate down by powers of 1000 until it is below 10000.
pub fn scale(rate: u64) -> (u64, char) {
    let mut value = rate;
    let mut magnitude = 0;
    while value >= 10_000 {
        value /= 1000;
        magnitude += 1;
    }
    (value, SUFFIXES[magnitude])
}

/// Border line for `columns` columns, newline terminated.
pub fn border(columns: usize) -> String {
    let mut line = BORDER_SEGMENT.repeat(columns);
    line.push_str("+\n");
    line
}

/// Full header block: border, names, border.
pub fn header<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let mut columns = 0;
    let mut row = String::new();
    for name in names {
        row.push_str(&format!("| {:>16} ", name));
        columns += 1;
    }
    row.push_str("|\n");

    let line = border(columns);
    format!("{line}{row}{line}")
}

/// One data cell holding a scaled rate.
pub fn cell(rate: u64) -> String {
    let (value, suffix) = scale(rate);
    format!("| {:>15}{} ", value, suffix)
}

/// Average rate over `elapsed` seconds; no elapsed time reads as 0.
pub fn rate(value: u64, elapsed: u64) -> u64 {
    if elapsed == 0 {
        0
    } else {
        value / elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale() {
        assert_eq!(scale(0), (0, ' '));
        assert_eq!(scale(9999), (9999, ' '));
        assert_eq!(scale(10_000), (10, 'K'));
        assert_eq!(scale(9_999_999), (9999, 'K'));
        assert_eq!(scale(10_000_000), (10, 'M'));
        assert_eq!(scale(u64::MAX), (18, 'E'));
    }

    #[test]
    fn test_rate() {
        assert_eq!(rate(100, 0), 0);
        assert_eq!(rate(100, 5), 20);
        assert_eq!(rate(7, 2), 3);
    }

    #[test]
    fn test_border() {
        assert_eq!(border(0), "+\n");
        assert_eq!(border(2), "+------------------+------------------+\n");
    }

    #[test]
    fn test_header() {
        let text = header(["rx", "tx"]);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "+------------------+------------------+");
        assert_eq!(lines[1], "|               rx |               tx |");
        assert_eq!(lines[2], lines[0]);
    }

    #[test]
    fn test_cell_width_matches_border() {
        assert_eq!(cell(0), "|               0  ");
        assert_eq!(cell(10_000), "|              10K ");
        assert_eq!(cell(12).len(), BORDER_SEGMENT.len());
    }
}
