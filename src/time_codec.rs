// Conversions between whole seconds and the `H:MM:SS` / `MM:SS` strings
// shown in the trim inputs and preview panel.

/// Renders seconds as `H:MM:SS` when there is at least one hour, `MM:SS` otherwise.
pub fn format_time(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;

    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Parses `S`, `M:S` or `H:M:S` back into seconds.
///
/// An empty (or all-whitespace) string is `Some(0)`. Any part that is not a
/// plain base-10 integer, more than three parts, or an overflow yields `None`;
/// callers keep their previous value in that case.
pub fn parse_time(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return Some(0);
    }

    let parts = text
        .split(':')
        .map(parse_part)
        .collect::<Option<Vec<u64>>>()?;

    match parts.as_slice() {
        [s] => Some(*s),
        [m, s] => m.checked_mul(60)?.checked_add(*s),
        [h, m, s] => h
            .checked_mul(3600)?
            .checked_add(m.checked_mul(60)?)?
            .checked_add(*s),
        _ => None,
    }
}

fn parse_part(part: &str) -> Option<u64> {
    let part = part.trim();
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse::<u64>().ok()
}
