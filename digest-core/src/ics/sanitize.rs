//! Cleanup applied to raw feeds before parsing.
//!
//! Some published calendars (Google's private ICS URLs among them) contain
//! stray lines like `02:...` that strict parsers reject as unknown properties.

use icalendar::parser::unfold;

/// Normalize line endings, unfold continuation lines, and drop blank lines and
/// lines whose property name is only digits.
pub fn sanitize(raw: &str) -> String {
    let normalized = raw
        .trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    unfold(&normalized)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !has_numeric_name(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn has_numeric_name(line: &str) -> bool {
    match line.split_once(':') {
        Some((name, _)) => {
            let name = name.trim();
            !name.is_empty() && name.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfolds_continuation_lines() {
        let raw = "BEGIN:VEVENT\r\nSUMMARY:Quarterly \r\n planning and\r\n\t review\r\nEND:VEVENT\r\n";
        assert_eq!(
            sanitize(raw),
            "BEGIN:VEVENT\nSUMMARY:Quarterly planning and review\nEND:VEVENT"
        );
    }

    #[test]
    fn drops_numeric_property_lines_and_blanks() {
        let raw = "BEGIN:VEVENT\n02:garbage\n\nUID:abc\r\n\r\nEND:VEVENT";
        assert_eq!(sanitize(raw), "BEGIN:VEVENT\nUID:abc\nEND:VEVENT");
    }

    #[test]
    fn keeps_lines_with_parameters() {
        let raw = "DTSTART;TZID=America/Sao_Paulo:20250919T090000\rDTEND:20250919T100000Z";
        assert_eq!(
            sanitize(raw),
            "DTSTART;TZID=America/Sao_Paulo:20250919T090000\nDTEND:20250919T100000Z"
        );
    }
}
