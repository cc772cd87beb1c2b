//! Text helpers for chat replies.

/// Human form of an elapsed duration, e.g. "3 minutes" or "1 hour and 5 minutes".
pub fn format_elapsed(elapsed_millis: i64) -> String {
    let seconds = elapsed_millis.max(0) / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 1 {
        format!("{days} days")
    } else if hours > 25 {
        format!("1 day and {} hours", hours - 24)
    } else if minutes >= 120 {
        format!("{hours} hours")
    } else if minutes > 61 {
        format!("1 hour and {} minutes", minutes - 60)
    } else if minutes > 1 {
        format!("{minutes} minutes")
    } else if seconds > 1 {
        format!("{seconds} seconds")
    } else {
        "a second".to_string()
    }
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// "1 member" / "3 members".
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: i64 = 1000;
    const MINUTE: i64 = 60 * SECOND;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;

    #[test]
    fn formats_elapsed_ranges() {
        assert_eq!(format_elapsed(0), "a second");
        assert_eq!(format_elapsed(-5 * SECOND), "a second");
        assert_eq!(format_elapsed(45 * SECOND), "45 seconds");
        assert_eq!(format_elapsed(5 * MINUTE), "5 minutes");
        assert_eq!(format_elapsed(65 * MINUTE), "1 hour and 5 minutes");
        assert_eq!(format_elapsed(3 * HOUR), "3 hours");
        assert_eq!(format_elapsed(DAY + 2 * HOUR), "1 day and 2 hours");
        assert_eq!(format_elapsed(3 * DAY), "3 days");
    }

    #[test]
    fn escapes_html_markup() {
        assert_eq!(escape_html("<b>Tom & Jerry</b>"), "&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;");
        assert_eq!(escape_html("Alice"), "Alice");
    }

    #[test]
    fn pluralizes() {
        assert_eq!(plural(1, "member"), "1 member");
        assert_eq!(plural(0, "member"), "0 members");
        assert_eq!(plural(4, "session"), "4 sessions");
    }
}
