//! Filename pattern matching: substitutes `{sender_id}` and `{date}`
//! placeholders into an anchored regex, the same templating-then-match
//! approach the teacher uses for `ref_resolver`'s regex matching.

/// `{date}` recognizes exactly 8 digits (`YYYYMMDD`), per `spec.md` §4.3.
const DATE_PATTERN: &str = r"\d{8}";

#[must_use]
pub fn matches(pattern: &str, filename: &str, sender_id: &str) -> bool {
    compile(pattern, sender_id).map(|re| re.is_match(filename)).unwrap_or(false)
}

fn compile(pattern: &str, sender_id: &str) -> Option<regex::Regex> {
    let mut regex_src = String::from("^");
    let mut rest = pattern;
    while let Some(idx) = rest.find('{') {
        regex_src.push_str(&regex::escape(&rest[..idx]));
        let after = &rest[idx + 1..];
        let close = after.find('}')?;
        let placeholder = &after[..close];
        match placeholder {
            "sender_id" => regex_src.push_str(&regex::escape(sender_id)),
            "date" => regex_src.push_str(DATE_PATTERN),
            other => regex_src.push_str(&regex::escape(&format!("{{{other}}}"))),
        }
        rest = &after[close + 1..];
    }
    regex_src.push_str(&regex::escape(rest));
    regex_src.push('$');
    regex::Regex::new(&regex_src).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_sender_and_date_placeholders() {
        assert!(matches("ventas_{sender_id}_{date}.csv", "ventas_TEST001_20260101.csv", "TEST001"));
    }

    #[test]
    fn rejects_wrong_sender() {
        assert!(!matches("ventas_{sender_id}_{date}.csv", "ventas_OTHER_20260101.csv", "TEST001"));
    }

    #[test]
    fn rejects_malformed_date() {
        assert!(!matches("ventas_{sender_id}_{date}.csv", "ventas_TEST001_2026-01-01.csv", "TEST001"));
    }

    #[test]
    fn literal_dots_do_not_match_arbitrary_characters() {
        assert!(!matches("ventas_{sender_id}.csv", "ventas_TEST001Xcsv", "TEST001"));
    }
}
