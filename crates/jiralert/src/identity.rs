//! Canonical alert identity.
//!
//! An alert's label set is turned into an `ALERT{name="value",...}` string
//! that is attached to the Jira issue as a label and used as the lookup cache
//! key. Both consumers must agree across restarts, and with labels already
//! written by earlier deployments, so values are quoted exactly like Go's
//! `strconv.Quote` instead of leaning on `Debug` output.

use std::fmt::Write;

const PREFIX: &str = "ALERT{";
const SUFFIX: &str = "}";

/// Derive the issue label for a label set. Pairs are sorted by name, so the
/// iteration order of `labels` does not matter.
pub fn issue_label<'a, I>(labels: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut pairs: Vec<(&String, &String)> = labels.into_iter().collect();
    pairs.sort();

    let body = pairs
        .iter()
        .map(|(name, value)| format_pair(name, value))
        .collect::<Vec<_>>()
        .join(",");

    strip_spaces(&format!("{PREFIX}{body}{SUFFIX}"))
}

fn strip_spaces(label: &str) -> String {
    label.replace(' ', "")
}

/// `name="value"` with the value quoted.
pub fn format_pair(name: &str, value: &str) -> String {
    format!("{}={}", name, quote(value))
}

/// Jira label for a copied group label. Jira labels cannot hold spaces.
pub fn group_label(name: &str, value: &str) -> String {
    strip_spaces(&format_pair(name, value))
}

/// Double-quote `value` the way Go's `%q` does: short escapes for the usual
/// control characters, `\xNN` for other ASCII controls, and `\uNNNN` or
/// `\UNNNNNNNN` for anything else that is not printable.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{7}' => out.push_str("\\a"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{b}' => out.push_str("\\v"),
            c if is_printable(c) => out.push(c),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if (c as u32) < 0x10000 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => {
                let _ = write!(out, "\\U{:08x}", c as u32);
            }
        }
    }
    out.push('"');
    out
}

/// Go's `unicode.IsPrint`: no controls, no format or private-use
/// characters, and ASCII space as the only space.
fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    if c.is_control() || c.is_whitespace() {
        return false;
    }
    !matches!(
        c as u32,
        0xad
            | 0x600..=0x605
            | 0x61c
            | 0x6dd
            | 0x70f
            | 0x890..=0x891
            | 0x8e2
            | 0x180e
            | 0x200b..=0x200f
            | 0x202a..=0x202e
            | 0x2060..=0x2064
            | 0x2066..=0x206f
            | 0xe000..=0xf8ff
            | 0xfeff
            | 0xfff9..=0xfffb
            | 0x110bd
            | 0x110cd
            | 0x13430..=0x1343f
            | 0x1bca0..=0x1bca3
            | 0x1d173..=0x1d17a
            | 0xe0001
            | 0xe0020..=0xe007f
            | 0xf0000..=0xffffd
            | 0x100000..=0x10fffd
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    fn labels(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn derive(pairs: &[(String, String)]) -> String {
        issue_label(pairs.iter().map(|(k, v)| (k, v)))
    }

    #[test]
    fn test_issue_label_format() {
        let l = labels(&[("alertname", "Disk"), ("instance", "a")]);
        assert_eq!(derive(&l), r#"ALERT{alertname="Disk",instance="a"}"#);
    }

    #[test]
    fn test_issue_label_is_order_independent() {
        let base = labels(&[("job", "node"), ("alertname", "Disk"), ("instance", "a"), ("zone", "eu")]);
        let expected = derive(&base);

        let mut reversed = base.clone();
        reversed.reverse();
        assert_eq!(derive(&reversed), expected);

        for shift in 1..base.len() {
            let mut rotated = base.clone();
            rotated.rotate_left(shift);
            assert_eq!(derive(&rotated), expected);
        }

        let hashed: HashMap<String, String> = base.iter().cloned().collect();
        let sorted: BTreeMap<String, String> = base.iter().cloned().collect();
        assert_eq!(issue_label(&hashed), expected);
        assert_eq!(issue_label(&sorted), expected);
    }

    #[test]
    fn test_issue_label_strips_whitespace() {
        let l = labels(&[("alertname", "Disk Full"), ("summary", "a\tb")]);
        assert_eq!(derive(&l), r#"ALERT{alertname="DiskFull",summary="a\tb"}"#);
    }

    #[test]
    fn test_issue_label_escapes_quotes() {
        let l = labels(&[("path", r#"C:\tmp "x""#)]);
        assert_eq!(derive(&l), r#"ALERT{path="C:\\tmp\"x\""}"#);
    }

    #[test]
    fn test_issue_label_empty_set() {
        assert_eq!(derive(&[]), "ALERT{}");
    }

    #[test]
    fn test_group_label() {
        assert_eq!(group_label("team", "data platform"), r#"team="dataplatform""#);
    }

    #[test]
    fn test_quote_control_characters() {
        assert_eq!(quote("a\u{1}b"), r#""a\x01b""#);
        assert_eq!(quote("del\u{7f}"), r#""del\x7f""#);
        assert_eq!(quote("line\nbreak"), r#""line\nbreak""#);
        assert_eq!(quote("\u{7}\u{8}\u{c}\u{b}"), r#""\a\b\f\v""#);
    }

    #[test]
    fn test_quote_non_printable_unicode() {
        assert_eq!(quote("a\u{a0}b"), r#""a\u00a0b""#);
        assert_eq!(quote("zero\u{200b}width"), r#""zero\u200bwidth""#);
        assert_eq!(quote("tag\u{e0001}"), r#""tag\U000e0001""#);
        assert_eq!(quote("café ☃"), "\"café ☃\"");
    }

    #[test]
    fn test_issue_label_keeps_escaped_non_breaking_space() {
        let l = labels(&[("instance", "a\u{a0}b c")]);
        assert_eq!(derive(&l), r#"ALERT{instance="a\u00a0bc"}"#);
    }
}
