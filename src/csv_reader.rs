use anyhow::{Context, Result};
use compact_str::CompactString;
use log::error;
use std::collections::HashMap;
use std::path::Path;

/// One data line of a table, keyed by the column names of the header line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: HashMap<CompactString, CompactString>,
}

impl Record {
    /// Value of `column`, or the empty string if the table has no such column.
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(|v| v.as_str()).unwrap_or("")
    }

    pub fn get_non_empty(&self, column: &str) -> Option<&str> {
        Some(self.get(column)).filter(|v| !v.is_empty())
    }

    /// Reads the longest leading decimal number, so `"40.75N"` gives `40.75`.
    pub fn parse_f64(&self, column: &str) -> Option<f64> {
        leading_f64(self.get(column))
    }

    /// Reads the leading integer (`0x` prefixed hex included), so `"2.0"` gives `2`.
    pub fn parse_i64(&self, column: &str) -> Option<i64> {
        leading_i64(self.get(column))
    }
}

fn sign_len(s: &str) -> usize {
    usize::from(s.starts_with(['+', '-']))
}

fn digits_len(s: &str, radix: u32) -> usize {
    s.find(|c: char| !c.is_digit(radix)).unwrap_or(s.len())
}

fn leading_f64(s: &str) -> Option<f64> {
    let s = trim_field(s);
    let mut end = sign_len(s);
    if s[end..].starts_with("Infinity") {
        return s[..end + "Infinity".len()].parse().ok();
    }

    let int_digits = digits_len(&s[end..], 10);
    end += int_digits;
    let mut frac_digits = 0;
    if s[end..].starts_with('.') {
        frac_digits = digits_len(&s[end + 1..], 10);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return None;
    }

    if s[end..].starts_with(['e', 'E']) {
        let exp_start = end + 1 + sign_len(&s[end + 1..]);
        let exp_digits = digits_len(&s[exp_start..], 10);
        if exp_digits > 0 {
            end = exp_start + exp_digits;
        }
    }
    s[..end].parse().ok()
}

fn leading_i64(s: &str) -> Option<i64> {
    let s = trim_field(s);
    let (negative, unsigned) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (radix, body) = match unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        Some(hex) => (16, hex),
        None => (10, unsigned),
    };

    let digits = &body[..digits_len(body, radix)];
    let value = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -value } else { value })
}

// Same characters as a JS trim: whitespace plus the byte order mark.
fn trim_field(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<CompactString>,
    V: Into<CompactString>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// Splits on commas outside of quotes. A quote only toggles the state, it is never kept.
fn split_line(line: &str) -> Vec<CompactString> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(CompactString::from(trim_field(&current)));
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(CompactString::from(trim_field(&current)));
    fields
}

/// Decodes comma separated text. The first non-blank line is the header and is not returned.
pub fn parse_records(content: &str) -> Vec<Record> {
    let mut lines = content
        .lines()
        .filter(|line| !trim_field(line).is_empty());

    let headers = match lines.next() {
        Some(header) => split_line(header),
        None => return Vec::new(),
    };

    lines
        .map(|line| {
            let mut values = split_line(line).into_iter();
            headers
                .iter()
                .map(|header| (header.clone(), values.next().unwrap_or_default()))
                .collect::<Record>()
        })
        .collect()
}

pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_records(&content))
}

/// Like [`read_records`], but an unreadable file is logged and comes back as `None`
/// so the caller can carry on with an empty table.
pub fn read_table(path: &Path) -> Option<Vec<Record>> {
    match read_records(path) {
        Ok(records) => Some(records),
        Err(e) => {
            error!("Error parsing {}: {:#}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_not_a_record() {
        let records = parse_records("a,b\n1,2\n3,4\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("a"), "1");
        assert_eq!(records[1].get("b"), "4");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let content = "a,b\n\n1,2\n   \n3,4\n\n\n";
        let non_blank = content.lines().filter(|l| !l.trim().is_empty()).count();
        assert_eq!(parse_records(content).len(), non_blank - 1);
    }

    #[test]
    fn empty_content_has_no_records() {
        assert!(parse_records("").is_empty());
        assert!(parse_records("\n  \n").is_empty());
        assert!(parse_records("route_id,route_color\n").is_empty());
    }

    #[test]
    fn quoted_comma_is_field_content() {
        let records = parse_records("name,age\n\"Smith, John\",42\n");
        assert_eq!(records[0].get("name"), "Smith, John");
        assert_eq!(records[0].get("age"), "42");
    }

    #[test]
    fn doubled_quotes_just_toggle() {
        let records = parse_records("a,b\n\"x\"\"y,z\",1\n");
        // the second quote closes, the third reopens
        assert_eq!(records[0].get("a"), "xy,z");
        assert_eq!(records[0].get("b"), "1");
    }

    #[test]
    fn values_and_headers_are_trimmed() {
        let records = parse_records(" a , b \r\n  1 ,  two  \r\n");
        assert_eq!(records[0].get("a"), "1");
        assert_eq!(records[0].get("b"), "two");
    }

    #[test]
    fn short_lines_pad_with_empty_strings() {
        let records = parse_records("a,b,c\n1\n");
        let expected: Record = [("a", "1"), ("b", ""), ("c", "")].into_iter().collect();
        assert_eq!(records[0], expected);
        assert_eq!(records[0].get("a"), "1");
        assert_eq!(records[0].get("b"), "");
        assert_eq!(records[0].get("c"), "");
        assert_eq!(records[0].get_non_empty("c"), None);
    }

    #[test]
    fn extra_values_are_dropped() {
        let records = parse_records("a\n1,2,3\n");
        let expected: Record = [("a", "1")].into_iter().collect();
        assert_eq!(records[0], expected);
    }

    #[test]
    fn unknown_column_reads_empty() {
        let records = parse_records("a\n1\n");
        assert_eq!(records[0].get("missing"), "");
    }

    #[test]
    fn typed_extraction() {
        let record: Record = [("lat", "40.75"), ("seq", "7"), ("bad", "north")]
            .into_iter()
            .collect();
        assert_eq!(record.parse_f64("lat"), Some(40.75));
        assert_eq!(record.parse_i64("seq"), Some(7));
        assert_eq!(record.parse_f64("bad"), None);
        assert_eq!(record.parse_i64("lat"), Some(40));
    }

    #[test]
    fn numbers_are_read_from_the_leading_prefix() {
        let record: Record = [
            ("seq_float", "2.0"),
            ("seq_junk", "12abc"),
            ("seq_hex", "0x1A"),
            ("seq_neg", "-3"),
            ("seq_none", "abc"),
            ("lat_junk", "12abc"),
            ("lat_exp", "1.5e2x"),
            ("lat_dot", "-.5"),
            ("lat_half_exp", "7e"),
            ("lat_lone_dot", "."),
            ("lat_inf", "-Infinity"),
        ]
        .into_iter()
        .collect();

        assert_eq!(record.parse_i64("seq_float"), Some(2));
        assert_eq!(record.parse_i64("seq_junk"), Some(12));
        assert_eq!(record.parse_i64("seq_hex"), Some(26));
        assert_eq!(record.parse_i64("seq_neg"), Some(-3));
        assert_eq!(record.parse_i64("seq_none"), None);
        assert_eq!(record.parse_i64("missing"), None);

        assert_eq!(record.parse_f64("lat_junk"), Some(12.0));
        assert_eq!(record.parse_f64("lat_exp"), Some(150.0));
        assert_eq!(record.parse_f64("lat_dot"), Some(-0.5));
        assert_eq!(record.parse_f64("lat_half_exp"), Some(7.0));
        assert_eq!(record.parse_f64("lat_lone_dot"), None);
        assert_eq!(record.parse_f64("lat_inf"), Some(f64::NEG_INFINITY));
        assert_eq!(record.parse_f64("missing"), None);
    }

    #[test]
    fn byte_order_mark_is_trimmed() {
        let records = parse_records("\u{feff}route_id,route_short_name\nA,A\nB,B\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("route_id"), "A");
        assert_eq!(records[1].get("route_id"), "B");
    }

    #[test]
    fn missing_file_reads_as_absent_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.txt");
        assert!(read_records(&path).is_err());
        assert!(read_table(&path).is_none());

        std::fs::write(&path, "route_id\nA\n").unwrap();
        assert_eq!(read_table(&path).map(|r| r.len()), Some(1));
    }
}
