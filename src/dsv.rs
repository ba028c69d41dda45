//! Escaped delimiter-separated-values codec.
//!
//! Every record the ledger reads or writes goes through this module: event
//! log lines and snapshot lines use `;` as the field delimiter, and each
//! dues-history entry nested inside a snapshot field uses `,`. Escaping is
//! backslash-based so that field values may contain the delimiter, literal
//! backslashes, and (escaped) newlines while a record still occupies exactly
//! one line.

/// Field delimiter for event-log and snapshot records.
pub const RECORD_DELIMITER: char = ';';

/// Field delimiter for dues-history sub-records nested inside a snapshot
/// field.
pub const HISTORY_DELIMITER: char = ',';

/// Escapes a single field value for the given delimiter.
///
/// Replacements are applied in a fixed order: backslash first (so later
/// escapes are not themselves re-escaped), then literal newlines, then the
/// active delimiter.
pub fn escape(value: &str, delimiter: char) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            c if c == delimiter => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}

/// Encodes a sequence of field values as one record line (without a
/// terminating newline).
pub fn encode_record<I, S>(fields: I, delimiter: char) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = String::new();
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            line.push(delimiter);
        }
        line.push_str(&escape(field.as_ref(), delimiter));
    }
    line
}

/// Decodes one record line into its field values.
///
/// The whole line is trimmed before scanning. A backslash starts an escape:
/// `a`, `b`, `f`, `n`, `r`, `t`, `v` expand to the corresponding control
/// character, any other escaped character is taken literally (which covers
/// `\\` and the escaped delimiter). An unescaped delimiter ends the current
/// field; end of line ends the last field. A trailing delimiter does not
/// open a trailing empty field.
///
/// Decoding never fails: a lone backslash at end of line is recovered as a
/// literal backslash.
pub fn decode_record(line: &str, delimiter: char) -> Vec<String> {
    let line = line.trim();
    let mut fields = Vec::new();
    let mut value = String::new();
    let mut chars = line.chars().peekable();

    if chars.peek().is_none() {
        return fields;
    }

    let mut escaped = false;
    while let Some(c) = chars.next() {
        if escaped {
            value.push(unescape_char(c));
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == delimiter {
            fields.push(std::mem::take(&mut value));
            // Trailing delimiter: stop without opening an empty field.
            if chars.peek().is_none() {
                return fields;
            }
        } else {
            value.push(c);
        }
    }
    if escaped {
        value.push('\\');
    }
    fields.push(value);
    fields
}

fn unescape_char(c: char) -> char {
    match c {
        'a' => '\x07',
        'b' => '\x08',
        'f' => '\x0c',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\x0b',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(fields: &[&str]) {
        let line = encode_record(fields, RECORD_DELIMITER);
        let decoded = decode_record(&line, RECORD_DELIMITER);
        assert_eq!(decoded, fields, "failed for line {:?}", line);
    }

    #[test]
    fn test_plain_fields_unchanged() {
        roundtrip(&["1", "1.1", "3.3", "alice@example.com"]);
    }

    #[test]
    fn test_delimiter_in_field() {
        roundtrip(&["a;b", ";", ";;;"]);
        assert_eq!(escape("a;b", ';'), "a\\;b");
    }

    #[test]
    fn test_backslash_in_field() {
        roundtrip(&["C:\\path\\to", "\\", "\\\\"]);
        assert_eq!(escape("\\", ';'), "\\\\");
    }

    #[test]
    fn test_newline_in_field() {
        roundtrip(&["line1\nline2", "\n\n\t;end"]);
        let line = encode_record(["a\nb"], RECORD_DELIMITER);
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_non_ascii_field() {
        roundtrip(&["żółw", "naïve"]);
    }

    #[test]
    fn test_empty_middle_field() {
        assert_eq!(decode_record("a;;b", ';'), vec!["a", "", "b"]);
    }

    #[test]
    fn test_trailing_delimiter_drops_empty_field() {
        assert_eq!(decode_record("a;b;", ';'), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_line_decodes_to_no_fields() {
        assert!(decode_record("", ';').is_empty());
        assert!(decode_record("   ", ';').is_empty());
    }

    #[test]
    fn test_line_is_trimmed_before_decoding() {
        assert_eq!(decode_record("  a;b \n", ';'), vec!["a", "b"]);
    }

    #[test]
    fn test_control_escape_sequences_expand() {
        assert_eq!(decode_record("a\\tb;c\\rd", ';'), vec!["a\tb", "c\rd"]);
        assert_eq!(decode_record("\\a\\b\\f\\v", ';'), vec!["\x07\x08\x0c\x0b"]);
    }

    #[test]
    fn test_unknown_escape_is_literal() {
        assert_eq!(decode_record("\\x\\;", ';'), vec!["x;"]);
    }

    #[test]
    fn test_trailing_lone_backslash_is_literal() {
        assert_eq!(decode_record("abc\\", ';'), vec!["abc\\"]);
    }

    #[test]
    fn test_nested_history_delimiter() {
        let inner = encode_record(["2020-01-01", "100", "1"], HISTORY_DELIMITER);
        let outer = encode_record(["alice@example.com", "1", &inner], RECORD_DELIMITER);
        let fields = decode_record(&outer, RECORD_DELIMITER);
        assert_eq!(fields[2], inner);
        let sub = decode_record(&fields[2], HISTORY_DELIMITER);
        assert_eq!(sub, vec!["2020-01-01", "100", "1"]);
    }
}
