//! Event model for the dues ledger.
//!
//! An event is one line of the chronological log: a timestamp, an event
//! kind, a comma-separated argument list, and an optional free-text comment.
//! Arguments stay raw strings at this boundary; each handler converts and
//! validates the values it expects.

use crate::dsv;
use crate::error::LedgerError;
use chrono::{NaiveDate, NaiveDateTime};

/// The closed set of event kinds the replay engine dispatches on.
///
/// A kind name outside this set is not an `Event` parse failure; the engine
/// reports it as an unknown-kind error so the offending event can be quoted
/// in full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NewMember,
    DueSet,
    DueAdd,
    Transaction,
    NextMonth,
    SetDefaultDue,
    SetHackerDue,
    SetMaxPrepaidDuesCount,
    AssertHackersExist,
    AssertDefaultDueRateEquals,
    AssertHackerDueBalanceEquals,
    AssertHackerDueRateEquals,
}

impl EventKind {
    /// Looks up a kind by its name in the event log.
    pub fn from_name(name: &str) -> Option<EventKind> {
        match name {
            "newMember" => Some(EventKind::NewMember),
            "dueSet" => Some(EventKind::DueSet),
            "dueAdd" => Some(EventKind::DueAdd),
            "transaction" => Some(EventKind::Transaction),
            "nextMonth" => Some(EventKind::NextMonth),
            "setDefaultDue" => Some(EventKind::SetDefaultDue),
            "setHackerDue" => Some(EventKind::SetHackerDue),
            "setMaxPrepaidDuesCount" => Some(EventKind::SetMaxPrepaidDuesCount),
            "assertHackersExist" => Some(EventKind::AssertHackersExist),
            "assertDefaultDueRateEquals" => Some(EventKind::AssertDefaultDueRateEquals),
            "assertHackerDueBalanceEquals" => Some(EventKind::AssertHackerDueBalanceEquals),
            "assertHackerDueRateEquals" => Some(EventKind::AssertHackerDueRateEquals),
            _ => None,
        }
    }
}

/// A single parsed event from the log.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event date. Date-time input is accepted; the time component is
    /// dropped, day granularity is all the engine relies on.
    pub timestamp: NaiveDate,

    /// Raw kind name as it appeared in the log.
    pub kind: String,

    /// Trimmed argument values, semantics defined per kind.
    pub args: Vec<String>,

    /// Free text, surfaced in assertion failure messages.
    pub comment: String,
}

impl Event {
    /// Parses one event-log line.
    ///
    /// The line is DSV-decoded with `;` into `timestamp;kind;args;comment`.
    /// The args field splits on `,` into trimmed values; a missing or empty
    /// args field yields an empty argument list. The comment defaults to
    /// empty. Blank lines never reach this function.
    pub fn parse(line: &str) -> Result<Event, LedgerError> {
        let fields = dsv::decode_record(line, dsv::RECORD_DELIMITER);
        if fields.len() < 2 {
            return Err(LedgerError::EventParse {
                line: line.trim().to_string(),
                reason: format!("expected at least 2 fields, got {}", fields.len()),
            });
        }

        let timestamp = parse_date(&fields[0]).ok_or_else(|| LedgerError::EventParse {
            line: line.trim().to_string(),
            reason: format!("unparseable date `{}`", fields[0]),
        })?;

        let args = match fields.get(2).map(|s| s.trim()) {
            None | Some("") => Vec::new(),
            Some(args_str) => args_str.split(',').map(|a| a.trim().to_string()).collect(),
        };

        Ok(Event {
            timestamp,
            kind: fields[1].clone(),
            args,
            comment: fields.get(3).cloned().unwrap_or_default(),
        })
    }

    /// Re-encodes the event in its log form, for diagnostics.
    pub fn to_record(&self) -> String {
        dsv::encode_record(
            [
                self.timestamp.to_string(),
                self.kind.clone(),
                self.args.join(","),
                self.comment.clone(),
            ],
            dsv::RECORD_DELIMITER,
        )
    }
}

/// Parses an ISO-8601 date, or a date-time with the time component ignored.
fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    value
        .parse::<NaiveDate>()
        .ok()
        .or_else(|| value.parse::<NaiveDateTime>().ok().map(|dt| dt.date()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_event() {
        let event = Event::parse("2020-01-01;dueSet;alice@example.com, -1;fixup").unwrap();
        assert_eq!(
            event.timestamp,
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
        );
        assert_eq!(event.kind, "dueSet");
        assert_eq!(event.args, vec!["alice@example.com", "-1"]);
        assert_eq!(event.comment, "fixup");
    }

    #[test]
    fn test_parse_trailing_delimiter_defaults_comment() {
        let event = Event::parse("2019-02-01;newMember;hacker1;").unwrap();
        assert_eq!(event.args, vec!["hacker1"]);
        assert_eq!(event.comment, "");
    }

    #[test]
    fn test_parse_empty_args() {
        let event = Event::parse("2020-02-01;nextMonth;;").unwrap();
        assert!(event.args.is_empty());

        let event = Event::parse("2020-02-01;nextMonth").unwrap();
        assert!(event.args.is_empty());
    }

    #[test]
    fn test_parse_datetime_drops_time() {
        let event = Event::parse("2020-01-01T13:37:00;nextMonth;;").unwrap();
        assert_eq!(
            event.timestamp,
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_bad_date() {
        let err = Event::parse("not-a-date;nextMonth;;").unwrap_err();
        assert!(matches!(err, LedgerError::EventParse { .. }));
        assert!(err.to_string().contains("not-a-date"));
    }

    #[test]
    fn test_parse_rejects_single_field() {
        let err = Event::parse("2020-01-01").unwrap_err();
        assert!(matches!(err, LedgerError::EventParse { .. }));
    }

    #[test]
    fn test_kind_lookup() {
        assert_eq!(EventKind::from_name("newMember"), Some(EventKind::NewMember));
        assert_eq!(
            EventKind::from_name("assertHackerDueRateEquals"),
            Some(EventKind::AssertHackerDueRateEquals)
        );
        assert_eq!(EventKind::from_name("timeTravel"), None);
    }

    #[test]
    fn test_to_record_roundtrips() {
        let line = "2020-08-12;assertHackerDueBalanceEquals;hacker1,-1;known good";
        let event = Event::parse(line).unwrap();
        assert_eq!(event.to_record(), line);
    }
}
