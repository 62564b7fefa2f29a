//! Reserve time-window resolution

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use log::error;

use super::dates;
use super::{Reserve, Term};

/// Decide which reserves are active at `now`.
///
/// Each reserve's effective window is its own parseable override dates,
/// falling back per-boundary to the term. A reserve is current from the
/// first instant after its start date's midnight through the entirety of its
/// end date (the window closes at midnight the following day). Unparseable
/// term dates fail closed: no window, no current reserves. Output preserves
/// input order; included reserves carry the effective dates that admitted
/// them. Pure apart from logging.
pub fn current_reserves(term: &Term, reserves: &[Reserve], now: DateTime<Utc>) -> Vec<Reserve> {
    let term_window = (
        dates::parse_date(&term.start_date),
        dates::parse_date(&term.end_date),
    );
    let (term_start, term_end) = match term_window {
        (Ok(start), Ok(end)) => (start, end),
        _ => {
            error!(
                "failed to parse term dates: '{}' & '{}'",
                term.start_date, term.end_date
            );
            return Vec::new();
        }
    };

    let mut current = Vec::new();

    for reserve in reserves {
        let (start_string, start) =
            effective_date(reserve.start_date.as_deref(), &term.start_date, term_start);
        let (end_string, end) =
            effective_date(reserve.end_date.as_deref(), &term.end_date, term_end);

        if now > midnight(start) && now < midnight(end) + TimeDelta::days(1) {
            let mut included = reserve.clone();
            included.start_date = Some(start_string);
            included.end_date = Some(end_string);
            current.push(included);
        }
    }

    current
}

/// Item override when present and parseable, else the term boundary
fn effective_date(
    override_date: Option<&str>,
    term_string: &str,
    term_date: NaiveDate,
) -> (String, NaiveDate) {
    if let Some(raw) = override_date {
        match dates::parse_date(raw) {
            Ok(date) => return (raw.to_string(), date),
            Err(err) => error!("{}, falling back to term date", err),
        }
    }

    (term_string.to_string(), term_date)
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn term() -> Term {
        Term {
            start_date: "2020-09-01".to_string(),
            end_date: "2020-11-30".to_string(),
        }
    }

    fn reserve(title: &str, start: Option<&str>, end: Option<&str>) -> Reserve {
        Reserve {
            item_id: format!("item-{title}"),
            barcode: String::new(),
            instance_hrid: String::new(),
            title: title.to_string(),
            uri: String::new(),
            start_date: start.map(str::to_string),
            end_date: end.map(str::to_string),
            primary_contributor: String::new(),
            location_display_name: "?".to_string(),
            suppress_discovery: false,
        }
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_reserve_without_overrides_uses_term_window() {
        let reserves = vec![reserve("plain", None, None)];
        let current = current_reserves(&term(), &reserves, at(2020, 10, 2, 12, 0, 0));

        assert_eq!(current.len(), 1);
        assert_eq!(current[0].start_date.as_deref(), Some("2020-09-01"));
        assert_eq!(current[0].end_date.as_deref(), Some("2020-11-30"));
    }

    #[test]
    fn test_expired_override_excludes_reserve() {
        let reserves = vec![reserve("expired", Some("2020-09-01"), Some("2020-09-30"))];
        let current = current_reserves(&term(), &reserves, at(2020, 10, 2, 12, 0, 0));

        assert!(current.is_empty());
    }

    #[test]
    fn test_end_date_is_inclusive_through_its_whole_day() {
        let reserves = vec![reserve("boundary", None, Some("2020-10-01"))];

        // any instant on the end date itself is still in the window
        assert_eq!(
            current_reserves(&term(), &reserves, at(2020, 10, 1, 0, 0, 1)).len(),
            1
        );
        assert_eq!(
            current_reserves(&term(), &reserves, at(2020, 10, 1, 23, 59, 59)).len(),
            1
        );

        // the next day's midnight closes it
        assert!(current_reserves(&term(), &reserves, at(2020, 10, 2, 0, 0, 0)).is_empty());
        assert!(current_reserves(&term(), &reserves, at(2020, 10, 2, 12, 0, 0)).is_empty());
    }

    #[test]
    fn test_start_midnight_instant_is_excluded() {
        let reserves = vec![reserve("starting", Some("2020-10-01"), None)];

        assert!(current_reserves(&term(), &reserves, at(2020, 10, 1, 0, 0, 0)).is_empty());
        assert_eq!(
            current_reserves(&term(), &reserves, at(2020, 10, 1, 0, 0, 1)).len(),
            1
        );
    }

    #[test]
    fn test_unparseable_term_dates_fail_closed() {
        let bad_term = Term {
            start_date: "soon".to_string(),
            end_date: "2020-11-30".to_string(),
        };
        let reserves = vec![reserve("any", Some("2020-09-01"), Some("2020-12-31"))];

        assert!(current_reserves(&bad_term, &reserves, at(2020, 10, 2, 12, 0, 0)).is_empty());
    }

    #[test]
    fn test_unparseable_override_falls_back_to_term() {
        let reserves = vec![reserve("fallback", Some("whenever"), None)];
        let current = current_reserves(&term(), &reserves, at(2020, 10, 2, 12, 0, 0));

        assert_eq!(current.len(), 1);
        assert_eq!(current[0].start_date.as_deref(), Some("2020-09-01"));
    }

    #[test]
    fn test_mixed_set_keeps_only_active_reserves_in_order() {
        let reserves = vec![
            reserve("explicit-valid", Some("2020-09-15"), Some("2020-10-15")),
            reserve("expired", Some("2020-09-01"), Some("2020-09-30")),
            reserve("implicit-valid", None, None),
            reserve("not-yet-started", Some("2020-11-01"), None),
        ];

        let current = current_reserves(&term(), &reserves, at(2020, 10, 2, 12, 0, 0));

        let titles: Vec<&str> = current.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["explicit-valid", "implicit-valid"]);
    }
}
