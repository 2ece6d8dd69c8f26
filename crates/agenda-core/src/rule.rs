//! The recurrence rule mini-language: the subset of RFC 5545 `RRULE` the
//! calendar stores.
//!
//! Rule text is parsed exactly once into a [`RecurrenceRule`]. Everything
//! downstream works on the structured value; the raw string is only kept in
//! storage, in the canonical form produced by the `Display` impl.
//!
//! Supported parts: `FREQ` (DAILY, WEEKLY, MONTHLY, YEARLY), `INTERVAL`,
//! `BYDAY`, `BYMONTHDAY`, `BYMONTH`, `COUNT`, `UNTIL` and `WKST`. Anything else
//! is rejected rather than ignored.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, LocalResult, Month, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc,
    Weekday,
};
use chrono_tz::Tz;
use rrule::{NWeekday, RRule, RRuleSet, Tz as RRuleTz, Unvalidated};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule is empty")]
    Empty,

    #[error("rule has no FREQ part")]
    MissingFrequency,

    #[error("malformed part '{0}', expected KEY=VALUE")]
    MalformedPart(String),

    #[error("unsupported part '{0}'")]
    UnsupportedPart(String),

    #[error("part {0} appears more than once")]
    DuplicatePart(&'static str),

    #[error("invalid value '{value}' for {part}")]
    InvalidValue { part: &'static str, value: String },

    #[error("COUNT and UNTIL cannot both be set")]
    CountWithUntil,

    #[error("{0}")]
    Conflict(&'static str),

    #[error("rule rejected by the recurrence engine: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl FromStr for Frequency {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            _ => Err(RuleError::InvalidValue {
                part: "FREQ",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily => write!(f, "DAILY"),
            Frequency::Weekly => write!(f, "WEEKLY"),
            Frequency::Monthly => write!(f, "MONTHLY"),
            Frequency::Yearly => write!(f, "YEARLY"),
        }
    }
}

impl From<Frequency> for rrule::Frequency {
    fn from(frequency: Frequency) -> Self {
        match frequency {
            Frequency::Daily => rrule::Frequency::Daily,
            Frequency::Weekly => rrule::Frequency::Weekly,
            Frequency::Monthly => rrule::Frequency::Monthly,
            Frequency::Yearly => rrule::Frequency::Yearly,
        }
    }
}

/// One `BYDAY` entry, e.g. `MO`, `2TU` or `-1FR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdaySpec {
    pub ordinal: Option<i16>,
    pub weekday: Weekday,
}

impl WeekdaySpec {
    fn parse(value: &str) -> Option<Self> {
        if value.len() < 2 || !value.is_ascii() {
            return None;
        }
        let (prefix, code) = value.split_at(value.len() - 2);
        let weekday = parse_weekday(code)?;
        let ordinal = if prefix.is_empty() {
            None
        } else {
            let n: i16 = prefix.parse().ok()?;
            if n == 0 || n.abs() > 53 {
                return None;
            }
            Some(n)
        };
        Some(Self { ordinal, weekday })
    }

    fn to_nweekday(self) -> NWeekday {
        match self.ordinal {
            Some(n) => NWeekday::Nth(n, self.weekday),
            None => NWeekday::Every(self.weekday),
        }
    }
}

impl fmt::Display for WeekdaySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.ordinal {
            write!(f, "{}", n)?;
        }
        write!(f, "{}", weekday_code(self.weekday))
    }
}

/// Upper bound of a series given by `UNTIL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Until {
    /// `UNTIL=20240201T000000Z`
    Instant(DateTime<Utc>),
    /// `UNTIL=20240201T170000`, wall-clock time in the event's zone
    Floating(NaiveDateTime),
    /// `UNTIL=20240201`, through the end of that day in the event's zone
    Date(NaiveDate),
}

impl Until {
    fn parse(value: &str) -> Option<Self> {
        let value = value.to_ascii_uppercase();
        if let Some(stripped) = value.strip_suffix('Z') {
            let naive = NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S").ok()?;
            return Some(Until::Instant(naive.and_utc()));
        }
        if value.len() == 8 {
            return NaiveDate::parse_from_str(&value, "%Y%m%d").ok().map(Until::Date);
        }
        NaiveDateTime::parse_from_str(&value, "%Y%m%dT%H%M%S")
            .ok()
            .map(Until::Floating)
    }

    /// The last instant the series may start at, resolved in `tz`.
    pub fn resolve(&self, tz: Tz) -> DateTime<Utc> {
        match self {
            Until::Instant(instant) => *instant,
            Until::Floating(naive) => resolve_local_upper_bound(tz, *naive),
            Until::Date(date) => {
                let end_of_day =
                    NaiveDateTime::new(*date, NaiveTime::MIN) + TimeDelta::days(1) - TimeDelta::seconds(1);
                resolve_local_upper_bound(tz, end_of_day)
            }
        }
    }
}

impl fmt::Display for Until {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Until::Instant(instant) => write!(f, "{}", instant.format("%Y%m%dT%H%M%SZ")),
            Until::Floating(naive) => write!(f, "{}", naive.format("%Y%m%dT%H%M%S")),
            Until::Date(date) => write!(f, "{}", date.format("%Y%m%d")),
        }
    }
}

/// How a series ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bound {
    #[default]
    Forever,
    Count(u32),
    Until(Until),
}

/// A parsed recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u16,
    pub by_weekday: Vec<WeekdaySpec>,
    pub by_month_day: Vec<i8>,
    pub by_month: Vec<Month>,
    pub bound: Bound,
    pub week_start: Option<Weekday>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            by_weekday: Vec::new(),
            by_month_day: Vec::new(),
            by_month: Vec::new(),
            bound: Bound::Forever,
            week_start: None,
        }
    }

    /// The resolved `UNTIL` instant, if the series has one.
    pub fn until_instant(&self, tz: Tz) -> Option<DateTime<Utc>> {
        match self.bound {
            Bound::Until(until) => Some(until.resolve(tz)),
            _ => None,
        }
    }

    /// Builds the engine rule set anchored at `dtstart`, with every local-time
    /// field resolved in `tz`.
    pub(crate) fn to_rrule_set(&self, dtstart: DateTime<Utc>, tz: Tz) -> Result<RRuleSet, RuleError> {
        let zone = RRuleTz::Tz(tz);
        let mut rule: RRule<Unvalidated> = RRule::new(self.frequency.into()).interval(self.interval);

        if !self.by_weekday.is_empty() {
            rule = rule.by_weekday(self.by_weekday.iter().map(|d| d.to_nweekday()).collect());
        }
        if !self.by_month_day.is_empty() {
            rule = rule.by_month_day(self.by_month_day.clone());
        }
        if !self.by_month.is_empty() {
            rule = rule.by_month(&self.by_month);
        }
        if let Some(week_start) = self.week_start {
            rule = rule.week_start(week_start);
        }
        match self.bound {
            Bound::Forever => {}
            Bound::Count(count) => rule = rule.count(count),
            // The engine only takes UNTIL in UTC when DTSTART carries a named zone.
            Bound::Until(until) => rule = rule.until(until.resolve(tz).with_timezone(&RRuleTz::UTC)),
        }

        rule.build(dtstart.with_timezone(&zone))
            .map_err(|e| RuleError::Rejected(e.to_string()))
    }

    fn validate(&self) -> Result<(), RuleError> {
        if !self.by_month_day.is_empty() && self.frequency == Frequency::Weekly {
            return Err(RuleError::Conflict("BYMONTHDAY cannot be combined with FREQ=WEEKLY"));
        }
        for spec in &self.by_weekday {
            let Some(n) = spec.ordinal else { continue };
            match self.frequency {
                Frequency::Daily | Frequency::Weekly => {
                    return Err(RuleError::Conflict(
                        "numbered BYDAY entries require FREQ=MONTHLY or FREQ=YEARLY",
                    ));
                }
                Frequency::Yearly if !(-52..=53).contains(&n) => {
                    return Err(RuleError::InvalidValue {
                        part: "BYDAY",
                        value: spec.to_string(),
                    });
                }
                Frequency::Monthly if !(-4..=5).contains(&n) => {
                    return Err(RuleError::InvalidValue {
                        part: "BYDAY",
                        value: spec.to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl FromStr for RecurrenceRule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let text = match text.get(..6) {
            Some(prefix) if prefix.eq_ignore_ascii_case("RRULE:") => &text[6..],
            _ => text,
        };
        if text.is_empty() {
            return Err(RuleError::Empty);
        }
        if let Some(line) = text.lines().nth(1) {
            let name = line.split([':', ';']).next().unwrap_or(line).trim();
            return Err(RuleError::UnsupportedPart(name.to_string()));
        }

        let mut frequency: Option<Frequency> = None;
        let mut interval: Option<u16> = None;
        let mut by_weekday: Option<Vec<WeekdaySpec>> = None;
        let mut by_month_day: Option<Vec<i8>> = None;
        let mut by_month: Option<Vec<Month>> = None;
        let mut count: Option<u32> = None;
        let mut until: Option<Until> = None;
        let mut week_start: Option<Weekday> = None;

        for part in text.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| RuleError::MalformedPart(part.to_string()))?;
            let value = value.trim();

            match key.trim().to_ascii_uppercase().as_str() {
                "FREQ" => set_once(&mut frequency, "FREQ", value.parse()?)?,
                "INTERVAL" => {
                    let n = value
                        .parse::<u16>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| invalid("INTERVAL", value))?;
                    set_once(&mut interval, "INTERVAL", n)?
                }
                "BYDAY" => set_once(&mut by_weekday, "BYDAY", parse_list("BYDAY", value, |v| {
                    WeekdaySpec::parse(&v.to_ascii_uppercase())
                })?)?,
                "BYMONTHDAY" => set_once(&mut by_month_day, "BYMONTHDAY", parse_list("BYMONTHDAY", value, |v| {
                    v.parse::<i8>().ok().filter(|d| *d != 0 && (-31..=31).contains(d))
                })?)?,
                "BYMONTH" => set_once(&mut by_month, "BYMONTH", parse_list("BYMONTH", value, |v| {
                    v.parse::<u8>().ok().and_then(|m| Month::try_from(m).ok())
                })?)?,
                "COUNT" => {
                    let n = value
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| invalid("COUNT", value))?;
                    set_once(&mut count, "COUNT", n)?
                }
                "UNTIL" => set_once(
                    &mut until,
                    "UNTIL",
                    Until::parse(value).ok_or_else(|| invalid("UNTIL", value))?,
                )?,
                "WKST" => set_once(
                    &mut week_start,
                    "WKST",
                    parse_weekday(&value.to_ascii_uppercase()).ok_or_else(|| invalid("WKST", value))?,
                )?,
                other => return Err(RuleError::UnsupportedPart(other.to_string())),
            }
        }

        let bound = match (count, until) {
            (Some(_), Some(_)) => return Err(RuleError::CountWithUntil),
            (Some(n), None) => Bound::Count(n),
            (None, Some(u)) => Bound::Until(u),
            (None, None) => Bound::Forever,
        };

        let rule = RecurrenceRule {
            frequency: frequency.ok_or(RuleError::MissingFrequency)?,
            interval: interval.unwrap_or(1),
            by_weekday: by_weekday.unwrap_or_default(),
            by_month_day: by_month_day.unwrap_or_default(),
            by_month: by_month.unwrap_or_default(),
            bound,
            week_start,
        };
        rule.validate()?;
        Ok(rule)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.frequency)?;
        if self.interval != 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        if !self.by_weekday.is_empty() {
            let days: Vec<String> = self.by_weekday.iter().map(ToString::to_string).collect();
            write!(f, ";BYDAY={}", days.join(","))?;
        }
        if !self.by_month_day.is_empty() {
            let days: Vec<String> = self.by_month_day.iter().map(ToString::to_string).collect();
            write!(f, ";BYMONTHDAY={}", days.join(","))?;
        }
        if !self.by_month.is_empty() {
            let months: Vec<String> = self
                .by_month
                .iter()
                .map(|m| m.number_from_month().to_string())
                .collect();
            write!(f, ";BYMONTH={}", months.join(","))?;
        }
        match self.bound {
            Bound::Forever => {}
            Bound::Count(n) => write!(f, ";COUNT={}", n)?,
            Bound::Until(until) => write!(f, ";UNTIL={}", until)?,
        }
        if let Some(week_start) = self.week_start {
            write!(f, ";WKST={}", weekday_code(week_start))?;
        }
        Ok(())
    }
}

fn set_once<T>(slot: &mut Option<T>, part: &'static str, value: T) -> Result<(), RuleError> {
    if slot.is_some() {
        return Err(RuleError::DuplicatePart(part));
    }
    *slot = Some(value);
    Ok(())
}

fn invalid(part: &'static str, value: &str) -> RuleError {
    RuleError::InvalidValue {
        part,
        value: value.to_string(),
    }
}

fn parse_list<T>(
    part: &'static str,
    value: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<T>, RuleError> {
    value
        .split(',')
        .map(|item| parse(item.trim()).ok_or_else(|| invalid(part, item)))
        .collect()
}

fn parse_weekday(code: &str) -> Option<Weekday> {
    match code {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// Maps a wall-clock upper bound to an instant. Ambiguous times take the
/// later instant; times skipped by a DST gap move forward past the gap.
fn resolve_local_upper_bound(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(_, latest) => latest.with_timezone(&Utc),
        LocalResult::None => tz
            .from_local_datetime(&(naive + TimeDelta::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_full_rule() {
        let rule: RecurrenceRule = "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE;COUNT=10;WKST=SU"
            .parse()
            .unwrap();
        assert_eq!(rule.frequency, Frequency::Weekly);
        assert_eq!(rule.interval, 2);
        assert_eq!(
            rule.by_weekday,
            vec![
                WeekdaySpec { ordinal: None, weekday: Weekday::Mon },
                WeekdaySpec { ordinal: None, weekday: Weekday::Wed },
            ]
        );
        assert_eq!(rule.bound, Bound::Count(10));
        assert_eq!(rule.week_start, Some(Weekday::Sun));
    }

    #[test]
    fn test_parse_accepts_prefix_and_lowercase() {
        let rule: RecurrenceRule = "rrule:freq=monthly;bymonthday=1,-1;bymonth=1,7".parse().unwrap();
        assert_eq!(rule.frequency, Frequency::Monthly);
        assert_eq!(rule.by_month_day, vec![1, -1]);
        assert_eq!(rule.by_month, vec![Month::January, Month::July]);
    }

    #[test]
    fn test_parse_numbered_weekday() {
        let rule: RecurrenceRule = "FREQ=MONTHLY;BYDAY=-1FR,+2TU".parse().unwrap();
        assert_eq!(rule.by_weekday[0], WeekdaySpec { ordinal: Some(-1), weekday: Weekday::Fri });
        assert_eq!(rule.by_weekday[1], WeekdaySpec { ordinal: Some(2), weekday: Weekday::Tue });
    }

    #[rstest]
    #[case("20240201T000000Z", Until::Instant(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()))]
    #[case("20240201T170000", Until::Floating(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap().and_hms_opt(17, 0, 0).unwrap()))]
    #[case("20240201", Until::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()))]
    fn test_parse_until_forms(#[case] value: &str, #[case] expected: Until) {
        let rule: RecurrenceRule = format!("FREQ=DAILY;UNTIL={}", value).parse().unwrap();
        assert_eq!(rule.bound, Bound::Until(expected));
    }

    #[rstest]
    #[case("", RuleError::Empty)]
    #[case("RRULE:", RuleError::Empty)]
    #[case("INTERVAL=2", RuleError::MissingFrequency)]
    #[case("FREQ=DAILY;BOGUS", RuleError::MalformedPart("BOGUS".to_string()))]
    #[case("FREQ=HOURLY", RuleError::InvalidValue { part: "FREQ", value: "HOURLY".to_string() })]
    #[case("FREQ=DAILY;BYHOUR=9", RuleError::UnsupportedPart("BYHOUR".to_string()))]
    #[case("FREQ=DAILY;FREQ=WEEKLY", RuleError::DuplicatePart("FREQ"))]
    #[case("FREQ=DAILY;INTERVAL=0", RuleError::InvalidValue { part: "INTERVAL", value: "0".to_string() })]
    #[case("FREQ=DAILY;COUNT=-3", RuleError::InvalidValue { part: "COUNT", value: "-3".to_string() })]
    #[case("FREQ=WEEKLY;BYDAY=XX", RuleError::InvalidValue { part: "BYDAY", value: "XX".to_string() })]
    #[case("FREQ=MONTHLY;BYMONTHDAY=32", RuleError::InvalidValue { part: "BYMONTHDAY", value: "32".to_string() })]
    #[case("FREQ=YEARLY;BYMONTH=13", RuleError::InvalidValue { part: "BYMONTH", value: "13".to_string() })]
    #[case("FREQ=DAILY;UNTIL=tomorrow", RuleError::InvalidValue { part: "UNTIL", value: "tomorrow".to_string() })]
    #[case("FREQ=DAILY;COUNT=3;UNTIL=20240101", RuleError::CountWithUntil)]
    #[case("FREQ=YEARLY;BYDAY=-53MO", RuleError::InvalidValue { part: "BYDAY", value: "-53MO".to_string() })]
    #[case("FREQ=MONTHLY;BYDAY=-5FR", RuleError::InvalidValue { part: "BYDAY", value: "-5FR".to_string() })]
    fn test_parse_rejects(#[case] input: &str, #[case] expected: RuleError) {
        assert_eq!(input.parse::<RecurrenceRule>().unwrap_err(), expected);
    }

    #[test]
    fn test_parse_rejects_dtstart_line() {
        let result = "DTSTART:20240101T090000Z\nRRULE:FREQ=DAILY".parse::<RecurrenceRule>();
        assert_eq!(result.unwrap_err(), RuleError::UnsupportedPart("DTSTART".to_string()));
    }

    #[test]
    fn test_parse_rejects_conflicting_parts() {
        assert!(matches!(
            "FREQ=WEEKLY;BYMONTHDAY=3".parse::<RecurrenceRule>(),
            Err(RuleError::Conflict(_))
        ));
        assert!(matches!(
            "FREQ=WEEKLY;BYDAY=2MO".parse::<RecurrenceRule>(),
            Err(RuleError::Conflict(_))
        ));
        assert!(matches!(
            "FREQ=MONTHLY;BYDAY=6MO".parse::<RecurrenceRule>(),
            Err(RuleError::InvalidValue { part: "BYDAY", .. })
        ));
    }

    #[test]
    fn test_display_is_canonical() {
        let rule: RecurrenceRule = "byday=we,mo;freq=weekly;interval=1;until=20240201".parse().unwrap();
        assert_eq!(rule.to_string(), "FREQ=WEEKLY;BYDAY=WE,MO;UNTIL=20240201");
        assert_eq!(rule.to_string().parse::<RecurrenceRule>().unwrap(), rule);
    }

    #[test]
    fn test_until_date_covers_the_whole_local_day() {
        let until = Until::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(
            until.resolve(chrono_tz::UTC),
            Utc.with_ymd_and_hms(2024, 2, 1, 23, 59, 59).unwrap()
        );
        // New York is UTC-5 in February
        assert_eq!(
            until.resolve(chrono_tz::America::New_York),
            Utc.with_ymd_and_hms(2024, 2, 2, 4, 59, 59).unwrap()
        );
    }

    #[test]
    fn test_floating_until_in_dst_gap_moves_forward() {
        // 02:30 does not exist in New York on 2024-03-10
        let naive = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap().and_hms_opt(2, 30, 0).unwrap();
        let resolved = Until::Floating(naive).resolve(chrono_tz::America::New_York);
        assert_eq!(resolved, Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap());
    }

    #[rstest]
    #[case(chrono_tz::UTC)]
    #[case(chrono_tz::Europe::Berlin)]
    #[case(chrono_tz::America::New_York)]
    fn test_until_builds_in_any_zone(#[case] tz: Tz) {
        let dtstart = Utc.with_ymd_and_hms(2024, 1, 1, 13, 0, 0).unwrap();
        for text in [
            "FREQ=WEEKLY;BYDAY=MO;UNTIL=20240201",
            "FREQ=WEEKLY;BYDAY=MO;UNTIL=20240201T120000",
            "FREQ=WEEKLY;BYDAY=MO;UNTIL=20240201T120000Z",
        ] {
            let rule: RecurrenceRule = text.parse().unwrap();
            assert!(rule.to_rrule_set(dtstart, tz).is_ok(), "{} in {}", text, tz);
        }
    }
}
