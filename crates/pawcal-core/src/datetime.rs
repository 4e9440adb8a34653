use std::fmt;
use std::sync::OnceLock;

use chrono::{
  DateTime,
  Datelike,
  Duration,
  FixedOffset,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  Offset,
  TimeZone,
  Utc,
  Weekday
};
use regex::Regex;
use serde::{
  Deserialize,
  Deserializer,
  Serialize,
  Serializer
};

/// Offset of the business calendar (KST).
pub const BUSINESS_OFFSET_SECONDS: i32 =
  9 * 3600;

const DATE_KEY_FORMAT: &str =
  "%Y-%m-%d";
const UNKNOWN_KEY: &str = "unknown";

/// The fixed offset every date-key is
/// computed in. Host timezone never
/// participates.
pub fn business_offset() -> FixedOffset
{
  static OFFSET: OnceLock<FixedOffset> =
    OnceLock::new();
  *OFFSET.get_or_init(|| {
    FixedOffset::east_opt(
      BUSINESS_OFFSET_SECONDS
    )
    .unwrap_or_else(|| {
      tracing::error!(
        seconds =
          BUSINESS_OFFSET_SECONDS,
        "invalid business offset; \
         using UTC"
      );
      Utc.fix()
    })
  })
}

/// Canonical calendar day used for
/// bucketing and highlighting.
///
/// `Unknown` is the sentinel produced for
/// missing or unparseable timestamps. No
/// calendar cell is ever keyed by it.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
)]
pub enum DateKey {
  Day(NaiveDate),
  Unknown
}

impl DateKey {
  #[must_use]
  pub fn from_date(
    date: NaiveDate
  ) -> Self {
    Self::Day(date)
  }

  /// Parses a `YYYY-MM-DD` key. Anything
  /// else is the sentinel.
  #[must_use]
  pub fn parse(raw: &str) -> Self {
    NaiveDate::parse_from_str(
      raw.trim(),
      DATE_KEY_FORMAT
    )
    .map(Self::Day)
    .unwrap_or(Self::Unknown)
  }

  #[must_use]
  pub fn date(
    &self
  ) -> Option<NaiveDate> {
    match self {
      | Self::Day(date) => Some(*date),
      | Self::Unknown => None
    }
  }

  #[must_use]
  pub fn is_unknown(&self) -> bool {
    matches!(self, Self::Unknown)
  }

  /// Midnight of this day in the
  /// business offset.
  #[must_use]
  pub fn midnight(
    &self
  ) -> Option<DateTime<FixedOffset>> {
    self.date().and_then(local_midnight)
  }
}

impl fmt::Display for DateKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Self::Day(date) => {
        write!(
          f,
          "{}",
          date.format(DATE_KEY_FORMAT)
        )
      }
      | Self::Unknown => {
        f.write_str(UNKNOWN_KEY)
      }
    }
  }
}

impl Serialize for DateKey {
  fn serialize<S>(
    &self,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for DateKey {
  fn deserialize<D>(
    deserializer: D
  ) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    Ok(Self::parse(&raw))
  }
}

/// Projects a timestamp into the business
/// offset and returns its calendar day.
#[must_use]
pub fn normalize<Z: TimeZone>(
  timestamp: Option<&DateTime<Z>>
) -> DateKey {
  match timestamp {
    | Some(ts) => {
      DateKey::Day(
        ts.with_timezone(
          &business_offset()
        )
        .date_naive()
      )
    }
    | None => DateKey::Unknown
  }
}

/// Textual variant of [`normalize`].
///
/// Zone-less inputs are read as business
/// local time.
#[must_use]
pub fn normalize_str(
  raw: &str
) -> DateKey {
  let token = raw.trim();
  if token.is_empty() {
    return DateKey::Unknown;
  }

  if let Ok(ndt) =
    NaiveDateTime::parse_from_str(
      token,
      "%Y%m%dT%H%M%SZ"
    )
  {
    let utc = DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc);
    return normalize(Some(&utc));
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return normalize(Some(&dt));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token,
      DATE_KEY_FORMAT
    )
  {
    return DateKey::Day(date);
  }

  for fmt in
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
  {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return DateKey::Day(ndt.date());
    }
  }

  tracing::debug!(
    input = token,
    "unparseable timestamp mapped to \
     unknown key"
  );
  DateKey::Unknown
}

#[must_use]
pub fn today_key(
  now: DateTime<Utc>
) -> DateKey {
  normalize(Some(&now))
}

#[must_use]
pub fn today_in_business_offset(
  now: DateTime<Utc>
) -> NaiveDate {
  now
    .with_timezone(&business_offset())
    .date_naive()
}

/// Attaches a wall-clock time to a date in
/// the business offset.
#[must_use]
pub fn combine(
  date: NaiveDate,
  time: NaiveTime
) -> Option<DateTime<FixedOffset>> {
  business_offset()
    .from_local_datetime(
      &date.and_time(time)
    )
    .single()
}

#[must_use]
pub fn local_midnight(
  date: NaiveDate
) -> Option<DateTime<FixedOffset>> {
  let midnight =
    date.and_hms_opt(0, 0, 0)?;
  business_offset()
    .from_local_datetime(&midnight)
    .single()
}

#[must_use]
pub fn parse_calendar_date(
  raw: &str
) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(
    raw.trim(),
    DATE_KEY_FORMAT
  )
  .ok()
}

fn clock_regex() -> Option<&'static Regex>
{
  static CLOCK_RE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  CLOCK_RE
    .get_or_init(|| {
      Regex::new(
        r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})(?::(?P<second>\d{2}))?\s*(?P<ampm>[ap]m)?$",
      )
      .map_err(|err| {
        tracing::error!(
          error = %err,
          "internal clock regex compile failure"
        );
      })
      .ok()
    })
    .as_ref()
}

/// Accepts `HH:MM`, `HH:MM:SS` and
/// 12-hour forms such as `3:23pm`.
#[must_use]
pub fn parse_clock_time(
  token: &str
) -> Option<NaiveTime> {
  let captures = clock_regex()?
    .captures(token.trim())?;

  let raw_hour = captures
    .name("hour")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let minute = captures
    .name("minute")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let second = match captures
    .name("second")
  {
    | Some(m) => {
      m.as_str().parse::<u32>().ok()?
    }
    | None => 0
  };

  let hour = if let Some(ampm_match) =
    captures.name("ampm")
  {
    let ampm = ampm_match
      .as_str()
      .to_ascii_lowercase();
    if raw_hour == 0 || raw_hour > 12 {
      return None;
    }
    match ampm.as_str() {
      | "am" => {
        if raw_hour == 12 {
          0
        } else {
          raw_hour
        }
      }
      | "pm" => {
        if raw_hour == 12 {
          12
        } else {
          raw_hour + 12
        }
      }
      | _ => return None
    }
  } else {
    raw_hour
  };

  NaiveTime::from_hms_opt(
    hour, minute, second
  )
}

pub fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

pub(crate) fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

pub(crate) fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

pub(crate) fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
}

/// First day of the month `months` away
/// from `date`'s month.
pub(crate) fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let mut year = date.year();
  let mut month =
    date.month() as i32 + months;

  while month < 1 {
    month += 12;
    year = year.saturating_sub(1);
  }
  while month > 12 {
    month -= 12;
    year = year.saturating_add(1);
  }

  first_day_of_month(
    year,
    month as u32
  )
}

pub(crate) fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_monday()
    as i64;
  let start_idx = week_start
    .num_days_from_monday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(day, -diff)
}
