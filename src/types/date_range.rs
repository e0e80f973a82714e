use std::fmt;

use anyhow::{Result, anyhow, bail};
use chrono::{
    DateTime, Datelike, Days, Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat,
    TimeZone, Utc,
};
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RangePreset {
    Today,
    Yesterday,
    #[value(name = "last-7-days")]
    Last7Days,
    #[value(name = "last-15-days")]
    Last15Days,
    #[value(name = "last-30-days")]
    Last30Days,
    #[value(name = "last-month")]
    LastMonth,
}

impl fmt::Display for RangePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Today => write!(f, "today"),
            Self::Yesterday => write!(f, "yesterday"),
            Self::Last7Days => write!(f, "last-7-days"),
            Self::Last15Days => write!(f, "last-15-days"),
            Self::Last30Days => write!(f, "last-30-days"),
            Self::LastMonth => write!(f, "last-month"),
        }
    }
}

impl RangePreset {
    /// Inclusive first and last calendar day of the preset, relative to `today`.
    pub fn days(self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
        let days_back = |n: u64| {
            today
                .checked_sub_days(Days::new(n))
                .ok_or_else(|| anyhow!("{self} is out of range for {today}"))
        };

        match self {
            Self::Today => Ok((today, today)),
            Self::Yesterday => {
                let yesterday = days_back(1)?;
                Ok((yesterday, yesterday))
            }
            Self::Last7Days => Ok((days_back(6)?, today)),
            Self::Last15Days => Ok((days_back(14)?, today)),
            Self::Last30Days => Ok((days_back(29)?, today)),
            Self::LastMonth => {
                let last_day = today
                    .with_day(1)
                    .and_then(|first_of_month| first_of_month.pred_opt())
                    .ok_or_else(|| anyhow!("{self} is out of range for {today}"))?;
                let first_day = last_day
                    .with_day(1)
                    .ok_or_else(|| anyhow!("{self} is out of range for {today}"))?;

                Ok((first_day, last_day))
            }
        }
    }
}

/// Start-of-day to end-of-day window in local time, sent to the backend as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn from_days(first: NaiveDate, last: NaiveDate) -> Result<Self> {
        if first > last {
            bail!("range start {first} is after range end {last}");
        }

        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
            .ok_or_else(|| anyhow!("invalid end-of-day time"))?;

        Ok(Self {
            start: local_to_utc(first.and_time(NaiveTime::MIN))?,
            end: local_to_utc(last.and_time(end_of_day))?,
        })
    }

    pub fn preset(preset: RangePreset, today: NaiveDate) -> Result<Self> {
        let (first, last) = preset.days(today)?;
        Self::from_days(first, last)
    }

    pub fn start_param(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn end_param(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

fn local_to_utc(naive: NaiveDateTime) -> Result<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("{naive} does not exist in the local timezone"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rolling_presets_include_today() {
        let today = date(2026, 3, 10);

        assert_eq!(RangePreset::Today.days(today).unwrap(), (today, today));
        assert_eq!(
            RangePreset::Yesterday.days(today).unwrap(),
            (date(2026, 3, 9), date(2026, 3, 9))
        );
        assert_eq!(
            RangePreset::Last7Days.days(today).unwrap(),
            (date(2026, 3, 4), today)
        );
        assert_eq!(
            RangePreset::Last15Days.days(today).unwrap(),
            (date(2026, 2, 24), today)
        );
        assert_eq!(
            RangePreset::Last30Days.days(today).unwrap(),
            (date(2026, 2, 9), today)
        );
    }

    #[test]
    fn last_month_covers_the_whole_previous_month() {
        assert_eq!(
            RangePreset::LastMonth.days(date(2026, 3, 10)).unwrap(),
            (date(2026, 2, 1), date(2026, 2, 28))
        );
        assert_eq!(
            RangePreset::LastMonth.days(date(2026, 1, 1)).unwrap(),
            (date(2025, 12, 1), date(2025, 12, 31))
        );
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        assert!(DateRange::from_days(date(2026, 3, 10), date(2026, 3, 9)).is_err());
    }

    #[test]
    fn params_are_iso_8601_utc() {
        let range = DateRange::preset(RangePreset::Today, date(2026, 6, 15)).unwrap();

        assert!(range.start < range.end);
        assert!(range.start_param().ends_with('Z'));
        assert!(range.end_param().ends_with(".999Z"));
    }
}
