pub mod window;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use window::{active_risks_for_month, format_month_range, MonthWindow};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A calendar month, 1 (January) through 12 (December).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub struct Month(u8);

impl Month {
    pub const JANUARY: Month = Month(1);
    pub const DECEMBER: Month = Month(12);

    pub fn new(value: i64) -> Option<Self> {
        if (1..=12).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn next(self) -> Self {
        if self.0 == 12 {
            Self::JANUARY
        } else {
            Self(self.0 + 1)
        }
    }

    pub fn current() -> Self {
        Self(chrono::Local::now().month() as u8)
    }

    pub fn all() -> impl Iterator<Item = Month> {
        (1..=12u8).map(Month)
    }

    pub fn name(self) -> &'static str {
        MONTH_NAMES[usize::from(self.0 - 1)]
    }

    pub fn short_name(self) -> &'static str {
        &self.name()[..3]
    }

    pub fn season(self) -> Season {
        match self.0 {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }
}

impl Display for Month {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Error)]
#[error("invalid month: {0} (expected 1-12 or a month name)")]
pub struct MonthParseError(pub String);

impl TryFrom<u8> for Month {
    type Error = MonthParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Month::new(i64::from(value)).ok_or_else(|| MonthParseError(value.to_string()))
    }
}

impl From<Month> for u8 {
    fn from(value: Month) -> Self {
        value.0
    }
}

impl FromStr for Month {
    type Err = MonthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(number) = trimmed.parse::<i64>() {
            return Month::new(number).ok_or_else(|| MonthParseError(s.to_string()));
        }
        let lowered = trimmed.to_ascii_lowercase();
        if lowered.len() >= 3 {
            for month in Month::all() {
                if month.name().to_ascii_lowercase().starts_with(&lowered) {
                    return Ok(month);
                }
            }
        }
        Err(MonthParseError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Display for Season {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Autumn => "autumn",
            Self::Winter => "winter",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_month_wraps_at_year_end() {
        assert_eq!(Month::DECEMBER.next(), Month::JANUARY);
        assert_eq!(Month::new(6).map(Month::next), Month::new(7));
    }

    #[test]
    fn rejects_out_of_range_months() {
        assert!(Month::new(0).is_none());
        assert!(Month::new(13).is_none());
        assert!(Month::new(-1).is_none());
        assert!("13".parse::<Month>().is_err());
    }

    #[test]
    fn parses_numbers_and_names() {
        assert_eq!("11".parse::<Month>().ok(), Month::new(11));
        assert_eq!("feb".parse::<Month>().ok(), Month::new(2));
        assert_eq!("September".parse::<Month>().ok(), Month::new(9));
        assert!("ju".parse::<Month>().is_err());
    }

    #[test]
    fn seasons_follow_meteorological_quarters() {
        assert_eq!(Month::JANUARY.season(), Season::Winter);
        assert_eq!(Month::new(4).map(Month::season), Some(Season::Spring));
        assert_eq!(Month::new(8).map(Month::season), Some(Season::Summer));
        assert_eq!(Month::new(10).map(Month::season), Some(Season::Autumn));
        assert_eq!(Month::DECEMBER.season(), Season::Winter);
    }

    #[test]
    fn serializes_as_a_plain_number() {
        let month = Month::new(5).expect("valid month");
        assert_eq!(serde_json::to_string(&month).expect("serialize"), "5");
        let parsed: Month = serde_json::from_str("12").expect("deserialize");
        assert_eq!(parsed, Month::DECEMBER);
        assert!(serde_json::from_str::<Month>("0").is_err());
    }
}
