use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::records::PestDiseaseRecord;
use crate::season::Month;

/// Inclusive range of months a pest or disease is active in.
///
/// `start > end` means the window runs across the year-end, e.g. 11..2 covers
/// November, December, January and February.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthWindow {
    pub start: Month,
    pub end: Month,
}

impl MonthWindow {
    pub fn new(start: Month, end: Month) -> Self {
        Self { start, end }
    }

    /// Both bounds must be present and within 1..=12.
    pub fn from_bounds(start: Option<i64>, end: Option<i64>) -> Option<Self> {
        let start = Month::new(start?)?;
        let end = Month::new(end?)?;
        Some(Self { start, end })
    }

    pub fn wraps_year(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, month: Month) -> bool {
        if self.wraps_year() {
            month >= self.start || month <= self.end
        } else {
            self.start <= month && month <= self.end
        }
    }

    pub fn months(&self) -> Vec<Month> {
        Month::all().filter(|m| self.contains(*m)).collect()
    }
}

impl Display for MonthWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start.short_name())
        } else if self.wraps_year() {
            write!(
                f,
                "{}-{} (across year-end)",
                self.start.short_name(),
                self.end.short_name()
            )
        } else {
            write!(f, "{}-{}", self.start.short_name(), self.end.short_name())
        }
    }
}

pub fn format_month_range(start: Option<i64>, end: Option<i64>) -> String {
    MonthWindow::from_bounds(start, end)
        .map(|window| window.to_string())
        .unwrap_or_else(|| "unset".to_string())
}

impl PestDiseaseRecord {
    pub fn window(&self) -> Option<MonthWindow> {
        MonthWindow::from_bounds(self.start_month, self.end_month)
    }

    /// A record without a usable window is never active.
    pub fn is_active_in(&self, month: Month) -> bool {
        self.window().is_some_and(|w| w.contains(month))
    }
}

/// Records active in `month`, in their original order.
pub fn active_risks_for_month(records: &[PestDiseaseRecord], month: Month) -> Vec<PestDiseaseRecord> {
    records
        .iter()
        .filter(|record| record.is_active_in(month))
        .cloned()
        .collect()
}
