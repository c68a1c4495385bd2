use chrono::{DateTime, FixedOffset, NaiveDate};
use chrono_tz::Tz;

/// Tempo day classification as published by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TempoColor {
    Blue,
    White,
    Red,
    Unknown,
}

impl TempoColor {
    pub fn from_label(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "BLUE" => Self::Blue,
            "WHITE" => Self::White,
            "RED" => Self::Red,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blue => "BLUE",
            Self::White => "WHITE",
            Self::Red => "RED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for TempoColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified day, generic over how its boundaries are expressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay<T> {
    pub start: T,
    pub end: T,
    /// Raw classification value, kept verbatim
    pub value: String,
    pub updated: DateTime<FixedOffset>,
}

impl<T> CalendarDay<T> {
    pub fn color(&self) -> TempoColor {
        TempoColor::from_label(&self.value)
    }
}

/// Midnight-to-midnight day, as reported by the source
pub type DateAlignedDay = CalendarDay<NaiveDate>;

/// Day running from the change hour to the change hour of the next day
pub type HourShiftedDay = CalendarDay<DateTime<FixedOffset>>;

/// Outcome of one successful calendar fetch
///
/// Built in a single pass over the payload; replaced as a whole on the
/// next successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub date_aligned_days: Vec<DateAlignedDay>,
    pub hour_shifted_days: Vec<HourShiftedDay>,
    /// Midnight (reference timezone) of the latest date-aligned end date
    pub horizon: Option<DateTime<Tz>>,
}

impl FetchResult {
    pub fn is_empty(&self) -> bool {
        self.date_aligned_days.is_empty()
    }

    /// Date-aligned day covering `date`
    pub fn day_on(&self, date: NaiveDate) -> Option<&DateAlignedDay> {
        self.date_aligned_days
            .iter()
            .find(|d| d.start <= date && date < d.end)
    }

    /// Color of `date`, if published
    pub fn color_on(&self, date: NaiveDate) -> Option<TempoColor> {
        self.day_on(date).map(CalendarDay::color)
    }
}
