//! Text tables for forecast rows: weather code descriptions, month names,
//! and relative day names. Injected into the forecast client so other
//! languages can be plugged in.

use chrono::{Datelike, NaiveDate};

/// Shown when a weather code has no description.
pub const PLACEHOLDER: &str = "—";

/// Read-only label lookup used to render forecast rows.
pub trait LabelTable: Send + Sync {
    /// Description for a WMO weather code, `None` if unknown.
    fn weather_description(&self, code: i32) -> Option<&str>;

    /// Month name in date context (1 = January).
    fn month_name(&self, month: u32) -> &str;

    /// Name for a day relative to today (0 = today).
    fn relative_day(&self, offset: usize) -> &str;

    fn describe(&self, code: Option<i32>) -> String {
        code.and_then(|c| self.weather_description(c))
            .unwrap_or(PLACEHOLDER)
            .to_string()
    }

    /// e.g. "Tomorrow (17 October)"
    fn date_label(&self, offset: usize, date: NaiveDate) -> String {
        format!(
            "{} ({} {})",
            self.relative_day(offset),
            date.day(),
            self.month_name(date.month())
        )
    }
}

const MONTHS: [&str; 12] = [
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

/// Built-in English table
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishLabels;

impl LabelTable for EnglishLabels {
    /// See: https://open-meteo.com/en/docs#weathervariables
    fn weather_description(&self, code: i32) -> Option<&str> {
        let text = match code {
            0 => "Clear",
            1 => "Partly cloudy",
            2 => "Cloudy",
            3 => "Overcast",
            45 => "Fog",
            48 => "Rime fog",
            51 => "Light drizzle",
            53 => "Moderate drizzle",
            55 => "Dense drizzle",
            61 => "Rain",
            63 => "Moderate rain",
            65 => "Heavy rain",
            71 => "Snow",
            73 => "Heavy snow",
            75 => "Very heavy snow",
            80 => "Showers",
            81 => "Heavy showers",
            82 => "Violent showers",
            95 => "Thunderstorm",
            96 => "Thunderstorm with light hail",
            99 => "Thunderstorm with hail",
            _ => return None,
        };
        Some(text)
    }

    fn month_name(&self, month: u32) -> &str {
        month
            .checked_sub(1)
            .and_then(|i| MONTHS.get(i as usize))
            .copied()
            .unwrap_or(PLACEHOLDER)
    }

    fn relative_day(&self, offset: usize) -> &str {
        match offset {
            0 => "Today",
            1 => "Tomorrow",
            2 => "Day after tomorrow",
            _ => "Later",
        }
    }
}
