use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};

/// Upper bound on the forward scan for a business day.
pub const MAX_SCAN_DAYS: u32 = 14;

// (month, day) of the fixed-date public holidays
const FIXED_HOLIDAYS: [(u32, u32); 8] = [
    (1, 1),
    (5, 1),
    (5, 8),
    (7, 14),
    (8, 15),
    (11, 1),
    (11, 11),
    (12, 25),
];

/// Easter Sunday, anonymous Gregorian algorithm.
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15).rem_euclid(30);
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k).rem_euclid(7);
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Metropolitan French public holidays of `year`, sorted.
pub fn french_holidays(year: i32) -> Vec<NaiveDate> {
    let mut days: Vec<NaiveDate> = FIXED_HOLIDAYS
        .iter()
        .filter_map(|(m, d)| NaiveDate::from_ymd_opt(year, *m, *d))
        .collect();
    if let Some(easter) = easter_sunday(year) {
        // Easter Monday, Ascension, Whit Monday
        for offset in [1, 39, 50] {
            days.push(easter + Duration::days(offset));
        }
    }
    days.sort();
    days
}

pub fn is_holiday(date: NaiveDate) -> bool {
    french_holidays(date.year()).contains(&date)
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_holiday(date)
}

/// String form taking `YYYY-MM-DD`.
pub fn is_business_day_str(value: &str) -> Result<bool, String> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{}': {}", value, e))?;
    Ok(is_business_day(date))
}

/// First business day at or after `from`. If none is found within
/// [`MAX_SCAN_DAYS`] the last scanned day is returned.
pub fn next_business_day(from: NaiveDate) -> NaiveDate {
    let mut day = from;
    for _ in 0..MAX_SCAN_DAYS {
        if is_business_day(day) {
            return day;
        }
        day = day.succ_opt().unwrap_or(day);
    }
    day
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuggestionKind {
    TomorrowMorning,
    TomorrowAfternoon,
    MondayMorning,
}

impl SuggestionKind {
    pub const ALL: [SuggestionKind; 3] = [
        SuggestionKind::TomorrowMorning,
        SuggestionKind::TomorrowAfternoon,
        SuggestionKind::MondayMorning,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "tomorrow-morning" => Some(Self::TomorrowMorning),
            "tomorrow-afternoon" => Some(Self::TomorrowAfternoon),
            "monday-morning" => Some(Self::MondayMorning),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TomorrowMorning => "tomorrow-morning",
            Self::TomorrowAfternoon => "tomorrow-afternoon",
            Self::MondayMorning => "monday-morning",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ScheduleSlot {
    pub date: NaiveDate,
    pub hour: u32,
    pub minute: u32,
    pub label: String,
    pub time_label: String,
}

pub fn suggested_slot(kind: SuggestionKind, now: NaiveDateTime) -> ScheduleSlot {
    let today = now.date();
    let tomorrow = today + Duration::days(1);
    let (date, hour, label) = match kind {
        SuggestionKind::TomorrowMorning | SuggestionKind::TomorrowAfternoon => {
            let date = next_business_day(tomorrow);
            let is_tomorrow = date == tomorrow;
            let (hour, label) = match (kind, is_tomorrow) {
                (SuggestionKind::TomorrowMorning, true) => (9, "Demain matin"),
                (SuggestionKind::TomorrowMorning, false) => (9, "Prochain jour ouvré matin"),
                (_, true) => (14, "Demain après-midi"),
                (_, false) => (14, "Prochain jour ouvré 14h"),
            };
            (date, hour, label)
        }
        SuggestionKind::MondayMorning => {
            let from_sunday = today.weekday().num_days_from_sunday() as i64;
            let until_monday = match (1 - from_sunday + 7) % 7 {
                0 => 7,
                n => n,
            };
            (
                next_business_day(today + Duration::days(until_monday)),
                9,
                "Lundi matin",
            )
        }
    };
    ScheduleSlot {
        date,
        hour,
        minute: 0,
        label: label.to_string(),
        time_label: format!("{:02}:00", hour),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(date: NaiveDate, h: u32) -> NaiveDateTime {
        date.and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn easter_dates() {
        assert_eq!(easter_sunday(2024), Some(day(2024, 3, 31)));
        assert_eq!(easter_sunday(2025), Some(day(2025, 4, 20)));
        assert_eq!(easter_sunday(2000), Some(day(2000, 4, 23)));
    }

    #[test]
    fn holiday_set_has_eleven_days() {
        let days = french_holidays(2024);
        assert_eq!(days.len(), 11);
        assert!(days.contains(&day(2024, 4, 1)));
        assert!(days.contains(&day(2024, 5, 9)));
        assert!(days.contains(&day(2024, 5, 20)));
    }

    #[test]
    fn string_form() {
        assert_eq!(is_business_day_str("2024-05-01"), Ok(false));
        assert_eq!(is_business_day_str("2024-05-02"), Ok(true));
        assert_eq!(is_business_day_str("2024-05-04"), Ok(false));
        assert!(is_business_day_str("05/02/2024").is_err());
    }

    #[test]
    fn wednesday_suggests_thursday_morning() {
        let slot = suggested_slot(SuggestionKind::TomorrowMorning, at(day(2024, 5, 15), 16));
        assert_eq!(slot.date, day(2024, 5, 16));
        assert_eq!((slot.hour, slot.minute), (9, 0));
        assert_eq!(slot.label, "Demain matin");
        assert_eq!(slot.time_label, "09:00");
    }

    #[test]
    fn friday_before_whit_monday_skips_to_tuesday() {
        let slot = suggested_slot(SuggestionKind::TomorrowAfternoon, at(day(2024, 5, 17), 10));
        assert_eq!(slot.date, day(2024, 5, 21));
        assert_eq!(slot.label, "Prochain jour ouvré 14h");
        assert_eq!(slot.time_label, "14:00");
    }

    #[test]
    fn month_end_tomorrow_is_still_tomorrow() {
        let slot = suggested_slot(SuggestionKind::TomorrowMorning, at(day(2024, 1, 31), 8));
        assert_eq!(slot.date, day(2024, 2, 1));
        assert_eq!(slot.label, "Demain matin");
    }

    #[test]
    fn monday_is_strictly_after_today() {
        let monday = day(2024, 6, 3);
        let slot = suggested_slot(SuggestionKind::MondayMorning, at(monday, 8));
        assert_eq!(slot.date, day(2024, 6, 10));
        let slot = suggested_slot(SuggestionKind::MondayMorning, at(day(2024, 5, 17), 8));
        assert_eq!(slot.date, day(2024, 5, 21));
        assert_eq!(slot.label, "Lundi matin");
    }

    #[test]
    fn every_suggestion_is_a_business_day() {
        let mut date = day(2024, 1, 1);
        while date.year() == 2024 {
            for kind in SuggestionKind::ALL {
                assert!(is_business_day(suggested_slot(kind, at(date, 12)).date));
            }
            date = date.succ_opt().unwrap();
        }
    }
}
