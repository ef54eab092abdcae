use chrono::{Datelike, NaiveDate};
use std::{fmt, str::FromStr};

/// Calendar that stored `month`/`day` values are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calendar {
    Persian,
    Gregorian,
}

impl Calendar {
    /// Returns the `(month, day)` of a Gregorian date in this calendar, or `None`
    /// when the date falls outside the range the calendar can convert.
    pub fn month_day(&self, date: NaiveDate) -> Option<(i32, i32)> {
        match self {
            Calendar::Persian => to_persian(date).map(|(_, month, day)| (month, day)),
            Calendar::Gregorian => Some((date.month() as i32, date.day() as i32)),
        }
    }
}

impl FromStr for Calendar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "persian" | "jalali" | "solar-hijri" => Ok(Calendar::Persian),
            "gregorian" => Ok(Calendar::Gregorian),
            other => Err(format!("unknown calendar '{}'", other)),
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calendar::Persian => write!(f, "persian"),
            Calendar::Gregorian => write!(f, "gregorian"),
        }
    }
}

// Jalali years in which the 33-year leap cycle shifts.
const BREAKS: [i32; 20] = [
    -61, 9, 38, 199, 426, 686, 756, 818, 1111, 1181, 1210, 1635, 2060, 2097, 2192, 2262, 2324,
    2394, 2456, 3178,
];

struct YearInfo {
    // Years since the last leap year, 0 meaning `jy` itself is leap.
    leap: i32,
    // Day of March (Gregorian year jy + 621) on which Farvardin 1 falls.
    march: u32,
}

fn year_info(jy: i32) -> YearInfo {
    let gy = jy + 621;
    let mut leap_j = -14;
    let mut jp = BREAKS[0];
    let mut jump = 0;

    for &jm in &BREAKS[1..] {
        jump = jm - jp;
        if jy < jm {
            break;
        }
        leap_j += jump / 33 * 8 + (jump % 33) / 4;
        jp = jm;
    }

    let mut n = jy - jp;
    leap_j += n / 33 * 8 + (n % 33 + 3) / 4;
    if jump % 33 == 4 && jump - n == 4 {
        leap_j += 1;
    }

    let leap_g = gy / 4 - (gy / 100 + 1) * 3 / 4 - 150;
    let march = 20 + leap_j - leap_g;

    if jump - n < 6 {
        n = n - jump + (jump + 4) / 33 * 33;
    }
    let mut leap = ((n + 1) % 33 - 1) % 4;
    if leap == -1 {
        leap = 4;
    }

    YearInfo {
        leap,
        march: march as u32,
    }
}

/// Converts a Gregorian date to a Solar Hijri `(year, month, day)` triple.
///
/// Returns `None` for Gregorian years the leap-cycle break table does not cover.
pub fn to_persian(date: NaiveDate) -> Option<(i32, i32, i32)> {
    let gy = date.year();
    let mut jy = gy - 621;
    if jy <= BREAKS[0] || jy >= BREAKS[BREAKS.len() - 1] {
        return None;
    }
    let info = year_info(jy);

    let nowruz = NaiveDate::from_ymd_opt(gy, 3, info.march)?;
    let mut k = (date - nowruz).num_days() as i32;

    if k >= 0 {
        if k <= 185 {
            return Some((jy, 1 + k / 31, k % 31 + 1));
        }
        k -= 186;
    } else {
        jy -= 1;
        k += 179;
        if info.leap == 1 {
            k += 1;
        }
    }

    Some((jy, 7 + k / 30, k % 30 + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_nowruz() {
        assert_eq!(to_persian(date(2023, 3, 21)), Some((1402, 1, 1)));
        assert_eq!(to_persian(date(2024, 3, 20)), Some((1403, 1, 1)));
        assert_eq!(to_persian(date(2025, 3, 21)), Some((1404, 1, 1)));
    }

    #[test]
    fn test_end_of_year() {
        assert_eq!(to_persian(date(2024, 3, 19)), Some((1402, 12, 29)));
        // 1403 is a leap year, so Esfand has 30 days.
        assert_eq!(to_persian(date(2025, 3, 20)), Some((1403, 12, 30)));
    }

    #[test]
    fn test_month_lengths_change_at_mehr() {
        assert_eq!(to_persian(date(2024, 9, 21)), Some((1403, 6, 31)));
        assert_eq!(to_persian(date(2024, 9, 22)), Some((1403, 7, 1)));
        assert_eq!(to_persian(date(2024, 10, 21)), Some((1403, 7, 30)));
        assert_eq!(to_persian(date(2024, 10, 22)), Some((1403, 8, 1)));
    }

    #[test]
    fn test_across_gregorian_new_year() {
        assert_eq!(to_persian(date(2025, 1, 1)), Some((1403, 10, 12)));
    }

    #[test]
    fn test_month_day_per_calendar() {
        let d = date(2024, 9, 28);
        assert_eq!(Calendar::Persian.month_day(d), Some((7, 7)));
        assert_eq!(Calendar::Gregorian.month_day(d), Some((9, 28)));
    }

    #[test]
    fn test_out_of_range_years() {
        assert_eq!(to_persian(date(3900, 1, 1)), None);
        assert_eq!(to_persian(date(500, 6, 1)), None);
        assert_eq!(Calendar::Persian.month_day(date(3900, 1, 1)), None);
        assert_eq!(Calendar::Gregorian.month_day(date(3900, 1, 1)), Some((1, 1)));
    }

    #[test]
    fn test_parse_calendar() {
        assert_eq!("Persian".parse::<Calendar>().unwrap(), Calendar::Persian);
        assert_eq!("gregorian".parse::<Calendar>().unwrap(), Calendar::Gregorian);
        assert!("lunar".parse::<Calendar>().is_err());
    }
}
