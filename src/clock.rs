use core::fmt;

pub trait Now {
    // The time elapsed since startup in microseconds
    fn now_micros(&self) -> u64;
}

impl<T: Now + ?Sized> Now for &T {
    fn now_micros(&self) -> u64 {
        T::now_micros(self)
    }
}

/// A real-time clock used to stamp successful measurements.
///
/// This is never used for pulse timing, only [`Now`] is.
pub trait WallClock {
    fn now(&mut self) -> DateTime;
}

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

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

/// A calendar date and time as kept by the RP2040 RTC.
///
/// Displays as `Wednesday 13 January 11:20:00 2020`, the layout the Pico SDK prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    pub year: u16,
    /// 1 is January.
    pub month: u8,
    pub day: u8,
    /// 0 is Sunday.
    pub day_of_week: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let weekday = WEEKDAYS
            .get(usize::from(self.day_of_week))
            .copied()
            .unwrap_or("?");
        let month = usize::from(self.month)
            .checked_sub(1)
            .and_then(|index| MONTHS.get(index))
            .copied()
            .unwrap_or("?");
        write!(
            f,
            "{} {} {} {}:{:02}:{:02} {}",
            weekday, self.day, month, self.hour, self.minute, self.second, self.year
        )
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::string::ToString;

    fn epoch() -> DateTime {
        DateTime {
            year: 2020,
            month: 1,
            day: 13,
            day_of_week: 3,
            hour: 11,
            minute: 20,
            second: 0,
        }
    }

    #[test]
    fn renders_like_the_pico_sdk() {
        assert_eq!(epoch().to_string(), "Wednesday 13 January 11:20:00 2020");
    }

    #[test]
    fn hour_is_not_padded_but_minutes_are() {
        let t = DateTime {
            hour: 7,
            minute: 5,
            second: 9,
            ..epoch()
        };
        assert_eq!(t.to_string(), "Wednesday 13 January 7:05:09 2020");
    }

    #[test]
    fn out_of_range_fields_do_not_panic() {
        let t = DateTime {
            month: 0,
            day_of_week: 9,
            ..epoch()
        };
        assert_eq!(t.to_string(), "? 13 ? 11:20:00 2020");
    }
}
