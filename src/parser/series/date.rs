use chrono::NaiveDate;

use crate::error::ExtractError;

/// Decode a JavaScript `new Date(year, month, day)` triple, where `month` is
/// zero-based.
pub fn decode_date(year: i64, month: i64, day: i64) -> Result<NaiveDate, ExtractError> {
    let invalid = || ExtractError::DateRange { year, month, day };

    let y = i32::try_from(year).map_err(|_| invalid())?;
    let m = month
        .checked_add(1)
        .and_then(|m| u32::try_from(m).ok())
        .ok_or_else(invalid)?;
    let d = u32::try_from(day).map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(y, m, d).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn month_is_shifted_by_one() {
        for month0 in 0..12 {
            let date = decode_date(2021, month0, 28).unwrap();
            assert_eq!(date.month() as i64, month0 + 1);
            assert_eq!(date.year(), 2021);
            assert_eq!(date.day(), 28);
        }
    }

    #[test]
    fn december_and_january() {
        assert_eq!(decode_date(2022, 11, 1).unwrap(), NaiveDate::from_ymd_opt(2022, 12, 1).unwrap());
        assert_eq!(decode_date(2023, 0, 15).unwrap(), NaiveDate::from_ymd_opt(2023, 1, 15).unwrap());
    }

    #[test]
    fn out_of_range_components() {
        assert_eq!(
            decode_date(2023, 12, 1),
            Err(ExtractError::DateRange { year: 2023, month: 12, day: 1 })
        );
        assert!(decode_date(2023, -2, 1).is_err());
        assert!(decode_date(2023, 1, 30).is_err());
        assert!(decode_date(2023, 0, 0).is_err());
        assert!(decode_date(i64::MAX, 0, 1).is_err());
    }

    #[test]
    fn leap_day() {
        assert!(decode_date(2024, 1, 29).is_ok());
        assert!(decode_date(2023, 1, 29).is_err());
    }
}
