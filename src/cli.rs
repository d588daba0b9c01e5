use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Generate the train ticketing Excel report.
#[derive(Parser, Debug)]
#[command(name = "ticketing-report", version, about)]
pub struct Arguments {
    /// Inclusive start date (YYYY-MM-DD); defaults to the first day of the
    /// current month
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start_date: Option<String>,

    /// Inclusive end date (YYYY-MM-DD); defaults to today
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end_date: Option<String>,

    /// Path of the Excel file to write
    #[arg(long, default_value = "ticketing-report.xlsx")]
    pub output: PathBuf,
}

impl Arguments {
    /// # Errors
    ///
    /// Will return an error when `--start-date` is not a `YYYY-MM-DD`
    /// calendar date
    pub fn resolved_start_date(&self) -> Result<Date, anyhow::Error> {
        self.start_date.as_deref().map_or_else(
            || Ok(first_day_of_month(today())),
            |value| parse_iso_date(value, "--start-date"),
        )
    }

    /// # Errors
    ///
    /// Will return an error when `--end-date` is not a `YYYY-MM-DD` calendar
    /// date
    pub fn resolved_end_date(&self) -> Result<Date, anyhow::Error> {
        self.end_date
            .as_deref()
            .map_or_else(|| Ok(today()), |value| parse_iso_date(value, "--end-date"))
    }
}

/// Strictly parse a `YYYY-MM-DD` date; `flag` names the offending argument in
/// the error message.
///
/// # Errors
///
/// Will return an error when `value` is not a valid ISO calendar date
pub fn parse_iso_date(value: &str, flag: &str) -> Result<Date, anyhow::Error> {
    Date::parse(value, ISO_DATE)
        .map_err(|_| anyhow!("Invalid {flag}: {value}. Expected ISO format YYYY-MM-DD"))
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

fn first_day_of_month(date: Date) -> Date {
    date.replace_day(1).expect("every month has a first day")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use time::macros::date;

    use super::*;

    #[rstest]
    #[case("2024-03-15", date!(2024 - 03 - 15))]
    #[case("2024-01-01", date!(2024 - 01 - 01))]
    #[case("2024-12-31", date!(2024 - 12 - 31))]
    fn parse_iso_date_accepts_valid_dates(#[case] value: &str, #[case] expected: Date) {
        let parsed = parse_iso_date(value, "--start-date").expect("date should parse");

        assert_eq!(parsed, expected);
    }

    #[rstest]
    #[case("2024-3-15")]
    #[case("15-03-2024")]
    #[case("2024-02-30")]
    #[case("not-a-date")]
    #[case("2024-03-15T00:00:00")]
    fn parse_iso_date_rejects_malformed_input_with_the_flag_name(#[case] value: &str) {
        let error = parse_iso_date(value, "--end-date").expect_err("date should not parse");

        assert_eq!(
            error.to_string(),
            format!("Invalid --end-date: {value}. Expected ISO format YYYY-MM-DD")
        );
    }

    #[rstest]
    #[case(date!(2024 - 03 - 15), date!(2024 - 03 - 01))]
    #[case(date!(2024 - 02 - 29), date!(2024 - 02 - 01))]
    #[case(date!(2024 - 01 - 01), date!(2024 - 01 - 01))]
    fn first_day_of_month_truncates_the_day(#[case] date: Date, #[case] expected: Date) {
        assert_eq!(first_day_of_month(date), expected);
    }

    #[test]
    fn output_defaults_to_ticketing_report_file() {
        let arguments = Arguments::parse_from(["ticketing-report"]);

        assert_eq!(arguments.output, PathBuf::from("ticketing-report.xlsx"));
        assert!(arguments.start_date.is_none());
        assert!(arguments.end_date.is_none());
    }

    #[test]
    fn explicit_dates_override_the_defaults() {
        let arguments = Arguments::parse_from([
            "ticketing-report",
            "--start-date",
            "2024-03-01",
            "--end-date",
            "2024-03-31",
        ]);

        assert_eq!(
            arguments.resolved_start_date().unwrap(),
            date!(2024 - 03 - 01)
        );
        assert_eq!(
            arguments.resolved_end_date().unwrap(),
            date!(2024 - 03 - 31)
        );
    }
}
