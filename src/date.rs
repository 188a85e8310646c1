use chrono::NaiveDate;
use regex::Captures;

fn valid(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn dotted(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Reformat a single date written as `YYYY<sep>MM<sep>DD` (separator one of
/// `-`, `/`, `.`, space, or none) into `DD.MM.YYYY`.
///
/// Dates already in `DD.MM.YYYY` form are returned normalised. Returns `None`
/// for anything else, including impossible calendar dates.
#[must_use]
pub fn reformat_date(input: &str) -> Option<String> {
    let input = input.trim();
    if let Some(caps) = regex!(r"^(\d{4})\s*[-/. ]?\s*(\d{1,2})\s*[-/. ]?\s*(\d{1,2})$").captures(input) {
        // Without separators only the fixed-width YYYYMMDD shape is unambiguous.
        let compact = !input.contains(|c: char| !c.is_ascii_digit());
        if compact && input.len() != 8 {
            return None;
        }
        return valid(&caps[1], &caps[2], &caps[3]).map(dotted);
    }
    if let Some(caps) = regex!(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").captures(input) {
        return valid(&caps[3], &caps[2], &caps[1]).map(dotted);
    }
    None
}

/// Rewrite every `YYYYMMDD`-shaped run of digits in `input` as `DD.MM.YYYY`.
/// Runs that are not real calendar dates are left untouched.
#[must_use]
pub fn reformat_compact_dates(input: &str) -> String {
    regex!(r"\b(\d{4})(\d{2})(\d{2})\b")
        .replace_all(input, |caps: &Captures<'_>| match valid(&caps[1], &caps[2], &caps[3]) {
            Some(date) => dotted(date),
            None => caps[0].to_owned(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_accepted() {
        for input in ["2013-10-30", "2013/10/30", "2013.10.30", "2013 10 30", "20131030"] {
            assert_eq!(reformat_date(input).as_deref(), Some("30.10.2013"), "input {input}");
        }
    }

    #[test]
    fn single_digit_month_and_day() {
        assert_eq!(reformat_date("2020-1-5").as_deref(), Some("05.01.2020"));
    }

    #[test]
    fn dotted_input_is_normalised() {
        assert_eq!(reformat_date("30.10.2013").as_deref(), Some("30.10.2013"));
        assert_eq!(reformat_date("1.2.2013").as_deref(), Some("01.02.2013"));
    }

    #[test]
    fn unrecognised_formats() {
        assert_eq!(reformat_date("yesterday"), None);
        assert_eq!(reformat_date("2013-13-40"), None);
        assert_eq!(reformat_date("2013105"), None);
    }

    #[test]
    fn compact_runs_inside_text() {
        assert_eq!(
            reformat_compact_dates("born 20131030 in Berlin"),
            "born 30.10.2013 in Berlin"
        );
        assert_eq!(reformat_compact_dates("20131399"), "20131399");
        assert_eq!(reformat_compact_dates("123456789"), "123456789");
    }
}
