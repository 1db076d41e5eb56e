//! Loose date recognition for headers, markers and file names.

use std::sync::LazyLock;

use chrono::{Local, NaiveDate};
use regex::Regex;

static FULL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\s*[./-]\s*(\d{1,2})\s*[./-]\s*(\d{1,2})").unwrap());
static SHORT_DOTTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])(\d{2})\.(\d{2})\.(\d{2})(?:$|[^0-9])").unwrap());
static COMPACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])(\d{2})(\d{2})(\d{2})(?:$|[^0-9])").unwrap());

fn ymd(y: &str, m: &str, d: &str, century: i32) -> Option<NaiveDate> {
    let year = y.parse::<i32>().ok()? + century;
    NaiveDate::from_ymd_opt(year, m.parse().ok()?, d.parse().ok()?)
}

/// First date found in `text`, trying four-digit years before two-digit ones.
pub fn find_date(text: &str) -> Option<NaiveDate> {
    let full = FULL_DATE
        .captures_iter(text)
        .find_map(|c| ymd(&c[1], &c[2], &c[3], 0));
    if full.is_some() {
        return full;
    }
    for re in [&*SHORT_DOTTED, &*COMPACT] {
        if let Some(d) = re.captures_iter(text).find_map(|c| ymd(&c[1], &c[2], &c[3], 2000)) {
            return Some(d);
        }
    }
    None
}

/// Strict `yyyy.mm.dd` as written into markers.
pub fn parse_dotted(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y.%m.%d").ok()
}

pub fn format_dotted(date: NaiveDate) -> String {
    date.format("%Y.%m.%d").to_string()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// `YYMMDD` token used in daily log file names.
pub fn today_token() -> String {
    Local::now().format("%y%m%d").to_string()
}
