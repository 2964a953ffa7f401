//! 타임스탬프 해석 공용 함수
//!
//! - ISO 8601 / RFC 3339: 오프셋이 있으면 그대로, 없으면 UTC로 간주
//! - 레거시 `Mon D HH:MM:SS`: 연도가 없으므로 호출자가 넘긴 연도를 사용

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// 현재 연도 (UTC 기준)
pub fn current_year() -> i32 {
    Utc::now().year()
}

/// ISO 8601 타임스탬프를 해석합니다.
///
/// 소수 초는 선택이며, 오프셋이 없으면 UTC로 해석합니다.
pub fn parse_iso8601(token: &str) -> Result<DateTime<FixedOffset>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Ok(dt);
    }

    NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|e| format!("invalid ISO 8601 timestamp: {e}"))
}

/// 레거시 syslog 타임스탬프(`Jan  5 12:00:00`)를 주어진 연도로 해석합니다.
///
/// 일(day)의 공백 패딩 폭은 상관없습니다. 결과는 UTC입니다.
pub fn parse_legacy(token: &str, year: i32) -> Result<DateTime<FixedOffset>, String> {
    let mut parts = token.split_whitespace();
    let (Some(month), Some(day), Some(time), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err("expected 'Mon D HH:MM:SS'".to_owned());
    };

    let month = MONTHS
        .iter()
        .position(|m| *m == month)
        .map(|idx| idx as u32 + 1)
        .ok_or_else(|| format!("unknown month '{month}'"))?;

    let day: u32 = day.parse().map_err(|_| format!("invalid day '{day}'"))?;

    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| format!("no such date: {year}-{month:02}-{day:02}"))?;

    let time = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .map_err(|e| format!("invalid time '{time}': {e}"))?;

    Ok(date.and_time(time).and_utc().fixed_offset())
}
