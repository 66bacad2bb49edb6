//! 時刻の表示形式

use chrono::{Local, TimeZone};
use std::fmt::Display;

/// ctime(3) 形式（`Thu Jun 26 08:00:00 2018`）
const CTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";
/// ログエントリのタイムスタンプ形式
const LOG_TIME_FORMAT: &str = "%Y %b %d %H:%M:%S";

/// UNIX 時刻をローカル時刻の ctime 形式で表す
pub fn ctime(secs: i64) -> String {
    format_in(&Local, secs, CTIME_FORMAT)
}

/// UNIX 時刻をローカル時刻のログ形式で表す
pub fn log_time(secs: i64) -> String {
    format_in(&Local, secs, LOG_TIME_FORMAT)
}

/// 指定したタイムゾーンで UNIX 時刻を整形する
///
/// 表現できない時刻は秒数のまま返します。
pub fn format_in<Tz>(tz: &Tz, secs: i64, fmt: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match tz.timestamp_opt(secs, 0).single() {
        Some(time) => time.format(fmt).to_string(),
        None => secs.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_ctime_layout() {
        assert_eq!(format_in(&Utc, 0, CTIME_FORMAT), "Thu Jan  1 00:00:00 1970");
        assert_eq!(
            format_in(&Utc, 1_530_000_000, CTIME_FORMAT),
            "Tue Jun 26 08:00:00 2018"
        );
    }

    #[test]
    fn test_log_time_layout() {
        assert_eq!(
            format_in(&Utc, 1_530_000_000, LOG_TIME_FORMAT),
            "2018 Jun 26 08:00:00"
        );
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(format_in(&Utc, i64::MAX, CTIME_FORMAT), i64::MAX.to_string());
    }

    #[test]
    fn test_local_has_same_shape() {
        assert_eq!(ctime(1_530_000_000).len(), 24);
    }
}
