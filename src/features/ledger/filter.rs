use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// 経費一覧の日付フィルター選択肢
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFilter {
    /// 今月（月初から翌月初まで）
    ThisMonth,
    /// 直近7日間
    LastSevenDays,
    /// 全期間（フィルターなし）
    All,
}

impl Default for DateFilter {
    fn default() -> Self {
        DateFilter::ThisMonth
    }
}

/// フィルター選択肢を具体的な日付範囲に解決する
///
/// 隠れたグローバル時計には依存せず、`now` を明示的に受け取る。
///
/// # 引数
/// * `filter` - フィルター選択肢
/// * `now` - 現在時刻（UTC）
///
/// # 戻り値
/// (開始, 終了) の日付範囲。Allの場合はNone（フィルターなし）。
/// ストア側の範囲比較は開始・終了とも含むため、ThisMonthの終了は
/// 翌月の最初の瞬間を指す（その瞬間ちょうどの経費は実質発生しない）。
pub fn resolve(filter: DateFilter, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    match filter {
        DateFilter::ThisMonth => {
            let start = start_of_month(now);
            let end = start_of_next_month(now);
            Some((start, end))
        }
        DateFilter::LastSevenDays => Some((now - Duration::days(7), now)),
        DateFilter::All => None,
    }
}

/// `now` を含む月の最初の瞬間を取得する
fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// `now` の翌月の最初の瞬間を取得する
fn start_of_next_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };

    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_this_month_contains_now_and_excludes_previous_month() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
        let (start, end) = resolve(DateFilter::ThisMonth, now).unwrap();

        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());

        // nowを含む
        assert!(start <= now && now <= end);

        // 前月の任意の時刻は範囲外
        let in_february = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        assert!(in_february < start);
    }

    #[test]
    fn test_this_month_december_rolls_over_to_next_year() {
        let now = Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap();
        let (start, end) = resolve(DateFilter::ThisMonth, now).unwrap();

        assert_eq!(start, Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[quickcheck]
    fn prop_last_seven_days_width_is_exactly_seven_days(offset_hours: u32) -> bool {
        // 任意の時刻で、直近7日間の範囲幅はちょうど7日
        let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let now = base + Duration::hours(i64::from(offset_hours % (24 * 365 * 10)));

        match resolve(DateFilter::LastSevenDays, now) {
            Some((start, end)) => end - start == Duration::days(7) && end == now,
            None => false,
        }
    }

    #[test]
    fn test_all_resolves_to_no_range() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(resolve(DateFilter::All, now), None);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let now = Utc.with_ymd_and_hms(2024, 7, 20, 8, 0, 0).unwrap();
        assert_eq!(
            resolve(DateFilter::ThisMonth, now),
            resolve(DateFilter::ThisMonth, now)
        );
        assert_eq!(
            resolve(DateFilter::LastSevenDays, now),
            resolve(DateFilter::LastSevenDays, now)
        );
    }
}
