use crate::features::rates::models::RateTable;
use crate::shared::errors::{AppError, AppResult};
use rust_decimal::Decimal;

/// 金額を報告通貨に換算する
///
/// # 換算規約
/// レートテーブルは報告通貨を基準（base）として取得されており、
/// `rates[X]` は「報告通貨1単位あたりのX通貨の数量」を表す。
/// したがって X から報告通貨への換算は除算になる:
/// `converted = amount / rates[X]`
///
/// # 引数
/// * `amount` - 発生通貨での金額
/// * `source_currency` - 発生通貨コード
/// * `rates` - 現在のレートテーブル
/// * `reporting_currency` - 報告通貨コード
///
/// # 戻り値
/// 報告通貨での金額。発生通貨が報告通貨と同じ場合は丸めなしで金額そのまま。
/// テーブルに発生通貨がない場合はUnsupportedCurrencyエラー。
pub fn convert(
    amount: Decimal,
    source_currency: &str,
    rates: &RateTable,
    reporting_currency: &str,
) -> AppResult<Decimal> {
    // 同一通貨は丸めなしの恒等変換（空のテーブルでも成立する）
    if source_currency.eq_ignore_ascii_case(reporting_currency) {
        return Ok(amount);
    }

    let rate = rates
        .get(source_currency)
        .ok_or_else(|| AppError::unsupported_currency(source_currency.to_uppercase()))?;

    // テーブル構築時に0以下は除外されるが、除算前に再確認する
    if rate <= Decimal::ZERO {
        return Err(AppError::unsupported_currency(
            source_currency.to_uppercase(),
        ));
    }

    Ok(amount / rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn usd_table(pairs: &[(&str, Decimal)]) -> RateTable {
        let rates: HashMap<String, Decimal> = pairs
            .iter()
            .map(|(code, rate)| (code.to_string(), *rate))
            .collect();
        RateTable::new("USD".to_string(), rates)
    }

    #[quickcheck]
    fn prop_same_currency_is_identity(cents: i64) -> bool {
        // 恒等則: 任意の金額で、同一通貨の換算は金額そのまま
        let amount = Decimal::from(cents) / dec!(100);
        let table = usd_table(&[("EUR", dec!(0.85))]);

        convert(amount, "USD", &table, "USD").unwrap() == amount
    }

    #[test]
    fn test_reporting_currency_with_empty_table() {
        // 空のテーブルでも報告通貨同士の換算は成功する
        let table = RateTable::default();
        assert_eq!(convert(dec!(100), "USD", &table, "USD").unwrap(), dec!(100));
    }

    #[test]
    fn test_convert_divides_by_rate_entry() {
        // 規約の固定: rates[EUR]=0.85（USD1単位あたり0.85EUR）のとき
        // 50 EUR -> 50 / 0.85 USD
        let table = usd_table(&[("EUR", dec!(0.85))]);
        let converted = convert(dec!(50), "EUR", &table, "USD").unwrap();
        assert_eq!(converted, dec!(50) / dec!(0.85));
    }

    #[test]
    fn test_convert_is_case_insensitive() {
        let table = usd_table(&[("JPY", dec!(110))]);
        let converted = convert(dec!(1100), "jpy", &table, "usd").unwrap();
        assert_eq!(converted, dec!(10));
    }

    #[test]
    fn test_unsupported_currency() {
        let table = usd_table(&[("EUR", dec!(0.85))]);
        let result = convert(dec!(10), "GBP", &table, "USD");
        assert!(matches!(
            result.unwrap_err(),
            AppError::UnsupportedCurrency(_)
        ));
    }

    #[test]
    fn test_deterministic_for_fixed_inputs() {
        let table = usd_table(&[("CAD", dec!(1.25))]);
        let a = convert(dec!(10), "CAD", &table, "USD").unwrap();
        let b = convert(dec!(10), "CAD", &table, "USD").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, dec!(8));
    }
}
