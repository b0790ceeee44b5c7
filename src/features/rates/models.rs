use crate::shared::errors::{AppError, AppResult};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

/// ある時点の為替レートのスナップショット
///
/// 基準通貨（報告通貨）1単位に対する各通貨の数量を保持する。
/// 取得成功のたびに全体が置き換えられ、部分的なマージは行わない。
/// メモリ上にのみ保持され、再起動後は再取得が必要。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    /// 基準通貨コード
    pub base_code: String,
    rates: HashMap<String, Decimal>,
}

impl RateTable {
    /// レートテーブルを作成する
    pub fn new(base_code: String, rates: HashMap<String, Decimal>) -> Self {
        Self { base_code, rates }
    }

    /// 指定通貨のレートを取得する
    ///
    /// # 引数
    /// * `currency` - 通貨コード（大文字小文字は区別しない）
    ///
    /// # 戻り値
    /// 基準通貨1単位あたりの指定通貨の数量、未収録の場合はNone
    pub fn get(&self, currency: &str) -> Option<Decimal> {
        self.rates.get(&currency.to_uppercase()).copied()
    }

    /// テーブルが空かどうかを判定する
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// 収録されている通貨の数を取得する
    pub fn len(&self) -> usize {
        self.rates.len()
    }
}

/// 為替レートAPIのレスポンス
///
/// open.er-api.com v6互換の形式:
/// `{"result": "success", "base_code": "USD", "rates": {"EUR": 0.85, ...}}`
#[derive(Debug, Deserialize)]
pub struct ExchangeRateResponse {
    pub result: String,
    pub base_code: String,
    pub rates: HashMap<String, f64>,
}

impl ExchangeRateResponse {
    /// レスポンスをレートテーブルに変換する
    ///
    /// # 戻り値
    /// レートテーブル、resultがsuccess以外の場合はエラー
    ///
    /// # 変換規則
    /// - f64は2進展開のノイズを持ち込まないよう丸めて取り込む
    /// - 非有限値（NaN・無限大）はDecodeエラー
    /// - 0以下のレートは収録から除外（警告ログのみ）
    pub fn into_rate_table(self) -> AppResult<RateTable> {
        if self.result != "success" {
            return Err(AppError::ServerStatus(format!(
                "APIのresultがsuccessではありません: {}",
                self.result
            )));
        }

        let mut rates = HashMap::with_capacity(self.rates.len());
        for (code, value) in self.rates {
            let decimal = Decimal::from_f64(value).ok_or_else(|| {
                AppError::Decode(format!("レート値を10進数に変換できません: {code}={value}"))
            })?;

            if decimal <= Decimal::ZERO {
                log::warn!("0以下のレートを無視します: {code}={value}");
                continue;
            }

            rates.insert(code.to_uppercase(), decimal);
        }

        Ok(RateTable::new(self.base_code, rates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_into_rate_table_success() {
        let json = r#"{
            "result": "success",
            "base_code": "USD",
            "rates": {"USD": 1.0, "EUR": 0.85, "JPY": 110.0}
        }"#;

        let response: ExchangeRateResponse = serde_json::from_str(json).unwrap();
        let table = response.into_rate_table().unwrap();

        assert_eq!(table.base_code, "USD");
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("EUR"), Some(dec!(0.85)));
        // 大文字小文字を区別しない参照
        assert_eq!(table.get("jpy"), Some(dec!(110.0)));
        assert_eq!(table.get("GBP"), None);
    }

    #[test]
    fn test_into_rate_table_rejects_non_success_result() {
        let response = ExchangeRateResponse {
            result: "error".to_string(),
            base_code: "USD".to_string(),
            rates: HashMap::new(),
        };

        let result = response.into_rate_table();
        assert!(matches!(
            result.unwrap_err(),
            crate::shared::errors::AppError::ServerStatus(_)
        ));
    }

    #[test]
    fn test_into_rate_table_skips_non_positive_rates() {
        let mut rates = HashMap::new();
        rates.insert("EUR".to_string(), 0.85);
        rates.insert("BAD".to_string(), 0.0);
        rates.insert("NEG".to_string(), -1.5);

        let response = ExchangeRateResponse {
            result: "success".to_string(),
            base_code: "USD".to_string(),
            rates,
        };

        let table = response.into_rate_table().unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.get("BAD").is_none());
        assert!(table.get("NEG").is_none());
    }

    #[test]
    fn test_into_rate_table_rounds_float_noise() {
        // 0.85はf64では正確に表せないが、取り込み後は正確な10進値になること
        let mut rates = HashMap::new();
        rates.insert("EUR".to_string(), 0.85_f64);

        let response = ExchangeRateResponse {
            result: "success".to_string(),
            base_code: "USD".to_string(),
            rates,
        };

        let table = response.into_rate_table().unwrap();
        assert_eq!(table.get("EUR"), Some(dec!(0.85)));
        assert_eq!(dec!(50) / table.get("EUR").unwrap(), dec!(50) / dec!(0.85));
    }

    #[test]
    fn test_empty_table() {
        let table = RateTable::default();
        assert!(table.is_empty());
        assert_eq!(table.get("USD"), None);
    }
}
