use crate::features::rates::models::{ExchangeRateResponse, RateTable};
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;

/// 為替レート取得のインターフェース
///
/// 呼び出し側のタスクをブロックせずにレートテーブルを取得する。
/// 失敗はネットワーク・デコード・サーバーステータスのいずれかに分類される。
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// 指定した基準通貨のレートテーブルを取得する
    ///
    /// # 引数
    /// * `base_currency` - 基準通貨コード（報告通貨）
    ///
    /// # 戻り値
    /// レートテーブル、または失敗時はエラー
    async fn fetch_rates(&self, base_currency: &str) -> AppResult<RateTable>;
}

/// HTTP経由で為替レートを取得するプロバイダー
///
/// `{base_url}/{BASE}` へのGETで open.er-api.com v6互換のJSONを期待する。
#[derive(Clone)]
pub struct HttpRateProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRateProvider {
    /// プロバイダーを初期化する
    ///
    /// # 引数
    /// * `base_url` - 為替レートAPIのベースURL（末尾スラッシュなし）
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn fetch_rates(&self, base_currency: &str) -> AppResult<RateTable> {
        let url = format!("{}/{}", self.base_url, base_currency.to_uppercase());
        log::info!("為替レートを取得しています: {url}");

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            log::error!("為替レートAPIが異常ステータスを返しました: {status}");
            return Err(AppError::ServerStatus(format!(
                "HTTPステータス: {status}"
            )));
        }

        // reqwestのデコードエラーはFrom実装でDecodeに分類される
        let body: ExchangeRateResponse = response.json().await?;
        let table = body.into_rate_table()?;

        log::info!(
            "為替レートを取得しました: base={}, 通貨数={}",
            table.base_code,
            table.len()
        );

        Ok(table)
    }
}
