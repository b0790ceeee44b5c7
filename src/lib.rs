/// 経費台帳エンジン
///
/// 経費の永続化・為替レート取得・報告通貨への換算・ページングされた
/// 集計を行うライブラリ。UI層はLedgerを構築し、スナップショットの
/// 購読と公開操作（読み込み・追加・削除・フィルター・レート更新）で
/// やり取りする。
pub mod features;
pub mod shared;

use std::sync::Arc;

pub use features::expenses::{CreateExpenseDto, Expense, ExpenseStore, SqliteExpenseStore};
pub use features::ledger::{DateFilter, Ledger, LedgerSnapshot, LoadState};
pub use features::rates::{HttpRateProvider, RateProvider, RateTable};
pub use shared::{AppConfig, AppError, AppResult};

/// アプリケーション標準の構成で台帳を初期化する
///
/// # 処理内容
/// 1. 環境変数ファイルの読み込み
/// 2. ログシステムの初期化
/// 3. 設定の読み込みと検証
/// 4. データベースの初期化（アプリケーションデータディレクトリ）
/// 5. ストア・レートプロバイダーを組み立てた台帳の構築
///
/// # 戻り値
/// 構築済みの台帳、または初期化失敗時はエラー
///
/// ストアやプロバイダーを差し替えたい場合はこの関数を使わず、
/// `Ledger::new` に直接注入する。
pub fn initialize_ledger() -> AppResult<Ledger> {
    shared::load_environment_variables();
    shared::initialize_logging_system();

    let config = AppConfig::from_env();
    config.validate().map_err(AppError::configuration)?;

    let conn = shared::initialize_database(None)?;
    let store: Arc<dyn ExpenseStore> = Arc::new(SqliteExpenseStore::new(conn));
    let rate_provider: Arc<dyn RateProvider> =
        Arc::new(HttpRateProvider::new(config.rate_api_base_url.clone()));

    log::info!(
        "台帳を初期化しました: reporting_currency={}, page_size={}",
        config.reporting_currency,
        config.page_size
    );

    Ok(Ledger::new(store, rate_provider, &config))
}
