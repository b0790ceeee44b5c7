/// 為替レート機能モジュール
///
/// このモジュールは通貨換算に関連する機能を提供します：
/// - 為替レートAPIからのレートテーブル取得
/// - 報告通貨への金額換算（純粋関数）
// サブモジュールの宣言
pub mod converter;
pub mod models;
pub mod provider;

// 公開インターフェース

// モデル
pub use models::{ExchangeRateResponse, RateTable};

// プロバイダー（レート取得）
pub use provider::{HttpRateProvider, RateProvider};

// 換算エンジン
pub use converter::convert;
