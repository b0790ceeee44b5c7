/// 台帳機能モジュール
///
/// このモジュールは経費の集計・換算オーケストレーションを提供します：
/// - 日付フィルターの解決（選択肢 -> 具体的な日付範囲）
/// - ページングされた経費一覧の読み込みと合計計算
/// - 換算バックフィルとスナップショット配信
// サブモジュールの宣言
pub mod filter;
pub mod models;
pub mod service;

// 公開インターフェース

// フィルター
pub use filter::{resolve, DateFilter};

// 読み取りモデル
pub use models::{LedgerSnapshot, LoadState};

// オーケストレーター
pub use service::Ledger;
