use crate::features::expenses::models::Expense;
use crate::features::ledger::filter::DateFilter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 台帳の読み込み状態
///
/// Errorは終端ではなく、次の操作の開始時に通常どおり遷移する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    /// 待機中
    Idle,
    /// 読み込み中（この間の loadPage / loadNextPage は無視される）
    Loading,
    /// 直近の操作が失敗（error_messageに内容を保持）
    Error,
}

/// 台帳の公開読み取りモデル
///
/// 台帳の内部状態から作られる不変のスナップショット。
/// UI層はwatchチャンネル経由でこれを購読する。
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSnapshot {
    /// 現在読み込まれている経費（日付降順）
    pub expenses: Vec<Expense>,
    /// 有効な日付フィルター
    pub filter: DateFilter,
    /// 現在のページ番号（0始まり）
    pub page: u32,
    /// 次のページが存在する可能性があるか
    pub has_more_pages: bool,
    /// 有効なフィルターに該当する総件数
    pub total_count: i64,
    /// 生の金額合計（通貨が混在するため参考値）
    pub total_amount: Decimal,
    /// 換算後の金額合計（未換算の経費は額面で算入される）
    pub total_converted_amount: Decimal,
    /// 読み込み状態
    pub load_state: LoadState,
    /// ユーザー向けのエラーメッセージ（直近の失敗時のみ）
    pub error_message: Option<String>,
}

impl Default for LedgerSnapshot {
    fn default() -> Self {
        Self {
            expenses: Vec::new(),
            filter: DateFilter::default(),
            page: 0,
            has_more_pages: true,
            total_count: 0,
            total_amount: Decimal::ZERO,
            total_converted_amount: Decimal::ZERO,
            load_state: LoadState::Idle,
            error_message: None,
        }
    }
}
