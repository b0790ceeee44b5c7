use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 経費データモデル
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Expense {
    /// 経費ID（UUID v4、作成時に採番され以後不変）
    pub id: String,
    /// 件名
    pub title: String,
    /// 発生通貨での金額
    pub amount: Decimal,
    /// 発生通貨コード（3〜4文字の大文字英字）
    pub currency: String,
    /// 報告通貨に換算した金額（換算成功まではNone。
    /// 一度換算された値はレート更新では再計算されない）
    pub converted_amount: Option<Decimal>,
    /// 経費の発生日時（UTC）
    pub date: DateTime<Utc>,
    /// 領収書画像（任意のバイナリ、コアでは中身を解釈しない）
    pub receipt_image: Option<Vec<u8>>,
    pub created_at: String,
    pub updated_at: String,
}

/// 経費作成用DTO
#[derive(Debug, Clone, Deserialize)]
pub struct CreateExpenseDto {
    pub title: String,
    pub amount: Decimal,
    pub currency: String,
    /// 発生日時（未指定の場合は作成時刻を使用）
    pub date: Option<DateTime<Utc>>,
    pub receipt_image: Option<Vec<u8>>,
}
