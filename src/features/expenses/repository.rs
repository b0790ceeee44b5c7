use crate::features::expenses::models::Expense;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Asia::Tokyo;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Mutex;

/// 経費の永続化層インターフェース
///
/// 台帳（Ledger）が依存する記録系の契約。一覧は常に日付降順で、
/// ページは0始まり、最終ページのみpage_size未満の件数を返す。
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// 経費を保存する
    async fn insert(&self, expense: &Expense) -> AppResult<()>;

    /// 既存の経費を更新する（該当IDがない場合はNotFound）
    async fn update(&self, expense: &Expense) -> AppResult<()>;

    /// 経費を削除する（該当IDがない場合はNotFound）
    async fn delete(&self, id: &str) -> AppResult<()>;

    /// 経費一覧を取得する（日付範囲フィルターとページング可能）
    ///
    /// # 引数
    /// * `range` - 日付範囲（開始・終了とも含む）。Noneの場合は全期間
    /// * `page` - 0始まりのページ番号
    /// * `page_size` - 1ページあたりの件数
    async fn query(
        &self,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        page: u32,
        page_size: u32,
    ) -> AppResult<Vec<Expense>>;

    /// 日付範囲に該当する経費の件数を取得する
    async fn count(&self, range: Option<(DateTime<Utc>, DateTime<Utc>)>) -> AppResult<i64>;
}

/// 日付をデータベース保存用の文字列に変換する
///
/// UTCのRFC3339・ミリ秒固定幅（例: 2024-01-15T09:30:00.000Z）。
/// 固定幅のため文字列比較がそのまま時系列比較になる。
pub(crate) fn encode_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// データベース保存用の文字列から日付を復元する
pub(crate) fn decode_date(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| AppError::Database(format!("日付カラムの解析に失敗しました: {e}")))
}

/// 監査用タイムスタンプ（JST）を取得する
pub(crate) fn jst_timestamp() -> String {
    Utc::now().with_timezone(&Tokyo).to_rfc3339()
}

/// データベースの行から読み出した未変換の値
struct ExpenseRow {
    id: String,
    title: String,
    amount: String,
    currency: String,
    converted_amount: Option<String>,
    date: String,
    receipt_image: Option<Vec<u8>>,
    created_at: String,
    updated_at: String,
}

impl ExpenseRow {
    const COLUMNS: &'static str =
        "id, title, amount, currency, converted_amount, date, receipt_image, created_at, updated_at";

    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            amount: row.get(2)?,
            currency: row.get(3)?,
            converted_amount: row.get(4)?,
            date: row.get(5)?,
            receipt_image: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    /// 文字列カラムをドメイン型に変換する
    fn into_expense(self) -> AppResult<Expense> {
        let amount = Decimal::from_str(&self.amount)
            .map_err(|e| AppError::Database(format!("金額カラムの解析に失敗しました: {e}")))?;

        let converted_amount = match self.converted_amount {
            Some(raw) => Some(Decimal::from_str(&raw).map_err(|e| {
                AppError::Database(format!("換算金額カラムの解析に失敗しました: {e}"))
            })?),
            None => None,
        };

        Ok(Expense {
            id: self.id,
            title: self.title,
            amount,
            currency: self.currency,
            converted_amount,
            date: decode_date(&self.date)?,
            receipt_image: self.receipt_image,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SQLiteベースの経費ストア
pub struct SqliteExpenseStore {
    conn: Mutex<Connection>,
}

impl SqliteExpenseStore {
    /// ストアを初期化する
    ///
    /// # 引数
    /// * `conn` - テーブル作成済みのデータベース接続
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// データベース接続のロックを取得する
    fn lock_conn(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AppError::concurrency(format!("データベースロック取得失敗: {e}")))
    }

    /// IDで経費を取得する
    ///
    /// # 引数
    /// * `id` - 経費ID
    ///
    /// # 戻り値
    /// 経費、または失敗時はエラー
    pub fn find_by_id(&self, id: &str) -> AppResult<Expense> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM expenses WHERE id = ?1",
                    ExpenseRow::COLUMNS
                ),
                params![id],
                ExpenseRow::from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => AppError::not_found("経費"),
                _ => AppError::from(e),
            })?;

        row.into_expense()
    }
}

#[async_trait]
impl ExpenseStore for SqliteExpenseStore {
    async fn insert(&self, expense: &Expense) -> AppResult<()> {
        let conn = self.lock_conn()?;

        conn.execute(
            "INSERT INTO expenses (id, title, amount, currency, converted_amount, date, receipt_image, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                expense.id,
                expense.title,
                expense.amount.to_string(),
                expense.currency,
                expense.converted_amount.map(|d| d.to_string()),
                encode_date(&expense.date),
                expense.receipt_image,
                expense.created_at,
                expense.updated_at,
            ],
        )?;

        Ok(())
    }

    async fn update(&self, expense: &Expense) -> AppResult<()> {
        let now = jst_timestamp();
        let conn = self.lock_conn()?;

        let affected_rows = conn.execute(
            "UPDATE expenses
             SET title = ?1, amount = ?2, currency = ?3, converted_amount = ?4,
                 date = ?5, receipt_image = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                expense.title,
                expense.amount.to_string(),
                expense.currency,
                expense.converted_amount.map(|d| d.to_string()),
                encode_date(&expense.date),
                expense.receipt_image,
                now,
                expense.id,
            ],
        )?;

        if affected_rows == 0 {
            return Err(AppError::not_found("経費"));
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let conn = self.lock_conn()?;
        let affected_rows = conn.execute("DELETE FROM expenses WHERE id = ?1", params![id])?;

        if affected_rows == 0 {
            return Err(AppError::not_found("経費"));
        }

        Ok(())
    }

    async fn query(
        &self,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        page: u32,
        page_size: u32,
    ) -> AppResult<Vec<Expense>> {
        let mut query = format!("SELECT {} FROM expenses WHERE 1=1", ExpenseRow::COLUMNS);
        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        // 日付範囲フィルター（開始・終了とも含む）
        if let Some((start, end)) = &range {
            query.push_str(" AND date >= ? AND date <= ?");
            sql_params.push(Box::new(encode_date(start)));
            sql_params.push(Box::new(encode_date(end)));
        }

        query.push_str(" ORDER BY date DESC LIMIT ? OFFSET ?");
        sql_params.push(Box::new(i64::from(page_size)));
        sql_params.push(Box::new(i64::from(page) * i64::from(page_size)));

        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&query)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = sql_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt.query_map(param_refs.as_slice(), ExpenseRow::from_row)?;
        let raw_rows = rows.collect::<Result<Vec<_>, _>>()?;

        raw_rows.into_iter().map(ExpenseRow::into_expense).collect()
    }

    async fn count(&self, range: Option<(DateTime<Utc>, DateTime<Utc>)>) -> AppResult<i64> {
        let mut query = String::from("SELECT COUNT(*) FROM expenses WHERE 1=1");
        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some((start, end)) = &range {
            query.push_str(" AND date >= ? AND date <= ?");
            sql_params.push(Box::new(encode_date(start)));
            sql_params.push(Box::new(encode_date(end)));
        }

        let conn = self.lock_conn()?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = sql_params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn.query_row(&query, param_refs.as_slice(), |row| row.get(0))?;

        Ok(count)
    }
}
