use crate::shared::config::{get_database_filename, get_environment};
use crate::shared::errors::{AppError, AppResult};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// データベース接続を初期化し、テーブルを作成する
///
/// # 引数
/// * `path` - データベースファイルのパス（Noneの場合はアプリデータディレクトリを使用）
///
/// # 戻り値
/// データベース接続、または失敗時はエラー
///
/// # 処理内容
/// 1. アプリケーションデータディレクトリの確保
/// 2. データベースファイルパスの決定
/// 3. データベース接続の開設
/// 4. テーブルとインデックスの作成
pub fn initialize_database(path: Option<&Path>) -> AppResult<Connection> {
    // データベースファイルパスを取得
    let database_path = match path {
        Some(p) => p.to_path_buf(),
        None => get_database_path()?,
    };

    // データベース接続を開く
    let conn = Connection::open(&database_path)?;

    // テーブルを作成
    create_tables(&conn)?;

    log::info!("データベースを初期化しました: {:?}", database_path);

    Ok(conn)
}

/// アプリデータディレクトリ内のデータベースファイルパスを取得する
///
/// # 戻り値
/// データベースファイルのパス、または失敗時はエラー
pub fn get_database_path() -> AppResult<PathBuf> {
    // アプリケーションデータディレクトリを取得
    let app_data_dir = dirs::data_dir()
        .ok_or_else(|| {
            AppError::configuration("アプリデータディレクトリの取得に失敗しました".to_string())
        })?
        .join("keihi-ledger");

    // ディレクトリが存在しない場合は作成
    if !app_data_dir.exists() {
        std::fs::create_dir_all(&app_data_dir).map_err(|e| {
            AppError::configuration(format!("アプリデータディレクトリの作成に失敗: {e}"))
        })?;
        log::info!(
            "アプリケーションデータディレクトリを作成: {:?}",
            app_data_dir
        );
    }

    // 環境に応じたデータベースファイル名を決定
    let db_filename = get_database_filename(get_environment());
    let database_path = app_data_dir.join(db_filename);

    Ok(database_path)
}

/// データベーステーブルを作成する
///
/// # 引数
/// * `conn` - データベース接続
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn create_tables(conn: &Connection) -> AppResult<()> {
    // 金額はrust_decimalの文字列表現をTEXTで保持する
    // dateはUTCのRFC3339（ミリ秒固定幅）なので文字列比較で時系列順になる
    conn.execute(
        "CREATE TABLE IF NOT EXISTS expenses (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            amount TEXT NOT NULL,
            currency TEXT NOT NULL,
            converted_amount TEXT,
            date TEXT NOT NULL,
            receipt_image BLOB,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // インデックスを作成
    create_indexes(conn)?;

    Ok(())
}

/// インデックスを作成する
fn create_indexes(conn: &Connection) -> AppResult<()> {
    // 日付降順の一覧取得と日付範囲フィルターの両方がこのインデックスを使う
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expenses_currency ON expenses(currency)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_create_tables() {
        let conn = Connection::open_in_memory().unwrap();

        // テーブル作成が成功することを確認
        let result = create_tables(&conn);
        assert!(result.is_ok());

        // expensesテーブルが作成されていることを確認
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='expenses'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "expensesテーブルが作成されていません");

        // 2回実行しても冪等であることを確認
        assert!(create_tables(&conn).is_ok());
    }

    #[test]
    fn test_initialize_database_with_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test_expenses.db");

        let conn = initialize_database(Some(&db_path)).unwrap();

        // ファイルが作成されていることを確認
        assert!(db_path.exists());

        // テーブルが使用可能であることを確認
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM expenses", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
