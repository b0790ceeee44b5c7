/// 経費機能モジュール
///
/// このモジュールは経費レコードの永続化に関連する機能を提供します：
/// - 経費の保存、更新、削除
/// - 日付範囲フィルター付きのページング取得
/// - 件数の取得
// サブモジュールの宣言
pub mod models;
pub mod repository;

// 公開インターフェース：外部から使用可能な型と関数をエクスポート

// モデル
pub use models::{CreateExpenseDto, Expense};

// リポジトリ（データベース操作）
pub use repository::{ExpenseStore, SqliteExpenseStore};
