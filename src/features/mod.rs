/// 機能別モジュール
///
/// このモジュールはアプリケーションの各機能を提供します：
/// - expenses: 経費の永続化（モデル・ストア）
/// - rates: 為替レートの取得と通貨換算
/// - ledger: 集計・換算のオーケストレーション
pub mod expenses;
pub mod ledger;
pub mod rates;
