use crate::features::expenses::models::{CreateExpenseDto, Expense};
use crate::features::expenses::repository::{jst_timestamp, ExpenseStore};
use crate::features::ledger::filter::{self, DateFilter};
use crate::features::ledger::models::{LedgerSnapshot, LoadState};
use crate::features::rates::converter;
use crate::features::rates::models::RateTable;
use crate::features::rates::provider::RateProvider;
use crate::shared::config::AppConfig;
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

/// 通貨コードの形式（3〜4文字の英大文字）
static CURRENCY_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[A-Z]{3,4}$").expect("通貨コード正規表現が不正です"));

/// 台帳の内部状態
///
/// Ledgerのみが所有し、公開操作を通じてのみ変更される。
struct LedgerState {
    expenses: Vec<Expense>,
    filter: DateFilter,
    page: u32,
    has_more_pages: bool,
    total_count: i64,
    total_amount: Decimal,
    total_converted_amount: Decimal,
    load_state: LoadState,
    error_message: Option<String>,
    /// 現在のレートテーブル（取得成功のたびに全置換）
    rates: RateTable,
    /// 読み込み世代。refreshが進行中の読み込みを追い越すために加算する
    load_generation: u64,
    /// フィルター世代。デバウンスで最後の変更だけを有効にするために加算する
    filter_generation: u64,
}

impl LedgerState {
    fn new() -> Self {
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
            rates: RateTable::default(),
            load_generation: 0,
            filter_generation: 0,
        }
    }

    /// 読み込み済みの経費から合計を再計算する
    ///
    /// 生合計は通貨が混在するため参考値。換算合計は未換算の経費を
    /// 額面のまま算入する（換算成功まではこの近似が公式の合計となる）。
    fn recompute_totals(&mut self) {
        self.total_amount = self.expenses.iter().map(|e| e.amount).sum();
        self.total_converted_amount = self
            .expenses
            .iter()
            .map(|e| e.converted_amount.unwrap_or(e.amount))
            .sum();
    }

    fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            expenses: self.expenses.clone(),
            filter: self.filter,
            page: self.page,
            has_more_pages: self.has_more_pages,
            total_count: self.total_count,
            total_amount: self.total_amount,
            total_converted_amount: self.total_converted_amount,
            load_state: self.load_state,
            error_message: self.error_message.clone(),
        }
    }
}

/// 読み込み開始時に確定する読み込み計画
struct LoadTicket {
    generation: u64,
    page: u32,
    range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

/// 読み込みの起動方法
enum LoadMode {
    /// 現在のページを読み込む（Loading中は無視）
    CurrentPage,
    /// 次のページを読み込む（Loading中または次ページなしの場合は無視）
    NextPage,
    /// ページ0から読み直す（進行中の読み込みを追い越す）
    Refresh,
}

/// 経費台帳の集計・換算オーケストレーター
///
/// 読み込み済みの経費・有効なフィルター・合計・レートテーブルを所有し、
/// 公開読み取りモデル（LedgerSnapshot）をwatchチャンネルで配信する。
/// ストアとレートプロバイダーはコンストラクタで注入される。
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn ExpenseStore>,
    rate_provider: Arc<dyn RateProvider>,
    reporting_currency: String,
    page_size: u32,
    filter_debounce: Duration,
    state: Arc<Mutex<LedgerState>>,
    snapshot_tx: Arc<watch::Sender<LedgerSnapshot>>,
}

impl Ledger {
    /// 台帳を初期化する
    ///
    /// # 引数
    /// * `store` - 経費ストア
    /// * `rate_provider` - 為替レートプロバイダー
    /// * `config` - 台帳設定（報告通貨、ページサイズ、デバウンス時間）
    pub fn new(
        store: Arc<dyn ExpenseStore>,
        rate_provider: Arc<dyn RateProvider>,
        config: &AppConfig,
    ) -> Self {
        let (snapshot_tx, _snapshot_rx) = watch::channel(LedgerSnapshot::default());

        Self {
            store,
            rate_provider,
            reporting_currency: config.reporting_currency.to_uppercase(),
            page_size: config.page_size,
            filter_debounce: Duration::from_millis(config.filter_debounce_ms),
            state: Arc::new(Mutex::new(LedgerState::new())),
            snapshot_tx: Arc::new(snapshot_tx),
        }
    }

    /// 報告通貨コードを取得する
    pub fn reporting_currency(&self) -> &str {
        &self.reporting_currency
    }

    /// スナップショットの購読を開始する
    ///
    /// # 戻り値
    /// 状態変化のたびに最新のLedgerSnapshotを受け取るレシーバー
    pub fn subscribe(&self) -> watch::Receiver<LedgerSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// 現在のスナップショットを取得する
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// 現在のページを読み込む
    ///
    /// すでに読み込み中の場合は何もしない。成功時はページ0なら全置換、
    /// それ以外は追記し、合計の再計算と換算バックフィルを行う。
    /// 失敗時は直前の読み込み済み状態をそのまま保持する。
    pub async fn load_page(&self) -> AppResult<()> {
        self.execute_load(LoadMode::CurrentPage).await
    }

    /// ページ0から読み直す
    ///
    /// ページ番号を0に戻し、読み込み済みの経費を全置換する。
    /// 進行中の読み込みがあれば世代番号の更新によって追い越し、
    /// 追い越された側の結果は破棄される。
    pub async fn refresh(&self) -> AppResult<()> {
        self.execute_load(LoadMode::Refresh).await
    }

    /// 次のページを読み込む
    ///
    /// 次ページがない場合、または読み込み中の場合は何もしない。
    pub async fn load_next_page(&self) -> AppResult<()> {
        self.execute_load(LoadMode::NextPage).await
    }

    /// 日付フィルターを変更する
    ///
    /// フィルターは即座に切り替わるが、再読み込みはデバウンスされる：
    /// 短時間に連続した変更は最後の1回だけが実際のrefreshを起動する。
    /// 呼び出し側はブロックされず、完了はスナップショット購読で観測する。
    pub async fn set_filter(&self, new_filter: DateFilter) {
        let generation = {
            let mut state = self.state.lock().await;
            state.filter = new_filter;
            state.filter_generation += 1;
            self.publish(&state);
            state.filter_generation
        };

        let ledger = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ledger.filter_debounce).await;

            // より新しいフィルター変更に追い越されていたら何もしない
            let still_current = {
                let state = ledger.state.lock().await;
                state.filter_generation == generation
            };
            if !still_current {
                log::debug!("フィルター変更が追い越されたため再読み込みをスキップします");
                return;
            }

            if let Err(e) = ledger.refresh().await {
                log::error!(
                    "フィルター変更後の再読み込みに失敗しました: {}",
                    e.details()
                );
            }
        });
    }

    /// 経費を追加する
    ///
    /// バリデーション（件名・金額・通貨コード）はストアに触れる前に行う。
    /// 現在のレートテーブルで換算できる場合は作成時点で換算金額を設定する。
    /// 保存成功後は権威ある並び順を得るためページ0から読み直す。
    ///
    /// # 引数
    /// * `dto` - 経費作成用DTO
    ///
    /// # 戻り値
    /// 作成された経費、または失敗時はエラー
    pub async fn add_expense(&self, dto: CreateExpenseDto) -> AppResult<Expense> {
        let title = dto.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::validation("件名を入力してください"));
        }

        if dto.amount <= Decimal::ZERO {
            return Err(AppError::validation(
                "金額は0より大きい数値である必要があります",
            ));
        }

        let currency = dto.currency.trim().to_uppercase();
        if !CURRENCY_CODE.is_match(&currency) {
            return Err(AppError::validation(
                "通貨コードは3〜4文字の英字である必要があります",
            ));
        }

        // 現在のレートで換算できる場合はその値を、できない場合は
        // バックフィル対象としてNoneを設定する
        let converted_amount = {
            let state = self.state.lock().await;
            converter::convert(
                dto.amount,
                &currency,
                &state.rates,
                &self.reporting_currency,
            )
            .ok()
        };

        let now = jst_timestamp();
        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            title,
            amount: dto.amount,
            currency,
            converted_amount,
            date: dto.date.unwrap_or_else(Utc::now),
            receipt_image: dto.receipt_image,
            created_at: now.clone(),
            updated_at: now,
        };

        self.store.insert(&expense).await?;
        log::info!("経費を作成しました: id={}", expense.id);

        self.refresh().await?;

        Ok(expense)
    }

    /// 経費を削除する
    ///
    /// ストアでの削除成功後、読み込み済みの経費からも取り除き、
    /// フィルター該当件数を再集計したうえで合計を再計算する。
    /// 該当IDがない場合はNotFoundを返し、読み込み済み状態は変更しない。
    ///
    /// # 引数
    /// * `id` - 経費ID
    pub async fn delete_expense(&self, id: &str) -> AppResult<()> {
        match self.store.delete(id).await {
            Ok(()) => {
                let mut state = self.state.lock().await;
                state.expenses.retain(|e| e.id != id);

                // 削除対象がフィルター外の場合もあるため、該当件数は再集計する
                let range = filter::resolve(state.filter, Utc::now());
                match self.store.count(range).await {
                    Ok(count) => state.total_count = count,
                    Err(e) => {
                        log::warn!("削除後の件数の再取得に失敗しました: {}", e.details());
                    }
                }

                state.recompute_totals();
                state.error_message = None;
                self.publish(&state);
                log::info!("経費を削除しました: id={id}");
                Ok(())
            }
            Err(e) => {
                let mut state = self.state.lock().await;
                state.error_message = Some(e.user_message().to_string());
                self.publish(&state);
                Err(e)
            }
        }
    }

    /// 為替レートを再取得する
    ///
    /// 成功時はレートテーブルを全置換し、未換算の経費のバックフィルを行う。
    /// 失敗時は既存のテーブルをそのまま保持する（古いレートでも無いよりまし）。
    pub async fn refresh_rates(&self) -> AppResult<()> {
        match self
            .rate_provider
            .fetch_rates(&self.reporting_currency)
            .await
        {
            Ok(table) => {
                {
                    let mut state = self.state.lock().await;
                    state.rates = table;
                    // エラーの解消も購読側から観測できるよう、ここで配信する
                    state.error_message = None;
                    self.publish(&state);
                }
                self.backfill_conversions().await;
                Ok(())
            }
            Err(e) => {
                log::error!("為替レートの取得に失敗しました: {}", e.details());
                let mut state = self.state.lock().await;
                state.error_message = Some(e.user_message().to_string());
                self.publish(&state);
                Err(e)
            }
        }
    }

    /// 金額の換算プレビューを取得する
    ///
    /// 現在のレートテーブルでのベストエフォート換算。
    /// レートが未取得・未対応の場合はNone（入力フォームの表示用）。
    pub async fn preview_conversion(&self, amount: Decimal, currency: &str) -> Option<Decimal> {
        let state = self.state.lock().await;
        converter::convert(amount, currency, &state.rates, &self.reporting_currency).ok()
    }

    /// 読み込みを実行する
    async fn execute_load(&self, mode: LoadMode) -> AppResult<()> {
        // 読み込み計画を1つのロックの中で確定する
        let ticket = {
            let mut state = self.state.lock().await;

            match mode {
                LoadMode::CurrentPage => {
                    if state.load_state == LoadState::Loading {
                        log::debug!("読み込み中のためloadPageを無視します");
                        return Ok(());
                    }
                }
                LoadMode::NextPage => {
                    if state.load_state == LoadState::Loading || !state.has_more_pages {
                        log::debug!("次ページなし、または読み込み中のためloadNextPageを無視します");
                        return Ok(());
                    }
                    state.page += 1;
                }
                LoadMode::Refresh => {
                    state.page = 0;
                    state.has_more_pages = true;
                    // 進行中の読み込みを追い越す
                    state.load_generation += 1;
                }
            }

            state.load_state = LoadState::Loading;
            state.error_message = None;
            self.publish(&state);

            LoadTicket {
                generation: state.load_generation,
                page: state.page,
                range: filter::resolve(state.filter, Utc::now()),
            }
        };

        let query_result = self
            .store
            .query(ticket.range, ticket.page, self.page_size)
            .await;

        // ページ0の読み込みではフィルター該当件数も更新する
        let count_result = if ticket.page == 0 {
            Some(self.store.count(ticket.range).await)
        } else {
            None
        };

        let mut state = self.state.lock().await;

        // 後続のrefreshに追い越された読み込みは結果を破棄する
        if state.load_generation != ticket.generation {
            log::debug!(
                "追い越された読み込み結果を破棄します: generation={}",
                ticket.generation
            );
            return Ok(());
        }

        match query_result {
            Ok(new_expenses) => {
                let returned = new_expenses.len() as u32;

                if ticket.page == 0 {
                    state.expenses = new_expenses;
                } else {
                    state.expenses.extend(new_expenses);
                }

                state.has_more_pages = returned == self.page_size;

                match count_result {
                    Some(Ok(count)) => state.total_count = count,
                    Some(Err(e)) => {
                        log::warn!("件数の取得に失敗しました: {}", e.details());
                    }
                    None => {}
                }

                state.recompute_totals();
                state.load_state = LoadState::Idle;
                self.publish(&state);
                drop(state);

                // 未換算の経費があれば換算を試みる
                self.backfill_conversions().await;

                Ok(())
            }
            Err(e) => {
                // 直前の読み込み済み状態は保持する（部分的な変更は行わない）
                state.load_state = LoadState::Error;
                state.error_message = Some(e.user_message().to_string());
                self.publish(&state);
                Err(e)
            }
        }
    }

    /// 未換算の経費の換算バックフィルを実行する
    ///
    /// 換算金額が未設定かつ発生通貨が報告通貨以外の経費について、
    /// 現在のレートテーブルで換算を試みる。成功した換算はベストエフォートで
    /// 永続化する（保存失敗でもメモリ上の換算結果は保持する）。
    /// 未対応通貨はそのまま残り、次回のレート更新時に再試行される。
    async fn backfill_conversions(&self) {
        let (candidates, rates) = {
            let state = self.state.lock().await;
            let candidates: Vec<Expense> = state
                .expenses
                .iter()
                .filter(|e| {
                    e.converted_amount.is_none()
                        && !e.currency.eq_ignore_ascii_case(&self.reporting_currency)
                })
                .cloned()
                .collect();
            (candidates, state.rates.clone())
        };

        if candidates.is_empty() {
            return;
        }

        let mut converted_any = false;

        for mut expense in candidates {
            match converter::convert(
                expense.amount,
                &expense.currency,
                &rates,
                &self.reporting_currency,
            ) {
                Ok(converted) => {
                    expense.converted_amount = Some(converted);

                    // 永続化はベストエフォート。失敗してもメモリ上の換算は取り消さない
                    if let Err(e) = self.store.update(&expense).await {
                        log::warn!(
                            "換算金額の保存に失敗しました: id={}, {}",
                            expense.id,
                            e.details()
                        );
                    }

                    let mut state = self.state.lock().await;
                    if let Some(loaded) = state.expenses.iter_mut().find(|x| x.id == expense.id) {
                        loaded.converted_amount = Some(converted);
                        converted_any = true;
                    }
                }
                Err(e) => {
                    log::debug!(
                        "換算をスキップします: id={}, currency={}, {}",
                        expense.id,
                        expense.currency,
                        e.details()
                    );
                }
            }
        }

        if converted_any {
            let mut state = self.state.lock().await;
            state.recompute_totals();
            self.publish(&state);
        }
    }

    /// 現在の状態をスナップショットとして配信する
    fn publish(&self, state: &LedgerState) {
        self.snapshot_tx.send_replace(state.snapshot());
    }
}
