//! # PostgreSQL 接続管理
//!
//! 起動時の接続確立（指数バックオフ付き再試行）と接続プールの作成を行う。
//!
//! ## 設計方針
//!
//! - **起動時のみ再試行**: 再試行は [`connect`] の中だけで行い、リクエスト処理中は再試行しない
//! - **試行回数はループローカル**: 試行回数は [`retry_with_backoff`] のループ内の値で、
//!   結果（[`Connected::attempts`]）として返す。呼び出し間で状態を共有しない
//! - **スコープ付き取得**: リポジトリは 1 回の処理ごとにプールから接続を借り、
//!   `PoolConnection` のドロップで返却する
//!
//! ## 待機時間
//!
//! 0 始まりの試行番号 `n` の失敗後に `min(max_delay, min_delay * 2^n)` だけ待つ。
//! 既定値（6 回、1 秒、60 秒）では 1, 2, 4, 8, 16, 32 秒となる。

use std::{fmt, future::Future, time::Duration};

use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};

use crate::error::InfraError;

/// 既定の最大試行回数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;
/// 既定の最小待機時間
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);
/// 既定の最大待機時間
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// プールからの接続取得タイムアウト
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// 再試行ポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_delay:    Duration,
    pub max_delay:    Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_delay:    DEFAULT_MIN_DELAY,
            max_delay:    DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// 0 始まりの試行番号 `attempt` が失敗した後の待機時間
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.min_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// 再試行の末に得られた値
#[derive(Debug)]
pub struct Connected<T> {
    pub value:    T,
    /// 成功した試行を含む試行回数（1 始まり）
    pub attempts: u32,
}

/// すべての試行が失敗した
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts:   u32,
    pub last_error: E,
}

/// 指数バックオフで `operation` を再試行する
///
/// `operation` には 0 始まりの試行番号が渡される。
/// 失敗のたびに [`RetryPolicy::delay_for`] だけ待機する（最後の失敗の後も待つ）。
/// `max_attempts` が 0 の場合も 1 回は試行する。
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<Connected<T>, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        tracing::debug!(
            attempt = attempt + 1,
            max_attempts,
            "データベース接続を試行"
        );

        match operation(attempt).await {
            Ok(value) => {
                return Ok(Connected {
                    value,
                    attempts: attempt + 1,
                });
            }
            Err(error) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "データベース接続に失敗、待機後に再試行"
                );
                tokio::time::sleep(delay).await;

                attempt += 1;
                if attempt >= max_attempts {
                    return Err(RetryExhausted {
                        attempts:   attempt,
                        last_error: error,
                    });
                }
            }
        }
    }
}

/// 接続プールの設定を返す
pub fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(ACQUIRE_TIMEOUT)
}

/// 個別の接続パラメータから接続設定を組み立てる
pub fn connect_options(
    host: &str,
    port: u16,
    username: &str,
    password: &str,
    database: &str,
) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(host)
        .port(port)
        .username(username)
        .password(password)
        .database(database)
}

/// 再試行付きで接続プールを作成する
///
/// `connect_with` はプール作成時に 1 本目の接続を確立するため、
/// 成功した時点で DB が応答することが確認できている。
///
/// # エラー
///
/// すべての試行が失敗した場合は `InfraErrorKind::ConnectionExhausted` を返す。
/// 呼び出し元はリクエストの受け付けを開始してはならない。
pub async fn connect(
    options: PgConnectOptions,
    policy: &RetryPolicy,
) -> Result<Connected<PgPool>, InfraError> {
    let result = retry_with_backoff(policy, |_| {
        let options = options.clone();
        async move { pool_options().connect_with(options).await }
    })
    .await;

    match result {
        Ok(connected) => {
            tracing::info!(attempts = connected.attempts, "データベースに接続しました");
            Ok(connected)
        }
        Err(exhausted) => {
            tracing::error!(
                attempts = exhausted.attempts,
                error = %exhausted.last_error,
                "データベース接続の再試行が上限に達しました"
            );
            Err(InfraError::connection_exhausted(
                exhausted.attempts,
                exhausted.last_error,
            ))
        }
    }
}
