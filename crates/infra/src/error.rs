//! # インフラ層エラー定義
//!
//! データベースとの通信で発生するエラーを表現する。
//!
//! ## 設計方針
//!
//! - **エラーの変換**: `sqlx::Error` をラップ
//! - **ドメインエラーとの分離**: インフラ固有のエラーを明示
//! - **SpanTrace 自動捕捉**: `From` 実装や convenience constructor で
//!   エラー生成時の呼び出し経路を自動記録する
//!
//! ## 構造
//!
//! `std::io::Error` と同じ struct + enum パターンを採用:
//! - [`InfraError`]: エラー種別（[`InfraErrorKind`]）と [`SpanTrace`] を保持するラッパー
//! - [`InfraErrorKind`]: エラーの具体的な種別

use std::fmt;

use derive_more::Display;
use thiserror::Error;
use tracing_error::SpanTrace;

/// インフラ層で発生するエラー
///
/// エラー種別（[`InfraErrorKind`]）と [`SpanTrace`]（呼び出し経路）を保持する。
/// `ErrorLayer` が登録された subscriber の下で生成すると、
/// その時点のスパン情報がキャプチャされる。
#[derive(Display)]
#[display("{kind}")]
pub struct InfraError {
    kind:       InfraErrorKind,
    span_trace: SpanTrace,
}

/// インフラ層エラーの種別
#[derive(Debug, Error)]
pub enum InfraErrorKind {
    /// データベースエラー
    ///
    /// クエリの実行失敗、接続取得のタイムアウト、行のデコード失敗など。
    /// リクエスト単位の失敗として扱う。
    #[error("データベースエラー: {0}")]
    Database(#[source] sqlx::Error),

    /// 起動時の接続再試行がすべて失敗した
    ///
    /// プロセス起動を中止すべき致命的エラー。
    #[error("データベース接続の再試行が上限に達しました（{attempts} 回）: {source}")]
    ConnectionExhausted {
        attempts: u32,
        #[source]
        source:   sqlx::Error,
    },
}

// ===== InfraError のメソッド =====

impl InfraError {
    /// エラー種別を取得する
    pub fn kind(&self) -> &InfraErrorKind {
        &self.kind
    }

    /// SpanTrace を取得する
    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    /// 起動を中止すべきエラーか
    pub fn is_connection_exhausted(&self) -> bool {
        matches!(self.kind, InfraErrorKind::ConnectionExhausted { .. })
    }

    // ===== Convenience constructors =====

    /// 接続再試行の枯渇エラーを生成する
    pub fn connection_exhausted(attempts: u32, source: sqlx::Error) -> Self {
        Self {
            kind:       InfraErrorKind::ConnectionExhausted { attempts, source },
            span_trace: SpanTrace::capture(),
        }
    }
}

// ===== トレイト実装 =====

impl fmt::Debug for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfraError")
            .field("kind", &self.kind)
            .field("span_trace", &self.span_trace)
            .finish()
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

// ===== From 実装（SpanTrace 自動キャプチャ） =====

impl From<sqlx::Error> for InfraError {
    fn from(source: sqlx::Error) -> Self {
        Self {
            kind:       InfraErrorKind::Database(source),
            span_trace: SpanTrace::capture(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::layer::SubscriberExt as _;

    use super::*;

    /// テスト用に ErrorLayer 付き subscriber を設定する
    fn with_error_layer(f: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry().with(tracing_error::ErrorLayer::default());
        let _guard = tracing::subscriber::set_default(subscriber);
        f();
    }

    #[test]
    fn test_from_sqlx_errorでspan_traceがキャプチャされる() {
        with_error_layer(|| {
            let span = tracing::info_span!("find_subscribers", post_id = "42");
            let _enter = span.enter();

            let err: InfraError = sqlx::Error::RowNotFound.into();

            assert!(matches!(err.kind(), InfraErrorKind::Database(_)));
            let trace_str = format!("{}", err.span_trace());
            assert!(
                trace_str.contains("find_subscribers"),
                "SpanTrace がスパン名を含むこと: {trace_str}",
            );
        });
    }

    #[test]
    fn test_connection_exhaustedで試行回数を保持する() {
        with_error_layer(|| {
            let span = tracing::info_span!("connect");
            let _enter = span.enter();

            let err = InfraError::connection_exhausted(6, sqlx::Error::PoolTimedOut);

            assert!(err.is_connection_exhausted());
            assert!(matches!(
                err.kind(),
                InfraErrorKind::ConnectionExhausted { attempts: 6, .. }
            ));
            assert!(format!("{}", err.span_trace()).contains("connect"));
        });
    }

    #[test]
    fn test_displayがinfra_error_kindのメッセージを出力する() {
        let err = InfraError::connection_exhausted(6, sqlx::Error::PoolTimedOut);
        assert!(format!("{err}").starts_with("データベース接続の再試行が上限に達しました（6 回）"));
    }

    #[test]
    fn test_sourceがinfra_error_kindに委譲する() {
        use std::error::Error;

        let err: InfraError = sqlx::Error::RowNotFound.into();
        assert!(err.source().is_some());

        let err = InfraError::connection_exhausted(1, sqlx::Error::PoolTimedOut);
        assert!(err.source().is_some());
        assert!(err.is_connection_exhausted());
    }
}
