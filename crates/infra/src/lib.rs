//! # Notify Relay インフラ層
//!
//! 外部システムとの接続・通信を担当するインフラストラクチャ層。
//!
//! ## 責務
//!
//! - **データベース接続**: 指数バックオフ付きの PostgreSQL 接続確立
//! - **リポジトリ実装**: 受信者・ニュースレターの読み取りクエリ
//! - **通知配信**: バッチ分割と並行送信、プロバイダごとのトランスポート
//!
//! ## 依存関係
//!
//! ```text
//! relay-service → infra → domain
//! ```
//!
//! ## モジュール構成
//!
//! - [`db`] - 接続の再試行ポリシーと接続プールの作成
//! - [`error`] - インフラ層エラー定義
//! - [`repository`] - リポジトリ実装
//! - [`dispatch`] - バッチ配信とプロバイダ実装
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use notify_relay_infra::{db, repository::PostgresSubscriberRepository};
//!
//! async fn setup() -> Result<(), notify_relay_infra::InfraError> {
//!     let options = db::connect_options("localhost", 5432, "ghost", "secret", "ghost");
//!     let connected = db::connect(options, &db::RetryPolicy::default()).await?;
//!
//!     let subscribers = PostgresSubscriberRepository::new(connected.value);
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod dispatch;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod repository;

pub use error::{InfraError, InfraErrorKind};
