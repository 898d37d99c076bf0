//! # リポジトリ実装
//!
//! 通知に必要な読み取りクエリを提供する。
//!
//! ## 設計方針
//!
//! - **読み取り専用**: リレーはコンテンツプラットフォームの DB に書き込まない
//! - **スコープ付き取得**: 1 回の呼び出しごとにプールから接続を借り、全ての終了経路で返却する
//! - **テスタビリティ**: トレイト経由でモック可能な設計

pub mod publication_repository;
pub mod subscriber_repository;

pub use publication_repository::{PostgresPublicationRepository, PublicationRepository};
pub use subscriber_repository::{PostgresSubscriberRepository, SubscriberRepository};
