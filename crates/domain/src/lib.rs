//! # Notify Relay ドメイン層
//!
//! 投稿公開通知のリレーで扱うドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! - **純粋なデータ**: DB や HTTP クライアントには一切依存しない
//! - **空文字列デフォルト**: 通知本文の文字列フィールドは欠損せず、常に空文字列で埋める
//! - **リクエストスコープ**: すべての値は webhook 1 回ごとに生成され、リクエスト終了で破棄される
//!
//! ## 依存関係の方向
//!
//! ```text
//! relay-service → infra → domain
//! ```
//!
//! ## モジュール構成
//!
//! - [`post`] - 公開された投稿（webhook の入力）
//! - [`subscriber`] - 通知の受信者
//! - [`publication`] - 投稿が属するニュースレター
//! - [`notification`] - 通知本文、配信結果、通知エラー

pub mod notification;
pub mod post;
pub mod publication;
pub mod subscriber;

pub use notification::{
    DispatchReport,
    NotificationAuthor,
    NotificationContent,
    NotificationError,
    RecipientOutcome,
    RecipientStatus,
};
pub use post::{Author, PostId, PublishedPost};
pub use publication::PublicationInfo;
pub use subscriber::Subscriber;
