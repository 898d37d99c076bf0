//! # 通知
//!
//! 投稿公開通知のメール本文と配信結果に関するドメインモデルを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 |
//! |---|------------|
//! | [`NotificationContent`] | 全受信者に共通するテンプレートモデル |
//! | [`RecipientOutcome`] | プロバイダが返す受信者ごとの送信結果 |
//! | [`DispatchReport`] | 1 回の通知で集計した配信結果 |
//!
//! ## 設計方針
//!
//! - **部分失敗は値で返す**: 一部の受信者が失敗しても `Err` にはせず、[`DispatchReport::failed`] に集める
//! - **致命的エラーのみ `Err`**: 設定不備やテンプレート不備は全受信者に影響するため [`NotificationError`] で返す

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use thiserror::Error;

use crate::{post::PublishedPost, publication::PublicationInfo, subscriber::Subscriber};

/// 通知送信エラー
#[derive(Debug, Error)]
pub enum NotificationError {
    /// メール送信に失敗（バッチ単位のリクエスト失敗など）
    #[error("メール送信に失敗: {0}")]
    SendFailed(String),

    /// テンプレートレンダリングに失敗
    #[error("テンプレートレンダリングに失敗: {0}")]
    TemplateFailed(String),

    /// プロバイダの設定不備（認証情報の拒否、テンプレート ID 不正など）
    #[error("通知プロバイダの設定が不正: {0}")]
    Configuration(String),
}

impl NotificationError {
    /// 全受信者に影響し、呼び出し全体を失敗させるべきエラーか
    ///
    /// `SendFailed` はそのバッチの受信者だけを失敗扱いにする。
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TemplateFailed(_) | Self::Configuration(_))
    }
}

/// 投稿者情報（テンプレートモデル）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAuthor {
    pub name:      String,
    pub image_url: String,
}

/// 通知本文
///
/// 全受信者に共通するフィールド。受信者ごとのフィールド（email、表示名、ID、
/// 配信停止 URL）はトランスポートがテンプレートモデルを組み立てる時に加える。
///
/// すべての文字列フィールドは空文字列がデフォルトで、テンプレート側で
/// キー欠損によるレンダリング失敗が起きない。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title:            String,
    pub excerpt:          String,
    pub body_html:        String,
    pub canonical_url:    String,
    pub hero_image_url:   String,
    pub author:           NotificationAuthor,
    pub publication_name: String,
    pub publication_id:   String,
    pub content_slug:     String,
    pub site_url:         String,
}

impl NotificationContent {
    /// 公開イベントとニュースレター情報から通知本文を組み立てる
    ///
    /// 投稿に URL がない場合は `{site_url}/{slug}/` を正規 URL とする。
    pub fn build(post: &PublishedPost, publication: &PublicationInfo, site_url: &str) -> Self {
        let site_url = site_url.trim_end_matches('/').to_string();
        let canonical_url = if post.url.is_empty() && !post.slug.is_empty() {
            format!("{site_url}/{}/", post.slug)
        } else {
            post.url.clone()
        };

        Self {
            title: post.title.clone(),
            excerpt: post.excerpt.clone(),
            body_html: post.html.clone(),
            canonical_url,
            hero_image_url: post.feature_image.clone(),
            author: NotificationAuthor {
                name:      post.author.name.clone(),
                image_url: post.author.image_url.clone(),
            },
            publication_name: publication.name.clone(),
            publication_id: publication.id.clone(),
            content_slug: post.slug.clone(),
            site_url,
        }
    }

    /// 受信者ごとの配信停止 URL
    ///
    /// `{site_url}/unsubscribe/?uuid={member}&newsletter={publication}`
    pub fn unsubscribe_url(&self, subscriber: &Subscriber) -> String {
        format!(
            "{}/unsubscribe/?uuid={}&newsletter={}",
            self.site_url,
            urlencoding::encode(&subscriber.id),
            urlencoding::encode(&self.publication_id),
        )
    }
}

/// 受信者ごとの送信ステータス
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RecipientStatus {
    /// プロバイダが受け付けた
    Accepted,
    /// プロバイダが拒否した（エラーコードや理由を保持）
    Rejected { reason: String },
}

/// 受信者ごとの送信結果
///
/// 各トランスポートはプロバイダ固有の応答をこの形に正規化する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientOutcome {
    pub email:  String,
    pub status: RecipientStatus,
}

impl RecipientOutcome {
    pub fn accepted(email: impl Into<String>) -> Self {
        Self {
            email:  email.into(),
            status: RecipientStatus::Accepted,
        }
    }

    pub fn rejected(email: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            email:  email.into(),
            status: RecipientStatus::Rejected {
                reason: reason.into(),
            },
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == RecipientStatus::Accepted
    }
}

/// 1 回の通知の配信結果
///
/// `failed` は送信に失敗した受信者のメールアドレス。順序は保証しない。
/// 空であれば全件成功。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub batch_count: usize,
    pub attempted:   usize,
    pub failed:      Vec<String>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.attempted.saturating_sub(self.failed.len())
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
