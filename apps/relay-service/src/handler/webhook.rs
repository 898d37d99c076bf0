//! # 投稿公開 webhook ハンドラ
//!
//! ```text
//! POST /webhooks/post-published
//! ```
//!
//! コンテンツプラットフォームが送る `{"post": {"current": {...}}}` を受け取り、
//! [`NotifyUseCase`] に委譲する。
//!
//! 値が `null` または欠損している文字列フィールドは空文字列として扱う。
//! `custom_excerpt` があれば `excerpt` より優先する。

use std::sync::Arc;

use axum::{Json, extract::State};
use notify_relay_domain::post::{Author, PostId, PublishedPost};
use notify_relay_infra::repository::{PublicationRepository, SubscriberRepository};
use serde::{Deserialize, Serialize};

use crate::{error::RelayError, usecase::NotifyUseCase};

/// webhook ハンドラの State
pub struct WebhookState<S, P> {
    pub usecase: NotifyUseCase<S, P>,
}

// ===== リクエスト DTO =====

/// webhook リクエストボディ
#[derive(Debug, Deserialize)]
pub struct PostPublishedRequest {
    pub post: PostEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct PostEnvelope {
    pub current: PostPayload,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostPayload {
    pub id:             String,
    pub slug:           Option<String>,
    pub title:          Option<String>,
    pub excerpt:        Option<String>,
    pub custom_excerpt: Option<String>,
    pub html:           Option<String>,
    pub feature_image:  Option<String>,
    pub url:            Option<String>,
    pub primary_author: Option<AuthorPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthorPayload {
    pub name:          Option<String>,
    pub profile_image: Option<String>,
}

impl From<PostPayload> for PublishedPost {
    fn from(payload: PostPayload) -> Self {
        let excerpt = payload
            .custom_excerpt
            .filter(|excerpt| !excerpt.is_empty())
            .or(payload.excerpt)
            .unwrap_or_default();
        let author = payload.primary_author.unwrap_or_default();

        Self {
            id: PostId::new(payload.id),
            slug: payload.slug.unwrap_or_default(),
            title: payload.title.unwrap_or_default(),
            excerpt,
            html: payload.html.unwrap_or_default(),
            feature_image: payload.feature_image.unwrap_or_default(),
            url: payload.url.unwrap_or_default(),
            author: Author {
                name:      author.name.unwrap_or_default(),
                image_url: author.profile_image.unwrap_or_default(),
            },
        }
    }
}

// ===== レスポンス DTO =====

/// 全件成功時のレスポンス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyResponse {
    pub batches:   usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed:    usize,
}

// ===== ハンドラ =====

/// 投稿公開 webhook を処理する
///
/// ## レスポンス
///
/// - `200 OK`: 全受信者への送信に成功（受信者 0 人を含む）
/// - `400 Bad Request`: 投稿 ID が空
/// - `404 Not Found`: 投稿のニュースレターが見つからない
/// - `500 Internal Server Error`: DB エラー、または 1 人以上の送信失敗
pub async fn post_published<S, P>(
    State(state): State<Arc<WebhookState<S, P>>>,
    Json(request): Json<PostPublishedRequest>,
) -> Result<Json<NotifyResponse>, RelayError>
where
    S: SubscriberRepository + 'static,
    P: PublicationRepository + 'static,
{
    if request.post.current.id.trim().is_empty() {
        return Err(RelayError::InvalidPayload("投稿 ID がありません".to_string()));
    }

    let post = PublishedPost::from(request.post.current);
    tracing::info!(post_id = %post.id, slug = %post.slug, "投稿公開 webhook を受信しました");

    let report = state.usecase.notify(post).await?;

    Ok(Json(NotifyResponse {
        batches:   report.batch_count,
        attempted: report.attempted,
        succeeded: report.succeeded(),
        failed:    report.failed.len(),
    }))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn parse(value: serde_json::Value) -> PublishedPost {
        let request: PostPublishedRequest = serde_json::from_value(value).unwrap();
        PublishedPost::from(request.post.current)
    }

    #[test]
    fn test_全フィールドを変換できる() {
        let post = parse(json!({
            "post": { "current": {
                "id": "42",
                "slug": "hello-world",
                "title": "Hello",
                "excerpt": "自動抜粋",
                "html": "<p>本文</p>",
                "feature_image": "https://cdn.example.com/hero.png",
                "url": "https://blog.example.com/hello-world/",
                "primary_author": {
                    "name": "Alice",
                    "profile_image": "https://cdn.example.com/alice.png"
                }
            }}
        }));

        assert_eq!(post.id, PostId::new("42"));
        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.excerpt, "自動抜粋");
        assert_eq!(post.author.name, "Alice");
        assert_eq!(post.author.image_url, "https://cdn.example.com/alice.png");
    }

    #[test]
    fn test_nullや欠損は空文字列になる() {
        let post = parse(json!({
            "post": { "current": {
                "id": "42",
                "feature_image": null,
                "primary_author": null
            }}
        }));

        assert_eq!(
            post,
            PublishedPost {
                id: PostId::new("42"),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_custom_excerptがあれば優先する() {
        let post = parse(json!({
            "post": { "current": {
                "id": "42",
                "excerpt": "自動抜粋",
                "custom_excerpt": "手書きの抜粋"
            }}
        }));

        assert_eq!(post.excerpt, "手書きの抜粋");
    }

    #[test]
    fn test_custom_excerptが空ならexcerptを使う() {
        let post = parse(json!({
            "post": { "current": {
                "id": "42",
                "excerpt": "自動抜粋",
                "custom_excerpt": ""
            }}
        }));

        assert_eq!(post.excerpt, "自動抜粋");
    }
}
