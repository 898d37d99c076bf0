//! # Relay Service エラー定義
//!
//! 通知処理で発生するエラーと、HTTP レスポンスへの変換を定義する。
//!
//! | エラー | HTTP ステータス |
//! |-------|----------------|
//! | `InvalidPayload` | 400 |
//! | `Database` | 500 |
//! | `PublicationNotFound` | 404 |
//! | `PartialDelivery` | 500 |
//! | `Notification` | 500 |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use notify_relay_domain::{notification::NotificationError, post::PostId};
use notify_relay_infra::InfraError;
use notify_relay_shared::{ErrorResponse, event_log::error};
use thiserror::Error;

/// Relay Service で発生するエラー
#[derive(Debug, Error)]
pub enum RelayError {
    /// webhook のボディが処理できない（投稿 ID がないなど）
    #[error("不正なリクエストです: {0}")]
    InvalidPayload(String),

    /// 受信者・ニュースレターの取得に失敗
    #[error("データベースエラー: {0}")]
    Database(#[from] InfraError),

    /// 投稿に対応するニュースレターがない
    #[error("投稿 {0} のニュースレターが見つかりません")]
    PublicationNotFound(PostId),

    /// 一部の受信者への送信に失敗
    #[error("{} 件の受信者への送信に失敗しました（成功 {succeeded} 件）", .failed.len())]
    PartialDelivery {
        failed:    Vec<String>,
        succeeded: usize,
    },

    /// プロバイダの設定不備などで配信全体が失敗
    #[error("通知の送信に失敗しました: {0}")]
    Notification(#[from] NotificationError),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = match &self {
            RelayError::InvalidPayload(reason) => {
                tracing::warn!(%reason, "不正な webhook リクエストを受信しました");
                ErrorResponse::bad_request(self.to_string())
            }
            RelayError::Database(e) => {
                tracing::error!(
                    error.category = error::category::INFRASTRUCTURE,
                    error.kind = error::kind::DATABASE,
                    span_trace = %e.span_trace(),
                    "データベースエラー: {}",
                    e
                );
                ErrorResponse::internal_error()
            }
            RelayError::PublicationNotFound(post_id) => {
                tracing::warn!(
                    error.kind = error::kind::NOT_FOUND,
                    %post_id,
                    "ニュースレターが見つかりません"
                );
                ErrorResponse::not_found(self.to_string())
            }
            RelayError::PartialDelivery { failed, succeeded } => {
                tracing::error!(
                    error.category = error::category::EXTERNAL_SERVICE,
                    error.kind = error::kind::EMAIL_PROVIDER,
                    failed_count = failed.len(),
                    succeeded,
                    failed = ?failed,
                    "一部の受信者への送信に失敗しました"
                );
                ErrorResponse::new(
                    "partial-delivery",
                    "Partial Delivery",
                    StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                    self.to_string(),
                )
            }
            RelayError::Notification(e) => {
                tracing::error!(
                    error.category = error::category::EXTERNAL_SERVICE,
                    error.kind = error::kind::CONFIGURATION,
                    "通知の送信に失敗しました: {}",
                    e
                );
                ErrorResponse::internal_error()
            }
        };

        let status =
            StatusCode::from_u16(body.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use pretty_assertions::assert_eq;

    use super::*;

    async fn into_parts(error: RelayError) -> (StatusCode, ErrorResponse) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_publication_not_foundは404を返す() {
        let (status, body) = into_parts(RelayError::PublicationNotFound(PostId::new("42"))).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.status, 404);
        assert_eq!(body.detail, "投稿 42 のニュースレターが見つかりません");
    }

    #[tokio::test]
    async fn test_partial_deliveryは500と件数を返しアドレスは含めない() {
        let (status, body) = into_parts(RelayError::PartialDelivery {
            failed:    vec!["bad@example.com".to_string()],
            succeeded: 1199,
        })
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body.error_type,
            "https://notify-relay.example.com/errors/partial-delivery"
        );
        assert_eq!(body.detail, "1 件の受信者への送信に失敗しました（成功 1199 件）");
        assert!(!body.detail.contains("bad@example.com"));
    }

    #[tokio::test]
    async fn test_databaseエラーは内部情報を隠して500を返す() {
        let infra: InfraError = sqlx::Error::Protocol("password=secret".to_string()).into();

        let (status, body) = into_parts(RelayError::Database(infra)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, ErrorResponse::internal_error());
        assert!(!body.detail.contains("secret"));
    }

    #[tokio::test]
    async fn test_invalid_payloadは400を返す() {
        let (status, body) =
            into_parts(RelayError::InvalidPayload("投稿 ID がありません".to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error_type, "https://notify-relay.example.com/errors/bad-request");
        assert_eq!(body.detail, "不正なリクエストです: 投稿 ID がありません");
    }

    #[tokio::test]
    async fn test_通知エラーは500を返す() {
        let (status, body) = into_parts(RelayError::Notification(
            NotificationError::Configuration("401".to_string()),
        ))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, ErrorResponse::internal_error());
    }
}
