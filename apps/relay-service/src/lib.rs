//! # Relay Service ライブラリ
//!
//! 設定、エラー、ハンドラ、ユースケースと、それらを束ねるルーターを公開する。
//! バイナリ（`main.rs`）と結合テストの両方から利用する。

pub mod config;
pub mod error;
pub mod handler;
pub mod usecase;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use handler::{WebhookState, health_check, post_published};
use notify_relay_infra::repository::{PublicationRepository, SubscriberRepository};
use notify_relay_shared::observability::{MakeRequestUuidV7, make_request_span};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// ルーターを構築する
///
/// レイヤーは下から順に適用される:
/// 1. `SetRequestIdLayer`（最外）: UUID v7 のリクエスト ID を付与（クライアント提供値があればそれを使う）
/// 2. `TraceLayer`: リクエスト ID を含むスパンを作成
/// 3. `PropagateRequestIdLayer`: レスポンスヘッダーに `x-request-id` をコピー
pub fn router<S, P>(state: Arc<WebhookState<S, P>>) -> Router
where
    S: SubscriberRepository + 'static,
    P: PublicationRepository + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/webhooks/post-published", post(post_published::<S, P>))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
}
