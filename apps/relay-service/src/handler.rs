//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! ## 設計方針
//!
//! - 各ハンドラはサブモジュールに配置
//! - 親モジュール（この `handler.rs`）で re-export し、フラットな API を提供
//! - ハンドラは薄く保ち、DTO の変換だけを行ってユースケースに委譲

pub mod health;
pub mod webhook;

pub use health::health_check;
pub use webhook::{
    NotifyResponse,
    PostPublishedRequest,
    WebhookState,
    post_published,
};
