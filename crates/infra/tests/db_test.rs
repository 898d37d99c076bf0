//! 接続確立の統合テスト
//!
//! 到達不能なアドレスへの接続で再試行の枯渇を確認する。DB は不要。

use std::time::Duration;

use notify_relay_infra::{
    InfraErrorKind,
    db::{self, RetryPolicy},
};

#[tokio::test]
async fn test_到達不能なホストでは再試行の末にconnection_exhaustedを返す() {
    // ポート 1 は通常リッスンされていないため即座に接続拒否される
    let options = db::connect_options("127.0.0.1", 1, "relay", "secret", "relay");
    let policy = RetryPolicy {
        max_attempts: 3,
        min_delay:    Duration::from_millis(1),
        max_delay:    Duration::from_millis(5),
    };

    let err = db::connect(options, &policy)
        .await
        .expect_err("接続できないこと");

    assert!(err.is_connection_exhausted());
    assert!(matches!(
        err.kind(),
        InfraErrorKind::ConnectionExhausted { attempts: 3, .. }
    ));
}
