//! Noop 送信実装
//!
//! メールを実際に送信せず、ログ出力のみ行う。
//! テスト環境や通知無効化時に使用する。

use async_trait::async_trait;
use notify_relay_domain::{
    notification::{NotificationContent, NotificationError, RecipientOutcome},
    subscriber::Subscriber,
};

use super::BatchTransport;

/// Noop トランスポート（ログ出力のみ、全受信者を受け付け済みとする）
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTransport;

#[async_trait]
impl BatchTransport for NoopTransport {
    async fn send_batch(
        &self,
        batch: &[Subscriber],
        content: &NotificationContent,
    ) -> Result<Vec<RecipientOutcome>, NotificationError> {
        tracing::info!(
            recipients = batch.len(),
            title = %content.title,
            "Noop: メール送信をスキップ"
        );
        Ok(batch
            .iter()
            .map(|subscriber| RecipientOutcome::accepted(&subscriber.email))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_batchが全受信者を受け付ける() {
        let batch = vec![
            Subscriber::new("a@example.com", "A", "1"),
            Subscriber::new("b@example.com", "B", "2"),
        ];

        let outcomes = NoopTransport
            .send_batch(&batch, &NotificationContent::default())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(RecipientOutcome::is_accepted));
    }
}
