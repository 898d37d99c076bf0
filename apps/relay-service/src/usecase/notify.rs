//! # 投稿公開通知ユースケース
//!
//! 受信者の解決 → ニュースレターの解決 → 通知本文の組み立て → 配信 → 結果判定
//! を 1 リクエスト内で順に実行する。
//!
//! ## 設計方針
//!
//! - **最初の失敗で終了**: 受信者やニュースレターの取得に失敗したら配信は行わない
//! - **リクエスト内で再試行しない**: 接続の再試行は起動時のみ
//! - **部分失敗はエラー**: 1 人でも失敗すれば `RelayError::PartialDelivery` を返し、
//!   成功件数を含める

use std::sync::Arc;

use notify_relay_domain::{
    notification::{DispatchReport, NotificationContent},
    post::PublishedPost,
};
use notify_relay_infra::{
    dispatch::NotificationDispatcher,
    repository::{PublicationRepository, SubscriberRepository},
};
use notify_relay_shared::{event_log::event, log_business_event};

use crate::error::RelayError;

/// 投稿公開通知ユースケース
pub struct NotifyUseCase<S, P> {
    subscribers:  S,
    publications: P,
    dispatcher:   Arc<dyn NotificationDispatcher>,
    site_url:     String,
}

impl<S, P> NotifyUseCase<S, P>
where
    S: SubscriberRepository,
    P: PublicationRepository,
{
    pub fn new(
        subscribers: S,
        publications: P,
        dispatcher: Arc<dyn NotificationDispatcher>,
        site_url: impl Into<String>,
    ) -> Self {
        Self {
            subscribers,
            publications,
            dispatcher,
            site_url: site_url.into(),
        }
    }

    /// 公開された投稿の通知を全受信者に送信する
    #[tracing::instrument(skip_all, fields(post_id = %post.id))]
    pub async fn notify(&self, post: PublishedPost) -> Result<DispatchReport, RelayError> {
        let subscribers = self.subscribers.find_by_post_id(&post.id).await?;
        tracing::debug!(count = subscribers.len(), "受信者を解決しました");

        let publication = self
            .publications
            .find_by_post_id(&post.id)
            .await?
            .ok_or_else(|| RelayError::PublicationNotFound(post.id.clone()))?;
        tracing::debug!(publication = %publication.name, "ニュースレターを解決しました");

        let content = NotificationContent::build(&post, &publication, &self.site_url);

        let report = self.dispatcher.send(&subscribers, &content).await?;

        if report.is_success() {
            log_business_event!(
                event.category = event::category::NOTIFICATION,
                event.action = event::action::NOTIFICATION_DISPATCHED,
                event.entity_type = event::entity_type::POST,
                event.entity_id = %post.id,
                event.result = event::result::SUCCESS,
                notification.batches = report.batch_count,
                notification.attempted = report.attempted,
                notification.failed = 0,
                "投稿公開通知を送信しました"
            );
            return Ok(report);
        }

        let succeeded = report.succeeded();
        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::NOTIFICATION_PARTIALLY_FAILED,
            event.entity_type = event::entity_type::POST,
            event.entity_id = %post.id,
            event.result = event::result::FAILURE,
            notification.batches = report.batch_count,
            notification.attempted = report.attempted,
            notification.failed = report.failed.len(),
            "投稿公開通知の一部が失敗しました"
        );

        Err(RelayError::PartialDelivery {
            failed: report.failed,
            succeeded,
        })
    }
}
