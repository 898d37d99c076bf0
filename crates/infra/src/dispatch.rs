//! # 通知配信
//!
//! 受信者リストをバッチに分割し、プロバイダへ並行送信して結果を集計する。
//!
//! ## 設計方針
//!
//! - **2 層の trait**: 呼び出し側は [`NotificationDispatcher`] だけを見る。
//!   プロバイダ固有の処理は 1 バッチ分を送る [`BatchTransport`] に閉じ込める
//! - **分割は共通**: [`BatchDispatcher`] が入力順を保ったまま [`BATCH_SIZE`] 件ずつに分割する
//! - **構造化並行**: 全バッチを `join_all` で待ち合わせてから集計する。
//!   バックグラウンドに投げっぱなしにしない
//! - **部分失敗は値で返す**: あるバッチの失敗で他のバッチを止めない。
//!   致命的エラー（設定不備、テンプレート不備）のみ全バッチの完了後に `Err` で返す
//! - **起動時に 1 度だけ選択**: `EMAIL_PROVIDER` の値から [`create_dispatcher`] が実装を選ぶ

mod noop;
mod postmark;
mod smtp;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::future::join_all;
pub use noop::NoopTransport;
use notify_relay_domain::{
    notification::{DispatchReport, NotificationContent, NotificationError, RecipientOutcome},
    subscriber::Subscriber,
};
pub use postmark::{PostmarkTransport, TemplateRef};
use serde::Serialize;
pub use smtp::{PostTemplateRenderer, RenderedEmail, SmtpTransport};
use strum::{Display, EnumString, IntoStaticStr};

/// 1 バッチあたりの最大受信者数
pub const BATCH_SIZE: usize = 500;

/// 通知配信トレイト
///
/// ユースケースから見た配信の入口。`Arc<dyn NotificationDispatcher>` で共有する。
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// 全受信者に通知を送信し、配信結果を返す
    ///
    /// 一部の受信者の失敗は [`DispatchReport::failed`] に含めて `Ok` で返す。
    async fn send(
        &self,
        recipients: &[Subscriber],
        content: &NotificationContent,
    ) -> Result<DispatchReport, NotificationError>;
}

/// プロバイダごとのバッチ送信トレイト
///
/// 戻り値は `batch` と同じ順序の受信者ごとの結果。
/// 件数が足りない場合、報告のない受信者は失敗として扱われる。
#[async_trait]
pub trait BatchTransport: Send + Sync {
    async fn send_batch(
        &self,
        batch: &[Subscriber],
        content: &NotificationContent,
    ) -> Result<Vec<RecipientOutcome>, NotificationError>;
}

/// バッチ分割と集計を行う [`NotificationDispatcher`] 実装
#[derive(Debug, Clone)]
pub struct BatchDispatcher<T> {
    transport:  T,
    batch_size: usize,
}

impl<T: BatchTransport> BatchDispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self::with_batch_size(transport, BATCH_SIZE)
    }

    /// バッチサイズを指定して作成する（0 は 1 に切り上げる）
    pub fn with_batch_size(transport: T, batch_size: usize) -> Self {
        Self {
            transport,
            batch_size: batch_size.max(1),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait]
impl<T: BatchTransport> NotificationDispatcher for BatchDispatcher<T> {
    #[tracing::instrument(skip_all, level = "debug", fields(recipients = recipients.len()))]
    async fn send(
        &self,
        recipients: &[Subscriber],
        content: &NotificationContent,
    ) -> Result<DispatchReport, NotificationError> {
        let batches: Vec<&[Subscriber]> = recipients.chunks(self.batch_size).collect();
        let batch_count = batches.len();

        let results = join_all(batches.iter().map(|batch| async move {
            let result = self.transport.send_batch(batch, content).await;
            (*batch, result)
        }))
        .await;

        let mut failed = Vec::new();
        let mut fatal = None;

        for (index, (batch, result)) in results.into_iter().enumerate() {
            match result {
                Ok(outcomes) => {
                    let before = failed.len();
                    collect_rejected(batch, outcomes, &mut failed);
                    tracing::debug!(
                        batch = index + 1,
                        size = batch.len(),
                        rejected = failed.len() - before,
                        "バッチを送信しました"
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        batch = index + 1,
                        size = batch.len(),
                        error = %error,
                        "バッチ送信に失敗、バッチ内の全受信者を失敗として扱う"
                    );
                    failed.extend(batch.iter().map(|s| s.email.clone()));
                    if error.is_fatal() && fatal.is_none() {
                        fatal = Some(error);
                    }
                }
            }
        }

        if let Some(error) = fatal {
            return Err(error);
        }

        Ok(DispatchReport {
            batch_count,
            attempted: recipients.len(),
            failed,
        })
    }
}

/// 受信者ごとの結果から失敗したアドレスを集める
///
/// アドレスはプロバイダの応答ではなく入力側の値を使う。
fn collect_rejected(
    batch: &[Subscriber],
    outcomes: Vec<RecipientOutcome>,
    failed: &mut Vec<String>,
) {
    let reported = outcomes.len();

    for (subscriber, outcome) in batch.iter().zip(outcomes) {
        if !outcome.is_accepted() {
            let status: &'static str = (&outcome.status).into();
            tracing::debug!(
                email = %subscriber.email,
                status,
                detail = ?outcome.status,
                "受信者への送信が拒否されました"
            );
            failed.push(subscriber.email.clone());
        }
    }

    if reported < batch.len() {
        tracing::warn!(
            expected = batch.len(),
            reported,
            "プロバイダの応答件数が不足、未報告の受信者を失敗として扱う"
        );
        failed.extend(batch[reported..].iter().map(|s| s.email.clone()));
    }
}

// ===== テンプレートモデル =====

/// 受信者 1 人分のテンプレートモデル
///
/// Postmark ではそのまま `TemplateModel` として送り、SMTP ではローカルの
/// tera テンプレートのコンテキストになる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateModel<'a> {
    pub email:            &'a str,
    pub name:             &'a str,
    pub member_uuid:      &'a str,
    pub unsubscribe_url:  String,
    pub title:            &'a str,
    pub excerpt:          &'a str,
    pub html:             &'a str,
    pub canonical_url:    &'a str,
    pub feature_image:    &'a str,
    pub author_name:      &'a str,
    pub author_image:     &'a str,
    pub publication_name: &'a str,
    pub slug:             &'a str,
    pub site_url:         &'a str,
}

impl<'a> TemplateModel<'a> {
    pub fn new(subscriber: &'a Subscriber, content: &'a NotificationContent) -> Self {
        Self {
            email:            &subscriber.email,
            name:             &subscriber.display_name,
            member_uuid:      &subscriber.id,
            unsubscribe_url:  content.unsubscribe_url(subscriber),
            title:            &content.title,
            excerpt:          &content.excerpt,
            html:             &content.body_html,
            canonical_url:    &content.canonical_url,
            feature_image:    &content.hero_image_url,
            author_name:      &content.author.name,
            author_image:     &content.author.image_url,
            publication_name: &content.publication_name,
            slug:             &content.content_slug,
            site_url:         &content.site_url,
        }
    }
}

// ===== プロバイダ選択 =====

/// メールプロバイダ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum EmailProvider {
    /// Postmark のバッチテンプレート API
    Postmark,
    /// SMTP（開発環境では Mailpit）
    Smtp,
    /// ログ出力のみ
    Noop,
}

/// 配信の設定
#[derive(Clone)]
pub struct DispatcherConfig {
    pub provider:             EmailProvider,
    pub api_key:              Option<String>,
    pub api_base_url:         String,
    pub message_stream:       String,
    pub from_address:         String,
    pub template_id:          String,
    pub timeout:              Duration,
    pub smtp_host:            String,
    pub smtp_port:            u16,
    /// SMTP の同時接続数の上限（全バッチ合計）
    pub smtp_max_concurrency: usize,
}

impl std::fmt::Debug for DispatcherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("api_base_url", &self.api_base_url)
            .field("message_stream", &self.message_stream)
            .field("from_address", &self.from_address)
            .field("template_id", &self.template_id)
            .field("timeout", &self.timeout)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_max_concurrency", &self.smtp_max_concurrency)
            .finish()
    }
}

/// 設定からディスパッチャを作成する
///
/// 起動時に 1 度だけ呼び出す。
///
/// # エラー
///
/// Postmark で API キーがない場合や、SMTP で未知のテンプレート名が
/// 指定された場合は `NotificationError::Configuration` を返す。
pub fn create_dispatcher(
    config: &DispatcherConfig,
) -> Result<Arc<dyn NotificationDispatcher>, NotificationError> {
    let dispatcher: Arc<dyn NotificationDispatcher> = match config.provider {
        EmailProvider::Postmark => {
            let api_key = config
                .api_key
                .as_deref()
                .filter(|key| !key.is_empty())
                .ok_or_else(|| {
                    NotificationError::Configuration(
                        "postmark には EMAIL_API_KEY が必要です".to_string(),
                    )
                })?;
            let transport = PostmarkTransport::new(
                &config.api_base_url,
                api_key,
                &config.from_address,
                TemplateRef::parse(&config.template_id),
                &config.message_stream,
                config.timeout,
            )?;
            Arc::new(BatchDispatcher::new(transport))
        }
        EmailProvider::Smtp => {
            let renderer = PostTemplateRenderer::new(&config.template_id)?;
            let transport = SmtpTransport::new(
                &config.smtp_host,
                config.smtp_port,
                &config.from_address,
                renderer,
                config.timeout,
                config.smtp_max_concurrency,
            );
            Arc::new(BatchDispatcher::new(transport))
        }
        EmailProvider::Noop => Arc::new(BatchDispatcher::new(NoopTransport)),
    };

    tracing::info!(provider = %config.provider, "通知プロバイダを初期化しました");

    Ok(dispatcher)
}
