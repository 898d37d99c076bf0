//! SMTP 送信実装
//!
//! lettre の `AsyncSmtpTransport` を使用してメールを送信する。
//! 開発環境では Mailpit（ローカル SMTP サーバー）に接続する。
//!
//! Postmark と異なりテンプレートはローカルの tera テンプレートで描画する。
//! `EMAIL_TEMPLATE_ID` は埋め込みテンプレートの名前として解釈する。

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use lettre::{
    AsyncSmtpTransport,
    AsyncTransport,
    Tokio1Executor,
    message::{Message, MultiPart, SinglePart, header::ContentType},
};
use notify_relay_domain::{
    notification::{NotificationContent, NotificationError, RecipientOutcome},
    subscriber::Subscriber,
};
use tera::{Context, Tera};
use tokio::sync::Semaphore;

use super::{BatchTransport, TemplateModel};

/// 埋め込みテンプレートの一覧
const TEMPLATES: &[(&str, &str, &str)] = &[(
    "post_published",
    include_str!("../../templates/notifications/post_published.html"),
    include_str!("../../templates/notifications/post_published.txt"),
)];

/// 描画済みメール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub to:        String,
    pub subject:   String,
    pub html_body: String,
    pub text_body: String,
}

/// 投稿公開通知のテンプレートレンダラー
///
/// `include_str!` で埋め込んだテンプレートを tera に登録し、
/// 受信者ごとの [`TemplateModel`] から HTML/plaintext 両形式を生成する。
#[derive(Debug, Clone)]
pub struct PostTemplateRenderer {
    engine:        Tera,
    template_name: String,
}

impl PostTemplateRenderer {
    /// # エラー
    ///
    /// 未知のテンプレート名は `NotificationError::Configuration`、
    /// テンプレートの構文エラーは `NotificationError::TemplateFailed` を返す。
    pub fn new(template_name: &str) -> Result<Self, NotificationError> {
        if !TEMPLATES.iter().any(|(name, _, _)| *name == template_name) {
            return Err(NotificationError::Configuration(format!(
                "未知のメールテンプレート: {template_name}"
            )));
        }

        let mut engine = Tera::default();
        engine
            .add_raw_templates(TEMPLATES.iter().flat_map(|(name, html, txt)| {
                [(format!("{name}.html"), *html), (format!("{name}.txt"), *txt)]
            }))
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        Ok(Self {
            engine,
            template_name: template_name.to_string(),
        })
    }

    /// 受信者 1 人分のメールを描画する
    ///
    /// 件名は `{publication_name}: {title}`（ニュースレター名が空ならタイトルのみ）。
    pub fn render(
        &self,
        subscriber: &Subscriber,
        content: &NotificationContent,
    ) -> Result<RenderedEmail, NotificationError> {
        let context = Context::from_serialize(TemplateModel::new(subscriber, content))
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        let html_body = self
            .engine
            .render(&format!("{}.html", self.template_name), &context)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        let text_body = self
            .engine
            .render(&format!("{}.txt", self.template_name), &context)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        let subject = if content.publication_name.is_empty() {
            content.title.clone()
        } else {
            format!("{}: {}", content.publication_name, content.title)
        };

        Ok(RenderedEmail {
            to: subscriber.email.clone(),
            subject,
            html_body,
            text_body,
        })
    }
}

/// SMTP トランスポート
///
/// `lettre::AsyncSmtpTransport<Tokio1Executor>` をラップする。
/// バッチ内の受信者ごとに 1 通ずつ送信し、SMTP の失敗はその受信者の失敗とする。
///
/// 1 通ごとに接続を開くため、同時接続数は `max_concurrency` で制限する。
/// 制限はトランスポート単位なので、並行に送られる全バッチの合計に効く。
/// 1 通の送信（接続、応答待ちを含む）は `timeout` で打ち切る。
pub struct SmtpTransport {
    transport:    AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    renderer:     PostTemplateRenderer,
    timeout:      Duration,
    connections:  Semaphore,
}

impl SmtpTransport {
    /// # 引数
    ///
    /// - `host`: SMTP サーバーのホスト名（例: "localhost"）
    /// - `port`: SMTP サーバーのポート番号（例: 1025 for Mailpit）
    /// - `max_concurrency`: 同時接続数の上限（0 は 1 に切り上げる）
    pub fn new(
        host: &str,
        port: u16,
        from_address: &str,
        renderer: PostTemplateRenderer,
        timeout: Duration,
        max_concurrency: usize,
    ) -> Self {
        // builder_dangerous: TLS なしで接続（Mailpit 等のローカル SMTP 向け）
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .timeout(Some(timeout))
            .build();

        Self {
            transport,
            from_address: from_address.to_string(),
            renderer,
            timeout,
            connections: Semaphore::new(max_concurrency.max(1)),
        }
    }

    fn build_message(&self, email: &RenderedEmail) -> Result<Message, String> {
        Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| format!("送信元アドレス不正: {e}"))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|e| format!("宛先アドレス不正: {e}"))?)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| format!("メッセージ構築失敗: {e}"))
    }

    async fn send_one(&self, email: RenderedEmail) -> RecipientOutcome {
        let message = match self.build_message(&email) {
            Ok(message) => message,
            Err(reason) => return RecipientOutcome::rejected(email.to, reason),
        };

        let Ok(_permit) = self.connections.acquire().await else {
            return RecipientOutcome::rejected(email.to, "SMTP 送信枠を取得できません");
        };

        match tokio::time::timeout(self.timeout, self.transport.send(message)).await {
            Ok(Ok(_)) => RecipientOutcome::accepted(email.to),
            Ok(Err(e)) => RecipientOutcome::rejected(email.to, format!("SMTP 送信失敗: {e}")),
            Err(_) => RecipientOutcome::rejected(
                email.to,
                format!("SMTP 送信がタイムアウト（{} ms）", self.timeout.as_millis()),
            ),
        }
    }
}

#[async_trait]
impl BatchTransport for SmtpTransport {
    async fn send_batch(
        &self,
        batch: &[Subscriber],
        content: &NotificationContent,
    ) -> Result<Vec<RecipientOutcome>, NotificationError> {
        // 描画の失敗は全受信者に共通するため、送信前にまとめて描画する
        let emails = batch
            .iter()
            .map(|subscriber| self.renderer.render(subscriber, content))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(join_all(emails.into_iter().map(|email| self.send_one(email))).await)
    }
}
