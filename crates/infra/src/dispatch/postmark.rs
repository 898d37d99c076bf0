//! Postmark バッチテンプレート送信
//!
//! `POST {api_base}/email/batchWithTemplates` に 1 バッチ分のメッセージを送り、
//! 応答配列の `ErrorCode` を受信者ごとの結果に変換する。

use std::time::Duration;

use async_trait::async_trait;
use notify_relay_domain::{
    notification::{NotificationContent, NotificationError, RecipientOutcome},
    subscriber::Subscriber,
};
use serde::{Deserialize, Serialize};

use super::{BatchTransport, TemplateModel};

/// サーバートークンのヘッダー名
const SERVER_TOKEN_HEADER: &str = "X-Postmark-Server-Token";

/// テンプレートの指定方法
///
/// 数値なら `TemplateId`、それ以外は `TemplateAlias` として送る。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    Id(i64),
    Alias(String),
}

impl TemplateRef {
    pub fn parse(value: &str) -> Self {
        match value.trim().parse::<i64>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Alias(value.trim().to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct BatchRequest<'a> {
    messages: Vec<TemplatedMessage<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TemplatedMessage<'a> {
    from:           &'a str,
    to:             &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_id:    Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_alias: Option<&'a str>,
    template_model: TemplateModel<'a>,
    #[serde(skip_serializing_if = "str::is_empty")]
    message_stream: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BatchResponseEntry {
    error_code: i64,
    #[serde(default)]
    message:    String,
}

/// Postmark トランスポート
#[derive(Debug, Clone)]
pub struct PostmarkTransport {
    client:         reqwest::Client,
    endpoint:       String,
    server_token:   String,
    from_address:   String,
    template:       TemplateRef,
    message_stream: String,
}

impl PostmarkTransport {
    /// # 引数
    ///
    /// - `api_base_url`: API のベース URL（例: `https://api.postmarkapp.com`）
    /// - `timeout`: 1 リクエストあたりのタイムアウト
    pub fn new(
        api_base_url: &str,
        server_token: &str,
        from_address: &str,
        template: TemplateRef,
        message_stream: &str,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                NotificationError::Configuration(format!("HTTP クライアントの構築に失敗: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/email/batchWithTemplates",
                api_base_url.trim_end_matches('/')
            ),
            server_token: server_token.to_string(),
            from_address: from_address.to_string(),
            template,
            message_stream: message_stream.to_string(),
        })
    }

    fn build_request<'a>(
        &'a self,
        batch: &'a [Subscriber],
        content: &'a NotificationContent,
    ) -> BatchRequest<'a> {
        let (template_id, template_alias) = match &self.template {
            TemplateRef::Id(id) => (Some(*id), None),
            TemplateRef::Alias(alias) => (None, Some(alias.as_str())),
        };

        BatchRequest {
            messages: batch
                .iter()
                .map(|subscriber| TemplatedMessage {
                    from: &self.from_address,
                    to: &subscriber.email,
                    template_id,
                    template_alias,
                    template_model: TemplateModel::new(subscriber, content),
                    message_stream: &self.message_stream,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl BatchTransport for PostmarkTransport {
    async fn send_batch(
        &self,
        batch: &[Subscriber],
        content: &NotificationContent,
    ) -> Result<Vec<RecipientOutcome>, NotificationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(SERVER_TOKEN_HEADER, &self.server_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&self.build_request(batch, content))
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(format!("Postmark への送信に失敗: {e}")))?;

        let status = response.status();

        if status.is_success() {
            let entries = response
                .json::<Vec<BatchResponseEntry>>()
                .await
                .map_err(|e| {
                    NotificationError::SendFailed(format!("Postmark の応答を解釈できません: {e}"))
                })?;

            return Ok(batch
                .iter()
                .zip(entries)
                .map(|(subscriber, entry)| {
                    if entry.error_code == 0 {
                        RecipientOutcome::accepted(&subscriber.email)
                    } else {
                        RecipientOutcome::rejected(
                            &subscriber.email,
                            format!("{}: {}", entry.error_code, entry.message),
                        )
                    }
                })
                .collect());
        }

        let body = response.text().await.unwrap_or_default();

        let error = match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::UNPROCESSABLE_ENTITY => {
                NotificationError::Configuration(format!("Postmark がリクエストを拒否 {status}: {body}"))
            }
            _ => NotificationError::SendFailed(format!("予期しないステータス {status}: {body}")),
        };

        Err(error)
    }
}
