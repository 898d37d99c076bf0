//! # Relay Service 設定
//!
//! 環境変数からサーバー、データベース、メールプロバイダの設定を読み込む。
//!
//! 読み込みは [`RelayConfig::from_lookup`] に集約し、テストでは環境変数の代わりに
//! `HashMap` を渡す。不足や不正な値は panic せず [`ConfigError`] で返す。

use std::{env, str::FromStr, time::Duration};

use notify_relay_infra::dispatch::{DispatcherConfig, EmailProvider};
use thiserror::Error;

const DEFAULT_API_BASE_URL: &str = "https://api.postmarkapp.com";
const DEFAULT_MESSAGE_STREAM: &str = "broadcast";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SMTP_MAX_CONCURRENCY: usize = 10;

/// 設定エラー
///
/// 起動時に発生し、サーバーはリクエストの受け付けを開始しない。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("環境変数 {0} が設定されていません")]
    Missing(&'static str),

    #[error("環境変数 {name} の値が不正です: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("未知のメールプロバイダです: {0:?}（postmark / smtp / noop のいずれか）")]
    UnknownProvider(String),
}

/// Relay Service の設定
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// バインドアドレス
    pub host:          String,
    /// ポート番号
    pub port:          u16,
    pub database:      DatabaseConfig,
    pub dispatcher:    DispatcherConfig,
    /// コンテンツプラットフォームのベース URL（正規 URL と配信停止リンクに使う）
    pub site_base_url: String,
}

/// データベース接続の設定
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host:     String,
    pub port:     u16,
    pub user:     String,
    pub password: String,
    pub name:     String,
}

// パスワードをログに出さない
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("name", &self.name)
            .finish()
    }
}

impl RelayConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意のキー参照関数から設定を読み込む
    ///
    /// 空文字列の値は未設定として扱う。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);

        let provider_name = vars.required("EMAIL_PROVIDER")?;
        let provider = EmailProvider::from_str(&provider_name.to_ascii_lowercase())
            .map_err(|_| ConfigError::UnknownProvider(provider_name.clone()))?;

        Ok(Self {
            host:          vars.optional("RELAY_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port:          vars.parsed("RELAY_PORT", 3000)?,
            database:      DatabaseConfig {
                host:     vars.required("DB_HOST")?,
                port:     vars.parsed("DB_PORT", 5432)?,
                user:     vars.required("DB_USER")?,
                password: vars.required("DB_PASSWORD")?,
                name:     vars.required("DB_NAME")?,
            },
            dispatcher:    DispatcherConfig {
                provider,
                api_key: vars.optional("EMAIL_API_KEY"),
                api_base_url: vars
                    .optional("EMAIL_API_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
                message_stream: vars
                    .optional("EMAIL_MESSAGE_STREAM")
                    .unwrap_or_else(|| DEFAULT_MESSAGE_STREAM.to_string()),
                from_address: vars.required("EMAIL_FROM_ADDRESS")?,
                template_id: vars.required("EMAIL_TEMPLATE_ID")?,
                timeout: Duration::from_millis(
                    vars.parsed("EMAIL_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
                ),
                smtp_host: vars
                    .optional("SMTP_HOST")
                    .unwrap_or_else(|| "localhost".to_string()),
                smtp_port: vars.parsed("SMTP_PORT", 1025)?,
                smtp_max_concurrency: vars
                    .parsed("SMTP_MAX_CONCURRENCY", DEFAULT_SMTP_MAX_CONCURRENCY)?,
            },
            site_base_url: vars.required("SITE_BASE_URL")?,
        })
    }
}

/// キー参照のヘルパー
struct Vars<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn optional(&self, name: &'static str) -> Option<String> {
        (self.0)(name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parsed<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value }),
        }
    }
}
