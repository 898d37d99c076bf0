//! # Relay Service サーバー
//!
//! コンテンツプラットフォームの「投稿公開」webhook を受け取り、
//! ニュースレター購読者へ通知メールを配信する。
//!
//! ## 起動順序
//!
//! 1. 設定の読み込み（不足があれば起動しない）
//! 2. メールプロバイダの初期化（未知のプロバイダや API キー不足なら起動しない）
//! 3. データベース接続（指数バックオフで最大 6 回、全て失敗したら起動しない）
//! 4. リスナーのバインドと受け付け開始
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `RELAY_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `RELAY_PORT` | No | ポート番号（デフォルト: `3000`） |
//! | `DB_HOST` / `DB_USER` / `DB_PASSWORD` / `DB_NAME` | **Yes** | PostgreSQL 接続情報 |
//! | `DB_PORT` | No | PostgreSQL ポート（デフォルト: `5432`） |
//! | `EMAIL_PROVIDER` | **Yes** | `postmark` / `smtp` / `noop` |
//! | `EMAIL_API_KEY` | postmark のみ | サーバートークン |
//! | `EMAIL_FROM_ADDRESS` | **Yes** | 送信元アドレス |
//! | `EMAIL_TEMPLATE_ID` | **Yes** | テンプレート ID / エイリアス / ローカルテンプレート名 |
//! | `SMTP_MAX_CONCURRENCY` | No | SMTP の同時接続数上限（デフォルト: `10`） |
//! | `SITE_BASE_URL` | **Yes** | コンテンツプラットフォームのベース URL |
//! | `LOG_FORMAT` | No | `json` / `pretty`（デフォルト: `pretty`） |
//!
//! ## 起動方法
//!
//! ```bash
//! cargo run -p notify-relay-service
//! ```

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use notify_relay_infra::{
    db::{self, RetryPolicy},
    dispatch::create_dispatcher,
    repository::{PostgresPublicationRepository, PostgresSubscriberRepository},
};
use notify_relay_service::{
    config::RelayConfig,
    handler::WebhookState,
    router,
    usecase::NotifyUseCase,
};
use notify_relay_shared::{
    event_log::event,
    log_business_event,
    observability::{TracingConfig, init_tracing},
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    let tracing_config = TracingConfig::from_env("relay-service");
    let service_name = tracing_config.service_name.clone();
    init_tracing(tracing_config);
    let _tracing_guard = tracing::info_span!("app", service = %service_name).entered();

    let config = RelayConfig::from_env().context("設定の読み込みに失敗しました")?;

    tracing::info!(
        "Relay Service サーバーを起動します: {}:{}",
        config.host,
        config.port
    );

    let dispatcher =
        create_dispatcher(&config.dispatcher).context("通知プロバイダの初期化に失敗しました")?;

    let database = &config.database;
    let options = db::connect_options(
        &database.host,
        database.port,
        &database.user,
        &database.password,
        &database.name,
    );
    let connected = db::connect(options, &RetryPolicy::default())
        .await
        .context("データベース接続に失敗しました")?;
    log_business_event!(
        event.category = event::category::DATABASE,
        event.action = event::action::CONNECTION_ESTABLISHED,
        event.result = event::result::SUCCESS,
        db.attempts = connected.attempts,
        "データベースに接続しました"
    );
    let pool = connected.value;

    let usecase = NotifyUseCase::new(
        PostgresSubscriberRepository::new(pool.clone()),
        PostgresPublicationRepository::new(pool),
        dispatcher,
        config.site_base_url.clone(),
    );
    let app = router(Arc::new(WebhookState { usecase }));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("バインドアドレスが不正です")?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Relay Service サーバーが起動しました: {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
