//! # SubscriberRepository
//!
//! 投稿のニュースレターを購読しているメンバーを取得する。
//!
//! members → members_newsletters → posts.newsletter_id の 3 テーブル結合で、
//! 投稿 ID をキーに受信者を解決する。

use async_trait::async_trait;
use notify_relay_domain::{post::PostId, subscriber::Subscriber};
use sqlx::PgPool;

use crate::error::InfraError;

/// 受信者リポジトリトレイト
#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    /// 投稿のニュースレターを購読している受信者を取得する
    ///
    /// 購読者がいない場合は空の Vec を返す（エラーではない）。
    async fn find_by_post_id(&self, post_id: &PostId) -> Result<Vec<Subscriber>, InfraError>;
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriberRow {
    email: String,
    name:  String,
    uuid:  String,
}

impl From<SubscriberRow> for Subscriber {
    fn from(row: SubscriberRow) -> Self {
        Subscriber::new(row.email, row.name, row.uuid)
    }
}

/// PostgreSQL 実装の SubscriberRepository
#[derive(Debug, Clone)]
pub struct PostgresSubscriberRepository {
    pool: PgPool,
}

impl PostgresSubscriberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberRepository for PostgresSubscriberRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%post_id))]
    async fn find_by_post_id(&self, post_id: &PostId) -> Result<Vec<Subscriber>, InfraError> {
        let mut conn = self.pool.acquire().await?;

        // email が空の行はストア層で除外する
        let rows = sqlx::query_as::<_, SubscriberRow>(
            r#"
            SELECT
                m.email,
                COALESCE(m.name, '') AS name,
                COALESCE(m.uuid, '') AS uuid
            FROM members m
            INNER JOIN members_newsletters mn ON mn.member_id = m.id
            INNER JOIN posts p ON p.newsletter_id = mn.newsletter_id
            WHERE p.id = $1
              AND m.email IS NOT NULL
              AND m.email <> ''
            ORDER BY m.id
            "#,
        )
        .bind(post_id.as_str())
        .fetch_all(&mut *conn)
        .await?;

        tracing::debug!(count = rows.len(), "受信者を取得しました");

        Ok(rows.into_iter().map(Subscriber::from).collect())
    }
}
