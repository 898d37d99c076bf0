//! # PublicationRepository
//!
//! 投稿が属するニュースレターの名前と UUID を取得する。

use async_trait::async_trait;
use notify_relay_domain::{post::PostId, publication::PublicationInfo};
use sqlx::PgPool;

use crate::error::InfraError;

/// ニュースレターリポジトリトレイト
#[async_trait]
pub trait PublicationRepository: Send + Sync {
    /// 投稿が属するニュースレターを取得する
    ///
    /// 該当行がない場合は `None` を返す。複数行あれば先頭の 1 行を使う。
    async fn find_by_post_id(&self, post_id: &PostId)
    -> Result<Option<PublicationInfo>, InfraError>;
}

#[derive(Debug, sqlx::FromRow)]
struct PublicationRow {
    name: String,
    uuid: String,
}

/// PostgreSQL 実装の PublicationRepository
#[derive(Debug, Clone)]
pub struct PostgresPublicationRepository {
    pool: PgPool,
}

impl PostgresPublicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PublicationRepository for PostgresPublicationRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%post_id))]
    async fn find_by_post_id(
        &self,
        post_id: &PostId,
    ) -> Result<Option<PublicationInfo>, InfraError> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, PublicationRow>(
            r#"
            SELECT n.name, n.uuid
            FROM newsletters n
            INNER JOIN posts p ON p.newsletter_id = n.id
            WHERE p.id = $1
            LIMIT 1
            "#,
        )
        .bind(post_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(|row| PublicationInfo::new(row.name, row.uuid)))
    }
}
