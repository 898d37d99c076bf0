//! # テスト用モック
//!
//! ユースケーステストで使用するインメモリのリポジトリとトランスポート。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! notify-relay-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use notify_relay_domain::{
    notification::{NotificationContent, NotificationError, RecipientOutcome},
    post::PostId,
    publication::PublicationInfo,
    subscriber::Subscriber,
};

use crate::{
    dispatch::BatchTransport,
    error::InfraError,
    repository::{PublicationRepository, SubscriberRepository},
};

// ===== MockSubscriberRepository =====

#[derive(Clone, Default)]
pub struct MockSubscriberRepository {
    subscribers: Arc<Mutex<HashMap<PostId, Vec<Subscriber>>>>,
    fail:        Arc<Mutex<bool>>,
    calls:       Arc<Mutex<usize>>,
}

impl MockSubscriberRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subscribers(&self, post_id: PostId, subscribers: Vec<Subscriber>) {
        self.subscribers
            .lock()
            .unwrap()
            .entry(post_id)
            .or_default()
            .extend(subscribers);
    }

    /// 以降の呼び出しを DB エラーにする
    pub fn fail_with_database_error(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl SubscriberRepository for MockSubscriberRepository {
    async fn find_by_post_id(&self, post_id: &PostId) -> Result<Vec<Subscriber>, InfraError> {
        *self.calls.lock().unwrap() += 1;
        if *self.fail.lock().unwrap() {
            return Err(sqlx::Error::PoolTimedOut.into());
        }
        Ok(self
            .subscribers
            .lock()
            .unwrap()
            .get(post_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ===== MockPublicationRepository =====

#[derive(Clone, Default)]
pub struct MockPublicationRepository {
    publications: Arc<Mutex<HashMap<PostId, PublicationInfo>>>,
    fail:         Arc<Mutex<bool>>,
}

impl MockPublicationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_publication(&self, post_id: PostId, publication: PublicationInfo) {
        self.publications
            .lock()
            .unwrap()
            .insert(post_id, publication);
    }

    /// 以降の呼び出しを DB エラーにする
    pub fn fail_with_database_error(&self) {
        *self.fail.lock().unwrap() = true;
    }
}

#[async_trait]
impl PublicationRepository for MockPublicationRepository {
    async fn find_by_post_id(
        &self,
        post_id: &PostId,
    ) -> Result<Option<PublicationInfo>, InfraError> {
        if *self.fail.lock().unwrap() {
            return Err(sqlx::Error::PoolTimedOut.into());
        }
        Ok(self.publications.lock().unwrap().get(post_id).cloned())
    }
}

// ===== MockTransport =====

/// 送信したバッチを記録し、指定したアドレスだけ拒否するトランスポート
///
/// `BatchDispatcher` と組み合わせて、分割と集計を含めた配信をテストする。
#[derive(Clone, Default)]
pub struct MockTransport {
    batches:  Arc<Mutex<Vec<Vec<String>>>>,
    contents: Arc<Mutex<Vec<NotificationContent>>>,
    rejected: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定したアドレスへの送信を拒否させる
    pub fn reject(&self, email: impl Into<String>) {
        self.rejected.lock().unwrap().push(email.into());
    }

    /// 送信されたバッチ（アドレスのリスト）。並行送信のため順序は保証しない
    pub fn sent_batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn sent_contents(&self) -> Vec<NotificationContent> {
        self.contents.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchTransport for MockTransport {
    async fn send_batch(
        &self,
        batch: &[Subscriber],
        content: &NotificationContent,
    ) -> Result<Vec<RecipientOutcome>, NotificationError> {
        self.batches
            .lock()
            .unwrap()
            .push(batch.iter().map(|s| s.email.clone()).collect());
        self.contents.lock().unwrap().push(content.clone());

        let rejected = self.rejected.lock().unwrap().clone();
        Ok(batch
            .iter()
            .map(|s| {
                if rejected.contains(&s.email) {
                    RecipientOutcome::rejected(&s.email, "406: Inactive recipient")
                } else {
                    RecipientOutcome::accepted(&s.email)
                }
            })
            .collect())
    }
}
