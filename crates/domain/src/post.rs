//! # 公開された投稿
//!
//! コンテンツプラットフォームから webhook で届く「投稿が公開された」イベントの中身。
//! HTTP の DTO からの変換はサービス層の責務で、ここではドメイン上の形だけを持つ。

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// 投稿 ID
///
/// プラットフォーム側の不透明な識別子。形式は検証しない。
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PostId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// 投稿の主著者
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Author {
    pub name:      String,
    pub image_url: String,
}

/// 公開された投稿
///
/// 欠損したフィールドは空文字列で表現する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishedPost {
    pub id:            PostId,
    pub slug:          String,
    pub title:         String,
    pub excerpt:       String,
    pub html:          String,
    pub feature_image: String,
    /// 正規 URL（空の場合は slug から組み立てる）
    pub url:           String,
    pub author:        Author,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_post_idのdisplayが内部文字列を返す() {
        let id = PostId::new("42");

        assert_eq!(id.to_string(), "42");
        assert_eq!(id.as_str(), "42");
    }

    #[test]
    fn test_post_idがjson上で素の文字列になる() {
        let id = PostId::from("abc");

        let json = serde_json::to_value(&id).unwrap();

        assert_eq!(json, serde_json::json!("abc"));
    }

    #[test]
    fn test_defaultの投稿は全フィールドが空文字列() {
        let post = PublishedPost::default();

        assert_eq!(post.id.as_str(), "");
        assert_eq!(post.title, "");
        assert_eq!(post.author, Author::default());
    }
}
