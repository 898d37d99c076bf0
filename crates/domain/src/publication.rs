//! # ニュースレター
//!
//! 投稿が属し、受信者が購読している配信チャネル。

/// ニュースレターのメタデータ
///
/// webhook 1 回につき 1 度だけ解決され、以降は読み取り専用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationInfo {
    pub name: String,
    pub id:   String,
}

impl PublicationInfo {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id:   id.into(),
        }
    }
}
