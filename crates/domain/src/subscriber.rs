//! # 受信者
//!
//! 投稿のニュースレターを購読しているメンバー。

/// 通知の受信者
///
/// email は空でないことをストア層（SQL の WHERE 句）で保証する。
/// `id` はメンバーの UUID を文字列のまま保持する不透明な識別子。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub email:        String,
    pub display_name: String,
    pub id:           String,
}

impl Subscriber {
    pub fn new(
        email: impl Into<String>,
        display_name: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            email:        email.into(),
            display_name: display_name.into(),
            id:           id.into(),
        }
    }
}
