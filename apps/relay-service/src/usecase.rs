//! # ユースケース層
//!
//! ハンドラから呼び出される処理の流れを定義する。

pub mod notify;

pub use notify::NotifyUseCase;
