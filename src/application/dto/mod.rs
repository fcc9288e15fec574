//! # Data Transfer Objects
//!
//! - **session_config**: セッション設定
//! - **platform**: コントロールAPIのメッセージ形式

pub mod platform;
pub mod session_config;
