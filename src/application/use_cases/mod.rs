//! # Use Cases
//!
//! アプリケーションのビジネスフロー（ユースケース）
//!
//! ## ユースケース
//!
//! - **UploadNegotiator**: presigned targetの取得とファイル送信
//! - **UploadSession**: セッションの開始・完了・中断とアップロードの管理

pub mod negotiate_upload;
pub mod upload_session;
