//! # Application Layer
//!
//! アプリケーション固有のビジネスフロー（ユースケース）
//!
//! ## 特徴
//!
//! - Domain層のエンティティとサービスを組み合わせてセッションを実現
//! - `PlatformTransport` traitに依存（HTTP実装には依存しない）
//! - ワイヤーフォーマットは `dto::platform` に閉じ込める
//!
//! ## 構成要素
//!
//! - **dto**: Data Transfer Object
//! - **use_cases**: ユースケース

pub mod dto;
pub mod use_cases;
