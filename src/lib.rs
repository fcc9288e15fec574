//! # Ingest Uploader
//!
//! データインジェストプラットフォームへのセッション単位のファイルアップロード
//!
//! 1つのセッション（data package）を開始し、ファイルごとにpresigned URLを取得して
//! オブジェクトストレージへ直接アップロードし、最後にセッションを完了または中断します。
//!
//! このプロジェクトはクリーンアーキテクチャを採用しており、以下の4層で構成されています：
//!
//! - **Domain層**: セッション状態・アップロードレコード・エラー分類（外部依存なし）
//! - **Application層**: セッションコントローラーとアップロードネゴシエーター
//! - **Adapter層**: HTTPトランスポート、リトライ、設定ファイル
//! - **Driver層**: CLI、依存性注入

// coverage_nightly cfg が設定されている場合のみ coverage_attribute を有効化
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

// Domain層（純粋なビジネスロジック）
pub mod domain;

// Application層（ユースケース）
pub mod application;

// Adapter層（Infrastructure）
pub mod adapter;

// Driver層（Presentation）
pub mod driver;
