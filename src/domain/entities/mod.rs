//! # Domain Entities
//!
//! ビジネスエンティティとバリューオブジェクトを定義するモジュール
//!
//! ## エンティティ
//!
//! - **Session**: アップロードセッションと状態機械
//! - **UploadRecord**: ファイル単位のアップロード記録
//!
//! ## バリューオブジェクト
//!
//! - **FileSource**: アップロード元
//! - **PresignedTarget**: 1回限りのアップロード先

pub mod file_source;
pub mod presigned_target;
pub mod session;
pub mod upload_record;
