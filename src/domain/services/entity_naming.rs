//! # Entity Naming Service
//!
//! エンティティ名の検証と正規化

use crate::domain::errors::SessionError;

/// エンティティ名サービス
///
/// プラットフォームに送るエンティティ名の検証と、
/// オブジェクトストレージのプレフィックスとして安全な形への正規化を行う
pub struct EntityNamingService;

impl EntityNamingService {
    /// エンティティ名を検証する
    ///
    /// # Errors
    ///
    /// 空文字列、またはURLパスを壊す文字を含む場合に
    /// `SessionError::Validation` を返す
    pub fn validate(entity_name: &str) -> Result<(), SessionError> {
        if entity_name.trim().is_empty() {
            return Err(SessionError::Validation(
                "entity_name must not be empty".to_string(),
            ));
        }
        if let Some(c) = entity_name.chars().find(|c| matches!(c, '/' | '?' | '#' | '%')) {
            return Err(SessionError::Validation(format!(
                "entity_name {:?} must not contain {:?}",
                entity_name, c
            )));
        }
        Ok(())
    }

    /// スペースとダッシュをアンダースコアに置き換える
    ///
    /// # Examples
    ///
    /// ```
    /// use ingest_uploader::domain::services::entity_naming::EntityNamingService;
    ///
    /// assert_eq!(EntityNamingService::sanitize("daily sales-report"), "daily_sales_report");
    /// assert_eq!(EntityNamingService::sanitize("already_clean"), "already_clean");
    /// ```
    pub fn sanitize(entity_name: &str) -> String {
        entity_name.trim().replace([' ', '-'], "_")
    }

    /// 検証した上で、設定に応じて正規化したエンティティ名を返す
    pub fn prepare(entity_name: &str, sanitize: bool) -> Result<String, SessionError> {
        Self::validate(entity_name)?;
        if sanitize {
            Ok(Self::sanitize(entity_name))
        } else {
            Ok(entity_name.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty() {
        assert!(EntityNamingService::validate("").is_err());
        assert!(EntityNamingService::validate("   ").is_err());
    }

    #[test]
    fn test_validate_rejects_path_characters() {
        assert!(EntityNamingService::validate("sales/2024").is_err());
        assert!(EntityNamingService::validate("sales?x=1").is_err());
        assert!(EntityNamingService::validate("sales#1").is_err());
        assert!(EntityNamingService::validate("sales%20").is_err());
    }

    #[test]
    fn test_validate_accepts_plain_names() {
        assert!(EntityNamingService::validate("sales").is_ok());
        assert!(EntityNamingService::validate("daily sales-report").is_ok());
    }

    #[test]
    fn test_sanitize_multiple_separators() {
        assert_eq!(
            EntityNamingService::sanitize("a - b c"),
            "a___b_c"
        );
    }

    #[test]
    fn test_prepare_without_sanitizing() {
        let name = EntityNamingService::prepare("daily-sales", false).unwrap();
        assert_eq!(name, "daily-sales");
    }

    #[test]
    fn test_prepare_with_sanitizing() {
        let name = EntityNamingService::prepare(" daily-sales ", true).unwrap();
        assert_eq!(name, "daily_sales");
    }
}
