//! # Domain Services
//!
//! エンティティに属さないビジネスルール

pub mod entity_naming;
