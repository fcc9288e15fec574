//! # Session Entity
//!
//! アップロードセッションの状態機械

use std::fmt;

use crate::domain::entities::upload_record::RecordLog;
use crate::domain::errors::SessionError;

/// セッション状態
///
/// `Uninitialized -> Open -> {Closed | Aborted}` の順にのみ遷移する。
/// `Closed` と `Aborted` は終端状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Open,
    Closed,
    Aborted,
}

impl SessionState {
    /// 終端状態かどうか
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
            SessionState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// プラットフォームが発行するセッションID（不透明なトークン）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// アップロードセッション
///
/// 1つのセッションはセッションID、状態、アップロードレコードの列を所有する。
/// ベースURLとAPIキーはトランスポートが読み取り専用で保持する。
#[derive(Debug)]
pub struct Session {
    id: Option<SessionId>,
    state: SessionState,
    records: RecordLog,
}

impl Session {
    /// 未初期化のセッションを作成
    pub fn new() -> Self {
        Self {
            id: None,
            state: SessionState::Uninitialized,
            records: RecordLog::new(),
        }
    }

    pub fn id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn records(&self) -> &RecordLog {
        &self.records
    }

    /// セッションが `Open` であることを確認し、IDを返す
    ///
    /// # Errors
    ///
    /// `Open` 以外の状態では `SessionError::State` を返す
    pub fn ensure_open(&self, operation: &'static str) -> Result<&SessionId, SessionError> {
        match (&self.id, self.state) {
            (Some(id), SessionState::Open) => Ok(id),
            _ => Err(SessionError::State {
                operation,
                state: self.state,
            }),
        }
    }

    /// `Uninitialized -> Open`
    pub fn mark_open(&mut self, id: SessionId) -> Result<(), SessionError> {
        if self.state != SessionState::Uninitialized {
            return Err(SessionError::State {
                operation: "start the session",
                state: self.state,
            });
        }
        self.id = Some(id);
        self.state = SessionState::Open;
        Ok(())
    }

    /// `Open -> Closed`
    pub fn mark_closed(&mut self) -> Result<(), SessionError> {
        self.ensure_open("close the session")?;
        self.state = SessionState::Closed;
        Ok(())
    }

    /// `Open -> Aborted`
    pub fn mark_aborted(&mut self) -> Result<(), SessionError> {
        self.ensure_open("abort the session")?;
        self.state = SessionState::Aborted;
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_uninitialized() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(session.id().is_none());
        assert!(!session.is_open());
        assert!(session.records().is_empty());
    }

    #[test]
    fn test_open_then_close() {
        let mut session = Session::new();
        session.mark_open(SessionId::new("pkg-1")).unwrap();
        assert!(session.is_open());
        assert_eq!(session.ensure_open("upload").unwrap().as_str(), "pkg-1");

        session.mark_closed().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.state().is_terminal());
    }

    #[test]
    fn test_terminal_transition_happens_once() {
        let mut session = Session::new();
        session.mark_open(SessionId::new("pkg-1")).unwrap();
        session.mark_aborted().unwrap();

        assert!(matches!(
            session.mark_closed(),
            Err(SessionError::State {
                state: SessionState::Aborted,
                ..
            })
        ));
        assert!(session.mark_aborted().is_err());
        assert_eq!(session.state(), SessionState::Aborted);
    }

    #[test]
    fn test_cannot_reopen() {
        let mut session = Session::new();
        session.mark_open(SessionId::new("pkg-1")).unwrap();
        assert!(session.mark_open(SessionId::new("pkg-2")).is_err());
        assert_eq!(session.id().unwrap().as_str(), "pkg-1");
    }

    #[test]
    fn test_ensure_open_before_start() {
        let session = Session::new();
        let err = session.ensure_open("upload a file").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot upload a file while session is uninitialized"
        );
    }

    #[test]
    fn test_close_requires_open() {
        let mut session = Session::new();
        assert!(session.mark_closed().is_err());
        assert_eq!(session.state(), SessionState::Uninitialized);
    }
}
