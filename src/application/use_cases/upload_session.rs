//! # Upload Session Use Case
//!
//! セッションのライフサイクル（開始 → アップロード → 完了/中断）

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::application::dto::platform::{self, AbortRequest, InitRequest, InitResponse};
use crate::application::dto::session_config::{FailurePolicy, SessionConfig};
use crate::application::use_cases::negotiate_upload::{UploadNegotiator, UploadRequest};
use crate::domain::entities::file_source::FileSource;
use crate::domain::entities::session::{Session, SessionId, SessionState};
use crate::domain::entities::upload_record::{UploadOutcome, UploadRecord};
use crate::domain::errors::{SessionError, TransportError};
use crate::domain::repositories::transport::{ControlRequest, PlatformTransport};

const SKIPPED_AFTER_FAILURE: &str = "skipped: session aborted (fail-fast)";

/// セッション終了時のレポート
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    /// セッションID（開始前は `None`）
    pub session_id: Option<String>,
    pub state: SessionState,
    /// 呼び出し順のアップロードレコード
    pub records: Vec<UploadRecord>,
}

impl SessionReport {
    pub fn succeeded_count(&self) -> usize {
        self.count(UploadOutcome::Succeeded)
    }

    pub fn failed_count(&self) -> usize {
        self.count(UploadOutcome::Failed)
    }

    /// セッションが完了し、失敗したファイルがないか
    pub fn is_success(&self) -> bool {
        self.state == SessionState::Closed && self.failed_count() == 0
    }

    fn count(&self, outcome: UploadOutcome) -> usize {
        self.records.iter().filter(|r| r.outcome == outcome).count()
    }
}

/// アップロードセッション（セッションコントローラー）
///
/// 1インスタンスが1セッションだけを管理する。変更操作はすべて `&mut self`
/// を要求するため、複数タスクから共有するには外部で同期する必要がある。
///
/// `Open` のままドロップされた場合は、現在のtokioランタイム上で
/// ベストエフォートの中断をスケジュールする。
pub struct UploadSession {
    transport: Arc<dyn PlatformTransport>,
    config: SessionConfig,
    negotiator: UploadNegotiator,
    session: Session,
}

impl UploadSession {
    /// 未開始のセッションを作成
    ///
    /// # Arguments
    ///
    /// * `transport` - プラットフォームトランスポート
    /// * `config` - セッション設定
    pub fn new(transport: Arc<dyn PlatformTransport>, config: SessionConfig) -> Self {
        let negotiator = UploadNegotiator::new(transport.clone(), config.sanitize_entity_names);
        Self {
            transport,
            config,
            negotiator,
            session: Session::new(),
        }
    }

    /// セッションを作成して開始する
    pub async fn open(
        transport: Arc<dyn PlatformTransport>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(transport, config);
        session.start().await?;
        Ok(session)
    }

    /// プラットフォームでセッションを開始する（`Uninitialized -> Open`）
    ///
    /// # Errors
    ///
    /// - APIキーが拒否された場合は `SessionError::Auth`
    /// - その他の拒否やレスポンス不正は `SessionError::SessionStart`
    /// - すでに開始済みの場合は `SessionError::State`
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.session.state() != SessionState::Uninitialized {
            return Err(SessionError::State {
                operation: "start the session",
                state: self.session.state(),
            });
        }

        let request = ControlRequest::post(platform::INIT_PATH).with_body(platform::encode(
            &InitRequest {
                metadata: &self.config.metadata,
            },
        ));

        let response = self
            .transport
            .send_control_request(&request)
            .await
            .map_err(|e| match e {
                TransportError::Auth { .. } => SessionError::Auth(e),
                other => SessionError::SessionStart { source: other },
            })?;

        let init: InitResponse = platform::decode(&response)
            .map_err(|source| SessionError::SessionStart { source })?;

        self.session.mark_open(SessionId::new(init.data_package_id))?;
        if let Some(id) = self.session.id() {
            info!("Initialized upload session with dataPackageId: {}", id);
        }
        Ok(())
    }

    pub fn id(&self) -> Option<&SessionId> {
        self.session.id()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 現在までのアップロードレコード（呼び出し順）
    pub fn records(&self) -> Vec<UploadRecord> {
        self.session.records().snapshot()
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            session_id: self.session.id().map(|id| id.to_string()),
            state: self.session.state(),
            records: self.records(),
        }
    }

    /// 1ファイルをアップロードする
    ///
    /// # Arguments
    ///
    /// * `entity_name` - ファイルを分類するエンティティ名
    /// * `source` - アップロード元
    /// * `file_name` - アップロード先のファイル名（パス以外のソースでは必須）
    ///
    /// # Errors
    ///
    /// `Open` 以外の状態では `SessionError::State` を返し、ネットワーク呼び出しは行わない。
    /// ファイル単位の失敗はレコードに残した上で返す。
    pub async fn upload_file(
        &mut self,
        entity_name: &str,
        source: FileSource,
        file_name: Option<&str>,
    ) -> Result<UploadRecord, SessionError> {
        let mut request = UploadRequest::new(entity_name, source);
        if let Some(name) = file_name {
            request = request.with_file_name(name);
        }
        self.upload(request).await
    }

    /// [`UploadRequest`] を1件アップロードする
    pub async fn upload(&mut self, request: UploadRequest) -> Result<UploadRecord, SessionError> {
        let result = self.negotiator.upload(&self.session, request).await;
        if let Err(e) = &result {
            self.apply_failure_policy(e).await;
        }
        result
    }

    /// 複数ファイルを最大 `max_concurrent_uploads` 件ずつ並行してアップロードする
    ///
    /// 各アップロードは独自のpresigned targetを取得する。
    /// レコードと戻り値はどちらも要求の順序に並ぶ。
    ///
    /// `FailFast` では最初のファイル単位の失敗以降、まだ開始していないファイルは
    /// ネットワーク呼び出しをせずに `Failed`（スキップ）として記録し、
    /// `SessionError::State` を返す。実行中のアップロードは完了を待つ。
    pub async fn upload_files(
        &mut self,
        requests: Vec<UploadRequest>,
    ) -> Vec<Result<UploadRecord, SessionError>> {
        // Records are registered up front so that their order is the call order.
        let prepared: Vec<_> = requests
            .into_iter()
            .map(|request| self.negotiator.prepare(&self.session, request))
            .collect();

        let fail_fast = self.config.failure_policy == FailurePolicy::FailFast;
        let halted = AtomicBool::new(false);
        let halted = &halted;
        let negotiator = &self.negotiator;
        let session = &self.session;
        let results: Vec<Result<UploadRecord, SessionError>> = stream::iter(prepared)
            .map(move |slot| async move {
                let upload = match slot {
                    Ok(upload) => upload,
                    Err(e) => return Err(e),
                };
                if halted.load(Ordering::SeqCst) {
                    negotiator.skip(session, upload, SKIPPED_AFTER_FAILURE);
                    return Err(SessionError::State {
                        operation: "upload a file",
                        state: SessionState::Aborted,
                    });
                }
                let result = negotiator.execute(session, upload).await;
                if fail_fast && matches!(&result, Err(e) if e.is_per_file()) {
                    halted.store(true, Ordering::SeqCst);
                }
                result
            })
            .buffered(self.config.max_concurrent_uploads.max(1))
            .collect()
            .await;

        if let Some(e) = results.iter().filter_map(|r| r.as_ref().err()).find(|e| e.is_per_file()) {
            self.apply_failure_policy(e).await;
        }
        results
    }

    /// セッションを完了する（`Open -> Closed`）
    ///
    /// # Errors
    ///
    /// `Open` 以外では `SessionError::State`。
    /// プラットフォームが完了を拒否した場合は `SessionError::Complete` を返し、
    /// セッションはローカルで `Aborted` になる（中断エンドポイントは呼ばない）。
    pub async fn complete(&mut self) -> Result<SessionReport, SessionError> {
        let session_id = self.session.ensure_open("complete the session")?.clone();
        let request = ControlRequest::post(platform::complete_path(&session_id));

        match self.transport.send_control_request(&request).await {
            Ok(_) => {
                self.session.mark_closed()?;
                let report = self.report();
                info!(
                    "Upload session completed for dataPackageId: {} ({} succeeded, {} failed)",
                    session_id,
                    report.succeeded_count(),
                    report.failed_count()
                );
                Ok(report)
            }
            Err(source) => {
                error!("Failed to complete session {}: {}", session_id, source);
                self.session.mark_aborted()?;
                Err(SessionError::Complete {
                    session_id: session_id.to_string(),
                    source,
                })
            }
        }
    }

    /// セッションを中断する（`Open -> Aborted`）
    ///
    /// ベストエフォート。中断リクエストの失敗はログに残すだけで返さない。
    /// `Open` 以外の状態では何もしない。
    pub async fn abort(&mut self, reason: &str) -> SessionReport {
        let session_id = match self.session.ensure_open("abort the session") {
            Ok(id) => id.clone(),
            Err(e) => {
                warn!("Skipping abort: {}", e);
                return self.report();
            }
        };

        // The transition happens even if the platform call fails.
        if let Err(e) = self.session.mark_aborted() {
            warn!("Skipping abort: {}", e);
            return self.report();
        }

        match send_abort(self.transport.as_ref(), &session_id, reason).await {
            Ok(()) => info!("Upload session aborted for dataPackageId: {}", session_id),
            Err(e) => error!("Failed to abort session {}: {}", session_id, e),
        }
        self.report()
    }

    async fn apply_failure_policy(&mut self, err: &SessionError) {
        if self.config.failure_policy == FailurePolicy::FailFast && err.is_per_file() {
            warn!("Aborting session after upload failure (fail-fast): {}", err);
            self.abort(&err.to_string()).await;
        }
    }
}

impl fmt::Debug for UploadSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSession")
            .field("session", &self.session)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        let Some(session_id) = self.session.id().cloned() else {
            return;
        };
        if self.session.mark_aborted().is_err() {
            return;
        }

        warn!(
            "Upload session {} dropped while open; aborting",
            session_id
        );
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let transport = self.transport.clone();
                handle.spawn(async move {
                    if let Err(e) = send_abort(
                        transport.as_ref(),
                        &session_id,
                        "session dropped without finalization",
                    )
                    .await
                    {
                        error!("Failed to abort session {}: {}", session_id, e);
                    }
                });
            }
            Err(_) => error!(
                "No async runtime available to abort session {}",
                session_id
            ),
        }
    }
}

async fn send_abort(
    transport: &dyn PlatformTransport,
    session_id: &SessionId,
    reason: &str,
) -> Result<(), TransportError> {
    let request = ControlRequest::post(platform::abort_path(session_id))
        .with_body(platform::encode(&AbortRequest { reason }));
    transport.send_control_request(&request).await.map(|_| ())
}

/// スコープ付きでセッションを実行する
///
/// セッションを開始して `body` を実行し、`body` が `Ok` を返せば完了、
/// `Err` を返せば中断してからそのエラーを返す。
/// `body` の中で握りつぶされたファイル単位の失敗はセッションを中断しない。
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use ingest_uploader::adapter::http::client::HttpTransport;
/// use ingest_uploader::adapter::http::retry::{RetryPolicy, RetryingTransport};
/// use ingest_uploader::application::dto::session_config::SessionConfig;
/// use ingest_uploader::application::use_cases::upload_session::with_session;
/// use ingest_uploader::domain::entities::file_source::FileSource;
/// use ingest_uploader::domain::errors::SessionError;
///
/// # async fn run() -> anyhow::Result<()> {
/// let http = HttpTransport::new("https://ingest.example.com", "secret", Default::default())?;
/// let transport = Arc::new(RetryingTransport::new(http, RetryPolicy::default()));
///
/// let (_, report) = with_session(transport, SessionConfig::default(), |session| {
///     Box::pin(async move {
///         session
///             .upload_file("sales", FileSource::from_path("report.csv"), None)
///             .await?;
///         Ok::<_, SessionError>(())
///     })
/// })
/// .await?;
///
/// assert_eq!(report.records.len(), 1);
/// # Ok(())
/// # }
/// ```
pub async fn with_session<F, R, E>(
    transport: Arc<dyn PlatformTransport>,
    config: SessionConfig,
    body: F,
) -> Result<(R, SessionReport), E>
where
    F: for<'s> FnOnce(&'s mut UploadSession) -> BoxFuture<'s, Result<R, E>>,
    E: From<SessionError> + fmt::Display,
{
    let mut session = UploadSession::open(transport, config).await?;

    match body(&mut session).await {
        Ok(value) => {
            if session.state().is_terminal() {
                // Already aborted by the fail-fast policy.
                return Ok((value, session.report()));
            }
            let report = session.complete().await?;
            Ok((value, report))
        }
        Err(e) => {
            error!("An error occurred in upload session: {}", e);
            session.abort(&e.to_string()).await;
            Err(e)
        }
    }
}
