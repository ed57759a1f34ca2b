//! Client-side orchestration for the document question-answering service:
//! session restore/login/logout, the mirrored document list, multi-file
//! uploads, and question submission with progressive answer reveal.

use std::{path::PathBuf, sync::Arc};

use reqwest::{multipart, Client, StatusCode};
use shared::{
    domain::SessionToken,
    error::{ApiErrorBody, ApiRejection},
    protocol::{
        DocumentListResponse, DocumentRecord, LoginResponse, QueryResponse, RegisterResponse,
        UploadOutcome, UploadResponse,
    },
};
use storage::SessionTokenStore;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod error;
mod query;
mod registry;
mod session;

pub use error::ClientError;
pub use query::{ExchangeRecord, LOGIN_REQUIRED_MESSAGE, QUERY_FAILED_MESSAGE};
pub use registry::DocumentRegistry;
pub use session::SessionStore;

use query::REVEAL_STEP;

/// State changes broadcast to whichever shell is rendering the client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    LoggedIn,
    SessionEnded,
    DocumentsLoaded(Vec<DocumentRecord>),
    DocumentsAppended(Vec<DocumentRecord>),
    DocumentRemoved { filename: String },
    UploadSucceeded { submitted: usize },
    UploadFailed { message: String },
    QuestionSubmitted { question: String },
    AnswerProgress { revealed: String },
    AnswerCompleted { answer: String },
    QueryFailed { message: String },
}

#[derive(Default)]
struct ClientState {
    documents: DocumentRegistry,
    pending_selection: Vec<PathBuf>,
    uploading: bool,
    asking: bool,
    exchange: Option<ExchangeRecord>,
    // Bumped on every new ask and on logout; a reveal task exits as soon
    // as it observes a generation newer than its own.
    exchange_seq: u64,
}

pub struct AssistantClient {
    http: Client,
    server_url: String,
    session: SessionStore,
    inner: Mutex<ClientState>,
    events: broadcast::Sender<ClientEvent>,
}

impl AssistantClient {
    pub fn new(server_url: impl Into<String>, store: Arc<dyn SessionTokenStore>) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            http: Client::new(),
            server_url: server_url.into(),
            session: SessionStore::new(store),
            inner: Mutex::new(ClientState::default()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Loads the persisted token into the session cache, once at startup.
    pub async fn restore_session(&self) {
        self.session.restore().await;
    }

    pub async fn current_token(&self) -> Option<SessionToken> {
        self.session.current_token().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.current_token().await.is_some()
    }

    pub async fn documents(&self) -> Vec<DocumentRecord> {
        self.inner.lock().await.documents.snapshot()
    }

    pub async fn pending_selection(&self) -> Vec<PathBuf> {
        self.inner.lock().await.pending_selection.clone()
    }

    pub async fn exchange(&self) -> Option<ExchangeRecord> {
        self.inner.lock().await.exchange.clone()
    }

    pub async fn is_uploading(&self) -> bool {
        self.inner.lock().await.uploading
    }

    pub async fn is_asking(&self) -> bool {
        self.inner.lock().await.asking
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<String, ClientError> {
        let response = self
            .http
            .post(format!("{}/register/", self.server_url))
            .form(&[("username", username), ("email", email), ("password", password)])
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: RegisterResponse = response.json().await?;
        Ok(body.message)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .post(format!("{}/login/", self.server_url))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::AuthFailure);
        }
        let response = check_status(response).await?;
        let body: LoginResponse = response.json().await?;

        if !self.session.set_token(SessionToken(body.token)).await {
            return Err(ClientError::SessionStorage);
        }
        info!(username, "login succeeded");
        let _ = self.events.send(ClientEvent::LoggedIn);
        Ok(())
    }

    /// Ends the session locally: clears the persisted token and discards
    /// all session-scoped state. Always succeeds, network or not.
    pub async fn logout(&self) {
        self.session.clear().await;
        {
            let mut state = self.inner.lock().await;
            state.documents.clear();
            state.pending_selection.clear();
            state.exchange = None;
            state.exchange_seq += 1;
        }
        let _ = self.events.send(ClientEvent::SessionEnded);
    }

    /// Reconciles the document registry with the server, once per session
    /// start. A failed listing is logged and leaves the registry empty;
    /// the rest of the client stays usable.
    pub async fn initialize_documents(&self) {
        let Some(token) = self.session.current_token().await else {
            return;
        };

        match self.fetch_document_listing(&token).await {
            Ok(records) => {
                let snapshot = {
                    let mut state = self.inner.lock().await;
                    state.documents.replace_all(records);
                    state.documents.snapshot()
                };
                info!(count = snapshot.len(), "document listing loaded");
                let _ = self.events.send(ClientEvent::DocumentsLoaded(snapshot));
            }
            Err(err) => {
                warn!("document listing failed; continuing with an empty document list: {err}");
            }
        }
    }

    async fn fetch_document_listing(
        &self,
        token: &SessionToken,
    ) -> Result<Vec<DocumentRecord>, ClientError> {
        let response = self
            .http
            .get(format!("{}/list_documents/", self.server_url))
            .query(&[("user_id", token.as_str())])
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: DocumentListResponse = response.json().await?;
        Ok(body.files)
    }

    /// Replaces the pending selection. Nothing is validated here; the
    /// server is the validator.
    pub async fn select_files(&self, paths: Vec<PathBuf>) {
        let mut state = self.inner.lock().await;
        state.pending_selection = paths;
    }

    /// Submits the pending selection as one multipart request. A no-op
    /// while an upload is already in flight; on failure the selection is
    /// kept so the user can retry without reselecting.
    pub async fn submit_upload(&self) -> Result<(), ClientError> {
        let Some(token) = self.session.current_token().await else {
            return Err(ClientError::SessionMissing);
        };

        let selection = {
            let mut state = self.inner.lock().await;
            if state.uploading {
                debug!("upload already in flight; ignoring submit");
                return Ok(());
            }
            if state.pending_selection.is_empty() {
                return Err(ClientError::NothingSelected);
            }
            state.uploading = true;
            state.pending_selection.clone()
        };

        let submitted = selection.len();
        let outcome = self.perform_upload(&token, &selection).await;
        let still_authenticated = self.session.current_token().await.is_some();

        let mut state = self.inner.lock().await;
        state.uploading = false;
        match outcome {
            Ok(outcomes) if still_authenticated => {
                let created: Vec<DocumentRecord> = outcomes
                    .iter()
                    .filter_map(UploadOutcome::as_created_record)
                    .collect();
                state.documents.append(created.clone());
                state.pending_selection.clear();
                drop(state);

                info!(submitted, indexed = created.len(), "upload confirmed");
                if !created.is_empty() {
                    let _ = self.events.send(ClientEvent::DocumentsAppended(created));
                }
                let _ = self.events.send(ClientEvent::UploadSucceeded { submitted });
                Ok(())
            }
            Ok(_) => {
                debug!("upload finished after logout; discarding result");
                Ok(())
            }
            Err(err) => {
                drop(state);
                warn!("upload failed; keeping pending selection: {err}");
                let _ = self.events.send(ClientEvent::UploadFailed {
                    message: "Failed to upload files".to_string(),
                });
                Err(err)
            }
        }
    }

    async fn perform_upload(
        &self,
        token: &SessionToken,
        paths: &[PathBuf],
    ) -> Result<Vec<UploadOutcome>, ClientError> {
        let mut form = multipart::Form::new().text("user_id", token.as_str().to_string());
        for path in paths {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|source| ClientError::FileRead {
                    path: path.clone(),
                    source,
                })?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.bin".to_string());
            form = form.part("files", multipart::Part::bytes(bytes).file_name(filename));
        }

        let response = self
            .http
            .post(format!("{}/upload/", self.server_url))
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: UploadResponse = response.json().await?;
        Ok(body.uploads)
    }

    /// Submits a question. A no-op while one is already in flight. The
    /// outcome arrives through events: the answer is revealed one
    /// character at a time once the response is in, while failure
    /// sentinels display immediately.
    pub async fn ask(self: &Arc<Self>, question: &str) {
        let Some(token) = self.session.current_token().await else {
            {
                let mut state = self.inner.lock().await;
                state.exchange_seq += 1;
                let mut exchange = ExchangeRecord::new(question);
                exchange.resolve_immediately(LOGIN_REQUIRED_MESSAGE);
                state.exchange = Some(exchange);
            }
            let _ = self.events.send(ClientEvent::AnswerCompleted {
                answer: LOGIN_REQUIRED_MESSAGE.to_string(),
            });
            return;
        };

        let seq = {
            let mut state = self.inner.lock().await;
            if state.asking {
                debug!("question already in flight; ignoring ask");
                return;
            }
            state.asking = true;
            state.exchange_seq += 1;
            state.exchange = Some(ExchangeRecord::new(question));
            state.exchange_seq
        };
        let _ = self.events.send(ClientEvent::QuestionSubmitted {
            question: question.to_string(),
        });

        let outcome = self.perform_query(&token, question).await;

        let mut state = self.inner.lock().await;
        state.asking = false;
        if state.exchange_seq != seq {
            debug!("exchange superseded while awaiting answer; dropping response");
            return;
        }
        match outcome {
            Ok(answer) => {
                if let Some(exchange) = state.exchange.as_mut() {
                    exchange.resolve(answer);
                }
                drop(state);
                self.spawn_reveal_task(seq);
            }
            Err(err) => {
                warn!("query failed: {err}");
                if let Some(exchange) = state.exchange.as_mut() {
                    exchange.resolve_immediately(QUERY_FAILED_MESSAGE);
                }
                drop(state);
                let _ = self.events.send(ClientEvent::QueryFailed {
                    message: QUERY_FAILED_MESSAGE.to_string(),
                });
                let _ = self.events.send(ClientEvent::AnswerCompleted {
                    answer: QUERY_FAILED_MESSAGE.to_string(),
                });
            }
        }
    }

    async fn perform_query(
        &self,
        token: &SessionToken,
        question: &str,
    ) -> Result<String, ClientError> {
        let response = self
            .http
            .post(format!("{}/query/", self.server_url))
            .form(&[("question", question), ("user_id", token.as_str())])
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: QueryResponse = response.json().await?;
        Ok(body.answer)
    }

    /// Steps the reveal cursor of exchange `seq` one character per tick.
    /// The task checks on every tick whether it is still the active
    /// exchange and exits silently once superseded, so two reveals never
    /// interleave their output.
    fn spawn_reveal_task(self: &Arc<Self>, seq: u64) {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REVEAL_STEP);
            loop {
                ticker.tick().await;
                let event = {
                    let mut state = client.inner.lock().await;
                    if state.exchange_seq != seq {
                        return;
                    }
                    let Some(exchange) = state.exchange.as_mut() else {
                        return;
                    };
                    if exchange.reveal_next_char() {
                        ClientEvent::AnswerProgress {
                            revealed: exchange.revealed.clone(),
                        }
                    } else {
                        ClientEvent::AnswerCompleted {
                            answer: exchange.answer.clone(),
                        }
                    }
                };
                let done = matches!(event, ClientEvent::AnswerCompleted { .. });
                let _ = client.events.send(event);
                if done {
                    return;
                }
            }
        });
    }

    /// Deletes one document by filename. The registry entry is removed
    /// only after the server acknowledged the deletion.
    pub async fn delete_document(&self, filename: &str) -> Result<(), ClientError> {
        let Some(token) = self.session.current_token().await else {
            return Err(ClientError::SessionMissing);
        };

        let response = self
            .http
            .post(format!("{}/delete_file/", self.server_url))
            .form(&[("filename", filename), ("user_id", token.as_str())])
            .send()
            .await?;
        check_status(response).await?;

        let removed = {
            let mut state = self.inner.lock().await;
            state.documents.remove_first(filename)
        };
        if removed.is_some() {
            info!(filename, "document deleted");
            let _ = self.events.send(ClientEvent::DocumentRemoved {
                filename: filename.to_string(),
            });
        }
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body: ApiErrorBody = response.json().await.unwrap_or_default();
    Err(ClientError::Rejected(ApiRejection::new(
        status.as_u16(),
        body.message().unwrap_or("request failed"),
    )))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
