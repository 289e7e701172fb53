//! Assistant session state machine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::backend::{AssistBackend, AssistEvent};
use crate::prompt::build_prompt;

/// Shown when the stream fails without a usable message.
const GENERIC_FAILURE: &str = "The assistant failed to respond. Please try again.";

/// What the assistant is asked to do with the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistAction {
    Improve,
    Summarize,
    Explain,
}

/// Snapshot of one in-progress or completed assistant invocation.
///
/// `suggestion` is reset to empty exactly once per `generate` call and
/// thereafter only grows until the stream finishes or errors. A set `error`
/// takes rendering priority over any partial suggestion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistSession {
    pub is_open: bool,
    pub action: Option<AssistAction>,
    pub original_content: String,
    pub language: Option<String>,
    pub suggestion: String,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Arguments of the most recent `generate`, kept for `retry`.
#[derive(Debug, Clone)]
struct Invocation {
    action: AssistAction,
    content: String,
    language: Option<String>,
}

struct Inner {
    session: RwLock<AssistSession>,
    last_invocation: RwLock<Option<Invocation>>,
    /// Monotonic id of the current stream. Deltas stamped with an older id
    /// belong to a superseded invocation and are discarded.
    stream_id: AtomicU64,
    updates_tx: watch::Sender<AssistSession>,
}

impl Inner {
    /// Mutate the session unconditionally and notify observers.
    fn mutate(&self, f: impl FnOnce(&mut AssistSession)) {
        let snapshot = {
            let mut session = self.session.write().expect("session lock poisoned");
            f(&mut session);
            session.clone()
        };
        self.updates_tx.send(snapshot).ok();
    }

    /// Mutate the session only if `id` still identifies the current stream.
    fn apply(&self, id: u64, f: impl FnOnce(&mut AssistSession)) {
        if self.stream_id.load(Ordering::SeqCst) != id {
            trace!(stream = id, "discarding event from superseded stream");
            return;
        }
        self.mutate(f);
    }
}

/// Orchestrates one streaming assistant invocation at a time.
///
/// `generate` resets the session synchronously before the backend is ever
/// awaited, so the UI reflects the new session within the same tick. Must
/// be used from within a tokio runtime: the stream consumer is a spawned
/// task.
pub struct AssistManager {
    backend: Arc<dyn AssistBackend>,
    inner: Arc<Inner>,
}

impl AssistManager {
    pub fn new(backend: Arc<dyn AssistBackend>) -> Self {
        let (updates_tx, _) = watch::channel(AssistSession::default());
        Self {
            backend,
            inner: Arc::new(Inner {
                session: RwLock::new(AssistSession::default()),
                last_invocation: RwLock::new(None),
                stream_id: AtomicU64::new(0),
                updates_tx,
            }),
        }
    }

    /// Current session snapshot.
    pub fn session(&self) -> AssistSession {
        self.inner
            .session
            .read()
            .expect("session lock poisoned")
            .clone()
    }

    /// Observe session snapshots as they change.
    pub fn subscribe(&self) -> watch::Receiver<AssistSession> {
        self.inner.updates_tx.subscribe()
    }

    /// Start a new invocation, superseding any stream still in flight.
    pub fn generate(
        &self,
        action: AssistAction,
        content: impl Into<String>,
        language: Option<String>,
    ) {
        let content = content.into();

        // Supersede the previous stream before touching the session: an
        // event from it landing mid-reset must already fail the id guard.
        let id = self.inner.stream_id.fetch_add(1, Ordering::SeqCst) + 1;

        // Reset happens synchronously, before any await: the caller reads
        // the fresh session in the same tick.
        self.inner.mutate(|session| {
            *session = AssistSession {
                is_open: true,
                action: Some(action),
                original_content: content.clone(),
                language: language.clone(),
                suggestion: String::new(),
                is_loading: true,
                error: None,
            };
        });
        *self
            .inner
            .last_invocation
            .write()
            .expect("invocation lock poisoned") = Some(Invocation {
            action,
            content: content.clone(),
            language: language.clone(),
        });

        let prompt = build_prompt(action, &content, language.as_deref());
        debug!(stream = id, ?action, "starting assistant stream");

        let backend = Arc::clone(&self.backend);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut rx = match backend.stream(&prompt).await {
                Ok(rx) => rx,
                Err(e) => {
                    warn!(stream = id, error = %e, "assistant stream failed to start");
                    inner.apply(id, |session| {
                        session.is_loading = false;
                        session.error = Some(e.to_string());
                    });
                    return;
                }
            };

            while let Some(event) = rx.recv().await {
                match event {
                    AssistEvent::Delta { text } => {
                        // The collaborator sends the running total per
                        // delta; replace, don't append.
                        inner.apply(id, |session| {
                            session.suggestion = text;
                            session.error = None;
                        });
                    }
                    AssistEvent::Done => {
                        debug!(stream = id, "assistant stream finished");
                        inner.apply(id, |session| session.is_loading = false);
                        return;
                    }
                    AssistEvent::Error { message } => {
                        warn!(stream = id, error = %message, "assistant stream errored");
                        inner.apply(id, |session| {
                            session.is_loading = false;
                            session.error = Some(if message.is_empty() {
                                GENERIC_FAILURE.to_string()
                            } else {
                                message
                            });
                        });
                        return;
                    }
                }
            }

            // Channel closed without a terminal event: treat as finished.
            inner.apply(id, |session| session.is_loading = false);
        });
    }

    /// Re-invoke `generate` with the stored last invocation.
    pub fn retry(&self) {
        let invocation = self
            .inner
            .last_invocation
            .read()
            .expect("invocation lock poisoned")
            .clone();
        match invocation {
            Some(Invocation {
                action,
                content,
                language,
            }) => self.generate(action, content, language),
            None => debug!("retry with no prior invocation, ignoring"),
        }
    }

    /// Hand the current suggestion text to `callback`, then close.
    ///
    /// The callback runs synchronously with the suggestion as it stands at
    /// call time; the stream need not have finished.
    pub fn apply_suggestion(&self, callback: impl FnOnce(&str)) {
        let suggestion = self
            .inner
            .session
            .read()
            .expect("session lock poisoned")
            .suggestion
            .clone();
        callback(&suggestion);
        self.close();
    }

    /// Close the session, clearing every field.
    ///
    /// Also supersedes any stream still in flight so late deltas cannot
    /// resurrect the closed session.
    pub fn close(&self) {
        self.inner.stream_id.fetch_add(1, Ordering::SeqCst);
        self.inner.mutate(|session| *session = AssistSession::default());
    }
}
