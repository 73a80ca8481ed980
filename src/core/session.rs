//! Conversation state
//!
//! [`SessionState`] owns the ordered message log, the secret key, the
//! selected model and the attachments waiting to go out with the next
//! message. Every mutation of the log is mirrored to a [`SessionStore`]
//! immediately, so a crash loses at most the mutation in progress.

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::attachment::Attachment;
use crate::core::config::data::DEFAULT_MODEL;
use crate::core::config::{Config, ConfigError, SecretStorage};
use crate::core::dispatch::{DispatchError, Dispatcher};
use crate::core::keyring::KeyringStorage;
use crate::core::message::Message;
use crate::core::providers::ProviderRegistry;
use crate::core::storage::{
    FileStorage, LocalStorage, MemoryStorage, StorageError, API_KEY_KEY, CHAT_MESSAGES_KEY,
    CORRUPT_CHAT_MESSAGES_KEY, SELECTED_MODEL_KEY,
};

/// Prefix of the system message appended when a reply fails.
pub const FAILURE_PREFIX: &str = "Error: API call failed: ";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub secret_key: String,
    pub selected_model: String,
}

/// Reasons a submission is refused before anything is sent.
#[derive(Debug)]
pub enum SubmitError {
    MissingKey,
    EmptyInput,
    Busy,
    Storage(StorageError),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::MissingKey => write!(f, "No API key set; run `multichat set-key` first"),
            SubmitError::EmptyInput => {
                write!(f, "Nothing to send: message and attachments are empty")
            }
            SubmitError::Busy => write!(f, "A request is already in flight"),
            SubmitError::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SubmitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SubmitError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for SubmitError {
    fn from(err: StorageError) -> Self {
        SubmitError::Storage(err)
    }
}

#[derive(Debug)]
pub enum ModelSelectionError {
    UnknownModel(DispatchError),
    Storage(StorageError),
}

impl fmt::Display for ModelSelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSelectionError::UnknownModel(err) => write!(f, "{err}"),
            ModelSelectionError::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ModelSelectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelSelectionError::UnknownModel(err) => Some(err),
            ModelSelectionError::Storage(err) => Some(err),
        }
    }
}

/// What happened to a submission that was sent.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The assistant reply, already appended to the log.
    Replied(String),
    /// The failure, already appended to the log as a system message.
    Failed(DispatchError),
}

/// Shared in-flight marker; clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Mark the session busy until the returned guard is dropped.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(Arc::clone(&self.0)))
    }
}

#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Persistence backends: one for the log and model, one for the key.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<dyn LocalStorage>,
    secrets: Arc<dyn LocalStorage>,
}

impl SessionStore {
    pub fn new(state: Arc<dyn LocalStorage>, secrets: Arc<dyn LocalStorage>) -> Self {
        Self { state, secrets }
    }

    pub fn in_memory() -> Self {
        let storage = Arc::new(MemoryStorage::new());
        Self::new(storage.clone(), storage)
    }

    /// File storage under the configured data dir; the key goes to the
    /// keyring when `secret_storage = "keyring"`.
    pub fn open(config: &Config) -> Result<Self, ConfigError> {
        let data_dir = config.data_dir()?;
        debug!(dir = %data_dir.display(), "opening session storage");
        let state: Arc<dyn LocalStorage> = Arc::new(FileStorage::new(data_dir));
        let secrets: Arc<dyn LocalStorage> = match config.secret_storage() {
            SecretStorage::File => Arc::clone(&state),
            SecretStorage::Keyring => Arc::new(KeyringStorage::default()),
        };
        Ok(Self::new(state, secrets))
    }
}

pub struct SessionState {
    store: SessionStore,
    messages: Vec<Message>,
    config: SessionConfig,
    pending: Vec<Attachment>,
    busy: BusyFlag,
}

impl SessionState {
    /// An empty session selecting `default_model`. Nothing is read yet.
    pub fn init(store: SessionStore, default_model: impl Into<String>) -> Self {
        Self {
            store,
            messages: Vec::new(),
            config: SessionConfig {
                secret_key: String::new(),
                selected_model: default_model.into(),
            },
            pending: Vec::new(),
            busy: BusyFlag::default(),
        }
    }

    /// Load any persisted log, key and model selection. Missing items leave
    /// the current values in place. A selected model no provider owns is
    /// replaced, and an unreadable log is moved aside under
    /// [`CORRUPT_CHAT_MESSAGES_KEY`] before the session starts empty.
    pub fn restore(&mut self, registry: &ProviderRegistry) -> Result<(), StorageError> {
        if let Some(raw) = self.store.state.get_item(CHAT_MESSAGES_KEY)? {
            match serde_json::from_str::<Vec<Message>>(&raw) {
                Ok(messages) => self.messages = messages,
                Err(err) => {
                    warn!("moving unreadable chat history aside: {err}");
                    self.store.state.set_item(CORRUPT_CHAT_MESSAGES_KEY, &raw)?;
                    self.store.state.remove_item(CHAT_MESSAGES_KEY)?;
                }
            }
        }

        if let Some(key) = self.store.secrets.get_item(API_KEY_KEY)? {
            self.config.secret_key = key;
        }

        if let Err(err) = registry.resolve(&self.config.selected_model) {
            warn!("default model unusable, using {DEFAULT_MODEL}: {err}");
            self.config.selected_model = DEFAULT_MODEL.to_string();
        }

        if let Some(model) = self.store.state.get_item(SELECTED_MODEL_KEY)? {
            match registry.resolve(&model) {
                Ok(_) => self.config.selected_model = model,
                Err(err) => warn!(
                    "ignoring stored model selection, using {}: {err}",
                    self.config.selected_model
                ),
            }
        }

        info!(
            messages = self.messages.len(),
            model = %self.config.selected_model,
            has_key = !self.config.secret_key.is_empty(),
            "restored session"
        );
        Ok(())
    }

    /// Write the log, key and model selection.
    pub fn persist(&self) -> Result<(), StorageError> {
        self.persist_messages()?;
        if self.config.secret_key.is_empty() {
            self.store.secrets.remove_item(API_KEY_KEY)?;
        } else {
            self.store
                .secrets
                .set_item(API_KEY_KEY, &self.config.secret_key)?;
        }
        self.store
            .state
            .set_item(SELECTED_MODEL_KEY, &self.config.selected_model)
    }

    fn persist_messages(&self) -> Result<(), StorageError> {
        let json = serde_json::to_string(&self.messages)?;
        self.store.state.set_item(CHAT_MESSAGES_KEY, &json)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn selected_model(&self) -> &str {
        &self.config.selected_model
    }

    pub fn has_secret_key(&self) -> bool {
        !self.config.secret_key.trim().is_empty()
    }

    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn append(&mut self, message: Message) -> Result<(), StorageError> {
        self.messages.push(message);
        self.persist_messages()
    }

    /// Empty the log and its persisted mirror once `confirm` agrees.
    /// Returns whether anything was cleared.
    pub fn clear(&mut self, confirm: impl FnOnce() -> bool) -> Result<bool, StorageError> {
        if !confirm() {
            debug!("clear declined");
            return Ok(false);
        }
        self.messages.clear();
        self.store.state.remove_item(CHAT_MESSAGES_KEY)?;
        info!("cleared chat history");
        Ok(true)
    }

    pub fn set_secret_key(&mut self, key: impl Into<String>) -> Result<(), StorageError> {
        self.config.secret_key = key.into().trim().to_string();
        if self.config.secret_key.is_empty() {
            self.store.secrets.remove_item(API_KEY_KEY)
        } else {
            self.store
                .secrets
                .set_item(API_KEY_KEY, &self.config.secret_key)
        }
    }

    /// Select `model` after checking that some provider owns it.
    pub fn set_selected_model(
        &mut self,
        model: &str,
        registry: &ProviderRegistry,
    ) -> Result<(), ModelSelectionError> {
        registry
            .resolve(model)
            .map_err(ModelSelectionError::UnknownModel)?;
        self.config.selected_model = model.to_string();
        self.store
            .state
            .set_item(SELECTED_MODEL_KEY, model)
            .map_err(ModelSelectionError::Storage)
    }

    pub fn pending_attachments(&self) -> &[Attachment] {
        &self.pending
    }

    pub fn add_attachments(&mut self, attachments: impl IntoIterator<Item = Attachment>) {
        self.pending.extend(attachments);
    }

    pub fn remove_attachment(&mut self, index: usize) -> Option<Attachment> {
        (index < self.pending.len()).then(|| self.pending.remove(index))
    }

    /// Append `input` (with the pending attachments) as a user message,
    /// dispatch the conversation and append the reply or the failure.
    ///
    /// Pending attachments are cleared only after a reply arrives, so a
    /// failed submission can be retried with the same files.
    pub async fn submit(
        &mut self,
        dispatcher: &Dispatcher,
        input: &str,
    ) -> Result<SubmitOutcome, SubmitError> {
        if !self.has_secret_key() {
            return Err(SubmitError::MissingKey);
        }
        if input.trim().is_empty() && self.pending.is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        let _guard = self.busy.try_acquire().ok_or(SubmitError::Busy)?;

        self.append(Message::user(input, self.pending.clone()))?;

        let result = dispatcher
            .send(
                &self.config.selected_model,
                &self.config.secret_key,
                &self.messages,
                &self.pending,
            )
            .await;

        match result {
            Ok(reply) => {
                self.append(Message::assistant(reply.clone()))?;
                self.pending.clear();
                Ok(SubmitOutcome::Replied(reply))
            }
            Err(err) => {
                warn!(
                    model = %self.config.selected_model,
                    status = ?err.status(),
                    "request failed: {err}"
                );
                self.append(Message::system(format!("{FAILURE_PREFIX}{err}")))?;
                Ok(SubmitOutcome::Failed(err))
            }
        }
    }
}
