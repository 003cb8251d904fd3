//! Model Registry: owns the three optional model slots.
//!
//! Each slot moves through `Unloaded -> Loading -> Ready | Failed`, or sits in
//! `Disabled` forever when no identifier is configured. Slots load
//! independently, so one bad identifier only takes down its own capability.
//!
//! Writes happen in `load` and `unload`, which run before the listener is
//! bound and after it has drained. Readers use `try_read`, so an accessor
//! never waits: a slot that is being written reports itself as `Loading`.

use crate::config::Settings;
use crate::error::ModelError;
use crate::inference::{Embedder, Reader, Reranker};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, TryLockError};
use std::time::Instant;
use thiserror::Error;

/// The three model roles served by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Embed,
    Rerank,
    Read,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Capability::Embed, Capability::Rerank, Capability::Read];

    pub fn slot_name(&self) -> &'static str {
        match self {
            Capability::Embed => "embedder",
            Capability::Rerank => "reranker",
            Capability::Read => "reader",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slot_name())
    }
}

/// Observable state of a slot, without the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Unloaded,
    Disabled,
    Loading,
    Ready,
    Failed,
}

/// Returned by accessors when a slot has no usable handle.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{capability} is not available ({state:?})")]
pub struct Unavailable {
    pub capability: Capability,
    pub state: SlotStatus,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("model registry has already been loaded")]
    AlreadyLoaded,
}

/// Builds model handles from identifiers. The production implementation
/// resolves ONNX models; tests plug in fakes.
pub trait ModelLoader: Send + Sync {
    fn load_embedder(&self, model_id: &str) -> Result<Arc<dyn Embedder>, ModelError>;
    fn load_reranker(&self, model_id: &str) -> Result<Arc<dyn Reranker>, ModelError>;
    fn load_reader(&self, model_id: &str) -> Result<Arc<dyn Reader>, ModelError>;
}

enum SlotState<M: ?Sized> {
    Unloaded,
    Disabled,
    Loading,
    Ready(Arc<M>),
    Failed(String),
}

impl<M: ?Sized> SlotState<M> {
    fn status(&self) -> SlotStatus {
        match self {
            SlotState::Unloaded => SlotStatus::Unloaded,
            SlotState::Disabled => SlotStatus::Disabled,
            SlotState::Loading => SlotStatus::Loading,
            SlotState::Ready(_) => SlotStatus::Ready,
            SlotState::Failed(_) => SlotStatus::Failed,
        }
    }
}

struct Slot<M: ?Sized> {
    capability: Capability,
    model_id: Option<String>,
    state: RwLock<SlotState<M>>,
}

impl<M: ?Sized> Slot<M> {
    fn new(capability: Capability, model_id: Option<String>) -> Self {
        let state = if model_id.is_some() {
            SlotState::Unloaded
        } else {
            SlotState::Disabled
        };
        Self {
            capability,
            model_id,
            state: RwLock::new(state),
        }
    }

    fn set(&self, next: SlotState<M>) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Run `build` for this slot unless it is disabled. The lock is not held
    /// while the model loads, so concurrent readers observe `Loading`.
    fn load_with<F>(&self, build: F) -> SlotStatus
    where
        F: FnOnce(&str) -> Result<Arc<M>, ModelError>,
    {
        let Some(model_id) = self.model_id.as_deref() else {
            tracing::info!(capability = %self.capability, "No model configured, slot disabled");
            return SlotStatus::Disabled;
        };

        self.set(SlotState::Loading);
        tracing::info!(capability = %self.capability, model = model_id, "Loading model");
        let start = Instant::now();

        match build(model_id) {
            Ok(handle) => {
                self.set(SlotState::Ready(handle));
                tracing::info!(
                    capability = %self.capability,
                    model = model_id,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Model loaded successfully"
                );
                SlotStatus::Ready
            }
            Err(e) => {
                tracing::error!(
                    capability = %self.capability,
                    model = model_id,
                    error = %e,
                    "Model failed to load, capability will be unavailable"
                );
                self.set(SlotState::Failed(e.to_string()));
                SlotStatus::Failed
            }
        }
    }

    fn unload(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*state, SlotState::Disabled) {
            *state = SlotState::Unloaded;
        }
    }

    fn get(&self) -> Result<Arc<M>, Unavailable> {
        let state = match self.state.try_read() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                return Err(Unavailable {
                    capability: self.capability,
                    state: SlotStatus::Loading,
                })
            }
        };
        match &*state {
            SlotState::Ready(handle) => Ok(Arc::clone(handle)),
            other => Err(Unavailable {
                capability: self.capability,
                state: other.status(),
            }),
        }
    }

    fn status(&self) -> SlotStatus {
        match self.state.try_read() {
            Ok(guard) => guard.status(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().status(),
            Err(TryLockError::WouldBlock) => SlotStatus::Loading,
        }
    }

    fn failure(&self) -> Option<String> {
        let state = match self.state.try_read() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        match &*state {
            SlotState::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }
}

/// Status of all three slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStatus {
    pub embedder: SlotStatus,
    pub reranker: SlotStatus,
    pub reader: SlotStatus,
}

impl RegistryStatus {
    /// Every configured slot is Ready.
    pub fn all_ready(&self) -> bool {
        [self.embedder, self.reranker, self.reader]
            .iter()
            .all(|s| matches!(s, SlotStatus::Ready | SlotStatus::Disabled))
    }
}

/// Holds the embedder, reranker and reader slots for the process lifetime.
pub struct ModelRegistry {
    embedder: Slot<dyn Embedder>,
    reranker: Slot<dyn Reranker>,
    reader: Slot<dyn Reader>,
    loaded: AtomicBool,
}

impl ModelRegistry {
    /// Create empty slots from the configured identifiers.
    pub fn new(settings: &Settings) -> Self {
        Self {
            embedder: Slot::new(Capability::Embed, settings.embed_model_name.clone()),
            reranker: Slot::new(Capability::Rerank, settings.rerank_model_name.clone()),
            reader: Slot::new(Capability::Read, settings.reader_model_name.clone()),
            loaded: AtomicBool::new(false),
        }
    }

    /// Load every configured slot. Slots load in parallel and fail
    /// independently; the returned status describes where each one ended up.
    ///
    /// Only the first call does anything.
    pub fn load(&self, loader: &dyn ModelLoader) -> Result<RegistryStatus, RegistryError> {
        if self.loaded.swap(true, Ordering::SeqCst) {
            return Err(RegistryError::AlreadyLoaded);
        }

        tracing::info!("Loading models...");
        let start = Instant::now();

        let status = std::thread::scope(|scope| {
            let embedder = scope.spawn(|| self.embedder.load_with(|id| loader.load_embedder(id)));
            let reranker = scope.spawn(|| self.reranker.load_with(|id| loader.load_reranker(id)));
            let reader = self.reader.load_with(|id| loader.load_reader(id));

            RegistryStatus {
                embedder: join_slot(embedder, &self.embedder),
                reranker: join_slot(reranker, &self.reranker),
                reader,
            }
        });

        tracing::info!(
            embedder = ?status.embedder,
            reranker = ?status.reranker,
            reader = ?status.reader,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model loading finished"
        );
        Ok(status)
    }

    /// Release every handle. Safe to call more than once.
    pub fn unload(&self) {
        tracing::info!("Shutting down models...");
        self.embedder.unload();
        self.reranker.unload();
        self.reader.unload();
    }

    pub fn embedder(&self) -> Result<Arc<dyn Embedder>, Unavailable> {
        self.embedder.get()
    }

    pub fn reranker(&self) -> Result<Arc<dyn Reranker>, Unavailable> {
        self.reranker.get()
    }

    pub fn reader(&self) -> Result<Arc<dyn Reader>, Unavailable> {
        self.reader.get()
    }

    pub fn status(&self) -> RegistryStatus {
        RegistryStatus {
            embedder: self.embedder.status(),
            reranker: self.reranker.status(),
            reader: self.reader.status(),
        }
    }

    /// Configured identifier for a capability, if any.
    pub fn model_id(&self, capability: Capability) -> Option<&str> {
        match capability {
            Capability::Embed => self.embedder.model_id.as_deref(),
            Capability::Rerank => self.reranker.model_id.as_deref(),
            Capability::Read => self.reader.model_id.as_deref(),
        }
    }

    /// Load error recorded for a failed slot.
    pub fn failure(&self, capability: Capability) -> Option<String> {
        match capability {
            Capability::Embed => self.embedder.failure(),
            Capability::Rerank => self.reranker.failure(),
            Capability::Read => self.reader.failure(),
        }
    }
}

/// A panicking loader marks its slot failed instead of tearing down the scope.
fn join_slot<M: ?Sized>(
    handle: std::thread::ScopedJoinHandle<'_, SlotStatus>,
    slot: &Slot<M>,
) -> SlotStatus {
    handle.join().unwrap_or_else(|_| {
        tracing::error!(capability = %slot.capability, "Model loader panicked");
        slot.set(SlotState::Failed("loader panicked".into()));
        SlotStatus::Failed
    })
}
