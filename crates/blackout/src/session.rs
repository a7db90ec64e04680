//! The document session state machine.
//!
//! A [`DocumentSession`] is a plain value. Lifecycle transitions take it by
//! value and hand back the next session together with the outcome (a
//! [`Step`]); editing operations on a ready session borrow it mutably. The
//! blocking work a transition needs (probe, decode, burn) is returned as a
//! job for the caller to run, so the session itself never performs I/O.
//!
//! ```text
//! Empty -> Loading -> Ready
//!                  -> PasswordRequired { retry: false }
//! PasswordRequired -> Unlocking -> Ready
//!                               -> PasswordRequired { retry: true }
//! any -> Empty (clear)
//! ```

use blackout_core::{
    Display, DocumentKind, Password, Rect, RedactError, RedactOptions, Redaction, RedactionMode,
    RedactionStore, Size, SourceFile, Surface, mapper,
};
use blackout_parse::PageHandle;
use tracing::{debug, info, warn};

use crate::export::BurnJob;
use crate::loader::{self, LoadedDocument};
use crate::render::{RenderMetrics, RenderSurface, draw_overlay};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Empty,
    Loading,
    /// Waiting for a password. `retry` is set after a wrong one.
    PasswordRequired { retry: bool },
    Unlocking,
    Ready,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::Loading => "loading",
            SessionState::PasswordRequired { .. } => "waiting for a password",
            SessionState::Unlocking => "unlocking",
            SessionState::Ready => "ready",
        }
    }
}

/// Encryption status of the loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encryption {
    /// Not encrypted.
    #[default]
    Unlocked,
    /// Encrypted; no valid password yet.
    Locked,
    /// Encrypted and opened with a password the session holds for export.
    Unlockable,
}

/// Result of a by-value transition: the next session and the outcome.
pub type Step<T = ()> = (DocumentSession, Result<T, RedactError>);

/// Probe or decode work for the loader.
#[derive(Debug, Clone)]
pub struct DecodeJob {
    pub source: SourceFile,
    pub kind: DocumentKind,
    pub password: Option<Password>,
}

impl DecodeJob {
    /// Whether the source needs a password. Blocking.
    pub fn probe(&self) -> Result<bool, RedactError> {
        loader::probe(&self.source, self.kind)
    }

    /// Decode the source. Blocking.
    pub fn decode(&self) -> Result<LoadedDocument, RedactError> {
        loader::decode(&self.source, self.kind, self.password.as_ref())
    }
}

/// Ask the render collaborator for a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page: PageHandle,
}

impl RenderRequest {
    pub fn page_number(&self) -> usize {
        self.page.number()
    }
}

struct CachedRender {
    page_index: usize,
    surface: RenderSurface,
    metrics: RenderMetrics,
}

impl std::fmt::Debug for CachedRender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedRender")
            .field("page_index", &self.page_index)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

/// One loaded document, its pending redactions, and navigation state.
#[derive(Debug)]
pub struct DocumentSession {
    state: SessionState,
    source: Option<SourceFile>,
    kind: Option<DocumentKind>,
    document: Option<LoadedDocument>,
    encryption: Encryption,
    password: Option<Password>,
    remove_encryption: bool,
    /// 1-based; 0 while no document is loaded.
    current_page: usize,
    store: RedactionStore,
    mode: RedactionMode,
    render: Option<CachedRender>,
    options: RedactOptions,
}

impl Default for DocumentSession {
    fn default() -> Self {
        Self::new(RedactOptions::default())
    }
}

impl DocumentSession {
    pub fn new(options: RedactOptions) -> Self {
        Self {
            state: SessionState::Empty,
            source: None,
            kind: None,
            document: None,
            encryption: Encryption::Unlocked,
            password: None,
            remove_encryption: options.remove_encryption,
            current_page: 0,
            store: RedactionStore::new(),
            mode: RedactionMode::Rectangle,
            render: None,
            options,
        }
    }

    // --- accessors ---

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn kind(&self) -> Option<DocumentKind> {
        self.kind
    }

    pub fn source(&self) -> Option<&SourceFile> {
        self.source.as_ref()
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn page_count(&self) -> usize {
        self.document.as_ref().map_or(0, LoadedDocument::page_count)
    }

    /// 1-based current page, 0 when nothing is loaded.
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn encryption(&self) -> Encryption {
        self.encryption
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    pub fn remove_encryption(&self) -> bool {
        self.remove_encryption
    }

    pub fn redactions(&self) -> &RedactionStore {
        &self.store
    }

    pub fn mode(&self) -> RedactionMode {
        self.mode
    }

    pub fn options(&self) -> &RedactOptions {
        &self.options
    }

    /// Metrics of the cached render of the current page.
    pub fn current_metrics(&self) -> Option<RenderMetrics> {
        self.render.as_ref().map(|r| r.metrics)
    }

    fn invalid<T>(self, operation: &'static str) -> Step<T> {
        let state = self.state.name();
        (self, Err(RedactError::InvalidState { operation, state }))
    }

    fn require_ready(&self, operation: &'static str) -> Result<(), RedactError> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(RedactError::InvalidState {
                operation,
                state: self.state.name(),
            })
        }
    }

    fn reset(self) -> DocumentSession {
        DocumentSession::new(self.options)
    }

    // --- lifecycle transitions ---

    /// Start loading `file`, replacing whatever the session held.
    ///
    /// The returned job should be probed first; see [`Self::probed`].
    pub fn load(self, file: SourceFile) -> Step<DecodeJob> {
        if self.state != SessionState::Empty {
            debug!(from = self.state.name(), "load replaces the current session");
        }
        let mut next = self.reset();
        let kind = match DocumentKind::from_file_name(file.name()) {
            Ok(kind) => kind,
            Err(e) => {
                warn!(name = file.name(), "rejected file type");
                return (next, Err(e));
            }
        };
        debug!(name = file.name(), size = file.len(), kind = %kind, "loading");
        next.state = SessionState::Loading;
        next.source = Some(file.clone());
        next.kind = Some(kind);
        let job = DecodeJob {
            source: file,
            kind,
            password: None,
        };
        (next, Ok(job))
    }

    /// Apply the encryption probe. Returns whether a decode should follow.
    pub fn probed(mut self, outcome: Result<bool, RedactError>) -> Step<bool> {
        if self.state != SessionState::Loading {
            return self.invalid("probed");
        }
        match outcome {
            Ok(true) => {
                debug!("document is encrypted; waiting for a password");
                self.state = SessionState::PasswordRequired { retry: false };
                self.encryption = Encryption::Locked;
                (self, Ok(false))
            }
            Ok(false) => (self, Ok(true)),
            Err(e) => {
                warn!(error = %e, "encryption probe failed");
                (self.reset(), Err(e))
            }
        }
    }

    /// Apply a decode result from `Loading` or `Unlocking`.
    pub fn decoded(mut self, outcome: Result<LoadedDocument, RedactError>) -> Step<RenderRequest> {
        let unlocking = match self.state {
            SessionState::Loading => false,
            SessionState::Unlocking => true,
            _ => return self.invalid("decoded"),
        };
        match outcome {
            Ok(document) => {
                let Some(first) = document.page(0).copied() else {
                    let err = RedactError::CorruptDocument("document has no pages".into());
                    return (self.reset(), Err(err));
                };
                self.encryption = if document.is_encrypted() {
                    Encryption::Unlockable
                } else {
                    self.password = None;
                    Encryption::Unlocked
                };
                info!(
                    kind = ?document.kind(),
                    pages = document.page_count(),
                    encrypted = document.is_encrypted(),
                    "document ready"
                );
                self.document = Some(document);
                self.current_page = 1;
                self.render = None;
                self.state = SessionState::Ready;
                (self, Ok(RenderRequest { page: first }))
            }
            Err(e) if e.is_password_error() => {
                self.password = None;
                self.encryption = Encryption::Locked;
                self.state = SessionState::PasswordRequired { retry: unlocking };
                let err = if unlocking {
                    RedactError::DecryptionFailed
                } else {
                    e
                };
                debug!(retry = unlocking, "password needed");
                (self, Err(err))
            }
            Err(e) => {
                warn!(error = %e, "decode failed");
                (self.reset(), Err(e))
            }
        }
    }

    /// Try `password`. `remove_encryption` decides whether the export is
    /// written decrypted.
    pub fn submit_password(
        mut self,
        password: Password,
        remove_encryption: bool,
    ) -> Step<DecodeJob> {
        if !matches!(self.state, SessionState::PasswordRequired { .. }) {
            return self.invalid("submit_password");
        }
        let (Some(source), Some(kind)) = (self.source.clone(), self.kind) else {
            return self.invalid("submit_password");
        };
        self.state = SessionState::Unlocking;
        self.password = Some(password.clone());
        self.remove_encryption = remove_encryption;
        let job = DecodeJob {
            source,
            kind,
            password: Some(password),
        };
        (self, Ok(job))
    }

    /// Abandon the password prompt and discard the document.
    pub fn cancel_password(self) -> Step {
        if !matches!(self.state, SessionState::PasswordRequired { .. }) {
            return self.invalid("cancel_password");
        }
        debug!("password prompt cancelled");
        (self.reset(), Ok(()))
    }

    /// Move to 1-based page `number`.
    ///
    /// Returns a render request when the page changed; the current page and
    /// out-of-range numbers are no-ops.
    pub fn go_to_page(mut self, number: usize) -> Step<Option<RenderRequest>> {
        if self.state != SessionState::Ready {
            return self.invalid("go_to_page");
        }
        if number == self.current_page {
            return (self, Ok(None));
        }
        let target = number
            .checked_sub(1)
            .and_then(|index| self.document.as_ref()?.page(index).copied());
        let Some(page) = target else {
            return (self, Ok(None));
        };
        debug!(from = self.current_page, to = number, "page change");
        self.current_page = number;
        self.render = None;
        (self, Ok(Some(RenderRequest { page })))
    }

    /// Drop the document and every redaction.
    pub fn clear(self) -> DocumentSession {
        debug!(
            from = self.state.name(),
            redactions = self.store.len(),
            "session cleared"
        );
        self.reset()
    }

    // --- editing a ready session ---

    /// The render request for the current page, e.g. to retry a failed render.
    pub fn render_request(&self) -> Option<RenderRequest> {
        if self.state != SessionState::Ready {
            return None;
        }
        let index = self.current_page.checked_sub(1)?;
        let page = *self.document.as_ref()?.page(index)?;
        Some(RenderRequest { page })
    }

    /// Cache a finished render. Renders of a page other than the current one
    /// are stale and ignored; returns whether the render was kept.
    pub fn record_render(
        &mut self,
        page_index: usize,
        surface: RenderSurface,
        metrics: RenderMetrics,
    ) -> bool {
        if self.state != SessionState::Ready || page_index + 1 != self.current_page {
            debug!(page_index, "discarding render of a page no longer shown");
            return false;
        }
        self.render = Some(CachedRender {
            page_index,
            surface,
            metrics,
        });
        true
    }

    /// The current page with pending redactions drawn over it.
    pub fn view(&self) -> Option<RenderSurface> {
        let cached = self.render.as_ref()?;
        let mut surface = cached.surface.clone();
        draw_overlay(
            &mut surface,
            self.store.for_page(cached.page_index),
            &self.options,
        );
        Some(surface)
    }

    /// Record a finished drag on the current page.
    ///
    /// `drag` is in display space; it is scaled onto the surface of the most
    /// recent render. Returns whether it passed the minimum size gate.
    pub fn add_redaction_from_drag(
        &mut self,
        drag: Rect<Display>,
        display: Size<Display>,
    ) -> Result<bool, RedactError> {
        self.require_ready("add_redaction")?;
        let Some(cached) = &self.render else {
            return Err(RedactError::InvalidState {
                operation: "add_redaction",
                state: "ready without a rendered page",
            });
        };
        let metrics = cached.metrics;
        let rect = mapper::display_to_surface(drag, display, metrics.surface_size());
        let added = self.store.add(
            cached.page_index,
            rect,
            metrics.surface_width,
            metrics.surface_height,
        );
        debug!(page = self.current_page, ?rect, added, "redaction drawn");
        Ok(added)
    }

    /// Record a redaction already expressed on a surface of the given size,
    /// on any 1-based page. Pages outside the document are ignored.
    pub fn add_surface_redaction(
        &mut self,
        page_number: usize,
        rect: Rect<Surface>,
        surface_width: u32,
        surface_height: u32,
    ) -> Result<bool, RedactError> {
        self.require_ready("add_redaction")?;
        if page_number == 0 || page_number > self.page_count() {
            warn!(
                page = page_number,
                pages = self.page_count(),
                "redaction outside the document"
            );
            return Ok(false);
        }
        Ok(self
            .store
            .add(page_number - 1, rect, surface_width, surface_height))
    }

    /// Remove the newest redaction on the current page.
    pub fn undo_last(&mut self) -> Result<Option<Redaction>, RedactError> {
        self.require_ready("undo_last")?;
        let removed = self.store.undo_last(self.current_page - 1);
        debug!(page = self.current_page, removed = removed.is_some(), "undo");
        Ok(removed)
    }

    pub fn select_mode(&mut self, mode: RedactionMode) -> Result<(), RedactError> {
        match mode {
            RedactionMode::Rectangle => {
                self.mode = mode;
                Ok(())
            }
            RedactionMode::TextDetection => Err(RedactError::UnsupportedMode(mode.to_string())),
        }
    }

    pub fn set_remove_encryption(&mut self, remove: bool) {
        self.remove_encryption = remove;
    }

    /// Snapshot everything an export needs.
    pub fn export_job(&self) -> Result<BurnJob, RedactError> {
        self.require_ready("export")?;
        let (Some(source), Some(kind)) = (self.source.clone(), self.kind) else {
            return Err(RedactError::InvalidState {
                operation: "export",
                state: self.state.name(),
            });
        };
        Ok(BurnJob {
            source,
            kind,
            redactions: self.store.iter().copied().collect(),
            password: self.password.clone(),
            remove_encryption: self.remove_encryption,
            options: self.options.clone(),
        })
    }
}
