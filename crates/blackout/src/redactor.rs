//! Async driver around a [`DocumentSession`].
//!
//! Every initiating call (`begin_load`, `begin_unlock`, `clear`) bumps a
//! generation counter. Blocking work runs on tokio's blocking pool through a
//! ticket that remembers the generation it was issued under; the matching
//! `finish_*` call applies the result only if no newer initiating call has
//! happened since, and reports [`RedactError::Superseded`] otherwise. Tickets
//! own clones of the shared source buffer, so the driver can be cleared or
//! reloaded while they run. At most one export is in flight per generation.
//!
//! ```ignore
//! let mut redactor = Redactor::new(RedactOptions::default());
//! match redactor.load(SourceFile::new("scan.pdf", bytes)).await? {
//!     LoadStatus::Ready { .. } => {}
//!     LoadStatus::PasswordRequired => {
//!         redactor.submit_password(Password::new("secret"), true).await?;
//!     }
//! }
//! redactor.add_redaction_from_drag(drag, display_size)?;
//! let file = redactor.export().await?;
//! ```

use blackout_core::{
    Display, ExportedFile, Password, Rect, RedactError, RedactOptions, Redaction, RedactionMode,
    Size, SourceFile, Surface,
};
use tracing::{debug, warn};

use crate::export::BurnJob;
use crate::loader::LoadedDocument;
use crate::render::{DefaultRenderer, PageRenderer, RenderMetrics, RenderSurface};
use crate::session::{DecodeJob, DocumentSession, RenderRequest, Step};

/// Where a load or unlock ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Ready { page_count: usize },
    PasswordRequired,
}

/// Run blocking work off the async threads.
async fn blocking<T, F>(work: F, on_panic: fn(String) -> RedactError) -> Result<T, RedactError>
where
    F: FnOnce() -> Result<T, RedactError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(e) => Err(on_panic(e.to_string())),
    }
}

/// An in-flight load.
#[derive(Debug)]
pub struct LoadTicket {
    generation: u64,
    job: DecodeJob,
}

/// Result of [`LoadTicket::run`], to hand to [`Redactor::finish_load`].
#[derive(Debug)]
pub struct LoadCompletion {
    generation: u64,
    probe: Result<bool, RedactError>,
    decoded: Option<Result<LoadedDocument, RedactError>>,
}

impl LoadTicket {
    /// Probe, then decode unless the document needs a password.
    pub async fn run(self) -> LoadCompletion {
        let probe_job = self.job.clone();
        let probe = blocking(move || probe_job.probe(), RedactError::CorruptDocument).await;
        let decoded = match probe {
            Ok(false) => {
                let job = self.job;
                Some(blocking(move || job.decode(), RedactError::CorruptDocument).await)
            }
            _ => None,
        };
        LoadCompletion {
            generation: self.generation,
            probe,
            decoded,
        }
    }
}

/// An in-flight password attempt.
#[derive(Debug)]
pub struct UnlockTicket {
    generation: u64,
    job: DecodeJob,
}

/// Result of [`UnlockTicket::run`].
#[derive(Debug)]
pub struct UnlockCompletion {
    generation: u64,
    decoded: Result<LoadedDocument, RedactError>,
}

impl UnlockTicket {
    pub async fn run(self) -> UnlockCompletion {
        let job = self.job;
        UnlockCompletion {
            generation: self.generation,
            decoded: blocking(move || job.decode(), RedactError::CorruptDocument).await,
        }
    }
}

/// An in-flight export.
#[derive(Debug)]
pub struct ExportTicket {
    generation: u64,
    job: BurnJob,
}

/// Result of [`ExportTicket::run`].
#[derive(Debug)]
pub struct ExportCompletion {
    generation: u64,
    result: Result<ExportedFile, RedactError>,
}

impl ExportTicket {
    pub async fn run(self) -> ExportCompletion {
        let job = self.job;
        ExportCompletion {
            generation: self.generation,
            result: blocking(move || job.run(), RedactError::BurnFailure).await,
        }
    }
}

/// Owns the live session and a renderer.
#[derive(Debug)]
pub struct Redactor<R = DefaultRenderer> {
    session: DocumentSession,
    renderer: R,
    generation: u64,
    /// Generation of the export ticket not yet passed to `finish_export`.
    exporting: Option<u64>,
}

impl Default for Redactor<DefaultRenderer> {
    fn default() -> Self {
        Self::new(RedactOptions::default())
    }
}

impl Redactor<DefaultRenderer> {
    pub fn new(options: RedactOptions) -> Self {
        let renderer = DefaultRenderer::new(&options);
        Self::with_renderer(options, renderer)
    }
}

impl<R: PageRenderer> Redactor<R> {
    pub fn with_renderer(options: RedactOptions, renderer: R) -> Self {
        Self {
            session: DocumentSession::new(options),
            renderer,
            generation: 0,
            exporting: None,
        }
    }

    pub fn session(&self) -> &DocumentSession {
        &self.session
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Run a by-value transition in place.
    fn step<T>(
        &mut self,
        transition: impl FnOnce(DocumentSession) -> Step<T>,
    ) -> Result<T, RedactError> {
        let placeholder = DocumentSession::new(self.session.options().clone());
        let session = std::mem::replace(&mut self.session, placeholder);
        let (next, outcome) = transition(session);
        self.session = next;
        outcome
    }

    fn ensure_current(&self, generation: u64, what: &'static str) -> Result<(), RedactError> {
        if generation == self.generation {
            return Ok(());
        }
        warn!(
            what,
            generation,
            current = self.generation,
            "discarding result of a superseded request"
        );
        Err(RedactError::Superseded)
    }

    fn render(&mut self, request: RenderRequest) -> Result<RenderMetrics, RedactError> {
        let Some(document) = self.session.document() else {
            return Err(RedactError::InvalidState {
                operation: "render",
                state: self.session.state().name(),
            });
        };
        let mut surface = RenderSurface::new();
        let metrics = match self.renderer.render_page(document, &request.page, &mut surface) {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(page = request.page_number(), error = %e, "render failed");
                return Err(e);
            }
        };
        self.session.record_render(request.page.index, surface, metrics);
        debug!(
            page = request.page_number(),
            width = metrics.surface_width,
            height = metrics.surface_height,
            "rendered"
        );
        Ok(metrics)
    }

    fn ready_status(&self) -> LoadStatus {
        LoadStatus::Ready {
            page_count: self.session.page_count(),
        }
    }

    // --- load ---

    /// Start loading `file`. Supersedes any in-flight load, unlock, or export.
    pub fn begin_load(&mut self, file: SourceFile) -> Result<LoadTicket, RedactError> {
        self.generation += 1;
        let job = self.step(|s| s.load(file))?;
        Ok(LoadTicket {
            generation: self.generation,
            job,
        })
    }

    /// Apply a finished load and render the first page.
    ///
    /// A render failure is returned as an error but leaves the session ready.
    pub fn finish_load(&mut self, done: LoadCompletion) -> Result<LoadStatus, RedactError> {
        self.ensure_current(done.generation, "load")?;
        if !self.step(|s| s.probed(done.probe))? {
            return Ok(LoadStatus::PasswordRequired);
        }
        let decoded = done
            .decoded
            .unwrap_or_else(|| Err(RedactError::CorruptDocument("document was not decoded".into())));
        let request = self.step(|s| s.decoded(decoded))?;
        self.render(request)?;
        Ok(self.ready_status())
    }

    pub async fn load(&mut self, file: SourceFile) -> Result<LoadStatus, RedactError> {
        let ticket = self.begin_load(file)?;
        let done = ticket.run().await;
        self.finish_load(done)
    }

    // --- unlock ---

    pub fn begin_unlock(
        &mut self,
        password: Password,
        remove_encryption: bool,
    ) -> Result<UnlockTicket, RedactError> {
        let job = self.step(|s| s.submit_password(password, remove_encryption))?;
        self.generation += 1;
        Ok(UnlockTicket {
            generation: self.generation,
            job,
        })
    }

    /// Apply a password attempt. A wrong password yields
    /// [`RedactError::DecryptionFailed`] and the session asks again.
    pub fn finish_unlock(&mut self, done: UnlockCompletion) -> Result<LoadStatus, RedactError> {
        self.ensure_current(done.generation, "unlock")?;
        let request = self.step(|s| s.decoded(done.decoded))?;
        self.render(request)?;
        Ok(self.ready_status())
    }

    pub async fn submit_password(
        &mut self,
        password: Password,
        remove_encryption: bool,
    ) -> Result<LoadStatus, RedactError> {
        let ticket = self.begin_unlock(password, remove_encryption)?;
        let done = ticket.run().await;
        self.finish_unlock(done)
    }

    pub fn cancel_password(&mut self) -> Result<(), RedactError> {
        self.generation += 1;
        self.step(DocumentSession::cancel_password)
    }

    /// Drop the document and redactions; in-flight results become stale.
    pub fn clear(&mut self) {
        self.generation += 1;
        let placeholder = DocumentSession::new(self.session.options().clone());
        self.session = std::mem::replace(&mut self.session, placeholder).clear();
    }

    // --- navigation and editing ---

    /// Go to 1-based page `number` and render it. Returns whether the page
    /// changed.
    pub fn go_to_page(&mut self, number: usize) -> Result<bool, RedactError> {
        match self.step(|s| s.go_to_page(number))? {
            Some(request) => {
                self.render(request)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Render the current page again, e.g. after a render failure.
    pub fn render_current(&mut self) -> Result<RenderMetrics, RedactError> {
        let request = self
            .session
            .render_request()
            .ok_or(RedactError::InvalidState {
                operation: "render",
                state: self.session.state().name(),
            })?;
        self.render(request)
    }

    /// Current page with the pending-redaction overlay.
    pub fn view(&self) -> Option<RenderSurface> {
        self.session.view()
    }

    pub fn add_redaction_from_drag(
        &mut self,
        drag: Rect<Display>,
        display: Size<Display>,
    ) -> Result<bool, RedactError> {
        self.session.add_redaction_from_drag(drag, display)
    }

    pub fn add_surface_redaction(
        &mut self,
        page_number: usize,
        rect: Rect<Surface>,
        surface_width: u32,
        surface_height: u32,
    ) -> Result<bool, RedactError> {
        self.session
            .add_surface_redaction(page_number, rect, surface_width, surface_height)
    }

    pub fn set_remove_encryption(&mut self, remove: bool) {
        self.session.set_remove_encryption(remove);
    }

    pub fn undo_last(&mut self) -> Result<Option<Redaction>, RedactError> {
        self.session.undo_last()
    }

    pub fn select_mode(&mut self, mode: RedactionMode) -> Result<(), RedactError> {
        self.session.select_mode(mode)
    }

    // --- export ---

    /// Snapshot the session for export. Does not supersede anything; fails
    /// with [`RedactError::InvalidState`] while another export of the current
    /// generation is outstanding.
    pub fn begin_export(&mut self) -> Result<ExportTicket, RedactError> {
        if self.exporting == Some(self.generation) {
            return Err(RedactError::InvalidState {
                operation: "export",
                state: "exporting",
            });
        }
        let job = self.session.export_job()?;
        self.exporting = Some(self.generation);
        Ok(ExportTicket {
            generation: self.generation,
            job,
        })
    }

    pub fn finish_export(&mut self, done: ExportCompletion) -> Result<ExportedFile, RedactError> {
        if self.exporting == Some(done.generation) {
            self.exporting = None;
        }
        self.ensure_current(done.generation, "export")?;
        done.result
    }

    pub async fn export(&mut self) -> Result<ExportedFile, RedactError> {
        let done = self.begin_export()?.run().await;
        self.finish_export(done)
    }
}
