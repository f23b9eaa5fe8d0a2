//! Office → PDF rendering through a headless LibreOffice process.
//!
//! Every call waits for a slot at the admission gate. A slot owns a private
//! LibreOffice user profile, which is what lets several `soffice` processes
//! run side by side. The input is written into a per-job temp workspace that
//! is removed on every exit path, including timeouts.

use crate::config::OfficeConfig;
use crate::error::{ConversionError, Result};
use async_channel::{bounded, Receiver, Sender};
use async_process::Command;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Route label used on tool failures before the dispatcher re-labels them.
const TOOL_ROUTE: &str = "libreoffice";

/// Renders office documents to PDF.
#[async_trait]
pub trait OfficeRenderer: Send + Sync {
    /// Convert `input` (whose format is named by `source_ext`) to PDF bytes.
    async fn render_to_pdf(&self, input: &[u8], source_ext: &str) -> Result<Vec<u8>>;

    /// Current health, if the renderer tracks any.
    fn health(&self) -> Option<OfficeHealth> {
        None
    }
}

/// A fully-resolved external command.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// The document handed to the tool.
    pub input_path: PathBuf,
    /// Where the tool is asked to write its output.
    pub output_dir: PathBuf,
}

/// What came back from the process.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stderr: String,
}

/// Runs an external command to completion.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput>;
}

/// Spawns real child processes.
///
/// The child is killed if the returned future is dropped, so a timeout
/// around [`ProcessRunner::run`] never leaves a stray `soffice` behind.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ConversionError::io(format!("spawning {}", invocation.program.display()), e)
            })?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Create a temp directory, under `base` when one is configured.
fn make_temp_dir(prefix: &str, base: Option<&Path>) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    match base {
        Some(dir) => builder.tempdir_in(dir),
        None => builder.tempdir(),
    }
    .map_err(|e| ConversionError::io("creating temp directory", e))
}

/// One admission-gate slot and the LibreOffice profile it owns.
#[derive(Debug)]
struct ProfileSlot {
    id: usize,
    profile_dir: TempDir,
}

impl ProfileSlot {
    fn new(id: usize, base: Option<&Path>) -> Result<Self> {
        let profile_dir = make_temp_dir(&format!("lo-profile-{}-", id), base)?;
        debug!("Created profile slot {} at {:?}", id, profile_dir.path());
        Ok(Self { id, profile_dir })
    }

    fn profile_url(&self) -> String {
        format!("file://{}", self.profile_dir.path().display())
    }
}

/// Hands its slot back to the gate when dropped.
struct SlotGuard<'a> {
    slot: Option<ProfileSlot>,
    returns: &'a Sender<ProfileSlot>,
}

impl SlotGuard<'_> {
    fn slot(&self) -> Option<&ProfileSlot> {
        self.slot.as_ref()
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            if self.returns.try_send(slot).is_err() {
                // Only happens after shutdown closed the gate.
                debug!("Admission gate closed, dropping profile slot");
            }
        }
    }
}

/// Temp workspace for a single render.
///
/// Layout: `<workspace>/<id>.<ext>` for the input and `<workspace>/out/` for
/// the tool's output. The whole workspace goes away on drop.
struct RenderJob {
    correlation_id: Uuid,
    workspace: Option<TempDir>,
    input_path: PathBuf,
    output_dir: PathBuf,
}

impl RenderJob {
    async fn create(base: Option<&Path>, source_ext: &str, input: &[u8]) -> Result<Self> {
        let correlation_id = Uuid::new_v4();
        let workspace = make_temp_dir("doc-convert-job-", base)?;

        let input_path = workspace
            .path()
            .join(format!("{}.{}", correlation_id, source_ext));
        let output_dir = workspace.path().join("out");

        tokio::fs::create_dir(&output_dir)
            .await
            .map_err(|e| ConversionError::io("creating render output directory", e))?;
        tokio::fs::write(&input_path, input)
            .await
            .map_err(|e| ConversionError::io("writing render input", e))?;

        Ok(Self {
            correlation_id,
            workspace: Some(workspace),
            input_path,
            output_dir,
        })
    }

    /// LibreOffice names its output after the input stem.
    fn expected_output(&self) -> PathBuf {
        self.output_dir.join(format!("{}.pdf", self.correlation_id))
    }

    fn failure(&self, exit_code: Option<i32>, diagnostic: impl Into<String>) -> ConversionError {
        ConversionError::ExternalToolFailure {
            route: TOOL_ROUTE.to_string(),
            correlation_id: self.correlation_id,
            exit_code,
            diagnostic: diagnostic.into(),
        }
    }
}

impl Drop for RenderJob {
    fn drop(&mut self) {
        if let Some(workspace) = self.workspace.take() {
            let path = workspace.path().to_path_buf();
            if let Err(e) = workspace.close() {
                warn!("Failed to remove render workspace {:?}: {}", path, e);
            }
        }
    }
}

/// Health snapshot for the office renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficeHealth {
    /// Total number of gate slots.
    pub capacity: usize,
    /// Renders currently holding a slot.
    pub in_flight: usize,
    /// Slots free right now.
    pub available_slots: usize,
    /// Renders that returned a PDF.
    pub total_processed: usize,
    /// Renders that failed for any reason.
    pub total_failed: usize,
    pub is_shutdown: bool,
}

/// [`OfficeRenderer`] backed by LibreOffice.
pub struct LibreOfficeClient {
    config: OfficeConfig,
    program: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    slots_tx: Sender<ProfileSlot>,
    slots_rx: Receiver<ProfileSlot>,
    capacity: usize,
    is_shutdown: AtomicBool,
    total_processed: AtomicUsize,
    total_failed: AtomicUsize,
}

impl std::fmt::Debug for LibreOfficeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibreOfficeClient")
            .field("program", &self.program)
            .field("capacity", &self.capacity)
            .field("available_slots", &self.slots_rx.len())
            .field("conversion_timeout", &self.config.conversion_timeout)
            .finish()
    }
}

impl LibreOfficeClient {
    /// Locate `soffice` and build a client that spawns real processes.
    pub fn new(config: OfficeConfig) -> Result<Self> {
        config.validate()?;
        let program = Self::find_soffice(&config)?;
        info!("Found LibreOffice at: {:?}", program);
        Self::with_runner(config, program, Arc::new(SystemProcessRunner))
    }

    /// Build a client around an explicit program path and process runner.
    pub fn with_runner(
        config: OfficeConfig,
        program: PathBuf,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<Self> {
        config.validate()?;

        let capacity = config.max_concurrent;
        let (slots_tx, slots_rx) = bounded(capacity);
        for id in 0..capacity {
            let slot = ProfileSlot::new(id, config.temp_dir.as_deref())?;
            slots_tx
                .try_send(slot)
                .map_err(|_| ConversionError::GateClosed)?;
        }

        info!("LibreOffice client ready with {} slots", capacity);

        Ok(Self {
            config,
            program,
            runner,
            slots_tx,
            slots_rx,
            capacity,
            is_shutdown: AtomicBool::new(false),
            total_processed: AtomicUsize::new(0),
            total_failed: AtomicUsize::new(0),
        })
    }

    /// Find the soffice binary.
    pub fn find_soffice(config: &OfficeConfig) -> Result<PathBuf> {
        if let Some(ref path) = config.soffice_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(ConversionError::OfficeToolNotFound);
        }

        let candidates = [
            // macOS
            "/Applications/LibreOffice.app/Contents/MacOS/soffice",
            // Linux
            "/usr/bin/soffice",
            "/usr/lib/libreoffice/program/soffice",
            "/opt/libreoffice/program/soffice",
            // Snap (Ubuntu)
            "/snap/bin/libreoffice.soffice",
        ];

        for candidate in candidates {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Ok(path);
            }
        }

        which::which("soffice")
            .or_else(|_| which::which("libreoffice"))
            .map_err(|_| ConversionError::OfficeToolNotFound)
    }

    /// Path of the program this client runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn acquire_slot(&self) -> Result<SlotGuard<'_>> {
        let slot = self.slots_rx.recv().await?;
        Ok(SlotGuard {
            slot: Some(slot),
            returns: &self.slots_tx,
        })
    }

    fn invocation(&self, slot: &ProfileSlot, job: &RenderJob) -> ToolInvocation {
        let mut args: Vec<OsString> = [
            "--headless",
            "--invisible",
            "--nologo",
            "--nofirststartwizard",
            "--norestore",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(format!("-env:UserInstallation={}", slot.profile_url()).into());
        args.push("--convert-to".into());
        args.push("pdf".into());
        args.push("--outdir".into());
        args.push(job.output_dir.clone().into_os_string());
        args.push(job.input_path.clone().into_os_string());

        ToolInvocation {
            program: self.program.clone(),
            args,
            input_path: job.input_path.clone(),
            output_dir: job.output_dir.clone(),
        }
    }

    async fn run_job(&self, slot: &ProfileSlot, input: &[u8], source_ext: &str) -> Result<Vec<u8>> {
        let job = RenderJob::create(self.config.temp_dir.as_deref(), source_ext, input).await?;
        debug!(
            "Slot {} rendering job {} from {:?}",
            slot.id, job.correlation_id, job.input_path
        );

        let invocation = self.invocation(slot, &job);
        let limit = self.config.conversion_timeout;
        let output = match timeout(limit, self.runner.run(&invocation)).await {
            Ok(result) => result?,
            Err(_) => {
                error!("LibreOffice job {} timed out after {:?}", job.correlation_id, limit);
                return Err(job.failure(None, format!("timed out after {:?}", limit)));
            }
        };

        if output.exit_code != Some(0) {
            error!(
                "LibreOffice job {} failed with exit code {:?}: {}",
                job.correlation_id, output.exit_code, output.stderr
            );
            return Err(job.failure(output.exit_code, output.stderr));
        }

        let pdf_path = job.expected_output();
        match tokio::fs::read(&pdf_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!(
                    "LibreOffice job {} exited cleanly but wrote no PDF: {}",
                    job.correlation_id, output.stderr
                );
                let mut diagnostic = String::from("PDF output file not found");
                if !output.stderr.trim().is_empty() {
                    diagnostic.push_str(": ");
                    diagnostic.push_str(output.stderr.trim());
                }
                Err(job.failure(Some(0), diagnostic))
            }
            Err(e) => Err(ConversionError::io("reading rendered PDF", e)),
        }
    }

    /// Current gate and counter state.
    pub fn health(&self) -> OfficeHealth {
        let available_slots = self.slots_rx.len();
        OfficeHealth {
            capacity: self.capacity,
            in_flight: self.capacity.saturating_sub(available_slots),
            available_slots,
            total_processed: self.total_processed.load(Ordering::SeqCst),
            total_failed: self.total_failed.load(Ordering::SeqCst),
            is_shutdown: self.is_shutdown.load(Ordering::SeqCst),
        }
    }

    /// Stop admitting new renders. Renders already holding a slot finish.
    pub fn shutdown(&self) {
        info!("Shutting down LibreOffice client");
        self.is_shutdown.store(true, Ordering::SeqCst);
        self.slots_rx.close();
    }
}

/// Accept an already-normalized format token as a file extension.
fn checked_extension(source_ext: &str) -> Result<&str> {
    if source_ext.is_empty() || !source_ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ConversionError::unsupported(source_ext, "pdf"));
    }
    Ok(source_ext)
}

#[async_trait]
impl OfficeRenderer for LibreOfficeClient {
    async fn render_to_pdf(&self, input: &[u8], source_ext: &str) -> Result<Vec<u8>> {
        if self.is_shutdown.load(Ordering::SeqCst) {
            return Err(ConversionError::GateClosed);
        }
        let ext = checked_extension(source_ext)?;

        let start = Instant::now();
        let guard = self.acquire_slot().await?;
        let result = match guard.slot() {
            Some(slot) => self.run_job(slot, input, ext).await,
            None => Err(ConversionError::GateClosed),
        };
        drop(guard);

        match &result {
            Ok(pdf) => {
                self.total_processed.fetch_add(1, Ordering::SeqCst);
                info!(
                    "Rendered {} input ({} bytes) to PDF ({} bytes) in {:?}",
                    ext,
                    input.len(),
                    pdf.len(),
                    start.elapsed()
                );
            }
            Err(_) => {
                self.total_failed.fetch_add(1, Ordering::SeqCst);
            }
        }
        result
    }

    fn health(&self) -> Option<OfficeHealth> {
        Some(LibreOfficeClient::health(self))
    }
}
