//! Public client: configuration slot plus the async and blocking harmonize calls

use crate::config::{ConfigUpdate, Settings};
use crate::context::OperationContext;
use crate::error::{Error, Result};
use crate::job::{self, PreparedJob};
use crate::logging::{Logger, log_event};
use crate::payload;
use crate::transport::{HttpTransport, Transport};
use crate::types::{HarmonizationResult, HarmonizeRequest};
use crate::validation;
use rand::Rng;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tokio::runtime::Runtime;

/// Settings and the logger built from them, published together
#[derive(Debug)]
struct Pinned {
    settings: Arc<Settings>,
    logger: Logger,
}

impl Pinned {
    fn new(settings: Settings) -> Self {
        let logger = Logger::new(settings.log_level);
        Self {
            settings: Arc::new(settings),
            logger,
        }
    }
}

/// Runtime used by the blocking facade, created on first use
#[derive(Default)]
struct BlockingRuntime {
    cell: OnceLock<Runtime>,
}

impl BlockingRuntime {
    fn get(&self) -> Result<&Runtime> {
        if let Some(runtime) = self.cell.get() {
            return Ok(runtime);
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("netrias-client")
            .build()?;
        // A racing thread may have won; its runtime is kept and ours dropped
        Ok(self.cell.get_or_init(|| runtime))
    }
}

impl Drop for BlockingRuntime {
    fn drop(&mut self) {
        // The last client clone may be dropped inside an async task, where a
        // plain runtime drop would panic
        if let Some(runtime) = self.cell.take() {
            runtime.shutdown_background();
        }
    }
}

/// Client for the harmonization service
///
/// Cheap to clone; clones share one configuration slot, one transport and one
/// blocking runtime. Each call pins the configuration current at its start, so
/// [`configure`](Self::configure) never affects a call already in flight.
///
/// # Example
///
/// ```no_run
/// use netrias_client::{ConfigUpdate, HarmonizationClient, HarmonizeRequest};
/// use std::time::Duration;
///
/// # async fn run() -> netrias_client::Result<()> {
/// let client = HarmonizationClient::new("my-api-key")?;
/// client.configure(ConfigUpdate {
///     timeout: Some(Duration::from_secs(600)),
///     ..Default::default()
/// })?;
///
/// let result = client
///     .harmonize_async(HarmonizeRequest::new("sample.csv", std::path::Path::new("manifest.json")))
///     .await?;
/// println!("{}: {}", result.status, result.description);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HarmonizationClient {
    state: Arc<RwLock<Arc<Pinned>>>,
    transport: Arc<dyn Transport>,
    runtime: Arc<BlockingRuntime>,
}

impl fmt::Debug for HarmonizationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarmonizationClient")
            .field("settings", &self.settings())
            .finish_non_exhaustive()
    }
}

impl HarmonizationClient {
    /// Create a client using the HTTP transport
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_transport(api_key, Arc::new(HttpTransport::new()?))
    }

    /// Create a client using a custom transport
    pub fn with_transport(api_key: impl Into<String>, transport: Arc<dyn Transport>) -> Result<Self> {
        let settings = Settings::new(api_key)?;
        Ok(Self {
            state: Arc::new(RwLock::new(Arc::new(Pinned::new(settings)))),
            transport,
            runtime: Arc::new(BlockingRuntime::default()),
        })
    }

    /// Apply `update` to the current settings
    ///
    /// The new settings and logger replace the old pair in one step. On error
    /// the current settings stay in effect.
    pub fn configure(&self, update: ConfigUpdate) -> Result<()> {
        let mut slot = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let next = match slot.settings.apply(&update) {
            Ok(next) => Pinned::new(next),
            Err(e) => {
                log_event!(slot.logger, ERROR, error = %e, code = e.error_code(), "configuration rejected");
                return Err(e);
            }
        };

        log_event!(
            next.logger,
            INFO,
            endpoint = %next.settings.harmonization_url,
            timeout_secs = next.settings.timeout.as_secs_f64(),
            log_level = %next.settings.log_level,
            "client configured"
        );
        *slot = Arc::new(next);
        Ok(())
    }

    /// The settings new calls will use
    pub fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.pinned().settings)
    }

    fn pinned(&self) -> Arc<Pinned> {
        Arc::clone(&*self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn operation_context(&self) -> OperationContext {
        let pinned = self.pinned();
        OperationContext::new(Arc::clone(&pinned.settings), pinned.logger)
    }

    /// Harmonize one file, waiting for the job to finish
    ///
    /// Returns `Ok` with a [`HarmonizationResult`] whenever the job ran to a
    /// business outcome (succeeded, failed, or timed out). Local problems and
    /// transport faults are errors.
    ///
    /// Dropping the returned future cancels the open request and removes any
    /// partial download.
    pub async fn harmonize_async(&self, request: HarmonizeRequest) -> Result<HarmonizationResult> {
        let ctx = self.operation_context();
        let outcome = self.run(&ctx, request).await;
        if let Err(e) = &outcome {
            log_event!(
                ctx.logger(),
                ERROR,
                error = %e,
                code = e.error_code(),
                elapsed_secs = ctx.elapsed().as_secs_f64(),
                "harmonization failed"
            );
        }
        outcome
    }

    /// Blocking form of [`harmonize_async`](Self::harmonize_async)
    ///
    /// Runs the same workflow on a runtime owned by the client. Must not be
    /// called from inside a tokio runtime; doing so returns
    /// [`Error::BlockingInAsyncContext`].
    pub fn harmonize(&self, request: HarmonizeRequest) -> Result<HarmonizationResult> {
        let runtime = match self.blocking_runtime() {
            Ok(runtime) => runtime,
            Err(err) => {
                log_event!(
                    self.pinned().logger,
                    ERROR,
                    error = %err,
                    code = err.error_code(),
                    "harmonization failed"
                );
                return Err(err);
            }
        };
        runtime.block_on(self.harmonize_async(request))
    }

    fn blocking_runtime(&self) -> Result<&Runtime> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(Error::BlockingInAsyncContext);
        }
        self.runtime.get()
    }

    async fn run(&self, ctx: &OperationContext, request: HarmonizeRequest) -> Result<HarmonizationResult> {
        log_event!(
            ctx.logger(),
            INFO,
            source = %request.source_path.display(),
            endpoint = %ctx.settings().harmonization_url,
            "harmonization requested"
        );

        let prepared = tokio::task::spawn_blocking(move || prepare(request))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(format!("preparation task failed: {e}"))))??;

        job::run_job(ctx, self.transport.as_ref(), prepared).await
    }
}

/// Validate inputs, build the payload and pick the output path
///
/// The output location is resolved last since it may create directories.
fn prepare(request: HarmonizeRequest) -> Result<PreparedJob> {
    let HarmonizeRequest {
        source_path,
        manifest,
        output_path,
    } = request;

    validation::validate_source(&source_path)?;
    validation::validate_manifest(&manifest)?;
    let payload = payload::build_harmonize_payload(&source_path, &manifest)?;
    let output_path = validation::resolve_output_path(output_path.as_deref(), &source_path)?;

    Ok(PreparedJob {
        payload,
        output_path,
        idempotency_key: idempotency_key(),
    })
}

fn idempotency_key() -> String {
    format!("{:032x}", rand::thread_rng().r#gen::<u128>())
}
