//! Dispatch service
//!
//! Front door for inbound requests, outbound publications and system
//! messages. Resolves the session's protocol adapter, runs the matching
//! compiled stack and encodes the outcome through the adapter.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use contracts::{
    DispatchError, DispatchSettings, ErrorReporter, Message, ProtocolAdapter, Severity, StageRef,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::benchmark::{BenchmarkSnapshot, BenchmarkTracker};
use crate::catalog::{StageCatalog, StageRole};
use crate::error::DispatcherError;
use crate::events::{DispatchEvent, EventBus};
use crate::executor::{execute, PipelineFailure};
use crate::health::HealthMonitor;
use crate::publication::AcknowledgementRegistry;
use crate::registry::{Protocol, ProtocolRegistry, ProtocolTable};
use crate::stack::{Stack, StackCache, StackCompiler};
use crate::stages::{AcknowledgeStage, EncodeResponse, LogStage, NoStore};

const RESPOND_AREA: &str = "DispatchService::respond";

/// Read-only service statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchStats {
    /// Registered protocol keys
    pub protocols: Vec<String>,
    /// Resolution attempts per session protocol string
    pub protocol_counts: BTreeMap<String, u64>,
    pub stack_cache_size: usize,
    pub benchmarks: BTreeMap<String, BenchmarkSnapshot>,
}

/// Builder for [`DispatchService`]
pub struct DispatchServiceBuilder {
    settings: DispatchSettings,
    table: ProtocolTable,
    catalog: StageCatalog,
    inbound_layers: Vec<StageRef>,
    outbound_layers: Vec<StageRef>,
    overrides: HashMap<String, Arc<dyn ProtocolAdapter>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
    acknowledgements: Option<Arc<AcknowledgementRegistry>>,
    events: EventBus,
}

impl DispatchServiceBuilder {
    pub fn new(settings: DispatchSettings, table: ProtocolTable) -> Self {
        let events = EventBus::new(settings.event_capacity);
        Self {
            settings,
            table,
            catalog: StageCatalog::new(),
            inbound_layers: Vec::new(),
            outbound_layers: Vec::new(),
            overrides: HashMap::new(),
            reporter: None,
            acknowledgements: None,
            events,
        }
    }

    /// Collaborator stages by role
    pub fn catalog(mut self, catalog: StageCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Stage prepended to every inbound stack
    pub fn inbound_layer(mut self, stage: StageRef) -> Self {
        self.inbound_layers.push(stage);
        self
    }

    /// Stage appended to outbound, system and response pipelines
    pub fn outbound_layer(mut self, stage: StageRef) -> Self {
        self.outbound_layers.push(stage);
        self
    }

    /// Register `adapter` under `key`, taking precedence over the factory table
    pub fn protocol(mut self, key: impl Into<String>, adapter: Arc<dyn ProtocolAdapter>) -> Self {
        self.overrides.insert(key.into(), adapter);
        self
    }

    /// Error sink for failed response encodings, defaults to a [`HealthMonitor`]
    pub fn error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn acknowledgements(mut self, registry: Arc<AcknowledgementRegistry>) -> Self {
        self.acknowledgements = Some(registry);
        self
    }

    /// Subscribe before building to observe adapter initialization
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    /// Initialize the protocol registry and the stack cache
    ///
    /// # Errors
    /// - `InvalidSettings` for an unusable protocol family or version
    /// - `MissingFactory`/`AdapterInit` from the registry
    /// - `MissingStages` when the catalog lacks roles the settings need
    pub fn build(self) -> Result<DispatchService, DispatcherError> {
        let Self {
            settings,
            table,
            mut catalog,
            inbound_layers,
            outbound_layers,
            overrides,
            reporter,
            acknowledgements,
            events,
        } = self;

        check_protocol_settings(&settings)?;

        let registry =
            ProtocolRegistry::initialize(&settings.protocol, &table, overrides, &events)?;

        let benchmarks = Arc::new(BenchmarkTracker::new());
        let acknowledgements = acknowledgements.unwrap_or_default();
        let reporter = reporter.unwrap_or_else(|| Arc::new(HealthMonitor::new()));

        catalog.insert_default(StageRole::Log, Arc::new(LogStage::default()));
        catalog.insert_default(StageRole::NoStore, Arc::new(NoStore));
        catalog.insert_default(
            StageRole::Acknowledge,
            Arc::new(AcknowledgeStage::new(Arc::clone(&acknowledgements))),
        );

        let compiler = StackCompiler::new(
            settings.clone(),
            catalog.resolve(&settings)?,
            inbound_layers.clone(),
            outbound_layers.clone(),
            Arc::clone(&benchmarks),
        );
        let cache = StackCache::new(compiler, events.clone());
        let current_protocol = settings.protocol.current_key();

        info!(
            current_protocol = %current_protocol,
            secure = settings.secure,
            logging = settings.logging_enabled,
            benchmark = settings.benchmark_enabled,
            audit = settings.audit_active(),
            "dispatch service ready"
        );

        Ok(DispatchService {
            registry,
            cache,
            catalog,
            inbound_layers,
            outbound_layers,
            benchmarks,
            acknowledgements,
            reporter,
            events,
            current_protocol,
        })
    }
}

fn check_protocol_settings(settings: &DispatchSettings) -> Result<(), DispatcherError> {
    let protocol = &settings.protocol;
    if protocol.family.is_empty() || protocol.family.contains(['.', '_']) {
        return Err(DispatcherError::invalid_settings(format!(
            "protocol family '{}' must be non-empty and contain no '.' or '_'",
            protocol.family
        )));
    }
    if protocol.current_version == 0 {
        return Err(DispatcherError::invalid_settings(
            "protocol version must be at least 1",
        ));
    }
    Ok(())
}

/// The message-dispatch core
pub struct DispatchService {
    registry: ProtocolRegistry,
    cache: StackCache,
    catalog: StageCatalog,
    inbound_layers: Vec<StageRef>,
    outbound_layers: Vec<StageRef>,
    benchmarks: Arc<BenchmarkTracker>,
    acknowledgements: Arc<AcknowledgementRegistry>,
    reporter: Arc<dyn ErrorReporter>,
    events: EventBus,
    current_protocol: String,
}

impl DispatchService {
    pub fn builder(settings: DispatchSettings, table: ProtocolTable) -> DispatchServiceBuilder {
        DispatchServiceBuilder::new(settings, table)
    }

    /// Process a raw client request and encode the response
    ///
    /// Stage failures are encoded through the adapter's `fail` with the
    /// root cause in `message.error`. An unknown protocol is encoded as
    /// not-found through the earliest adapter without running any stage.
    ///
    /// # Errors
    /// Only when encoding the response itself fails; the error is also
    /// handed to the error reporter.
    #[instrument(
        name = "dispatch_in",
        skip_all,
        fields(message_id = %message.id, protocol = %message.session.protocol)
    )]
    pub async fn process_message_in(&self, mut message: Message) -> Result<Message, DispatchError> {
        let Some(protocol) = self.registry.resolve(&message.session.protocol) else {
            let error = DispatchError::not_found(
                format!("unknown inbound protocol: {}", message.session.protocol),
                "protocol",
            );
            warn!(error = %error, "rejecting message");
            observability::record_message_processed("inbound", "unknown", "failure");

            message.error = Some(error);
            let fallback = self.registry.earliest().clone();
            return self.encode_direct(&fallback, message, true).await;
        };

        match self.run_inbound(&protocol, message).await {
            Ok(message) => {
                record("inbound", &message, "success");
                self.respond(&protocol, message, false).await
            }
            Err(failure) => {
                let PipelineFailure {
                    message,
                    error,
                    stage,
                } = failure;
                let mut message = *message;
                debug!(stage = %stage, error = %error, "inbound pipeline failed");
                record("inbound", &message, "failure");

                message.error = Some(error);
                self.respond(&protocol, message, true).await
            }
        }
    }

    async fn run_inbound(
        &self,
        protocol: &Protocol,
        mut message: Message,
    ) -> Result<Message, PipelineFailure> {
        if let Err(e) = protocol.adapter().transform_in(&mut message).await {
            return Err(PipelineFailure::new(message, e, "transform-in"));
        }
        let stack = match message.request() {
            Ok(request) => self.cache.inbound(request),
            Err(e) => return Err(PipelineFailure::new(message, e, "transform-in")),
        };
        execute(&stack, message).await
    }

    /// Encode the outcome, through the outbound layers when configured
    async fn respond(
        &self,
        protocol: &Protocol,
        message: Message,
        failed: bool,
    ) -> Result<Message, DispatchError> {
        if self.outbound_layers.is_empty() {
            return self.encode_direct(protocol, message, failed).await;
        }

        let encode: StageRef = if failed {
            Arc::new(EncodeResponse::fail(protocol.clone()))
        } else {
            Arc::new(EncodeResponse::success(protocol.clone()))
        };
        let stages: Vec<StageRef> = std::iter::once(encode)
            .chain(self.outbound_layers.iter().cloned())
            .collect();

        execute(&stages, message)
            .await
            .map_err(|failure| self.report_respond_failure(failure.error))
    }

    async fn encode_direct(
        &self,
        protocol: &Protocol,
        mut message: Message,
        failed: bool,
    ) -> Result<Message, DispatchError> {
        let adapter = protocol.adapter();
        let encoded = if failed {
            adapter.fail(&mut message).await
        } else {
            adapter.success(&mut message).await
        };
        match encoded {
            Ok(()) => Ok(message),
            Err(e) => Err(self.report_respond_failure(e)),
        }
    }

    fn report_respond_failure(&self, error: DispatchError) -> DispatchError {
        self.reporter.report(&error, RESPOND_AREA, Severity::Medium);
        error
    }

    /// Encode an outbound publication and emit it to the message's session
    ///
    /// # Errors
    /// Not-found for an unknown protocol, otherwise the first transform,
    /// stage or emit failure
    #[instrument(
        name = "dispatch_out",
        skip_all,
        fields(message_id = %message.id, protocol = %message.session.protocol)
    )]
    pub async fn process_message_out(&self, mut message: Message) -> Result<Message, DispatchError> {
        let protocol = self.resolve_or_not_found(&message, "outbound")?;
        let adapter = protocol.adapter();

        adapter.transform_out(&mut message).await?;
        let stack = self.cache.outbound();
        let message = match execute(&stack, message).await {
            Ok(message) => message,
            Err(failure) => {
                record("outbound", &failure.message, "failure");
                return Err(failure.error);
            }
        };

        adapter.emit(&message, &message.session).await?;
        record("outbound", &message, "success");
        Ok(message)
    }

    /// Run the system stack for the message's protocol
    ///
    /// # Errors
    /// Not-found for an unknown protocol, otherwise the first stage failure
    #[instrument(
        name = "dispatch_system",
        skip_all,
        fields(message_id = %message.id, protocol = %message.session.protocol)
    )]
    pub async fn process_system(&self, message: Message) -> Result<Message, DispatchError> {
        let protocol = self.resolve_or_not_found(&message, "system")?;
        let stack = self.cache.system(&protocol);
        match execute(&stack, message).await {
            Ok(message) => {
                record("system", &message, "success");
                Ok(message)
            }
            Err(failure) => {
                record("system", &failure.message, "failure");
                Err(failure.error)
            }
        }
    }

    fn resolve_or_not_found(
        &self,
        message: &Message,
        direction: &str,
    ) -> Result<Protocol, DispatchError> {
        self.registry.resolve(&message.session.protocol).ok_or_else(|| {
            observability::record_message_processed(direction, "unknown", "failure");
            DispatchError::not_found(
                format!(
                    "unknown {direction} protocol: {}",
                    message.session.protocol
                ),
                "protocol",
            )
        })
    }

    /// Current statistics; reading them changes nothing
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            protocols: self.registry.versions(),
            protocol_counts: self.registry.usage(),
            stack_cache_size: self.cache.len(),
            benchmarks: self.benchmarks.snapshot_all(),
        }
    }

    /// `<family>_<version>` of this build
    pub fn current_protocol(&self) -> &str {
        &self.current_protocol
    }

    pub fn settings(&self) -> DispatchSettings {
        self.cache.compiler().settings().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    pub fn registry(&self) -> &ProtocolRegistry {
        &self.registry
    }

    pub fn acknowledgements(&self) -> &Arc<AcknowledgementRegistry> {
        &self.acknowledgements
    }

    /// Inbound stack for `request`, compiling and caching it on first use
    pub fn inbound_stack(&self, request: &contracts::Request) -> Stack {
        self.cache.inbound(request)
    }

    /// Apply new stage flags and drop every cached stack
    ///
    /// Returns the number of dropped stacks.
    ///
    /// # Errors
    /// - `InvalidSettings` when the protocol settings change; the registry
    ///   is fixed at build time
    /// - `MissingStages` when the catalog cannot serve the new flags
    pub fn reconfigure(&self, settings: DispatchSettings) -> Result<usize, DispatcherError> {
        let current = self.cache.compiler();
        if settings.protocol != current.settings().protocol {
            return Err(DispatcherError::invalid_settings(
                "protocol settings cannot change after build",
            ));
        }

        let compiler = StackCompiler::new(
            settings.clone(),
            self.catalog.resolve(&settings)?,
            self.inbound_layers.clone(),
            self.outbound_layers.clone(),
            Arc::clone(&self.benchmarks),
        );
        let dropped = self.cache.reconfigure(compiler);
        info!(
            dropped,
            secure = settings.secure,
            logging = settings.logging_enabled,
            benchmark = settings.benchmark_enabled,
            "dispatch service reconfigured"
        );
        Ok(dropped)
    }
}

impl fmt::Debug for DispatchService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchService")
            .field("current_protocol", &self.current_protocol)
            .field("registry", &self.registry)
            .field("stack_cache_size", &self.cache.len())
            .finish_non_exhaustive()
    }
}

fn record(direction: &str, message: &Message, outcome: &str) {
    let action = message.action().map_or("unknown", |a| a.as_str());
    observability::record_message_processed(direction, action, outcome);
}
