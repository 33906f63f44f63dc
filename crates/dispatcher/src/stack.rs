//! Stack compilation and caching
//!
//! A stack is the ordered stage list for one kind of message. Inbound stacks
//! depend on the action and its options, so they are compiled on first use
//! and cached by a canonical key. Cached stacks are shared: every lookup of
//! a key returns the same allocation.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use contracts::{Action, DispatchSettings, Options, Request, StageRef};
use serde_json::Value;
use tracing::debug;

use crate::benchmark::BenchmarkTracker;
use crate::catalog::{ResolvedCatalog, StageRole};
use crate::events::{DispatchEvent, EventBus};
use crate::registry::Protocol;
use crate::stages::{BenchmarkEnd, BenchmarkStart, SystemTransform};

/// Shared, immutable stage list
pub type Stack = Arc<[StageRef]>;

pub const OUTBOUND_KEY: &str = "system:outbound";

/// Cache key of an inbound stack
///
/// `on`/`off` stacks never depend on options. Other actions key on the
/// options serialized with sorted object keys.
pub fn key_for(action: Action, options: Option<&Options>) -> String {
    match action {
        Action::On | Action::Off => action.as_str().to_string(),
        _ => {
            let mut key = format!("{}_", action.as_str());
            if let Some(options) = options {
                write_object(options, &mut key);
            }
            key
        }
    }
}

/// Cache key of the system stack for `protocol`
pub fn system_key(protocol: &Protocol) -> String {
    format!("system:transform:{}", protocol.version())
}

/// JSON text of `value` with object keys in sorted order
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

fn write_object(map: &Options, out: &mut String) {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}:", Value::String(key.clone()));
        write_value(value, out);
    }
    out.push('}');
}

/// Builds stage lists from the settings flags and the stage catalog
pub struct StackCompiler {
    settings: DispatchSettings,
    catalog: ResolvedCatalog,
    inbound_layers: Vec<StageRef>,
    outbound_layers: Vec<StageRef>,
    benchmark_start: StageRef,
    benchmark_end: StageRef,
}

impl StackCompiler {
    pub fn new(
        settings: DispatchSettings,
        catalog: ResolvedCatalog,
        inbound_layers: Vec<StageRef>,
        outbound_layers: Vec<StageRef>,
        benchmarks: Arc<BenchmarkTracker>,
    ) -> Self {
        Self {
            settings,
            catalog,
            inbound_layers,
            outbound_layers,
            benchmark_start: Arc::new(BenchmarkStart::new(Arc::clone(&benchmarks))),
            benchmark_end: Arc::new(BenchmarkEnd::new(benchmarks)),
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Inbound stack for `request`
    pub fn inbound(&self, request: &Request) -> Vec<StageRef> {
        let settings = &self.settings;
        let action = request.action;
        let mut stages = self.inbound_layers.clone();

        if settings.benchmark_enabled {
            stages.push(Arc::clone(&self.benchmark_start));
        }
        if settings.logging_enabled {
            stages.push(self.catalog.get(StageRole::Log));
        }
        if settings.secure && action.requires_authorization() {
            stages.push(self.catalog.get(StageRole::Authorize));
        }
        if action == Action::RequestNonce {
            stages.push(self.catalog.get(StageRole::NonceRequest));
        }

        let roles: &[StageRole] = match action {
            Action::Set => {
                if request.no_store() {
                    &[StageRole::NoStore]
                } else if settings.secure {
                    &[StageRole::SecureStore]
                } else {
                    &[StageRole::Store]
                }
            }
            Action::Remove => &[StageRole::Remove],
            Action::Get => &[StageRole::Get],
            Action::On => &[StageRole::PrepareSubscribe, StageRole::Subscribe],
            Action::Off => &[StageRole::PrepareSubscribe, StageRole::Unsubscribe],
            Action::Describe => &[StageRole::Describe],
            Action::ConfigureSession => &[StageRole::ConfigureSession],
            Action::Login if settings.secure => &[StageRole::Login],
            Action::Login => &[StageRole::UnsecureLogin],
            Action::Disconnect => &[StageRole::Disconnect],
            Action::Ack => &[StageRole::Acknowledge],
            Action::RevokeSession => &[StageRole::RevokeSession],
            Action::RequestNonce => &[],
        };
        stages.extend(roles.iter().map(|role| self.catalog.get(*role)));

        if action.is_mutation() && !request.no_publish() {
            stages.push(self.catalog.get(StageRole::Recipients));
            stages.push(self.catalog.get(StageRole::Publish));
        }

        if settings.benchmark_enabled {
            stages.push(Arc::clone(&self.benchmark_end));
        }
        if settings.audit_active() {
            stages.push(self.catalog.get(StageRole::Audit));
        }

        stages
    }

    /// Stack run before an outbound publication is emitted
    pub fn outbound(&self) -> Vec<StageRef> {
        let mut stages = Vec::with_capacity(self.outbound_layers.len() + 1);
        if self.settings.logging_enabled {
            stages.push(self.catalog.get(StageRole::Log));
        }
        stages.extend(self.outbound_layers.iter().cloned());
        stages
    }

    /// Stack for system messages encoded by `protocol`
    pub fn system(&self, protocol: &Protocol) -> Vec<StageRef> {
        let mut stages = Vec::with_capacity(self.outbound_layers.len() + 2);
        if self.settings.logging_enabled {
            stages.push(self.catalog.get(StageRole::Log));
        }
        stages.push(Arc::new(SystemTransform::new(protocol.clone())));
        stages.extend(self.outbound_layers.iter().cloned());
        stages
    }
}

struct CacheState {
    compiler: Arc<StackCompiler>,
    entries: HashMap<String, Stack>,
}

/// Concurrent stack cache
///
/// Misses compile outside the lock. When two callers race on one key the
/// first insert wins and both observe the winner.
pub struct StackCache {
    state: RwLock<CacheState>,
    events: EventBus,
}

impl StackCache {
    pub fn new(compiler: StackCompiler, events: EventBus) -> Self {
        Self {
            state: RwLock::new(CacheState {
                compiler: Arc::new(compiler),
                entries: HashMap::new(),
            }),
            events,
        }
    }

    pub fn inbound(&self, request: &Request) -> Stack {
        let key = key_for(request.action, request.options.as_ref());
        self.get_or_compile(key, |compiler| compiler.inbound(request))
    }

    pub fn outbound(&self) -> Stack {
        self.get_or_compile(OUTBOUND_KEY.to_string(), StackCompiler::outbound)
    }

    pub fn system(&self, protocol: &Protocol) -> Stack {
        self.get_or_compile(system_key(protocol), |compiler| compiler.system(protocol))
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.read().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn compiler(&self) -> Arc<StackCompiler> {
        Arc::clone(&self.read().compiler)
    }

    /// Swap in a new compiler and drop every cached stack
    ///
    /// Returns the number of dropped stacks. Compilations still running
    /// against the old compiler are not cached.
    pub fn reconfigure(&self, compiler: StackCompiler) -> usize {
        let mut state = self.write();
        let dropped = state.entries.len();
        state.compiler = Arc::new(compiler);
        state.entries.clear();
        drop(state);

        observability::record_stack_cache_size(0);
        self.events.emit(DispatchEvent::StacksInvalidated { dropped });
        dropped
    }

    fn get_or_compile<F>(&self, key: String, compile: F) -> Stack
    where
        F: FnOnce(&StackCompiler) -> Vec<StageRef>,
    {
        let compiler = {
            let state = self.read();
            if let Some(stack) = state.entries.get(&key) {
                return Arc::clone(stack);
            }
            Arc::clone(&state.compiler)
        };

        let compiled: Stack = compile(compiler.as_ref()).into();

        let mut state = self.write();
        if !Arc::ptr_eq(&state.compiler, &compiler) {
            debug!(key = %key, "discarding stack compiled before reconfiguration");
            return compiled;
        }

        let mut inserted = false;
        let stack = Arc::clone(state.entries.entry(key.clone()).or_insert_with(|| {
            inserted = true;
            Arc::clone(&compiled)
        }));
        let size = state.entries.len();
        drop(state);

        if inserted {
            let stages: Vec<String> = stack.iter().map(|s| s.name().to_string()).collect();
            debug!(key = %key, stages = ?stages, "stack compiled");
            observability::record_stack_cache_size(size);
            self.events.emit(DispatchEvent::StackCompiled { key, stages });
        }
        stack
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
