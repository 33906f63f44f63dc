//! Protocol registry
//!
//! Version-keyed adapter table, built once from a static factory table and
//! read-only afterwards. Session protocol strings resolve by their leading
//! token: `happn_3.1` looks up `happn_3`, the bare family name maps to the
//! earliest version.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use contracts::{ProtocolAdapter, ProtocolSettings};
use tracing::{debug, info, instrument};

use crate::error::DispatcherError;
use crate::events::{DispatchEvent, EventBus};

/// Constructor for one major protocol version
pub type ProtocolFactory = Arc<dyn Fn() -> Arc<dyn ProtocolAdapter> + Send + Sync>;

/// Static table of adapter factories, keyed by major version
#[derive(Clone, Default)]
pub struct ProtocolTable {
    factories: BTreeMap<u32, ProtocolFactory>,
}

impl ProtocolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, version: u32, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn ProtocolAdapter> + Send + Sync + 'static,
    {
        self.insert(version, factory);
        self
    }

    pub fn insert<F>(&mut self, version: u32, factory: F)
    where
        F: Fn() -> Arc<dyn ProtocolAdapter> + Send + Sync + 'static,
    {
        self.factories.insert(version, Arc::new(factory));
    }

    pub fn get(&self, version: u32) -> Option<&ProtocolFactory> {
        self.factories.get(&version)
    }

    pub fn versions(&self) -> Vec<u32> {
        self.factories.keys().copied().collect()
    }
}

impl fmt::Debug for ProtocolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolTable")
            .field("versions", &self.versions())
            .finish()
    }
}

/// A registered adapter together with the key it was registered under
#[derive(Clone)]
pub struct Protocol {
    version: Arc<str>,
    adapter: Arc<dyn ProtocolAdapter>,
}

impl Protocol {
    pub fn new(version: impl Into<Arc<str>>, adapter: Arc<dyn ProtocolAdapter>) -> Self {
        Self {
            version: version.into(),
            adapter,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn adapter(&self) -> &Arc<dyn ProtocolAdapter> {
        &self.adapter
    }
}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protocol")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Where the adapter for a registry key comes from
enum Source {
    Override(Arc<dyn ProtocolAdapter>),
    Factory(u32),
}

/// Immutable version → adapter table with usage counters
pub struct ProtocolRegistry {
    protocols: HashMap<String, Protocol>,
    earliest: Protocol,
    usage: Mutex<HashMap<String, u64>>,
}

impl ProtocolRegistry {
    /// Build the registry
    ///
    /// Registers the current version, every version below it, and the bare
    /// family name as an alias of version 1. Adapters in `overrides` replace
    /// the factory for their key and may add further keys. Each adapter
    /// instance is initialized exactly once.
    ///
    /// # Errors
    /// - `MissingFactory` when a required version has neither an override
    ///   nor a factory
    /// - `AdapterInit` when an adapter's setup fails
    #[instrument(name = "protocol_registry_init", skip_all, fields(family = %settings.family))]
    pub fn initialize(
        settings: &ProtocolSettings,
        table: &ProtocolTable,
        mut overrides: HashMap<String, Arc<dyn ProtocolAdapter>>,
        events: &EventBus,
    ) -> Result<Self, DispatcherError> {
        let mut plan: BTreeMap<String, Source> = BTreeMap::new();

        plan.insert(settings.family.clone(), Source::Factory(1));
        for n in 1..=settings.current_version {
            plan.insert(settings.version_key(n), Source::Factory(n));
        }
        for (key, adapter) in overrides.drain() {
            plan.insert(key, Source::Override(adapter));
        }

        // Factory instances are shared between keys of the same version
        let mut built: HashMap<u32, Arc<dyn ProtocolAdapter>> = HashMap::new();
        let mut protocols = HashMap::with_capacity(plan.len());

        for (key, source) in plan {
            let adapter = match source {
                Source::Override(adapter) => {
                    init_adapter(&key, adapter.as_ref(), events)?;
                    adapter
                }
                Source::Factory(n) => match built.get(&n) {
                    Some(adapter) => Arc::clone(adapter),
                    None => {
                        let factory = table
                            .get(n)
                            .ok_or_else(|| DispatcherError::missing_factory(settings.version_key(n)))?;
                        let adapter = factory();
                        init_adapter(&key, adapter.as_ref(), events)?;
                        built.insert(n, Arc::clone(&adapter));
                        adapter
                    }
                },
            };
            protocols.insert(key.clone(), Protocol::new(key, adapter));
        }

        let earliest = protocols
            .get(&settings.family)
            .cloned()
            .ok_or_else(|| DispatcherError::missing_factory(settings.family.clone()))?;

        info!(versions = protocols.len(), "protocol registry initialized");

        Ok(Self {
            protocols,
            earliest,
            usage: Mutex::new(HashMap::new()),
        })
    }

    /// Resolve a session protocol string and count the attempt
    pub fn resolve(&self, session_protocol: &str) -> Option<Protocol> {
        *self
            .lock_usage()
            .entry(session_protocol.to_string())
            .or_insert(0) += 1;

        let key = session_protocol.split('.').next().unwrap_or(session_protocol);
        let found = self.protocols.get(key).cloned();

        debug!(session_protocol, key, found = found.is_some(), "protocol resolved");
        observability::record_protocol_resolved(key, found.is_some());
        found
    }

    /// Adapter registered under the bare family key
    pub fn earliest(&self) -> &Protocol {
        &self.earliest
    }

    /// Registered keys, sorted
    pub fn versions(&self) -> Vec<String> {
        let mut versions: Vec<_> = self.protocols.keys().cloned().collect();
        versions.sort();
        versions
    }

    /// Resolution attempts per session protocol string
    pub fn usage(&self) -> BTreeMap<String, u64> {
        self.lock_usage()
            .iter()
            .map(|(protocol, count)| (protocol.clone(), *count))
            .collect()
    }

    fn lock_usage(&self) -> std::sync::MutexGuard<'_, HashMap<String, u64>> {
        self.usage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("versions", &self.versions())
            .field("earliest", &self.earliest.version())
            .finish()
    }
}

fn init_adapter(
    key: &str,
    adapter: &dyn ProtocolAdapter,
    events: &EventBus,
) -> Result<(), DispatcherError> {
    adapter
        .initialize()
        .map_err(|source| DispatcherError::AdapterInit {
            version: key.to_string(),
            source,
        })?;
    debug!(version = key, "protocol adapter initialized");
    events.emit(DispatchEvent::AdapterInitialized {
        version: key.to_string(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use contracts::{DispatchError, Message, Session};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingAdapter {
        inits: AtomicUsize,
        fail_init: bool,
    }

    #[async_trait]
    impl ProtocolAdapter for CountingAdapter {
        fn initialize(&self) -> Result<(), DispatchError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                return Err(DispatchError::system("bad config", "protocol"));
            }
            Ok(())
        }
        async fn transform_in(&self, _: &mut Message) -> Result<(), DispatchError> {
            Ok(())
        }
        async fn transform_out(&self, _: &mut Message) -> Result<(), DispatchError> {
            Ok(())
        }
        async fn transform_system(&self, _: &mut Message) -> Result<(), DispatchError> {
            Ok(())
        }
        async fn emit(&self, _: &Message, _: &Session) -> Result<(), DispatchError> {
            Ok(())
        }
        async fn success(&self, _: &mut Message) -> Result<(), DispatchError> {
            Ok(())
        }
        async fn fail(&self, _: &mut Message) -> Result<(), DispatchError> {
            Ok(())
        }
    }

    fn table(created: Arc<AtomicUsize>) -> ProtocolTable {
        let mut table = ProtocolTable::new();
        for n in 1..=3 {
            let created = Arc::clone(&created);
            table.insert(n, move || {
                created.fetch_add(1, Ordering::SeqCst);
                Arc::new(CountingAdapter::default()) as Arc<dyn ProtocolAdapter>
            });
        }
        table
    }

    fn registry() -> ProtocolRegistry {
        ProtocolRegistry::initialize(
            &ProtocolSettings::default(),
            &table(Arc::new(AtomicUsize::new(0))),
            HashMap::new(),
            &EventBus::new(8),
        )
        .unwrap()
    }

    #[test]
    fn test_registers_all_versions_and_legacy_key() {
        let registry = registry();
        assert_eq!(
            registry.versions(),
            vec!["happn", "happn_1", "happn_2", "happn_3"]
        );
    }

    #[test]
    fn test_one_instance_per_factory_version() {
        let created = Arc::new(AtomicUsize::new(0));
        let registry = ProtocolRegistry::initialize(
            &ProtocolSettings::default(),
            &table(Arc::clone(&created)),
            HashMap::new(),
            &EventBus::new(8),
        )
        .unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 3);
        let legacy = registry.resolve("happn").unwrap();
        let v1 = registry.resolve("happn_1").unwrap();
        assert!(Arc::ptr_eq(legacy.adapter(), v1.adapter()));
    }

    #[test]
    fn test_resolve_uses_leading_token() {
        let registry = registry();
        assert_eq!(registry.resolve("happn_3.1").unwrap().version(), "happn_3");
        assert_eq!(registry.resolve("happn").unwrap().version(), "happn");
        assert!(registry.resolve("happn_9").is_none());
        assert!(registry.resolve("").is_none());
    }

    #[test]
    fn test_usage_counts_every_attempt() {
        let registry = registry();
        registry.resolve("happn_3.1");
        registry.resolve("happn_3.1");
        registry.resolve("nope");

        let usage = registry.usage();
        assert_eq!(usage["happn_3.1"], 2);
        assert_eq!(usage["nope"], 1);
    }

    #[test]
    fn test_override_wins_and_is_initialized_once() {
        let custom = Arc::new(CountingAdapter::default());
        let mut overrides: HashMap<String, Arc<dyn ProtocolAdapter>> = HashMap::new();
        overrides.insert("happn_2".into(), custom.clone());

        let registry = ProtocolRegistry::initialize(
            &ProtocolSettings::default(),
            &table(Arc::new(AtomicUsize::new(0))),
            overrides,
            &EventBus::new(8),
        )
        .unwrap();

        let resolved = registry.resolve("happn_2").unwrap();
        let expected: Arc<dyn ProtocolAdapter> = custom.clone();
        assert!(Arc::ptr_eq(resolved.adapter(), &expected));
        assert_eq!(custom.inits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_factory() {
        let table = ProtocolTable::new().with(1, || {
            Arc::new(CountingAdapter::default()) as Arc<dyn ProtocolAdapter>
        });
        let err = ProtocolRegistry::initialize(
            &ProtocolSettings::default(),
            &table,
            HashMap::new(),
            &EventBus::new(8),
        )
        .err()
        .unwrap();
        assert!(matches!(err, DispatcherError::MissingFactory { version } if version == "happn_2"));
    }

    #[test]
    fn test_adapter_init_failure() {
        let table = ProtocolTable::new().with(1, || {
            Arc::new(CountingAdapter {
                fail_init: true,
                ..Default::default()
            }) as Arc<dyn ProtocolAdapter>
        });
        let settings = ProtocolSettings {
            current_version: 1,
            ..Default::default()
        };
        let err = ProtocolRegistry::initialize(&settings, &table, HashMap::new(), &EventBus::new(8))
            .err()
            .unwrap();
        assert!(matches!(err, DispatcherError::AdapterInit { .. }));
    }

    #[tokio::test]
    async fn test_emits_adapter_initialized() {
        let events = EventBus::new(16);
        let mut rx = events.subscribe();
        ProtocolRegistry::initialize(
            &ProtocolSettings::default(),
            &table(Arc::new(AtomicUsize::new(0))),
            HashMap::new(),
            &events,
        )
        .unwrap();

        let mut versions = Vec::new();
        while let Ok(DispatchEvent::AdapterInitialized { version }) = rx.try_recv() {
            versions.push(version);
        }
        assert_eq!(versions, vec!["happn", "happn_2", "happn_3"]);
    }
}
