//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Contract snapshot tests
//! - End-to-end dispatch flows against in-memory collaborators
//! - Settings file → running service

#[cfg(test)]
mod contract_tests {
    use contracts::{Action, Consistency, DispatchError, SessionState};
    use serde_json::json;

    #[test]
    fn test_wire_names() {
        let names: Vec<_> = Action::ALL.iter().map(|a| a.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "get",
                "set",
                "remove",
                "on",
                "off",
                "describe",
                "configure-session",
                "login",
                "disconnect",
                "ack",
                "revoke-session",
                "request-nonce",
            ]
        );
    }

    #[test]
    fn test_consistency_codes() {
        assert_eq!(serde_json::to_value(Consistency::Queued).unwrap(), json!(0));
        assert_eq!(serde_json::to_value(Consistency::Deferred).unwrap(), json!(1));
        assert_eq!(serde_json::to_value(Consistency::Transactional).unwrap(), json!(2));
        assert_eq!(serde_json::to_value(Consistency::Acknowledged).unwrap(), json!(3));
    }

    #[test]
    fn test_session_state_codes() {
        assert_eq!(SessionState::Uninitialized.code(), 0);
        assert_eq!(SessionState::Connected.code(), 6);
        assert_eq!(SessionState::Disconnecting.code(), 7);
    }

    #[test]
    fn test_error_snapshot() {
        let err = DispatchError::access_denied("unauthorized", "security");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"kind": "ACCESS_DENIED", "message": "unauthorized", "area": "security"})
        );
    }
}

/// In-memory server collaborators: data store, subscriptions, authorizer
#[cfg(test)]
mod support {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use contracts::{
        Consistency, DispatchError, DispatchSettings, Message, ProtocolAdapter, Session, Stage,
        StageRef,
    };
    use dispatcher::{
        AcknowledgementRegistry, DispatchService, ProtocolTable, StageCatalog, StageRole,
    };
    use serde_json::{json, Value};

    /// JSON adapter stamping its version into every response
    pub struct VersionedAdapter {
        pub version: &'static str,
        pub emitted: Arc<Mutex<Vec<(String, Value)>>>,
    }

    #[async_trait]
    impl ProtocolAdapter for VersionedAdapter {
        async fn transform_in(&self, message: &mut Message) -> Result<(), DispatchError> {
            message.request = Some(serde_json::from_value(message.raw.clone())?);
            Ok(())
        }
        async fn transform_out(&self, message: &mut Message) -> Result<(), DispatchError> {
            message.raw = json!({"version": self.version, "publication": message.request()?});
            Ok(())
        }
        async fn transform_system(&self, message: &mut Message) -> Result<(), DispatchError> {
            message.raw = json!({"version": self.version, "system": true});
            Ok(())
        }
        async fn emit(&self, message: &Message, session: &Session) -> Result<(), DispatchError> {
            self.emitted
                .lock()
                .unwrap()
                .push((session.id.clone(), message.raw.clone()));
            Ok(())
        }
        async fn success(&self, message: &mut Message) -> Result<(), DispatchError> {
            message.response = Some(json!({
                "version": self.version,
                "ok": true,
                "data": message.attachments.get("data").cloned().unwrap_or(Value::Null),
            }));
            Ok(())
        }
        async fn fail(&self, message: &mut Message) -> Result<(), DispatchError> {
            message.response = Some(json!({
                "version": self.version,
                "ok": false,
                "error": message.error,
            }));
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct World {
        pub data: Mutex<HashMap<String, Value>>,
        pub subscribers: Mutex<HashMap<String, Vec<Arc<Session>>>>,
        pub store_calls: AtomicUsize,
        pub emitted: Arc<Mutex<Vec<(String, Value)>>>,
    }

    fn path(message: &Message) -> Result<String, DispatchError> {
        message
            .request()?
            .path
            .clone()
            .ok_or_else(|| DispatchError::system("request has no path", "data"))
    }

    struct Store(Arc<World>);

    #[async_trait]
    impl Stage for Store {
        fn name(&self) -> &str {
            "store"
        }
        async fn process(&self, message: &mut Message) -> Result<(), DispatchError> {
            self.0.store_calls.fetch_add(1, Ordering::SeqCst);
            let path = path(message)?;
            let data = message.request()?.data.clone();
            self.0.data.lock().unwrap().insert(path, data.clone());
            message.attach("data", data);
            Ok(())
        }
    }

    struct Get(Arc<World>);

    #[async_trait]
    impl Stage for Get {
        fn name(&self) -> &str {
            "get"
        }
        async fn process(&self, message: &mut Message) -> Result<(), DispatchError> {
            let path = path(message)?;
            let data = self
                .0
                .data
                .lock()
                .unwrap()
                .get(&path)
                .cloned()
                .ok_or_else(|| DispatchError::not_found(format!("no data at {path}"), "data"))?;
            message.attach("data", data);
            Ok(())
        }
    }

    struct Subscribe(Arc<World>);

    #[async_trait]
    impl Stage for Subscribe {
        fn name(&self) -> &str {
            "subscribe"
        }
        async fn process(&self, message: &mut Message) -> Result<(), DispatchError> {
            let path = path(message)?;
            self.0
                .subscribers
                .lock()
                .unwrap()
                .entry(path)
                .or_default()
                .push(Arc::clone(&message.session));
            Ok(())
        }
    }

    struct Recipients(Arc<World>);

    #[async_trait]
    impl Stage for Recipients {
        fn name(&self) -> &str {
            "recipients"
        }
        async fn process(&self, message: &mut Message) -> Result<(), DispatchError> {
            let path = path(message)?;
            let sessions: Vec<Value> = self
                .0
                .subscribers
                .lock()
                .unwrap()
                .get(&path)
                .map(|s| s.iter().map(|s| json!(s.id)).collect())
                .unwrap_or_default();
            message.attach("recipients", Value::Array(sessions));
            Ok(())
        }
    }

    /// Emits the publication to every recipient through the service's
    /// outbound path; acknowledged publications are tracked for `ack`
    pub struct Publish {
        world: Arc<World>,
        acknowledgements: Arc<AcknowledgementRegistry>,
        service: Mutex<Option<std::sync::Weak<DispatchService>>>,
    }

    impl Publish {
        pub fn bind(&self, service: &Arc<DispatchService>) {
            *self.service.lock().unwrap() = Some(Arc::downgrade(service));
        }
    }

    #[async_trait]
    impl Stage for Publish {
        fn name(&self) -> &str {
            "publish"
        }
        async fn process(&self, message: &mut Message) -> Result<(), DispatchError> {
            let request = message.request()?.clone();
            let path = path(message)?;
            let recipients: Vec<Arc<Session>> = self
                .world
                .subscribers
                .lock()
                .unwrap()
                .get(&path)
                .cloned()
                .unwrap_or_default();

            if request.consistency() == Consistency::Acknowledged {
                let id = format!("pub-{}", message.id);
                // completion is awaited by the publisher, not here
                drop(self.acknowledgements.track(id.clone(), recipients.len()));
                message.attach("publicationId", json!(id));
            }

            let service = self
                .service
                .lock()
                .unwrap()
                .as_ref()
                .and_then(|w| w.upgrade())
                .ok_or_else(|| DispatchError::system("publisher not bound", "publisher"))?;
            for (i, session) in recipients.into_iter().enumerate() {
                let out = Message::with_request(
                    format!("{}-{i}", message.id),
                    session,
                    request.clone(),
                );
                service.process_message_out(out).await?;
            }
            Ok(())
        }
    }

    pub struct Deny;

    #[async_trait]
    impl Stage for Deny {
        fn name(&self) -> &str {
            "authorize"
        }
        async fn process(&self, message: &mut Message) -> Result<(), DispatchError> {
            let path = message.request()?.path.clone().unwrap_or_default();
            if path.starts_with("/private") {
                let root = DispatchError::access_denied("unauthorized", "security");
                return Err(DispatchError::wrap(root, "authorize failed", "authorize"));
            }
            Ok(())
        }
    }

    pub struct Harness {
        pub world: Arc<World>,
        pub service: Arc<DispatchService>,
    }

    pub fn table(emitted: &Arc<Mutex<Vec<(String, Value)>>>) -> ProtocolTable {
        let mut table = ProtocolTable::new();
        for (n, version) in [(1, "happn_1"), (2, "happn_2"), (3, "happn_3")] {
            let emitted = Arc::clone(emitted);
            table.insert(n, move || {
                Arc::new(VersionedAdapter {
                    version,
                    emitted: Arc::clone(&emitted),
                }) as Arc<dyn ProtocolAdapter>
            });
        }
        table
    }

    pub fn harness(settings: DispatchSettings) -> Harness {
        let world = Arc::new(World::default());
        let acknowledgements = Arc::new(AcknowledgementRegistry::new());
        let publish = Arc::new(Publish {
            world: Arc::clone(&world),
            acknowledgements: Arc::clone(&acknowledgements),
            service: Mutex::new(None),
        });

        let catalog = StageCatalog::passthrough()
            .without(StageRole::Log)
            .without(StageRole::Acknowledge)
            .with(StageRole::Authorize, Arc::new(Deny))
            .with(StageRole::Store, Arc::new(Store(Arc::clone(&world))))
            .with(StageRole::SecureStore, Arc::new(Store(Arc::clone(&world))))
            .with(StageRole::Get, Arc::new(Get(Arc::clone(&world))))
            .with(StageRole::Subscribe, Arc::new(Subscribe(Arc::clone(&world))))
            .with(StageRole::Recipients, Arc::new(Recipients(Arc::clone(&world))))
            .with(StageRole::Publish, Arc::clone(&publish) as StageRef);

        let service = Arc::new(
            DispatchService::builder(settings, table(&world.emitted))
                .catalog(catalog)
                .acknowledgements(acknowledgements)
                .build()
                .unwrap(),
        );
        publish.bind(&service);

        Harness { world, service }
    }

    pub fn request(session: &Arc<Session>, id: &str, raw: Value) -> Message {
        Message::new(id, Arc::clone(session), raw)
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{DispatchSettings, ErrorKind, Session};
    use dispatcher::{DispatchEvent, DispatchService, StageCatalog};
    use serde_json::json;

    use crate::support::{harness, request, table};

    /// set → subscribers notified → get returns the stored value
    #[tokio::test]
    async fn test_set_publishes_and_get_reads_back() {
        let h = harness(DispatchSettings::default());
        let alice = Arc::new(Session::new("alice", "happn_3"));
        let bob = Arc::new(Session::new("bob", "happn_2.1"));

        let on = h
            .service
            .process_message_in(request(&bob, "1", json!({"action": "on", "path": "/news"})))
            .await
            .unwrap();
        assert_eq!(on.response.unwrap()["ok"], true);

        let set = h
            .service
            .process_message_in(request(
                &alice,
                "2",
                json!({"action": "set", "path": "/news", "data": {"headline": "hi"}}),
            ))
            .await
            .unwrap();
        assert_eq!(set.response.unwrap()["ok"], true);

        // bob speaks version 2, so the publication is encoded by that adapter
        let emitted = h.world.emitted.lock().unwrap().clone();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].0, "bob");
        assert_eq!(emitted[0].1["version"], "happn_2");

        let get = h
            .service
            .process_message_in(request(&alice, "3", json!({"action": "get", "path": "/news"})))
            .await
            .unwrap();
        assert_eq!(get.response.unwrap()["data"], json!({"headline": "hi"}));
    }

    #[tokio::test]
    async fn test_no_publish_skips_subscribers() {
        let h = harness(DispatchSettings::default());
        let s = Arc::new(Session::new("s", "happn_3"));
        h.service
            .process_message_in(request(&s, "1", json!({"action": "on", "path": "/a"})))
            .await
            .unwrap();
        h.service
            .process_message_in(request(
                &s,
                "2",
                json!({"action": "set", "path": "/a", "data": 1, "options": {"noPublish": true}}),
            ))
            .await
            .unwrap();

        assert!(h.world.emitted.lock().unwrap().is_empty());
        assert_eq!(h.world.data.lock().unwrap()["/a"], json!(1));
    }

    #[tokio::test]
    async fn test_secure_mode_denies_before_store() {
        let settings = DispatchSettings {
            secure: true,
            ..Default::default()
        };
        let h = harness(settings);
        let s = Arc::new(Session::new("s", "happn_3"));

        let out = h
            .service
            .process_message_in(request(
                &s,
                "1",
                json!({"action": "set", "path": "/private/x", "data": 1}),
            ))
            .await
            .unwrap();

        let error = out.error.unwrap();
        assert_eq!(error.kind, ErrorKind::AccessDenied);
        assert_eq!(error.message, "unauthorized");
        assert_eq!(out.response.unwrap()["error"]["kind"], "ACCESS_DENIED");
        assert_eq!(h.world.store_calls.load(std::sync::atomic::Ordering::SeqCst), 0);

        let allowed = h
            .service
            .process_message_in(request(
                &s,
                "2",
                json!({"action": "set", "path": "/public/x", "data": 1}),
            ))
            .await
            .unwrap();
        assert!(allowed.error.is_none());
    }

    #[tokio::test]
    async fn test_legacy_and_unknown_protocols() {
        let h = harness(DispatchSettings::default());

        let legacy = Arc::new(Session::new("old", "happn"));
        let out = h
            .service
            .process_message_in(request(&legacy, "1", json!({"action": "describe"})))
            .await
            .unwrap();
        assert_eq!(out.response.unwrap()["version"], "happn_1");

        let alien = Arc::new(Session::new("alien", "mqtt_5"));
        let out = h
            .service
            .process_message_in(request(&alien, "2", json!({"action": "set", "path": "/x"})))
            .await
            .unwrap();
        assert_eq!(out.error.unwrap().kind, ErrorKind::NotFound);
        assert_eq!(out.response.unwrap()["version"], "happn_1");
        assert_eq!(h.world.store_calls.load(std::sync::atomic::Ordering::SeqCst), 0);

        let counts = h.service.stats().protocol_counts;
        assert_eq!(counts["happn"], 1);
        assert_eq!(counts["mqtt_5"], 1);
    }

    #[tokio::test]
    async fn test_acknowledged_publication_completes_on_ack() {
        let h = harness(DispatchSettings::default());
        let subscriber = Arc::new(Session::new("sub", "happn_3"));
        let publisher = Arc::new(Session::new("pub", "happn_3"));

        h.service
            .process_message_in(request(&subscriber, "1", json!({"action": "on", "path": "/q"})))
            .await
            .unwrap();
        let set = h
            .service
            .process_message_in(request(
                &publisher,
                "2",
                json!({"action": "set", "path": "/q", "data": 1, "options": {"consistency": 3}}),
            ))
            .await
            .unwrap();
        assert!(set.error.is_none());
        assert_eq!(h.service.acknowledgements().pending(), 1);

        let ack = h
            .service
            .process_message_in(request(
                &subscriber,
                "3",
                json!({"action": "ack", "data": {"publicationId": "pub-2"}}),
            ))
            .await
            .unwrap();
        assert!(ack.error.is_none());
        assert_eq!(ack.attachments["acknowledgement"]["complete"], true);
        assert_eq!(h.service.acknowledgements().pending(), 0);

        let again = h
            .service
            .process_message_in(request(
                &subscriber,
                "4",
                json!({"action": "ack", "data": {"publicationId": "pub-2"}}),
            ))
            .await
            .unwrap();
        assert_eq!(again.error.unwrap().kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_stacks() {
        let settings = DispatchSettings {
            benchmark_enabled: true,
            ..Default::default()
        };
        let h = harness(settings);

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let service = Arc::clone(&h.service);
                tokio::spawn(async move {
                    let session = Arc::new(Session::new(format!("s{i}"), "happn_3"));
                    let raw = if i % 2 == 0 {
                        json!({"action": "set", "path": format!("/k{i}"), "data": i})
                    } else {
                        json!({"action": "describe"})
                    };
                    service
                        .process_message_in(request(&session, &format!("m{i}"), raw))
                        .await
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().error.is_none());
        }

        let stats = h.service.stats();
        assert_eq!(stats.stack_cache_size, 2);
        assert_eq!(stats.benchmarks["set"].count, 16);
        assert_eq!(stats.benchmarks["set"].in_flight, 0);
        assert_eq!(stats.benchmarks["describe"].count, 16);
    }

    #[tokio::test]
    async fn test_settings_file_to_service() {
        let content = r#"
secure = true
logging_enabled = true

[protocol]
family = "happn"
current_version = 2
"#;
        let settings = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        let emitted = Default::default();
        let builder = DispatchService::builder(settings, table(&emitted))
            .catalog(StageCatalog::passthrough());
        let mut events = builder.subscribe();
        let service = builder.build().unwrap();

        assert_eq!(service.current_protocol(), "happn_2");
        assert_eq!(service.stats().protocols, vec!["happn", "happn_1", "happn_2"]);

        let mut initialized = Vec::new();
        while let Ok(DispatchEvent::AdapterInitialized { version }) = events.try_recv() {
            initialized.push(version);
        }
        assert_eq!(initialized, vec!["happn", "happn_2"]);
    }

    /// Client-side latency summary agrees with the service benchmarks
    #[tokio::test]
    async fn test_latency_summary_matches_benchmarks() {
        use contracts::Action;
        use observability::LatencyAggregator;
        use std::time::Instant;

        let h = harness(DispatchSettings {
            benchmark_enabled: true,
            ..Default::default()
        });
        let s = Arc::new(Session::new("s", "happn_3"));
        let mut latency = LatencyAggregator::new();

        let traffic = [
            (Action::Set, json!({"action": "set", "path": "/a", "data": 1})),
            (Action::Set, json!({"action": "set", "path": "/b", "data": 2})),
            (Action::Get, json!({"action": "get", "path": "/a"})),
            (Action::Set, json!({"action": "set", "path": "/a", "data": 3})),
            (Action::Get, json!({"action": "get", "path": "/b"})),
        ];
        for (i, (action, raw)) in traffic.into_iter().enumerate() {
            let started = Instant::now();
            let done = h
                .service
                .process_message_in(request(&s, &i.to_string(), raw))
                .await
                .unwrap();
            let ok = done.response.unwrap()["ok"] == true;
            latency.update(action, started.elapsed().as_secs_f64() * 1000.0, ok);
        }

        let summary = latency.summary();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.failures, 0);

        let stats = h.service.stats();
        for action in [Action::Set, Action::Get] {
            let bench = stats.benchmarks[action.as_str()];
            assert_eq!(bench.count, summary.per_action[&action].count);
            assert_eq!(bench.in_flight, 0);
        }
    }
}
