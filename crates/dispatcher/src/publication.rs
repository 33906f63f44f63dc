//! Publication completion by consistency level
//!
//! A publish operation completes according to its consistency level:
//! queued once every recipient was notified, deferred immediately,
//! transactional once every recipient was written, acknowledged once every
//! recipient acknowledged. The publisher awaits the completion receiver.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use contracts::{Consistency, DispatchError};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Delivery progress for one recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Notified,
    Written,
    Acknowledged,
}

/// Delivery counters of one publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicationReport {
    pub id: String,
    pub consistency: Consistency,
    pub recipients: usize,
    pub notified: usize,
    pub written: usize,
    pub acknowledged: usize,
}

/// Completion tracker for one publish operation
#[derive(Debug)]
pub struct Publication {
    report: PublicationReport,
    done: Option<oneshot::Sender<PublicationReport>>,
}

impl Publication {
    /// Create the tracker and its completion receiver
    ///
    /// Deferred publications and publications without recipients complete
    /// immediately.
    pub fn new(
        id: impl Into<String>,
        consistency: Consistency,
        recipients: usize,
    ) -> (Self, oneshot::Receiver<PublicationReport>) {
        let (tx, rx) = oneshot::channel();
        let mut publication = Self {
            report: PublicationReport {
                id: id.into(),
                consistency,
                recipients,
                notified: 0,
                written: 0,
                acknowledged: 0,
            },
            done: Some(tx),
        };
        publication.try_complete();
        (publication, rx)
    }

    pub fn id(&self) -> &str {
        &self.report.id
    }

    pub fn report(&self) -> &PublicationReport {
        &self.report
    }

    /// Record progress for one recipient; returns whether the publication
    /// is complete afterwards
    pub fn record(&mut self, delivery: Delivery) -> bool {
        let cap = self.report.recipients;
        let r = &mut self.report;
        match delivery {
            Delivery::Notified => r.notified = (r.notified + 1).min(cap),
            Delivery::Written => r.written = (r.written + 1).min(cap),
            Delivery::Acknowledged => r.acknowledged = (r.acknowledged + 1).min(cap),
        }
        // acknowledged implies written implies notified
        r.written = r.written.max(r.acknowledged);
        r.notified = r.notified.max(r.written);

        self.try_complete()
    }

    pub fn is_complete(&self) -> bool {
        let r = &self.report;
        match r.consistency {
            Consistency::Deferred => true,
            Consistency::Queued => r.notified >= r.recipients,
            Consistency::Transactional => r.written >= r.recipients,
            Consistency::Acknowledged => r.acknowledged >= r.recipients,
        }
    }

    fn try_complete(&mut self) -> bool {
        if !self.is_complete() {
            return false;
        }
        if let Some(tx) = self.done.take() {
            if tx.send(self.report.clone()).is_err() {
                debug!(publication = %self.report.id, "publisher stopped waiting");
            }
        }
        true
    }
}

/// Pending acknowledged publications, keyed by publication id
#[derive(Debug, Default)]
pub struct AcknowledgementRegistry {
    pending: Mutex<HashMap<String, Publication>>,
}

impl AcknowledgementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an acknowledged publication to `recipients` recipients
    pub fn track(
        &self,
        id: impl Into<String>,
        recipients: usize,
    ) -> oneshot::Receiver<PublicationReport> {
        let (publication, rx) = Publication::new(id, Consistency::Acknowledged, recipients);
        if !publication.is_complete() {
            let previous = self
                .lock()
                .insert(publication.id().to_string(), publication);
            if let Some(previous) = previous {
                warn!(publication = %previous.id(), "publication id reused while pending");
            }
        }
        rx
    }

    /// Record one recipient acknowledgement
    ///
    /// Returns `true` when this acknowledgement completed the publication.
    ///
    /// # Errors
    /// Not-found when no pending publication has this id
    pub fn acknowledge(&self, id: &str) -> Result<bool, DispatchError> {
        let mut pending = self.lock();
        let publication = pending.get_mut(id).ok_or_else(|| {
            DispatchError::not_found(format!("no pending publication: {id}"), "publisher")
        })?;

        let complete = publication.record(Delivery::Acknowledged);
        if complete {
            pending.remove(id);
        }
        Ok(complete)
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Publication>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
