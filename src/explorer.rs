//! The load pipeline as seen by a display: load, resolve, lay out, and report progress.
//!
//! Every call to [MapExplorer::explore] is an independent flow with its own segment set and
//! layout tree. Later requests do not cancel earlier ones. Instead each request carries a
//! [RequestTicket] and callers drop results whose ticket is no longer current.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    config::ExplorerConfig,
    event::{LoadState, MapEvent, RequestTicket},
    layout::{LayoutBuilder, LayoutNode},
    loader::{MapLoader, ReferenceResolver},
    properties::Segment,
    query::SegmentStore,
    MapError,
};

/// Inputs that decide whether the displayed map must be reloaded. A display bumps `revision`
/// when it is told (by a notification channel or a user action) that the map changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadTrigger {
    pub process: String,
    pub map_id: String,
    pub revision: u64,
}

impl ReloadTrigger {
    pub fn new(process: impl Into<String>, map_id: impl Into<String>) -> Self {
        ReloadTrigger {
            process: process.into(),
            map_id: map_id.into(),
            revision: 0,
        }
    }

    pub fn bumped(&self) -> Self {
        ReloadTrigger {
            revision: self.revision + 1,
            ..self.clone()
        }
    }
}

/// Result of a successful load request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub ticket: RequestTicket,
    pub process: String,
    pub map_id: String,
    /// Map segments in page order, then resolved references in discovery order.
    pub segments: Vec<Segment>,
    pub root: LayoutNode,
}

#[derive(Debug)]
pub struct MapExplorer<S> {
    loader: MapLoader<S>,
    builder: LayoutBuilder,
    tx: Option<UnboundedSender<MapEvent>>,
    sequence: AtomicU64,
    committed: Mutex<Option<(RequestTicket, ReloadTrigger)>>,
}

impl<S: SegmentStore> MapExplorer<S> {
    pub fn new(store: S, tx: Option<UnboundedSender<MapEvent>>) -> Self {
        MapExplorer {
            loader: MapLoader::new(store),
            builder: LayoutBuilder::default(),
            tx,
            sequence: AtomicU64::new(0),
            committed: Mutex::new(None),
        }
    }

    pub fn with_config(
        store: S,
        config: &ExplorerConfig,
        tx: Option<UnboundedSender<MapEvent>>,
    ) -> Result<Self, MapError> {
        config.validate()?;
        let mut explorer = MapExplorer::new(store, tx);
        explorer.loader = explorer.loader.with_page_size(config.page_size)?;
        explorer.builder = LayoutBuilder::new(config.node_size)?;
        Ok(explorer)
    }

    pub fn loader(&self) -> &MapLoader<S> {
        &self.loader
    }

    pub fn builder(&self) -> &LayoutBuilder {
        &self.builder
    }

    /// Issue the ticket for a new request. Tickets start at 1.
    pub fn begin_request(&self) -> RequestTicket {
        RequestTicket(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether no request was started after the one holding `ticket`.
    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.sequence.load(Ordering::SeqCst) == ticket.0
    }

    /// Whether `trigger` differs from the trigger of the last committed view.
    pub fn reload_needed(&self, trigger: &ReloadTrigger) -> bool {
        match &*self.committed.lock() {
            Some((_, committed)) => committed != trigger,
            None => true,
        }
    }

    /// Record `view` as displayed for `trigger`. Stale views are refused.
    pub fn commit(&self, view: &MapView, trigger: ReloadTrigger) -> bool {
        let mut committed = self.committed.lock();
        // Checked under the lock so two commits cannot both see themselves as current.
        let superseded = matches!(&*committed, Some((ticket, _)) if *ticket > view.ticket);
        if superseded || !self.is_current(view.ticket) {
            tracing::debug!("Discarding stale view {} of {}", view.ticket, view.map_id);
            return false;
        }
        *committed = Some((view.ticket, trigger));
        true
    }

    /// Reload if `trigger` changed since the last commit, and commit the result if no newer
    /// request has started meanwhile. `Ok(None)` means there was nothing to display.
    pub async fn refresh(&self, trigger: ReloadTrigger) -> Result<Option<MapView>, MapError> {
        if !self.reload_needed(&trigger) {
            return Ok(None);
        }
        let view = self.explore(&trigger.process, &trigger.map_id).await?;
        if self.commit(&view, trigger) {
            Ok(Some(view))
        } else {
            Ok(None)
        }
    }

    /// Run the whole pipeline for one map under a fresh ticket.
    #[tracing::instrument(skip(self))]
    pub async fn explore(&self, process: &str, map_id: &str) -> Result<MapView, MapError> {
        let ticket = self.begin_request();
        self.emit_state(ticket, process, map_id, LoadState::Loading);

        let set = match self.loader.load_map(process, map_id).await {
            Ok(set) => set,
            Err(e) => return Err(self.fail(ticket, process, map_id, e)),
        };
        let loaded = set.len();
        self.emit(MapEvent::SegmentsLoaded(ticket, loaded));

        self.emit_state(ticket, process, map_id, LoadState::Resolving);
        let segments = match ReferenceResolver::new(self.loader.store())
            .resolve(set.into_vec())
            .await
        {
            Ok(segments) => segments,
            Err(e) => return Err(self.fail(ticket, process, map_id, e)),
        };
        self.emit(MapEvent::ReferencesResolved(
            ticket,
            segments.len() - loaded,
        ));

        let root = match self.builder.build(&segments, process, map_id) {
            Ok(root) => root,
            Err(e) => return Err(self.fail(ticket, process, map_id, e)),
        };
        self.emit_state(ticket, process, map_id, LoadState::LayoutReady);
        tracing::debug!(
            "Request {ticket} laid out {} segments of {process}/{map_id}",
            segments.len()
        );

        Ok(MapView {
            ticket,
            process: process.to_string(),
            map_id: map_id.to_string(),
            segments,
            root,
        })
    }

    fn fail(&self, ticket: RequestTicket, process: &str, map_id: &str, e: MapError) -> MapError {
        tracing::warn!("Request {ticket} for {process}/{map_id} failed: {e}");
        self.emit_state(ticket, process, map_id, LoadState::Failed(e.clone()));
        e
    }

    fn emit_state(&self, ticket: RequestTicket, process: &str, map_id: &str, state: LoadState) {
        self.emit(MapEvent::StateChanged(
            ticket,
            process.to_string(),
            map_id.to_string(),
            state,
        ));
    }

    fn emit(&self, event: MapEvent) {
        if let Some(tx) = self.tx.as_ref() {
            if tx.send(event).is_err() {
                tracing::trace!("Map event receiver dropped");
            }
        }
    }
}
