use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::MapError;

/// Sequence number of a load request. Tickets are handed out in increasing order, so a result
/// carrying an older ticket than the latest issued one is stale.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RequestTicket(pub u64);

impl Display for RequestTicket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Pipeline state of a single load request.
///
/// `Loading -> Resolving -> LayoutReady`. `Failed` can be reached from any of the first two
/// on a store error, and from the layout step on a malformed map. There is no retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoadState {
    /// Paging the map's own segments.
    Loading,
    /// Fetching segments referenced from the map.
    Resolving,
    LayoutReady,
    Failed(MapError),
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadState::LayoutReady | LoadState::Failed(_))
    }

    /// Whether `next` may follow `self` within one request.
    pub fn can_transition_to(&self, next: &LoadState) -> bool {
        match (self, next) {
            (LoadState::Loading, LoadState::Resolving) => true,
            (LoadState::Resolving, LoadState::LayoutReady) => true,
            (LoadState::Loading, LoadState::Failed(_)) => true,
            (LoadState::Resolving, LoadState::Failed(_)) => true,
            _ => false,
        }
    }
}

impl Display for LoadState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadState::Loading => write!(f, "loading"),
            LoadState::Resolving => write!(f, "resolving"),
            LoadState::LayoutReady => write!(f, "layout ready"),
            LoadState::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MapEvent {
    /// Request, process, map id, new state
    StateChanged(RequestTicket, String, String, LoadState),
    /// Request, number of distinct map segments paged out of the store
    SegmentsLoaded(RequestTicket, usize),
    /// Request, number of referenced segments added to the map's segments
    ReferencesResolved(RequestTicket, usize),
}

impl MapEvent {
    pub fn ticket(&self) -> RequestTicket {
        match self {
            MapEvent::StateChanged(ticket, ..) => *ticket,
            MapEvent::SegmentsLoaded(ticket, _) => *ticket,
            MapEvent::ReferencesResolved(ticket, _) => *ticket,
        }
    }

    /// The state carried by a `StateChanged` event.
    pub fn state(&self) -> Option<&LoadState> {
        match self {
            MapEvent::StateChanged(_, _, _, state) => Some(state),
            _ => None,
        }
    }
}
