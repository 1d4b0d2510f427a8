use std::fmt::{self, Debug};

use restbox_core::{CachedResponse, Problem};

use crate::error::TransportError;
use crate::transport::{TransportRequest, TransportResponse};

/// Intermediate pipeline states.
pub(crate) enum State {
    /// Context check and cache gating.
    Start,
    /// Looking the key up in the store.
    CacheLookup,
    /// Creating the transport request, with an entry to revalidate if any.
    BuildRequest { carried: Option<CachedResponse> },
    /// Applying conditional, negotiation, auth and caller headers.
    DecorateHeaders {
        request: TransportRequest,
        carried: Option<CachedResponse>,
    },
    /// Waiting for the transport, raced against the call context.
    Send {
        request: TransportRequest,
        carried: Option<CachedResponse>,
    },
    /// Response received.
    Receive {
        response: TransportResponse,
        carried: Option<CachedResponse>,
    },
    /// New body to inspect for a problem payload.
    FreshResponse { response: TransportResponse },
    /// Deriving TTL and validators.
    ExtractValidators {
        response: TransportResponse,
        problem: Option<Problem>,
    },
}

/// Terminal states.
pub(crate) enum Terminal {
    /// Live entry that needs no revalidation.
    CacheHitFresh { cached: CachedResponse },
    /// Transport failure or cancellation.
    NetworkError { error: TransportError },
    /// Origin confirmed the carried entry.
    NotModified { cached: CachedResponse },
    /// New response, stored when eligible.
    ConditionalAdmit { entry: CachedResponse },
}

impl Terminal {
    /// Event label for logs and metrics.
    pub(crate) fn event(&self) -> &'static str {
        match self {
            Terminal::CacheHitFresh { .. } => "cache_hit",
            Terminal::NetworkError { .. } => "error",
            Terminal::NotModified { .. } => "not_modified",
            Terminal::ConditionalAdmit { .. } => "response",
        }
    }
}

/// Result of one step.
pub(crate) enum Transition {
    Next(State),
    Done(Terminal),
}

impl From<State> for Transition {
    fn from(state: State) -> Self {
        Transition::Next(state)
    }
}

impl From<Terminal> for Transition {
    fn from(terminal: Terminal) -> Self {
        Transition::Done(terminal)
    }
}

impl Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Start => f.write_str("State::Start"),
            State::CacheLookup => f.write_str("State::CacheLookup"),
            State::BuildRequest { carried } => f
                .debug_struct("State::BuildRequest")
                .field("revalidate", &carried.is_some())
                .finish(),
            State::DecorateHeaders { .. } => f.write_str("State::DecorateHeaders"),
            State::Send { .. } => f.write_str("State::Send"),
            State::Receive { response, .. } => f
                .debug_struct("State::Receive")
                .field("status", &response.status.as_u16())
                .finish(),
            State::FreshResponse { .. } => f.write_str("State::FreshResponse"),
            State::ExtractValidators { .. } => f.write_str("State::ExtractValidators"),
        }
    }
}

impl Debug for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::CacheHitFresh { .. } => f.write_str("Terminal::CacheHitFresh"),
            Terminal::NetworkError { error } => f
                .debug_struct("Terminal::NetworkError")
                .field("class", &error.class())
                .finish(),
            Terminal::NotModified { .. } => f.write_str("Terminal::NotModified"),
            Terminal::ConditionalAdmit { entry } => f
                .debug_struct("Terminal::ConditionalAdmit")
                .field("status", &entry.status().as_u16())
                .field("cacheable", &entry.validators().is_cacheable())
                .finish(),
        }
    }
}
