//! Chrome DevTools Protocol session layer.
//!
//! One [`CdpSession`] exclusively owns the WebSocket to one debugging target:
//! it correlates command responses by id, fans spontaneous protocol events
//! out to subscribers, and keeps the derived page state (document version,
//! network request registry) that the wait primitives and DOM node lifecycle
//! depend on. [`TargetRegistry`] resolves caller-facing tab references
//! against the browser's HTTP discovery endpoint.

pub mod dom;
pub mod emulation;
pub mod error;
pub mod events;
pub mod metrics;
pub mod session;
pub mod state;
pub mod targets;
pub mod wait;

pub use dom::NodeRef;
pub use error::{CdpError, Result};
pub use events::{EventHub, EventRecord, RingStats, Subscription, EVENT_RING_CAPACITY, WILDCARD};
pub use metrics::{CommandOutcome, MetricsReport, SessionMetrics};
pub use session::{CdpSession, SessionOptions, DEFAULT_COMMAND_TIMEOUT};
pub use state::{PageState, RequestRecord, NETWORK_REQUEST_CAPACITY};
pub use targets::{Target, TargetRef, TargetRegistry};
pub use wait::{
    DialogAction, DialogInfo, DialogWaitOptions, FileChooserInfo, LoadWaiter, NetworkIdleOptions,
    ResponseMatch, ResponseWaitOptions, WaitUntil,
};
