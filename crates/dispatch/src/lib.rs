//! Device processing dispatcher.
//!
//! Given one device, the packets in its inbox and a read-only view of the
//! network, [`Dispatcher::process`] decides what leaves the device: copies
//! toward neighbors, terminal deliveries, and drops. Rules are selected by
//! device kind (and role for attack-injected ONUs) and hold no state between
//! calls.
//!
//! ```text
//!           Primary OLT  (upstream terminates here)
//!                │
//!          Secondary OLT (upstream filtered by known ONU IDs)
//!                │
//!            Splitter    (downstream fan-out, congestion drop)
//!            ╱       ╲
//!         ONU/ONT   ONU/ONT  (downstream filtered by target ONU ID)
//!            │
//!      Router/Switch     (LAN fan-out)
//!            │
//!        PC/Server       (downstream terminates here)
//! ```
//!
//! Orientation comes from the [`Hierarchy`](gpon_types::Hierarchy): a
//! neighbor farther from the primary OLT is downstream, the first nearer one
//! is upstream.

mod dispatcher;
mod error;
mod result;

pub use dispatcher::{DispatchContext, Dispatcher};
pub use error::DispatchError;
pub use result::{DispatchResult, DropReason};
