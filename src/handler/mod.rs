//! Message handlers: the nodes of the routing network.
//!
//! - [`base`]: [`Handler`] and its identity
//! - [`kind`]: per-level behavior (`HandlerKind`) and the stock kinds

mod base;
pub mod kind;

pub use base::{Handler, HandlerIdentity};
pub use kind::{HandlerKind, HandlerKinds, LeafKind, RelayKind};
