//! routenet - command routing and event bubbling across execution domains
//!
//! A session's commands enter at a root handler and travel down a fixed
//! hierarchy (`Root`, `Process`, `Thread`, `Leaf`) until they reach a handler
//! whose modules can execute them. Events travel the other way, from any
//! handler up to its session root.
//!
//! - [`context`]: the tree of known contexts and next-hop resolution
//! - [`handler`]: per-(session, context) routing nodes
//! - [`registry`]: per-domain handler deduplication and lifecycle
//! - [`modules`]: business logic, instantiated lazily per handler
//! - [`transport`]: links between handlers in different domains
//! - [`domain`]: execution domains and the [`Network`] that wires them

pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod events;
pub mod handler;
pub mod metrics;
pub mod modules;
pub mod registry;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use context::{Context, ContextTree, DomainId, ROOT_DOMAIN};
pub use domain::{DomainHandle, Network};
pub use error::{ModuleError, RouteError, RouteResult};
pub use events::{EventEmitter, EventsDispatcher, ListenerId};
pub use handler::{Handler, HandlerIdentity, HandlerKind, HandlerKinds};
pub use modules::{Module, ModuleClass, ModuleContext, ModuleRegistry};
pub use registry::Registry;
pub use session::SessionStore;

pub use routenet_proto as proto;
