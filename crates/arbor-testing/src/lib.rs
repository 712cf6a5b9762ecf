//! Testing utilities and harness for arbor roots.

pub mod noop_host;
pub mod test_root;

pub use noop_host::{HostNodeKind, HostOp, NodeHandle, NoopHost};
pub use test_root::TestRoot;

pub mod prelude {
    pub use crate::noop_host::*;
    pub use crate::test_root::*;
    pub use arbor_core::{
        deps, Child, Component, Deps, EffectResult, Element, Hooks, Lanes, NodeRef, Props, ReconcileError,
        RenderError, RenderResult, SetState,
    };
}
