use std::fmt;

/// Fatal render-phase failures. Any of these aborts the pass that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// More hooks were called than during the previous render of the same
    /// component instance.
    HookCountMismatch {
        component: &'static str,
        expected: usize,
        found: usize,
    },
    /// The hook at `index` is a different kind of hook than last render.
    HookOrderMismatch {
        component: &'static str,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
    /// The hook at `index` holds state of a different type than requested.
    HookTypeMismatch {
        component: &'static str,
        index: usize,
        expected: &'static str,
    },
    /// Error raised by component logic itself.
    Component {
        component: &'static str,
        message: String,
    },
}

impl RenderError {
    pub fn component(component: &'static str, message: impl Into<String>) -> Self {
        RenderError::Component {
            component,
            message: message.into(),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::HookCountMismatch {
                component,
                expected,
                found,
            } => write!(
                f,
                "component {component} called {found} hooks, previous render called {expected}"
            ),
            RenderError::HookOrderMismatch {
                component,
                index,
                expected,
                found,
            } => write!(
                f,
                "component {component} hook #{index} changed from {expected} to {found}"
            ),
            RenderError::HookTypeMismatch {
                component,
                index,
                expected,
            } => write!(
                f,
                "component {component} hook #{index} does not hold a {expected}"
            ),
            RenderError::Component { component, message } => {
                write!(f, "component {component} failed: {message}")
            }
        }
    }
}

impl std::error::Error for RenderError {}

/// Errors reported by a host adapter. Soft during commit: logged and the
/// individual mutation is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    Missing { handle: String },
    MissingAnchor { handle: String },
    AlreadyAttached { handle: String },
    Unsupported { operation: &'static str, handle: String },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Missing { handle } => write!(f, "host node {handle} missing"),
            HostError::MissingAnchor { handle } => {
                write!(f, "insertion anchor {handle} is not a child of the container")
            }
            HostError::AlreadyAttached { handle } => {
                write!(f, "host node {handle} is already attached to another parent")
            }
            HostError::Unsupported { operation, handle } => {
                write!(f, "{operation} is not supported on host node {handle}")
            }
        }
    }
}

impl std::error::Error for HostError {}

/// Errors surfaced to callers of the root entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    Render(RenderError),
    /// A pass was requested while another one was running on the same root.
    Reentrant,
    /// The root was dropped before the scheduled work ran.
    RootUnmounted,
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::Render(err) => write!(f, "render aborted: {err}"),
            ReconcileError::Reentrant => write!(f, "work loop is not re-entrant"),
            ReconcileError::RootUnmounted => write!(f, "root is no longer alive"),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::Render(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RenderError> for ReconcileError {
    fn from(err: RenderError) -> Self {
        ReconcileError::Render(err)
    }
}
