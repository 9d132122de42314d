//! Per-call facts consulted by the write-assurance policy

/// Execution facts supplied by the caller for each routing decision
///
/// The router never inspects process-wide state; whoever issues the query
/// knows whether a user is logged in or the process was started from a shell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    /// An authenticated interactive (backend) session is active
    pub has_authenticated_session: bool,
    /// The process was dispatched from the command line
    pub is_cli_dispatch: bool,
}

impl ExecutionContext {
    /// Anonymous, non-CLI context
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_authenticated_session(mut self, authenticated: bool) -> Self {
        self.has_authenticated_session = authenticated;
        self
    }

    pub fn with_cli_dispatch(mut self, cli: bool) -> Self {
        self.is_cli_dispatch = cli;
        self
    }
}
