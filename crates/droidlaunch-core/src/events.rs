//! Events emitted by streamed child processes

/// Output and lifecycle events from a streaming child process.
///
/// For any one process, `Exited` is sent at most once and always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A chunk of stderr as it arrived (not line-aligned)
    Stderr(String),

    /// The process has exited.
    ///
    /// `stderr` holds everything the process wrote to stderr over its
    /// lifetime. `code` is `None` when it was terminated by a signal.
    Exited { code: Option<i32>, stderr: String },
}
