//! Single-instance lock and process self-replacement.

pub mod launcher;
pub mod lock;
pub mod manager;

pub use launcher::{CommandLauncher, Invocation, ProcessLauncher};
pub use lock::{ExclusivityLock, FileLock};
pub use manager::LifecycleManager;
