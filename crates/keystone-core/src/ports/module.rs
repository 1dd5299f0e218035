//! Module port - the capability every managed subsystem implements.

use async_trait::async_trait;

use crate::domain::{HookError, ModuleId};

/// A named subsystem with declared dependencies and start/shutdown hooks.
///
/// # Contract
/// - `dependencies()` is constant for the lifetime of the module.
/// - `start()` runs only after every direct dependency's `start()` resolved.
/// - `shutdown()` runs only after every direct dependent's `shutdown()` resolved.
/// - Hooks may run on any task/thread of the runtime.
/// - The orchestrator never calls `start()` again until the module has been
///   shut down (or its failed start cleared by a shutdown request).
///
/// # 使用例
/// ```ignore
/// struct Cache { id: ModuleId, deps: Vec<ModuleId> }
///
/// #[async_trait]
/// impl Module for Cache {
///     fn id(&self) -> &ModuleId { &self.id }
///     fn dependencies(&self) -> &[ModuleId] { &self.deps }
///     async fn start(&self) -> Result<(), HookError> { Ok(()) }
///     async fn shutdown(&self) -> Result<(), HookError> { Ok(()) }
/// }
/// ```
#[async_trait]
pub trait Module: Send + Sync {
    fn id(&self) -> &ModuleId;

    /// Human-readable name; defaults to the id.
    fn name(&self) -> &str {
        self.id().as_str()
    }

    fn dependencies(&self) -> &[ModuleId];

    async fn start(&self) -> Result<(), HookError>;

    async fn shutdown(&self) -> Result<(), HookError>;
}
