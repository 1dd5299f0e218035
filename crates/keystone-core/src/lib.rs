//! keystone-core
//!
//! Core building blocks for the Keystone module lifecycle orchestrator.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, errors, events）
//! - **ports**: 抽象化レイヤー（Module, EventSink, Clock, IdGenerator）
//! - **graph**: 宣言された依存グラフと、起動中に発見した dependent index
//! - **registry**: id -> Module の登録
//! - **app**: アプリケーションロジック（builder, orchestrator, config, status）
//! - **impls**: 実装（TracingEventSink, MemoryEventSink）
//! - **error**: lifecycle のエラー型

pub mod app;
pub mod domain;
pub mod error;
pub mod graph;
pub mod impls;
pub mod ports;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{
    BuildError, CompletionHandle, HookErrorPolicy, LifecycleConfig, LifecycleCounts,
    ModuleStatus, Orchestrator, OrchestratorBuilder, ShutdownOrder,
};
pub use domain::{HookError, ModuleId, ModuleState, Phase};
pub use error::{BulkError, LifecycleError};
pub use ports::Module;
pub use registry::{ModuleRegistry, RegistryError, RegistryIssue};
