//! App - アプリケーション層
//!
//! このモジュールは、ports と registry を組み合わせて lifecycle を実装します。
//!
//! # 主要コンポーネント
//! - **OrchestratorBuilder**: Orchestrator の構築とワイヤリング
//! - **Orchestrator**: 依存順の start / shutdown
//! - **LifecycleConfig**: timeout・shutdown 順序・hook error の扱い
//! - **Status**: module ごとの状態と集計

pub mod builder;
pub mod config;
pub mod orchestrator;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, OrchestratorBuilder};
pub use self::config::{HookErrorPolicy, LifecycleConfig, ShutdownOrder};
pub use self::orchestrator::{CompletionHandle, Orchestrator};
pub use self::status::{LifecycleCounts, ModuleStatus};
