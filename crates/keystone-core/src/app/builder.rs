//! OrchestratorBuilder - Orchestrator の構築とワイヤリング
//!
//! Registry・config・event sink・clock をまとめて Orchestrator を作る。
//! 宣言の問題は build() で返し、start まで持ち越さない。

use std::sync::Arc;

use crate::app::config::LifecycleConfig;
use crate::app::orchestrator::Orchestrator;
use crate::domain::ModuleId;
use crate::impls::TracingEventSink;
use crate::ports::{Clock, EventSink, Module, SystemClock};
use crate::registry::{ModuleRegistry, RegistryError, RegistryIssue};

/// OrchestratorBuilder は Orchestrator を構築
///
/// # 使用例
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .register(Database::new())?
///     .register(Api::new())?
///     .expect_modules(&["db", "api"])
///     .strict()
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - expect_modules() で期待される module id を登録
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
/// - strict() なら宣言の問題（未登録の依存、循環）も build() で返す
pub struct OrchestratorBuilder {
    registry: ModuleRegistry,
    config: LifecycleConfig,
    events: Option<Arc<dyn EventSink>>,
    clock: Option<Arc<dyn Clock>>,
    expected_modules: Option<Vec<ModuleId>>,
    strict: bool,
}

/// BuildError は Orchestrator 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing modules: {0:?}. These modules were expected but not registered.")]
    MissingModules(Vec<ModuleId>),

    #[error("invalid module declarations: {}", issue_list(.0))]
    Invalid(Vec<RegistryIssue>),
}

fn issue_list(issues: &[RegistryIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            registry: ModuleRegistry::new(),
            config: LifecycleConfig::default(),
            events: None,
            clock: None,
            expected_modules: None,
            strict: false,
        }
    }

    /// Module を登録
    pub fn register(self, module: impl Module + 'static) -> Result<Self, RegistryError> {
        self.register_arc(Arc::new(module))
    }

    /// 共有済みの Module を登録
    pub fn register_arc(mut self, module: Arc<dyn Module>) -> Result<Self, RegistryError> {
        self.registry.register(module)?;
        Ok(self)
    }

    pub fn config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Event の出力先（既定: TracingEventSink）
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// 既定: SystemClock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 期待される module id のリストを設定
    pub fn expect_modules(mut self, ids: &[&str]) -> Self {
        self.expected_modules = Some(ids.iter().map(|&id| ModuleId::from(id)).collect());
        self
    }

    /// build() 時に `ModuleRegistry::validate()` を実行する
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// # 検証
    /// - expect_modules() の id が全て登録されているか
    /// - strict() なら registry の宣言に問題がないか
    pub fn build(self) -> Result<Orchestrator, BuildError> {
        if let Some(expected) = &self.expected_modules {
            let missing: Vec<ModuleId> = expected
                .iter()
                .filter(|id| !self.registry.contains(id))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingModules(missing));
            }
        }

        if self.strict {
            self.registry.validate().map_err(BuildError::Invalid)?;
        }

        Ok(Orchestrator::with_parts(
            self.registry,
            self.config,
            self.events.unwrap_or_else(|| Arc::new(TracingEventSink)),
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        ))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
