//! Engine 构建器：统一的编排器初始化逻辑
//!
//! 按配置组装 能力注册表 → ActionRunner → Orchestrator，
//! 二进制入口与宿主程序共用同一套注册流程。

use std::sync::Arc;

use crate::capability::{
    register_builtins, ActionRunner, Capability, CapabilityRegistry, RuntimeContext,
};
use crate::config::AppConfig;
use crate::llm::Generator;
use crate::orchestrator::Orchestrator;
use crate::render::Renderer;

/// Engine 构建器
pub struct EngineBuilder {
    config: AppConfig,
    generator: Arc<dyn Generator>,
    capabilities: Vec<Arc<dyn Capability>>,
    context: Option<RuntimeContext>,
    renderer: Option<Arc<dyn Renderer>>,
    builtins: bool,
}

impl EngineBuilder {
    pub fn new(config: AppConfig, generator: Arc<dyn Generator>) -> Self {
        Self {
            config,
            generator,
            capabilities: Vec::new(),
            context: None,
            renderer: None,
            builtins: true,
        }
    }

    /// 追加宿主能力；与内置能力同名时覆盖内置
    pub fn with_capability(mut self, capability: impl Capability + 'static) -> Self {
        self.capabilities.push(Arc::new(capability));
        self
    }

    /// 替换运行时上下文（默认按 [runtime] 段构建真实 HTTP 与 tokio sleep）
    pub fn with_context(mut self, context: RuntimeContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// 不注册 echo / callApi / wait / calculate
    pub fn without_builtins(mut self) -> Self {
        self.builtins = false;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 构建能力注册表：先内置，再宿主能力
    pub fn build_registry(&self) -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        if self.builtins {
            register_builtins(&mut registry);
        }
        for cap in &self.capabilities {
            registry.register_arc(cap.clone());
        }
        registry
    }

    pub fn build(self) -> Orchestrator {
        let registry = self.build_registry();
        let context = self
            .context
            .unwrap_or_else(|| RuntimeContext::from_config(&self.config.runtime));
        let runner = ActionRunner::new(registry, context)
            .with_timeout_secs(self.config.runner.action_timeout_secs);

        tracing::info!(
            capabilities = ?runner.capabilities().iter().map(|c| c.kind.as_str()).collect::<Vec<_>>(),
            "Engine built"
        );

        let engine =
            Orchestrator::new(self.generator, runner).with_options(&self.config.orchestrator);
        match self.renderer {
            Some(renderer) => engine.with_renderer(renderer),
            None => engine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::EchoCapability;
    use crate::llm::ScriptedGenerator;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Shout;

    #[async_trait]
    impl Capability for Shout {
        fn kind(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo in upper case"
        }

        async fn run(&self, params: Value, _ctx: &RuntimeContext) -> Result<Value, String> {
            let text = params.get("text").and_then(Value::as_str).unwrap_or_default();
            Ok(json!(text.to_uppercase()))
        }
    }

    fn builder() -> EngineBuilder {
        EngineBuilder::new(AppConfig::default(), Arc::new(ScriptedGenerator::new(["ok"])))
    }

    #[test]
    fn test_registry_has_builtins() {
        let kinds = builder().build_registry().kinds();
        assert_eq!(kinds, vec!["calculate", "callApi", "echo", "wait"]);
    }

    #[test]
    fn test_without_builtins() {
        let registry = builder()
            .without_builtins()
            .with_capability(EchoCapability)
            .build_registry();
        assert_eq!(registry.kinds(), vec!["echo"]);
    }

    #[test]
    fn test_host_capability_overrides_builtin() {
        let registry = builder().with_capability(Shout).build_registry();
        assert_eq!(registry.len(), 4);
        let echo = registry.get("echo").unwrap();
        assert_eq!(echo.description(), "Echo in upper case");
    }

    #[test]
    fn test_build_applies_orchestrator_section() {
        let mut config = AppConfig::default();
        config.orchestrator.system_instruction = Some("Be brief.".to_string());
        let engine = EngineBuilder::new(config, Arc::new(ScriptedGenerator::new(["ok"])))
            .with_context(RuntimeContext::offline())
            .build();
        let preamble = engine.preamble();
        assert!(preamble.starts_with("Be brief."));
        assert!(preamble.contains("- callApi:"));
    }
}
