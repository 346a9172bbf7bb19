//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TASKLOOM__*` 覆盖（双下划线表示嵌套，如 `TASKLOOM__ORCHESTRATOR__MAX_PLAN_STEPS=3`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub orchestrator: OrchestratorSection,
    pub runner: RunnerSection,
    pub runtime: RuntimeSection,
}

/// [orchestrator] 段：系统指令与循环上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    /// preamble 开头的系统指令，未设置则省略
    pub system_instruction: Option<String>,
    /// PlanStepping 最多执行的步数
    pub max_plan_steps: usize,
    /// BatchExecuting/Observing 最多轮数
    pub max_batch_passes: usize,
    /// 是否在 preamble 中附加指令的 JSON Schema
    pub include_schemas: bool,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            system_instruction: None,
            max_plan_steps: 10,
            max_batch_passes: 5,
            include_schemas: false,
        }
    }
}

/// [runner] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerSection {
    /// 单个动作超时（秒），0 表示不限制
    pub action_timeout_secs: u64,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            action_timeout_secs: 30,
        }
    }
}

/// [runtime] 段：默认 HTTP 能力的超时、UA、域名白名单
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    pub http_timeout_secs: u64,
    pub user_agent: String,
    /// 允许访问的 host；为空表示不限制
    pub allowed_hosts: Vec<String>,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            http_timeout_secs: 15,
            user_agent: concat!("taskloom/", env!("CARGO_PKG_VERSION")).to_string(),
            allowed_hosts: Vec::new(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 TASKLOOM__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TASKLOOM__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{}.toml", name)).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TASKLOOM")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("runtime.allowed_hosts"),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.orchestrator.max_plan_steps, 10);
        assert_eq!(cfg.orchestrator.max_batch_passes, 5);
        assert!(!cfg.orchestrator.include_schemas);
        assert_eq!(cfg.runner.action_timeout_secs, 30);
        assert!(cfg.runtime.allowed_hosts.is_empty());
    }

    #[test]
    fn test_load_from_file_with_partial_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[orchestrator]\nmax_plan_steps = 3\nsystem_instruction = \"Be brief.\"\n\n[runtime]\nallowed_hosts = [\"api.example.com\"]"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.orchestrator.max_plan_steps, 3);
        assert_eq!(cfg.orchestrator.max_batch_passes, 5);
        assert_eq!(cfg.orchestrator.system_instruction.as_deref(), Some("Be brief."));
        assert_eq!(cfg.runtime.allowed_hosts, vec!["api.example.com".to_string()]);
        assert_eq!(cfg.runner.action_timeout_secs, 30);
    }
}
