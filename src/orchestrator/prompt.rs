//! Prompt 构建：固定 preamble（系统指令 + 能力列表 + 指令格式）+ 完整对话历史

use crate::capability::CapabilityInfo;
use crate::directive::{directive_schemas_json, DIRECTIVE_FORMATS};
use crate::memory::History;

/// 持有 preamble 所需的全部静态信息
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    system_instruction: Option<String>,
    capabilities: Vec<CapabilityInfo>,
    include_schemas: bool,
}

impl PromptBuilder {
    pub fn new(capabilities: Vec<CapabilityInfo>) -> Self {
        Self {
            capabilities,
            ..Default::default()
        }
    }

    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_schemas(mut self, include: bool) -> Self {
        self.include_schemas = include;
        self
    }

    /// 系统指令、能力列表（kind / 描述 / 签名）、三种指令格式
    pub fn preamble(&self) -> String {
        let mut out = String::new();
        if let Some(instruction) = &self.system_instruction {
            out.push_str(instruction.trim());
            out.push_str("\n\n");
        }

        out.push_str("## Capabilities\n");
        if self.capabilities.is_empty() {
            out.push_str("(none registered)\n");
        }
        for cap in &self.capabilities {
            out.push_str(&format!(
                "- {}: {}\n  Signature: {}\n",
                cap.kind, cap.description, cap.signature
            ));
        }

        out.push_str("\n## Directive formats\n");
        out.push_str(DIRECTIVE_FORMATS);

        if self.include_schemas {
            out.push_str("\n\n## Directive JSON Schemas\n");
            for (tag, schema) in directive_schemas_json() {
                out.push_str(&format!("### {}\n```json\n{}\n```\n", tag, schema));
            }
        }
        out
    }

    pub fn build(&self, history: &History) -> String {
        format!(
            "{}\n\n## Conversation\n{}\nAssistant:",
            self.preamble(),
            history.render()
        )
    }
}
