//! 编排过程事件：用于流式/SSE 展示生成、指令、动作执行与结束原因

use serde::Serialize;

use crate::core::Blocked;
use crate::directive::ActionStatus;

/// 一轮对话为何结束
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// 没有待执行的请求
    Completed,
    /// 队列未完成但本轮没有任何请求可执行
    Stalled { blocked: Vec<Blocked> },
    /// 达到批次轮数上限
    BatchPassCap { max: usize },
    /// 达到计划步数上限
    PlanStepCap { max: usize },
}

impl StopReason {
    /// 是否因 stall / 上限提前结束
    pub fn is_warning(&self) -> bool {
        !matches!(self, StopReason::Completed)
    }
}

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// 第 call 次调用生成器
    Generating { call: usize },
    /// 本次生成解析出的指令数量
    Directives {
        requests: usize,
        displays: usize,
        plan_steps: Option<usize>,
        rejected: usize,
    },
    ActionStarted { id: String, kind: String },
    ActionFinished { id: String, status: ActionStatus },
    /// stall、上限、被忽略的指令等
    Warning { text: String },
    Error { text: String },
    Done { reason: StopReason },
}
