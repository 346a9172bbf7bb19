//! Orchestrator 主循环
//!
//! Generating -> Parsing -> (BatchExecuting | PlanStepping) -> Observing -> Generating ... -> Done。
//! 每轮 chat 自带 History、DependencyQueue 与已写入历史的结果 id 集合，Orchestrator 本身只读，可并发服务多轮对话。
//! 生成器失败直接返回 Err 结束本轮；动作失败以 status=error 的 tool 记录写回历史，由生成器决定如何处理。
//! stall、批次上限、计划步数上限都只记 warning 并正常返回。

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::capability::ActionRunner;
use crate::config::OrchestratorSection;
use crate::core::{Blocked, DependencyQueue, EngineError};
use crate::directive::{extract, ActionRequest, DisplayRequest, Extraction};
use crate::llm::Generator;
use crate::memory::{History, HistoryEntry};
use crate::orchestrator::{OrchestratorEvent, PromptBuilder, StopReason};
use crate::render::{Renderer, TracingRenderer};

/// PlanStepping 默认最多执行的步数
const DEFAULT_MAX_PLAN_STEPS: usize = 10;
/// BatchExecuting/Observing 默认最多轮数
const DEFAULT_MAX_BATCH_PASSES: usize = 5;

/// 一轮对话的输入：新的用户消息，或调用方提供的既有历史（多轮续聊）
#[derive(Debug, Clone)]
pub enum ChatInput {
    Text(String),
    History(Vec<HistoryEntry>),
}

impl From<&str> for ChatInput {
    fn from(s: &str) -> Self {
        ChatInput::Text(s.to_string())
    }
}

impl From<String> for ChatInput {
    fn from(s: String) -> Self {
        ChatInput::Text(s)
    }
}

impl From<Vec<HistoryEntry>> for ChatInput {
    fn from(entries: Vec<HistoryEntry>) -> Self {
        ChatInput::History(entries)
    }
}

/// 一轮对话的结果
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// 完整历史（含种子部分）
    pub history: Vec<HistoryEntry>,
    /// 已交给渲染器的展示请求（首次出现顺序）
    pub displays: Vec<DisplayRequest>,
    pub stop_reason: StopReason,
    /// 本轮生成器调用次数
    pub generations: usize,
    /// 本轮实际执行的动作数
    pub actions_run: usize,
}

impl ChatOutcome {
    /// 最后一条 assistant 内容
    pub fn last_reply(&self) -> Option<&str> {
        self.history.iter().rev().find_map(|e| match e {
            HistoryEntry::Assistant { content } => Some(content.as_str()),
            _ => None,
        })
    }
}

/// 单轮对话的可选项：取消令牌与事件通道
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub cancel_token: CancellationToken,
    pub event_tx: Option<UnboundedSender<OrchestratorEvent>>,
}

impl ChatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<OrchestratorEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }
}

/// 编排器：持有生成器、Action Runner、渲染器与 preamble；构建后只读
pub struct Orchestrator {
    generator: Arc<dyn Generator>,
    runner: Arc<ActionRunner>,
    renderer: Arc<dyn Renderer>,
    prompt: PromptBuilder,
    max_plan_steps: usize,
    max_batch_passes: usize,
}

impl Orchestrator {
    pub fn new(generator: Arc<dyn Generator>, runner: ActionRunner) -> Self {
        let prompt = PromptBuilder::new(runner.capabilities());
        Self {
            generator,
            runner: Arc::new(runner),
            renderer: Arc::new(TracingRenderer),
            prompt,
            max_plan_steps: DEFAULT_MAX_PLAN_STEPS,
            max_batch_passes: DEFAULT_MAX_BATCH_PASSES,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.prompt = self.prompt.with_system_instruction(Some(instruction.into()));
        self
    }

    pub fn with_max_plan_steps(mut self, max: usize) -> Self {
        self.max_plan_steps = max;
        self
    }

    pub fn with_max_batch_passes(mut self, max: usize) -> Self {
        self.max_batch_passes = max;
        self
    }

    /// 应用 [orchestrator] 配置段
    pub fn with_options(mut self, section: &OrchestratorSection) -> Self {
        self.prompt = self
            .prompt
            .with_system_instruction(section.system_instruction.clone())
            .with_schemas(section.include_schemas);
        self.max_plan_steps = section.max_plan_steps;
        self.max_batch_passes = section.max_batch_passes;
        self
    }

    pub fn runner(&self) -> &ActionRunner {
        &self.runner
    }

    pub fn preamble(&self) -> String {
        self.prompt.preamble()
    }

    pub async fn chat(&self, input: impl Into<ChatInput>) -> Result<ChatOutcome, EngineError> {
        self.chat_with(input, ChatOptions::default()).await
    }

    /// 在既有历史后追加一条用户消息再跑一轮；历史中已有结果的 id 不会重跑
    pub async fn continue_chat(
        &self,
        mut history: Vec<HistoryEntry>,
        user_input: &str,
    ) -> Result<ChatOutcome, EngineError> {
        history.push(HistoryEntry::user(user_input));
        self.chat(history).await
    }

    pub async fn chat_with(
        &self,
        input: impl Into<ChatInput>,
        options: ChatOptions,
    ) -> Result<ChatOutcome, EngineError> {
        let span = tracing::info_span!("chat", turn = %uuid::Uuid::new_v4());
        Turn::new(self, &options, input.into())
            .run()
            .instrument(span)
            .await
    }
}

/// 单轮对话的私有状态
struct Turn<'a> {
    engine: &'a Orchestrator,
    options: &'a ChatOptions,
    history: History,
    queue: DependencyQueue,
    /// 结果已写入历史的 id
    surfaced: HashSet<String>,
    displays: Vec<DisplayRequest>,
    display_ids: HashSet<String>,
    generations: usize,
    actions_run: usize,
}

impl<'a> Turn<'a> {
    fn new(engine: &'a Orchestrator, options: &'a ChatOptions, input: ChatInput) -> Self {
        let history = match input {
            ChatInput::Text(text) => History::from_entries(vec![HistoryEntry::user(text)]),
            ChatInput::History(entries) => History::from_entries(entries),
        };

        // 续聊：历史里已有结果的 id 视为已完成
        let mut queue = DependencyQueue::new();
        let mut surfaced = HashSet::new();
        for result in history.entries().iter().filter_map(HistoryEntry::as_result) {
            surfaced.insert(result.id.clone());
            queue.seed_result(result);
        }

        Self {
            engine,
            options,
            history,
            queue,
            surfaced,
            displays: Vec::new(),
            display_ids: HashSet::new(),
            generations: 0,
            actions_run: 0,
        }
    }

    async fn run(mut self) -> Result<ChatOutcome, EngineError> {
        let max_plan_steps = self.engine.max_plan_steps;
        let max_batch_passes = self.engine.max_batch_passes;

        let mut extraction = self.generate().await?;
        let mut plan: Option<VecDeque<ActionRequest>> = None;
        let mut plan_steps = 0usize;
        let mut batch_passes = 0usize;

        let reason = loop {
            let requests = std::mem::take(&mut extraction.requests);
            if let Some(new_plan) = extraction.plan.take() {
                if !requests.is_empty() {
                    self.warn(format!(
                        "Ignoring {} Task directive(s) emitted alongside a plan",
                        requests.len()
                    ));
                }
                if plan.is_some() {
                    tracing::debug!("new plan replaces the remaining steps");
                }
                plan = Some(new_plan.steps.into());
            } else if !requests.is_empty() {
                if plan.take().is_some() {
                    tracing::debug!("Task directives take over from the current plan");
                }
                self.queue.enqueue(requests);
            }

            // PlanStepping：一次一步，每步之后重新生成
            if let Some(steps) = plan.as_mut() {
                if let Some(step) = next_unfinished(steps, &self.queue) {
                    if plan_steps >= max_plan_steps {
                        self.warn(format!(
                            "Plan step limit ({}) reached; stopping",
                            max_plan_steps
                        ));
                        break StopReason::PlanStepCap {
                            max: max_plan_steps,
                        };
                    }
                    plan_steps += 1;
                    self.queue.enqueue([step.clone()]);
                    self.execute(step).await?;
                    extraction = self.generate().await?;
                    continue;
                }
                plan = None;
            }

            // BatchExecuting
            if batch_passes >= max_batch_passes {
                if self.queue.is_finished() {
                    break StopReason::Completed;
                }
                self.warn(format!(
                    "Batch pass limit ({}) reached with {} action(s) pending; stopping",
                    max_batch_passes,
                    self.queue.pending_ids().len()
                ));
                break StopReason::BatchPassCap {
                    max: max_batch_passes,
                };
            }

            let surfaced = self.drain().await?;
            if surfaced == 0 {
                if self.queue.is_finished() {
                    break StopReason::Completed;
                }
                let blocked = self.queue.blocked();
                self.warn(format!(
                    "Stalled: {} pending action(s) cannot become ready ({})",
                    blocked.len(),
                    describe_blocked(&blocked)
                ));
                break StopReason::Stalled { blocked };
            }
            batch_passes += 1;

            // Observing
            extraction = self.generate().await?;
        };

        Ok(self.finish(reason))
    }

    /// Generating + Parsing
    async fn generate(&mut self) -> Result<Extraction, EngineError> {
        let cancel = self.options.cancel_token.clone();
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        self.generations += 1;
        self.send(OrchestratorEvent::Generating {
            call: self.generations,
        });
        let prompt = self.engine.prompt.build(&self.history);
        tracing::debug!(
            call = self.generations,
            prompt_chars = prompt.len(),
            "calling generator"
        );

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            r = self.engine.generator.generate(&prompt) => r,
        };
        let text = match output {
            Ok(text) => text,
            Err(e) => {
                self.send(OrchestratorEvent::Error { text: e.clone() });
                return Err(EngineError::Generator(e));
            }
        };

        self.history.push(HistoryEntry::assistant(text.clone()));
        let extraction = extract(&text);

        for request in &extraction.displays {
            if self.display_ids.insert(request.id.clone()) {
                self.displays.push(request.clone());
            } else {
                tracing::debug!(id = %request.id, "display id already seen; not re-mounting");
            }
        }
        self.send(OrchestratorEvent::Directives {
            requests: extraction.requests.len(),
            displays: extraction.displays.len(),
            plan_steps: extraction.plan.as_ref().map(|p| p.steps.len()),
            rejected: extraction.rejected.len(),
        });
        Ok(extraction)
    }

    /// 执行所有当前可执行的请求，返回新写入历史的结果数
    async fn drain(&mut self) -> Result<usize, EngineError> {
        let mut surfaced = 0;
        while let Some(request) = self.queue.next_ready().cloned() {
            if self.execute(request).await? {
                surfaced += 1;
            }
        }
        Ok(surfaced)
    }

    /// 执行一个已在 pending 中的请求；取消时请求保持 pending（视为从未开始）
    async fn execute(&mut self, request: ActionRequest) -> Result<bool, EngineError> {
        let cancel = self.options.cancel_token.clone();
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        self.send(OrchestratorEvent::ActionStarted {
            id: request.id.clone(),
            kind: request.kind.clone(),
        });
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(id = %request.id, "action cancelled; left pending");
                return Err(EngineError::Cancelled);
            }
            r = self.engine.runner.run_task(&request) => r,
        };
        self.actions_run += 1;

        self.queue.complete(result.clone())?;
        self.send(OrchestratorEvent::ActionFinished {
            id: result.id.clone(),
            status: result.status,
        });

        if self.surfaced.insert(result.id.clone()) {
            self.history.push(HistoryEntry::tool(&result));
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Done：按首次出现顺序 mount 展示请求
    fn finish(self, reason: StopReason) -> ChatOutcome {
        for display in &self.displays {
            self.engine.renderer.mount(display);
        }
        tracing::info!(
            generations = self.generations,
            actions = self.actions_run,
            history = self.history.len(),
            reason = ?reason,
            "chat turn finished"
        );
        self.send(OrchestratorEvent::Done {
            reason: reason.clone(),
        });

        ChatOutcome {
            history: self.history.into_entries(),
            displays: self.displays,
            stop_reason: reason,
            generations: self.generations,
            actions_run: self.actions_run,
        }
    }

    fn send(&self, event: OrchestratorEvent) {
        if let Some(tx) = &self.options.event_tx {
            let _ = tx.send(event);
        }
    }

    fn warn(&self, text: String) {
        tracing::warn!("{}", text);
        self.send(OrchestratorEvent::Warning { text });
    }
}

/// 弹出下一个尚无结果的计划步骤；已完成的步骤直接跳过
fn next_unfinished(
    steps: &mut VecDeque<ActionRequest>,
    queue: &DependencyQueue,
) -> Option<ActionRequest> {
    while let Some(step) = steps.pop_front() {
        if queue.has_result(&step.id) {
            tracing::debug!(id = %step.id, "plan step already has a result; skipping");
            continue;
        }
        return Some(step);
    }
    None
}

fn describe_blocked(blocked: &[Blocked]) -> String {
    blocked
        .iter()
        .map(|b| format!("{} waits on [{}]", b.id, b.missing.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}
