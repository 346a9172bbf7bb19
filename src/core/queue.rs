//! 依赖队列
//!
//! 记录 pending 请求（保持插入顺序）与已完成结果；next_ready 返回第一个依赖全部有结果的请求。
//! 依赖只看「是否有结果」，不看结果状态：失败的依赖同样会放行下游。
//! 已有结果的 id 再次 enqueue 时只更新定义，不会重新执行。

use std::collections::HashMap;

use serde::Serialize;

use crate::core::QueueError;
use crate::directive::{ActionRequest, ActionResult};

/// 被阻塞的 pending 请求：id 与尚无结果的依赖
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blocked {
    pub id: String,
    pub missing: Vec<String>,
}

/// 单轮对话私有的依赖队列
#[derive(Debug, Default)]
pub struct DependencyQueue {
    /// pending id，按插入顺序
    pending: Vec<String>,
    /// 所有已知请求的最新定义
    requests: HashMap<String, ActionRequest>,
    results: HashMap<String, ActionResult>,
}

impl DependencyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个或多个请求，返回新进入 pending 的数量
    pub fn enqueue<I>(&mut self, requests: I) -> usize
    where
        I: IntoIterator<Item = ActionRequest>,
    {
        let mut added = 0;
        for req in requests {
            let id = req.id.clone();
            if self.results.contains_key(&id) {
                tracing::debug!(id = %id, "action already has a result; not re-running");
            } else if !self.pending.contains(&id) {
                self.pending.push(id.clone());
                added += 1;
            }
            self.requests.insert(id, req);
        }
        added
    }

    /// 第一个依赖全部有结果的 pending 请求（插入顺序）
    pub fn next_ready(&self) -> Option<&ActionRequest> {
        self.pending
            .iter()
            .filter_map(|id| self.requests.get(id))
            .find(|req| req.depends_on.iter().all(|dep| self.results.contains_key(dep)))
    }

    /// 记录结果并移出 pending；id 不在 pending 中说明调用方违约
    pub fn complete(&mut self, result: ActionResult) -> Result<(), QueueError> {
        let Some(idx) = self.pending.iter().position(|id| id == &result.id) else {
            return Err(if self.results.contains_key(&result.id) {
                QueueError::AlreadyCompleted(result.id)
            } else {
                QueueError::Unknown(result.id)
            });
        };
        self.pending.remove(idx);
        self.results.insert(result.id.clone(), result);
        Ok(())
    }

    /// 记录上一轮已有的结果（多轮续聊）；不经过 pending。id 已知时忽略并返回 false
    pub fn seed_result(&mut self, result: ActionResult) -> bool {
        if self.results.contains_key(&result.id) || self.pending.contains(&result.id) {
            return false;
        }
        self.results.insert(result.id.clone(), result);
        true
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn has_result(&self, id: &str) -> bool {
        self.results.contains_key(id)
    }

    pub fn result(&self, id: &str) -> Option<&ActionResult> {
        self.results.get(id)
    }

    pub fn request(&self, id: &str) -> Option<&ActionRequest> {
        self.requests.get(id)
    }

    pub fn pending_ids(&self) -> &[String] {
        &self.pending
    }

    /// 所有 pending 请求及其尚无结果的依赖（用于 stall 日志）
    pub fn blocked(&self) -> Vec<Blocked> {
        self.pending
            .iter()
            .filter_map(|id| self.requests.get(id))
            .map(|req| Blocked {
                id: req.id.clone(),
                missing: req
                    .depends_on
                    .iter()
                    .filter(|dep| !self.results.contains_key(*dep))
                    .cloned()
                    .collect(),
            })
            .collect()
    }
}
