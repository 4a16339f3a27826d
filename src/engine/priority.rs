// ==========================================
// 实验室产能排程系统 - 需求排序引擎
// ==========================================
// 职责: 决定需求进入分配器的顺序
// 输入: 未完成的需求列表 + 排序策略
// 输出: 排序后的需求列表（批次按需求内序号展开）
// ==========================================

use crate::config::RequestOrdering;
use crate::domain::demand::DemandRequest;
use serde_json::json;
use std::cmp::Ordering;

// ==========================================
// DemandPrioritySorter - 需求排序引擎
// ==========================================
pub struct DemandPrioritySorter {
    // 无状态引擎,不需要注入依赖
}

impl DemandPrioritySorter {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 排序需求列表
    ///
    /// PriorityFirst: 优先级降序 → 交期升序 → 提交顺序升序
    /// DueDateFirst:  交期升序 → 优先级降序 → 提交顺序升序
    /// 最终以 request_id 兜底，保证全序
    pub fn sort(&self, mut demands: Vec<DemandRequest>, ordering: RequestOrdering) -> Vec<DemandRequest> {
        demands.sort_by(|a, b| self.compare(a, b, ordering));
        demands
    }

    /// Ordering::Less 表示 a 优先于 b
    pub fn compare(&self, a: &DemandRequest, b: &DemandRequest, ordering: RequestOrdering) -> Ordering {
        let by_priority = b.priority.cmp(&a.priority);
        let by_due = a.due_date.cmp(&b.due_date);

        let head = match ordering {
            RequestOrdering::PriorityFirst => by_priority.then(by_due),
            RequestOrdering::DueDateFirst => by_due.then(by_priority),
        };

        head.then(a.submission_seq.cmp(&b.submission_seq))
            .then_with(|| a.request_id.cmp(&b.request_id))
    }

    /// 生成排序原因 (可解释性)
    pub fn generate_sort_reason(&self, demand: &DemandRequest, ordering: RequestOrdering) -> String {
        json!({
            "ordering": ordering.to_string(),
            "sort_keys": {
                "priority": demand.priority.to_string(),
                "due_date": demand.due_date.to_string(),
                "submission_seq": demand.submission_seq,
            }
        })
        .to_string()
    }
}

impl Default for DemandPrioritySorter {
    fn default() -> Self {
        Self::new()
    }
}
