//! 变更通知
//!
//! 所有图纸变更以 Pending/Complete 括号的形式广播：先对每个
//! 受影响的目标发出 `Pending`，完成全部修改和索引更新后，为
//! 每个移动过的目标发出一次合并的 `Moved`，最后发出
//! `Complete`。订阅方（撤销日志、依赖视图）因此只会观察到
//! 一致的前后状态，而不是一连串中间状态。
//!
//! 引擎不关心是否有订阅方存在。

use crate::entity::EntityId;
use crate::point::PointId;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// 通知目标：点或实体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeTarget {
    Point(PointId),
    Entity(EntityId),
}

/// 被修改的属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attr {
    /// 位置（点或整体移动）
    Location,
    /// 圆弧半径
    Radius,
    /// 圆弧起止角
    Angles,
    /// 线段端点指派
    Endpoint,
    /// 引线箭头尺寸
    ArrowSize,
}

/// 变更事件
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ChangeEvent {
    /// 修改即将开始
    Pending { target: ChangeTarget, attr: Attr },
    /// 修改已完成
    Complete { target: ChangeTarget, attr: Attr },
    /// 目标整体移动了 (dx, dy)；每次修改每个目标至多一条
    Moved {
        target: ChangeTarget,
        dx: f64,
        dy: f64,
    },
    /// 目标被加入图纸
    Added { target: ChangeTarget },
    /// 目标被移出图纸
    Removed { target: ChangeTarget },
}

/// 变更订阅方
pub trait ChangeListener {
    fn on_change(&mut self, event: &ChangeEvent);
}

/// 通知分发器
#[derive(Default)]
pub struct Notifier {
    listeners: Vec<Box<dyn ChangeListener>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册订阅方
    pub fn subscribe(&mut self, listener: Box<dyn ChangeListener>) {
        self.listeners.push(listener);
    }

    /// 向所有订阅方广播事件
    pub fn emit(&mut self, event: ChangeEvent) {
        for listener in &mut self.listeners {
            listener.on_change(&event);
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// 事件日志
///
/// 把收到的事件按序累积到共享缓冲区里，撤销日志和测试
/// 通过 [`EventLog::handle`] 读取。
#[derive(Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<ChangeEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 共享的事件缓冲区句柄
    pub fn handle(&self) -> Rc<RefCell<Vec<ChangeEvent>>> {
        Rc::clone(&self.events)
    }
}

impl ChangeListener for EventLog {
    fn on_change(&mut self, event: &ChangeEvent) {
        self.events.borrow_mut().push(*event);
    }
}
