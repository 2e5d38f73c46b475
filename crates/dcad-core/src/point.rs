//! 点与点仓库
//!
//! 点是所有图元共享的基础坐标。实体不直接持有点的引用，
//! 而是持有仓库分配的稳定整数ID；仓库按槽位记录每个点的
//! 使用者（依赖该点的实体），使用者数量即引用计数。
//!
//! 点的相等是容差判定（每个坐标分量 |Δ| < 1e-10），而不是
//! 同一性判定。

use crate::entity::EntityId;
use crate::error::{CoreError, Result};
use crate::math::{approx_eq, Point2, EPSILON};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 点的稳定标识符
///
/// 序列化时实体以该整数ID引用点，ID在点的整个生命周期内不变。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PointId(pub u64);

/// 2D坐标点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    position: Point2,
    /// 使用者列表，长度即引用计数
    users: Vec<EntityId>,
    locked: bool,
}

impl Point {
    fn new(x: f64, y: f64) -> Self {
        Self {
            position: Point2::new(x, y),
            users: Vec::new(),
            locked: false,
        }
    }

    /// 获取坐标
    pub fn coords(&self) -> (f64, f64) {
        (self.position.x, self.position.y)
    }

    pub fn position(&self) -> Point2 {
        self.position
    }

    /// 与另一个点的容差相等判定
    pub fn eq_point(&self, other: &Point) -> bool {
        self.eq_coords(other.position.x, other.position.y)
    }

    /// 与原始坐标对的容差相等判定
    pub fn eq_coords(&self, x: f64, y: f64) -> bool {
        approx_eq(self.position.x, x) && approx_eq(self.position.y, y)
    }

    /// 当前使用者数量
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn users(&self) -> &[EntityId] {
        &self.users
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

/// 点仓库
///
/// 以稳定ID为键存放所有点；点的创建、移动和回收都经由
/// 仓库完成。带使用者的点不允许删除。
#[derive(Debug, Default)]
pub struct PointStore {
    slots: HashMap<PointId, Point>,
    next_id: u64,
}

impl PointStore {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            next_id: 1,
        }
    }

    /// 创建新点，返回其稳定ID
    pub fn insert(&mut self, x: f64, y: f64) -> PointId {
        let id = PointId(self.next_id);
        self.next_id += 1;
        self.slots.insert(id, Point::new(x, y));
        id
    }

    pub fn get(&self, id: PointId) -> Result<&Point> {
        self.slots.get(&id).ok_or(CoreError::PointNotFound(id))
    }

    pub fn contains(&self, id: PointId) -> bool {
        self.slots.contains_key(&id)
    }

    /// 获取点的坐标
    pub fn position(&self, id: PointId) -> Result<Point2> {
        Ok(self.get(id)?.position)
    }

    /// 平移点
    ///
    /// 偏移量两个分量都低于容差时不做任何事，返回 `Ok(false)`；
    /// 锁定的点拒绝移动。
    pub fn move_by(&mut self, id: PointId, dx: f64, dy: f64) -> Result<bool> {
        let point = self
            .slots
            .get_mut(&id)
            .ok_or(CoreError::PointNotFound(id))?;
        if point.locked {
            return Err(CoreError::Locked);
        }
        if dx.abs() < EPSILON && dy.abs() < EPSILON {
            return Ok(false);
        }
        point.position.x += dx;
        point.position.y += dy;
        Ok(true)
    }

    /// 登记一个使用者（实体构造时调用）
    pub fn add_user(&mut self, id: PointId, entity: EntityId) -> Result<()> {
        let point = self
            .slots
            .get_mut(&id)
            .ok_or(CoreError::PointNotFound(id))?;
        point.users.push(entity);
        Ok(())
    }

    /// 释放一个使用者（实体销毁时调用）
    pub fn release_user(&mut self, id: PointId, entity: EntityId) -> Result<()> {
        let point = self
            .slots
            .get_mut(&id)
            .ok_or(CoreError::PointNotFound(id))?;
        if let Some(pos) = point.users.iter().position(|e| *e == entity) {
            point.users.remove(pos);
        }
        Ok(())
    }

    pub fn user_count(&self, id: PointId) -> Result<usize> {
        Ok(self.get(id)?.user_count())
    }

    /// 删除点
    ///
    /// 仍有使用者的点不可删除，返回 `PointInUse`。
    pub fn remove(&mut self, id: PointId) -> Result<()> {
        let point = self.get(id)?;
        let count = point.user_count();
        if count > 0 {
            return Err(CoreError::PointInUse(count));
        }
        self.slots.remove(&id);
        Ok(())
    }

    pub fn set_locked(&mut self, id: PointId, locked: bool) -> Result<()> {
        let point = self
            .slots
            .get_mut(&id)
            .ok_or(CoreError::PointNotFound(id))?;
        point.locked = locked;
        Ok(())
    }

    /// 判断两个点是否重合（同一ID，或坐标在容差内相等）
    pub fn coincident(&self, a: PointId, b: PointId) -> Result<bool> {
        if a == b {
            return Ok(true);
        }
        let pa = self.get(a)?;
        let pb = self.get(b)?;
        Ok(pa.eq_point(pb))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PointId, &Point)> {
        self.slots.iter().map(|(id, p)| (*id, p))
    }
}
