//! 图纸容器
//!
//! `Drawing` 拥有点仓库、实体表、按种类划分的空间索引和
//! 变更订阅方，是唯一的修改入口。每次修改都按同一套括号
//! 执行：先对全部受影响目标发 `Pending`，再改数据、再维护
//! 索引，然后为每个移动过的目标发一条合并的 `Moved`，最后
//! 发 `Complete`。级联移动（移动共享点带动多个实体）也只为
//! 每个实体产生一条 `Moved`。
//!
//! 所有锁定和存在性检查都在第一条事件发出前完成，校验失败
//! 时图纸保持原状。

use crate::entity::{Entity, EntityId, EntityKind, Geometry};
use crate::error::{CoreError, Result};
use crate::intersect::find_intersections;
use crate::math::{BoundingBox2, Point2, EPSILON};
use crate::notify::{Attr, ChangeEvent, ChangeListener, ChangeTarget, Notifier};
use crate::point::{Point, PointId, PointStore};
use crate::quadtree::QuadTree;
use crate::segment::SegEnd;
use std::collections::HashMap;
use tracing::debug;

/// 图纸
#[derive(Debug, Default)]
pub struct Drawing {
    points: PointStore,
    entities: HashMap<EntityId, Entity>,
    /// 自由点索引
    point_index: QuadTree<PointId>,
    /// 每个实体种类一棵索引
    entity_index: HashMap<EntityKind, QuadTree<EntityId>>,
    notifier: Notifier,
}

impl Drawing {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册变更订阅方
    pub fn subscribe(&mut self, listener: Box<dyn ChangeListener>) {
        self.notifier.subscribe(listener);
    }

    pub fn points(&self) -> &PointStore {
        &self.points
    }

    pub fn point(&self, id: PointId) -> Result<&Point> {
        self.points.get(id)
    }

    pub fn entity(&self, id: EntityId) -> Result<&Entity> {
        self.entities.get(&id).ok_or(CoreError::EntityNotFound(id))
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    // ------------------------------------------------------------------
    // 点的生命周期

    /// 创建新点并纳入索引
    pub fn add_point(&mut self, x: f64, y: f64) -> PointId {
        let id = self.points.insert(x, y);
        let points = &self.points;
        self.point_index.insert(
            id,
            point_bounds(points, id),
            &|pid, rect: &BoundingBox2| {
                points.position(pid).map(|p| rect.contains(&p)).unwrap_or(false)
            },
        );
        self.notifier.emit(ChangeEvent::Added {
            target: ChangeTarget::Point(id),
        });
        id
    }

    /// 删除点；仍被实体使用的点拒绝删除
    pub fn remove_point(&mut self, id: PointId) -> Result<()> {
        self.points.remove(id)?;
        self.point_index.delete(id);
        self.notifier.emit(ChangeEvent::Removed {
            target: ChangeTarget::Point(id),
        });
        Ok(())
    }

    pub fn set_point_locked(&mut self, id: PointId, locked: bool) -> Result<()> {
        self.points.set_locked(id, locked)
    }

    // ------------------------------------------------------------------
    // 实体的生命周期

    /// 登记实体：注册点使用者并纳入对应种类的索引
    pub fn add_entity(&mut self, geometry: Geometry) -> Result<EntityId> {
        self.add_entity_record(Entity::new(geometry))
    }

    fn add_entity_record(&mut self, entity: Entity) -> Result<EntityId> {
        // 先确认全部引用的点有效
        let bounds = entity.geometry.bounds(&self.points)?;
        let id = entity.id;
        let kind = entity.kind();

        for pid in entity.geometry.points() {
            self.points.add_user(pid, id)?;
        }
        self.entities.insert(id, entity);
        self.index_entity(kind, id, bounds);

        debug!(?id, ?kind, "entity added");
        self.notifier.emit(ChangeEvent::Added {
            target: ChangeTarget::Entity(id),
        });
        Ok(id)
    }

    /// 注销实体：释放点使用者并从索引删除
    pub fn remove_entity(&mut self, id: EntityId) -> Result<Entity> {
        let entity = self.entity(id)?;
        if entity.locked {
            return Err(CoreError::Locked);
        }
        let kind = entity.kind();
        let entity = self
            .entities
            .remove(&id)
            .ok_or(CoreError::EntityNotFound(id))?;
        for pid in entity.geometry.points() {
            self.points.release_user(pid, id)?;
        }
        if let Some(index) = self.entity_index.get_mut(&kind) {
            index.delete(id);
        }

        debug!(?id, ?kind, "entity removed");
        self.notifier.emit(ChangeEvent::Removed {
            target: ChangeTarget::Entity(id),
        });
        Ok(entity)
    }

    pub fn set_entity_locked(&mut self, id: EntityId, locked: bool) -> Result<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(CoreError::EntityNotFound(id))?;
        entity.locked = locked;
        Ok(())
    }

    /// 深拷贝实体：点和样式都复制为独立的新实例
    pub fn clone_entity(&mut self, id: EntityId) -> Result<EntityId> {
        let source = self.entity(id)?;
        let geometry = source.geometry.clone();
        let properties = source.properties.clone();

        let mut mapping: HashMap<PointId, PointId> = HashMap::new();
        for pid in geometry.points() {
            if !mapping.contains_key(&pid) {
                let pos = self.points.position(pid)?;
                let copy = self.add_point(pos.x, pos.y);
                mapping.insert(pid, copy);
            }
        }
        let remapped = geometry.remap(&|pid| *mapping.get(&pid).unwrap_or(&pid));
        self.add_entity_record(Entity::new(remapped).with_properties(properties))
    }

    // ------------------------------------------------------------------
    // 移动

    /// 平移点，带动所有使用它的实体
    ///
    /// 偏移量低于容差时不发任何事件，返回 `Ok(false)`。
    pub fn move_point(&mut self, id: PointId, dx: f64, dy: f64) -> Result<bool> {
        if dx.abs() < EPSILON && dy.abs() < EPSILON {
            return Ok(false);
        }
        if self.points.get(id)?.is_locked() {
            return Err(CoreError::Locked);
        }
        let affected = self.users_of(&[id])?;
        self.move_points_bracketed(&[id], &affected, dx, dy)?;
        Ok(true)
    }

    /// 平移实体：移动它拥有的每个点，被共享点带动的其他
    /// 实体各自收到一条合并的 `Moved`
    pub fn move_entity(&mut self, id: EntityId, dx: f64, dy: f64) -> Result<bool> {
        if dx.abs() < EPSILON && dy.abs() < EPSILON {
            return Ok(false);
        }
        let entity = self.entity(id)?;
        if entity.locked {
            return Err(CoreError::Locked);
        }

        let mut moved_points = entity.geometry.points();
        moved_points.sort();
        moved_points.dedup();
        for pid in &moved_points {
            if self.points.get(*pid)?.is_locked() {
                return Err(CoreError::Locked);
            }
        }
        let affected = self.users_of(&moved_points)?;
        self.move_points_bracketed(&moved_points, &affected, dx, dy)?;
        Ok(true)
    }

    /// 去重收集依赖这些点的全部实体，并预检锁定状态
    fn users_of(&self, point_ids: &[PointId]) -> Result<Vec<EntityId>> {
        let mut affected: Vec<EntityId> = Vec::new();
        for pid in point_ids {
            for eid in self.points.get(*pid)?.users() {
                if !affected.contains(eid) {
                    affected.push(*eid);
                }
            }
        }
        for eid in &affected {
            if self.entity(*eid)?.locked {
                return Err(CoreError::Locked);
            }
        }
        Ok(affected)
    }

    /// 括号化的移动主体：校验已在调用方完成
    fn move_points_bracketed(
        &mut self,
        point_ids: &[PointId],
        affected: &[EntityId],
        dx: f64,
        dy: f64,
    ) -> Result<()> {
        for pid in point_ids {
            self.notifier.emit(ChangeEvent::Pending {
                target: ChangeTarget::Point(*pid),
                attr: Attr::Location,
            });
        }
        for eid in affected {
            self.notifier.emit(ChangeEvent::Pending {
                target: ChangeTarget::Entity(*eid),
                attr: Attr::Location,
            });
        }

        for pid in point_ids {
            self.points.move_by(*pid, dx, dy)?;
        }
        for pid in point_ids {
            self.reindex_point(*pid)?;
        }
        for eid in affected {
            self.reindex_entity(*eid)?;
        }

        for pid in point_ids {
            self.notifier.emit(ChangeEvent::Moved {
                target: ChangeTarget::Point(*pid),
                dx,
                dy,
            });
        }
        for eid in affected {
            self.notifier.emit(ChangeEvent::Moved {
                target: ChangeTarget::Entity(*eid),
                dx,
                dy,
            });
        }

        for pid in point_ids {
            self.notifier.emit(ChangeEvent::Complete {
                target: ChangeTarget::Point(*pid),
                attr: Attr::Location,
            });
        }
        for eid in affected {
            self.notifier.emit(ChangeEvent::Complete {
                target: ChangeTarget::Entity(*eid),
                attr: Attr::Location,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // 属性修改

    /// 修改圆弧半径
    ///
    /// 校验在第一条事件之前完成，失败时不发任何事件。
    pub fn set_radius(&mut self, id: EntityId, radius: f64) -> Result<()> {
        self.expect_kind(id, EntityKind::Arc)?;
        if radius <= EPSILON {
            return Err(CoreError::InvalidRadius(radius));
        }
        self.mutate_attr(id, Attr::Radius, |geometry| match geometry {
            Geometry::Arc(arc) => arc.set_radius(radius),
            _ => Err(CoreError::WrongKind(id)),
        })
    }

    /// 修改圆弧起止角
    pub fn set_angles(&mut self, id: EntityId, start_deg: f64, end_deg: f64) -> Result<()> {
        self.expect_kind(id, EntityKind::Arc)?;
        self.mutate_attr(id, Attr::Angles, |geometry| match geometry {
            Geometry::Arc(arc) => {
                arc.set_angles(start_deg, end_deg);
                Ok(())
            }
            _ => Err(CoreError::WrongKind(id)),
        })
    }

    /// 修改引线箭头尺寸
    pub fn set_arrow_size(&mut self, id: EntityId, size: f64) -> Result<()> {
        self.expect_kind(id, EntityKind::Leader)?;
        if size < 0.0 {
            return Err(CoreError::InvalidArrowSize(size));
        }
        self.mutate_attr(id, Attr::ArrowSize, |geometry| match geometry {
            Geometry::Leader(leader) => leader.set_arrow_size(size),
            _ => Err(CoreError::WrongKind(id)),
        })
    }

    fn expect_kind(&self, id: EntityId, kind: EntityKind) -> Result<()> {
        if self.entity(id)?.kind() != kind {
            return Err(CoreError::WrongKind(id));
        }
        Ok(())
    }

    /// 重新指派线段端点，并同步点的使用者登记
    pub fn set_segment_endpoint(
        &mut self,
        id: EntityId,
        end: SegEnd,
        point: PointId,
    ) -> Result<()> {
        self.points.get(point)?;
        {
            let entity = self.entity(id)?;
            if entity.locked {
                return Err(CoreError::Locked);
            }
            // 互异性也在事件之前校验，失败时不发任何事件
            let other = match &entity.geometry {
                Geometry::Segment(seg) => match end {
                    SegEnd::P1 => seg.p2(),
                    SegEnd::P2 => seg.p1(),
                },
                _ => return Err(CoreError::WrongKind(id)),
            };
            if self.points.coincident(point, other)? {
                return Err(CoreError::CoincidentPoints);
            }
        }

        self.notifier.emit(ChangeEvent::Pending {
            target: ChangeTarget::Entity(id),
            attr: Attr::Endpoint,
        });

        let points = &self.points;
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(CoreError::EntityNotFound(id))?;
        let old = match &mut entity.geometry {
            Geometry::Segment(seg) => seg.set_endpoint(points, end, point)?,
            _ => return Err(CoreError::WrongKind(id)),
        };
        self.points.release_user(old, id)?;
        self.points.add_user(point, id)?;
        self.reindex_entity(id)?;

        self.notifier.emit(ChangeEvent::Complete {
            target: ChangeTarget::Entity(id),
            attr: Attr::Endpoint,
        });
        Ok(())
    }

    /// 属性修改的公共括号：校验、Pending、改几何、重索引、Complete
    fn mutate_attr<F>(&mut self, id: EntityId, attr: Attr, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Geometry) -> Result<()>,
    {
        let entity = self.entity(id)?;
        if entity.locked {
            return Err(CoreError::Locked);
        }

        self.notifier.emit(ChangeEvent::Pending {
            target: ChangeTarget::Entity(id),
            attr,
        });

        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(CoreError::EntityNotFound(id))?;
        apply(&mut entity.geometry)?;
        self.reindex_entity(id)?;

        self.notifier.emit(ChangeEvent::Complete {
            target: ChangeTarget::Entity(id),
            attr,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // 查询

    /// 查找坐标附近最近的点
    pub fn find_point(&self, x: f64, y: f64, tol: f64) -> Option<PointId> {
        let target = Point2::new(x, y);
        let points = &self.points;
        self.point_index
            .nearest(&target, tol, &|pid| {
                points.position(pid).ok().map(|p| (p - target).norm())
            })
            .map(|(id, _)| id)
    }

    /// 查找坐标附近最近的指定种类实体
    pub fn find_entity(&self, kind: EntityKind, x: f64, y: f64, tol: f64) -> Option<EntityId> {
        let index = self.entity_index.get(&kind)?;
        let target = Point2::new(x, y);
        let points = &self.points;
        let entities = &self.entities;
        index
            .nearest(&target, tol, &|eid| {
                let entity = entities.get(&eid)?;
                let mapped = entity.geometry.map_coords(points, x, y, tol).ok()??;
                Some((mapped - target).norm())
            })
            .map(|(id, _)| id)
    }

    /// 区域查询：索引粗筛后用每个实体的精确区域测试过滤
    pub fn entities_in_region(&self, rect: &BoundingBox2, fully: bool) -> Vec<EntityId> {
        let mut result = Vec::new();
        for kind in EntityKind::ALL {
            let Some(index) = self.entity_index.get(&kind) else {
                continue;
            };
            for eid in index.query_region(rect) {
                let hit = self
                    .entities
                    .get(&eid)
                    .map(|e| e.geometry.in_region(&self.points, rect, fully).unwrap_or(false))
                    .unwrap_or(false);
                if hit {
                    result.push(eid);
                }
            }
        }
        result.sort();
        result
    }

    // ------------------------------------------------------------------
    // 求交

    /// 两个实体的原始交点坐标
    pub fn intersections(&self, a: EntityId, b: EntityId) -> Result<Vec<Point2>> {
        let ea = self.entity(a)?;
        let eb = self.entity(b)?;
        find_intersections(&ea.geometry, &eb.geometry, &self.points)
    }

    /// 求交并落点：每个交点吸附到容差内已有的点上，否则新建
    ///
    /// 多个候选点距离并列（容差内）时取使用者最多的那个。
    pub fn intersection_points(
        &mut self,
        a: EntityId,
        b: EntityId,
        tol: f64,
    ) -> Result<Vec<PointId>> {
        let raw = self.intersections(a, b)?;
        let mut out = Vec::with_capacity(raw.len());
        for p in raw {
            out.push(self.snap_or_insert(&p, tol));
        }
        Ok(out)
    }

    /// 吸附：容差内最近的已有点，并列时取使用者最多的
    fn snap_or_insert(&mut self, target: &Point2, tol: f64) -> PointId {
        let region = BoundingBox2::new(*target, *target).pad(tol);
        let mut candidates: Vec<(PointId, f64)> = Vec::new();
        for pid in self.point_index.query_region(&region) {
            if let Ok(pos) = self.points.position(pid) {
                let d = (pos - target).norm();
                if d <= tol + EPSILON {
                    candidates.push((pid, d));
                }
            }
        }
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

        if let Some(&(_, best_d)) = candidates.first() {
            let snapped = candidates
                .iter()
                .take_while(|(_, d)| *d < best_d + EPSILON)
                .max_by_key(|(pid, _)| self.points.user_count(*pid).unwrap_or(0))
                .map(|(pid, _)| *pid);
            if let Some(pid) = snapped {
                return pid;
            }
        }
        self.add_point(target.x, target.y)
    }

    // ------------------------------------------------------------------
    // 索引维护

    fn index_entity(&mut self, kind: EntityKind, id: EntityId, bounds: BoundingBox2) {
        let points = &self.points;
        let entities = &self.entities;
        let index = self.entity_index.entry(kind).or_default();
        index.insert(id, bounds, &|eid, rect: &BoundingBox2| {
            entities
                .get(&eid)
                .map(|e| e.geometry.in_region(points, rect, false).unwrap_or(false))
                .unwrap_or(false)
        });
    }

    fn reindex_entity(&mut self, id: EntityId) -> Result<()> {
        let entity = self.entities.get(&id).ok_or(CoreError::EntityNotFound(id))?;
        let kind = entity.kind();
        let bounds = entity.geometry.bounds(&self.points)?;

        let points = &self.points;
        let entities = &self.entities;
        let Some(index) = self.entity_index.get_mut(&kind) else {
            return Ok(());
        };
        index.move_item(id, bounds, &|eid, rect: &BoundingBox2| {
            entities
                .get(&eid)
                .map(|e| e.geometry.in_region(points, rect, false).unwrap_or(false))
                .unwrap_or(false)
        })
    }

    fn reindex_point(&mut self, id: PointId) -> Result<()> {
        let points = &self.points;
        self.point_index.move_item(
            id,
            point_bounds(points, id),
            &|pid, rect: &BoundingBox2| {
                points.position(pid).map(|p| rect.contains(&p)).unwrap_or(false)
            },
        )
    }
}

/// 点的退化包围盒（仅供索引根节点生长）
fn point_bounds(points: &PointStore, id: PointId) -> BoundingBox2 {
    points
        .position(id)
        .map(|p| BoundingBox2::new(p, p))
        .unwrap_or_else(|_| BoundingBox2::from_coords(0.0, 0.0, 0.0, 0.0))
}
