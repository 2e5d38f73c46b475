//! 四叉树空间索引
//!
//! 每个节点覆盖一个轴对齐矩形区域；叶节点直接存放条目，
//! 内部节点有 NE/NW/SW/SE 四个子节点。条目的归属由调用方
//! 提供的精确区域谓词决定：下降和入叶都询问谓词，而不是
//! 只比较包围盒——无限构造线的包围盒只覆盖关键点，靠谓词
//! 才能落进它实际穿过的每一片叶子。一个条目可以合法地
//! 出现在多个叶节点中。
//!
//! 包围盒缓存只用于根节点的生长和重建。

use crate::error::{CoreError, Result};
use crate::math::{BoundingBox2, Point2, EPSILON};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, trace};

/// 叶节点分裂前可容纳的条目数
const NODE_CAPACITY: usize = 8;

/// 节点的最小边长，低于此值不再分裂
const MIN_NODE_SPAN: f64 = 1.0;

/// 四叉树节点
#[derive(Debug)]
struct Node<I> {
    boundary: BoundingBox2,
    items: Vec<I>,
    /// NE、NW、SW、SE 顺序的子节点
    children: Option<Box<[Node<I>; 4]>>,
}

impl<I: Copy + Eq + Hash + Debug> Node<I> {
    fn new(boundary: BoundingBox2) -> Self {
        Self {
            boundary,
            items: Vec::new(),
            children: None,
        }
    }

    fn insert<F>(&mut self, id: I, pred: &F)
    where
        F: Fn(I, &BoundingBox2) -> bool,
    {
        if let Some(children) = &mut self.children {
            let mut placed = false;
            for child in children.iter_mut() {
                if pred(id, &child.boundary) {
                    child.insert(id, pred);
                    placed = true;
                }
            }
            // 没有子节点接纳时留在本层
            if !placed {
                self.items.push(id);
            }
            return;
        }

        self.items.push(id);
        if self.items.len() > NODE_CAPACITY
            && self.boundary.width() > MIN_NODE_SPAN
            && self.boundary.height() > MIN_NODE_SPAN
        {
            self.subdivide(pred);
        }
    }

    /// 分裂为四个子节点并下放现有条目
    fn subdivide<F>(&mut self, pred: &F)
    where
        F: Fn(I, &BoundingBox2) -> bool,
    {
        let c = self.boundary.center();
        let (min, max) = (self.boundary.min, self.boundary.max);
        let mut children = Box::new([
            Node::new(BoundingBox2::from_coords(c.x, c.y, max.x, max.y)), // NE
            Node::new(BoundingBox2::from_coords(min.x, c.y, c.x, max.y)), // NW
            Node::new(BoundingBox2::from_coords(min.x, min.y, c.x, c.y)), // SW
            Node::new(BoundingBox2::from_coords(c.x, min.y, max.x, c.y)), // SE
        ]);
        trace!(boundary = ?self.boundary, "quadtree node subdivide");

        for id in std::mem::take(&mut self.items) {
            let mut placed = false;
            for child in children.iter_mut() {
                if pred(id, &child.boundary) {
                    child.items.push(id);
                    placed = true;
                }
            }
            if !placed {
                self.items.push(id);
            }
        }
        self.children = Some(children);
    }

    /// 整树删除；条目可能分布在任意多个节点中
    fn remove(&mut self, id: I) {
        self.items.retain(|i| *i != id);
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                child.remove(id);
            }
            // 自底向上合并全空的子节点
            if children
                .iter()
                .all(|c| c.items.is_empty() && c.children.is_none())
            {
                trace!(boundary = ?self.boundary, "quadtree node prune");
                self.children = None;
            }
        }
    }

    fn query(&self, rect: &BoundingBox2, out: &mut Vec<I>, seen: &mut HashSet<I>) {
        if !self.boundary.intersects(rect) {
            return;
        }
        for id in &self.items {
            if seen.insert(*id) {
                out.push(*id);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query(rect, out, seen);
            }
        }
    }

    fn nearest<F>(
        &self,
        target: &Point2,
        dist: &F,
        best: &mut Option<(I, f64)>,
        limit: f64,
        seen: &mut HashSet<I>,
    ) where
        F: Fn(I) -> Option<f64>,
    {
        // 超出当前最优距离（加容差）的子树整体剪掉
        let bound = (*best).map_or(limit, |(_, d)| d.min(limit));
        if self.boundary.distance_to_point(target) > bound + EPSILON {
            return;
        }

        for id in &self.items {
            if !seen.insert(*id) {
                continue;
            }
            if let Some(d) = dist(*id) {
                if d <= limit + EPSILON && (*best).map_or(true, |(_, bd)| d < bd) {
                    *best = Some((*id, d));
                    if d < EPSILON {
                        return;
                    }
                }
            }
        }

        if let Some(children) = &self.children {
            for child in children.iter() {
                child.nearest(target, dist, best, limit, seen);
                if matches!(*best, Some((_, d)) if d < EPSILON) {
                    return;
                }
            }
        }
    }

    #[cfg(test)]
    fn check_leaves<F>(&self, pred: &F) -> bool
    where
        F: Fn(I, &BoundingBox2) -> bool,
    {
        self.items.iter().all(|id| pred(*id, &self.boundary))
            && self.children.as_ref().map_or(true, |children| {
                children.iter().all(|c| c.check_leaves(pred))
            })
    }
}

/// 四叉树
///
/// 按条目ID索引，条目的几何语义完全由调用方的谓词和距离
/// 闭包提供，索引本身不持有几何。
#[derive(Debug)]
pub struct QuadTree<I> {
    root: Node<I>,
    /// 已索引条目的包围盒，用于根节点生长时的重建
    bounds_cache: HashMap<I, BoundingBox2>,
}

impl<I: Copy + Eq + Hash + Debug> QuadTree<I> {
    /// 创建覆盖指定初始区域的空索引
    pub fn new(boundary: BoundingBox2) -> Self {
        Self {
            root: Node::new(boundary),
            bounds_cache: HashMap::new(),
        }
    }

    /// 已索引的条目数
    pub fn len(&self) -> usize {
        self.bounds_cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds_cache.is_empty()
    }

    /// 条目是否已被索引
    pub fn contains(&self, id: I) -> bool {
        self.bounds_cache.contains_key(&id)
    }

    /// 插入条目
    ///
    /// `bounds` 只用于根节点生长；归属判定完全依赖 `pred`，
    /// 它回答"条目是否与给定节点区域相交"。重复插入已索引
    /// 的条目是无操作。
    pub fn insert<F>(&mut self, id: I, bounds: BoundingBox2, pred: &F)
    where
        F: Fn(I, &BoundingBox2) -> bool,
    {
        if self.bounds_cache.contains_key(&id) {
            trace!(?id, "quadtree insert skipped, already indexed");
            return;
        }
        if !self.root.boundary.contains_box(&bounds) {
            self.grow(&bounds, pred);
        }
        self.bounds_cache.insert(id, bounds);
        self.root.insert(id, pred);
    }

    /// 扩大根节点区域并重建整棵树
    fn grow<F>(&mut self, bounds: &BoundingBox2, pred: &F)
    where
        F: Fn(I, &BoundingBox2) -> bool,
    {
        let boundary = self.root.boundary.union(bounds).pad(1.0);
        debug!(?boundary, items = self.bounds_cache.len(), "quadtree grow");

        self.root = Node::new(boundary);
        let entries: Vec<I> = self.bounds_cache.keys().copied().collect();
        for id in entries {
            self.root.insert(id, pred);
        }
    }

    /// 删除条目；未被索引时静默返回 `false`
    pub fn delete(&mut self, id: I) -> bool {
        if self.bounds_cache.remove(&id).is_none() {
            return false;
        }
        self.root.remove(id);
        true
    }

    /// 移动条目：按新包围盒删除再插入
    ///
    /// 移动未被索引的条目是硬错误。
    pub fn move_item<F>(&mut self, id: I, bounds: BoundingBox2, pred: &F) -> Result<()>
    where
        F: Fn(I, &BoundingBox2) -> bool,
    {
        if !self.bounds_cache.contains_key(&id) {
            return Err(CoreError::NotIndexed);
        }
        self.delete(id);
        self.insert(id, bounds, pred);
        Ok(())
    }

    /// 区域查询
    ///
    /// 返回所有可能与矩形相关的条目（去重）；精确的几何
    /// 过滤由调用方完成。
    pub fn query_region(&self, rect: &BoundingBox2) -> Vec<I> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.root.query(rect, &mut out, &mut seen);
        out
    }

    /// 最近条目查询
    ///
    /// `dist` 给出条目到目标点的距离（`None` 表示该条目不参与），
    /// `limit` 限制搜索半径。按节点到目标的距离剪枝，找到
    /// 容差内的条目立即短路返回。
    pub fn nearest<F>(&self, target: &Point2, limit: f64, dist: &F) -> Option<(I, f64)>
    where
        F: Fn(I) -> Option<f64>,
    {
        let mut best = None;
        let mut seen = HashSet::new();
        self.root.nearest(target, dist, &mut best, limit, &mut seen);
        best
    }

    /// 已索引条目的迭代器
    pub fn iter_ids(&self) -> impl Iterator<Item = I> + '_ {
        self.bounds_cache.keys().copied()
    }

    #[cfg(test)]
    fn leaves_consistent<F>(&self, pred: &F) -> bool
    where
        F: Fn(I, &BoundingBox2) -> bool,
    {
        self.root.check_leaves(pred)
    }
}

impl<I: Copy + Eq + Hash + Debug> Default for QuadTree<I> {
    fn default() -> Self {
        Self::new(BoundingBox2::from_coords(-100.0, -100.0, 100.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 以点集为条目的测试夹具：条目是坐标表中的下标
    struct Fixture {
        coords: Vec<Point2>,
        tree: QuadTree<usize>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                coords: Vec::new(),
                tree: QuadTree::default(),
            }
        }

        fn add(&mut self, x: f64, y: f64) -> usize {
            let id = self.coords.len();
            self.coords.push(Point2::new(x, y));
            let bounds = BoundingBox2::new(self.coords[id], self.coords[id]);
            let coords = self.coords.clone();
            self.tree
                .insert(id, bounds, &|i, rect: &BoundingBox2| rect.contains(&coords[i]));
            id
        }

        fn pred(&self) -> impl Fn(usize, &BoundingBox2) -> bool + '_ {
            |i, rect| rect.contains(&self.coords[i])
        }
    }

    #[test]
    fn test_insert_and_query() {
        let mut fx = Fixture::new();
        for i in 0..20 {
            fx.add(i as f64 * 4.0, i as f64 * 2.0);
        }
        assert_eq!(fx.tree.len(), 20);

        let hits = fx.tree.query_region(&BoundingBox2::from_coords(
            -1.0, -1.0, 17.0, 50.0,
        ));
        // 粗筛结果至少包含区域内的所有条目
        for i in 0..5 {
            assert!(hits.contains(&i));
        }
        assert!(fx.tree.leaves_consistent(&fx.pred()));
    }

    #[test]
    fn test_duplicate_insert_noop() {
        let mut fx = Fixture::new();
        let id = fx.add(5.0, 5.0);

        let bounds = BoundingBox2::new(fx.coords[id], fx.coords[id]);
        let coords = fx.coords.clone();
        fx.tree
            .insert(id, bounds, &|i, rect: &BoundingBox2| rect.contains(&coords[i]));
        assert_eq!(fx.tree.len(), 1);
        assert_eq!(fx.tree.query_region(&fx.tree.root.boundary).len(), 1);
    }

    #[test]
    fn test_delete_untracked_noop() {
        let mut fx = Fixture::new();
        let id = fx.add(5.0, 5.0);

        assert!(!fx.tree.delete(999));
        assert!(fx.tree.delete(id));
        assert!(!fx.tree.delete(id));
        assert!(fx.tree.is_empty());
    }

    #[test]
    fn test_move_untracked_is_error() {
        let mut fx = Fixture::new();
        fx.add(5.0, 5.0);

        let bounds = BoundingBox2::from_coords(0.0, 0.0, 1.0, 1.0);
        assert_eq!(
            fx.tree.move_item(999, bounds, &|_, _: &BoundingBox2| true),
            Err(CoreError::NotIndexed)
        );
    }

    #[test]
    fn test_grow_beyond_root() {
        let mut fx = Fixture::new();
        let near = fx.add(5.0, 5.0);
        // 远超初始根区域
        let far = fx.add(5000.0, 5000.0);

        assert!(fx
            .tree
            .query_region(&BoundingBox2::from_coords(4.0, 4.0, 6.0, 6.0))
            .contains(&near));
        assert!(fx
            .tree
            .query_region(&BoundingBox2::from_coords(4999.0, 4999.0, 5001.0, 5001.0))
            .contains(&far));
        assert!(fx.tree.leaves_consistent(&fx.pred()));
    }

    #[test]
    fn test_subdivision_keeps_items_reachable() {
        let mut fx = Fixture::new();
        // 聚在一个象限里触发分裂
        for i in 0..30 {
            fx.add(10.0 + (i % 6) as f64, 10.0 + (i / 6) as f64);
        }
        let all = fx.tree.query_region(&fx.tree.root.boundary);
        assert_eq!(all.len(), 30);
        assert!(fx.tree.leaves_consistent(&fx.pred()));
    }

    #[test]
    fn test_nearest() {
        let mut fx = Fixture::new();
        let a = fx.add(1.0, 1.0);
        let b = fx.add(50.0, 50.0);
        fx.add(-80.0, 90.0);

        let coords = fx.coords.clone();
        let target = Point2::new(2.0, 1.0);
        let (found, d) = fx
            .tree
            .nearest(&target, 10.0, &|i| Some((coords[i] - target).norm()))
            .unwrap();
        assert_eq!(found, a);
        assert!((d - 1.0).abs() < EPSILON);

        // 搜索半径之外
        let far_target = Point2::new(49.0, 50.0);
        assert!(fx
            .tree
            .nearest(&far_target, 0.5, &|i| Some((coords[i] - far_target).norm()))
            .is_none());
        let (found, _) = fx
            .tree
            .nearest(&far_target, 2.0, &|i| Some((coords[i] - far_target).norm()))
            .unwrap();
        assert_eq!(found, b);
    }
}
