//! 线段
//!
//! 两个互异点之间的有界线段。互异性（不同ID且坐标在容差
//! 之外）在构造和端点重新指派时都强制检查。

use crate::error::{CoreError, Result};
use crate::math::{line_intersects_rect, BoundingBox2, Point2, EPSILON};
use crate::point::{PointId, PointStore};
use serde::{Deserialize, Serialize};

/// 线段端点标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegEnd {
    P1,
    P2,
}

/// 线段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    p1: PointId,
    p2: PointId,
}

impl Segment {
    /// 创建新线段，两端点必须互异
    pub fn new(store: &PointStore, p1: PointId, p2: PointId) -> Result<Self> {
        if store.coincident(p1, p2)? {
            return Err(CoreError::CoincidentPoints);
        }
        Ok(Self { p1, p2 })
    }

    pub fn p1(&self) -> PointId {
        self.p1
    }

    pub fn p2(&self) -> PointId {
        self.p2
    }

    pub fn endpoints(&self) -> (PointId, PointId) {
        (self.p1, self.p2)
    }

    pub fn points(&self) -> [PointId; 2] {
        [self.p1, self.p2]
    }

    /// 重新指派端点，保持互异性；失败时线段保持原状
    pub(crate) fn set_endpoint(
        &mut self,
        store: &PointStore,
        end: SegEnd,
        point: PointId,
    ) -> Result<PointId> {
        let other = match end {
            SegEnd::P1 => self.p2,
            SegEnd::P2 => self.p1,
        };
        if store.coincident(point, other)? {
            return Err(CoreError::CoincidentPoints);
        }
        let old = match end {
            SegEnd::P1 => std::mem::replace(&mut self.p1, point),
            SegEnd::P2 => std::mem::replace(&mut self.p2, point),
        };
        Ok(old)
    }

    pub(crate) fn remap(&self, f: &impl Fn(PointId) -> PointId) -> Self {
        Self {
            p1: f(self.p1),
            p2: f(self.p2),
        }
    }

    /// 计算线段长度
    pub fn length(&self, store: &PointStore) -> Result<f64> {
        let (a, b) = self.positions(store)?;
        Ok((b - a).norm())
    }

    /// 计算线段中点
    pub fn midpoint(&self, store: &PointStore) -> Result<Point2> {
        let (a, b) = self.positions(store)?;
        Ok(Point2::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0))
    }

    fn positions(&self, store: &PointStore) -> Result<(Point2, Point2)> {
        Ok((store.position(self.p1)?, store.position(self.p2)?))
    }

    /// 获取包围盒
    pub fn bounds(&self, store: &PointStore) -> Result<BoundingBox2> {
        let (a, b) = self.positions(store)?;
        Ok(BoundingBox2::from_points([a, b]))
    }

    /// 映射到线段上最近的点（容差内）
    ///
    /// 垂直、水平线段单独判定，避免以通用斜率计算时的
    /// 零分母。
    pub fn map_coords(
        &self,
        store: &PointStore,
        x: f64,
        y: f64,
        tol: f64,
    ) -> Result<Option<Point2>> {
        let (a, b) = self.positions(store)?;
        let target = Point2::new(x, y);

        let proj = if (b.x - a.x).abs() < EPSILON {
            // 垂直线段
            let (ymin, ymax) = (a.y.min(b.y), a.y.max(b.y));
            Point2::new(a.x, y.clamp(ymin, ymax))
        } else if (b.y - a.y).abs() < EPSILON {
            // 水平线段
            let (xmin, xmax) = (a.x.min(b.x), a.x.max(b.x));
            Point2::new(x.clamp(xmin, xmax), a.y)
        } else {
            let d = b - a;
            let len2 = d.norm_squared();
            if len2 < EPSILON {
                return Ok(None);
            }
            let t = ((target - a).dot(&d) / len2).clamp(0.0, 1.0);
            a + d * t
        };

        if (proj - target).norm() <= tol {
            Ok(Some(proj))
        } else {
            Ok(None)
        }
    }

    /// 区域测试：先做包围盒剔除，再做精确的线段-矩形裁剪
    pub fn in_region(
        &self,
        store: &PointStore,
        rect: &BoundingBox2,
        fully: bool,
    ) -> Result<bool> {
        let (a, b) = self.positions(store)?;
        if !rect.intersects(&BoundingBox2::from_points([a, b])) {
            return Ok(false);
        }
        if fully {
            return Ok(rect.contains(&a) && rect.contains(&b));
        }
        Ok(line_intersects_rect(&a, &(b - a), rect, 0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::points_approx_eq;

    fn store_with(coords: &[(f64, f64)]) -> (PointStore, Vec<PointId>) {
        let mut store = PointStore::new();
        let ids = coords.iter().map(|(x, y)| store.insert(*x, *y)).collect();
        (store, ids)
    }

    #[test]
    fn test_coincident_endpoints_rejected() {
        let (store, ids) = store_with(&[(0.0, 0.0), (1e-12, -1e-12)]);
        assert_eq!(
            Segment::new(&store, ids[0], ids[1]).err(),
            Some(CoreError::CoincidentPoints)
        );
        assert_eq!(
            Segment::new(&store, ids[0], ids[0]).err(),
            Some(CoreError::CoincidentPoints)
        );
    }

    #[test]
    fn test_set_endpoint_keeps_distinctness() {
        let (mut store, ids) = store_with(&[(0.0, 0.0), (10.0, 0.0)]);
        let near_p1 = store.insert(1e-12, 0.0);
        let far = store.insert(5.0, 5.0);

        let mut seg = Segment::new(&store, ids[0], ids[1]).unwrap();
        // 与 p1 重合的新 p2 被拒绝，线段保持原状
        assert_eq!(
            seg.set_endpoint(&store, SegEnd::P2, near_p1).err(),
            Some(CoreError::CoincidentPoints)
        );
        assert_eq!(seg.endpoints(), (ids[0], ids[1]));

        let old = seg.set_endpoint(&store, SegEnd::P2, far).unwrap();
        assert_eq!(old, ids[1]);
        assert_eq!(seg.endpoints(), (ids[0], far));
    }

    #[test]
    fn test_map_coords_diagonal() {
        let (store, ids) = store_with(&[(0.0, 0.0), (10.0, 10.0)]);
        let seg = Segment::new(&store, ids[0], ids[1]).unwrap();

        let mapped = seg.map_coords(&store, 5.0, 5.1, 0.5).unwrap().unwrap();
        assert!(points_approx_eq(&mapped, &Point2::new(5.05, 5.05)));

        // 容差之外
        assert!(seg.map_coords(&store, 5.0, 8.0, 0.5).unwrap().is_none());
        // 超出端点的投影被钳制到端点
        let clamped = seg.map_coords(&store, 10.4, 10.4, 1.0).unwrap().unwrap();
        assert!(points_approx_eq(&clamped, &Point2::new(10.0, 10.0)));
    }

    #[test]
    fn test_map_coords_vertical_horizontal() {
        let (store, ids) = store_with(&[(2.0, 0.0), (2.0, 10.0), (0.0, 3.0), (8.0, 3.0)]);
        let vertical = Segment::new(&store, ids[0], ids[1]).unwrap();
        let horizontal = Segment::new(&store, ids[2], ids[3]).unwrap();

        let v = vertical.map_coords(&store, 2.2, 5.0, 0.5).unwrap().unwrap();
        assert!(points_approx_eq(&v, &Point2::new(2.0, 5.0)));

        let h = horizontal.map_coords(&store, 4.0, 2.8, 0.5).unwrap().unwrap();
        assert!(points_approx_eq(&h, &Point2::new(4.0, 3.0)));
    }

    #[test]
    fn test_in_region() {
        let (store, ids) = store_with(&[(-5.0, 5.0), (15.0, 5.0)]);
        let seg = Segment::new(&store, ids[0], ids[1]).unwrap();
        let rect = BoundingBox2::from_coords(0.0, 0.0, 10.0, 10.0);

        // 两端都在矩形外但穿过矩形
        assert!(seg.in_region(&store, &rect, false).unwrap());
        // 不被完全包含
        assert!(!seg.in_region(&store, &rect, true).unwrap());

        let below = BoundingBox2::from_coords(0.0, -10.0, 10.0, 0.0);
        assert!(!seg.in_region(&store, &below, false).unwrap());
    }
}
