//! 引线
//!
//! 三个互异点连成的两段折线加一个箭头尺寸的标注图元。
//! 引线只做标注，不参与求交计算。

use crate::error::{CoreError, Result};
use crate::math::{line_intersects_rect, BoundingBox2, Point2, EPSILON};
use crate::point::{PointId, PointStore};
use serde::{Deserialize, Serialize};

/// 引线
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leader {
    p1: PointId,
    p2: PointId,
    p3: PointId,
    /// 箭头大小（非负）
    arrow_size: f64,
}

impl Leader {
    /// 创建引线，三个点必须两两互异，箭头尺寸非负
    pub fn new(
        store: &PointStore,
        p1: PointId,
        p2: PointId,
        p3: PointId,
        arrow_size: f64,
    ) -> Result<Self> {
        if store.coincident(p1, p2)?
            || store.coincident(p2, p3)?
            || store.coincident(p1, p3)?
        {
            return Err(CoreError::CoincidentPoints);
        }
        if arrow_size < 0.0 {
            return Err(CoreError::InvalidArrowSize(arrow_size));
        }
        Ok(Self {
            p1,
            p2,
            p3,
            arrow_size,
        })
    }

    pub fn points(&self) -> [PointId; 3] {
        [self.p1, self.p2, self.p3]
    }

    pub fn arrow_size(&self) -> f64 {
        self.arrow_size
    }

    pub(crate) fn set_arrow_size(&mut self, size: f64) -> Result<()> {
        if size < 0.0 {
            return Err(CoreError::InvalidArrowSize(size));
        }
        self.arrow_size = size;
        Ok(())
    }

    pub(crate) fn remap(&self, f: &impl Fn(PointId) -> PointId) -> Self {
        Self {
            p1: f(self.p1),
            p2: f(self.p2),
            p3: f(self.p3),
            arrow_size: self.arrow_size,
        }
    }

    fn positions(&self, store: &PointStore) -> Result<[Point2; 3]> {
        Ok([
            store.position(self.p1)?,
            store.position(self.p2)?,
            store.position(self.p3)?,
        ])
    }

    /// 获取包围盒
    pub fn bounds(&self, store: &PointStore) -> Result<BoundingBox2> {
        Ok(BoundingBox2::from_points(self.positions(store)?))
    }

    /// 映射到两段折线上最近的点（容差内）
    pub fn map_coords(
        &self,
        store: &PointStore,
        x: f64,
        y: f64,
        tol: f64,
    ) -> Result<Option<Point2>> {
        let [a, b, c] = self.positions(store)?;
        let target = Point2::new(x, y);

        let mut best: Option<(Point2, f64)> = None;
        for (s, e) in [(a, b), (b, c)] {
            let d = e - s;
            let len2 = d.norm_squared();
            if len2 < EPSILON {
                continue;
            }
            let t = ((target - s).dot(&d) / len2).clamp(0.0, 1.0);
            let proj = s + d * t;
            let dist = (proj - target).norm();
            if dist <= tol && best.map_or(true, |(_, bd)| dist < bd) {
                best = Some((proj, dist));
            }
        }
        Ok(best.map(|(p, _)| p))
    }

    /// 区域测试
    pub fn in_region(
        &self,
        store: &PointStore,
        rect: &BoundingBox2,
        fully: bool,
    ) -> Result<bool> {
        let [a, b, c] = self.positions(store)?;
        if !rect.intersects(&BoundingBox2::from_points([a, b, c])) {
            return Ok(false);
        }
        if fully {
            return Ok(rect.contains(&a) && rect.contains(&b) && rect.contains(&c));
        }
        Ok(line_intersects_rect(&a, &(b - a), rect, 0.0, 1.0)
            || line_intersects_rect(&b, &(c - b), rect, 0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::points_approx_eq;

    fn sample(store: &mut PointStore) -> Leader {
        let p1 = store.insert(0.0, 0.0);
        let p2 = store.insert(10.0, 0.0);
        let p3 = store.insert(10.0, 10.0);
        Leader::new(store, p1, p2, p3, 1.0).unwrap()
    }

    #[test]
    fn test_distinct_points_required() {
        let mut store = PointStore::new();
        let p1 = store.insert(0.0, 0.0);
        let p2 = store.insert(10.0, 0.0);
        let near_p1 = store.insert(1e-12, 0.0);
        assert_eq!(
            Leader::new(&store, p1, p2, near_p1, 1.0).err(),
            Some(CoreError::CoincidentPoints)
        );
    }

    #[test]
    fn test_negative_arrow_size_rejected() {
        let mut store = PointStore::new();
        let p1 = store.insert(0.0, 0.0);
        let p2 = store.insert(10.0, 0.0);
        let p3 = store.insert(10.0, 10.0);
        assert!(matches!(
            Leader::new(&store, p1, p2, p3, -0.5),
            Err(CoreError::InvalidArrowSize(_))
        ));
        // 零尺寸合法
        assert!(Leader::new(&store, p1, p2, p3, 0.0).is_ok());
    }

    #[test]
    fn test_map_coords_nearest_segment() {
        let mut store = PointStore::new();
        let leader = sample(&mut store);

        // 靠近第一段
        let m1 = leader.map_coords(&store, 5.0, 0.3, 0.5).unwrap().unwrap();
        assert!(points_approx_eq(&m1, &Point2::new(5.0, 0.0)));

        // 靠近第二段
        let m2 = leader.map_coords(&store, 9.7, 5.0, 0.5).unwrap().unwrap();
        assert!(points_approx_eq(&m2, &Point2::new(10.0, 5.0)));

        assert!(leader.map_coords(&store, 5.0, 5.0, 0.5).unwrap().is_none());
    }

    #[test]
    fn test_in_region() {
        let mut store = PointStore::new();
        let leader = sample(&mut store);

        let hit = BoundingBox2::from_coords(4.0, -1.0, 6.0, 1.0);
        assert!(leader.in_region(&store, &hit, false).unwrap());

        let all = BoundingBox2::from_coords(-1.0, -1.0, 11.0, 11.0);
        assert!(leader.in_region(&store, &all, true).unwrap());
        assert!(!leader.in_region(&store, &hit, true).unwrap());

        // 包围盒相交但折线不经过的角落
        let corner = BoundingBox2::from_coords(0.0, 5.0, 4.0, 9.0);
        assert!(!leader.in_region(&store, &corner, false).unwrap());
    }
}
