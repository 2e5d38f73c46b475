//! 圆弧与圆
//!
//! 圆是起止角相等的圆弧，两者共用一个类型。角度采用角度制，
//! 存储前归一化到 [0, 360)；扫掠包含测试（`through_angle`）
//! 的三种情形见 [`crate::math::angle_in_sweep`]。

use crate::error::{CoreError, Result};
use crate::intersect::segment_circle_hits;
use crate::math::{
    angle_in_sweep, approx_eq, normalize_angle, BoundingBox2, Point2, EPSILON,
};
use crate::point::{PointId, PointStore};
use serde::{Deserialize, Serialize};

/// 圆弧（含圆）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arc {
    center: PointId,
    radius: f64,
    /// 起始角度（角度制，[0, 360)）
    start_angle: f64,
    /// 终止角度（角度制，[0, 360)）
    end_angle: f64,
}

impl Arc {
    /// 创建圆弧，半径必须为正
    pub fn new(
        store: &PointStore,
        center: PointId,
        radius: f64,
        start_deg: f64,
        end_deg: f64,
    ) -> Result<Self> {
        store.get(center)?;
        if radius <= EPSILON {
            return Err(CoreError::InvalidRadius(radius));
        }
        Ok(Self {
            center,
            radius,
            start_angle: normalize_angle(start_deg),
            end_angle: normalize_angle(end_deg),
        })
    }

    /// 创建整圆
    pub fn circle(store: &PointStore, center: PointId, radius: f64) -> Result<Self> {
        Self::new(store, center, radius, 0.0, 0.0)
    }

    pub fn center(&self) -> PointId {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn start_angle(&self) -> f64 {
        self.start_angle
    }

    pub fn end_angle(&self) -> f64 {
        self.end_angle
    }

    /// 起止角相等（容差内）即整圆
    pub fn is_circle(&self) -> bool {
        approx_eq(self.start_angle, self.end_angle)
    }

    pub fn points(&self) -> [PointId; 1] {
        [self.center]
    }

    pub(crate) fn set_radius(&mut self, radius: f64) -> Result<()> {
        if radius <= EPSILON {
            return Err(CoreError::InvalidRadius(radius));
        }
        self.radius = radius;
        Ok(())
    }

    pub(crate) fn set_angles(&mut self, start_deg: f64, end_deg: f64) {
        self.start_angle = normalize_angle(start_deg);
        self.end_angle = normalize_angle(end_deg);
    }

    pub(crate) fn remap(&self, f: &impl Fn(PointId) -> PointId) -> Self {
        Self {
            center: f(self.center),
            ..self.clone()
        }
    }

    /// 扫掠包含测试，边界含端点
    pub fn through_angle(&self, deg: f64) -> bool {
        angle_in_sweep(self.start_angle, self.end_angle, deg)
    }

    /// 圆弧上指定角度处的点
    pub fn point_at_angle(&self, store: &PointStore, deg: f64) -> Result<Point2> {
        let c = store.position(self.center)?;
        let rad = deg.to_radians();
        Ok(Point2::new(
            c.x + self.radius * rad.cos(),
            c.y + self.radius * rad.sin(),
        ))
    }

    /// 获取起点和终点
    pub fn endpoints(&self, store: &PointStore) -> Result<(Point2, Point2)> {
        Ok((
            self.point_at_angle(store, self.start_angle)?,
            self.point_at_angle(store, self.end_angle)?,
        ))
    }

    /// 获取包围盒
    ///
    /// 按扫掠范围取极值：只有当扫掠经过某个基准角（0°、90°、
    /// 180°、270°）时，对应方向的极值点才计入，而不是一律取
    /// 圆心 ± 半径。
    pub fn bounds(&self, store: &PointStore) -> Result<BoundingBox2> {
        let c = store.position(self.center)?;
        if self.is_circle() {
            return Ok(BoundingBox2::new(
                Point2::new(c.x - self.radius, c.y - self.radius),
                Point2::new(c.x + self.radius, c.y + self.radius),
            ));
        }

        let (start, end) = self.endpoints(store)?;
        let mut bbox = BoundingBox2::from_points([start, end]);
        for cardinal in [0.0, 90.0, 180.0, 270.0] {
            if self.through_angle(cardinal) {
                bbox.expand_to_include(&self.point_at_angle(store, cardinal)?);
            }
        }
        Ok(bbox)
    }

    /// 映射到圆弧上最近的点（容差内）
    pub fn map_coords(
        &self,
        store: &PointStore,
        x: f64,
        y: f64,
        tol: f64,
    ) -> Result<Option<Point2>> {
        let c = store.position(self.center)?;
        let v = Point2::new(x, y) - c;
        let d = v.norm();
        if d < EPSILON {
            // 圆心处没有唯一的最近点
            return Ok(None);
        }
        if (d - self.radius).abs() > tol {
            return Ok(None);
        }
        let angle = v.y.atan2(v.x).to_degrees();
        if !self.through_angle(angle) {
            return Ok(None);
        }
        Ok(Some(c + v * (self.radius / d)))
    }

    /// 区域测试
    ///
    /// 圆的曲线与矩形相交当且仅当半径介于圆心到矩形的最短
    /// 距离与最远角点距离之间；圆弧在此之上再过滤扫掠范围：
    /// 端点落在矩形内，或者曲线与矩形某条边的交点通过扫掠
    /// 测试。
    pub fn in_region(
        &self,
        store: &PointStore,
        rect: &BoundingBox2,
        fully: bool,
    ) -> Result<bool> {
        let bbox = self.bounds(store)?;
        if !rect.intersects(&bbox) {
            return Ok(false);
        }
        if fully {
            return Ok(rect.contains_box(&bbox));
        }

        let c = store.position(self.center)?;
        if self.is_circle() {
            let dmin = rect.distance_to_point(&c);
            let dmax = rect.max_corner_distance(&c);
            return Ok(dmin <= self.radius + EPSILON && self.radius <= dmax + EPSILON);
        }

        let (start, end) = self.endpoints(store)?;
        if rect.contains(&start) || rect.contains(&end) {
            return Ok(true);
        }

        // 曲线穿过矩形边界的情形
        let corners = [
            Point2::new(rect.min.x, rect.min.y),
            Point2::new(rect.max.x, rect.min.y),
            Point2::new(rect.max.x, rect.max.y),
            Point2::new(rect.min.x, rect.max.y),
        ];
        for i in 0..4 {
            let a = corners[i];
            let b = corners[(i + 1) % 4];
            for hit in segment_circle_hits(&a, &b, &c, self.radius) {
                let angle = (hit.y - c.y).atan2(hit.x - c.x).to_degrees();
                if self.through_angle(angle) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle_at(store: &mut PointStore, x: f64, y: f64, r: f64) -> Arc {
        let c = store.insert(x, y);
        Arc::circle(store, c, r).unwrap()
    }

    #[test]
    fn test_invalid_radius_rejected() {
        let mut store = PointStore::new();
        let c = store.insert(0.0, 0.0);
        assert!(matches!(
            Arc::new(&store, c, 0.0, 0.0, 90.0),
            Err(CoreError::InvalidRadius(_))
        ));
        assert!(matches!(
            Arc::new(&store, c, -1.0, 0.0, 90.0),
            Err(CoreError::InvalidRadius(_))
        ));
    }

    #[test]
    fn test_angles_normalized_on_construction() {
        let mut store = PointStore::new();
        let c = store.insert(0.0, 0.0);
        let arc = Arc::new(&store, c, 1.0, -90.0, 450.0).unwrap();
        assert!(approx_eq(arc.start_angle(), 270.0));
        assert!(approx_eq(arc.end_angle(), 90.0));
    }

    #[test]
    fn test_full_circle_through_every_angle() {
        let mut store = PointStore::new();
        let circle = circle_at(&mut store, 0.0, 0.0, 5.0);
        assert!(circle.is_circle());
        for i in 0..360 {
            assert!(circle.through_angle(i as f64));
        }
    }

    #[test]
    fn test_through_angle_boundary_inclusive() {
        let mut store = PointStore::new();
        let c = store.insert(0.0, 0.0);
        let arc = Arc::new(&store, c, 1.0, 30.0, 120.0).unwrap();
        assert!(arc.through_angle(30.0));
        assert!(arc.through_angle(120.0));
        assert!(!arc.through_angle(29.0));
        assert!(!arc.through_angle(121.0));
    }

    #[test]
    fn test_through_angle_wraparound() {
        let mut store = PointStore::new();
        let c = store.insert(0.0, 0.0);
        let arc = Arc::new(&store, c, 1.0, 300.0, 60.0).unwrap();
        assert!(arc.through_angle(0.0));
        assert!(arc.through_angle(300.0));
        assert!(arc.through_angle(60.0));
        assert!(!arc.through_angle(180.0));
    }

    #[test]
    fn test_sweep_aware_bounds() {
        let mut store = PointStore::new();
        let c = store.insert(0.0, 0.0);

        // 第一象限的四分之一圆弧：经过 0° 和 90°
        let quarter = Arc::new(&store, c, 2.0, 0.0, 90.0).unwrap();
        let bbox = quarter.bounds(&store).unwrap();
        assert!(approx_eq(bbox.min.x, 0.0));
        assert!(approx_eq(bbox.min.y, 0.0));
        assert!(approx_eq(bbox.max.x, 2.0));
        assert!(approx_eq(bbox.max.y, 2.0));

        // 不经过 180° 和 270°，左、下边界由端点决定
        let upper = Arc::new(&store, c, 2.0, 30.0, 150.0).unwrap();
        let bbox = upper.bounds(&store).unwrap();
        assert!(bbox.min.y > 0.9);
        assert!(approx_eq(bbox.max.y, 2.0));

        // 整圆取圆心 ± 半径
        let circle = Arc::circle(&store, c, 2.0).unwrap();
        let bbox = circle.bounds(&store).unwrap();
        assert!(approx_eq(bbox.min.x, -2.0));
        assert!(approx_eq(bbox.max.y, 2.0));
    }

    #[test]
    fn test_map_coords() {
        let mut store = PointStore::new();
        let c = store.insert(0.0, 0.0);
        let arc = Arc::new(&store, c, 5.0, 0.0, 90.0).unwrap();

        let mapped = arc.map_coords(&store, 3.05, 3.95, 0.2).unwrap().unwrap();
        assert!(approx_eq(mapped.coords.norm(), 5.0));

        // 扫掠范围之外的角度
        assert!(arc.map_coords(&store, -3.0, -4.0, 0.2).unwrap().is_none());
        // 距离曲线太远
        assert!(arc.map_coords(&store, 1.0, 1.0, 0.2).unwrap().is_none());
        // 圆心没有唯一最近点
        assert!(arc.map_coords(&store, 0.0, 0.0, 10.0).unwrap().is_none());
    }

    #[test]
    fn test_circle_in_region() {
        let mut store = PointStore::new();
        let circle = circle_at(&mut store, 0.0, 0.0, 5.0);

        // 曲线穿过矩形
        let crossing = BoundingBox2::from_coords(4.0, -1.0, 6.0, 1.0);
        assert!(circle.in_region(&store, &crossing, false).unwrap());

        // 矩形完全在圆内部，曲线不经过
        let inside = BoundingBox2::from_coords(-1.0, -1.0, 1.0, 1.0);
        assert!(!circle.in_region(&store, &inside, false).unwrap());

        // 完全包含要求整个包围盒入内
        let big = BoundingBox2::from_coords(-10.0, -10.0, 10.0, 10.0);
        assert!(circle.in_region(&store, &big, true).unwrap());
        assert!(!circle.in_region(&store, &crossing, true).unwrap());
    }

    #[test]
    fn test_arc_in_region_filters_sweep() {
        let mut store = PointStore::new();
        let c = store.insert(0.0, 0.0);
        // 仅第一象限的圆弧
        let arc = Arc::new(&store, c, 5.0, 0.0, 90.0).unwrap();

        let first_quadrant = BoundingBox2::from_coords(2.0, 2.0, 6.0, 6.0);
        assert!(arc.in_region(&store, &first_quadrant, false).unwrap());

        // 同样的环带位置但在第三象限，扫掠不经过
        let third_quadrant = BoundingBox2::from_coords(-6.0, -6.0, -2.0, -2.0);
        assert!(!arc.in_region(&store, &third_quadrant, false).unwrap());
    }
}
