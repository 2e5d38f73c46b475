//! 构造线
//!
//! 制图参考用的无限直线，共四种：水平（HCLine）、垂直
//! （VCLine）、过关键点的斜线（ACLine）和两点构造线
//! （CLine）。构造线不会出现在最终输出几何中，也永远不会
//! 被矩形“完全包含”。
//!
//! 它们的包围盒只覆盖锚点（关键点），供空间索引的根节点
//! 生长使用；区域测试直接做无限直线与矩形的精确裁剪。

use crate::error::{CoreError, Result};
use crate::math::{
    approx_eq, line_intersects_rect, normalize_cline_angle, BoundingBox2, Point2,
    Vector2, EPSILON,
};
use crate::point::{PointId, PointStore};
use serde::{Deserialize, Serialize};

/// 水平构造线
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HCLine {
    keypoint: PointId,
}

impl HCLine {
    pub fn new(store: &PointStore, keypoint: PointId) -> Result<Self> {
        store.get(keypoint)?;
        Ok(Self { keypoint })
    }

    pub fn keypoint(&self) -> PointId {
        self.keypoint
    }

    pub fn points(&self) -> [PointId; 1] {
        [self.keypoint]
    }

    pub(crate) fn remap(&self, f: &impl Fn(PointId) -> PointId) -> Self {
        Self {
            keypoint: f(self.keypoint),
        }
    }

    /// 与另一条水平构造线重合（y 坐标容差相等）
    pub fn coincides(&self, other: &HCLine, store: &PointStore) -> Result<bool> {
        let a = store.position(self.keypoint)?;
        let b = store.position(other.keypoint)?;
        Ok(approx_eq(a.y, b.y))
    }

    pub fn bounds(&self, store: &PointStore) -> Result<BoundingBox2> {
        let kp = store.position(self.keypoint)?;
        Ok(BoundingBox2::new(kp, kp))
    }

    pub fn map_coords(
        &self,
        store: &PointStore,
        x: f64,
        y: f64,
        tol: f64,
    ) -> Result<Option<Point2>> {
        let kp = store.position(self.keypoint)?;
        if (y - kp.y).abs() <= tol {
            Ok(Some(Point2::new(x, kp.y)))
        } else {
            Ok(None)
        }
    }

    pub fn in_region(
        &self,
        store: &PointStore,
        rect: &BoundingBox2,
        fully: bool,
    ) -> Result<bool> {
        if fully {
            return Ok(false);
        }
        let kp = store.position(self.keypoint)?;
        Ok(kp.y >= rect.min.y - EPSILON && kp.y <= rect.max.y + EPSILON)
    }
}

/// 垂直构造线
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VCLine {
    keypoint: PointId,
}

impl VCLine {
    pub fn new(store: &PointStore, keypoint: PointId) -> Result<Self> {
        store.get(keypoint)?;
        Ok(Self { keypoint })
    }

    pub fn keypoint(&self) -> PointId {
        self.keypoint
    }

    pub fn points(&self) -> [PointId; 1] {
        [self.keypoint]
    }

    pub(crate) fn remap(&self, f: &impl Fn(PointId) -> PointId) -> Self {
        Self {
            keypoint: f(self.keypoint),
        }
    }

    /// 与另一条垂直构造线重合（x 坐标容差相等）
    pub fn coincides(&self, other: &VCLine, store: &PointStore) -> Result<bool> {
        let a = store.position(self.keypoint)?;
        let b = store.position(other.keypoint)?;
        Ok(approx_eq(a.x, b.x))
    }

    pub fn bounds(&self, store: &PointStore) -> Result<BoundingBox2> {
        let kp = store.position(self.keypoint)?;
        Ok(BoundingBox2::new(kp, kp))
    }

    pub fn map_coords(
        &self,
        store: &PointStore,
        x: f64,
        y: f64,
        tol: f64,
    ) -> Result<Option<Point2>> {
        let kp = store.position(self.keypoint)?;
        if (x - kp.x).abs() <= tol {
            Ok(Some(Point2::new(kp.x, y)))
        } else {
            Ok(None)
        }
    }

    pub fn in_region(
        &self,
        store: &PointStore,
        rect: &BoundingBox2,
        fully: bool,
    ) -> Result<bool> {
        if fully {
            return Ok(false);
        }
        let kp = store.position(self.keypoint)?;
        Ok(kp.x >= rect.min.x - EPSILON && kp.x <= rect.max.x + EPSILON)
    }
}

/// 斜构造线
///
/// 过关键点、倾角在 (-90, 90] 的无限直线。倾角存储前归一化。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ACLine {
    keypoint: PointId,
    /// 倾角（角度制，(-90, 90]）
    angle: f64,
}

impl ACLine {
    pub fn new(store: &PointStore, keypoint: PointId, angle_deg: f64) -> Result<Self> {
        store.get(keypoint)?;
        Ok(Self {
            keypoint,
            angle: normalize_cline_angle(angle_deg),
        })
    }

    pub fn keypoint(&self) -> PointId {
        self.keypoint
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn points(&self) -> [PointId; 1] {
        [self.keypoint]
    }

    pub(crate) fn remap(&self, f: &impl Fn(PointId) -> PointId) -> Self {
        Self {
            keypoint: f(self.keypoint),
            angle: self.angle,
        }
    }

    /// 方向向量（单位长度）
    pub fn direction(&self) -> Vector2 {
        let rad = self.angle.to_radians();
        Vector2::new(rad.cos(), rad.sin())
    }

    /// 与另一条斜构造线重合（同倾角且关键点在同一载线上）
    pub fn coincides(&self, other: &ACLine, store: &PointStore) -> Result<bool> {
        if !approx_eq(self.angle, other.angle) {
            return Ok(false);
        }
        let a = store.position(self.keypoint)?;
        let b = store.position(other.keypoint)?;
        let d = self.direction();
        // 关键点连线与方向共线
        let cross = (b.x - a.x) * d.y - (b.y - a.y) * d.x;
        Ok(cross.abs() < EPSILON)
    }

    pub fn bounds(&self, store: &PointStore) -> Result<BoundingBox2> {
        let kp = store.position(self.keypoint)?;
        Ok(BoundingBox2::new(kp, kp))
    }

    pub fn map_coords(
        &self,
        store: &PointStore,
        x: f64,
        y: f64,
        tol: f64,
    ) -> Result<Option<Point2>> {
        let kp = store.position(self.keypoint)?;
        let d = self.direction();
        let t = (Point2::new(x, y) - kp).dot(&d);
        let proj = kp + d * t;
        if (proj - Point2::new(x, y)).norm() <= tol {
            Ok(Some(proj))
        } else {
            Ok(None)
        }
    }

    pub fn in_region(
        &self,
        store: &PointStore,
        rect: &BoundingBox2,
        fully: bool,
    ) -> Result<bool> {
        if fully {
            return Ok(false);
        }
        let kp = store.position(self.keypoint)?;
        Ok(line_intersects_rect(
            &kp,
            &self.direction(),
            rect,
            f64::NEG_INFINITY,
            f64::INFINITY,
        ))
    }
}

/// 两点构造线
///
/// 由两个互异点确定的无限直线。相等判定与点的标注顺序无关。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CLine {
    p1: PointId,
    p2: PointId,
}

impl CLine {
    pub fn new(store: &PointStore, p1: PointId, p2: PointId) -> Result<Self> {
        if store.coincident(p1, p2)? {
            return Err(CoreError::CoincidentPoints);
        }
        Ok(Self { p1, p2 })
    }

    pub fn endpoints(&self) -> (PointId, PointId) {
        (self.p1, self.p2)
    }

    pub fn points(&self) -> [PointId; 2] {
        [self.p1, self.p2]
    }

    pub(crate) fn remap(&self, f: &impl Fn(PointId) -> PointId) -> Self {
        Self {
            p1: f(self.p1),
            p2: f(self.p2),
        }
    }

    /// 相等判定：两条构造线的两组定义点容差相等，
    /// 与哪个点被标注为第一个无关（自反且对称）。
    pub fn coincides(&self, other: &CLine, store: &PointStore) -> Result<bool> {
        let a1 = store.position(self.p1)?;
        let a2 = store.position(self.p2)?;
        let b1 = store.position(other.p1)?;
        let b2 = store.position(other.p2)?;

        let same = |p: &Point2, q: &Point2| approx_eq(p.x, q.x) && approx_eq(p.y, q.y);
        Ok((same(&a1, &b1) && same(&a2, &b2)) || (same(&a1, &b2) && same(&a2, &b1)))
    }

    fn carrier(&self, store: &PointStore) -> Result<Option<(Point2, Vector2)>> {
        let a = store.position(self.p1)?;
        let b = store.position(self.p2)?;
        let d = b - a;
        // 点在构造后被移动到重合时的零长度防护
        if d.norm() < EPSILON {
            return Ok(None);
        }
        Ok(Some((a, d.normalize())))
    }

    pub fn bounds(&self, store: &PointStore) -> Result<BoundingBox2> {
        let a = store.position(self.p1)?;
        let b = store.position(self.p2)?;
        Ok(BoundingBox2::from_points([a, b]))
    }

    pub fn map_coords(
        &self,
        store: &PointStore,
        x: f64,
        y: f64,
        tol: f64,
    ) -> Result<Option<Point2>> {
        let Some((origin, dir)) = self.carrier(store)? else {
            return Ok(None);
        };
        let t = (Point2::new(x, y) - origin).dot(&dir);
        let proj = origin + dir * t;
        if (proj - Point2::new(x, y)).norm() <= tol {
            Ok(Some(proj))
        } else {
            Ok(None)
        }
    }

    pub fn in_region(
        &self,
        store: &PointStore,
        rect: &BoundingBox2,
        fully: bool,
    ) -> Result<bool> {
        if fully {
            return Ok(false);
        }
        let Some((origin, dir)) = self.carrier(store)? else {
            return Ok(false);
        };
        Ok(line_intersects_rect(
            &origin,
            &dir,
            rect,
            f64::NEG_INFINITY,
            f64::INFINITY,
        ))
    }
}
