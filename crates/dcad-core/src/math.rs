//! 数学基础类型
//!
//! 基于 nalgebra 提供的向量和点类型的别名，以及制图引擎
//! 通用的容差比较、角度归一化和包围盒运算。

use nalgebra as na;
use serde::{Deserialize, Serialize};

/// 2D点类型
pub type Point2 = na::Point2<f64>;

/// 2D向量类型
pub type Vector2 = na::Vector2<f64>;

/// 数值容差，用于几何比较
pub const EPSILON: f64 = 1e-10;

/// 判断两个浮点数是否近似相等
#[inline]
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// 判断两个2D点是否近似相等
#[inline]
pub fn points_approx_eq(a: &Point2, b: &Point2) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

/// 将角度归一化到 [0, 360)
pub fn normalize_angle(deg: f64) -> f64 {
    let mut a = deg % 360.0;
    if a < 0.0 {
        a += 360.0;
    }
    if approx_eq(a, 360.0) {
        a = 0.0;
    }
    a
}

/// 将构造线倾角归一化到 (-90, 90]
pub fn normalize_cline_angle(deg: f64) -> f64 {
    let mut a = deg % 180.0;
    if a <= -90.0 {
        a += 180.0;
    } else if a > 90.0 {
        a -= 180.0;
    }
    a
}

/// 判断角度是否落在圆弧扫掠范围内（角度制，边界含端点）
///
/// 三种情形：
/// - 起止角相等（容差内）视为整圆，任何角度都通过；
/// - 起始角大于终止角表示跨越 0°，仅严格落在 (end, start) 内的角度不通过；
/// - 常规情形要求角度位于 [start, end]。
pub fn angle_in_sweep(start: f64, end: f64, angle: f64) -> bool {
    let a = normalize_angle(angle);
    if approx_eq(start, end) {
        true
    } else if start > end {
        !(a > end + EPSILON && a < start - EPSILON)
    } else {
        a >= start - EPSILON && a <= end + EPSILON
    }
}

/// 2D包围盒
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox2 {
    pub min: Point2,
    pub max: Point2,
}

impl BoundingBox2 {
    /// 创建新的包围盒
    pub fn new(min: Point2, max: Point2) -> Self {
        Self { min, max }
    }

    /// 从坐标分量创建包围盒
    pub fn from_coords(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            min: Point2::new(xmin, ymin),
            max: Point2::new(xmax, ymax),
        }
    }

    /// 创建空的包围盒（无效状态）
    pub fn empty() -> Self {
        Self {
            min: Point2::new(f64::MAX, f64::MAX),
            max: Point2::new(f64::MIN, f64::MIN),
        }
    }

    /// 从点集创建包围盒
    pub fn from_points(points: impl IntoIterator<Item = Point2>) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            bbox.expand_to_include(&p);
        }
        bbox
    }

    /// 扩展包围盒以包含指定点
    pub fn expand_to_include(&mut self, point: &Point2) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
    }

    /// 合并两个包围盒
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Point2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// 向四周扩张指定距离
    pub fn pad(&self, d: f64) -> Self {
        Self {
            min: Point2::new(self.min.x - d, self.min.y - d),
            max: Point2::new(self.max.x + d, self.max.y + d),
        }
    }

    /// 检查是否与另一个包围盒相交
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// 检查是否包含指定点
    pub fn contains(&self, point: &Point2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// 检查是否完全包含另一个包围盒
    pub fn contains_box(&self, other: &Self) -> bool {
        other.min.x >= self.min.x
            && other.min.y >= self.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    /// 点到包围盒的最短距离（点在盒内时为0）
    pub fn distance_to_point(&self, point: &Point2) -> f64 {
        let dx = (self.min.x - point.x).max(0.0).max(point.x - self.max.x);
        let dy = (self.min.y - point.y).max(0.0).max(point.y - self.max.y);
        (dx * dx + dy * dy).sqrt()
    }

    /// 点到包围盒四个角的最大距离
    pub fn max_corner_distance(&self, point: &Point2) -> f64 {
        let corners = [
            Point2::new(self.min.x, self.min.y),
            Point2::new(self.max.x, self.min.y),
            Point2::new(self.max.x, self.max.y),
            Point2::new(self.min.x, self.max.y),
        ];
        corners
            .iter()
            .map(|c| (c - point).norm())
            .fold(0.0, f64::max)
    }

    /// 获取中心点
    pub fn center(&self) -> Point2 {
        Point2::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    /// 获取宽度
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// 获取高度
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// 参数化直线与矩形的相交测试（Liang-Barsky裁剪）
///
/// 直线为 `origin + t * dir`，参数 t 限制在 [t0, t1]；
/// 线段用 [0, 1]，无限构造线用 ±∞。分母接近零的方向
/// 单独判定，不通过通用斜率计算。
pub fn line_intersects_rect(
    origin: &Point2,
    dir: &Vector2,
    rect: &BoundingBox2,
    t0: f64,
    t1: f64,
) -> bool {
    let mut tmin = t0;
    let mut tmax = t1;

    let checks = [
        (-dir.x, origin.x - rect.min.x),
        (dir.x, rect.max.x - origin.x),
        (-dir.y, origin.y - rect.min.y),
        (dir.y, rect.max.y - origin.y),
    ];

    for (p, q) in checks {
        if p.abs() < EPSILON {
            // 与该边界平行
            if q < -EPSILON {
                return false;
            }
        } else {
            let t = q / p;
            if p < 0.0 {
                tmin = tmin.max(t);
            } else {
                tmax = tmax.min(t);
            }
        }
    }

    tmin <= tmax + EPSILON
}
