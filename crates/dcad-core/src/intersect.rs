//! 求交引擎
//!
//! 任意两种几何之间的交点计算。所有几何先降级到载体
//! （有界/无界直线或带扫掠范围的圆），三个纯数值核心
//! （线-线、线-圆、圆-圆）完成计算，最后按扫掠范围和
//! 参数范围过滤候选点。引线只做标注，不参与求交。
//!
//! 所有例程都是纯函数，返回无序的交点列表；几何退化
//! （平行、同心、不相交）返回空集而不是错误。近切情形
//! 统一用 [`EPSILON`] 容差带判定为单个切点，而不是两个
//! 几乎重合的根。

use crate::entity::Geometry;
use crate::error::Result;
use crate::math::{angle_in_sweep, points_approx_eq, Point2, Vector2, EPSILON};
use crate::point::PointStore;

/// 求交载体
///
/// 四种构造线和线段共享直线载体，圆弧和圆共享圆载体。
#[derive(Debug, Clone)]
enum Carrier {
    /// 直线载体；`bounded` 表示参数限制在 [0, 1]
    Linear {
        p1: Point2,
        p2: Point2,
        bounded: bool,
    },
    /// 圆载体；`sweep` 为 `None` 时是整圆
    Circular {
        center: Point2,
        radius: f64,
        sweep: Option<(f64, f64)>,
    },
}

impl Carrier {
    /// 从几何降级到载体；引线和退化几何返回 `None`
    fn from_geometry(geometry: &Geometry, store: &PointStore) -> Result<Option<Carrier>> {
        let carrier = match geometry {
            Geometry::Segment(s) => {
                let (p1, p2) = s.endpoints();
                Some(Carrier::Linear {
                    p1: store.position(p1)?,
                    p2: store.position(p2)?,
                    bounded: true,
                })
            }
            Geometry::Arc(a) => {
                let sweep = if a.is_circle() {
                    None
                } else {
                    Some((a.start_angle(), a.end_angle()))
                };
                Some(Carrier::Circular {
                    center: store.position(a.center())?,
                    radius: a.radius(),
                    sweep,
                })
            }
            Geometry::HCLine(h) => {
                let kp = store.position(h.keypoint())?;
                Some(Carrier::Linear {
                    p1: kp,
                    p2: kp + Vector2::new(1.0, 0.0),
                    bounded: false,
                })
            }
            Geometry::VCLine(v) => {
                let kp = store.position(v.keypoint())?;
                Some(Carrier::Linear {
                    p1: kp,
                    p2: kp + Vector2::new(0.0, 1.0),
                    bounded: false,
                })
            }
            Geometry::ACLine(a) => {
                let kp = store.position(a.keypoint())?;
                Some(Carrier::Linear {
                    p1: kp,
                    p2: kp + a.direction(),
                    bounded: false,
                })
            }
            Geometry::CLine(c) => {
                let (p1, p2) = c.endpoints();
                let a = store.position(p1)?;
                let b = store.position(p2)?;
                // 定义点被移动到重合时退化为空
                if (b - a).norm() < EPSILON {
                    None
                } else {
                    Some(Carrier::Linear {
                        p1: a,
                        p2: b,
                        bounded: false,
                    })
                }
            }
            Geometry::Leader(_) => None,
        };
        Ok(carrier)
    }

    /// 候选点是否落在载体的有效范围内
    fn admits(&self, point: &Point2) -> bool {
        match self {
            Carrier::Circular {
                center,
                sweep: Some((start, end)),
                ..
            } => {
                let angle = (point.y - center.y).atan2(point.x - center.x).to_degrees();
                angle_in_sweep(*start, *end, angle)
            }
            _ => true,
        }
    }
}

/// 计算两个几何之间的全部交点
///
/// 结果是无序的坐标列表；调用方不得依赖顺序。参数交换
/// 后返回同一组点。
pub fn find_intersections(
    a: &Geometry,
    b: &Geometry,
    store: &PointStore,
) -> Result<Vec<Point2>> {
    let Some(ca) = Carrier::from_geometry(a, store)? else {
        return Ok(Vec::new());
    };
    let Some(cb) = Carrier::from_geometry(b, store)? else {
        return Ok(Vec::new());
    };

    let candidates = match (&ca, &cb) {
        (
            Carrier::Linear {
                p1: a1,
                p2: a2,
                bounded: ba,
            },
            Carrier::Linear {
                p1: b1,
                p2: b2,
                bounded: bb,
            },
        ) => line_line(a1, a2, *ba, b1, b2, *bb),
        (
            Carrier::Linear { p1, p2, bounded },
            Carrier::Circular { center, radius, .. },
        )
        | (
            Carrier::Circular { center, radius, .. },
            Carrier::Linear { p1, p2, bounded },
        ) => line_circle(p1, p2, *bounded, center, *radius),
        (
            Carrier::Circular {
                center: c1,
                radius: r1,
                ..
            },
            Carrier::Circular {
                center: c2,
                radius: r2,
                ..
            },
        ) => circle_circle(c1, *r1, c2, *r2),
    };

    let mut result: Vec<Point2> = Vec::new();
    for p in candidates {
        if ca.admits(&p) && cb.admits(&p) {
            // 去掉容差内重复的候选点
            if !result.iter().any(|q| points_approx_eq(q, &p)) {
                result.push(p);
            }
        }
    }
    Ok(result)
}

/// 直线与直线的交点
///
/// 经典的 2D 行列式解法；分母接近零表示平行或共线，返回空。
fn line_line(
    a1: &Point2,
    a2: &Point2,
    bounded_a: bool,
    b1: &Point2,
    b2: &Point2,
    bounded_b: bool,
) -> Vec<Point2> {
    let d1 = a2 - a1;
    let d2 = b2 - b1;

    let denom = d1.x * d2.y - d1.y * d2.x;
    if denom.abs() < EPSILON {
        return Vec::new();
    }

    let rnum = (a1.y - b1.y) * d2.x - (a1.x - b1.x) * d2.y;
    let snum = (a1.y - b1.y) * d1.x - (a1.x - b1.x) * d1.y;
    let r = rnum / denom;
    let s = snum / denom;

    if bounded_a && !(-EPSILON..=1.0 + EPSILON).contains(&r) {
        return Vec::new();
    }
    if bounded_b && !(-EPSILON..=1.0 + EPSILON).contains(&s) {
        return Vec::new();
    }
    vec![a1 + d1 * r]
}

/// 直线与圆的交点
///
/// 圆心向载线投影得到最近点，再解二次方程的两个根。
/// 最近点距圆在容差带内时判定为单个切点。
fn line_circle(
    p1: &Point2,
    p2: &Point2,
    bounded: bool,
    center: &Point2,
    radius: f64,
) -> Vec<Point2> {
    let dir = p2 - p1;
    let len2 = dir.norm_squared();
    if len2 < EPSILON {
        return Vec::new();
    }

    let t_center = (center - p1).dot(&dir) / len2;
    let closest = p1 + dir * t_center;
    let dist = (closest - center).norm();

    let in_range = |t: f64| !bounded || (-EPSILON..=1.0 + EPSILON).contains(&t);

    if (dist - radius).abs() < EPSILON {
        // 切点
        return if in_range(t_center) {
            vec![closest]
        } else {
            Vec::new()
        };
    }
    if dist > radius {
        return Vec::new();
    }

    let half_t = (radius * radius - dist * dist).sqrt() / len2.sqrt();
    [t_center - half_t, t_center + half_t]
        .into_iter()
        .filter(|t| in_range(*t))
        .map(|t| p1 + dir * t)
        .collect()
}

/// 圆与圆的交点
///
/// 根轴构造：圆心距 d、沿连心线的偏移 a 和半弦 h。同心
/// 或相离返回空；内切、外切在容差带内判定为单个切点。
fn circle_circle(c1: &Point2, r1: f64, c2: &Point2, r2: f64) -> Vec<Point2> {
    let delta = c2 - c1;
    let d = delta.norm();
    if d < EPSILON {
        // 同心
        return Vec::new();
    }
    if d > r1 + r2 + EPSILON || d < (r1 - r2).abs() - EPSILON {
        return Vec::new();
    }

    let u = delta / d;
    let a = (d * d + r1 * r1 - r2 * r2) / (2.0 * d);

    if (d - (r1 + r2)).abs() < EPSILON || (d - (r1 - r2).abs()).abs() < EPSILON {
        // 外切或内切
        return vec![c1 + u * a];
    }

    let h2 = r1 * r1 - a * a;
    if h2 < 0.0 {
        return Vec::new();
    }
    let h = h2.sqrt();
    let mid = c1 + u * a;
    let perp = Vector2::new(-u.y, u.x);
    vec![mid + perp * h, mid - perp * h]
}

/// 有界线段与整圆的交点（不做扫掠过滤）
///
/// 圆弧区域测试用它求曲线与矩形边的交点。
pub(crate) fn segment_circle_hits(
    a: &Point2,
    b: &Point2,
    center: &Point2,
    radius: f64,
) -> Vec<Point2> {
    line_circle(a, b, true, center, radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arc::Arc;
    use crate::conline::{CLine, HCLine, VCLine};
    use crate::leader::Leader;
    use crate::point::PointStore;
    use crate::segment::Segment;

    fn contains_point(points: &[Point2], x: f64, y: f64) -> bool {
        points
            .iter()
            .any(|p| points_approx_eq(p, &Point2::new(x, y)))
    }

    fn segment(store: &mut PointStore, a: (f64, f64), b: (f64, f64)) -> Geometry {
        let p1 = store.insert(a.0, a.1);
        let p2 = store.insert(b.0, b.1);
        Geometry::Segment(Segment::new(store, p1, p2).unwrap())
    }

    fn circle(store: &mut PointStore, c: (f64, f64), r: f64) -> Geometry {
        let center = store.insert(c.0, c.1);
        Geometry::Arc(Arc::circle(store, center, r).unwrap())
    }

    #[test]
    fn test_segment_segment_crossing() {
        let mut store = PointStore::new();
        let a = segment(&mut store, (0.0, 0.0), (10.0, 10.0));
        let b = segment(&mut store, (0.0, 10.0), (10.0, 0.0));

        let hits = find_intersections(&a, &b, &store).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(contains_point(&hits, 5.0, 5.0));
    }

    #[test]
    fn test_segment_bounds_respected() {
        let mut store = PointStore::new();
        // 载线相交但交点在两条线段的参数范围之外
        let a = segment(&mut store, (0.0, 0.0), (1.0, 1.0));
        let b = segment(&mut store, (10.0, 0.0), (0.0, 10.0));
        assert!(find_intersections(&a, &b, &store).unwrap().is_empty());

        // 换成两点构造线后载线无限延伸，交点出现
        let p1 = store.insert(0.0, 0.0);
        let p2 = store.insert(1.0, 1.0);
        let unbounded = Geometry::CLine(CLine::new(&store, p1, p2).unwrap());
        let hits = find_intersections(&unbounded, &b, &store).unwrap();
        assert!(contains_point(&hits, 5.0, 5.0));
    }

    #[test]
    fn test_parallel_lines_empty() {
        let mut store = PointStore::new();
        let a = segment(&mut store, (0.0, 0.0), (10.0, 0.0));
        let b = segment(&mut store, (0.0, 1.0), (10.0, 1.0));
        assert!(find_intersections(&a, &b, &store).unwrap().is_empty());
    }

    #[test]
    fn test_hcline_vcline_cross() {
        let mut store = PointStore::new();
        let kp1 = store.insert(0.0, 5.0);
        let kp2 = store.insert(7.0, 0.0);
        let h = Geometry::HCLine(HCLine::new(&store, kp1).unwrap());
        let v = Geometry::VCLine(VCLine::new(&store, kp2).unwrap());

        let hits = find_intersections(&h, &v, &store).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(contains_point(&hits, 7.0, 5.0));
    }

    #[test]
    fn test_line_circle_two_hits_and_tangent() {
        let mut store = PointStore::new();
        let c = circle(&mut store, (0.0, 0.0), 5.0);

        let crossing = segment(&mut store, (-10.0, 3.0), (10.0, 3.0));
        let hits = find_intersections(&crossing, &c, &store).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(contains_point(&hits, 4.0, 3.0));
        assert!(contains_point(&hits, -4.0, 3.0));

        // 切线只产生一个切点，而不是两个几乎重合的根
        let tangent = segment(&mut store, (-10.0, 5.0), (10.0, 5.0));
        let hits = find_intersections(&tangent, &c, &store).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(contains_point(&hits, 0.0, 5.0));

        let missing = segment(&mut store, (-10.0, 8.0), (10.0, 8.0));
        assert!(find_intersections(&missing, &c, &store)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_circle_circle_reference_case() {
        let mut store = PointStore::new();
        let a = circle(&mut store, (0.0, 0.0), 5.0);
        let b = circle(&mut store, (8.0, 0.0), 5.0);

        let hits = find_intersections(&a, &b, &store).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(contains_point(&hits, 4.0, 3.0));
        assert!(contains_point(&hits, 4.0, -3.0));
    }

    #[test]
    fn test_circle_circle_degenerate() {
        let mut store = PointStore::new();
        let a = circle(&mut store, (0.0, 0.0), 5.0);
        // 同心
        let concentric = circle(&mut store, (0.0, 0.0), 3.0);
        assert!(find_intersections(&a, &concentric, &store)
            .unwrap()
            .is_empty());
        // 相离
        let apart = circle(&mut store, (20.0, 0.0), 5.0);
        assert!(find_intersections(&a, &apart, &store).unwrap().is_empty());
        // 外切
        let tangent = circle(&mut store, (8.0, 0.0), 3.0);
        let hits = find_intersections(&a, &tangent, &store).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(contains_point(&hits, 5.0, 0.0));
    }

    #[test]
    fn test_arc_sweep_filters_candidates() {
        let mut store = PointStore::new();
        let center = store.insert(0.0, 0.0);
        // 仅上半圆
        let upper = Geometry::Arc(Arc::new(&store, center, 5.0, 0.0, 180.0).unwrap());
        let vertical = segment(&mut store, (0.0, -10.0), (0.0, 10.0));

        let hits = find_intersections(&upper, &vertical, &store).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(contains_point(&hits, 0.0, 5.0));

        // 两条弧都必须包含候选角
        let lower_center = store.insert(8.0, 0.0);
        let lower = Geometry::Arc(Arc::new(&store, lower_center, 5.0, 180.0, 360.0).unwrap());
        assert!(find_intersections(&upper, &lower, &store)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_symmetry() {
        let mut store = PointStore::new();
        let a = circle(&mut store, (0.0, 0.0), 5.0);
        let b = segment(&mut store, (-10.0, 3.0), (10.0, 3.0));

        let ab = find_intersections(&a, &b, &store).unwrap();
        let ba = find_intersections(&b, &a, &store).unwrap();
        assert_eq!(ab.len(), ba.len());
        for p in &ab {
            assert!(ba.iter().any(|q| points_approx_eq(p, q)));
        }
    }

    #[test]
    fn test_leader_never_intersects() {
        let mut store = PointStore::new();
        let p1 = store.insert(0.0, 0.0);
        let p2 = store.insert(10.0, 0.0);
        let p3 = store.insert(10.0, 10.0);
        let leader = Geometry::Leader(Leader::new(&store, p1, p2, p3, 1.0).unwrap());
        let seg = segment(&mut store, (5.0, -5.0), (5.0, 5.0));

        assert!(find_intersections(&leader, &seg, &store)
            .unwrap()
            .is_empty());
    }
}
