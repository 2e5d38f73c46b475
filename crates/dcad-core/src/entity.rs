//! 实体标识与几何分发
//!
//! 实体是几何数据加视觉属性的组合。几何种类是封闭的
//! 枚举，所有按种类分发的操作（包围盒、区域测试、最近点
//! 映射）都在这里集中匹配，避免随种类增加的链式类型判断。

use crate::arc::Arc;
use crate::conline::{ACLine, CLine, HCLine, VCLine};
use crate::error::Result;
use crate::leader::Leader;
use crate::math::{BoundingBox2, Point2};
use crate::point::{PointId, PointStore};
use crate::properties::Properties;
use crate::segment::Segment;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// 全局实体ID生成器
static ENTITY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// 实体唯一标识符
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityId(pub u64);

impl EntityId {
    /// 创建新的实体ID
    pub fn new() -> Self {
        Self(ENTITY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// 从指定值创建（用于文件加载）
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// 空ID（无效）
    pub const NULL: EntityId = EntityId(0);

    /// 检查是否为空ID
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// 实体种类
///
/// 圆是起止角相等的圆弧，不单列种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Segment,
    Arc,
    HCLine,
    VCLine,
    ACLine,
    CLine,
    Leader,
}

impl EntityKind {
    /// 所有可索引的实体种类
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Segment,
        EntityKind::Arc,
        EntityKind::HCLine,
        EntityKind::VCLine,
        EntityKind::ACLine,
        EntityKind::CLine,
        EntityKind::Leader,
    ];
}

/// 几何类型枚举
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Geometry {
    Segment(Segment),
    Arc(Arc),
    HCLine(HCLine),
    VCLine(VCLine),
    ACLine(ACLine),
    CLine(CLine),
    Leader(Leader),
}

impl Geometry {
    /// 获取几何的种类
    pub fn kind(&self) -> EntityKind {
        match self {
            Geometry::Segment(_) => EntityKind::Segment,
            Geometry::Arc(_) => EntityKind::Arc,
            Geometry::HCLine(_) => EntityKind::HCLine,
            Geometry::VCLine(_) => EntityKind::VCLine,
            Geometry::ACLine(_) => EntityKind::ACLine,
            Geometry::CLine(_) => EntityKind::CLine,
            Geometry::Leader(_) => EntityKind::Leader,
        }
    }

    /// 获取几何的包围盒
    ///
    /// 无限构造线返回锚点（关键点）的退化包围盒，仅用于
    /// 索引根节点的生长；它们的区域测试不依赖包围盒。
    pub fn bounds(&self, store: &PointStore) -> Result<BoundingBox2> {
        match self {
            Geometry::Segment(s) => s.bounds(store),
            Geometry::Arc(a) => a.bounds(store),
            Geometry::HCLine(h) => h.bounds(store),
            Geometry::VCLine(v) => v.bounds(store),
            Geometry::ACLine(a) => a.bounds(store),
            Geometry::CLine(c) => c.bounds(store),
            Geometry::Leader(l) => l.bounds(store),
        }
    }

    /// 区域测试
    ///
    /// `fully` 要求完全包含；无限构造线永远无法被完全包含。
    pub fn in_region(
        &self,
        store: &PointStore,
        rect: &BoundingBox2,
        fully: bool,
    ) -> Result<bool> {
        match self {
            Geometry::Segment(s) => s.in_region(store, rect, fully),
            Geometry::Arc(a) => a.in_region(store, rect, fully),
            Geometry::HCLine(h) => h.in_region(store, rect, fully),
            Geometry::VCLine(v) => v.in_region(store, rect, fully),
            Geometry::ACLine(a) => a.in_region(store, rect, fully),
            Geometry::CLine(c) => c.in_region(store, rect, fully),
            Geometry::Leader(l) => l.in_region(store, rect, fully),
        }
    }

    /// 映射到几何上最近的点（容差内），否则返回 `None`
    pub fn map_coords(
        &self,
        store: &PointStore,
        x: f64,
        y: f64,
        tol: f64,
    ) -> Result<Option<Point2>> {
        match self {
            Geometry::Segment(s) => s.map_coords(store, x, y, tol),
            Geometry::Arc(a) => a.map_coords(store, x, y, tol),
            Geometry::HCLine(h) => h.map_coords(store, x, y, tol),
            Geometry::VCLine(v) => v.map_coords(store, x, y, tol),
            Geometry::ACLine(a) => a.map_coords(store, x, y, tol),
            Geometry::CLine(c) => c.map_coords(store, x, y, tol),
            Geometry::Leader(l) => l.map_coords(store, x, y, tol),
        }
    }

    /// 获取该几何持有的全部点ID
    pub fn points(&self) -> Vec<PointId> {
        match self {
            Geometry::Segment(s) => s.points().to_vec(),
            Geometry::Arc(a) => a.points().to_vec(),
            Geometry::HCLine(h) => h.points().to_vec(),
            Geometry::VCLine(v) => v.points().to_vec(),
            Geometry::ACLine(a) => a.points().to_vec(),
            Geometry::CLine(c) => c.points().to_vec(),
            Geometry::Leader(l) => l.points().to_vec(),
        }
    }

    /// 用映射函数替换点ID（克隆实体时换到深拷贝的点上）
    pub(crate) fn remap(&self, f: &impl Fn(PointId) -> PointId) -> Geometry {
        match self {
            Geometry::Segment(s) => Geometry::Segment(s.remap(f)),
            Geometry::Arc(a) => Geometry::Arc(a.remap(f)),
            Geometry::HCLine(h) => Geometry::HCLine(h.remap(f)),
            Geometry::VCLine(v) => Geometry::VCLine(v.remap(f)),
            Geometry::ACLine(a) => Geometry::ACLine(a.remap(f)),
            Geometry::CLine(c) => Geometry::CLine(c.remap(f)),
            Geometry::Leader(l) => Geometry::Leader(l.remap(f)),
        }
    }
}

/// 制图实体
///
/// 一个实体包含几何数据和视觉属性；序列化为以整数ID引用
/// 点的扁平字段记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// 唯一标识符
    pub id: EntityId,

    /// 几何种类和数据
    pub geometry: Geometry,

    /// 视觉属性
    pub properties: Properties,

    /// 是否可见
    pub visible: bool,

    /// 是否锁定（不可编辑）
    pub locked: bool,
}

impl Entity {
    /// 创建新实体
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: EntityId::new(),
            geometry,
            properties: Properties::default(),
            visible: true,
            locked: false,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.geometry.kind()
    }

    /// 获取包围盒
    pub fn bounds(&self, store: &PointStore) -> Result<BoundingBox2> {
        self.geometry.bounds(store)
    }

    /// 使用指定的属性
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }
}
