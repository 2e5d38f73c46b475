//! DCAD 核心制图引擎
//!
//! 提供2D制图图元、求交计算、空间索引和变更通知。
//!
//! # 架构设计
//!
//! 自底向上的依赖顺序：
//! - `PointStore`: 以稳定ID管理的共享点，容差相等加引用计数
//! - `Geometry`: 七种图元（线段、圆弧/圆、四种构造线、引线）
//! - `intersect`: 任意两种图元之间的纯函数求交
//! - `QuadTree`: 每种图元一棵的空间索引
//! - `Drawing`: 唯一的修改入口，所有修改都广播
//!   Pending/Complete 括号事件
//!
//! # 示例
//!
//! ```rust
//! use dcad_core::prelude::*;
//!
//! let mut drawing = Drawing::new();
//! let p1 = drawing.add_point(0.0, 0.0);
//! let p2 = drawing.add_point(100.0, 50.0);
//!
//! let segment = Segment::new(drawing.points(), p1, p2)?;
//! let id = drawing.add_entity(Geometry::Segment(segment))?;
//!
//! println!("Length: {}", drawing.entity(id)?.bounds(drawing.points())?.width());
//! # Ok::<(), dcad_core::CoreError>(())
//! ```

pub mod arc;
pub mod conline;
pub mod drawing;
pub mod entity;
pub mod error;
pub mod intersect;
pub mod leader;
pub mod math;
pub mod notify;
pub mod point;
pub mod properties;
pub mod quadtree;
pub mod segment;

pub use error::{CoreError, Result};

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::arc::Arc;
    pub use crate::conline::{ACLine, CLine, HCLine, VCLine};
    pub use crate::drawing::Drawing;
    pub use crate::entity::{Entity, EntityId, EntityKind, Geometry};
    pub use crate::error::{CoreError, Result};
    pub use crate::intersect::find_intersections;
    pub use crate::leader::Leader;
    pub use crate::math::{BoundingBox2, Point2, Vector2, EPSILON};
    pub use crate::notify::{Attr, ChangeEvent, ChangeListener, ChangeTarget, EventLog};
    pub use crate::point::{Point, PointId, PointStore};
    pub use crate::properties::{Color, LineType, Properties};
    pub use crate::quadtree::QuadTree;
    pub use crate::segment::{SegEnd, Segment};
}
