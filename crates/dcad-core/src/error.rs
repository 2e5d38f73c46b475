//! 核心错误定义
//!
//! 几何退化（平行、同心、不相交）不是错误，求交例程对
//! 这些输入返回空结果；这里只定义真正的拒绝性错误。

use crate::entity::EntityId;
use crate::point::PointId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid radius: {0}")]
    InvalidRadius(f64),

    #[error("points must be distinct")]
    CoincidentPoints,

    #[error("invalid arrow size: {0}")]
    InvalidArrowSize(f64),

    #[error("object is locked")]
    Locked,

    #[error("point not found: {0:?}")]
    PointNotFound(PointId),

    #[error("entity not found: {0:?}")]
    EntityNotFound(EntityId),

    #[error("entity {0:?} is not of the required kind")]
    WrongKind(EntityId),

    #[error("point still has {0} users")]
    PointInUse(usize),

    #[error("item not present in spatial index")]
    NotIndexed,
}

pub type Result<T> = std::result::Result<T, CoreError>;
