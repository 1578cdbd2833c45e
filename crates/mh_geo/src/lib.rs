// crates/mh_geo/src/lib.rs
//! MariHydro 地理空间处理模块
//!
//! 为背景误差方差估计提供球面几何支持。
//!
//! # 模块
//!
//! - `geometry`: 经纬度点与大圆距离
//! - `spatial_index`: 基于 R-tree 的球面 k 近邻查询
//! - `error`: 地理错误类型
//!
//! # 示例
//!
//! ```
//! use mh_geo::prelude::*;
//!
//! let a = LonLat::new(0.0, 0.0);
//! let b = LonLat::new(1.0, 0.0);
//! assert!(a.geodesic_distance_to(&b) > 110_000.0);
//!
//! let index = SphericalIndex::bulk_load(vec![(a, 0usize), (b, 1usize)]);
//! let nearest = index.query_nearest(&LonLat::new(0.9, 0.0), 1);
//! assert_eq!(*nearest[0].1, 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod geometry;
pub mod spatial_index;

/// 预导入模块
pub mod prelude {
    pub use crate::error::{GeoError, GeoResult};
    pub use crate::geometry::{LonLat, EARTH_MEAN_RADIUS};
    pub use crate::spatial_index::SphericalIndex;
}

pub use error::{GeoError, GeoResult};
pub use geometry::{LonLat, EARTH_MEAN_RADIUS};
pub use spatial_index::SphericalIndex;
