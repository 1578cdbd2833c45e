// crates/mh_geo/src/error.rs
//! 地理错误类型

use thiserror::Error;

/// 地理模块结果类型
pub type GeoResult<T> = Result<T, GeoError>;

/// 地理错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    /// 坐标不是有限值
    #[error("坐标非有限值: lon={lon}, lat={lat}")]
    NonFinite {
        /// 经度
        lon: f64,
        /// 纬度
        lat: f64,
    },

    /// 纬度超出 [-90, 90]
    #[error("纬度超出范围: {lat}, 期望范围=[-90, 90]")]
    LatitudeOutOfRange {
        /// 纬度
        lat: f64,
    },
}
