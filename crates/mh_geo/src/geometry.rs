// crates/mh_geo/src/geometry.rs
//! 几何类型
//!
//! 网格节点使用经纬度（度）定位，距离一律按大圆距离计算。

use serde::{Deserialize, Serialize};

use crate::error::{GeoError, GeoResult};

/// 地球平均半径 [m]
pub const EARTH_MEAN_RADIUS: f64 = 6_371_008.8;

#[inline]
fn deg_to_rad(deg: f64) -> f64 {
    deg * std::f64::consts::PI / 180.0
}

/// 经纬度点（度）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LonLat {
    /// 经度
    pub lon: f64,
    /// 纬度
    pub lat: f64,
}

impl LonLat {
    /// 创建新的经纬度点
    #[inline]
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// 创建并校验经纬度
    ///
    /// # Errors
    /// 坐标非有限值或纬度超出 [-90, 90] 时返回错误
    pub fn checked(lon: f64, lat: f64) -> GeoResult<Self> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(GeoError::NonFinite { lon, lat });
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::LatitudeOutOfRange { lat });
        }
        Ok(Self { lon, lat })
    }

    // ========================================================================
    // 大地测量距离
    // ========================================================================

    /// Haversine 公式计算大圆距离（米）
    #[must_use]
    pub fn geodesic_distance_to(&self, other: &Self) -> f64 {
        self.haversine_distance(other, EARTH_MEAN_RADIUS)
    }

    /// Haversine 公式（可自定义球体半径）
    #[must_use]
    pub fn haversine_distance(&self, other: &Self, radius: f64) -> f64 {
        let lat1 = deg_to_rad(self.lat);
        let lat2 = deg_to_rad(other.lat);
        let dlat = lat2 - lat1;
        let dlon = deg_to_rad(other.lon - self.lon);

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

        // 数值误差可能让 a 略大于 1
        let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

        radius * c
    }

    /// 单位球面上的三维笛卡尔坐标
    ///
    /// 弦长与大圆距离单调对应，可直接用于欧氏空间索引。
    #[must_use]
    pub fn to_unit_xyz(&self) -> [f64; 3] {
        let lon = deg_to_rad(self.lon);
        let lat = deg_to_rad(self.lat);
        [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
    }

    /// 将单位球弦长转换为大圆距离（米）
    #[must_use]
    pub fn chord_to_geodesic(chord: f64) -> f64 {
        2.0 * (chord / 2.0).clamp(-1.0, 1.0).asin() * EARTH_MEAN_RADIUS
    }
}

impl From<(f64, f64)> for LonLat {
    fn from((lon, lat): (f64, f64)) -> Self {
        Self::new(lon, lat)
    }
}

impl From<[f64; 2]> for LonLat {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Self::new(lon, lat)
    }
}
