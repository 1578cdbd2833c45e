// crates/mh_geo/src/spatial_index.rs
//! 球面空间索引
//!
//! 把经纬度点投影到单位球面三维坐标后存入 R-tree。
//! 三维弦长与大圆距离单调对应，因此欧氏最近邻即大圆最近邻。
//!
//! # 示例
//!
//! ```
//! use mh_geo::{LonLat, SphericalIndex};
//!
//! let index = SphericalIndex::bulk_load(vec![
//!     (LonLat::new(0.0, 0.0), 'a'),
//!     (LonLat::new(179.0, 0.0), 'b'),
//!     (LonLat::new(-179.0, 0.0), 'c'),
//! ]);
//!
//! // 跨越日期变更线的近邻
//! let hits = index.query_nearest(&LonLat::new(179.5, 0.0), 2);
//! assert_eq!(hits.len(), 2);
//! ```

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::geometry::LonLat;

/// 空间索引条目
#[derive(Debug, Clone)]
struct SphericalEntry<T> {
    xyz: [f64; 3],
    data: T,
}

impl<T> RTreeObject for SphericalEntry<T> {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.xyz)
    }
}

impl<T> PointDistance for SphericalEntry<T> {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.xyz[0] - point[0];
        let dy = self.xyz[1] - point[1];
        let dz = self.xyz[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// 球面 k 近邻索引
pub struct SphericalIndex<T> {
    tree: RTree<SphericalEntry<T>>,
}

impl<T> Default for SphericalIndex<T> {
    fn default() -> Self {
        Self { tree: RTree::new() }
    }
}

impl<T> SphericalIndex<T> {
    /// 创建空索引
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 从点集批量构建
    #[must_use]
    pub fn bulk_load(points: Vec<(LonLat, T)>) -> Self {
        let entries: Vec<SphericalEntry<T>> = points
            .into_iter()
            .map(|(p, data)| SphericalEntry { xyz: p.to_unit_xyz(), data })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// 插入点
    pub fn insert(&mut self, point: LonLat, data: T) {
        self.tree.insert(SphericalEntry { xyz: point.to_unit_xyz(), data });
    }

    /// 查询最近的 k 个点
    ///
    /// 返回 `(大圆距离[m], 数据)`，按距离升序排列。
    #[must_use]
    pub fn query_nearest(&self, point: &LonLat, k: usize) -> Vec<(f64, &T)> {
        let query = point.to_unit_xyz();
        self.tree
            .nearest_neighbor_iter_with_distance_2(&query)
            .take(k)
            .map(|(entry, d2)| (LonLat::chord_to_geodesic(d2.sqrt()), &entry.data))
            .collect()
    }

    /// 返回索引中的点数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// 检查索引是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
