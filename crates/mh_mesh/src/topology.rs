// crates/mh_mesh/src/topology.rs
//! 邻居表
//!
//! CSR (Compressed Sparse Row) 格式存储每个节点的邻居节点索引：
//! - `offsets[i]` 和 `offsets[i+1]` 之间是节点 i 的邻居
//! - 邻居不去重（多条共享边会产生重复），不要求对称
//! - 构建后只读，估计器与水平平滑共用同一张表
//!
//! # 示例
//!
//! ```
//! use mh_mesh::topology::NeighborTable;
//!
//! let table = NeighborTable::from_rows(vec![vec![1], vec![0, 2], vec![1]]);
//! assert_eq!(table.neighbors(1), &[0, 2]);
//! assert_eq!(table.n_nodes(), 3);
//! assert_eq!(table.nnz(), 4);
//! ```

use serde::{Deserialize, Serialize};

/// 节点邻居表（CSR）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborTable {
    /// 行偏移数组，长度 = n_nodes + 1
    offsets: Vec<usize>,
    /// 邻居索引数组
    indices: Vec<usize>,
}

impl Default for NeighborTable {
    fn default() -> Self {
        Self::empty()
    }
}

impl NeighborTable {
    /// 空表（0 个节点）
    pub fn empty() -> Self {
        Self {
            offsets: vec![0],
            indices: Vec::new(),
        }
    }

    /// 从逐节点邻居列表构建
    pub fn from_rows(rows: Vec<Vec<usize>>) -> Self {
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::with_capacity(rows.iter().map(Vec::len).sum());

        offsets.push(0);
        for row in rows {
            indices.extend(row);
            offsets.push(indices.len());
        }

        Self { offsets, indices }
    }

    /// 节点的邻居列表；越界节点返回空切片
    #[inline]
    pub fn neighbors(&self, node: usize) -> &[usize] {
        if node >= self.n_nodes() {
            return &[];
        }
        &self.indices[self.offsets[node]..self.offsets[node + 1]]
    }

    /// 节点度
    #[inline]
    pub fn degree(&self, node: usize) -> usize {
        self.neighbors(node).len()
    }

    /// 节点数
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.offsets.len() - 1
    }

    /// 邻居总数
    #[inline]
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// 逐节点迭代邻居
    pub fn iter(&self) -> impl Iterator<Item = &[usize]> + '_ {
        (0..self.n_nodes()).map(move |i| self.neighbors(i))
    }

    /// 度统计
    pub fn degree_stats(&self) -> DegreeStats {
        let n = self.n_nodes();
        if n == 0 {
            return DegreeStats::default();
        }
        let (mut min, mut max) = (usize::MAX, 0);
        for i in 0..n {
            let d = self.degree(i);
            min = min.min(d);
            max = max.max(d);
        }
        DegreeStats {
            min,
            max,
            mean: self.nnz() as f64 / n as f64,
        }
    }
}

/// 邻居度统计
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DegreeStats {
    /// 最小度
    pub min: usize,
    /// 最大度
    pub max: usize,
    /// 平均度
    pub mean: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let t = NeighborTable::empty();
        assert_eq!(t.n_nodes(), 0);
        assert!(t.neighbors(0).is_empty());
        assert_eq!(t.degree_stats(), DegreeStats::default());
    }

    #[test]
    fn test_duplicates_kept() {
        let t = NeighborTable::from_rows(vec![vec![1, 1], vec![0, 0]]);
        assert_eq!(t.neighbors(0), &[1, 1]);
        assert_eq!(t.nnz(), 4);
    }

    #[test]
    fn test_out_of_range_is_empty() {
        let t = NeighborTable::from_rows(vec![vec![1], vec![0]]);
        assert!(t.neighbors(2).is_empty());
        assert_eq!(t.degree(usize::MAX), 0);
    }

    #[test]
    fn test_degree_stats() {
        let t = NeighborTable::from_rows(vec![vec![1], vec![0, 2, 3], vec![1], vec![]]);
        let s = t.degree_stats();
        assert_eq!(s.min, 0);
        assert_eq!(s.max, 3);
        assert!((s.mean - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_iter() {
        let t = NeighborTable::from_rows(vec![vec![1], vec![0]]);
        let rows: Vec<&[usize]> = t.iter().collect();
        assert_eq!(rows, vec![&[1usize][..], &[0usize][..]]);
    }
}
