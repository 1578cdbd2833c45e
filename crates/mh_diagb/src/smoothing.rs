// crates/mh_diagb/src/smoothing.rs

//! 简单平滑后处理
//!
//! - 水平：每次迭代前 halo 同步；对每个非 ghost 节点的每一层，
//!   取该层湿邻居的值，多于 2 个时替换为其均值；本节点该层为干点时置零。
//!   读写使用不同缓冲区，结果与节点遍历顺序无关。
//! - 垂向：三点平均 `(v[l-1] + v[l] + v[l+1]) / 3`（内部层），
//!   第 0 层复制第 1 层。单层场跳过。

use mh_config::VerticalSmoothingMode;
use mh_mesh::{HaloExchange, NeighborTable};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{DiagbError, DiagbResult};
use crate::field::Field;
use crate::vertical::is_wet;

/// 水平平滑
pub struct HorizontalSmoother<'a> {
    neighbors: &'a NeighborTable,
    ghost: &'a [bool],
    halo: &'a dyn HaloExchange,
}

impl<'a> HorizontalSmoother<'a> {
    /// 创建水平平滑器
    pub fn new(neighbors: &'a NeighborTable, ghost: &'a [bool], halo: &'a dyn HaloExchange) -> Self {
        Self {
            neighbors,
            ghost,
            halo,
        }
    }

    /// 执行 `iterations` 次水平平滑
    ///
    /// `thickness` 缺省时所有点视为湿点。
    pub fn apply(
        &self,
        field: &mut Field,
        thickness: Option<&Field>,
        iterations: usize,
    ) -> DiagbResult<()> {
        if iterations == 0 {
            return Ok(());
        }
        if self.neighbors.n_nodes() != field.n_nodes() || self.ghost.len() != field.n_nodes() {
            return Err(DiagbError::shape(
                field.name(),
                format!("{} 节点", self.neighbors.n_nodes()),
                format!("{} 节点", field.n_nodes()),
            ));
        }
        if let Some(h) = thickness {
            if h.n_nodes() != field.n_nodes() || h.n_levels() < field.n_levels() {
                return Err(DiagbError::shape(
                    h.name(),
                    format!("{} 节点, 至少 {} 层", field.n_nodes(), field.n_levels()),
                    format!("{}x{}", h.n_nodes(), h.n_levels()),
                ));
            }
        }

        let n_levels = field.n_levels();
        let wet = |node: usize, level: usize| thickness.map_or(true, |h| is_wet(h.get(node, level)));
        let mut next = field.clone();

        for _ in 0..iterations {
            self.halo.sync(field.values_mut(), n_levels)?;
            let current = &*field;

            next.values_mut()
                .par_chunks_mut(n_levels)
                .enumerate()
                .for_each(|(node, column)| {
                    column.copy_from_slice(current.column(node));
                    if self.ghost[node] {
                        return;
                    }
                    for (level, value) in column.iter_mut().enumerate() {
                        let (sum, count) = self
                            .neighbors
                            .neighbors(node)
                            .iter()
                            .filter(|&&m| wet(m, level))
                            .fold((0.0, 0usize), |(s, c), &m| (s + current.get(m, level), c + 1));
                        if count > 2 {
                            *value = sum / count as f64;
                        }
                        if !wet(node, level) {
                            *value = 0.0;
                        }
                    }
                });

            std::mem::swap(field, &mut next);
        }

        debug!("{}: 水平平滑 {} 次", field.name(), iterations);
        Ok(())
    }
}

/// 垂向平滑
///
/// `Frozen` 模式下所有迭代都读取循环开始前的快照，因此多次迭代与一次迭代结果相同；
/// `Progressive` 模式下每次迭代读取上一次的结果。
pub fn vertical_smooth(
    field: &mut Field,
    ghost: &[bool],
    iterations: usize,
    mode: VerticalSmoothingMode,
) {
    let n_levels = field.n_levels();
    if n_levels <= 1 || iterations == 0 {
        return;
    }

    let mut snapshot = field.clone();
    for _ in 0..iterations {
        if mode == VerticalSmoothingMode::Progressive {
            snapshot.values_mut().copy_from_slice(field.values());
        }
        let source = &snapshot;
        field
            .values_mut()
            .par_chunks_mut(n_levels)
            .enumerate()
            .filter(|(node, _)| !ghost.get(*node).copied().unwrap_or(false))
            .for_each(|(node, column)| {
                let s = source.column(node);
                for l in 1..n_levels - 1 {
                    column[l] = (s[l - 1] + s[l] + s[l + 1]) / 3.0;
                }
                column[0] = column[1];
            });
    }

    debug!("{}: 垂向平滑 {} 次 ({:?})", field.name(), iterations, mode);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mh_mesh::{GhostCopyHalo, MeshGeometry, MeshNode, NoHalo};

    fn star_table() -> NeighborTable {
        // 节点 0 与 1..=4 相连
        NeighborTable::from_rows(vec![vec![1, 2, 3, 4], vec![0], vec![0], vec![0], vec![0]])
    }

    #[test]
    fn test_horizontal_mean_of_wet_neighbors() {
        let table = star_table();
        let ghost = vec![false; 5];
        let smoother = HorizontalSmoother::new(&table, &ghost, &NoHalo);

        let mut f = Field::from_values("s", 1, vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        smoother.apply(&mut f, None, 1).unwrap();
        assert!((f.get(0, 0) - 2.5).abs() < 1e-12);
        // 只有一个邻居的节点保持原值
        assert_eq!(f.get(3, 0), 3.0);
    }

    #[test]
    fn test_horizontal_dry_neighbors_excluded_and_land_reset() {
        let table = star_table();
        let ghost = vec![false; 5];
        let smoother = HorizontalSmoother::new(&table, &ghost, &NoHalo);

        let mut f = Field::from_values("s", 1, vec![9.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        let h = Field::from_values("hocn", 1, vec![1.0, 1.0, 1.0, 0.0, 1.0]).unwrap();
        smoother.apply(&mut f, Some(&h), 1).unwrap();
        // 湿邻居 {1, 2, 4}
        assert!((f.get(0, 0) - 7.0 / 3.0).abs() < 1e-12);
        assert_eq!(f.get(3, 0), 0.0);
    }

    #[test]
    fn test_horizontal_uses_previous_iteration_buffer() {
        // 完全图 K4：每个节点 3 个邻居
        let table = NeighborTable::from_rows(vec![
            vec![1, 2, 3],
            vec![0, 2, 3],
            vec![0, 1, 3],
            vec![0, 1, 2],
        ]);
        let ghost = vec![false; 4];
        let smoother = HorizontalSmoother::new(&table, &ghost, &NoHalo);

        let mut f = Field::from_values("s", 1, vec![0.0, 0.0, 0.0, 12.0]).unwrap();
        smoother.apply(&mut f, None, 1).unwrap();
        // 同一迭代内全部读取旧值
        assert_eq!(f.values(), &[4.0, 4.0, 4.0, 0.0]);
    }

    #[test]
    fn test_horizontal_halo_refreshes_ghost() {
        let geometry = MeshGeometry::new(
            vec![
                MeshNode::owned(0.0, 0.0),
                MeshNode::owned(1.0, 0.0),
                MeshNode::owned(2.0, 0.0),
                MeshNode::ghost(3.0, 0.0, 1),
            ],
            vec![],
        );
        let halo = GhostCopyHalo::from_geometry(&geometry).unwrap();
        let table = NeighborTable::from_rows(vec![vec![1, 2, 3], vec![], vec![], vec![]]);
        let ghost = geometry.ghost_mask();
        let smoother = HorizontalSmoother::new(&table, &ghost, &halo);

        let mut f = Field::from_values("s", 1, vec![0.0, 3.0, 6.0, 100.0]).unwrap();
        smoother.apply(&mut f, None, 1).unwrap();
        // ghost 先被同步为 3.0
        assert!((f.get(0, 0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_vertical_frozen_vs_progressive() {
        let ghost = vec![false];
        let base = Field::from_values("s", 4, vec![0.0, 3.0, 6.0, 9.0]).unwrap();

        let mut frozen = base.clone();
        vertical_smooth(&mut frozen, &ghost, 1, VerticalSmoothingMode::Frozen);
        assert_eq!(frozen.column(0), &[3.0, 3.0, 6.0, 9.0]);

        let mut frozen2 = base.clone();
        vertical_smooth(&mut frozen2, &ghost, 3, VerticalSmoothingMode::Frozen);
        assert_eq!(frozen2.column(0), frozen.column(0));

        let mut progressive = base.clone();
        vertical_smooth(&mut progressive, &ghost, 2, VerticalSmoothingMode::Progressive);
        // 第二次迭代: l1=(3+3+6)/3=4, l2=(3+6+9)/3=6
        assert_eq!(progressive.column(0), &[4.0, 4.0, 6.0, 9.0]);
    }

    #[test]
    fn test_vertical_single_level_untouched() {
        let mut f = Field::from_values("ssh", 1, vec![1.0, 2.0]).unwrap();
        vertical_smooth(&mut f, &[false, false], 5, VerticalSmoothingMode::Frozen);
        assert_eq!(f.values(), &[1.0, 2.0]);
    }

    #[test]
    fn test_constant_field_idempotent() {
        let table = star_table();
        let ghost = vec![false; 5];
        let smoother = HorizontalSmoother::new(&table, &ghost, &NoHalo);

        let mut f = Field::filled("s", 5, 3, 0.7);
        smoother.apply(&mut f, None, 7).unwrap();
        vertical_smooth(&mut f, &ghost, 4, VerticalSmoothingMode::Progressive);
        assert!(f.values().iter().all(|&v| (v - 0.7).abs() < 1e-12));
    }
}
