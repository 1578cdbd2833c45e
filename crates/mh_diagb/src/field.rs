// crates/mh_diagb/src/field.rs

//! 节点 × 层场
//!
//! - [`Field`]: 单个物理量在所有节点、所有层上的值，节点优先布局
//!   `data[node * n_levels + level]`，一个节点的整列连续存放
//! - [`FieldSet`]: 按变量名索引的场集合，同一集合内节点数一致
//!
//! # 示例
//!
//! ```
//! use mh_diagb::field::{Field, FieldSet};
//!
//! let mut set = FieldSet::new();
//! set.insert(Field::zeros("tocn", 4, 3)).unwrap();
//! set.get_mut("tocn").unwrap().set(2, 1, 5.0);
//! assert_eq!(set.get("tocn").unwrap().get(2, 1), 5.0);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DiagbError, DiagbResult};

/// 节点 × 层场
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    n_nodes: usize,
    n_levels: usize,
    data: Vec<f64>,
}

impl Field {
    /// 零初始化
    pub fn zeros(name: impl Into<String>, n_nodes: usize, n_levels: usize) -> Self {
        Self::filled(name, n_nodes, n_levels, 0.0)
    }

    /// 常数初始化
    pub fn filled(name: impl Into<String>, n_nodes: usize, n_levels: usize, value: f64) -> Self {
        Self {
            name: name.into(),
            n_nodes,
            n_levels,
            data: vec![value; n_nodes * n_levels],
        }
    }

    /// 从节点优先数据创建
    pub fn from_values(
        name: impl Into<String>,
        n_levels: usize,
        data: Vec<f64>,
    ) -> DiagbResult<Self> {
        let name = name.into();
        if n_levels == 0 || data.len() % n_levels != 0 {
            return Err(DiagbError::shape(
                &name,
                format!("层数 >= 1 且能整除数据长度 (层数 {n_levels})"),
                format!("数据长度 {}", data.len()),
            ));
        }
        Ok(Self {
            n_nodes: data.len() / n_levels,
            n_levels,
            data,
            name,
        })
    }

    /// 从逐节点列创建
    pub fn from_columns(name: impl Into<String>, columns: &[Vec<f64>]) -> DiagbResult<Self> {
        let name = name.into();
        let n_levels = columns.first().map_or(1, Vec::len);
        if let Some(bad) = columns.iter().position(|c| c.len() != n_levels) {
            return Err(DiagbError::shape(
                &name,
                format!("每列 {n_levels} 层"),
                format!("节点 {bad} 有 {} 层", columns[bad].len()),
            ));
        }
        Self::from_values(name, n_levels, columns.concat())
    }

    /// 变量名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 重命名
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 节点数
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    /// 层数
    #[inline]
    pub fn n_levels(&self) -> usize {
        self.n_levels
    }

    /// 获取值
    #[inline]
    pub fn get(&self, node: usize, level: usize) -> f64 {
        self.data[node * self.n_levels + level]
    }

    /// 设置值
    #[inline]
    pub fn set(&mut self, node: usize, level: usize, value: f64) {
        self.data[node * self.n_levels + level] = value;
    }

    /// 节点整列
    #[inline]
    pub fn column(&self, node: usize) -> &[f64] {
        let start = node * self.n_levels;
        &self.data[start..start + self.n_levels]
    }

    /// 节点整列（可变）
    #[inline]
    pub fn column_mut(&mut self, node: usize) -> &mut [f64] {
        let start = node * self.n_levels;
        &mut self.data[start..start + self.n_levels]
    }

    /// 原始数据
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// 原始数据（可变）
    #[inline]
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// 设置所有值
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// 整体缩放
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.data {
            *v *= factor;
        }
    }

    /// 检查与另一场形状一致
    pub fn check_same_shape(&self, other: &Field) -> DiagbResult<()> {
        if self.n_nodes != other.n_nodes || self.n_levels != other.n_levels {
            return Err(DiagbError::shape(
                other.name(),
                format!("{}x{}", self.n_nodes, self.n_levels),
                format!("{}x{}", other.n_nodes, other.n_levels),
            ));
        }
        Ok(())
    }

    /// 最小值、最大值、平均值；空场返回 None
    pub fn min_max_mean(&self) -> Option<(f64, f64, f64)> {
        if self.data.is_empty() {
            return None;
        }
        let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
        for &v in &self.data {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        Some((min, max, sum / self.data.len() as f64))
    }
}

/// 场集合
///
/// 按名称排序存储，插入顺序无关。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSet {
    fields: BTreeMap<String, Field>,
}

impl FieldSet {
    /// 创建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入场，节点数必须与已有场一致；同名场被替换
    pub fn insert(&mut self, field: Field) -> DiagbResult<()> {
        let others = self.fields.keys().filter(|k| k.as_str() != field.name()).count();
        if let Some(n) = self.n_nodes() {
            if field.n_nodes() != n && others > 0 {
                return Err(DiagbError::shape(
                    field.name(),
                    format!("{n} 节点"),
                    format!("{} 节点", field.n_nodes()),
                ));
            }
        }
        self.fields.insert(field.name().to_string(), field);
        Ok(())
    }

    /// 获取场
    pub fn get(&self, name: &str) -> DiagbResult<&Field> {
        self.fields
            .get(name)
            .ok_or_else(|| DiagbError::MissingField(name.to_string()))
    }

    /// 获取场（可变）
    pub fn get_mut(&mut self, name: &str) -> DiagbResult<&mut Field> {
        self.fields
            .get_mut(name)
            .ok_or_else(|| DiagbError::MissingField(name.to_string()))
    }

    /// 可选获取
    pub fn try_get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// 是否包含变量
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// 移除场
    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    /// 变量名
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// 遍历场
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// 遍历场（可变）
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.fields.values_mut()
    }

    /// 场数量
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 共同节点数；空集合返回 None
    pub fn n_nodes(&self) -> Option<usize> {
        self.fields.values().next().map(Field::n_nodes)
    }

    /// 所有场整体缩放
    pub fn scale(&mut self, factor: f64) {
        for f in self.fields.values_mut() {
            f.scale(factor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_node_major() {
        let f = Field::from_values("t", 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(f.n_nodes(), 3);
        assert_eq!(f.get(1, 0), 3.0);
        assert_eq!(f.get(2, 1), 6.0);
        assert_eq!(f.column(1), &[3.0, 4.0]);
    }

    #[test]
    fn test_from_values_bad_shape() {
        assert!(Field::from_values("t", 2, vec![1.0, 2.0, 3.0]).is_err());
        assert!(Field::from_values("t", 0, vec![]).is_err());
    }

    #[test]
    fn test_from_columns() {
        let f = Field::from_columns("t", &[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(f.n_levels(), 2);
        assert_eq!(f.get(1, 1), 4.0);
        assert!(Field::from_columns("t", &[vec![1.0, 2.0], vec![3.0]]).is_err());
    }

    #[test]
    fn test_scale_and_stats() {
        let mut f = Field::from_values("t", 1, vec![1.0, 2.0, 3.0]).unwrap();
        f.scale(2.0);
        let (min, max, mean) = f.min_max_mean().unwrap();
        assert_eq!((min, max), (2.0, 6.0));
        assert!((mean - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_field_set_node_count_check() {
        let mut set = FieldSet::new();
        set.insert(Field::zeros("a", 3, 1)).unwrap();
        assert!(set.insert(Field::zeros("b", 4, 1)).is_err());
        assert!(set.insert(Field::zeros("b", 3, 5)).is_ok());
        assert_eq!(set.len(), 2);
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_field_set_missing() {
        let set = FieldSet::new();
        assert!(matches!(set.get("ssh"), Err(DiagbError::MissingField(n)) if n == "ssh"));
    }

    #[test]
    fn test_check_same_shape() {
        let a = Field::zeros("a", 3, 2);
        assert!(a.check_same_shape(&Field::zeros("b", 3, 2)).is_ok());
        assert!(a.check_same_shape(&Field::zeros("b", 3, 1)).is_err());
    }
}
