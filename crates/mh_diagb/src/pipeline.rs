// crates/mh_diagb/src/pipeline.rs

//! 估计流水线
//!
//! ```text
//! 邻居表 ─┐
//!         ├─> 局部方差估计 -> 平滑 -> 扩散 -> 混合 -> 缩放/掩码
//! 垂向结构 ┘
//! ```
//!
//! - [`DiagbEngine`]: 内存中的估计链，输入为几何和背景场集合
//! - [`DiagbPipeline`]: 按运行配置读文件、执行估计链并写出结果

use std::path::{Path, PathBuf};

use mh_config::{DiagbConfig, DiffusionConfig, SmoothingConfig};
use mh_mesh::{io::load_geometry, GhostCopyHalo, HaloExchange, MeshGeometry, NeighborTable, NoHalo, StencilSource};
use serde::Serialize;
use tracing::{debug, info};

use crate::blend::{hybrid_blend, BlendWeights, NearestNeighborRegridder, Regridder};
use crate::diffusion::{DiffusionOperator, GraphDiffusion, ScaleFields};
use crate::error::{DiagbError, DiagbResult};
use crate::estimator::{EstimateStats, EstimatorInputs, LocalVarianceEstimator};
use crate::field::{Field, FieldSet};
use crate::io::{FieldStore, JsonFieldStore};
use crate::rescale::{apply_global_rescale, apply_mask, apply_scalar_rescale};
use crate::smoothing::{vertical_smooth, HorizontalSmoother};
use crate::strategy::EstimatorStrategy;
use crate::vertical::VerticalStructure;

/// 单个变量的运行统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableReport {
    /// 变量名
    pub name: String,
    /// 写入标准差的 (节点, 层) 数
    pub written: usize,
    /// 样本不足或零离差而跳过的数目
    pub skipped: usize,
    /// 被水深门限置零的数目
    pub gated: usize,
    /// 被截断的数目
    pub clamped: usize,
    /// 最终场最小值
    pub min: f64,
    /// 最终场最大值
    pub max: f64,
    /// 最终场平均值
    pub mean: f64,
}

impl VariableReport {
    fn new(name: &str, stats: EstimateStats) -> Self {
        Self {
            name: name.to_string(),
            written: stats.written,
            skipped: stats.insufficient + stats.degenerate,
            gated: stats.gated,
            clamped: stats.clamped,
            min: 0.0,
            max: 0.0,
            mean: 0.0,
        }
    }

    fn summarize(&mut self, field: &Field) {
        if let Some((min, max, mean)) = field.min_max_mean() {
            self.min = min;
            self.max = max;
            self.mean = mean;
        }
    }
}

/// 估计链选项
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// 估计器策略
    pub strategy: EstimatorStrategy,
    /// 层厚变量名
    pub thickness_variable: String,
    /// 混合层深度变量名
    pub mld_variable: String,
    /// 简单平滑
    pub smoothing: SmoothingConfig,
    /// 扩散滤波；None 时跳过
    pub diffusion: Option<DiffusionConfig>,
}

impl EngineOptions {
    /// 只做估计，不做平滑和扩散
    pub fn new(strategy: EstimatorStrategy) -> Self {
        Self {
            strategy,
            thickness_variable: "hocn".to_string(),
            mld_variable: "mld".to_string(),
            smoothing: SmoothingConfig::default(),
            diffusion: None,
        }
    }

    /// 从运行配置构建
    pub fn from_config(config: &DiagbConfig) -> Self {
        Self {
            strategy: EstimatorStrategy::from_config(config),
            thickness_variable: config.thickness_variable.clone(),
            mld_variable: config.mixed_layer.variable.clone(),
            smoothing: config.smoothing,
            diffusion: config.diffusion,
        }
    }

    fn needs_thickness(&self) -> bool {
        let s = &self.strategy;
        s.mask.require_thickness || s.mask.min_depth.is_some() || s.vertical_window.needs_mixed_layer()
    }
}

/// 估计链输出
#[derive(Debug, Clone)]
pub struct EngineOutput {
    /// 标准差场集合
    pub stddev: FieldSet,
    /// 各变量统计
    pub reports: Vec<VariableReport>,
    /// 垂向结构（有层厚场时）
    pub vertical: Option<VerticalStructure>,
}

/// 后处理参数
#[derive(Debug, Clone, Copy)]
pub struct PostProcessing<'a> {
    /// 已映射到工作网格的气候态标准差与混合权重
    pub climate: Option<(&'a FieldSet, BlendWeights)>,
    /// 全局缩放系数场
    pub global_rescale: Option<&'a FieldSet>,
    /// 标量缩放因子
    pub rescale: f64,
}

impl Default for PostProcessing<'_> {
    fn default() -> Self {
        Self {
            climate: None,
            global_rescale: None,
            rescale: 1.0,
        }
    }
}

/// 内存中的估计链
pub struct DiagbEngine {
    geometry: MeshGeometry,
    neighbors: NeighborTable,
    ghost: Vec<bool>,
    halo: Box<dyn HaloExchange>,
    options: EngineOptions,
}

impl DiagbEngine {
    /// 构建邻居表和 halo
    ///
    /// 几何中存在 ghost → owner 映射时使用进程内复制，否则不做同步。
    pub fn new(
        geometry: MeshGeometry,
        stencil: StencilSource,
        options: EngineOptions,
    ) -> DiagbResult<Self> {
        geometry.validate_positions()?;
        let neighbors = stencil.build(&geometry)?;
        let ghost = geometry.ghost_mask();

        let copy = GhostCopyHalo::from_geometry(&geometry)?;
        let halo: Box<dyn HaloExchange> = if copy.n_links() > 0 {
            Box::new(copy)
        } else {
            Box::new(NoHalo)
        };

        info!(
            "估计链: {} 节点 ({} ghost), 邻居 {} 项, halo={}",
            geometry.n_nodes(),
            geometry.n_ghosts(),
            neighbors.nnz(),
            halo.name()
        );

        Ok(Self {
            geometry,
            neighbors,
            ghost,
            halo,
            options,
        })
    }

    /// 替换 halo 实现
    pub fn with_halo(mut self, halo: Box<dyn HaloExchange>) -> Self {
        self.halo = halo;
        self
    }

    /// 邻居表
    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    /// 几何
    pub fn geometry(&self) -> &MeshGeometry {
        &self.geometry
    }

    /// 估计器策略
    pub fn strategy(&self) -> &EstimatorStrategy {
        &self.options.strategy
    }

    /// 估计、平滑并可选扩散
    ///
    /// 背景场集合中的 ghost 值会被 halo 同步刷新。
    pub fn estimate(
        &self,
        background: &mut FieldSet,
        variables: &[String],
    ) -> DiagbResult<EngineOutput> {
        let n_nodes = self.geometry.n_nodes();
        if let Some(n) = background.n_nodes() {
            if n != n_nodes {
                return Err(DiagbError::shape("background", n_nodes, n));
            }
        }

        let thickness = self.prepare_thickness(background)?;
        let vertical = self.prepare_vertical(background, thickness.as_ref())?;

        let estimator = LocalVarianceEstimator::new(&self.neighbors, &self.ghost, &self.options.strategy);
        let smoother = HorizontalSmoother::new(&self.neighbors, &self.ghost, self.halo.as_ref());
        let smoothing = &self.options.smoothing;

        let mut stddev = FieldSet::new();
        let mut reports = Vec::with_capacity(variables.len());

        for name in variables {
            let bkg = background.get_mut(name)?;
            let n_levels = bkg.n_levels();
            self.halo.sync(bkg.values_mut(), n_levels)?;
            let bkg = &*bkg;

            let mut out = Field::zeros(name.as_str(), n_nodes, n_levels);
            let inputs = EstimatorInputs {
                background: bkg,
                thickness: thickness.as_ref(),
                vertical: vertical.as_ref(),
            };
            let stats = estimator.estimate(&inputs, &mut out)?;

            smoother.apply(&mut out, thickness.as_ref(), smoothing.horizontal_iterations)?;
            vertical_smooth(
                &mut out,
                &self.ghost,
                smoothing.vertical_iterations,
                smoothing.vertical_mode,
            );

            reports.push(VariableReport::new(name, stats));
            stddev.insert(out)?;
        }

        if let Some(diffusion) = &self.options.diffusion {
            self.diffuse(&mut stddev, diffusion, thickness.as_ref())?;
        }

        Ok(EngineOutput {
            stddev,
            reports,
            vertical,
        })
    }

    /// 混合、缩放并再次掩码，刷新统计
    pub fn finalize(&self, output: &mut EngineOutput, post: &PostProcessing<'_>) -> DiagbResult<()> {
        if let Some((climate, weights)) = post.climate {
            hybrid_blend(&mut output.stddev, climate, weights)?;
        }
        if let Some(coefficients) = post.global_rescale {
            apply_global_rescale(&mut output.stddev, coefficients)?;
        }
        apply_scalar_rescale(&mut output.stddev, post.rescale)?;
        apply_mask(&mut output.stddev, &self.options.strategy, output.vertical.as_ref());

        for report in &mut output.reports {
            report.summarize(output.stddev.get(&report.name)?);
            debug!(
                "{}: written={} skipped={} gated={} clamped={} min={:.4e} max={:.4e} mean={:.4e}",
                report.name,
                report.written,
                report.skipped,
                report.gated,
                report.clamped,
                report.min,
                report.max,
                report.mean
            );
        }
        Ok(())
    }

    /// 估计加后处理
    pub fn run(
        &self,
        background: &mut FieldSet,
        variables: &[String],
        post: &PostProcessing<'_>,
    ) -> DiagbResult<EngineOutput> {
        let mut output = self.estimate(background, variables)?;
        self.finalize(&mut output, post)?;
        Ok(output)
    }

    fn prepare_thickness(&self, background: &FieldSet) -> DiagbResult<Option<Field>> {
        let name = &self.options.thickness_variable;
        let Some(h) = background.try_get(name) else {
            if self.options.needs_thickness() {
                return Err(DiagbError::MissingField(name.clone()));
            }
            return Ok(None);
        };
        let mut h = h.clone();
        let n_levels = h.n_levels();
        self.halo.sync(h.values_mut(), n_levels)?;
        Ok(Some(h))
    }

    fn prepare_vertical(
        &self,
        background: &FieldSet,
        thickness: Option<&Field>,
    ) -> DiagbResult<Option<VerticalStructure>> {
        let Some(h) = thickness else {
            return Ok(None);
        };
        let vertical = VerticalStructure::from_thickness(h);
        if !self.options.strategy.vertical_window.needs_mixed_layer() {
            return Ok(Some(vertical));
        }
        let mld = background.get(&self.options.mld_variable)?;
        Ok(Some(vertical.with_mixed_layer(mld)?))
    }

    fn diffuse(
        &self,
        fields: &mut FieldSet,
        config: &DiffusionConfig,
        thickness: Option<&Field>,
    ) -> DiagbResult<()> {
        let positions = self.geometry.positions();
        let mut operator = GraphDiffusion::new(&self.neighbors, &positions, &self.ghost, self.halo.as_ref())?;
        if let Some(h) = thickness {
            operator = operator.with_thickness(h);
        }
        operator.set_parameters(&ScaleFields::constant(
            self.geometry.n_nodes(),
            config.horizontal,
            config.vertical,
        ))?;
        operator.multiply(fields, config.mode)?;
        info!(
            "扩散滤波: L_h={} m, L_v={} m, mode={:?}",
            config.horizontal, config.vertical, config.mode
        );
        Ok(())
    }
}

/// 运行报告
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// 节点数
    pub n_nodes: usize,
    /// ghost 节点数
    pub n_ghosts: usize,
    /// 输出路径
    pub output: PathBuf,
    /// 各变量统计
    pub variables: Vec<VariableReport>,
}

/// 按运行配置执行的流水线
pub struct DiagbPipeline {
    config: DiagbConfig,
    store: Box<dyn FieldStore>,
}

impl DiagbPipeline {
    /// 校验配置并创建流水线
    pub fn from_config(config: DiagbConfig) -> DiagbResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store: Box::new(JsonFieldStore),
        })
    }

    /// 从配置文件创建
    pub fn from_file(path: impl AsRef<Path>) -> DiagbResult<Self> {
        Self::from_config(DiagbConfig::from_file(path)?)
    }

    /// 替换场存储
    pub fn with_store(mut self, store: Box<dyn FieldStore>) -> Self {
        self.store = store;
        self
    }

    /// 运行配置
    pub fn config(&self) -> &DiagbConfig {
        &self.config
    }

    /// 执行并写出结果
    pub fn run(&self) -> DiagbResult<RunReport> {
        let config = &self.config;

        let geometry = load_geometry(&config.geometry)?;
        let stencil = match config.number_of_neighbors {
            Some(nbh) => StencilSource::Nearest { nbh },
            None => StencilSource::Edges,
        };
        let engine = DiagbEngine::new(geometry, stencil, EngineOptions::from_config(config))?;

        let mut background = self.store.read(&config.background, None)?;
        let mut output = engine.estimate(&mut background, &config.variables)?;

        let climate = match &config.climate {
            Some(clim) => {
                let clim_geometry = load_geometry(&clim.geometry)?;
                let source = self.store.read(&clim.stddev_path, Some(config.variables.as_slice()))?;
                let regridder =
                    NearestNeighborRegridder::new(&clim_geometry.positions(), &engine.geometry().positions())?;
                let weights = BlendWeights {
                    diagb_weight: clim.diagb_weight,
                    climate_rescale: clim.staticb_rescaling_factor,
                };
                Some((regridder.regrid(&source)?, weights))
            }
            None => None,
        };
        let global_rescale = match &config.global_rescale {
            Some(path) => Some(self.store.read(path, Some(config.variables.as_slice()))?),
            None => None,
        };

        let post = PostProcessing {
            climate: climate.as_ref().map(|(fields, w)| (fields, *w)),
            global_rescale: global_rescale.as_ref(),
            rescale: config.rescale,
        };
        engine.finalize(&mut output, &post)?;

        self.store.write(&config.output, &output.stddev)?;

        let geometry = engine.geometry();
        Ok(RunReport {
            n_nodes: geometry.n_nodes(),
            n_ghosts: geometry.n_ghosts(),
            output: config.output.clone(),
            variables: output.reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mh_mesh::MeshNode;

    fn chain_geometry(n: usize) -> MeshGeometry {
        let nodes = (0..n).map(|i| MeshNode::owned(i as f64 * 0.1, 0.0)).collect();
        let edges = (1..n).map(|i| vec![i - 1, i]).collect();
        MeshGeometry::new(nodes, edges)
    }

    #[test]
    fn test_missing_thickness_for_ocean() {
        let strategy = EstimatorStrategy::simple_ocean(1, 2, Default::default());
        let engine =
            DiagbEngine::new(chain_geometry(3), StencilSource::Edges, EngineOptions::new(strategy)).unwrap();

        let mut bkg = FieldSet::new();
        bkg.insert(Field::zeros("t", 3, 1)).unwrap();
        assert!(matches!(
            engine.estimate(&mut bkg, &["t".to_string()]),
            Err(DiagbError::MissingField(name)) if name == "hocn"
        ));
    }

    #[test]
    fn test_missing_variable() {
        let strategy = EstimatorStrategy::atmosphere(0, 2);
        let engine =
            DiagbEngine::new(chain_geometry(3), StencilSource::Edges, EngineOptions::new(strategy)).unwrap();
        let mut bkg = FieldSet::new();
        bkg.insert(Field::zeros("t", 3, 1)).unwrap();
        assert!(matches!(
            engine.estimate(&mut bkg, &["q".to_string()]),
            Err(DiagbError::MissingField(_))
        ));
    }

    #[test]
    fn test_atmosphere_chain_report() {
        let strategy = EstimatorStrategy::atmosphere(0, 2);
        let engine =
            DiagbEngine::new(chain_geometry(5), StencilSource::Edges, EngineOptions::new(strategy)).unwrap();
        let mut bkg = FieldSet::new();
        bkg.insert(Field::from_values("t", 1, vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap())
            .unwrap();

        let out = engine
            .run(&mut bkg, &["t".to_string()], &PostProcessing::default())
            .unwrap();
        let t = out.stddev.get("t").unwrap();
        // 内部节点样本 {i-1, i+1}，差为 2，标准差 sqrt(2)
        for i in 1..4 {
            assert!((t.get(i, 0) - 2.0_f64.sqrt()).abs() < 1e-12);
        }
        assert_eq!(t.get(0, 0), 0.0);
        assert_eq!(out.reports[0].written, 3);
        assert_eq!(out.reports[0].skipped, 2);
        assert!((out.reports[0].max - 2.0_f64.sqrt()).abs() < 1e-12);
    }
}
