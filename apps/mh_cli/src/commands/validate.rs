// apps/mh_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 检查配置、几何一致性以及背景场是否包含所需变量，不做计算。

use anyhow::{bail, Result};
use clap::Args;
use mh_config::{DiagbConfig, StrategyPreset};
use mh_diagb::io::{FieldStore, JsonFieldStore};
use mh_mesh::io::load_geometry;
use mh_mesh::{GhostCopyHalo, StencilSource};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn is_ok_strict(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== MariHydro DiagB 配置验证 ===");

    let mut result = ValidationResult::default();

    println!("\n检查配置文件: {}", args.config.display());
    match DiagbConfig::from_file(&args.config) {
        Ok(config) => {
            println!("  ✓ 配置有效");
            check_config(&config, &mut result);
            check_geometry(&config, &mut result);
            check_background(&config, &mut result);
        }
        Err(e) => result.add_error(format!("配置错误: {e}")),
    }

    print_validation_result(&result, args.strict)
}

fn check_config(config: &DiagbConfig, result: &mut ValidationResult) {
    if config.halo_points != 1 {
        result.add_warning(format!(
            "number of halo points = {}，估计只读取一层邻居",
            config.halo_points
        ));
    }
    if config.strategy == StrategyPreset::Atmosphere && config.min_depth.is_some() {
        result.add_warning("atmosphere 策略忽略 min depth");
    }
    if let Some(clim) = &config.climate {
        if clim.diagb_weight == 0.0 {
            result.add_warning("diagb weight = 0，输出完全由气候态决定");
        }
    }
    if config.smoothing.vertical_iterations > 1
        && config.smoothing.vertical_mode == mh_config::VerticalSmoothingMode::Frozen
    {
        result.add_warning("frozen 模式下多次垂向平滑与一次相同");
    }
}

fn check_geometry(config: &DiagbConfig, result: &mut ValidationResult) {
    println!("\n检查几何: {}", config.geometry.display());
    let geometry = match load_geometry(&config.geometry) {
        Ok(g) => g,
        Err(e) => {
            result.add_error(format!("几何错误: {e}"));
            return;
        }
    };

    let stencil = match config.number_of_neighbors {
        Some(nbh) => StencilSource::Nearest { nbh },
        None => StencilSource::Edges,
    };
    match stencil.build(&geometry) {
        Ok(table) => {
            let isolated = table.iter().filter(|row| row.is_empty()).count();
            if isolated > 0 {
                result.add_warning(format!("{isolated} 个节点没有邻居"));
            }
            println!("  ✓ 邻居表: {} 节点, {} 项", table.n_nodes(), table.nnz());
        }
        Err(e) => result.add_error(format!("网格一致性错误: {e}")),
    }

    match GhostCopyHalo::from_geometry(&geometry) {
        Ok(halo) => {
            let orphans = geometry.n_ghosts() - halo.n_links();
            if orphans > 0 {
                result.add_warning(format!("{orphans} 个 ghost 节点没有归属节点，halo 同步时保持原值"));
            }
        }
        Err(e) => result.add_error(format!("halo 映射错误: {e}")),
    }
}

fn check_background(config: &DiagbConfig, result: &mut ValidationResult) {
    println!("\n检查背景场: {}", config.background.display());
    let background = match JsonFieldStore.read(&config.background, None) {
        Ok(b) => b,
        Err(e) => {
            result.add_error(format!("背景场错误: {e}"));
            return;
        }
    };

    for var in &config.variables {
        if !background.contains(var) {
            result.add_error(format!("背景场缺少变量: {var}"));
        }
    }
    if config.strategy != StrategyPreset::Atmosphere
        && !background.contains(&config.thickness_variable)
    {
        result.add_error(format!("背景场缺少层厚变量: {}", config.thickness_variable));
    }
    if config.strategy == StrategyPreset::FullOcean
        && config.mixed_layer.enabled
        && !background.contains(&config.mixed_layer.variable)
    {
        result.add_error(format!("背景场缺少混合层深度变量: {}", config.mixed_layer.variable));
    }
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    println!();
    for w in &result.warnings {
        warn!("{}", w);
        println!("  ⚠ {w}");
    }
    for e in &result.errors {
        error!("{}", e);
        println!("  ✗ {e}");
    }

    let ok = if strict {
        result.is_ok_strict()
    } else {
        result.is_ok()
    };
    if !ok {
        bail!(
            "验证失败: {} 个错误, {} 个警告",
            result.errors.len(),
            result.warnings.len()
        );
    }
    println!("验证通过 ({} 个警告)", result.warnings.len());
    Ok(())
}
