//! 方差估计性质测试
//!
//! 覆盖估计链对外保证的性质：干点、非负、常数场、水深门限、截断、
//! 样本数边界、链状网格的具体数值、平滑对常数场不变以及 halo 同步。

use mh_config::{DispersionSpan, SmoothingConfig, VerticalSmoothingMode};
use mh_diagb::prelude::*;
use mh_diagb::smoothing::{vertical_smooth, HorizontalSmoother};
use mh_mesh::{MeshGeometry, MeshNode, NeighborTable, NoHalo, StencilSource};

/// 经度方向的链状网格
fn chain(n: usize) -> MeshGeometry {
    let nodes = (0..n).map(|i| MeshNode::owned(i as f64 * 0.1, 0.0)).collect();
    let edges = (1..n).map(|i| vec![i - 1, i]).collect();
    MeshGeometry::new(nodes, edges)
}

/// nx × ny 的规则网格，四邻接
fn grid(nx: usize, ny: usize) -> MeshGeometry {
    let mut nodes = Vec::with_capacity(nx * ny);
    let mut edges = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            nodes.push(MeshNode::owned(i as f64 * 0.2, j as f64 * 0.2));
            let id = j * nx + i;
            if i + 1 < nx {
                edges.push(vec![id, id + 1]);
            }
            if j + 1 < ny {
                edges.push(vec![id, id + nx]);
            }
        }
    }
    MeshGeometry::new(nodes, edges)
}

/// 确定性的伪随机数
fn pseudo_random(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as f64 / (1u64 << 31) as f64) * 20.0 - 10.0
        })
        .collect()
}

fn engine(geometry: MeshGeometry, options: EngineOptions) -> DiagbEngine {
    DiagbEngine::new(geometry, StencilSource::Edges, options).unwrap()
}

fn run_one(engine: &DiagbEngine, background: &mut FieldSet, var: &str) -> Field {
    let out = engine
        .run(background, &[var.to_string()], &PostProcessing::default())
        .unwrap();
    out.stddev.get(var).unwrap().clone()
}

#[test]
fn test_all_dry_neighbors_stay_zero() {
    let n = 5;
    let strategy = EstimatorStrategy::simple_ocean(1, 1, ClampPolicy::None);
    let engine = engine(chain(n), EngineOptions::new(strategy));

    let mut bkg = FieldSet::new();
    bkg.insert(Field::from_values("tocn", 2, pseudo_random(n * 2, 7)).unwrap())
        .unwrap();
    // 只有节点 2 是湿点，它的邻居全是干点
    let mut h = Field::filled("hocn", n, 2, 0.05);
    h.column_mut(2).fill(10.0);
    bkg.insert(h).unwrap();

    let out = run_one(&engine, &mut bkg, "tocn");
    // 节点 0、2、4 的邻居全是干点
    for node in [0, 2, 4] {
        assert!(out.column(node).iter().all(|&v| v == 0.0));
    }
}

#[test]
fn test_output_never_negative() {
    let (nx, ny, nl) = (5, 4, 4);
    let n = nx * ny;
    let mut options = EngineOptions::new(EstimatorStrategy::simple_ocean(1, 2, ClampPolicy::None));
    options.smoothing = SmoothingConfig {
        horizontal_iterations: 3,
        vertical_iterations: 2,
        vertical_mode: VerticalSmoothingMode::Progressive,
    };
    options.diffusion = Some(mh_config::DiffusionConfig {
        horizontal: 30_000.0,
        vertical: 5.0,
        mode: mh_config::DiffusionMode::Both,
    });
    let engine = engine(grid(nx, ny), options);

    let mut bkg = FieldSet::new();
    bkg.insert(Field::from_values("tocn", nl, pseudo_random(n * nl, 42)).unwrap())
        .unwrap();
    let mut h = Field::filled("hocn", n, nl, 5.0);
    // 部分陆地
    for node in [0, 7, 13] {
        h.column_mut(node).fill(0.0);
    }
    bkg.insert(h).unwrap();

    let out = run_one(&engine, &mut bkg, "tocn");
    assert!(out.values().iter().all(|&v| v >= 0.0 && v.is_finite()));
    assert!(out.values().iter().any(|&v| v > 0.0));
}

#[test]
fn test_uniform_field_gives_zero() {
    let (nx, ny, nl) = (4, 4, 3);
    let n = nx * ny;
    let engine = engine(
        grid(nx, ny),
        EngineOptions::new(EstimatorStrategy::simple_ocean(1, 2, ClampPolicy::None)),
    );

    let mut bkg = FieldSet::new();
    bkg.insert(Field::filled("tocn", n, nl, 2.5)).unwrap();
    bkg.insert(Field::filled("hocn", n, nl, 10.0)).unwrap();

    let out = engine
        .run(&mut bkg, &["tocn".to_string()], &PostProcessing::default())
        .unwrap();
    assert!(out.stddev.get("tocn").unwrap().values().iter().all(|&v| v == 0.0));
    // 每个点都有足够样本，零离差但样本数大于 2 时仍然写入
    assert_eq!(out.reports[0].written, n * nl);
}

#[test]
fn test_depth_gate_forces_zero() {
    let n = 5;
    let strategy = EstimatorStrategy::full_ocean(1, 2, Some(100.0), ClampPolicy::None);
    let engine = engine(chain(n), EngineOptions::new(strategy));

    let mut bkg = FieldSet::new();
    bkg.insert(Field::from_columns(
        "tocn",
        &[
            vec![-50.0, 80.0],
            vec![90.0, -70.0],
            vec![0.0, 0.0],
            vec![-60.0, 95.0],
            vec![40.0, -30.0],
        ],
    )
    .unwrap())
    .unwrap();
    // 节点 2 的水深代理为 50 < 100，其余为 200
    let mut h = Field::filled("hocn", n, 2, 100.0);
    h.column_mut(2).fill(25.0);
    bkg.insert(h).unwrap();
    bkg.insert(Field::filled("mld", n, 1, 10.0)).unwrap();

    let out = run_one(&engine, &mut bkg, "tocn");
    assert_eq!(out.column(2), &[0.0, 0.0]);
    assert!(out.column(1).iter().all(|&v| v > 0.0));
}

#[test]
fn test_clamp_bounds_designated_variable() {
    let n = 5;
    let clamp = ClampPolicy::Max {
        variable: "ssh".to_string(),
        max: 0.5,
    };
    let engine = engine(
        chain(n),
        EngineOptions::new(EstimatorStrategy::simple_ocean(1, 2, clamp)),
    );

    let mut bkg = FieldSet::new();
    bkg.insert(Field::from_values("ssh", 1, vec![0.0, 10.0, 0.0, -10.0, 0.0]).unwrap())
        .unwrap();
    bkg.insert(Field::from_values("tocn", 1, vec![0.0, 10.0, 0.0, -10.0, 0.0]).unwrap())
        .unwrap();
    bkg.insert(Field::filled("hocn", n, 1, 1.0)).unwrap();

    let out = engine
        .run(
            &mut bkg,
            &["ssh".to_string(), "tocn".to_string()],
            &PostProcessing::default(),
        )
        .unwrap();
    let ssh = out.stddev.get("ssh").unwrap();
    assert!(ssh.values().iter().all(|&v| v <= 0.5));
    // 节点 2 的原始标准差为 sqrt(200)
    assert_eq!(ssh.get(2, 0), 0.5);
    let tocn = out.stddev.get("tocn").unwrap();
    assert!((tocn.get(2, 0) - 200.0_f64.sqrt()).abs() < 1e-12);
}

#[test]
fn test_min_count_boundary() {
    // 星形：节点 0 有 3 个邻居
    let nodes = (0..4).map(|i| MeshNode::owned(i as f64 * 0.1, 0.0)).collect();
    let geometry = MeshGeometry::new(nodes, vec![vec![0, 1], vec![0, 2], vec![0, 3]]);

    let mut bkg = FieldSet::new();
    bkg.insert(Field::from_values("t", 1, vec![0.0, 1.0, 2.0, 6.0]).unwrap())
        .unwrap();

    let exact = engine(geometry.clone(), EngineOptions::new(EstimatorStrategy::atmosphere(0, 3)));
    let out = run_one(&exact, &mut bkg, "t");
    // 样本 {1, 2, 6}: 均值 3, 离差 14, sqrt(14/2)
    assert!((out.get(0, 0) - 7.0_f64.sqrt()).abs() < 1e-12);

    let short = engine(geometry, EngineOptions::new(EstimatorStrategy::atmosphere(0, 4)));
    let out = run_one(&short, &mut bkg, "t");
    assert_eq!(out.get(0, 0), 0.0);
}

#[test]
fn test_dry_samples_excluded_by_atmosphere_preset() {
    // 星形：节点 3 是干点
    let nodes = (0..4).map(|i| MeshNode::owned(i as f64 * 0.1, 0.0)).collect();
    let geometry = MeshGeometry::new(nodes, vec![vec![0, 1], vec![0, 2], vec![0, 3]]);
    let engine = engine(geometry, EngineOptions::new(EstimatorStrategy::atmosphere(0, 2)));

    let mut bkg = FieldSet::new();
    bkg.insert(Field::from_values("t", 1, vec![0.0, 1.0, 3.0, 1000.0]).unwrap())
        .unwrap();
    bkg.insert(Field::from_values("hocn", 1, vec![1.0, 1.0, 1.0, 0.0]).unwrap())
        .unwrap();

    let out = run_one(&engine, &mut bkg, "t");
    // 样本 {1, 3}: 均值 2, 离差 2
    assert!((out.get(0, 0) - 2.0_f64.sqrt()).abs() < 1e-12);
}

#[test]
fn test_chain_middle_node_sqrt_two() {
    let n = 5;
    for span in [DispersionSpan::NeighborCount, DispersionSpan::AllSamples] {
        let strategy = EstimatorStrategy::simple_ocean(1, 2, ClampPolicy::None).with_dispersion_span(span);
        let engine = engine(chain(n), EngineOptions::new(strategy));

        let mut bkg = FieldSet::new();
        bkg.insert(Field::from_values("t", 1, vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap())
            .unwrap();
        bkg.insert(Field::filled("hocn", n, 1, 1.0)).unwrap();

        let out = run_one(&engine, &mut bkg, "t");
        // 样本 {2, 4}，自身不是样本
        assert!((out.get(2, 0) - 2.0_f64.sqrt()).abs() < 1e-12);
    }
}

#[test]
fn test_dispersion_span_multi_level() {
    let n = 5;
    let values: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, i as f64 + 10.0]).collect();

    let run = |span: DispersionSpan| {
        let strategy = EstimatorStrategy::simple_ocean(1, 2, ClampPolicy::None).with_dispersion_span(span);
        let engine = engine(chain(n), EngineOptions::new(strategy));
        let mut bkg = FieldSet::new();
        bkg.insert(Field::from_columns("t", &values).unwrap()).unwrap();
        bkg.insert(Field::filled("hocn", n, 2, 1.0)).unwrap();
        run_one(&engine, &mut bkg, "t").get(2, 0)
    };

    // 样本按邻居、层排列为 [1, 11, 3, 13]，均值 7
    let literal = run(DispersionSpan::NeighborCount);
    assert!((literal - (52.0_f64 / 3.0).sqrt()).abs() < 1e-12);

    let full = run(DispersionSpan::AllSamples);
    assert!((full - (104.0_f64 / 3.0).sqrt()).abs() < 1e-12);
}

#[test]
fn test_smoothing_constant_field_unchanged() {
    let geometry = grid(4, 3);
    let table = StencilSource::Edges.build(&geometry).unwrap();
    let ghost = geometry.ghost_mask();
    let n = geometry.n_nodes();

    let h = Field::filled("hocn", n, 4, 3.0);
    let smoother = HorizontalSmoother::new(&table, &ghost, &NoHalo);

    for mode in [VerticalSmoothingMode::Frozen, VerticalSmoothingMode::Progressive] {
        let mut f = Field::filled("std", n, 4, 0.75);
        smoother.apply(&mut f, Some(&h), 5).unwrap();
        vertical_smooth(&mut f, &ghost, 4, mode);
        assert!(f.values().iter().all(|&v| (v - 0.75).abs() < 1e-12));
    }
}

#[test]
fn test_neighbor_table_out_of_range_empty() {
    let table = NeighborTable::from_rows(vec![vec![1], vec![0]]);
    assert!(table.neighbors(5).is_empty());
}

#[test]
fn test_ghost_values_refreshed_before_estimate() {
    // 节点 3 是节点 0 的 ghost 副本，与节点 2 相邻
    let nodes = vec![
        MeshNode::owned(0.0, 0.0),
        MeshNode::owned(0.1, 0.0),
        MeshNode::owned(0.2, 0.0),
        MeshNode::ghost(0.3, 0.0, 0),
    ];
    let geometry = MeshGeometry::new(nodes, vec![vec![0, 1], vec![1, 2], vec![2, 3]]);
    let engine = engine(geometry, EngineOptions::new(EstimatorStrategy::atmosphere(0, 2)));

    let mut bkg = FieldSet::new();
    bkg.insert(Field::from_values("t", 1, vec![1.0, 5.0, 3.0, 100.0]).unwrap())
        .unwrap();

    let out = run_one(&engine, &mut bkg, "t");
    // 同步后节点 2 的样本为 {5, 1}
    assert!((out.get(2, 0) - 8.0_f64.sqrt()).abs() < 1e-12);
    // ghost 不是计算目标
    assert_eq!(out.get(3, 0), 0.0);
    assert_eq!(bkg.get("t").unwrap().get(3, 0), 1.0);
}
