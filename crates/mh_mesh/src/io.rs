// crates/mh_mesh/src/io.rs
//! 几何文件读写（JSON）
//!
//! ```json
//! {
//!   "nodes": [
//!     {"position": {"lon": 0.0, "lat": 0.0}},
//!     {"position": {"lon": 1.0, "lat": 0.0}, "ghost": true, "owner": 0}
//!   ],
//!   "edges": [[0, 1]]
//! }
//! ```

use std::path::Path;

use tracing::info;

use crate::error::{MeshError, MeshResult};
use crate::geometry::MeshGeometry;

/// 读取几何文件并校验坐标
pub fn load_geometry(path: impl AsRef<Path>) -> MeshResult<MeshGeometry> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let geometry: MeshGeometry =
        serde_json::from_str(&content).map_err(|e| MeshError::Format(e.to_string()))?;
    geometry.validate_positions()?;

    info!(
        "几何: {} ({} 节点, {} ghost, {} 边)",
        path.display(),
        geometry.n_nodes(),
        geometry.n_ghosts(),
        geometry.n_edges()
    );
    Ok(geometry)
}

/// 保存几何文件
pub fn save_geometry(geometry: &MeshGeometry, path: impl AsRef<Path>) -> MeshResult<()> {
    let content =
        serde_json::to_string_pretty(geometry).map_err(|e| MeshError::Format(e.to_string()))?;
    std::fs::write(path, content)?;
    Ok(())
}
