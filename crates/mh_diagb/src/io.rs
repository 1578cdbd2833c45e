// crates/mh_diagb/src/io.rs

//! 场集合读写
//!
//! JSON 格式，值为节点优先布局：
//!
//! ```json
//! {
//!   "fields": {
//!     "tocn": {"levels": 2, "values": [1.0, 1.1, 2.0, 2.1]},
//!     "ssh":  {"levels": 1, "values": [0.3, 0.4]}
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DiagbError, DiagbResult};
use crate::field::{Field, FieldSet};

/// 场存储接口
pub trait FieldStore: Send + Sync {
    /// 读取场集合
    ///
    /// `variables` 非空时只保留这些变量，缺少任一变量即报错。
    fn read(&self, path: &Path, variables: Option<&[String]>) -> DiagbResult<FieldSet>;

    /// 写出场集合
    fn write(&self, path: &Path, fields: &FieldSet) -> DiagbResult<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct FieldEntry {
    levels: usize,
    values: Vec<f64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FieldDocument {
    fields: BTreeMap<String, FieldEntry>,
}

/// JSON 场存储
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFieldStore;

impl JsonFieldStore {
    /// 从 JSON 文本解析
    pub fn parse(content: &str, variables: Option<&[String]>) -> DiagbResult<FieldSet> {
        let doc: FieldDocument =
            serde_json::from_str(content).map_err(|e| DiagbError::Format(e.to_string()))?;

        let mut entries = doc.fields;
        let wanted: Vec<String> = match variables {
            Some(vars) => vars.to_vec(),
            None => entries.keys().cloned().collect(),
        };

        let mut set = FieldSet::new();
        for name in wanted {
            let entry = entries
                .remove(&name)
                .ok_or_else(|| DiagbError::MissingField(name.clone()))?;
            set.insert(Field::from_values(name, entry.levels, entry.values)?)?;
        }
        Ok(set)
    }

    /// 序列化为 JSON 文本
    pub fn render(fields: &FieldSet) -> DiagbResult<String> {
        let doc = FieldDocument {
            fields: fields
                .iter()
                .map(|f| {
                    (
                        f.name().to_string(),
                        FieldEntry {
                            levels: f.n_levels(),
                            values: f.values().to_vec(),
                        },
                    )
                })
                .collect(),
        };
        serde_json::to_string_pretty(&doc).map_err(|e| DiagbError::Format(e.to_string()))
    }
}

impl FieldStore for JsonFieldStore {
    fn read(&self, path: &Path, variables: Option<&[String]>) -> DiagbResult<FieldSet> {
        let content = std::fs::read_to_string(path)?;
        let set = Self::parse(&content, variables)
            .map_err(|e| match e {
                DiagbError::Format(msg) => DiagbError::Format(format!("{}: {msg}", path.display())),
                other => other,
            })?;
        info!(
            "读取场: {} ({} 个变量, {} 节点)",
            path.display(),
            set.len(),
            set.n_nodes().unwrap_or(0)
        );
        Ok(set)
    }

    fn write(&self, path: &Path, fields: &FieldSet) -> DiagbResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::render(fields)?)?;
        info!("写出场: {} ({} 个变量)", path.display(), fields.len());
        Ok(())
    }
}
