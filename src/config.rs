//! 配置模块，负责加载JSON配置文件

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::fields::FieldDefinitions;
use crate::validator::ValidationOptions;

/// 配置加载错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file does not exist: {0}")]
    NotFound(PathBuf),

    #[error("cannot read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse configuration {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

/// SQL 预览的配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlOptions {
    pub table: String,
    /// 自由文本匹配的列
    pub free_text_column: String,
    /// `k:a OR k:b ...` 链改写为 `k IN (...)` 所需的最小长度
    pub or_to_in_threshold: usize,
}

impl Default for SqlOptions {
    fn default() -> Self {
        Self { table: "events".to_string(), free_text_column: "message".to_string(), or_to_in_threshold: 3 }
    }
}

/// 除查询文本外，处理流程需要的全部配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub fields: FieldDefinitions,
    #[serde(default)]
    pub validation: ValidationOptions,
    #[serde(default)]
    pub sql: SqlOptions,
}

impl Default for SearchConfig {
    /// 内置字段加默认选项（用于测试或fallback）
    fn default() -> Self {
        Self {
            fields: FieldDefinitions::builtin(),
            validation: ValidationOptions::default(),
            sql: SqlOptions::default(),
        }
    }
}

impl SearchConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        // 检查文件是否存在
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        // 读取文件内容
        let content = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;

        // 解析JSON
        let config: SearchConfig = serde_json::from_str(&content)
            .map_err(|source| ConfigError::Parse { origin: path.display().to_string(), source })?;
        log::debug!("loaded {} field definitions from {}", config.fields.len(), path.display());
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|source| ConfigError::Parse { origin: "string".to_string(), source })
    }
}
