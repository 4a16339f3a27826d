// ==========================================
// 实验室产能排程系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行级错误携带行号，由导入器收集为拒绝记录而非中止导入
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("缺少必需列: {0}")]
    MissingColumn(String),

    // ===== 行级错误 =====
    #[error("字段映射失败 (行 {row}): {message}")]
    FieldMappingError { row: usize, message: String },

    #[error("类型转换失败 (行 {row}, 字段 {field}): {message}")]
    TypeConversionError {
        row: usize,
        field: String,
        message: String,
    },

    #[error("日期格式错误 (行 {row}, 字段 {field}): 期望 YYYY-MM-DD 或 YYYYMMDD，实际 {value}")]
    DateFormatError {
        row: usize,
        field: String,
        value: String,
    },

    #[error("主键缺失 (行 {0}): id 为空")]
    PrimaryKeyMissing(usize),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 行级错误的行号（文件级错误返回 None）
    pub fn row(&self) -> Option<usize> {
        match self {
            ImportError::FieldMappingError { row, .. }
            | ImportError::TypeConversionError { row, .. }
            | ImportError::DateFormatError { row, .. } => Some(*row),
            ImportError::PrimaryKeyMissing(row) => Some(*row),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
