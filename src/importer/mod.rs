// ==========================================
// 实验室产能排程系统 - 导入层
// ==========================================
// 职责: 外部需求文件导入，生成 DemandRequest 并提交调度器
// 支持: CSV
// ==========================================

pub mod demand_importer;
pub mod error;
pub mod field_mapper;
pub mod file_parser;

// 重导出核心类型
pub use demand_importer::{DemandImportReport, DemandImporter, ImportedDemand, RowRejection};
pub use error::{ImportError, ImportResult};
pub use field_mapper::DemandFieldMapper;
pub use file_parser::{CsvParser, FileParser, RawRow};
