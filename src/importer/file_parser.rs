// ==========================================
// 实验室产能排程系统 - 文件解析器
// ==========================================
// 职责: CSV 文件 → 原始行记录（列名 → 值）
// 说明: 行号按源文件行计（表头为第 1 行）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// 原始行: (源文件行号, 列名 → 去首尾空白的值)
pub type RawRow = (usize, HashMap<String, String>);

// ==========================================
// FileParser Trait
// ==========================================
pub trait FileParser: Send + Sync {
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<RawRow>>;
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 从任意读取器解析（测试与内存数据使用）
    pub fn parse_reader<R: Read>(&self, reader: R) -> ImportResult<Vec<RawRow>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        let mut records = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            let row_number = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 2);

            let row_map: HashMap<String, String> = record
                .iter()
                .enumerate()
                .filter_map(|(col, value)| {
                    headers
                        .get(col)
                        .map(|h| (h.clone(), value.trim().to_string()))
                })
                .collect();

            // 跳过完全空白的行
            if row_map.values().all(|v| v.is_empty()) {
                continue;
            }
            records.push((row_number, row_map));
        }
        Ok(records)
    }
}

impl FileParser for CsvParser {
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<RawRow>> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }
        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        self.parse_reader(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_csv_parser_valid_file() {
        let mut temp_file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "ID, Method ,sample_count").unwrap();
        writeln!(temp_file, "REQ-1,HPLC-001, 30 ").unwrap();
        writeln!(temp_file, ",,").unwrap();
        writeln!(temp_file, "REQ-2,GC-002,12").unwrap();
        temp_file.flush().unwrap();

        let rows = CsvParser.parse_to_raw_records(temp_file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 2);
        assert_eq!(rows[0].1.get("method"), Some(&"HPLC-001".to_string()));
        assert_eq!(rows[0].1.get("sample_count"), Some(&"30".to_string()));
        // 空行被跳过，但行号保持源文件位置
        assert_eq!(rows[1].0, 4);
    }

    #[test]
    fn test_csv_parser_file_not_found() {
        let result = CsvParser.parse_to_raw_records(Path::new("/nonexistent/demand.csv"));
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_csv_parser_rejects_other_extension() {
        let temp_file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        let result = CsvParser.parse_to_raw_records(temp_file.path());
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
    }
}
