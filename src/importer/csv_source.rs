// ==========================================
// 记录导入引擎 - CSV 数据源
// ==========================================
// 格式: UTF-8，逗号分隔，双引号包裹，每行一条
// 说明: 不在此处识别表头，由映射的 header_line_number 决定跳过行数
// ==========================================

use crate::domain::record::Record;
use crate::importer::column::TextRow;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::mapping::Mapping;
use crate::importer::source::{RowIter, RowProvider, RowSource};
use csv::ReaderBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

// ==========================================
// CsvFile - CSV 行来源
// ==========================================
pub struct CsvFile {
    path: PathBuf,
    delimiter: u8,
    quote: u8,
}

impl CsvFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            delimiter: b',',
            quote: b'"',
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RowProvider for CsvFile {
    type Row = TextRow;

    fn describe(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn open(&mut self) -> ImportResult<RowIter<TextRow>> {
        // 检查文件存在
        if !self.path.exists() {
            return Err(ImportError::FileNotFound(self.path.display().to_string()));
        }

        debug!(path = %self.path.display(), "打开 CSV 文件");
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .delimiter(self.delimiter)
            .quote(self.quote)
            .from_path(&self.path)?;

        // csv 会跳过空行；按记录起始行号补回空行，保持"一行一条"的行号
        let mut next_line: u64 = 1;
        let rows = reader.into_records().flat_map(move |result| match result {
            Ok(record) => {
                let start = record.position().map(|p| p.line()).unwrap_or(next_line);
                let mut out: Vec<ImportResult<TextRow>> =
                    (next_line..start).map(|_| Ok(TextRow::new())).collect();
                let embedded: u64 = record.iter().map(|f| f.matches('\n').count() as u64).sum();
                next_line = start + embedded + 1;
                out.push(Ok(record.iter().map(str::to_string).collect()));
                out
            }
            Err(e) => vec![Err(ImportError::from(e))],
        });
        Ok(Box::new(rows))
    }
}

/// CSV 数据源
pub type CsvSource<Rec> = RowSource<Rec, CsvFile>;

impl<Rec: Record> RowSource<Rec, CsvFile> {
    pub fn new(path: impl AsRef<Path>, mapping: Mapping<TextRow>) -> Self {
        Self::from_provider(CsvFile::new(path), mapping)
    }

    /// 自定义分隔符
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.provider_mut().delimiter = delimiter;
        self
    }

    /// 自定义引号字符
    pub fn with_quote(mut self, quote: u8) -> Self {
        self.provider_mut().quote = quote;
        self
    }
}
