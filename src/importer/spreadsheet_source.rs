// ==========================================
// 记录导入引擎 - 表格文件数据源
// ==========================================
// 格式: .xlsx / .xls / .ods（calamine 自动识别）
// 说明: 读取第一个（或指定）工作表，单元格统一转为字符串，按位置列映射
// ==========================================

use crate::domain::record::Record;
use crate::importer::column::TextRow;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::mapping::Mapping;
use crate::importer::source::{RowIter, RowProvider, RowSource};
use calamine::{open_workbook_auto, Reader};
use std::path::{Path, PathBuf};
use tracing::debug;

const SUPPORTED_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

// ==========================================
// SpreadsheetFile - 表格行来源
// ==========================================
pub struct SpreadsheetFile {
    path: PathBuf,
    sheet: Option<String>,
}

impl SpreadsheetFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            sheet: None,
        }
    }

    pub fn sheet(mut self, name: impl Into<String>) -> Self {
        self.sheet = Some(name.into());
        self
    }
}

impl RowProvider for SpreadsheetFile {
    type Row = TextRow;

    fn describe(&self) -> String {
        let file = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string());
        match &self.sheet {
            Some(sheet) => format!("{}#{}", file, sheet),
            None => file,
        }
    }

    fn open(&mut self) -> ImportResult<RowIter<TextRow>> {
        // 检查文件存在
        if !self.path.exists() {
            return Err(ImportError::FileNotFound(self.path.display().to_string()));
        }

        // 检查扩展名
        let ext = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(&self.path)?;

        let sheet_name = match &self.sheet {
            Some(name) => name.clone(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| ImportError::ExcelParseError("表格文件无工作表".to_string()))?,
        };

        let range = workbook.worksheet_range(&sheet_name)?;
        let rows = pad_to_origin(
            range.start().unwrap_or((0, 0)),
            range
                .rows()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect()),
        );

        debug!(sheet = %sheet_name, rows = rows.len(), "工作表读取完成");
        Ok(Box::new(rows.into_iter().map(Ok)))
    }
}

/// calamine 会裁掉前导空行/空列；补回后行列位置与 A1 对齐
fn pad_to_origin(start: (u32, u32), rows: impl Iterator<Item = TextRow>) -> Vec<TextRow> {
    let (start_row, start_col) = start;
    let mut padded: Vec<TextRow> = (0..start_row).map(|_| TextRow::new()).collect();
    padded.extend(rows.map(|row| {
        let mut cells = vec![String::new(); start_col as usize];
        cells.extend(row);
        cells
    }));
    padded
}

/// 表格文件数据源
pub type SpreadsheetSource<Rec> = RowSource<Rec, SpreadsheetFile>;

impl<Rec: Record> RowSource<Rec, SpreadsheetFile> {
    pub fn new(path: impl AsRef<Path>, mapping: Mapping<TextRow>) -> Self {
        Self::from_provider(SpreadsheetFile::new(path), mapping)
    }

    /// 指定工作表
    pub fn with_sheet(mut self, name: impl Into<String>) -> Self {
        self.provider_mut().sheet = Some(name.into());
        self
    }
}
