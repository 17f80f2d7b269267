//! Evidence export.
//!
//! Run artifacts land under a fixed directory layout so downstream tooling
//! can find them by step number alone:
//!
//! ```text
//! <root>/databases/Step_<n>[_<idx>].xlsx   query result sets
//! <root>/apis/Step_<n>[_<idx>].json        API responses
//! <root>/images/Step_<n>[_<idx>].png       screenshots
//! ```
//!
//! The `_<idx>` suffix appears only when one step produces several artifacts
//! of the same kind. Workbooks are written directly as a minimal OOXML
//! container (one sheet, inline strings), with no spreadsheet dependency beyond
//! the zip writer.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde_json::Value;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::result::{GrabarError, GrabarResult};

const DATABASES_DIR: &str = "databases";
const APIS_DIR: &str = "apis";
const IMAGES_DIR: &str = "images";

/// Writes run evidence under a root directory.
#[derive(Debug, Clone)]
pub struct EvidenceExporter {
    root: PathBuf,
}

impl EvidenceExporter {
    /// Exporter rooted at the given directory. Nothing is created until the
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `databases/Step_<n>[_<idx>].xlsx` holding one row set.
    ///
    /// `columns` becomes the header row; each entry in `rows` is rendered
    /// cell by cell as text.
    ///
    /// # Errors
    ///
    /// I/O and zip failures.
    pub fn export_db_evidence(
        &self,
        step: u32,
        index: Option<u32>,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> GrabarResult<PathBuf> {
        let path = self.artifact_path(DATABASES_DIR, step, index, "xlsx");
        ensure_parent(&path)?;
        let file = fs::File::create(&path)?;
        write_workbook(file, columns, rows)?;
        tracing::debug!(path = %path.display(), rows = rows.len(), "wrote db evidence");
        Ok(path)
    }

    /// `apis/Step_<n>[_<idx>].json` holding a pretty-printed JSON document.
    ///
    /// # Errors
    ///
    /// I/O and serialization failures.
    pub fn export_api_evidence(
        &self,
        step: u32,
        index: Option<u32>,
        body: &Value,
    ) -> GrabarResult<PathBuf> {
        let path = self.artifact_path(APIS_DIR, step, index, "json");
        ensure_parent(&path)?;
        let rendered = serde_json::to_vec_pretty(body)?;
        fs::write(&path, rendered)?;
        tracing::debug!(path = %path.display(), "wrote api evidence");
        Ok(path)
    }

    /// Target path for `images/Step_<n>[_<idx>].png`, parent created.
    ///
    /// The capture itself goes through the page driver; this only decides
    /// where the bytes belong.
    ///
    /// # Errors
    ///
    /// I/O failures creating the parent directory.
    pub fn screenshot_path(&self, step: u32, index: Option<u32>) -> GrabarResult<PathBuf> {
        let path = self.artifact_path(IMAGES_DIR, step, index, "png");
        ensure_parent(&path)?;
        Ok(path)
    }

    fn artifact_path(&self, dir: &str, step: u32, index: Option<u32>, ext: &str) -> PathBuf {
        let name = match index {
            Some(i) => format!("Step_{step}_{i}.{ext}"),
            None => format!("Step_{step}.{ext}"),
        };
        self.root.join(dir).join(name)
    }
}

fn ensure_parent(path: &Path) -> GrabarResult<()> {
    let parent = path.parent().ok_or_else(|| GrabarError::EvidenceError {
        message: format!("artifact path '{}' has no parent", path.display()),
    })?;
    fs::create_dir_all(parent)?;
    Ok(())
}

// ============================================================================
// Minimal xlsx writer
// ============================================================================

/// One-sheet workbook with inline strings. Only the parts a reader demands:
/// content types, the package rels, the workbook, its rels, and the sheet.
fn write_workbook<W: std::io::Write + std::io::Seek>(
    writer: W,
    columns: &[String],
    rows: &[Vec<String>],
) -> GrabarResult<()> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default();

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(CONTENT_TYPES.as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(PACKAGE_RELS.as_bytes())?;

    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(WORKBOOK.as_bytes())?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(WORKBOOK_RELS.as_bytes())?;

    zip.start_file("xl/worksheets/sheet1.xml", options)?;
    zip.write_all(render_sheet(columns, rows).as_bytes())?;

    zip.finish()?;
    Ok(())
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Results" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

fn render_sheet(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    render_row(&mut xml, 1, columns.iter().map(String::as_str));
    for (i, row) in rows.iter().enumerate() {
        render_row(&mut xml, i as u32 + 2, row.iter().map(String::as_str));
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn render_row<'a>(xml: &mut String, row_number: u32, cells: impl Iterator<Item = &'a str>) {
    use std::fmt::Write as _;
    let _ = write!(xml, r#"<row r="{row_number}">"#);
    for (col, cell) in cells.enumerate() {
        let _ = write!(
            xml,
            r#"<c r="{}{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
            column_letters(col as u32),
            row_number,
            escape_xml(cell)
        );
    }
    xml.push_str("</row>");
}

/// 0 → A, 25 → Z, 26 → AA.
fn column_letters(mut index: u32) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(u8::try_from(b'A' as u32 + index % 26).unwrap_or(b'A') as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
        assert_eq!(column_letters(52), "BA");
    }

    #[test]
    fn test_sheet_escapes_markup_in_cells() {
        let sheet = render_sheet(
            &["name".to_string()],
            &[vec!["<b>&\"x\"</b>".to_string()]],
        );
        assert!(sheet.contains("&lt;b&gt;&amp;&quot;x&quot;&lt;/b&gt;"));
        assert!(!sheet.contains("<b>"));
    }

    #[test]
    fn test_db_evidence_naming_and_container_magic() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let exporter = EvidenceExporter::new(tmp.path());

        let plain = exporter
            .export_db_evidence(3, None, &["id".to_string()], &[vec!["1".to_string()]])
            .expect("export");
        assert!(plain.ends_with("databases/Step_3.xlsx"));

        let indexed = exporter
            .export_db_evidence(3, Some(2), &["id".to_string()], &[])
            .expect("export");
        assert!(indexed.ends_with("databases/Step_3_2.xlsx"));

        // OOXML containers are plain zip archives.
        let bytes = fs::read(&plain).expect("read workbook");
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_api_evidence_is_pretty_json() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let exporter = EvidenceExporter::new(tmp.path());
        let path = exporter
            .export_api_evidence(7, None, &json!({"status": 200, "items": [1, 2]}))
            .expect("export");
        assert!(path.ends_with("apis/Step_7.json"));

        let text = fs::read_to_string(&path).expect("read");
        let parsed: Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(parsed["status"], 200);
        assert!(text.contains('\n'), "body should be pretty-printed");
    }

    #[test]
    fn test_screenshot_path_creates_parent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let exporter = EvidenceExporter::new(tmp.path());
        let path = exporter.screenshot_path(1, Some(1)).expect("path");
        assert!(path.ends_with("images/Step_1_1.png"));
        assert!(path.parent().expect("parent").is_dir());
    }
}
