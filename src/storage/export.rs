// Chunked XLSX export of the original rows enriched with match results
use crate::model::{MatchStatus, OutputError, RowResult};
use crate::storage::sheet::{Sheet, column_name};
use quick_xml::escape::escape;
use std::fs::{self, File};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::SimpleFileOptions;

pub const ID_COLUMN: &str = "код каспи";
pub const PRICE_COLUMN: &str = "цена каспи";
pub const STATUS_COLUMN: &str = "статус поиска";
const NOT_FOUND_ID: &str = "не найден";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;

const SHEET_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#;
const SHEET_TAIL: &str = "</sheetData></worksheet>";

enum Cell {
    Text(String),
    Number(f64),
}

/// Writes `sheet` with three result columns appended, `chunk_size` rows per
/// workbook named `<base_name>_part<N>.xlsx`. Returns the written paths in order.
pub fn write_output_chunks(
    sheet: &Sheet,
    results: &[RowResult],
    out_dir: &Path,
    base_name: &str,
    chunk_size: usize,
) -> Result<Vec<PathBuf>, OutputError> {
    if sheet.rows.is_empty() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(out_dir)?;

    let mut headers: Vec<Cell> = sheet.headers.iter().cloned().map(Cell::Text).collect();
    headers.extend([ID_COLUMN, PRICE_COLUMN, STATUS_COLUMN].map(|h| Cell::Text(h.to_string())));

    let size = chunk_size.max(1);
    let mut paths = Vec::new();
    for (i, (rows, chunk_results)) in sheet
        .rows
        .chunks(size)
        .zip(results.chunks(size))
        .enumerate()
    {
        let records = rows.iter().zip(chunk_results).map(|(row, result)| {
            let mut record: Vec<Cell> = row.iter().cloned().map(Cell::Text).collect();
            record.extend(result_cells(result));
            record
        });
        let xml = sheet_xml(&headers, records);

        let path = out_dir.join(format!("{}_part{}.xlsx", base_name, i + 1));
        write_workbook(File::create(&path)?, &xml)?;
        info!("Wrote {} rows to {}", rows.len(), path.display());
        paths.push(path);
    }
    Ok(paths)
}

/// The id column says "не найден" whenever the row was not matched, even if a
/// zero-score candidate was kept.
fn result_cells(result: &RowResult) -> [Cell; 3] {
    let matched = result.status != MatchStatus::NotFound;
    let id = match &result.best_id {
        Some(id) if matched => id.clone(),
        _ => NOT_FOUND_ID.to_string(),
    };
    let price = match result.best_price {
        Some(price) if matched => Cell::Number(price),
        _ => Cell::Text(String::new()),
    };
    [Cell::Text(id), price, Cell::Text(result.status_label())]
}

fn sheet_xml(headers: &[Cell], records: impl Iterator<Item = Vec<Cell>>) -> String {
    let mut xml = String::from(SHEET_HEAD);
    push_row(&mut xml, 1, headers);
    for (i, record) in records.enumerate() {
        push_row(&mut xml, i + 2, &record);
    }
    xml.push_str(SHEET_TAIL);
    xml
}

fn push_row(xml: &mut String, row: usize, cells: &[Cell]) {
    xml.push_str(&format!(r#"<row r="{}">"#, row));
    for (column, cell) in cells.iter().enumerate() {
        let reference = format!("{}{}", column_name(column), row);
        match cell {
            // Empty cells are left out
            Cell::Text(text) if text.is_empty() => {}
            Cell::Text(text) => xml.push_str(&format!(
                r#"<c r="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                reference,
                escape(text.as_str())
            )),
            Cell::Number(n) => xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, n)),
        }
    }
    xml.push_str("</row>");
}

fn write_workbook<W: Write + Seek>(writer: W, sheet_xml: &str) -> Result<(), OutputError> {
    let mut zip = zip::ZipWriter::new(writer);
    let options = SimpleFileOptions::default();
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/worksheets/sheet1.xml", sheet_xml),
    ] {
        zip.start_file(name, options)?;
        zip.write_all(content.as_bytes())?;
    }
    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sheet::read_sheet;

    fn sheet(n: usize) -> Sheet {
        let rows = (0..n).map(|i| vec![format!("товар {}", i)]).collect();
        Sheet::new(vec!["Номенклатура поставщика".into()], rows)
    }

    fn found(i: usize) -> RowResult {
        RowResult {
            query: format!("товар {}", i),
            best_id: Some(format!("{}", 100 + i)),
            best_title: Some("title".into()),
            best_price: Some(150000.0),
            score: Some(88.0),
            url: Some("https://kaspi.kz/shop/p/100/".into()),
            status: MatchStatus::Found,
        }
    }

    fn row_strings(row: &[&str]) -> Vec<String> {
        row.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_rows_into_workbooks() {
        let dir = tempfile::tempdir().unwrap();
        let results: Vec<RowResult> = (0..5).map(found).collect();
        let paths = write_output_chunks(&sheet(5), &results, dir.path(), "doc", 2).unwrap();

        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["doc_part1.xlsx", "doc_part2.xlsx", "doc_part3.xlsx"]);

        let last = read_sheet(&paths[2], None).unwrap();
        assert_eq!(
            last.headers,
            row_strings(&["Номенклатура поставщика", "код каспи", "цена каспи", "статус поиска"])
        );
        assert_eq!(
            last.rows,
            vec![row_strings(&["товар 4", "104", "150000", "найден (score: 88.00)"])]
        );
    }

    #[test]
    fn unmatched_rows_are_marked_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let zero_score = RowResult {
            best_id: Some("9".into()),
            best_price: Some(100.0),
            score: Some(0.0),
            status: MatchStatus::NotFound,
            ..found(1)
        };
        let results = vec![RowResult::not_found("товар 0"), zero_score];
        let paths = write_output_chunks(&sheet(2), &results, dir.path(), "doc", 5000).unwrap();

        let out = read_sheet(&paths[0], None).unwrap();
        assert_eq!(out.rows[0], row_strings(&["товар 0", "не найден", "", "не найден"]));
        assert_eq!(out.rows[1], row_strings(&["товар 1", "не найден", "", "не найден"]));
    }

    #[test]
    fn markup_in_cells_is_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = Sheet::new(
            vec!["Номенклатура поставщика".into()],
            vec![vec!["Кабель <HDMI> & \"2м\"".into()]],
        );
        let paths =
            write_output_chunks(&sheet, &[RowResult::not_found("q")], dir.path(), "doc", 10).unwrap();
        let out = read_sheet(&paths[0], None).unwrap();
        assert_eq!(out.rows[0][0], "Кабель <HDMI> & \"2м\"");
    }

    #[test]
    fn empty_sheet_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_output_chunks(&sheet(0), &[], dir.path(), "doc", 10).unwrap();
        assert!(paths.is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
