// Reading the supplier spreadsheet (CSV or XLSX) into memory
use crate::model::InputError;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{info, warn};

/// Maximum decompressed bytes read from a single XLSX entry.
const MAX_XML_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

/// A header row plus data rows, every row padded to the header width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Result<usize, InputError> {
        self.headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| InputError::MissingColumn {
                column: name.to_string(),
                available: self.headers.clone(),
            })
    }

    pub fn column_values(&self, index: usize) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.get(index).cloned().unwrap_or_default())
            .collect()
    }

    /// Drops the first `start` data rows and keeps at most `max` of the rest.
    pub fn slice(mut self, start: usize, max: Option<usize>) -> Self {
        let start = start.min(self.rows.len());
        self.rows.drain(..start);
        if let Some(max) = max {
            self.rows.truncate(max);
        }
        self
    }
}

/// Reads `.csv` or `.xlsx`; `sheet` selects an XLSX worksheet by name.
pub fn read_sheet(path: &Path, sheet: Option<&str>) -> Result<Sheet, InputError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let result = match extension.as_str() {
        "csv" => {
            if let Some(name) = sheet {
                warn!("Sheet '{}' ignored for CSV input", name);
            }
            read_csv(path)
        }
        "xlsx" => read_xlsx(File::open(path)?, sheet),
        other => Err(InputError::UnsupportedFormat(other.to_string())),
    }?;

    info!("Read {} rows from {}", result.rows.len(), path.display());
    Ok(result)
}

fn read_csv(path: &Path) -> Result<Sheet, InputError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(Sheet::new(headers, rows))
}

pub fn read_xlsx<R: Read + Seek>(reader: R, sheet: Option<&str>) -> Result<Sheet, InputError> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let shared_strings = if archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        read_shared_strings(&read_entry(&mut archive, "xl/sharedStrings.xml")?)?
    } else {
        Vec::new()
    };

    let sheets = list_sheets(&mut archive)?;
    let target = match sheet {
        Some(name) => sheets
            .iter()
            .find(|(sheet_name, _)| sheet_name == name)
            .map(|(_, path)| path.clone())
            .ok_or_else(|| InputError::MissingSheet(name.to_string()))?,
        None => sheets
            .first()
            .map(|(_, path)| path.clone())
            .ok_or_else(|| InputError::Xlsx("workbook has no sheets".to_string()))?,
    };

    let xml = read_entry(&mut archive, &target)?;
    let mut grid = read_sheet_cells(&xml, &shared_strings)?.into_values();
    let headers = grid.next().unwrap_or_default();
    Ok(Sheet::new(headers, grid.collect()))
}

fn read_entry<R: Read + Seek>(archive: &mut zip::ZipArchive<R>, name: &str) -> Result<Vec<u8>, InputError> {
    let entry = archive.by_name(name)?;
    let mut buf = Vec::new();
    entry.take(MAX_XML_ENTRY_BYTES).read_to_end(&mut buf)?;
    Ok(buf)
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Worksheet names in workbook order with their archive paths.
fn list_sheets<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> Result<Vec<(String, String)>, InputError> {
    let rels_xml = read_entry(archive, "xl/_rels/workbook.xml.rels")?;
    let mut targets = HashMap::new();
    let mut reader = Reader::from_reader(rels_xml.as_slice());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    let path = match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("xl/{}", target),
                    };
                    targets.insert(id, path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let workbook_xml = read_entry(archive, "xl/workbook.xml")?;
    let mut sheets = Vec::new();
    let mut reader = Reader::from_reader(workbook_xml.as_slice());
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr(&e, b"name").unwrap_or_default();
                let rel_id = attr(&e, b"r:id").unwrap_or_default();
                if let Some(path) = targets.get(&rel_id) {
                    sheets.push((name, path.clone()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(sheets)
}

fn read_shared_strings(xml: &[u8]) -> Result<Vec<String>, InputError> {
    let mut strings = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Text(t) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"t" => in_text = false,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Zero-based column index from a cell reference such as `"AB12"`.
fn column_from_ref(reference: &str) -> Option<usize> {
    let letters: Vec<char> = reference.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if letters.is_empty() {
        return None;
    }
    let index = letters
        .iter()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
    Some(index - 1)
}

/// Spreadsheet column letters for a zero-based index: 0 is `A`, 26 is `AA`.
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        letters.push((b'A' + ((n - 1) % 26) as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

#[derive(Default)]
struct CellState {
    column: usize,
    kind: Option<String>,
    value: String,
}

/// Cell texts keyed by row order; gaps inside a row are empty strings.
fn read_sheet_cells(xml: &[u8], shared_strings: &[String]) -> Result<BTreeMap<usize, Vec<String>>, InputError> {
    let mut rows: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut row_index = 0usize;
    let mut next_column = 0usize;
    let mut cell: Option<CellState> = None;
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row_index = attr(&e, b"r")
                        .and_then(|r| r.parse::<usize>().ok())
                        .unwrap_or(row_index + 1);
                    next_column = 0;
                }
                b"c" => {
                    let column = attr(&e, b"r")
                        .and_then(|r| column_from_ref(&r))
                        .unwrap_or(next_column);
                    next_column = column + 1;
                    cell = Some(CellState {
                        column,
                        kind: attr(&e, b"t"),
                        value: String::new(),
                    });
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let column = attr(&e, b"r")
                    .and_then(|r| column_from_ref(&r))
                    .unwrap_or(next_column);
                next_column = column + 1;
            }
            Event::Text(t) if in_value => {
                if let Some(state) = cell.as_mut() {
                    state.value.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(state) = cell.take() {
                        let text = match state.kind.as_deref() {
                            Some("s") => state
                                .value
                                .trim()
                                .parse::<usize>()
                                .ok()
                                .and_then(|i| shared_strings.get(i).cloned())
                                .unwrap_or_default(),
                            _ => state.value,
                        };
                        let row = rows.entry(row_index).or_default();
                        if row.len() <= state.column {
                            row.resize(state.column + 1, String::new());
                        }
                        row[state.column] = text;
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
          xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Прайс" sheetId="1" r:id="rId1"/>
    <sheet name="Остатки" sheetId="2" r:id="rId2"/>
  </sheets>
</workbook>"#;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="worksheet" Target="/xl/worksheets/sheet2.xml"/>
</Relationships>"#;

    const SHARED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <si><t>Номенклатура поставщика</t></si>
  <si><t>Цена</t></si>
  <si><r><t>HP Laptop 15 </t></r><r><t>8GB</t></r></si>
</sst>"#;

    const SHEET1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
    <row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>150000</v></c></row>
    <row r="3"><c r="A3" t="inlineStr"><is><t>Lenovo IdeaPad &amp; Co</t></is></c><c r="B3" s="1"/></row>
  </sheetData>
</worksheet>"#;

    const SHEET2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1"><c r="B1" t="inlineStr"><is><t>Остаток</t></is></c></row>
    <row r="2"><c r="B2"><v>7</v></c></row>
  </sheetData>
</worksheet>"#;

    fn workbook_bytes() -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, content) in [
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/sharedStrings.xml", SHARED),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ] {
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn reads_first_sheet_by_default() {
        let sheet = read_xlsx(Cursor::new(workbook_bytes()), None).unwrap();
        assert_eq!(sheet.headers, vec!["Номенклатура поставщика", "Цена"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0], vec!["HP Laptop 15 8GB", "150000"]);
        assert_eq!(sheet.rows[1], vec!["Lenovo IdeaPad & Co", ""]);
    }

    #[test]
    fn selects_sheet_by_name() {
        let sheet = read_xlsx(Cursor::new(workbook_bytes()), Some("Остатки")).unwrap();
        assert_eq!(sheet.headers, vec!["", "Остаток"]);
        assert_eq!(sheet.rows, vec![vec!["".to_string(), "7".to_string()]]);
    }

    #[test]
    fn unknown_sheet_is_an_error() {
        let err = read_xlsx(Cursor::new(workbook_bytes()), Some("Нет такого")).unwrap_err();
        assert!(matches!(err, InputError::MissingSheet(name) if name == "Нет такого"));
    }

    #[test]
    fn reads_csv_with_bom_and_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.csv");
        std::fs::write(
            &path,
            "\u{feff}Номенклатура поставщика,Код\nHP Laptop 15,1\nLenovo IdeaPad\n",
        )
        .unwrap();

        let sheet = read_sheet(&path, None).unwrap();
        let col = sheet.column_index("Номенклатура поставщика").unwrap();
        assert_eq!(col, 0);
        assert_eq!(sheet.column_values(col), vec!["HP Laptop 15", "Lenovo IdeaPad"]);
        assert_eq!(sheet.rows[1], vec!["Lenovo IdeaPad", ""]);
    }

    #[test]
    fn missing_column_lists_available_ones() {
        let sheet = Sheet::new(vec!["A".into(), "B".into()], vec![]);
        match sheet.column_index("C") {
            Err(InputError::MissingColumn { column, available }) => {
                assert_eq!(column, "C");
                assert_eq!(available, vec!["A", "B"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn slicing_skips_and_limits_rows() {
        let rows = (0..5).map(|i| vec![i.to_string()]).collect();
        let sheet = Sheet::new(vec!["n".into()], rows);
        let sliced = sheet.clone().slice(1, Some(2));
        assert_eq!(sliced.column_values(0), vec!["1", "2"]);
        assert!(sheet.slice(10, None).rows.is_empty());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = read_sheet(Path::new("input.ods"), None).unwrap_err();
        assert!(matches!(err, InputError::UnsupportedFormat(ext) if ext == "ods"));
    }

    #[test]
    fn column_refs_map_to_indices() {
        assert_eq!(column_from_ref("A1"), Some(0));
        assert_eq!(column_from_ref("Z9"), Some(25));
        assert_eq!(column_from_ref("AB12"), Some(27));
        assert_eq!(column_from_ref("12"), None);
    }

    #[test]
    fn column_names_invert_cell_references() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_from_ref(&format!("{}7", column_name(701))), Some(701));
    }
}
