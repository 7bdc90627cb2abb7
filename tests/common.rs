// Shared fixture helpers: xlsx workbooks are zip containers, so the tests
// assemble minimal ones in memory instead of checking in binaries
#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Cell content for fixture workbooks
pub enum Cell {
    Text(&'static str),
    Number(f64),
    Empty,
}

pub const FIXTURE_SHEET: &str = "FZ 10.1";
pub const FIXTURE_COLUMNS: [&str; 4] = ["Marke", "Modellreihe", "Anzahl", "Darunter Diesel"];
pub const FIXTURE_DATA_ROWS: usize = 4;

/// Standard FZ 10.1 fixture: title row, blank row, German header row, four
/// data rows with one aggregate row in between, then a footnote block
pub fn fz10_fixture() -> Vec<u8> {
    build_workbook(
        FIXTURE_SHEET,
        &[
            vec![Cell::Text(
                "FZ 10.1 Neuzulassungen von Personenkraftwagen nach Marken und Modellreihen",
            )],
            vec![],
            vec![
                Cell::Text("Marke"),
                Cell::Text("Modellreihe"),
                Cell::Text("Anzahl"),
                Cell::Text("Darunter Diesel"),
            ],
            vec![
                Cell::Text("VW"),
                Cell::Text("GOLF"),
                Cell::Number(5234.0),
                Cell::Number(1201.0),
            ],
            vec![
                Cell::Text("VW"),
                Cell::Text("TIGUAN"),
                Cell::Number(4120.0),
                Cell::Number(980.0),
            ],
            vec![
                Cell::Text("ZUSAMMEN"),
                Cell::Empty,
                Cell::Number(9354.0),
                Cell::Number(2181.0),
            ],
            vec![
                Cell::Text("BMW"),
                Cell::Text("X1"),
                Cell::Number(2210.0),
                Cell::Number(640.0),
            ],
            vec![
                Cell::Text("MERCEDES"),
                Cell::Text("GLC"),
                Cell::Number(1890.0),
                Cell::Number(410.0),
            ],
            vec![],
            vec![Cell::Text("1) Vorläufige Zahlen")],
        ],
    )
}

/// Assemble a minimal xlsx workbook holding a single sheet of inline-string
/// and numeric cells
pub fn build_workbook(sheet_name: &str, rows: &[Vec<Cell>]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(CONTENT_TYPES.as_bytes()).unwrap();

    zip.start_file("_rels/.rels", options).unwrap();
    zip.write_all(ROOT_RELS.as_bytes()).unwrap();

    zip.start_file("xl/workbook.xml", options).unwrap();
    zip.write_all(workbook_xml(sheet_name).as_bytes()).unwrap();

    zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
    zip.write_all(WORKBOOK_RELS.as_bytes()).unwrap();

    zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
    zip.write_all(sheet_xml(rows).as_bytes()).unwrap();

    zip.finish().unwrap().into_inner()
}

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

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;

fn workbook_xml(sheet_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#,
        escape_xml(sheet_name)
    )
}

fn sheet_xml(rows: &[Vec<Cell>]) -> String {
    let mut body = String::new();
    for (row_idx, row) in rows.iter().enumerate() {
        let row_ref = row_idx + 1;
        body.push_str(&format!("<row r=\"{row_ref}\">"));
        for (col_idx, cell) in row.iter().enumerate() {
            let cell_ref = format!("{}{row_ref}", column_letter(col_idx));
            match cell {
                Cell::Text(text) => body.push_str(&format!(
                    "<c r=\"{cell_ref}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                    escape_xml(text)
                )),
                Cell::Number(value) => {
                    body.push_str(&format!("<c r=\"{cell_ref}\"><v>{value}</v></c>"))
                }
                Cell::Empty => {}
            }
        }
        body.push_str("</row>");
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>{body}</sheetData>
</worksheet>"#
    )
}

fn column_letter(mut index: usize) -> String {
    let mut letters = String::new();
    loop {
        letters.insert(0, (b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
