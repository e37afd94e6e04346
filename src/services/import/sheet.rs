// Lecture de la première feuille d'un classeur Excel (xlsx / xlsm / xls)
// en lignes de cellules texte. La ligne 1 (en-tête) et les lignes vides
// sont écartées; la colonne A est toujours l'indice 0.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Range, Reader, Xls, Xlsx};

use crate::error::AppError;

/// Signature OLE (xls)
const OLE_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];
/// Signature ZIP (xlsx, xlsm)
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookFormat {
    Xls,
    Xlsx,
}

impl WorkbookFormat {
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes.get(..4) {
            Some(magic) if magic == OLE_MAGIC => Some(Self::Xls),
            Some(magic) if magic == ZIP_MAGIC => Some(Self::Xlsx),
            _ => None,
        }
    }
}

/// Une ligne de données: numéro de ligne Excel (1-based) + cellules
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub number: usize,
    pub cells: Vec<String>,
}

/// Lit le fichier uploadé hors du runtime async
pub async fn read_rows(path: &Path) -> Result<Vec<SheetRow>, AppError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::Upload(format!("Failed to read uploaded file: {}", e)))?;

    tokio::task::spawn_blocking(move || rows_from_bytes(&bytes))
        .await
        .map_err(|e| AppError::internal(format!("Task join error: {}", e)))?
}

pub fn rows_from_bytes(bytes: &[u8]) -> Result<Vec<SheetRow>, AppError> {
    let format = WorkbookFormat::from_magic_bytes(bytes)
        .ok_or_else(|| AppError::Upload("Unrecognized Excel file format".to_string()))?;

    let range = match format {
        WorkbookFormat::Xls => {
            let mut workbook: Xls<_> = Xls::new(Cursor::new(bytes))
                .map_err(|e| AppError::Upload(format!("Failed to open XLS: {}", e)))?;
            first_sheet(&mut workbook)?
        }
        WorkbookFormat::Xlsx => {
            let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
                .map_err(|e| AppError::Upload(format!("Failed to open XLSX: {}", e)))?;
            first_sheet(&mut workbook)?
        }
    };

    Ok(data_rows(&range))
}

fn first_sheet<RS, R>(workbook: &mut R) -> Result<Range<Data>, AppError>
where
    RS: std::io::Read + std::io::Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    let name = workbook
        .sheet_names()
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Upload("Workbook has no worksheet".to_string()))?;

    workbook
        .worksheet_range(&name)
        .map_err(|e| AppError::Upload(format!("Failed to read sheet '{}': {}", name, e)))
}

/// Lignes de données d'une feuille. Les positions sont absolues: une feuille
/// qui commence en B3 garde B en indice 1
pub fn data_rows(range: &Range<Data>) -> Vec<SheetRow> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };

    range
        .rows()
        .enumerate()
        .filter_map(|(offset, row)| {
            let number = start_row as usize + offset + 1;
            if number == 1 {
                return None; // en-tête
            }

            let mut cells = vec![String::new(); start_col as usize];
            cells.extend(row.iter().map(cell_to_string));

            if cells.iter().all(|c| c.trim().is_empty()) {
                return None;
            }
            Some(SheetRow { number, cells })
        })
        .collect()
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            // Les codes numériques arrivent en float: 1042.0 => "1042"
            if f.fract() == 0.0 {
                format!("{:.0}", f)
            } else {
                format!("{}", f)
            }
        }
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(dt) => format!("{}", dt),
        Data::Error(e) => format!("#ERROR: {:?}", e),
    }
}
