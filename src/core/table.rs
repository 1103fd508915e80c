use crate::domain::model::{Coordinate, Table};
use crate::utils::error::Result;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Column names used for the GIS export (X first, then Y).
pub const GIS_X_COLUMN: &str = "longitude";
pub const GIS_Y_COLUMN: &str = "latitude";

/// Picks the delimiter from the file extension: tab for `.tsv`/`.tab`, comma otherwise.
pub fn delimiter_for_path(path: &str) -> u8 {
    let extension = std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("tsv") | Some("tab") => b'\t',
        _ => b',',
    }
}

/// Parses delimited text with a header row. A leading UTF-8 BOM is ignored.
pub fn read_table(data: &[u8], delimiter: u8) -> Result<Table> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(headers.len().max(row.len()), String::new());
        rows.push(row);
    }

    Ok(Table { headers, rows })
}

/// Serializes the table. `with_bom` prefixes a UTF-8 BOM so spreadsheet
/// applications detect the encoding.
pub fn write_table(table: &Table, delimiter: u8, with_bom: bool) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if with_bom {
        buffer.extend_from_slice(UTF8_BOM);
    }
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_writer(&mut buffer);
        writer.write_record(&table.headers)?;
        for row in &table.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }
    Ok(buffer)
}

/// Reorders for GIS import: longitude (X) and latitude (Y) first, WGS84.
pub fn to_gis_table(table: &Table, lat_column: usize, lon_column: usize) -> Table {
    let mut headers = vec![GIS_X_COLUMN.to_string(), GIS_Y_COLUMN.to_string()];
    let rest: Vec<usize> = (0..table.headers.len())
        .filter(|i| *i != lat_column && *i != lon_column)
        .collect();
    headers.extend(rest.iter().map(|i| table.headers[*i].clone()));

    let rows = (0..table.len())
        .map(|r| {
            let mut row = vec![
                table.cell(r, lon_column).to_string(),
                table.cell(r, lat_column).to_string(),
            ];
            row.extend(rest.iter().map(|i| table.cell(r, *i).to_string()));
            row
        })
        .collect();

    Table { headers, rows }
}

/// Writes a pair (or clears both cells) so a row never holds half a coordinate.
pub fn set_coordinate(
    table: &mut Table,
    row: usize,
    lat_column: usize,
    lon_column: usize,
    coordinate: Option<Coordinate>,
) {
    let (lat, lon) = match coordinate {
        Some(c) => (c.latitude.to_string(), c.longitude.to_string()),
        None => (String::new(), String::new()),
    };
    table.set_cell(row, lat_column, lat);
    table.set_cell(row, lon_column, lon);
}
