//! CSV ingest of historical unit records and yearly cost increments.
//!
//! Unit CSV layout (header names are case-insensitive):
//!
//! - `codigo` (required), `unidad_funcional`, `anio_inicio`, `alcance`
//! - any of the physical attribute columns (blank = 0)
//! - every other column is a cost category (blank = 0, i.e. not incurred)
//!
//! Rows that fail to parse are skipped and reported, never silently patched.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::StringRecord;

use crate::data::{HistoricalSource, IncrementTable, UnitRecords};
use crate::domain::{ATTRIBUTE_COLUMNS, HistoricalSample, ProjectAttributes};
use crate::error::AppError;

const CODE_COLUMN: &str = "codigo";
const UNIT_COLUMN: &str = "unidad_funcional";
const YEAR_COLUMN: &str = "anio_inicio";
const SCOPE_COLUMN: &str = "alcance";

/// Descriptive columns that are neither attributes nor costs.
const IGNORED_COLUMNS: [&str; 3] = ["zona", "tipo_terreno", "nombre"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub code: Option<String>,
    pub message: String,
}

/// Historical records read from a CSV file.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HistoricalSource for CsvSource {
    fn load(&self) -> Result<UnitRecords, AppError> {
        let file = File::open(&self.path).map_err(|e| {
            AppError::new(2, format!("Failed to open CSV '{}': {e}", self.path.display()))
        })?;
        let (records, errors) = read_units(file)?;
        for err in errors.iter().take(10) {
            log::warn!(
                "line {} ({}): {}",
                err.line,
                err.code.as_deref().unwrap_or("?"),
                err.message
            );
        }
        if errors.len() > 10 {
            log::warn!("... {} more rows skipped", errors.len() - 10);
        }
        Ok(records)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Parse unit records from any reader. Returns the records and the skipped rows.
pub fn read_units(reader: impl Read) -> Result<(UnitRecords, Vec<RowError>), AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    if !header_map.contains_key(CODE_COLUMN) {
        return Err(AppError::new(2, format!("Missing required column: `{CODE_COLUMN}`")));
    }

    let mut cost_columns: Vec<(String, usize)> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .filter(|(name, _)| is_cost_column(name))
        .collect();
    cost_columns.sort_by_key(|(_, idx)| *idx);

    let mut samples = Vec::new();
    let mut errors = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                errors.push(RowError {
                    line,
                    code: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        match parse_unit(&record, &header_map, &cost_columns) {
            Ok(sample) => samples.push(sample),
            Err(message) => errors.push(RowError {
                line,
                code: get_optional(&record, &header_map, CODE_COLUMN).map(str::to_string),
                message,
            }),
        }
    }

    if samples.is_empty() {
        return Err(AppError::new(3, "No valid unit records in the CSV."));
    }

    Ok((
        UnitRecords {
            cost_columns: cost_columns.into_iter().map(|(name, _)| name).collect(),
            samples,
        },
        errors,
    ))
}

/// Load a yearly increment table (`anio`/`year` + `incremento`/`rate`).
pub fn load_increments(path: &Path) -> Result<IncrementTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open increments CSV '{}': {e}", path.display())))?;
    read_increments(file)
}

pub fn read_increments(reader: impl Read) -> Result<IncrementTable, AppError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read increments headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    let year_idx = ["anio", "year"]
        .iter()
        .find_map(|c| header_map.get(*c).copied())
        .ok_or_else(|| AppError::new(2, "Increments CSV needs an `anio` (or `year`) column."))?;
    let rate_idx = ["incremento", "increment", "rate"]
        .iter()
        .find_map(|c| header_map.get(*c).copied())
        .ok_or_else(|| AppError::new(2, "Increments CSV needs an `incremento` (or `rate`) column."))?;

    let mut rates = BTreeMap::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("Increments CSV line {line}: {e}")))?;
        let year = record
            .get(year_idx)
            .and_then(|s| s.parse::<i32>().ok())
            .ok_or_else(|| AppError::new(2, format!("Increments CSV line {line}: invalid year.")))?;
        let rate = parse_opt_f64(record.get(rate_idx))
            .ok_or_else(|| AppError::new(2, format!("Increments CSV line {line}: invalid rate.")))?;
        rates.insert(year, rate);
    }
    if rates.is_empty() {
        return Err(AppError::new(2, "Increments CSV has no rows."));
    }
    Ok(IncrementTable::new(rates))
}

fn is_cost_column(name: &str) -> bool {
    !name.is_empty()
        && ![CODE_COLUMN, UNIT_COLUMN, YEAR_COLUMN, SCOPE_COLUMN].contains(&name)
        && !IGNORED_COLUMNS.contains(&name)
        && !ATTRIBUTE_COLUMNS.contains(&name)
}

fn parse_unit(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    cost_columns: &[(String, usize)],
) -> Result<HistoricalSample, String> {
    let project_code = get_required(record, header_map, CODE_COLUMN)?.to_string();
    let unit = get_optional(record, header_map, UNIT_COLUMN).unwrap_or("1").to_string();
    let start_year = match get_optional(record, header_map, YEAR_COLUMN) {
        Some(s) => Some(
            s.parse::<f64>()
                .ok()
                .filter(|y| y.is_finite())
                .map(|y| y as i32)
                .ok_or_else(|| format!("Invalid `{YEAR_COLUMN}` value '{s}'."))?,
        ),
        None => None,
    };
    let scope = get_optional(record, header_map, SCOPE_COLUMN).unwrap_or("").to_string();

    let mut attributes = ProjectAttributes::default();
    for col in ATTRIBUTE_COLUMNS {
        attributes.set(col, parse_number(record, header_map, col)?);
    }

    let mut costs = BTreeMap::new();
    for (name, idx) in cost_columns {
        let value = match record.get(*idx).map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => parse_opt_f64(Some(s)).ok_or_else(|| format!("Invalid `{name}` value '{s}'."))?,
            None => 0.0,
        };
        costs.insert(name.clone(), value);
    }

    Ok(HistoricalSample {
        project_code,
        unit,
        start_year,
        scope,
        attributes,
        costs,
    })
}

/// Blank or absent numeric cell reads as zero.
fn parse_number(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<f64, String> {
    match get_optional(record, header_map, name) {
        Some(s) => parse_opt_f64(Some(s)).ok_or_else(|| format!("Invalid `{name}` value '{s}'.")),
        None => Ok(0.0),
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_lowercase().replace([' ', '-'], "_")
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?;
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
