//! Student records and the loaders that turn an uploaded file into a `Dataset`.
//!
//! Every format funnels into the same row shape: CSV rows go through `csv`'s
//! serde support, Excel and JSON rows are lifted into `serde_json` objects
//! first, and the binary snapshot is a `bincode` image of the dataset itself.
//! Validation is deliberately thin: a `Name` column, non-blank names and
//! finite numbers. Out-of-range values are kept and only reported.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DashboardError, Result};
use crate::schema;

/// One row of the uploaded table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    #[serde(rename = "StudentID")]
    pub student_id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "AttendanceRate")]
    pub attendance_rate: Option<f64>,
    #[serde(rename = "StudyHours")]
    pub study_hours: Option<f64>,
    #[serde(rename = "PreviousGrade")]
    pub previous_grade: Option<f64>,
    pub subject: String,
    pub exam_type: String,
    pub marks: Option<f64>,
}

impl StudentRecord {
    pub fn exam(&self) -> Option<ExamType> {
        ExamType::parse(&self.exam_type)
    }
}

/// Assessment stages in the order they happen during a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ExamType {
    #[serde(rename = "Unit Test")]
    UnitTest,
    Midterm,
    Final,
}

impl ExamType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unit test" => Some(Self::UnitTest),
            "midterm" => Some(Self::Midterm),
            "final" => Some(Self::Final),
            _ => None,
        }
    }
}

/// Upload formats understood by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Xlsx,
    Json,
    /// `bincode` snapshot written by [`Dataset::to_binary`].
    #[serde(rename = "bin", alias = "pkl")]
    #[value(name = "bin", alias = "pkl")]
    Binary,
}

impl FileFormat {
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            "json" => Ok(Self::Json),
            "bin" | "pkl" => Ok(Self::Binary),
            other => Err(DashboardError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
        Self::from_extension(extension)
    }
}

/// An uploaded table: the column set it arrived with and its rows, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    records: Vec<StudentRecord>,
}

impl Dataset {
    /// Validates the rows against the minimal schema and builds the dataset.
    pub fn new(columns: Vec<String>, records: Vec<StudentRecord>) -> Result<Self> {
        if !columns.iter().any(|c| c == schema::NAME) {
            return Err(DashboardError::Schema(schema::NAME.to_string()));
        }

        for (row, record) in records.iter().enumerate() {
            if record.name.trim().is_empty() {
                return Err(DashboardError::MissingValue { column: schema::NAME.to_string(), row });
            }
            for column in schema::NumericColumn::ALL {
                if column.value(record).is_some_and(|v| !v.is_finite()) {
                    return Err(DashboardError::NonFiniteValue { column: column.name().to_string(), row });
                }
            }
        }

        let dataset = Self { columns, records };
        let out_of_range = dataset.count_out_of_range();
        if out_of_range > 0 {
            warn!("{} values fall outside their expected range; statistics may be skewed", out_of_range);
        }
        Ok(dataset)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Distinct student names in first-seen order.
    pub fn student_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .map(|r| r.name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// The first row belonging to `name`.
    pub fn find_student(&self, name: &str) -> Result<&StudentRecord> {
        self.records
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| DashboardError::unknown_student(name))
    }

    /// Distinct subjects `name` has rows for, in first-seen order.
    pub fn subjects_for(&self, name: &str) -> Result<Vec<&str>> {
        self.find_student(name)?;
        let mut seen = HashSet::new();
        Ok(self
            .records
            .iter()
            .filter(|r| r.name == name)
            .map(|r| r.subject.as_str())
            .filter(|subject| seen.insert(*subject))
            .collect())
    }

    pub fn to_binary(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn count_out_of_range(&self) -> usize {
        use schema::NumericColumn;

        self.records
            .iter()
            .flat_map(|r| NumericColumn::ALL.into_iter().filter_map(move |c| c.value(r).map(|v| (c, v))))
            .filter(|&(column, value)| match column {
                NumericColumn::StudyHours => value < 0.0,
                _ => !(0.0..=100.0).contains(&value),
            })
            .count()
    }
}

/// Reads the file at `path`, picking the format from its extension.
pub fn load_path(path: &Path) -> Result<Dataset> {
    let format = FileFormat::from_path(path)?;
    let bytes = std::fs::read(path)?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    load_bytes(&bytes, format)
}

/// Parses an uploaded file body.
pub fn load_bytes(bytes: &[u8], format: FileFormat) -> Result<Dataset> {
    let dataset = match format {
        FileFormat::Csv => read_csv(bytes)?,
        FileFormat::Xlsx => read_xlsx(bytes)?,
        FileFormat::Json => read_json(bytes)?,
        FileFormat::Binary => {
            let snapshot: Dataset = bincode::deserialize(bytes)?;
            Dataset::new(snapshot.columns, snapshot.records)?
        }
    };
    info!(
        "Loaded {} student records with {} columns from {:?} input",
        dataset.len(),
        dataset.columns().len(),
        format
    );
    Ok(dataset)
}

pub fn write_binary(dataset: &Dataset, path: &Path) -> Result<()> {
    std::fs::write(path, dataset.to_binary()?)?;
    Ok(())
}

fn read_csv(bytes: &[u8]) -> Result<Dataset> {
    let mut rdr = csv::Reader::from_reader(bytes);
    let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if !columns.iter().any(|c| c == schema::NAME) {
        return Err(DashboardError::Schema(schema::NAME.to_string()));
    }
    rdr.set_headers(csv::StringRecord::from(columns.clone()));

    let mut records = Vec::new();
    for result in rdr.deserialize::<RawRecord>() {
        records.push(result?.into());
    }
    Dataset::new(columns, records)
}

fn read_xlsx(bytes: &[u8]) -> Result<Dataset> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Err(DashboardError::Schema(schema::NAME.to_string())),
    };

    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|cell| cell.to_string().trim().to_string()).collect(),
        None => Vec::new(),
    };

    let mut objects = Vec::new();
    for row in rows {
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        let object: Map<String, Value> = columns
            .iter()
            .zip(row)
            .filter(|(_, cell)| !matches!(cell, Data::Empty))
            .map(|(column, cell)| (column.clone(), cell_to_value(cell)))
            .collect();
        objects.push(object);
    }
    records_from_objects(columns, objects)
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::DateTime(_) => Value::String(cell.to_string()),
        Data::Error(_) | Data::Empty => Value::Null,
    }
}

/// Accepts both a list of row objects and pandas' default
/// `{"column": {"row index": value}}` layout.
fn read_json(bytes: &[u8]) -> Result<Dataset> {
    let objects: Vec<Map<String, Value>> = match serde_json::from_slice::<Value>(bytes)? {
        Value::Array(rows) => rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| match row {
                Value::Object(object) => Ok(object),
                _ => Err(DashboardError::MalformedTable(format!("row {} is not an object", i))),
            })
            .collect::<Result<_>>()?,
        Value::Object(columns) => pivot_columns(columns)?,
        _ => return Err(DashboardError::MalformedTable("expected an array or an object".to_string())),
    };

    let mut columns: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    records_from_objects(columns, objects)
}

fn pivot_columns(columns: Map<String, Value>) -> Result<Vec<Map<String, Value>>> {
    let mut index: Vec<String> = Vec::new();
    for cells in columns.values() {
        let cells = cells
            .as_object()
            .ok_or_else(|| DashboardError::MalformedTable("column values must be objects".to_string()))?;
        for key in cells.keys() {
            if !index.contains(key) {
                index.push(key.clone());
            }
        }
    }
    // Row labels are usually "0", "1", ... and must not sort as text.
    index.sort_by_key(|key| (key.parse::<usize>().unwrap_or(usize::MAX), key.clone()));

    Ok(index
        .iter()
        .map(|row| {
            columns
                .iter()
                .filter_map(|(column, cells)| cells.get(row).map(|cell| (column.clone(), cell.clone())))
                .collect()
        })
        .collect())
}

fn records_from_objects(columns: Vec<String>, objects: Vec<Map<String, Value>>) -> Result<Dataset> {
    if !columns.iter().any(|c| c == schema::NAME) {
        return Err(DashboardError::Schema(schema::NAME.to_string()));
    }
    let records = objects
        .into_iter()
        .map(|object| serde_json::from_value::<RawRecord>(Value::Object(object)).map(StudentRecord::from))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Dataset::new(columns, records)
}

/// Row shape as it appears in a file, before defaults are applied.
#[derive(Deserialize)]
struct RawRecord {
    #[serde(rename = "StudentID", default, deserialize_with = "cell::text")]
    student_id: Option<String>,
    #[serde(rename = "Name", default, deserialize_with = "cell::text")]
    name: Option<String>,
    #[serde(rename = "Gender", default, deserialize_with = "cell::text")]
    gender: Option<String>,
    #[serde(rename = "AttendanceRate", default, deserialize_with = "cell::number")]
    attendance_rate: Option<f64>,
    #[serde(rename = "StudyHours", default, deserialize_with = "cell::number")]
    study_hours: Option<f64>,
    #[serde(rename = "PreviousGrade", default, deserialize_with = "cell::number")]
    previous_grade: Option<f64>,
    #[serde(default, deserialize_with = "cell::text")]
    subject: Option<String>,
    #[serde(default, deserialize_with = "cell::text")]
    exam_type: Option<String>,
    #[serde(default, deserialize_with = "cell::number")]
    marks: Option<f64>,
}

impl From<RawRecord> for StudentRecord {
    fn from(raw: RawRecord) -> Self {
        Self {
            student_id: raw.student_id.unwrap_or_default(),
            name: raw.name.unwrap_or_default(),
            gender: raw.gender.unwrap_or_default(),
            attendance_rate: raw.attendance_rate,
            study_hours: raw.study_hours,
            previous_grade: raw.previous_grade,
            subject: raw.subject.unwrap_or_default(),
            exam_type: raw.exam_type.unwrap_or_default(),
            marks: raw.marks,
        }
    }
}

/// Lenient cell readers: spreadsheets store IDs as numbers and grades as text.
mod cell {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    const MISSING_MARKERS: [&str; 6] = ["", "nan", "na", "n/a", "null", "none"];

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextCell {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberCell {
        Number(f64),
        Text(String),
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(Option::<TextCell>::deserialize(d)?.map(|cell| match cell {
            TextCell::Text(s) => s.trim().to_string(),
            TextCell::Int(i) => i.to_string(),
            TextCell::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
            TextCell::Float(f) => f.to_string(),
            TextCell::Bool(b) => b.to_string(),
        }))
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        match Option::<NumberCell>::deserialize(d)? {
            None => Ok(None),
            Some(NumberCell::Number(v)) if v.is_nan() => Ok(None),
            Some(NumberCell::Number(v)) => Ok(Some(v)),
            Some(NumberCell::Text(s)) => {
                let trimmed = s.trim();
                if MISSING_MARKERS.contains(&trimmed.to_ascii_lowercase().as_str()) {
                    return Ok(None);
                }
                trimmed
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| D::Error::custom(format!("'{}' is not a number", trimmed)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
StudentID,Name,Gender,AttendanceRate,StudyHours,PreviousGrade,subject,exam_type,marks
S001,Tanvi Shah,Female,85.5,4.5,67,Mathematics,Unit Test,78
S002,Arjun Rao,Male,55,2,,Science,Midterm,
";

    #[test]
    fn csv_rows_map_by_header_name() {
        let dataset = load_bytes(SAMPLE_CSV.as_bytes(), FileFormat::Csv).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.columns().len(), 9);
        let first = &dataset.records()[0];
        assert_eq!(first.student_id, "S001");
        assert_eq!(first.attendance_rate, Some(85.5));
        assert_eq!(first.marks, Some(78.0));
        assert_eq!(first.exam(), Some(ExamType::UnitTest));
        let second = &dataset.records()[1];
        assert_eq!(second.previous_grade, None);
        assert_eq!(second.marks, None);
    }

    #[test]
    fn csv_without_name_column_is_a_schema_error() {
        let err = load_bytes(b"StudentID,PreviousGrade\nS001,50\n", FileFormat::Csv).unwrap_err();
        assert!(matches!(err, DashboardError::Schema(col) if col == "Name"));
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = load_bytes(b"Name,PreviousGrade\nAda,50\n ,60\n", FileFormat::Csv).unwrap_err();
        assert!(matches!(err, DashboardError::MissingValue { row: 1, .. }));
    }

    #[test]
    fn infinite_numbers_are_rejected() {
        let err = load_bytes(b"Name,PreviousGrade\nAda,inf\n", FileFormat::Csv).unwrap_err();
        assert!(matches!(err, DashboardError::NonFiniteValue { row: 0, .. }));
    }

    #[test]
    fn nan_markers_read_as_missing() {
        let dataset = load_bytes(b"Name,PreviousGrade\nAda,NaN\n", FileFormat::Csv).unwrap();
        assert_eq!(dataset.records()[0].previous_grade, None);
    }

    #[test]
    fn out_of_range_values_are_kept() {
        let dataset = load_bytes(b"Name,AttendanceRate\nAda,150\n", FileFormat::Csv).unwrap();
        assert_eq!(dataset.records()[0].attendance_rate, Some(150.0));
        assert_eq!(dataset.count_out_of_range(), 1);
    }

    #[test]
    fn json_records_accept_numeric_ids() {
        let json = r#"[{"StudentID": 7, "Name": "Ada", "PreviousGrade": "71.5", "subject": "Math"}]"#;
        let dataset = load_bytes(json.as_bytes(), FileFormat::Json).unwrap();
        let record = &dataset.records()[0];
        assert_eq!(record.student_id, "7");
        assert_eq!(record.previous_grade, Some(71.5));
        assert!(dataset.has_column("subject"));
        assert!(!dataset.has_column("marks"));
    }

    #[test]
    fn json_columns_layout_keeps_numeric_row_order() {
        let mut names = Map::new();
        let mut grades = Map::new();
        for i in 0..12 {
            names.insert(i.to_string(), Value::from(format!("S{}", i)));
            grades.insert(i.to_string(), Value::from(i as f64));
        }
        let table = serde_json::json!({ "Name": names, "PreviousGrade": grades });
        let dataset = load_bytes(table.to_string().as_bytes(), FileFormat::Json).unwrap();
        let order: Vec<&str> = dataset.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(order[2], "S2");
        assert_eq!(order[10], "S10");
    }

    #[test]
    fn json_scalar_is_malformed() {
        let err = load_bytes(b"42", FileFormat::Json).unwrap_err();
        assert!(matches!(err, DashboardError::MalformedTable(_)));
    }

    #[test]
    fn binary_snapshot_restores_the_dataset() {
        let dataset = load_bytes(SAMPLE_CSV.as_bytes(), FileFormat::Csv).unwrap();
        let restored = load_bytes(&dataset.to_binary().unwrap(), FileFormat::Binary).unwrap();
        assert_eq!(restored, dataset);
    }

    #[test]
    fn formats_resolve_from_extensions() {
        assert_eq!(FileFormat::from_path(Path::new("grades.CSV")).unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("grades.pkl")).unwrap(), FileFormat::Binary);
        assert!(matches!(
            FileFormat::from_path(Path::new("grades.txt")),
            Err(DashboardError::UnsupportedFormat(ext)) if ext == "txt"
        ));
    }

    #[test]
    fn student_lookups() {
        let csv = "Name,subject\nAda,Math\nBo,Math\nAda,Science\nAda,Math\n";
        let dataset = load_bytes(csv.as_bytes(), FileFormat::Csv).unwrap();
        assert_eq!(dataset.student_names(), vec!["Ada", "Bo"]);
        assert_eq!(dataset.subjects_for("Ada").unwrap(), vec!["Math", "Science"]);
        assert!(matches!(dataset.find_student("Cy"), Err(DashboardError::UnknownSelection { .. })));
    }

    #[test]
    fn xlsx_first_sheet_is_read_by_header() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        let headers = ["StudentID", " Name ", "Gender", "AttendanceRate", "PreviousGrade", "marks"];
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
        sheet.write_number(1, 0, 1001.0).unwrap();
        sheet.write_string(1, 1, "Tanvi Shah").unwrap();
        sheet.write_string(1, 2, "Female").unwrap();
        sheet.write_number(1, 3, 85.5).unwrap();
        sheet.write_number(1, 4, 67.0).unwrap();
        sheet.write_number(1, 5, 78.0).unwrap();
        // Row 2 stays empty; row 3 leaves Gender blank and marks PreviousGrade as missing.
        sheet.write_string(3, 0, "S002").unwrap();
        sheet.write_string(3, 1, "Arjun Rao").unwrap();
        sheet.write_number(3, 3, 55.0).unwrap();
        sheet.write_string(3, 4, "n/a").unwrap();
        sheet.write_number(3, 5, 52.0).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let dataset = load_bytes(&bytes, FileFormat::Xlsx).unwrap();
        assert_eq!(dataset.columns(), ["StudentID", "Name", "Gender", "AttendanceRate", "PreviousGrade", "marks"]);
        assert_eq!(dataset.len(), 2);

        let first = &dataset.records()[0];
        assert_eq!(first.student_id, "1001");
        assert_eq!(first.name, "Tanvi Shah");
        assert_eq!(first.attendance_rate, Some(85.5));
        assert_eq!(first.marks, Some(78.0));

        let second = &dataset.records()[1];
        assert_eq!(second.student_id, "S002");
        assert_eq!(second.gender, "");
        assert_eq!(second.previous_grade, None);
        assert_eq!(second.marks, Some(52.0));
        assert_eq!(second.study_hours, None);
    }
}
