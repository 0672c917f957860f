use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;

pub const COL_NAME: &str = "Name";
pub const COL_MATH: &str = "Math";
pub const COL_SCIENCE: &str = "Science";
pub const COL_ENGLISH: &str = "English";
pub const COL_ATTENDANCE: &str = "Attendance (%)";
pub const COL_STRENGTHS: &str = "Strengths";
pub const COL_WEAKNESSES: &str = "Weaknesses";
pub const COL_COMMENTS: &str = "Comments";
pub const COL_SUGGESTIONS: &str = "Suggestions";
pub const COL_PARENT_FEEDBACK: &str = "Parent Feedback";

/// Columns the prompt template reads. Parent Feedback is optional and is
/// appended on first save when absent.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    COL_NAME,
    COL_MATH,
    COL_SCIENCE,
    COL_ENGLISH,
    COL_ATTENDANCE,
    COL_STRENGTHS,
    COL_WEAKNESSES,
    COL_COMMENTS,
    COL_SUGGESTIONS,
];

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing column '{column}'")]
    MissingColumn { column: &'static str },
    #[error("row {row}: column '{column}' is not a number: {value:?}")]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },
    #[error("no student named {0:?}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub name: String,
    /// Scores are `None` where the cell is blank.
    pub math: Option<f64>,
    pub science: Option<f64>,
    pub english: Option<f64>,
    pub attendance: Option<f64>,
    pub strengths: String,
    pub weaknesses: String,
    pub comments: String,
    pub suggestions: String,
    pub parent_feedback: Option<String>,
    /// Cells of columns outside the known schema, keyed by column position
    /// so repeated header names keep their own values.
    #[serde(skip)]
    pub extra: BTreeMap<usize, String>,
}

impl StudentRecord {
    fn cell(&self, column: usize, header: &str, known: &HashMap<&str, usize>) -> String {
        if known.get(header) != Some(&column) {
            return self.extra.get(&column).cloned().unwrap_or_default();
        }
        match header {
            COL_NAME => self.name.clone(),
            COL_MATH => format_score(self.math),
            COL_SCIENCE => format_score(self.science),
            COL_ENGLISH => format_score(self.english),
            COL_ATTENDANCE => format_score(self.attendance),
            COL_STRENGTHS => self.strengths.clone(),
            COL_WEAKNESSES => self.weaknesses.clone(),
            COL_COMMENTS => self.comments.clone(),
            COL_SUGGESTIONS => self.suggestions.clone(),
            COL_PARENT_FEEDBACK => self.parent_feedback.clone().unwrap_or_default(),
            _ => self.extra.get(&column).cloned().unwrap_or_default(),
        }
    }
}

/// The whole table: header order as found in the file, then rows in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub records: Vec<StudentRecord>,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn has_feedback_column(&self) -> bool {
        self.headers.iter().any(|h| h == COL_PARENT_FEEDBACK)
    }

    /// Distinct names in first-appearance order.
    pub fn names(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.name.as_str()))
            .map(|r| r.name.clone())
            .collect()
    }

    /// First row whose name matches exactly.
    pub fn select(&self, name: &str) -> Option<&StudentRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Sets Parent Feedback on every row with this name, not only the one
    /// `select` returns. Returns how many rows changed.
    pub fn apply_feedback(&mut self, name: &str, feedback: &str) -> usize {
        let mut updated = 0;
        for rec in self.records.iter_mut().filter(|r| r.name == name) {
            rec.parent_feedback = if feedback.is_empty() {
                None
            } else {
                Some(feedback.to_string())
            };
            updated += 1;
        }
        if updated > 0 && !self.has_feedback_column() {
            self.headers.push(COL_PARENT_FEEDBACK.to_string());
        }
        updated
    }
}

/// Integral values print without a fractional part, the way they were typed.
pub fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Blank cells stay blank.
pub fn format_score(v: Option<f64>) -> String {
    v.map(format_number).unwrap_or_default()
}

fn is_known_column(header: &str) -> bool {
    header == COL_PARENT_FEEDBACK || REQUIRED_COLUMNS.iter().any(|c| *c == header)
}

/// Position of the first occurrence of each known column. Later columns
/// with the same header are carried as extras.
fn known_positions(headers: &[String]) -> HashMap<&str, usize> {
    let mut known = HashMap::new();
    for (i, h) in headers.iter().enumerate() {
        if is_known_column(h) {
            known.entry(h.as_str()).or_insert(i);
        }
    }
    known
}

pub fn parse_csv<R: Read>(reader: R) -> Result<Dataset, DatasetError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches('\u{feff}').to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let known = known_positions(&headers);
    for col in REQUIRED_COLUMNS {
        if !known.contains_key(col) {
            return Err(DatasetError::MissingColumn { column: col });
        }
    }

    let mut records = Vec::new();
    for (row_idx, row) in rdr.records().enumerate() {
        let row = row?;
        let row_no = row_idx + 1;
        let text = |col: &str| -> String {
            known
                .get(col)
                .and_then(|i| row.get(*i))
                .unwrap_or("")
                .to_string()
        };
        let number = |col: &'static str| -> Result<Option<f64>, DatasetError> {
            let raw = text(col);
            if raw.trim().is_empty() {
                return Ok(None);
            }
            raw.trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| DatasetError::InvalidNumber {
                    row: row_no,
                    column: col,
                    value: raw.clone(),
                })
        };

        let extra: BTreeMap<usize, String> = headers
            .iter()
            .enumerate()
            .filter(|(i, h)| known.get(h.as_str()) != Some(i))
            .map(|(i, _)| (i, row.get(i).unwrap_or("").to_string()))
            .collect();

        let feedback = text(COL_PARENT_FEEDBACK);
        records.push(StudentRecord {
            name: text(COL_NAME),
            math: number(COL_MATH)?,
            science: number(COL_SCIENCE)?,
            english: number(COL_ENGLISH)?,
            attendance: number(COL_ATTENDANCE)?,
            strengths: text(COL_STRENGTHS),
            weaknesses: text(COL_WEAKNESSES),
            comments: text(COL_COMMENTS),
            suggestions: text(COL_SUGGESTIONS),
            parent_feedback: if feedback.is_empty() {
                None
            } else {
                Some(feedback)
            },
            extra,
        });
    }

    Ok(Dataset { headers, records })
}

pub fn render_csv(dataset: &Dataset) -> Result<Vec<u8>, DatasetError> {
    let mut headers = dataset.headers.clone();
    if !dataset.has_feedback_column() {
        headers.push(COL_PARENT_FEEDBACK.to_string());
    }
    let known = known_positions(&headers);

    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(&headers)?;
    for rec in &dataset.records {
        wtr.write_record(
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| rec.cell(i, h, &known)),
        )?;
    }
    wtr.into_inner().map_err(|e| DatasetError::Io {
        path: "<buffer>".to_string(),
        source: e.into_error(),
    })
}
