use serde::{Deserialize, Deserializer, Serialize};

use crate::resolver::ResolutionTrace;

/// Rectangle in document space: origin at the bottom-left of the page, Y grows upward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        (self.x1 - self.x0).abs()
    }

    pub fn height(&self) -> f64 {
        (self.y1 - self.y0).abs()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamRecord {
    #[serde(rename = "Course")]
    pub course_code: String,
    #[serde(rename = "Section", deserialize_with = "string_or_number")]
    pub section: String,
    #[serde(rename = "Mid Date", default, skip_serializing_if = "Option::is_none")]
    pub mid_date: Option<String>,
    #[serde(rename = "Final Date", default, skip_serializing_if = "Option::is_none")]
    pub final_date: Option<String>,
    #[serde(rename = "Start Time", default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(rename = "End Time", default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(rename = "Room.", default, skip_serializing_if = "Option::is_none")]
    pub classroom: Option<String>,
    #[serde(
        rename = "Page Number",
        default,
        deserialize_with = "optional_page_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub page_number: Option<usize>,
    #[serde(rename = "BoundingBox", default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

impl ExamRecord {
    #[cfg(test)]
    pub fn new(course_code: &str, section: &str) -> Self {
        Self {
            course_code: course_code.to_string(),
            section: section.to_string(),
            mid_date: None,
            final_date: None,
            start_time: None,
            end_time: None,
            classroom: None,
            page_number: None,
            bounding_box: None,
        }
    }

    pub fn date(&self) -> Option<&str> {
        self.mid_date.as_deref().or(self.final_date.as_deref())
    }

    pub fn label(&self) -> String {
        format!("{}:{}", self.course_code.trim(), self.section.trim())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            Self::Text(value) => value,
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(StringOrNumber::into_string)
}

fn optional_page_number<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<StringOrNumber>::deserialize(deserializer)?;
    Ok(raw
        .map(StringOrNumber::into_string)
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|page| *page > 0))
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingEntry {
    pub course: String,
    pub section: String,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub classroom: Option<String>,
    pub page_number: i64,
    pub is_fallback: bool,
    pub confidence: Option<String>,
    pub course_evidence: Option<String>,
    pub section_evidence: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub pdf_path: String,
    pub pdf_sha256: String,
    pub page_count: usize,
    pub exam_count: usize,
    pub mappings: Vec<MappingEntry>,
    pub trace: ResolutionTrace,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedExam {
    pub course: String,
    pub section: String,
    pub page_number: usize,
    pub is_fallback: bool,
    pub highlighted: bool,
    pub width: u32,
    pub height: u32,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub pdf_path: String,
    pub scale: f32,
    pub rendered: Vec<RenderedExam>,
    pub skipped: Vec<String>,
    pub routine_image: Option<String>,
}
