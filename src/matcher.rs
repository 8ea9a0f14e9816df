use regex::Regex;
use serde::Serialize;

use crate::layout::PageLayout;
use crate::model::ExamRecord;
use crate::variants::{VariantSet, compact_upper, strip_leading_zeros, variants_for};

pub const STANDALONE_SECTION_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseEvidence {
    Substring,
    ExactToken,
    SplitPartsAdjacent,
}

impl CourseEvidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Substring => "substring",
            Self::ExactToken => "exact_token",
            Self::SplitPartsAdjacent => "split_parts_adjacent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionEvidence {
    Phrase,
    ExactToken,
    EmbeddedToken,
    StandaloneNumber,
}

impl SectionEvidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phrase => "phrase",
            Self::ExactToken => "exact_token",
            Self::EmbeddedToken => "embedded_token",
            Self::StandaloneNumber => "standalone_number",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageMatch {
    pub course: Option<CourseEvidence>,
    pub section: Option<SectionEvidence>,
}

impl PageMatch {
    pub fn course_matched(&self) -> bool {
        self.course.is_some()
    }

    pub fn section_matched(&self) -> bool {
        self.section.is_some()
    }

    pub fn is_full_match(&self) -> bool {
        self.course_matched() && self.section_matched()
    }
}

#[derive(Debug, Clone)]
pub struct ExamMatcher {
    course_code: String,
    course_upper: String,
    course_compact: String,
    course_dotted: String,
    course_parts: Vec<String>,
    variants: VariantSet,
    standalone_section: Option<Regex>,
}

impl ExamMatcher {
    pub fn new(exam: &ExamRecord) -> Self {
        Self::for_code(&exam.course_code, &exam.section)
    }

    pub fn for_code(course_code: &str, section: &str) -> Self {
        Self {
            course_code: course_code.to_string(),
            course_upper: course_code.to_uppercase(),
            course_compact: compact_upper(course_code),
            course_dotted: course_code
                .to_uppercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("."),
            course_parts: course_code
                .split_whitespace()
                .map(ToOwned::to_owned)
                .collect(),
            variants: variants_for(course_code, section),
            standalone_section: standalone_section_regex(section),
        }
    }

    pub fn matches(&self, layout: &PageLayout) -> PageMatch {
        let course = self.match_course_code(layout);
        let section = course.and_then(|_| self.match_section(layout));
        PageMatch { course, section }
    }

    pub fn match_course_code(&self, layout: &PageLayout) -> Option<CourseEvidence> {
        if layout.is_empty() {
            return None;
        }

        let substring_forms = [
            self.course_code.as_str(),
            self.course_upper.as_str(),
            self.course_compact.as_str(),
        ];
        if substring_forms
            .iter()
            .any(|form| !form.trim().is_empty() && layout.full_text.contains(form))
        {
            return Some(CourseEvidence::Substring);
        }

        let token_forms = [
            self.course_code.as_str(),
            self.course_upper.as_str(),
            self.course_compact.as_str(),
            self.course_dotted.as_str(),
        ];
        if layout.tokens.iter().any(|token| {
            token_forms
                .iter()
                .any(|form| !form.is_empty() && token == form)
        }) {
            return Some(CourseEvidence::ExactToken);
        }

        if let [first, second, ..] = self.course_parts.as_slice() {
            if layout
                .adjacent_pairs
                .iter()
                .any(|pair| pair.contains(first.as_str()) && pair.contains(second.as_str()))
            {
                return Some(CourseEvidence::SplitPartsAdjacent);
            }
        }

        None
    }

    pub fn match_section(&self, layout: &PageLayout) -> Option<SectionEvidence> {
        let variants = &self.variants;

        if variants
            .section_phrase_variants
            .iter()
            .any(|phrase| layout.full_text.contains(phrase.as_str()))
        {
            return Some(SectionEvidence::Phrase);
        }

        if layout.tokens.iter().any(|token| {
            variants
                .section_variants
                .iter()
                .any(|variant| token_is_section(token, variant))
        }) {
            return Some(SectionEvidence::ExactToken);
        }

        if layout.tokens.iter().any(|token| {
            variants
                .section_variants
                .iter()
                .any(|variant| token_embeds_section(token, variant))
        }) {
            return Some(SectionEvidence::EmbeddedToken);
        }

        if let Some(pattern) = &self.standalone_section {
            if pattern.is_match(&layout.full_text) {
                return Some(SectionEvidence::StandaloneNumber);
            }
        }

        None
    }
}

fn token_is_section(token: &str, variant: &str) -> bool {
    if token == variant {
        return true;
    }

    if let Some(inner) = token.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        return inner == variant;
    }
    if let Some(inner) = token.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
        return inner == variant;
    }

    token.strip_suffix('.') == Some(variant)
}

fn token_embeds_section(token: &str, variant: &str) -> bool {
    [
        format!("({variant})"),
        format!("[{variant}]"),
        format!("Sec {variant}"),
        format!("Sec.{variant}"),
        format!("Section {variant}"),
    ]
    .iter()
    .any(|needle| token.contains(needle.as_str()))
}

/// Whole-word pattern for small section numbers, so "1" matches "(1)" or
/// "Sec 1" but never the inside of "10" or "101".
fn standalone_section_regex(section: &str) -> Option<Regex> {
    let number = strip_leading_zeros(section.trim()).parse::<u32>().ok()?;
    if number >= STANDALONE_SECTION_LIMIT {
        return None;
    }

    Regex::new(&format!(r"\b{number}\b")).ok()
}
