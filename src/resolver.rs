use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::document::PageSource;
use crate::layout::LayoutCache;
use crate::matcher::{ExamMatcher, PageMatch};
use crate::model::{ExamRecord, MappingEntry};
use crate::util::now_utc_string;

pub const NOT_FOUND_PAGE: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    Hint,
    Direct,
    Fallback,
}

impl MatchConfidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hint => "hint",
            Self::Direct => "direct",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageResolution {
    Found {
        page_number: usize,
        confidence: MatchConfidence,
    },
    NotFound,
}

impl PageResolution {
    pub fn page_number(&self) -> Option<usize> {
        match self {
            Self::Found { page_number, .. } => Some(*page_number),
            Self::NotFound => None,
        }
    }

    pub fn confidence(&self) -> Option<MatchConfidence> {
        match self {
            Self::Found { confidence, .. } => Some(*confidence),
            Self::NotFound => None,
        }
    }

    pub fn page_number_or_sentinel(&self) -> i64 {
        self.page_number()
            .and_then(|page| i64::try_from(page).ok())
            .unwrap_or(NOT_FOUND_PAGE)
    }

    pub fn is_fallback(&self) -> bool {
        self.confidence() == Some(MatchConfidence::Fallback)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Found {
                page_number,
                confidence,
            } => format!("page {} ({})", page_number, confidence.as_str()),
            Self::NotFound => "not found".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExamPageMapping<'e> {
    pub exam: &'e ExamRecord,
    pub resolution: PageResolution,
    pub evidence: PageMatch,
}

impl ExamPageMapping<'_> {
    pub fn to_entry(&self) -> MappingEntry {
        MappingEntry {
            course: self.exam.course_code.clone(),
            section: self.exam.section.clone(),
            date: self.exam.date().map(ToOwned::to_owned),
            start_time: self.exam.start_time.clone(),
            end_time: self.exam.end_time.clone(),
            classroom: self.exam.classroom.clone(),
            page_number: self.resolution.page_number_or_sentinel(),
            is_fallback: self.resolution.is_fallback(),
            confidence: self
                .resolution
                .confidence()
                .map(|confidence| confidence.as_str().to_string()),
            course_evidence: self
                .evidence
                .course
                .map(|evidence| evidence.as_str().to_string()),
            section_evidence: self
                .evidence
                .section
                .map(|evidence| evidence.as_str().to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub use_page_hints: bool,
    pub parallel: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            use_page_hints: true,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    pub exam: String,
    pub status: String,
    pub page_number: i64,
    pub confidence: Option<MatchConfidence>,
    pub pages_scanned: usize,
    pub fallback_candidates: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionTrace {
    pub generated_at: String,
    pub page_count: usize,
    pub exam_count: usize,
    pub found_count: usize,
    pub not_found_count: usize,
    pub direct_count: usize,
    pub fallback_count: usize,
    pub hint_count: usize,
    pub pages_extracted: usize,
    pub extraction_failures: Vec<usize>,
    pub entries: Vec<TraceEntry>,
}

pub struct Resolution<'e> {
    pub mappings: Vec<ExamPageMapping<'e>>,
    pub trace: ResolutionTrace,
}

pub struct ResolutionSession<'d, D: PageSource + ?Sized> {
    cache: LayoutCache<'d, D>,
}

impl<'d, D: PageSource + ?Sized> ResolutionSession<'d, D> {
    pub fn new(document: &'d D) -> Self {
        Self {
            cache: LayoutCache::new(document),
        }
    }

    #[cfg(test)]
    pub fn cache(&self) -> &LayoutCache<'d, D> {
        &self.cache
    }

    pub fn resolve<'e>(&self, exams: &'e [ExamRecord], options: ResolveOptions) -> Resolution<'e> {
        let outcomes = if options.parallel {
            exams
                .par_iter()
                .map(|exam| self.resolve_exam(exam, options))
                .collect::<Vec<_>>()
        } else {
            exams
                .iter()
                .map(|exam| self.resolve_exam(exam, options))
                .collect::<Vec<_>>()
        };

        let (mappings, entries): (Vec<_>, Vec<_>) = outcomes.into_iter().unzip();
        let trace = self.summarize(&mappings, entries);

        info!(
            exams = trace.exam_count,
            found = trace.found_count,
            fallback = trace.fallback_count,
            not_found = trace.not_found_count,
            pages_extracted = trace.pages_extracted,
            "resolution completed"
        );

        Resolution { mappings, trace }
    }

    pub fn resolve_exam<'e>(
        &self,
        exam: &'e ExamRecord,
        options: ResolveOptions,
    ) -> (ExamPageMapping<'e>, TraceEntry) {
        let label = exam.label();
        let matcher = ExamMatcher::new(exam);
        let page_count = self.cache.page_count();

        let mut entry = TraceEntry {
            exam: label.clone(),
            status: "not_found".to_string(),
            page_number: NOT_FOUND_PAGE,
            confidence: None,
            pages_scanned: 0,
            fallback_candidates: Vec::new(),
        };
        let mut mapping = ExamPageMapping {
            exam,
            resolution: PageResolution::NotFound,
            evidence: PageMatch::default(),
        };

        if options.use_page_hints {
            match exam.page_number {
                Some(hint) if (1..=page_count).contains(&hint) => {
                    info!(exam = %label, page = hint, "using page hint from exam record");
                    mapping.resolution = PageResolution::Found {
                        page_number: hint,
                        confidence: MatchConfidence::Hint,
                    };
                    return finish(mapping, entry);
                }
                Some(hint) => {
                    warn!(exam = %label, page = hint, page_count, "ignoring out-of-range page hint");
                }
                None => {}
            }
        }

        for page_number in 1..=page_count {
            let layout = self.cache.get_layout(page_number);
            entry.pages_scanned += 1;

            let result = matcher.matches(&layout);
            debug!(
                exam = %label,
                page = page_number,
                course = result.course_matched(),
                section = result.section_matched(),
                "checked page"
            );

            if result.is_full_match() {
                info!(exam = %label, page = page_number, "matched course and section");
                mapping.resolution = PageResolution::Found {
                    page_number,
                    confidence: MatchConfidence::Direct,
                };
                mapping.evidence = result;
                return finish(mapping, entry);
            }
        }

        // Fallback only revisits pages the cache already holds.
        let mut first_course_evidence = None;
        for page_number in self.cache.cached_pages() {
            let Some(layout) = self.cache.cached(page_number) else {
                continue;
            };
            if let Some(evidence) = matcher.match_course_code(&layout) {
                first_course_evidence.get_or_insert(evidence);
                entry.fallback_candidates.push(page_number);
            }
        }

        if let Some(&page_number) = entry.fallback_candidates.first() {
            warn!(
                exam = %label,
                page = page_number,
                candidates = entry.fallback_candidates.len(),
                "section not found; using course-only fallback match"
            );
            mapping.resolution = PageResolution::Found {
                page_number,
                confidence: MatchConfidence::Fallback,
            };
            mapping.evidence = PageMatch {
                course: first_course_evidence,
                section: None,
            };
        } else {
            warn!(exam = %label, pages = page_count, "no page mentions this exam");
        }

        finish(mapping, entry)
    }

    fn summarize(&self, mappings: &[ExamPageMapping<'_>], entries: Vec<TraceEntry>) -> ResolutionTrace {
        let count = |confidence: MatchConfidence| {
            mappings
                .iter()
                .filter(|mapping| mapping.resolution.confidence() == Some(confidence))
                .count()
        };
        let not_found_count = mappings
            .iter()
            .filter(|mapping| mapping.resolution == PageResolution::NotFound)
            .count();

        ResolutionTrace {
            generated_at: now_utc_string(),
            page_count: self.cache.page_count(),
            exam_count: mappings.len(),
            found_count: mappings.len() - not_found_count,
            not_found_count,
            direct_count: count(MatchConfidence::Direct),
            fallback_count: count(MatchConfidence::Fallback),
            hint_count: count(MatchConfidence::Hint),
            pages_extracted: self.cache.extraction_count(),
            extraction_failures: self.cache.failed_pages(),
            entries,
        }
    }
}

fn finish<'e>(
    mapping: ExamPageMapping<'e>,
    mut entry: TraceEntry,
) -> (ExamPageMapping<'e>, TraceEntry) {
    entry.page_number = mapping.resolution.page_number_or_sentinel();
    entry.confidence = mapping.resolution.confidence();
    if mapping.resolution != PageResolution::NotFound {
        entry.status = "found".to_string();
    }
    (mapping, entry)
}

pub fn resolve<'e, D: PageSource + ?Sized>(
    document: &D,
    exams: &'e [ExamRecord],
    options: ResolveOptions,
) -> Resolution<'e> {
    ResolutionSession::new(document).resolve(exams, options)
}
