pub mod inspect;
pub mod render;
pub mod resolve;

use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::SourceArgs;
use crate::document::{PageSource, PopplerDocument};
use crate::model::ExamRecord;
use crate::resolver::ResolveOptions;
use crate::util::read_json;
use crate::variants::{compact_upper, strip_leading_zeros};

#[derive(Debug, Clone, PartialEq, Eq)]
struct RoutinePick {
    raw: String,
    course: String,
    section: String,
}

impl RoutinePick {
    fn parse(raw: &str) -> Result<Self> {
        let Some((course, section)) = raw.rsplit_once(':') else {
            bail!("routine pick must look like COURSE:SECTION, got '{raw}'");
        };

        let course = compact_upper(course);
        let section = strip_leading_zeros(section.trim()).to_string();
        if course.is_empty() || section.is_empty() {
            bail!("routine pick has an empty course or section: '{raw}'");
        }

        Ok(Self {
            raw: raw.to_string(),
            course,
            section,
        })
    }

    fn selects(&self, exam: &ExamRecord) -> bool {
        compact_upper(&exam.course_code) == self.course
            && strip_leading_zeros(exam.section.trim()) == self.section
    }
}

struct LoadedSource {
    document: PopplerDocument,
    exams: Vec<ExamRecord>,
    options: ResolveOptions,
}

fn load_source(args: &SourceArgs) -> Result<LoadedSource> {
    let exams: Vec<ExamRecord> = read_json(&args.exams)?;
    info!(path = %args.exams.display(), exams = exams.len(), "loaded exam records");

    let picks = args
        .picks
        .iter()
        .map(|raw| RoutinePick::parse(raw))
        .collect::<Result<Vec<RoutinePick>>>()?;
    let exams = select_exams(exams, &picks);
    if exams.is_empty() {
        bail!("no exam records selected from {}", args.exams.display());
    }

    let document = PopplerDocument::open(&args.pdf)
        .with_context(|| format!("failed to open {}", args.pdf.display()))?;
    info!(
        path = %args.pdf.display(),
        pages = document.page_count(),
        selected = exams.len(),
        "ready to resolve"
    );

    Ok(LoadedSource {
        document,
        exams,
        options: ResolveOptions {
            use_page_hints: !args.ignore_page_hints,
            parallel: args.parallel,
        },
    })
}

fn select_exams(exams: Vec<ExamRecord>, picks: &[RoutinePick]) -> Vec<ExamRecord> {
    if picks.is_empty() {
        return exams;
    }

    for pick in picks {
        if !exams.iter().any(|exam| pick.selects(exam)) {
            warn!(pick = %pick.raw, "routine pick matches no exam record");
        }
    }

    exams
        .into_iter()
        .filter(|exam| picks.iter().any(|pick| pick.selects(exam)))
        .collect()
}

fn write_json_stdout<T: Serialize>(value: &T) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, value).context("failed to serialize json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routine_pick_normalizes_course_and_section() {
        let pick = RoutinePick::parse("cse 220:003").unwrap();
        assert_eq!(pick.course, "CSE220");
        assert_eq!(pick.section, "3");

        assert!(pick.selects(&ExamRecord::new("CSE220", "3")));
        assert!(pick.selects(&ExamRecord::new("Cse 220", "03")));
        assert!(!pick.selects(&ExamRecord::new("CSE220", "30")));
    }

    #[test]
    fn routine_pick_rejects_malformed_input() {
        assert!(RoutinePick::parse("CSE220").is_err());
        assert!(RoutinePick::parse("CSE220:").is_err());
        assert!(RoutinePick::parse(" :01").is_err());
    }

    #[test]
    fn select_exams_keeps_input_order() {
        let exams = vec![
            ExamRecord::new("MAT120", "1"),
            ExamRecord::new("CSC101", "2"),
            ExamRecord::new("PHY111", "1"),
            ExamRecord::new("CSC101", "1"),
        ];
        let picks = vec![
            RoutinePick::parse("PHY111:01").unwrap(),
            RoutinePick::parse("CSC101:1").unwrap(),
        ];

        let selected = select_exams(exams, &picks)
            .into_iter()
            .map(|exam| exam.label())
            .collect::<Vec<_>>();
        assert_eq!(selected, vec!["PHY111:1", "CSC101:1"]);
    }

    #[test]
    fn select_exams_without_picks_keeps_all() {
        let exams = vec![ExamRecord::new("MAT120", "1"), ExamRecord::new("CSC101", "2")];
        assert_eq!(select_exams(exams, &[]).len(), 2);
    }
}
