use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

use super::{load_source, write_json_stdout};
use crate::cli::ResolveArgs;
use crate::document::PageSource;
use crate::model::{MappingEntry, MappingManifest};
use crate::resolver::resolve;
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: ResolveArgs) -> Result<()> {
    let source = load_source(&args.source)?;

    let resolution = resolve(&source.document, &source.exams, source.options);

    let manifest = MappingManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        pdf_path: args.source.pdf.display().to_string(),
        pdf_sha256: sha256_file(&args.source.pdf)?,
        page_count: source.document.page_count(),
        exam_count: resolution.mappings.len(),
        mappings: resolution
            .mappings
            .iter()
            .map(|mapping| mapping.to_entry())
            .collect(),
        trace: resolution.trace,
    };

    if let Some(path) = &args.output {
        write_json_pretty(path, &manifest)?;
        info!(path = %path.display(), "wrote exam page mapping");
    }

    if args.json {
        write_json_stdout(&manifest)
    } else {
        write_text_report(&manifest)
    }
}

fn write_text_report(manifest: &MappingManifest) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Document: {} ({} pages)", manifest.pdf_path, manifest.page_count)?;
    writeln!(
        output,
        "Exams: {}\tfound: {}\tfallback: {}\tnot found: {}",
        manifest.exam_count,
        manifest.trace.found_count,
        manifest.trace.fallback_count,
        manifest.trace.not_found_count
    )?;

    for (index, entry) in manifest.mappings.iter().enumerate() {
        writeln!(
            output,
            "{}.\t{}:{}\t{}\t{}\t{}\t{}",
            index + 1,
            entry.course,
            entry.section,
            entry.date.as_deref().unwrap_or("-"),
            format_time_range(entry),
            entry.classroom.as_deref().unwrap_or("-"),
            format_location(entry)
        )?;
    }

    output.flush()?;
    Ok(())
}

fn format_time_range(entry: &MappingEntry) -> String {
    match (entry.start_time.as_deref(), entry.end_time.as_deref()) {
        (Some(start), Some(end)) => format!("{start}-{end}"),
        (Some(start), None) => start.to_string(),
        (None, Some(end)) => format!("-{end}"),
        (None, None) => "-".to_string(),
    }
}

fn format_location(entry: &MappingEntry) -> String {
    match entry.confidence.as_deref() {
        Some(confidence) if entry.page_number > 0 => {
            format!("page {} ({})", entry.page_number, confidence)
        }
        _ => "not found".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(page_number: i64, confidence: Option<&str>) -> MappingEntry {
        MappingEntry {
            course: "CSC101".to_string(),
            section: "01".to_string(),
            date: None,
            start_time: Some("09:00 AM".to_string()),
            end_time: None,
            classroom: None,
            page_number,
            is_fallback: confidence == Some("fallback"),
            confidence: confidence.map(ToOwned::to_owned),
            course_evidence: None,
            section_evidence: None,
        }
    }

    #[test]
    fn format_location_labels_direct_fallback_and_missing() {
        assert_eq!(format_location(&entry(3, Some("direct"))), "page 3 (direct)");
        assert_eq!(format_location(&entry(5, Some("fallback"))), "page 5 (fallback)");
        assert_eq!(format_location(&entry(-1, None)), "not found");
    }

    #[test]
    fn format_time_range_handles_partial_times() {
        assert_eq!(format_time_range(&entry(1, None)), "09:00 AM");
    }
}
