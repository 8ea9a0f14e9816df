use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use super::write_json_stdout;
use crate::cli::{LayoutArgs, VariantsArgs};
use crate::document::{PageSource, PopplerDocument};
use crate::layout::{LayoutCache, PageLayout};
use crate::variants::variants_for;

#[derive(Debug, Serialize)]
struct LayoutReport<'a> {
    pdf_path: String,
    page_number: usize,
    page_count: usize,
    token_count: usize,
    extraction_failed: bool,
    layout: &'a PageLayout,
}

pub fn run_variants(args: VariantsArgs) -> Result<()> {
    let variants = variants_for(&args.course, &args.section);
    info!(
        course = %args.course,
        section = %args.section,
        course_variants = variants.course_code_variants.len(),
        section_variants = variants.section_variants.len(),
        phrases = variants.section_phrase_variants.len(),
        "generated variants"
    );
    write_json_stdout(&variants)
}

pub fn run_layout(args: LayoutArgs) -> Result<()> {
    let document = PopplerDocument::open(&args.pdf)
        .with_context(|| format!("failed to open {}", args.pdf.display()))?;
    let page_count = document.page_count();
    if args.page == 0 || args.page > page_count {
        bail!(
            "page {} is outside {} ({} pages)",
            args.page,
            args.pdf.display(),
            page_count
        );
    }

    let cache = LayoutCache::new(&document);
    let layout = cache.get_layout(args.page);

    write_json_stdout(&LayoutReport {
        pdf_path: document.path().display().to_string(),
        page_number: args.page,
        page_count,
        token_count: layout.tokens.len(),
        extraction_failed: !cache.failed_pages().is_empty(),
        layout: layout.as_ref(),
    })
}
