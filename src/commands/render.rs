use std::path::Path;

use anyhow::{Context, Result, bail};
use image::RgbaImage;
use tracing::{info, warn};

use super::load_source;
use crate::cli::RenderArgs;
use crate::highlight::{render, stack_vertically};
use crate::model::{BoundingBox, ExamRecord, RenderManifest, RenderedExam};
use crate::resolver::{ExamPageMapping, resolve};
use crate::util::{ensure_directory, ensure_parent_directory, now_utc_string, write_json_pretty};

pub fn run(args: RenderArgs) -> Result<()> {
    if !(args.scale.is_finite() && args.scale > 0.0) {
        bail!("--scale must be a positive number, got {}", args.scale);
    }

    let source = load_source(&args.source)?;
    ensure_directory(&args.output_dir)?;

    let resolution = resolve(&source.document, &source.exams, source.options);

    let mut rendered = Vec::new();
    let mut images = Vec::new();
    let mut skipped = Vec::new();

    for mapping in &resolution.mappings {
        let label = mapping.exam.label();
        let Some(page_number) = mapping.resolution.page_number() else {
            warn!(exam = %label, "skipping render for exam without a page");
            skipped.push(label);
            continue;
        };

        let bbox = highlight_box(mapping);
        let image = render(&source.document, page_number, bbox, args.scale)
            .with_context(|| format!("failed to render {label}"))?;

        let path = args.output_dir.join(image_file_name(mapping.exam, page_number));
        save_png(&image, &path)?;
        info!(
            exam = %label,
            resolution = %mapping.resolution.describe(),
            path = %path.display(),
            highlighted = bbox.is_some(),
            "rendered exam page"
        );

        rendered.push(RenderedExam {
            course: mapping.exam.course_code.clone(),
            section: mapping.exam.section.clone(),
            page_number,
            is_fallback: mapping.resolution.is_fallback(),
            highlighted: bbox.is_some(),
            width: image.width(),
            height: image.height(),
            path: path.display().to_string(),
        });
        images.push(image);
    }

    let routine_image = match &args.routine_image {
        Some(path) => match stack_vertically(&images) {
            Some(stacked) => {
                save_png(&stacked, path)?;
                info!(path = %path.display(), exams = images.len(), "wrote routine image");
                Some(path.display().to_string())
            }
            None => {
                warn!("no exam pages rendered; routine image not written");
                None
            }
        },
        None => None,
    };

    let manifest = RenderManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        pdf_path: args.source.pdf.display().to_string(),
        scale: args.scale,
        rendered,
        skipped,
        routine_image,
    };
    let manifest_path = args.output_dir.join("render_manifest.json");
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        path = %manifest_path.display(),
        rendered = manifest.rendered.len(),
        skipped = manifest.skipped.len(),
        "render completed"
    );

    Ok(())
}

/// The record's box describes the page the data producer found. It is only
/// drawn when resolution landed on that same page and is not degenerate.
fn highlight_box<'a>(mapping: &ExamPageMapping<'a>) -> Option<&'a BoundingBox> {
    let exam = mapping.exam;
    let page_number = mapping.resolution.page_number()?;
    match exam.page_number {
        Some(hint) if hint != page_number => None,
        _ => exam
            .bounding_box
            .as_ref()
            .filter(|bbox| bbox.width() > 0.0 && bbox.height() > 0.0),
    }
}

fn image_file_name(exam: &ExamRecord, page_number: usize) -> String {
    let sanitize = |value: &str| {
        value
            .trim()
            .chars()
            .map(|character| {
                if character.is_ascii_alphanumeric() {
                    character.to_ascii_uppercase()
                } else {
                    '-'
                }
            })
            .collect::<String>()
    };

    format!(
        "{}_{}_p{}.png",
        sanitize(&exam.course_code),
        sanitize(&exam.section),
        page_number
    )
}

fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    ensure_parent_directory(path)?;
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::PageMatch;
    use crate::resolver::{MatchConfidence, PageResolution};

    fn mapping(exam: &ExamRecord, resolution: PageResolution) -> ExamPageMapping<'_> {
        ExamPageMapping {
            exam,
            resolution,
            evidence: PageMatch::default(),
        }
    }

    #[test]
    fn image_file_name_is_filesystem_safe() {
        let exam = ExamRecord::new("cse 110/l", "01");
        assert_eq!(image_file_name(&exam, 7), "CSE-110-L_01_p7.png");
    }

    #[test]
    fn highlight_box_requires_matching_page() {
        let mut exam = ExamRecord::new("CSC101", "01");
        exam.bounding_box = Some(BoundingBox {
            x0: 1.0,
            y0: 2.0,
            x1: 3.0,
            y1: 4.0,
        });
        exam.page_number = Some(2);

        let on_hint = PageResolution::Found {
            page_number: 2,
            confidence: MatchConfidence::Hint,
        };
        let elsewhere = PageResolution::Found {
            page_number: 5,
            confidence: MatchConfidence::Direct,
        };

        assert!(highlight_box(&mapping(&exam, on_hint)).is_some());
        assert!(highlight_box(&mapping(&exam, elsewhere)).is_none());
        assert!(highlight_box(&mapping(&exam, PageResolution::NotFound)).is_none());

        exam.bounding_box = Some(BoundingBox {
            x0: 3.0,
            y0: 2.0,
            x1: 3.0,
            y1: 4.0,
        });
        assert!(highlight_box(&mapping(&exam, on_hint)).is_none());
    }

    #[test]
    fn save_png_writes_a_decodable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("page.png");

        save_png(&RgbaImage::new(4, 3), &path).unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }
}
