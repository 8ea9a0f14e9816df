use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use image::RgbaImage;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::model::BoundingBox;

pub const POINTS_PER_INCH: f32 = 72.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextToken {
    pub text: String,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone)]
pub struct PageRaster {
    pub image: RgbaImage,
    pub page_width: f64,
    pub page_height: f64,
}

impl PageRaster {
    pub fn scale_x(&self) -> f64 {
        if self.page_width <= 0.0 {
            return 1.0;
        }
        f64::from(self.image.width()) / self.page_width
    }

    pub fn scale_y(&self) -> f64 {
        if self.page_height <= 0.0 {
            return 1.0;
        }
        f64::from(self.image.height()) / self.page_height
    }
}

/// Page numbers are 1-based.
pub trait PageSource: Sync {
    fn page_count(&self) -> usize;

    fn page_tokens(&self, page_number: usize) -> Result<Vec<TextToken>>;

    fn rasterize_page(&self, page_number: usize, scale: f32) -> Result<PageRaster>;
}

#[derive(Debug, Clone)]
pub struct PopplerDocument {
    path: PathBuf,
    page_sizes: Vec<(f64, f64)>,
}

impl PopplerDocument {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("pdf not found: {}", path.display());
        }

        let summary = run_tool("pdfinfo", &[path.as_os_str().to_owned()])
            .with_context(|| format!("failed to inspect {}", path.display()))?;
        let page_count = parse_page_count(&summary)
            .with_context(|| format!("pdfinfo reported no page count for {}", path.display()))?;

        let mut page_sizes = Vec::new();
        if page_count > 0 {
            let detail = run_tool(
                "pdfinfo",
                &[
                    "-f".into(),
                    "1".into(),
                    "-l".into(),
                    page_count.to_string().into(),
                    path.as_os_str().to_owned(),
                ],
            )
            .with_context(|| format!("failed to read page sizes for {}", path.display()))?;
            page_sizes = parse_page_sizes(&detail, page_count)?;
        }

        debug!(path = %path.display(), pages = page_count, "opened pdf");

        Ok(Self {
            path: path.to_path_buf(),
            page_sizes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn page_size(&self, page_number: usize) -> Result<(f64, f64)> {
        page_number
            .checked_sub(1)
            .and_then(|index| self.page_sizes.get(index))
            .copied()
            .with_context(|| {
                format!(
                    "page {} is outside {} ({} pages)",
                    page_number,
                    self.path.display(),
                    self.page_sizes.len()
                )
            })
    }
}

impl PageSource for PopplerDocument {
    fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    fn page_tokens(&self, page_number: usize) -> Result<Vec<TextToken>> {
        self.page_size(page_number)?;

        let page = page_number.to_string();
        let output = run_tool(
            "pdftotext",
            &[
                "-enc".into(),
                "UTF-8".into(),
                "-bbox".into(),
                "-f".into(),
                page.clone().into(),
                "-l".into(),
                page.into(),
                self.path.as_os_str().to_owned(),
                "-".into(),
            ],
        )
        .with_context(|| {
            format!(
                "failed to extract text for {} page {}",
                self.path.display(),
                page_number
            )
        })?;

        parse_bbox_words(&output)
    }

    fn rasterize_page(&self, page_number: usize, scale: f32) -> Result<PageRaster> {
        let (page_width, page_height) = self.page_size(page_number)?;
        if !(scale.is_finite() && scale > 0.0) {
            bail!("invalid rasterization scale: {scale}");
        }
        let dpi = (POINTS_PER_INCH * scale).round().max(1.0) as u32;

        let stem = self
            .path
            .file_stem()
            .and_then(|value| value.to_str())
            .unwrap_or("pdf")
            .chars()
            .map(|character| {
                if character.is_ascii_alphanumeric() {
                    character
                } else {
                    '_'
                }
            })
            .collect::<String>();
        let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let output_root = std::env::temp_dir().join(format!(
            "examsched_raster_{}_{}_{}_{}",
            stem,
            std::process::id(),
            page_number,
            stamp
        ));
        let png_path = PathBuf::from(format!("{}.png", output_root.display()));

        let page = page_number.to_string();
        run_tool(
            "pdftoppm",
            &[
                "-f".into(),
                page.clone().into(),
                "-l".into(),
                page.into(),
                "-singlefile".into(),
                "-png".into(),
                "-r".into(),
                dpi.to_string().into(),
                self.path.as_os_str().to_owned(),
                output_root.as_os_str().to_owned(),
            ],
        )
        .with_context(|| {
            format!(
                "failed to rasterize {} page {}",
                self.path.display(),
                page_number
            )
        })?;

        if !png_path.exists() {
            bail!(
                "pdftoppm did not produce expected image for {} page {}",
                self.path.display(),
                page_number
            );
        }

        let decoded = image::open(&png_path)
            .with_context(|| format!("failed to decode {}", png_path.display()));
        let _ = fs::remove_file(&png_path);

        Ok(PageRaster {
            image: decoded?.to_rgba8(),
            page_width,
            page_height,
        })
    }
}

fn run_tool(program: &str, args: &[std::ffi::OsString]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to execute {program}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "{} returned non-zero exit status: {}",
            program,
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).replace('\u{0000}', ""))
}

fn parse_page_count(pdfinfo: &str) -> Option<usize> {
    pdfinfo.lines().find_map(|line| {
        line.strip_prefix("Pages:")
            .and_then(|value| value.trim().parse::<usize>().ok())
    })
}

fn parse_page_sizes(pdfinfo: &str, page_count: usize) -> Result<Vec<(f64, f64)>> {
    let pattern = Regex::new(r"^Page\s+(\d+)\s+size:\s+([0-9.]+)\s+x\s+([0-9.]+)")
        .context("failed to compile page size regex")?;

    let mut sizes = vec![None; page_count];
    for line in pdfinfo.lines() {
        let Some(captures) = pattern.captures(line.trim()) else {
            continue;
        };
        let page = captures[1].parse::<usize>().unwrap_or(0);
        let width = captures[2].parse::<f64>().unwrap_or(0.0);
        let height = captures[3].parse::<f64>().unwrap_or(0.0);
        if let Some(slot) = page.checked_sub(1).and_then(|index| sizes.get_mut(index)) {
            *slot = Some((width, height));
        }
    }

    sizes
        .into_iter()
        .enumerate()
        .map(|(index, size)| size.with_context(|| format!("pdfinfo omitted size of page {}", index + 1)))
        .collect()
}

fn parse_bbox_words(xhtml: &str) -> Result<Vec<TextToken>> {
    let page_pattern = Regex::new(r#"<page width="([0-9.]+)" height="([0-9.]+)">"#)
        .context("failed to compile page regex")?;
    let word_pattern = Regex::new(
        r#"<word xMin="([0-9.\-]+)" yMin="([0-9.\-]+)" xMax="([0-9.\-]+)" yMax="([0-9.\-]+)">(.*?)</word>"#,
    )
    .context("failed to compile word regex")?;
    let entity_pattern = Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);")
        .context("failed to compile entity regex")?;

    let page_height = page_pattern
        .captures(xhtml)
        .and_then(|captures| captures[2].parse::<f64>().ok())
        .unwrap_or(0.0);

    let mut tokens = Vec::new();
    for captures in word_pattern.captures_iter(xhtml) {
        let coordinate = |index: usize| captures[index].parse::<f64>().unwrap_or(0.0);
        let (x_min, y_min, x_max, y_max) = (coordinate(1), coordinate(2), coordinate(3), coordinate(4));

        tokens.push(TextToken {
            text: decode_entities(&captures[5], &entity_pattern),
            bbox: BoundingBox {
                x0: x_min,
                y0: page_height - y_max,
                x1: x_max,
                y1: page_height - y_min,
            },
        });
    }

    Ok(tokens)
}

fn decode_entities(raw: &str, entity_pattern: &Regex) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    entity_pattern
        .replace_all(raw, |captures: &regex::Captures<'_>| {
            let entity = &captures[1];
            let decoded = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "amp" => Some('&'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                    .and_then(Result::ok)
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| captures[0].to_string(), String::from)
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BBOX_PAGE: &str = r#"<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<body>
<doc>
  <page width="612.000000" height="792.000000">
    <word xMin="56.000000" yMin="100.000000" xMax="98.500000" yMax="112.000000">CSC101</word>
    <word xMin="102.000000" yMin="100.000000" xMax="140.000000" yMax="112.000000">Sec&amp;1</word>
    <word xMin="150.000000" yMin="100.000000" xMax="160.000000" yMax="112.000000">(01)</word>
  </page>
</doc>
</body>
</html>
"#;

    #[test]
    fn parse_bbox_words_keeps_extraction_order_and_flips_y() {
        let tokens = parse_bbox_words(BBOX_PAGE).unwrap();

        let texts = tokens.iter().map(|token| token.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["CSC101", "Sec&1", "(01)"]);

        let first = tokens[0].bbox;
        assert_eq!(first.x0, 56.0);
        assert_eq!(first.x1, 98.5);
        assert_eq!(first.y0, 680.0);
        assert_eq!(first.y1, 692.0);
    }

    #[test]
    fn parse_bbox_words_of_empty_page_is_empty() {
        let tokens =
            parse_bbox_words(r#"<doc><page width="612.000000" height="792.000000"></page></doc>"#)
                .unwrap();
        assert!(tokens.is_empty());
    }

    #[test]
    fn decode_entities_handles_named_and_numeric_references() {
        let pattern = Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap();

        assert_eq!(decode_entities("&amp;lt;", &pattern), "&lt;");
        assert_eq!(decode_entities("A&lt;B", &pattern), "A<B");
        assert_eq!(decode_entities("O&#x27;Neil", &pattern), "O'Neil");
        assert_eq!(decode_entities("(&#49;)", &pattern), "(1)");
        assert_eq!(decode_entities("&nbsp;&#xZZ;", &pattern), "&nbsp;&#xZZ;");
        assert_eq!(decode_entities("plain", &pattern), "plain");
    }

    #[test]
    fn parse_bbox_words_decodes_hex_references() {
        let page = r#"<page width="100" height="200"><word xMin="1" yMin="2" xMax="3" yMax="4">CSE&#x2D;220</word></page>"#;
        let tokens = parse_bbox_words(page).unwrap();
        assert_eq!(tokens[0].text, "CSE-220");
    }

    #[test]
    fn pdfinfo_output_yields_count_and_sizes() {
        let summary = "Title:          Exams\nPages:          2\nEncrypted:      no\n";
        assert_eq!(parse_page_count(summary), Some(2));

        let detail = "Pages:          2\nPage    1 size: 595.276 x 841.89 pts (A4)\nPage    1 rot:  0\nPage    2 size: 612 x 792 pts (letter)\n";
        let sizes = parse_page_sizes(detail, 2).unwrap();
        assert_eq!(sizes, vec![(595.276, 841.89), (612.0, 792.0)]);
    }

    #[test]
    fn pdfinfo_missing_page_size_is_an_error() {
        let detail = "Page    1 size: 612 x 792 pts\n";
        assert!(parse_page_sizes(detail, 2).is_err());
    }

    #[test]
    fn page_raster_scale_follows_image_size() {
        let raster = PageRaster {
            image: RgbaImage::new(1224, 1584),
            page_width: 612.0,
            page_height: 792.0,
        };
        assert_eq!(raster.scale_x(), 2.0);
        assert_eq!(raster.scale_y(), 2.0);
    }
}
