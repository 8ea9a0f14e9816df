use std::collections::BTreeSet;

use serde::Serialize;

pub const SECTION_PREFIXES: [&str; 5] = ["Section", "Sec", "Sec.", "SEC", "SECTION"];

pub const SECTION_SEPARATORS: [&str; 5] = ["", " ", "-", ":", "."];

pub const COURSE_PART_SEPARATORS: [&str; 3] = ["", " ", "-"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariantSet {
    pub course_code_variants: BTreeSet<String>,
    pub section_variants: BTreeSet<String>,
    pub section_phrase_variants: BTreeSet<String>,
}

pub fn variants_for(course_code: &str, section: &str) -> VariantSet {
    let section_variants = section_variants(section);

    let mut section_phrase_variants = BTreeSet::new();
    for prefix in SECTION_PREFIXES {
        for separator in SECTION_SEPARATORS {
            for variant in &section_variants {
                section_phrase_variants.insert(format!("{prefix}{separator}{variant}"));
            }
        }
    }

    VariantSet {
        course_code_variants: course_code_variants(course_code),
        section_variants,
        section_phrase_variants,
    }
}

pub fn course_code_variants(course_code: &str) -> BTreeSet<String> {
    let upper = course_code.to_uppercase();
    let upper_parts = upper.split_whitespace().collect::<Vec<&str>>();

    let mut variants = BTreeSet::new();
    insert_nonblank(&mut variants, course_code.to_string());
    insert_nonblank(&mut variants, upper.clone());
    insert_nonblank(&mut variants, compact_upper(course_code));
    insert_nonblank(&mut variants, upper_parts.join("."));
    insert_nonblank(&mut variants, upper_parts.join("-"));

    let parts = course_code.split_whitespace().collect::<Vec<&str>>();
    if let [prefix, suffix] = parts.as_slice() {
        let normalized_prefix = prefix.to_uppercase();
        let normalized_suffix = suffix.to_lowercase();
        for separator in COURSE_PART_SEPARATORS {
            insert_nonblank(&mut variants, format!("{prefix}{separator}{suffix}"));
            insert_nonblank(
                &mut variants,
                format!("{normalized_prefix}{separator}{normalized_suffix}"),
            );
        }
    }

    variants
}

pub fn section_variants(section: &str) -> BTreeSet<String> {
    let mut variants = BTreeSet::new();
    let section = section.trim();
    if section.is_empty() {
        return variants;
    }

    insert_nonblank(&mut variants, section.to_string());
    insert_nonblank(&mut variants, format!("{section:0>2}"));
    insert_nonblank(&mut variants, strip_leading_zeros(section).to_string());
    variants
}

pub fn compact_upper(course_code: &str) -> String {
    course_code
        .split_whitespace()
        .collect::<String>()
        .to_uppercase()
}

/// `"007"` -> `"7"`, while an all-zero section keeps a single `"0"`.
pub fn strip_leading_zeros(section: &str) -> &str {
    let stripped = section.trim_start_matches('0');
    if stripped.is_empty() && !section.is_empty() {
        &section[section.len() - 1..]
    } else {
        stripped
    }
}

fn insert_nonblank(variants: &mut BTreeSet<String>, candidate: String) {
    if !candidate.trim().is_empty() {
        variants.insert(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn variants_for_is_deterministic() {
        assert_eq!(variants_for("cse 220", "3"), variants_for("cse 220", "3"));
    }

    #[test]
    fn single_token_course_code_yields_case_forms() {
        assert_eq!(course_code_variants("csc101"), set(&["CSC101", "csc101"]));
    }

    #[test]
    fn two_part_course_code_yields_separator_and_casing_combinations() {
        let variants = course_code_variants("Cse 110l");

        for expected in [
            "Cse 110l", "CSE 110L", "CSE110L", "CSE.110L", "CSE-110L", "Cse110l", "Cse-110l",
            "CSE110l", "CSE 110l", "CSE-110l",
        ] {
            assert!(variants.contains(expected), "missing {expected}");
        }
        assert_eq!(variants.len(), 10);
    }

    #[test]
    fn blank_course_code_yields_nothing() {
        assert!(course_code_variants("   ").is_empty());
    }

    #[test]
    fn section_variants_cover_padding_and_stripping() {
        assert_eq!(section_variants("1"), set(&["01", "1"]));
        assert_eq!(section_variants("01"), set(&["01", "1"]));
        assert_eq!(section_variants("007"), set(&["007", "7"]));
        assert_eq!(section_variants("12"), set(&["12"]));
        assert_eq!(section_variants("00"), set(&["0", "00"]));
        assert!(section_variants("").is_empty());
    }

    #[test]
    fn section_variants_ignore_surrounding_whitespace() {
        assert_eq!(section_variants(" 01"), set(&["01", "1"]));
        assert_eq!(section_variants("120 "), set(&["120"]));
        assert!(section_variants("   ").is_empty());
    }

    #[test]
    fn section_phrases_combine_prefix_separator_and_number() {
        let variants = variants_for("CSC101", "01");

        // "Sec." + "" and "Sec" + "." spell the same phrase.
        let product =
            SECTION_PREFIXES.len() * SECTION_SEPARATORS.len() * variants.section_variants.len();
        assert_eq!(variants.section_phrase_variants.len(), product - 2);
        for expected in ["Section-01", "Sec.1", "SEC:01", "SECTION 1", "Sec..01", "Section1"] {
            assert!(
                variants.section_phrase_variants.contains(expected),
                "missing {expected}"
            );
        }
    }

    #[test]
    fn strip_leading_zeros_keeps_a_single_zero() {
        assert_eq!(strip_leading_zeros("0"), "0");
        assert_eq!(strip_leading_zeros("000"), "0");
        assert_eq!(strip_leading_zeros("010"), "10");
        assert_eq!(strip_leading_zeros(""), "");
    }
}
