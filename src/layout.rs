use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tracing::{debug, warn};

use crate::document::PageSource;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageLayout {
    pub full_text: String,
    pub tokens: Vec<String>,
    pub adjacent_pairs: Vec<String>,
}

impl PageLayout {
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        let full_text = tokens.join(" ");
        let adjacent_pairs = tokens
            .windows(2)
            .map(|pair| format!("{} {}", pair[0], pair[1]))
            .collect();

        Self {
            full_text,
            tokens,
            adjacent_pairs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Two callers missing on the same page may both extract it; the later insert wins.
pub struct LayoutCache<'d, D: PageSource + ?Sized> {
    document: &'d D,
    pages: RwLock<HashMap<usize, Arc<PageLayout>>>,
    failed_pages: Mutex<BTreeSet<usize>>,
    extractions: AtomicUsize,
}

impl<'d, D: PageSource + ?Sized> LayoutCache<'d, D> {
    pub fn new(document: &'d D) -> Self {
        Self {
            document,
            pages: RwLock::new(HashMap::new()),
            failed_pages: Mutex::new(BTreeSet::new()),
            extractions: AtomicUsize::new(0),
        }
    }

    pub fn page_count(&self) -> usize {
        self.document.page_count()
    }

    pub fn get_layout(&self, page_number: usize) -> Arc<PageLayout> {
        if let Some(layout) = self.cached(page_number) {
            return layout;
        }

        self.extractions.fetch_add(1, Ordering::Relaxed);
        let layout = match self.document.page_tokens(page_number) {
            Ok(tokens) => {
                let layout = PageLayout::from_tokens(
                    tokens.into_iter().map(|token| token.text).collect(),
                );
                debug!(
                    page = page_number,
                    tokens = layout.tokens.len(),
                    "extracted page layout"
                );
                layout
            }
            Err(err) => {
                warn!(page = page_number, error = %err, "page text extraction failed");
                self.failed_pages
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .insert(page_number);
                PageLayout::default()
            }
        };

        let layout = Arc::new(layout);
        self.pages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(page_number, Arc::clone(&layout));
        layout
    }

    pub fn cached(&self, page_number: usize) -> Option<Arc<PageLayout>> {
        self.pages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&page_number)
            .cloned()
    }

    pub fn cached_pages(&self) -> Vec<usize> {
        let mut pages = self
            .pages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .copied()
            .collect::<Vec<usize>>();
        pages.sort_unstable();
        pages
    }

    pub fn failed_pages(&self) -> Vec<usize> {
        self.failed_pages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .copied()
            .collect()
    }

    pub fn extraction_count(&self) -> usize {
        self.extractions.load(Ordering::Relaxed)
    }
}
