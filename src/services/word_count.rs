//! Word counts for epub chapters.

use std::path::Path;

use folio_common::{LibraryId, MangaFormat, Result, SeriesId};
use folio_db::pool::{get_conn, DbPool};
use folio_db::queries::{chapters, files};
use once_cell::sync::Lazy;
use regex::Regex;

use super::archive::read_text_entries;
use super::WordCounter;

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex should compile"));

/// Count whitespace separated words in an (x)html document, ignoring markup.
pub fn count_words(html: &str) -> i64 {
    TAG_REGEX.replace_all(html, " ").split_whitespace().count() as i64
}

/// Stores a word count on every epub chapter of a series.
pub struct EpubWordCounter {
    pool: DbPool,
}

impl EpubWordCounter {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl WordCounter for EpubWordCounter {
    fn analyze_word_count(&self, library_id: LibraryId, series_id: SeriesId, force: bool) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        for chapter in chapters::list_chapters_for_series(&conn, series_id)? {
            if chapter.word_count > 0 && !force {
                continue;
            }
            let epubs: Vec<_> = files::list_files(&conn, chapter.id)?
                .into_iter()
                .filter(|f| f.format == MangaFormat::Epub)
                .collect();
            if epubs.is_empty() {
                continue;
            }

            let mut words = 0;
            for file in &epubs {
                match read_text_entries(Path::new(&file.file_path)) {
                    Ok(documents) => words += documents.iter().map(|d| count_words(d)).sum::<i64>(),
                    Err(e) => {
                        tracing::warn!(library_id = %library_id, file = %file.file_path, error = %e, "Failed to read epub text");
                    }
                }
            }
            if words != chapter.word_count {
                chapters::set_word_count(&conn, chapter.id, words)?;
            }
        }
        Ok(())
    }
}
