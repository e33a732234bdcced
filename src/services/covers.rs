//! Cover extraction for series.

use std::path::{Path, PathBuf};

use folio_common::{Error, LibraryId, Result, SeriesId};
use folio_db::pool::{get_conn, DbPool};
use folio_db::queries::{files, series};

use super::archive::extract_cover_image;
use super::CoverGenerator;

/// Writes the first usable image of a series to `covers_dir` and records
/// its path on the series.
pub struct ArchiveCoverGenerator {
    pool: DbPool,
    covers_dir: PathBuf,
}

impl ArchiveCoverGenerator {
    pub fn new(pool: DbPool, covers_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            covers_dir: covers_dir.into(),
        }
    }
}

impl CoverGenerator for ArchiveCoverGenerator {
    fn generate_covers(&self, library_id: LibraryId, series_id: SeriesId, force: bool) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        let series = series::get_series(&conn, series_id)?
            .ok_or_else(|| Error::not_found(format!("series {series_id}")))?;

        if !force {
            if let Some(existing) = &series.cover_image {
                if Path::new(existing).exists() {
                    return Ok(());
                }
            }
        }

        for file in files::list_files_for_series(&conn, series_id)? {
            let extracted = match extract_cover_image(Path::new(&file.file_path), file.format) {
                Ok(Some(found)) => found,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(file = %file.file_path, error = %e, "No cover in file");
                    continue;
                }
            };
            let (ext, bytes) = extracted;
            std::fs::create_dir_all(&self.covers_dir)?;
            let target = self.covers_dir.join(format!("series_{series_id}.{ext}"));
            std::fs::write(&target, bytes)?;
            let target = target.to_string_lossy();
            series::set_cover_image(&conn, series_id, Some(target.as_ref()))?;
            tracing::debug!(library_id = %library_id, series = %series.name, cover = %target, "Wrote cover");
            return Ok(());
        }

        tracing::debug!(series = %series.name, "No cover image found");
        Ok(())
    }
}
