use std::path::PathBuf;

use common::{AppError, CollectionMode, Result};
use normalizer::TabularRecord;
use tracing::info;

/// One CSV file per chain and mode, rewritten on every run.
#[derive(Debug, Clone)]
pub struct CsvSink {
    output_dir: PathBuf,
}

impl CsvSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn path_for(&self, chain: &str, mode: CollectionMode) -> PathBuf {
        self.output_dir.join(format!("{chain}_{}.csv", mode.as_str()))
    }

    /// Truncates and writes `records`. The header row is written even when there are none.
    pub fn write<R: TabularRecord>(
        &self,
        chain: &str,
        mode: CollectionMode,
        records: &[R],
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.path_for(chain, mode);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(AppError::sink)?;
        writer.write_record(R::FIELDS).map_err(AppError::sink)?;
        for record in records {
            writer.serialize(record).map_err(AppError::sink)?;
        }
        writer.flush()?;
        info!(
            chain,
            path = %path.display(),
            records = records.len(),
            "wrote records"
        );
        Ok(path)
    }
}
