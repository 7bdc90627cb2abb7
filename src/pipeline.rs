use chrono::{Datelike, NaiveDate};
use thiserror::Error;
use tokio::task;
use tracing::{debug, info, instrument};

use crate::cache::{CacheError, DownloadCache};
use crate::db::{DbError, RegistrationRepository};
use crate::importers::downloader::DownloadError;
use crate::importers::excel_importer::ExcelImportError;
use crate::importers::{ExcelImporter, KbaDownloader};
use crate::period::{self, ReportPeriod};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Download failed for period {period}: {source}")]
    Download {
        period: ReportPeriod,
        #[source]
        source: DownloadError,
    },

    #[error("Cache access failed for period {period}: {source}")]
    Cache {
        period: ReportPeriod,
        #[source]
        source: CacheError,
    },

    #[error("Parse failed for period {period}: {source}")]
    Parse {
        period: ReportPeriod,
        #[source]
        source: ExcelImportError,
    },

    #[error("Database load failed for period {period}: {source}")]
    Load {
        period: ReportPeriod,
        #[source]
        source: DbError,
    },

    #[error("Parser task failed for period {period}")]
    ParserTask { period: ReportPeriod },
}

impl ImportError {
    /// The period whose processing failed
    pub fn period(&self) -> ReportPeriod {
        match self {
            ImportError::Download { period, .. }
            | ImportError::Cache { period, .. }
            | ImportError::Parse { period, .. }
            | ImportError::Load { period, .. }
            | ImportError::ParserTask { period } => *period,
        }
    }
}

/// Outcome of one processed period
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct PeriodReport {
    pub period: ReportPeriod,
    pub rows_parsed: usize,
    pub rows_written: u64,
    pub served_from_cache: bool,
}

/// Aggregated outcome of a run over one or more periods
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub periods: Vec<PeriodReport>,
}

impl ImportSummary {
    pub fn total_rows_written(&self) -> u64 {
        self.periods.iter().map(|p| p.rows_written).sum()
    }

    pub fn total_rows_parsed(&self) -> usize {
        self.periods.iter().map(|p| p.rows_parsed).sum()
    }
}

/// Options steering a pipeline run
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Ignore existing cache entries and re-download (the cache is still
    /// written on success)
    pub refresh: bool,
    /// Fetch and parse only; skip the database write
    pub dry_run: bool,
}

/// Sequential fetch -> parse -> load pipeline over report periods
pub struct ImportPipeline {
    downloader: KbaDownloader,
    cache: DownloadCache,
    repository: RegistrationRepository,
    importer: ExcelImporter,
    table_name: String,
    options: ImportOptions,
}

impl ImportPipeline {
    pub fn new(
        downloader: KbaDownloader,
        cache: DownloadCache,
        repository: RegistrationRepository,
        importer: ExcelImporter,
        table_name: impl Into<String>,
        options: ImportOptions,
    ) -> Self {
        Self {
            downloader,
            cache,
            repository,
            importer,
            table_name: table_name.into(),
            options,
        }
    }

    /// Fetch, parse and load a single report period
    #[instrument(skip(self))]
    pub async fn import_period(&self, period: ReportPeriod) -> Result<PeriodReport, ImportError> {
        let (bytes, served_from_cache) = self.fetch(period).await?;

        let importer = self.importer.clone();
        let parsed = task::spawn_blocking(move || importer.parse(bytes))
            .await
            .map_err(|_| ImportError::ParserTask { period })?
            .map_err(|source| ImportError::Parse { period, source })?;
        let rows_parsed = parsed.rows.len();

        if self.options.dry_run {
            info!(
                "Dry run: {} rows parsed for {}, skipping database write",
                rows_parsed, period
            );
            return Ok(PeriodReport {
                period,
                rows_parsed,
                rows_written: 0,
                served_from_cache,
            });
        }

        let rows_written = self
            .repository
            .upsert_table(&period, &parsed, &self.table_name)
            .await
            .map_err(|source| ImportError::Load { period, source })?;

        Ok(PeriodReport {
            period,
            rows_parsed,
            rows_written,
            served_from_cache,
        })
    }

    /// Process every period of `today`'s year up to and including last
    /// month, in ascending order. Stops at the first failure; periods
    /// committed before it stay committed.
    pub async fn import_year_to_date(&self, today: NaiveDate) -> Result<ImportSummary, ImportError> {
        let periods = period::periods_through_previous_month(today);
        info!("Importing {} periods of {}", periods.len(), today.year());

        let mut summary = ImportSummary::default();
        for period in periods {
            let report = self.import_period(period).await?;
            summary.periods.push(report);
        }
        Ok(summary)
    }

    /// Cache-first fetch; a failed download leaves no cache entry, so the
    /// next run retries the network call
    async fn fetch(&self, period: ReportPeriod) -> Result<(Vec<u8>, bool), ImportError> {
        let key = period.cache_key();

        if !self.options.refresh {
            if let Some(bytes) = self
                .cache
                .get(&key)
                .map_err(|source| ImportError::Cache { period, source })?
            {
                debug!("Serving {} from cache", period);
                return Ok((bytes, true));
            }
        }

        let bytes = self
            .downloader
            .download_report(&period)
            .await
            .map_err(|source| ImportError::Download { period, source })?;
        self.cache
            .put(&key, &bytes)
            .map_err(|source| ImportError::Cache { period, source })?;
        Ok((bytes, false))
    }
}
