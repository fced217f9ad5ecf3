use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::{fs, sync::Mutex};
use tracing::info;

use super::{ExportError, ExportResult, ExportSink};

/// `member -> season -> points`
pub type Sheet = IndexMap<String, IndexMap<String, f64>>;

/// `sheet -> member -> season -> points`
pub type Workbook = IndexMap<String, Sheet>;

/// Keeps every sheet in a single pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonSheetSink {
    path: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl JsonSheetSink {
    /// Store the workbook at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Read the whole workbook; a missing file is an empty workbook.
    pub async fn read(&self) -> ExportResult<Workbook> {
        read_workbook(&self.path).await
    }
}

async fn read_workbook(path: &Path) -> ExportResult<Workbook> {
    let display = path.display().to_string();
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| ExportError::Corrupt {
            path: display,
            source,
        }),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Workbook::new()),
        Err(source) => Err(ExportError::Io {
            path: display,
            source,
        }),
    }
}

impl ExportSink for JsonSheetSink {
    fn write_season_snapshot(
        &self,
        sheet: &str,
        season_id: &str,
        scores: Vec<(String, f64)>,
    ) -> BoxFuture<'static, ExportResult<()>> {
        let path = self.path.clone();
        let lock = self.write_lock.clone();
        let sheet = sheet.to_owned();
        let season_id = season_id.to_owned();

        Box::pin(async move {
            let _guard = lock.lock().await;
            let display = path.display().to_string();
            let io_error = |source| ExportError::Io {
                path: display.clone(),
                source,
            };

            let mut workbook = read_workbook(&path).await?;
            let rows = workbook.entry(sheet.clone()).or_default();
            let written = scores.len();
            for (member, points) in scores {
                rows.entry(member)
                    .or_default()
                    .insert(season_id.clone(), points);
            }

            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent).await.map_err(io_error)?;
            }
            let bytes = serde_json::to_vec_pretty(&workbook).map_err(|source| {
                ExportError::Corrupt {
                    path: display.clone(),
                    source,
                }
            })?;
            fs::write(path.as_path(), bytes).await.map_err(io_error)?;

            info!(%sheet, season = %season_id, rows = written, "exported season totals");
            Ok(())
        })
    }

    fn read_sheet(&self, sheet: &str) -> BoxFuture<'static, ExportResult<Sheet>> {
        let path = self.path.clone();
        let sheet = sheet.to_owned();
        Box::pin(async move {
            let mut workbook = read_workbook(&path).await?;
            Ok(workbook.shift_remove(&sheet).unwrap_or_default())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn season_columns_are_merged_per_member() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonSheetSink::new(dir.path().join("export").join("sheet.json"));

        sink.write_season_snapshot(
            "User Data",
            "1",
            vec![("Ada".into(), 120.0), ("Bo".into(), 0.0)],
        )
        .await
        .unwrap();
        sink.write_season_snapshot("User Data", "2", vec![("Ada".into(), 35.5)])
            .await
            .unwrap();
        sink.write_season_snapshot("User Data", "1", vec![("Bo".into(), 10.0)])
            .await
            .unwrap();

        let workbook = sink.read().await.unwrap();
        let rows = &workbook["User Data"];
        assert_eq!(rows["Ada"]["1"], 120.0);
        assert_eq!(rows["Ada"]["2"], 35.5);
        assert_eq!(rows["Bo"]["1"], 10.0);
        assert_eq!(rows.keys().collect::<Vec<_>>(), vec!["Ada", "Bo"]);
    }

    #[tokio::test]
    async fn sheets_are_read_back_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonSheetSink::new(dir.path().join("sheet.json"));
        assert!(sink.read_sheet("User Data").await.unwrap().is_empty());

        sink.write_season_snapshot("User Data", "1", vec![("Ada".into(), 12.5)])
            .await
            .unwrap();
        sink.write_season_snapshot("Other", "1", vec![("Bo".into(), 3.0)])
            .await
            .unwrap();

        let rows = sink.read_sheet("User Data").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows["Ada"]["1"], 12.5);
        assert!(sink.read_sheet("Missing").await.unwrap().is_empty());
    }
}
