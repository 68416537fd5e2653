//! Export Coordinator: one CSV file per folder and platform, containing every
//! image that completed with metadata.

mod csv;
pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stocktag_model::{Categories, FolderRun, ImageRun, Metadata, Platform};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, UtcDateTime};
use tracing::instrument;

pub use crate::csv::{escape_field, headers};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Everything a row needs, with no reference to the file itself. Built from
/// live runs and restored snapshots alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub file_name: String,
    pub metadata: Metadata,
    /// The image's own selection; unset slots fall back at export time.
    #[serde(default)]
    pub categories: Categories,
}
impl ExportRecord {
    /// `None` unless the image completed with metadata.
    pub fn from_image(image: &ImageRun) -> Option<Self> {
        if !image.is_exportable() {
            return None;
        }
        Some(Self {
            file_name: image.file_name.clone(),
            metadata: image.metadata.clone()?,
            categories: image.categories.clone(),
        })
    }

    pub fn from_folder(folder: &FolderRun) -> Vec<Self> {
        folder.images.iter().filter_map(Self::from_image).collect()
    }
}

/// `{folder}_{platform}_Export_{YYYY-MM-DD}.csv`
pub fn file_name(folder_name: &str, platform: Platform, date: Date) -> Result<String> {
    let date = date.format(DATE_FORMAT).or_raise(|| ErrorKind::Date)?;
    Ok(format!("{folder_name}_{platform}_Export_{date}.csv"))
}

/// Export a folder's completed images for `platform` into `root`.
///
/// Category slots resolve image first, then folder, then `defaults`. Returns
/// `None` (and writes nothing) when no image completed.
#[instrument(skip_all, fields(folder = %folder.folder_name, %platform))]
pub async fn export(
    folder: &FolderRun,
    defaults: &Categories,
    platform: Platform,
    root: &Path,
) -> Result<Option<PathBuf>> {
    let records = ExportRecord::from_folder(folder);
    let fallback = folder.categories.or(defaults);
    export_records(&folder.folder_name, &records, &fallback, platform, root, UtcDateTime::now().date()).await
}

/// Write `records` as a CSV file named after `folder_name` and `date`.
pub async fn export_records(
    folder_name: &str,
    records: &[ExportRecord],
    fallback: &Categories,
    platform: Platform,
    root: &Path,
    date: Date,
) -> Result<Option<PathBuf>> {
    if records.is_empty() {
        tracing::warn!(folder = folder_name, %platform, "No completed images to export; skipping");
        return Ok(None);
    }
    tokio::fs::create_dir_all(root).await.or_raise(|| ErrorKind::CreateDir(root.to_path_buf()))?;
    let path = root.join(file_name(folder_name, platform, date)?);
    let contents = csv::document(records, fallback, platform);
    tokio::fs::write(&path, contents).await.or_raise(|| ErrorKind::Write(path.clone()))?;
    tracing::info!(path = %path.display(), rows = records.len(), "Export written");
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stocktag_model::ImageStatus;
    use time::Month;

    fn image(name: &str, status: ImageStatus, metadata: bool) -> ImageRun {
        ImageRun {
            status,
            metadata: metadata.then(|| Metadata::new(format!("{name} title"), "desc", ["k1", "k2"])),
            ..ImageRun::new(name)
        }
    }

    fn date() -> Date {
        Date::from_calendar_date(2025, Month::March, 7).unwrap()
    }

    #[test]
    fn test_file_name() {
        let name = file_name("Iceland 2024", Platform::AdobeStock, date()).unwrap();
        assert_eq!(name, "Iceland 2024_AdobeStock_Export_2025-03-07.csv");
        let name = file_name("trip", Platform::Shutterstock, date()).unwrap();
        assert_eq!(name, "trip_Shutterstock_Export_2025-03-07.csv");
    }

    #[test]
    fn test_only_completed_images_are_records() {
        let folder = FolderRun::new(
            "f",
            "/photos/trip",
            vec![
                image("a.jpg", ImageStatus::Completed, true),
                image("b.jpg", ImageStatus::Error, false),
                image("c.jpg", ImageStatus::Completed, true),
                image("d.jpg", ImageStatus::Completed, false),
                image("e.jpg", ImageStatus::Pending, false),
            ],
        );
        let names: Vec<_> = ExportRecord::from_folder(&folder).into_iter().map(|r| r.file_name).collect();
        assert_eq!(names, vec!["a.jpg", "c.jpg"]);
    }

    #[tokio::test]
    async fn test_export_writes_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("exports");
        let folder = FolderRun::new(
            "f",
            "/photos/trip",
            vec![image("a.jpg", ImageStatus::Completed, true), image("b.jpg", ImageStatus::Error, false)],
        );
        let records = ExportRecord::from_folder(&folder);
        let defaults = Categories { adobe: Some("Travel".into()), ..Default::default() };
        let path = export_records("trip", &records, &defaults, Platform::AdobeStock, &root, date())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path, root.join("trip_AdobeStock_Export_2025-03-07.csv"));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "Filename,Title,Description,Keywords,Category\na.jpg,a.jpg title,desc,\"k1, k2\",Travel\n"
        );
    }

    #[tokio::test]
    async fn test_export_nothing_completed_writes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let folder = FolderRun::new("f", "/photos/trip", vec![image("a.jpg", ImageStatus::Error, false)]);
        let written = export(&folder, &Categories::default(), Platform::Shutterstock, temp_dir.path()).await.unwrap();
        assert!(written.is_none());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_folder_categories_between_image_and_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let folder = FolderRun::new("f", "/photos/trip", vec![image("a.jpg", ImageStatus::Completed, true)])
            .with_categories(Categories { adobe: Some("Animals".into()), ..Default::default() });
        let defaults = Categories { adobe: Some("Travel".into()), ..Default::default() };
        let path = export(&folder, &defaults, Platform::AdobeStock, temp_dir.path()).await.unwrap().unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.ends_with(",Animals\n"));
    }
}
