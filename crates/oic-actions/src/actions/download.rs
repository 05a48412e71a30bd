//! Download action
//!
//! Fetches a file over HTTP(S) into the download area and optionally
//! unpacks it. Supported archives: `.tar`, `.tar.gz`/`.tgz`,
//! `.tar.xz`/`.txz`, `.tar.zst` and `.tar.bz2`.

use crate::context::BuildContext;
use crate::error::{ActionError, Result};
use crate::reporter::Event;
use crate::traits::{Action, ActionSpec, BaseAction};
use async_compression::tokio::bufread::{BzDecoder, GzipDecoder, XzDecoder, ZstdDecoder};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt, BufReader};
use url::Url;

/// How often download progress is reported
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration of a `download` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadSpec {
    pub url: String,
    /// Destination file name inside the download area
    pub filename: String,
    pub unpack: bool,
    /// Extraction directory inside the download area
    #[serde(rename = "unpack-path")]
    pub unpack_path: String,
}

impl ActionSpec for DownloadSpec {
    fn validate(&self, base: &BaseAction, ctx: &BuildContext) -> Result<Box<dyn Action>> {
        if self.url.is_empty() {
            return Err(ActionError::missing("url", &base.action));
        }

        let url = Url::parse(&self.url)
            .map_err(|e| ActionError::InvalidProperty(format!("invalid URL \"{}\": {}", self.url, e)))?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ActionError::InvalidProperty(format!(
                    "unsupported URL scheme {}, only http and https are supported",
                    other
                )));
            }
        }

        if base.name.as_deref().unwrap_or_default().is_empty() {
            return Err(ActionError::missing("name", &base.action));
        }

        let basename = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let dest = if self.filename.is_empty() {
            let name = basename.as_deref().ok_or_else(|| {
                ActionError::InvalidProperty(format!(
                    "cannot derive a file name from \"{}\", set \"filename\"",
                    url
                ))
            })?;
            ctx.download_path(name)
        } else {
            ctx.download_path(&self.filename)
        };
        if !dest.starts_with(ctx.download_dir()) || dest == ctx.download_dir() {
            return Err(ActionError::InvalidProperty(format!(
                "file name {} is outside the download area",
                dest.display()
            )));
        }

        let unpack_path = if !self.unpack {
            None
        } else if self.unpack_path.is_empty() {
            let name = dest
                .file_name()
                .map(|n| format!("{}.unpack", n.to_string_lossy()))
                .unwrap_or_else(|| "download.unpack".to_string());
            Some(ctx.download_path(name))
        } else {
            Some(ctx.download_path(&self.unpack_path))
        };

        if let Some(path) = &unpack_path {
            if ArchiveFormat::detect(&dest).is_none() {
                return Err(ActionError::InvalidProperty(format!(
                    "cannot unpack {}: unsupported archive format",
                    dest.display()
                )));
            }
            if !path.starts_with(ctx.download_dir()) {
                return Err(ActionError::InvalidProperty(format!(
                    "unpack path {} is outside the download area",
                    path.display()
                )));
            }
        }

        Ok(Box::new(DownloadAction {
            description: base.description().to_string(),
            url,
            dest,
            unpack_path,
        }))
    }
}

struct DownloadAction {
    description: String,
    url: Url,
    dest: PathBuf,
    unpack_path: Option<PathBuf>,
}

#[async_trait]
impl Action for DownloadAction {
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        ctx.reporter()
            .report(Event::info(format!("Downloading \"{}\"...", self.url)));
        download(ctx, &self.url, &self.dest).await?;

        if let Some(unpack_path) = &self.unpack_path {
            ctx.reporter().report(Event::info(format!(
                "Unpacking {} into {}",
                self.dest.display(),
                unpack_path.display()
            )));
            unpack(&self.dest, unpack_path).await?;
        }
        Ok(())
    }

    async fn cleanup(&self, _ctx: &BuildContext) -> Result<()> {
        match fs::remove_file(&self.dest).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if let Some(unpack_path) = &self.unpack_path {
            match fs::remove_dir_all(unpack_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Stream `url` into the file at `dest`
async fn download(ctx: &BuildContext, url: &Url, dest: &Path) -> Result<()> {
    // A previous file is replaced, a directory in the way is an error
    match fs::symlink_metadata(dest).await {
        Ok(meta) if meta.is_dir() => {
            return Err(ActionError::DestinationIsDirectory(dest.to_path_buf()));
        }
        Ok(_) => fs::remove_file(dest).await?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    let response = reqwest::get(url.clone())
        .await
        .map_err(|e| ActionError::NetworkError(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ActionError::HttpStatus {
            url: url.to_string(),
            status: response.status().to_string(),
        });
    }

    let content_length = response.content_length();
    let mut file = fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut last_report = Instant::now();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ActionError::NetworkError(e.to_string()))?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if last_report.elapsed() > PROGRESS_INTERVAL {
            let progress = match content_length {
                Some(total) if total > 0 => format!("{}%", downloaded * 100 / total),
                _ => format!("{} bytes", downloaded),
            };
            ctx.reporter()
                .report(Event::debug(format!("Downloaded {} of {}", progress, url)));
            last_report = Instant::now();
        }
    }

    file.sync_all().await?;
    ctx.reporter().report(Event::debug(format!(
        "Saved {} bytes to {}",
        downloaded,
        dest.display()
    )));
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    Tar,
    Gzip,
    Xz,
    Zstd,
    Bzip2,
}

impl ArchiveFormat {
    fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::Gzip)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(ArchiveFormat::Xz)
        } else if name.ends_with(".tar.zst") {
            Some(ArchiveFormat::Zstd)
        } else if name.ends_with(".tar.bz2") {
            Some(ArchiveFormat::Bzip2)
        } else if name.ends_with(".tar") {
            Some(ArchiveFormat::Tar)
        } else {
            None
        }
    }
}

/// Extract the archive at `archive` into `dest`
async fn unpack(archive: &Path, dest: &Path) -> Result<()> {
    let format = ArchiveFormat::detect(archive).ok_or_else(|| {
        ActionError::Archive(format!("{}: unsupported archive format", archive.display()))
    })?;

    let file = BufReader::new(fs::File::open(archive).await?);
    let reader: Box<dyn AsyncRead + Unpin + Send> = match format {
        ArchiveFormat::Tar => Box::new(file),
        ArchiveFormat::Gzip => Box::new(GzipDecoder::new(file)),
        ArchiveFormat::Xz => Box::new(XzDecoder::new(file)),
        ArchiveFormat::Zstd => Box::new(ZstdDecoder::new(file)),
        ArchiveFormat::Bzip2 => Box::new(BzDecoder::new(file)),
    };

    fs::create_dir_all(dest).await?;
    tokio_tar::Archive::new(reader)
        .unpack(dest)
        .await
        .map_err(|e| ActionError::Archive(format!("{}: {}", archive.display(), e)))
}
