use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{GenericImageView, ImageFormat};
use tempfile::NamedTempFile;

use crate::feed::MediaRef;

#[derive(Debug, Clone)]
pub struct Config {
    pub stage_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stage_dir: default_stage_dir(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("media: read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("media: {path} is {mime}, not an image")]
    NotAnImage { path: PathBuf, mime: String },
    #[error("media: decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("media: stage copy for {path}: {source}")]
    Stage {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Stages composer attachments. Each accepted file gets a private temp
/// copy that lives exactly as long as its `StagedMedia` handle.
pub struct Stager {
    stage_dir: PathBuf,
}

impl Stager {
    pub fn new(cfg: Config) -> Result<Self> {
        let stage_dir = cfg
            .stage_dir
            .or_else(default_stage_dir)
            .context("media: stage dir not configured")?;
        fs::create_dir_all(&stage_dir)
            .with_context(|| format!("media: create stage dir {}", stage_dir.display()))?;
        Ok(Self { stage_dir })
    }

    pub fn stage(&self, source: &Path) -> std::result::Result<StagedMedia, MediaError> {
        let bytes = fs::read(source).map_err(|err| MediaError::Read {
            path: source.to_path_buf(),
            source: err,
        })?;

        let mime = detect_mime(&bytes);
        if !mime.starts_with("image/") {
            return Err(MediaError::NotAnImage {
                path: source.to_path_buf(),
                mime,
            });
        }

        let decoded = image::load_from_memory(&bytes).map_err(|err| MediaError::Decode {
            path: source.to_path_buf(),
            source: err,
        })?;
        let (width, height) = decoded.dimensions();

        let mut file =
            NamedTempFile::new_in(&self.stage_dir).map_err(|err| MediaError::Stage {
                path: source.to_path_buf(),
                source: err,
            })?;
        file.write_all(&bytes).map_err(|err| MediaError::Stage {
            path: source.to_path_buf(),
            source: err,
        })?;

        Ok(StagedMedia {
            source: source.to_path_buf(),
            name: display_name_for(source),
            mime,
            width,
            height,
            file,
        })
    }
}

/// A validated attachment. Dropping (or explicitly releasing) the handle
/// removes the staged copy, so no handle dangles across submissions.
#[derive(Debug)]
pub struct StagedMedia {
    source: PathBuf,
    name: String,
    mime: String,
    width: u32,
    height: u32,
    file: NamedTempFile,
}

impl StagedMedia {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn staged_path(&self) -> &Path {
        self.file.path()
    }

    /// The reference a submitted post carries. Posts point at the
    /// original file, never at the staged copy that is about to go away.
    pub fn as_media_ref(&self) -> MediaRef {
        MediaRef {
            source: self.source.clone(),
            label: self.name.clone(),
        }
    }

    pub fn release(self) -> Result<()> {
        self.file.close().context("media: remove staged copy")
    }
}

fn display_name_for(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn default_stage_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("fitfeed").join("staged"))
}

fn detect_mime(bytes: &[u8]) -> String {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => "image/jpeg".into(),
        Ok(ImageFormat::Png) => "image/png".into(),
        Ok(ImageFormat::Gif) => "image/gif".into(),
        Ok(ImageFormat::WebP) => "image/webp".into(),
        _ => {
            let mut buffer = [0u8; 512];
            let mut cursor = std::io::Cursor::new(bytes);
            let read = cursor.read(&mut buffer).unwrap_or(0);
            tree_magic_mini::from_u8(&buffer[..read]).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stager(dir: &tempfile::TempDir) -> Stager {
        Stager::new(Config {
            stage_dir: Some(dir.path().join("staged")),
        })
        .unwrap()
    }

    fn write_png(dir: &Path) -> PathBuf {
        let path = dir.join("progress.png");
        image::RgbaImage::new(3, 2).save(&path).unwrap();
        path
    }

    #[test]
    fn stage_accepts_an_image_and_release_removes_the_copy() {
        let dir = tempdir().unwrap();
        let source = write_png(dir.path());
        let staged = stager(&dir).stage(&source).unwrap();
        assert_eq!(staged.mime(), "image/png");
        assert_eq!(staged.name(), "progress.png");
        assert_eq!(staged.dimensions(), (3, 2));
        let copy = staged.staged_path().to_path_buf();
        assert!(copy.exists());
        let media = staged.as_media_ref();
        assert_eq!(media.source, source);
        staged.release().unwrap();
        assert!(!copy.exists());
    }

    #[test]
    fn stage_rejects_non_image_content() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("notes.txt");
        fs::write(&source, b"week 3: add one more interval").unwrap();
        let err = stager(&dir).stage(&source).unwrap_err();
        assert!(matches!(err, MediaError::NotAnImage { .. }));
    }

    #[test]
    fn stage_fails_on_missing_file() {
        let dir = tempdir().unwrap();
        let err = stager(&dir)
            .stage(&dir.path().join("missing.png"))
            .unwrap_err();
        assert!(matches!(err, MediaError::Read { .. }));
    }

    #[test]
    fn dropping_the_handle_also_removes_the_copy() {
        let dir = tempdir().unwrap();
        let source = write_png(dir.path());
        let copy;
        {
            let staged = stager(&dir).stage(&source).unwrap();
            copy = staged.staged_path().to_path_buf();
            assert!(copy.exists());
        }
        assert!(!copy.exists());
    }
}
