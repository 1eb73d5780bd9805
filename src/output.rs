//! Writing generated images to disk.

use crate::error::{LuminaError, Result};
use crate::image::{GeneratedImage, ImageFormat};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const MAX_SLUG_LEN: usize = 50;

/// An image saved to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFile {
    /// Final location of the image.
    pub path: PathBuf,
    /// Index of the source image in the service response.
    pub index: usize,
    /// Bytes written.
    pub size_bytes: usize,
}

/// Saves images into one directory.
///
/// Names are `{stem}_{n}.{ext}` with `n` starting at 1, where the stem is
/// a prompt slug plus a millisecond timestamp, or the stem of an explicit
/// filename. A single image with an explicit filename keeps that name,
/// except that the extension is replaced when it names another format.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
    stem: String,
    filename: Option<PathBuf>,
}

impl OutputWriter {
    /// Creates a writer for `dir`, naming files after `prompt`.
    pub fn new(dir: impl Into<PathBuf>, prompt: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self {
            dir: dir.into(),
            stem: format!("{}_{millis}", slugify(prompt)),
            filename: None,
        }
    }

    /// Uses an explicit file name instead of the prompt slug.
    pub fn with_filename(mut self, filename: impl Into<PathBuf>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Writes every image, in order.
    ///
    /// The directory is created first. Each file is written under a hidden
    /// temporary name and renamed into place, so no partial file ever
    /// appears under a final name. When image N fails, images before it
    /// stay on disk and the error is [`LuminaError::PartialWrite`].
    pub fn write_all(&self, images: &[GeneratedImage]) -> Result<Vec<OutputFile>> {
        self.write_with(images, |image, name| self.write_one(image, name))
    }

    fn write_with<F>(&self, images: &[GeneratedImage], mut write: F) -> Result<Vec<OutputFile>>
    where
        F: FnMut(&GeneratedImage, &str) -> std::io::Result<PathBuf>,
    {
        std::fs::create_dir_all(&self.dir).map_err(|source| LuminaError::Output {
            path: self.dir.clone(),
            source,
        })?;

        let mut written = Vec::with_capacity(images.len());
        for image in images {
            let name = self.file_name(image, images.len());
            match write(image, &name) {
                Ok(path) => {
                    tracing::debug!(path = %path.display(), bytes = image.size(), "saved image");
                    written.push(OutputFile {
                        path,
                        index: image.index,
                        size_bytes: image.size(),
                    });
                }
                Err(source) if written.is_empty() => {
                    return Err(LuminaError::Output {
                        path: self.dir.join(&name),
                        source,
                    })
                }
                Err(source) => {
                    return Err(LuminaError::PartialWrite {
                        written: written.into_iter().map(|f| f.path).collect(),
                        total: images.len(),
                        source,
                    })
                }
            }
        }

        Ok(written)
    }

    fn file_name(&self, image: &GeneratedImage, total: usize) -> String {
        let ext = image.format.extension();
        let n = image.index + 1;

        match &self.filename {
            Some(filename) => {
                let stem = filename
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("image");
                // The extension always names the bytes actually written.
                let ext = match filename.extension().and_then(|e| e.to_str()) {
                    Some(given) if ImageFormat::from_extension(given) == Some(image.format) => {
                        given
                    }
                    Some(given) => {
                        tracing::warn!(
                            requested = given,
                            actual = ext,
                            "file extension does not match image format, using .{ext}"
                        );
                        ext
                    }
                    None => ext,
                };
                if total == 1 {
                    format!("{stem}.{ext}")
                } else {
                    format!("{stem}_{n}.{ext}")
                }
            }
            None => format!("{}_{n}.{ext}", self.stem),
        }
    }

    fn write_one(&self, image: &GeneratedImage, name: &str) -> std::io::Result<PathBuf> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".lumina-")
            .suffix(".part")
            .tempfile_in(&self.dir)?;
        tmp.write_all(&image.data)?;
        tmp.as_file().sync_all()?;

        let mut target = unique_path(&self.dir, name);
        loop {
            match tmp.persist_noclobber(&target) {
                Ok(_) => return Ok(target),
                Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    // Lost a race for the name; take the next free one.
                    tmp = e.file;
                    target = unique_path(&self.dir, name);
                }
                Err(e) => return Err(e.error),
            }
        }
    }
}

/// `dir/name`, or `dir/stem-1.ext`, `dir/stem-2.ext`, ... if taken.
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let original = Path::new(name);
    let stem = original
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let extension = original.extension().and_then(|e| e.to_str());

    let mut counter = 1;
    loop {
        let candidate = match extension {
            Some(ext) => dir.join(format!("{stem}-{counter}.{ext}")),
            None => dir.join(format!("{stem}-{counter}")),
        };
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Lowercase ASCII slug of a prompt, safe as a file name stem.
fn slugify(prompt: &str) -> String {
    let mut slug = String::new();
    for c in prompt.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }

    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        "image".to_string()
    } else {
        slug.to_string()
    }
}
