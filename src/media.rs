use std::path::{Component, Path, PathBuf};

use file_format::{FileFormat, Kind};

use crate::error::{AppError, AppResult, FieldError};

/// Subdirectory of the uploads directory that holds post images.
pub const POSTS_DIR: &str = "posts";

/// Formats a browser can show in an `<img>` tag.
const WEB_IMAGE_FORMATS: &[FileFormat] = &[
    FileFormat::GraphicsInterchangeFormat,
    FileFormat::PortableNetworkGraphics,
    FileFormat::AnimatedPortableNetworkGraphics,
    FileFormat::JointPhotographicExpertsGroup,
    FileFormat::Webp,
    FileFormat::Av1ImageFileFormat,
];

/// Recognize an image by its content rather than its name or declared type.
pub fn sniff_image(data: &[u8]) -> Option<FileFormat> {
    let format = FileFormat::from_bytes(data);
    (format.kind() == Kind::Image && WEB_IMAGE_FORMATS.contains(&format)).then_some(format)
}

pub fn invalid_image() -> FieldError {
    FieldError::new(
        "image",
        "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
    )
}

/// Write an uploaded image under `posts/` with a fresh name.
/// Returns the path relative to `uploads`.
pub fn store_image(uploads: &Path, data: &[u8]) -> AppResult<String> {
    let format = sniff_image(data).ok_or_else(|| AppError::Validation(vec![invalid_image()]))?;

    let dir = uploads.join(POSTS_DIR);
    std::fs::create_dir_all(&dir)?;
    let name = format!("{}.{}", uuid::Uuid::now_v7(), format.extension());
    std::fs::write(dir.join(&name), data)?;

    Ok(format!("{}/{}", POSTS_DIR, name))
}

/// Delete a stored upload that ended up with no post pointing at it.
pub fn discard(uploads: &Path, relative: &str) {
    let Some(path) = resolve(uploads, relative) else {
        return;
    };
    if let Err(e) = std::fs::remove_file(&path) {
        tracing::warn!("Failed to remove orphaned upload {}: {}", path.display(), e);
    }
}

/// Map a request path onto a file inside `uploads`, refusing anything that could escape it.
pub fn resolve(uploads: &Path, relative: &str) -> Option<PathBuf> {
    let rel = Path::new(relative);
    if relative.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(uploads.join(rel))
}
