use std::{path::Path, str::FromStr};

use file_format::FileFormat;
use infer::get_from_path as infer_from_path;
use mime::Mime;
use tree_magic_mini::from_filepath as magic_infer_from_filepath;

/// Sniff the mime type of a file from its contents.
pub fn infer_file_type(file: &Path) -> anyhow::Result<Mime> {
    let file = file.to_path_buf();
    let mime_type = infer_from_path(&file)?
        .map(|x| x.mime_type().to_string())
        .or_else(|| {
            FileFormat::from_file(&file)
                .ok()
                .filter(|x| *x != FileFormat::ArbitraryBinaryData && *x != FileFormat::Empty)
                .map(|x| x.media_type().to_string())
        })
        .or_else(|| magic_infer_from_filepath(&file).map(ToString::to_string))
        .ok_or_else(|| anyhow::anyhow!("Could not infer file type for file: {:?}", &file))?;

    Mime::from_str(&mime_type)
        .map_err(|e| anyhow::anyhow!("Failed to parse mime type: {:?}, error: {:?}", mime_type, e))
}

/// Guess the mime type of a file from its extension alone.
#[must_use]
pub fn mime_from_extension(file: &Path) -> Option<Mime> {
    let ext = file.extension()?.to_str()?.to_ascii_lowercase();

    let mime_type = match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "gif" => "image/gif",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "ogg" | "opus" => "audio/ogg",
        "wav" => "audio/wav",
        _ => return None,
    };

    Mime::from_str(mime_type).ok()
}
