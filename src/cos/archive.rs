use std::fs::File;
use std::io;
use std::path::Path;

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::CosError;

/// Zips the contents of `src` (not `src` itself) into `dest`. Returns the number of files written.
pub fn zip_dir(src: &Path, dest: &Path) -> Result<usize, CosError> {
    let file = File::create(dest).map_err(|e| CosError::io(dest, e))?;
    let mut zip = ZipWriter::new(file);

    let mut files = 0;
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| CosError::Archive(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", name), file_options(0o700))?;
        } else if entry.file_type().is_file() {
            zip.start_file(name, file_options(0o600))?;
            let mut source = File::open(entry.path()).map_err(|e| CosError::io(entry.path(), e))?;
            io::copy(&mut source, &mut zip).map_err(|e| CosError::io(entry.path(), e))?;
            files += 1;
        }
    }

    zip.finish()?;
    tracing::debug!(src = %src.display(), dest = %dest.display(), files, "directory archived");
    Ok(files)
}

// TKE files hold signature keys and master key parts
fn file_options(mode: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(mode)
}

/// Extracts `archive` into `dest`, creating it when needed.
pub fn unzip(archive: &Path, dest: &Path) -> Result<usize, CosError> {
    let file = File::open(archive).map_err(|e| CosError::io(archive, e))?;
    let mut zip = ZipArchive::new(file)?;
    std::fs::create_dir_all(dest).map_err(|e| CosError::io(dest, e))?;
    let entries = zip.len();
    zip.extract(dest)?;
    tracing::debug!(archive = %archive.display(), dest = %dest.display(), entries, "archive extracted");
    Ok(entries)
}
