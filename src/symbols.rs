//! Pre-staged debug symbol extraction.
//!
//! Test hosts may carry a `mongo-debugsymbols.tgz` next to the binaries. Before
//! attaching debuggers, it is unpacked and the symbol files for the server
//! binaries are copied into the working directory so the debuggers pick them up.
//! The step is idempotent and best-effort: nothing here can fail the run.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, info, warn};

const SYMBOL_EXTS: [&str; 3] = ["debug", "dSYM", "pdb"];
const SYMBOL_BINARIES: [&str; 3] = ["mongo", "mongod", "mongos"];

#[derive(Debug, thiserror::Error)]
pub enum SymbolError {
    #[error("{0} is a zip archive; Windows debug symbols are not extracted, skipping")]
    Zip(PathBuf),

    #[error("{0} is not a gzip archive")]
    UnknownFormat(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Extracts `archive` into `dest`, logging instead of failing.
pub fn extract_debug_symbols(archive: &Path, dest: &Path) {
    debug!("Starting: Extract debug-symbols from {}.", archive.display());
    if !archive.exists() {
        info!(
            "Debug-symbols archive-file does not exist. Hang-Analyzer may not complete \
             successfully, or debug-symbols may already be extracted."
        );
        return;
    }

    match try_extract(archive, dest) {
        Ok(copied) => debug!(
            "Finished: Extract debug-symbols from {} ({} files copied).",
            archive.display(),
            copied
        ),
        Err(e) => warn!("Error when extracting {}: {}", archive.display(), e),
    }
}

/// Unpacks the archive and copies symbol files; returns how many were copied.
pub fn try_extract(archive: &Path, dest: &Path) -> Result<usize, SymbolError> {
    let mut magic = [0u8; 2];
    File::open(archive)?.read_exact(&mut magic)?;
    match magic {
        [0x1f, 0x8b] => {}
        [b'P', b'K'] => return Err(SymbolError::Zip(archive.to_path_buf())),
        _ => return Err(SymbolError::UnknownFormat(archive.to_path_buf())),
    }

    let mut tar = Archive::new(GzDecoder::new(File::open(archive)?));
    tar.unpack(dest)?;

    let mut copied = 0;
    for (src, target) in files_to_copy(dest) {
        if target.exists() {
            debug!(
                "Debug symbol {} already exists, not copying from {}.",
                target.display(),
                src.display()
            );
            continue;
        }
        copy_recursive(&src, &target)?;
        debug!("Copied debug symbol {}.", target.display());
        copied += 1;
    }
    Ok(copied)
}

/// `(dist-test/bin/<binary>.<ext>, <dest>/<binary>.<ext>)` pairs that exist.
fn files_to_copy(dest: &Path) -> Vec<(PathBuf, PathBuf)> {
    let bin = dest.join("dist-test").join("bin");
    let mut out = Vec::new();
    for ext in SYMBOL_EXTS {
        for binary in SYMBOL_BINARIES {
            let name = format!("{}.{}", binary, ext);
            let src = bin.join(&name);
            if src.exists() {
                out.push((src, dest.join(&name)));
            }
        }
    }
    out
}

/// `.dSYM` bundles are directories.
fn copy_recursive(src: &Path, dest: &Path) -> io::Result<()> {
    if src.is_dir() {
        fs::create_dir_all(dest)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dest.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        fs::copy(src, dest).map(|_| ())
    }
}
