// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Archive unpacking and tree copy, preserving executable bits and
//! symlink targets verbatim, per spec.md §4.5.

use std::fs::File;
use std::path::Path;

use super::Error;

/// Unpack a `tar.xz` or `tar.gz` stream into `dest`, validating the
/// leading bytes against the integrity sniff first (spec.md §4.4).
pub fn unpack(archive_path: &Path, format: &str, dest: &Path) -> Result<(), Error> {
    let magic = peek_magic(archive_path)?;
    if !crate::cache::sniff_archive(&magic) {
        return Err(Error::InvalidArchive);
    }

    let file = File::open(archive_path)?;

    match format {
        "tar.xz" => {
            let decoder = xz2::read::XzDecoder::new(file);
            tar::Archive::new(decoder).unpack(dest)?;
        }
        "tar.gz" | "tgz" => {
            let decoder = flate2::read::GzDecoder::new(file);
            tar::Archive::new(decoder).unpack(dest)?;
        }
        _ => {
            // Bare tar (used by the test-mode fixture path, which bypasses
            // the download/compression round-trip entirely).
            tar::Archive::new(file).unpack(dest)?;
        }
    }

    Ok(())
}

fn peek_magic(path: &Path) -> Result<Vec<u8>, Error> {
    use std::io::Read;
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; 512];
    let n = file.read(&mut buf)?;
    buf.truncate(n);
    Ok(buf)
}

/// Copy `src` into `dest` recursively, hard-linking when possible,
/// preserving the executable bit and recreating symlinks verbatim
/// rather than following them, per spec.md §4.5.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<(), Error> {
    fs_err::create_dir_all(dest)?;

    for entry in fs_err::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if file_type.is_symlink() {
            recreate_symlink(&src_path, &dest_path)?;
        } else if file_type.is_dir() {
            copy_tree(&src_path, &dest_path)?;
        } else {
            copy_file_preserving_mode(&src_path, &dest_path)?;
        }
    }

    Ok(())
}

fn recreate_symlink(src: &Path, dest: &Path) -> Result<(), Error> {
    let target = fs_err::read_link(src)?;
    if dest.exists() || dest.symlink_metadata().is_ok() {
        let _ = fs_err::remove_file(dest);
    }
    symlink(&target, dest)?;
    Ok(())
}

fn copy_file_preserving_mode(src: &Path, dest: &Path) -> Result<(), Error> {
    if fs_err::hard_link(src, dest).is_ok() {
        return Ok(());
    }

    fs_err::copy(src, dest)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs_err::metadata(src)?.permissions().mode();
        fs_err::set_permissions(dest, std::fs::Permissions::from_mode(mode))?;
    }

    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
