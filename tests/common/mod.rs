//! Shared fixtures for integration tests.

#![allow(dead_code)]

use kodegen_bundler_staple::{Result, StapleError, Toolchain};
use std::ffi::OsStr;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Ticket content written by [`FakeToolchain::staple`].
pub const TICKET: &[u8] = b"notarization-ticket";

/// Entry the fake stapler writes inside a bundle.
pub const TICKET_ENTRY: &str = "Contents/CodeResources";

/// In-process toolchain built on the `zip` crate.
#[derive(Debug, Default)]
pub struct FakeToolchain {
    reject_signature: bool,
    fail_staple: bool,
    fail_compress: bool,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeToolchain {
    /// Toolchain whose verifier accepts everything.
    pub fn accepting() -> Self {
        Self::default()
    }

    /// Toolchain whose verifier rejects everything.
    pub fn rejecting() -> Self {
        Self {
            reject_signature: true,
            ..Self::default()
        }
    }

    /// Toolchain whose stapler exits with status 65, as `xcrun stapler` does for an unnotarized bundle.
    pub fn failing_staple() -> Self {
        Self {
            fail_staple: true,
            ..Self::default()
        }
    }

    /// Toolchain whose compressor leaves a truncated archive behind and fails.
    pub fn failing_compress() -> Self {
        Self {
            fail_compress: true,
            ..Self::default()
        }
    }

    /// Operations invoked so far, oldest first.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

fn archive_error(path: &Path) -> impl FnOnce(zip::result::ZipError) -> StapleError + '_ {
    move |source| StapleError::ArchiveRead {
        path: path.to_path_buf(),
        source,
    }
}

impl Toolchain for FakeToolchain {
    async fn decompress(&self, archive: &Path, output_dir: &Path) -> Result<()> {
        self.record("decompress");
        assert!(archive.is_absolute(), "archive path must be absolute");
        let mut zip = ZipArchive::new(File::open(archive)?).map_err(archive_error(archive))?;
        zip.extract(output_dir).map_err(archive_error(archive))
    }

    async fn compress(
        &self,
        working_dir: &Path,
        archive_name: &OsStr,
        entry_name: &OsStr,
    ) -> Result<()> {
        self.record("compress");
        let archive = working_dir.join(archive_name);
        if self.fail_compress {
            std::fs::write(&archive, b"PK\x03\x04")?;
            return Err(StapleError::CommandFailed {
                command: "zip".to_string(),
                code: Some(12),
            });
        }
        let mut zip = ZipWriter::new(File::create(&archive)?);
        let walker = walkdir::WalkDir::new(working_dir.join(entry_name)).sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(working_dir)
                .expect("walked path is under working dir");
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if entry.file_type().is_dir() {
                zip.add_directory(name, SimpleFileOptions::default())
                    .map_err(archive_error(&archive))?;
            } else if entry.file_type().is_file() {
                let options = SimpleFileOptions::default().unix_permissions(mode(entry.path()));
                zip.start_file(name, options)
                    .map_err(archive_error(&archive))?;
                zip.write_all(&std::fs::read(entry.path())?)?;
            }
        }
        zip.finish().map_err(archive_error(&archive))?;
        Ok(())
    }

    async fn staple(&self, bundle: &Path) -> Result<()> {
        self.record("staple");
        if self.fail_staple {
            return Err(StapleError::CommandFailed {
                command: "xcrun stapler staple".to_string(),
                code: Some(65),
            });
        }
        std::fs::write(bundle.join(TICKET_ENTRY), TICKET)?;
        Ok(())
    }

    async fn verify(&self, path: &Path) -> Result<()> {
        self.record("verify");
        assert!(path.exists(), "verified path must exist");
        if self.reject_signature {
            return Err(StapleError::VerificationFailed {
                path: path.to_path_buf(),
                output: format!("{}: invalid signature", path.display()),
            });
        }
        Ok(())
    }
}

#[cfg(unix)]
fn mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).unwrap().permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode(_path: &Path) -> u32 {
    0o644
}

/// Minimal Info.plist declaring `bundle_id`.
pub fn info_plist(bundle_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleIdentifier</key>
    <string>{bundle_id}</string>
    <key>CFBundleExecutable</key>
    <string>App</string>
</dict>
</plist>"#
    )
}

/// One fixture archive entry; names ending in `/` are directories.
pub struct Entry<'a> {
    pub name: &'a str,
    pub content: &'a [u8],
    pub mode: u32,
}

impl<'a> Entry<'a> {
    pub fn dir(name: &'a str) -> Self {
        Self {
            name,
            content: b"",
            mode: 0o755,
        }
    }

    pub fn file(name: &'a str, content: &'a [u8]) -> Self {
        Self {
            name,
            content,
            mode: 0o644,
        }
    }

    pub fn executable(name: &'a str, content: &'a [u8]) -> Self {
        Self {
            name,
            content,
            mode: 0o755,
        }
    }
}

/// Writes a ZIP archive at `path` with `entries` in order.
pub fn write_zip(path: &Path, entries: &[Entry<'_>]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for entry in entries {
        let options = SimpleFileOptions::default().unix_permissions(entry.mode);
        if entry.name.ends_with('/') {
            zip.add_directory(entry.name, options).unwrap();
        } else {
            zip.start_file(entry.name, options).unwrap();
            zip.write_all(entry.content).unwrap();
        }
    }
    zip.finish().unwrap();
}

/// Writes `<dir>/App.zip` holding a signed-looking `App.app`.
pub fn app_zip(dir: &Path, bundle_id: &str) -> PathBuf {
    let path = dir.join("App.zip");
    let plist = info_plist(bundle_id);
    write_zip(
        &path,
        &[
            Entry::dir("App.app/"),
            Entry::dir("App.app/Contents/"),
            Entry::file("App.app/Contents/Info.plist", plist.as_bytes()),
            Entry::dir("App.app/Contents/MacOS/"),
            Entry::executable("App.app/Contents/MacOS/App", b"\xcf\xfa\xed\xfe"),
        ],
    );
    path
}

/// Creates `<dir>/App.app` on disk and returns its path.
pub fn app_bundle_dir(dir: &Path, bundle_id: &str) -> PathBuf {
    let bundle = dir.join("App.app");
    std::fs::create_dir_all(bundle.join("Contents/MacOS")).unwrap();
    std::fs::write(bundle.join("Contents/Info.plist"), info_plist(bundle_id)).unwrap();
    std::fs::write(bundle.join("Contents/MacOS/App"), b"\xcf\xfa\xed\xfe").unwrap();
    bundle
}

/// Entry names of the archive at `path`, in stored order.
pub fn zip_names(path: &Path) -> Vec<String> {
    let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..zip.len())
        .map(|i| zip.by_index_raw(i).unwrap().name().to_string())
        .collect()
}

/// Content of `name` inside the archive at `path`.
pub fn zip_entry(path: &Path, name: &str) -> Vec<u8> {
    let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut content = Vec::new();
    zip.by_name(name).unwrap().read_to_end(&mut content).unwrap();
    content
}

/// True when `dir` has no entries left.
pub fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}
