//! Bundle identifier resolution straight from an archive, without extracting it.

use super::{PayloadReader, open_payload_reader};
use crate::error::{Result, StapleError};
use std::io::Read;
use std::path::Path;

/// Extension of an application bundle directory.
pub const BUNDLE_EXTENSION: &str = "app";

/// Prefix used to synthesize an identifier for single-executable archives.
pub const PLACEHOLDER_BUNDLE_PREFIX: &str = "com.example.";

#[derive(Debug, serde::Deserialize)]
struct InfoPlist {
    #[serde(rename = "CFBundleIdentifier")]
    bundle_identifier: Option<String>,
}

/// True for entry names of the form `<Name>.app/Contents/Info.plist`.
///
/// Nested bundles and any extra path segment do not match.
pub fn is_bundle_descriptor(entry_name: &str) -> bool {
    let parts: Vec<&str> = entry_name.split('/').collect();
    match parts.as_slice() {
        // Plain suffix match; a segment named just `.app` counts too.
        [bundle, "Contents", "Info.plist"] => bundle
            .strip_suffix(BUNDLE_EXTENSION)
            .is_some_and(|rest| rest.ends_with('.')),
        _ => false,
    }
}

/// Placeholder identifier for an archive holding a single top-level file.
///
/// Applies only when exactly one entry was seen and its name has no `/`.
pub fn single_file_placeholder(entry_count: usize, last_entry: Option<&str>) -> Option<String> {
    match (entry_count, last_entry) {
        (1, Some(name)) if !name.is_empty() && !name.contains('/') => {
            Some(format!("{PLACEHOLDER_BUNDLE_PREFIX}{name}"))
        }
        _ => None,
    }
}

/// Finds the bundle identifier of the application inside the archive at `payload`.
pub fn find_primary_bundle_id(payload: &Path) -> Result<String> {
    let mut reader = open_payload_reader(payload)?;
    resolve_bundle_id(reader.as_mut(), payload)
}

/// Scans `reader` for the first bundle descriptor and returns its `CFBundleIdentifier`.
///
/// The first matching entry wins and nothing after it is opened. Without a
/// descriptor, a single-file archive yields [`single_file_placeholder`];
/// anything else is [`StapleError::DescriptorNotFound`]. `origin` names the
/// archive in errors.
pub fn resolve_bundle_id<R: PayloadReader + ?Sized>(reader: &mut R, origin: &Path) -> Result<String> {
    let mut count = 0usize;
    let mut last = None;

    while let Some(name) = reader.next_entry()? {
        count += 1;
        if is_bundle_descriptor(&name) {
            log::debug!("Reading bundle descriptor {}", name);
            let mut content = Vec::new();
            reader
                .open_entry()?
                .read_to_end(&mut content)
                .map_err(|source| StapleError::Fs {
                    action: format!("reading {name} from"),
                    path: origin.to_path_buf(),
                    source,
                })?;
            let info: InfoPlist = plist::from_bytes(&content)?;
            return info
                .bundle_identifier
                .ok_or(StapleError::MissingBundleIdentifier { descriptor: name });
        }
        last = Some(name);
    }

    if let Some(placeholder) = single_file_placeholder(count, last.as_deref()) {
        log::debug!(
            "{} holds a single file, assuming command line tool {}",
            origin.display(),
            placeholder
        );
        return Ok(placeholder);
    }

    Err(StapleError::DescriptorNotFound {
        path: origin.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const INFO_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleIdentifier</key>
    <string>ai.kodegen.app</string>
    <key>CFBundleExecutable</key>
    <string>Kodegen</string>
</dict>
</plist>"#;

    /// In-memory reader that records which entries were opened.
    struct ScriptedReader {
        entries: Vec<(String, Vec<u8>)>,
        position: Option<usize>,
        opened: Vec<String>,
    }

    impl ScriptedReader {
        fn new(entries: &[(&str, &[u8])]) -> Self {
            Self {
                entries: entries
                    .iter()
                    .map(|(name, content)| (name.to_string(), content.to_vec()))
                    .collect(),
                position: None,
                opened: Vec::new(),
            }
        }
    }

    impl PayloadReader for ScriptedReader {
        fn next_entry(&mut self) -> Result<Option<String>> {
            let next = self.position.map_or(0, |p| p + 1);
            self.position = Some(next);
            Ok(self.entries.get(next).map(|(name, _)| name.clone()))
        }

        fn open_entry(&mut self) -> Result<Box<dyn Read + '_>> {
            let (name, content) = self
                .position
                .and_then(|p| self.entries.get(p))
                .ok_or(StapleError::NoCurrentEntry)?;
            self.opened.push(name.clone());
            Ok(Box::new(Cursor::new(content.clone())))
        }
    }

    #[test]
    fn descriptor_predicate_requires_exactly_three_segments() {
        assert!(is_bundle_descriptor("Kodegen.app/Contents/Info.plist"));
        assert!(!is_bundle_descriptor("Kodegen.app/Contents/Info.plist/extra"));
        assert!(!is_bundle_descriptor("Payload/Kodegen.app/Contents/Info.plist"));
        assert!(!is_bundle_descriptor(
            "Kodegen.app/Contents/Frameworks/Helper.app/Contents/Info.plist"
        ));
        assert!(!is_bundle_descriptor("Kodegen/Contents/Info.plist"));
        assert!(!is_bundle_descriptor("Kodegen.app/Resources/Info.plist"));
        assert!(!is_bundle_descriptor("Kodegenapp/Contents/Info.plist"));
    }

    #[test]
    fn bare_bundle_suffix_is_a_descriptor() {
        assert!(is_bundle_descriptor(".app/Contents/Info.plist"));
        let plist: &[u8] = br#"<?xml version="1.0"?><plist version="1.0"><dict><key>CFBundleIdentifier</key><string>ai.kodegen.hidden</string></dict></plist>"#;
        let mut reader = ScriptedReader::new(&[
            (".app/", b""),
            (".app/Contents/Info.plist", plist),
        ]);
        assert_eq!(
            resolve_bundle_id(&mut reader, Path::new("hidden.zip")).unwrap(),
            "ai.kodegen.hidden"
        );
    }

    #[test]
    fn placeholder_only_for_single_flat_entry() {
        assert_eq!(
            single_file_placeholder(1, Some("kodegen")).as_deref(),
            Some("com.example.kodegen")
        );
        assert_eq!(single_file_placeholder(1, Some("bin/kodegen")), None);
        assert_eq!(single_file_placeholder(2, Some("kodegen")), None);
        assert_eq!(single_file_placeholder(0, None), None);
    }

    #[test]
    fn first_descriptor_wins_and_nothing_else_is_opened() {
        let mut reader = ScriptedReader::new(&[
            ("Kodegen.app/", b""),
            ("Kodegen.app/Contents/", b""),
            ("Kodegen.app/Contents/Info.plist", INFO_PLIST.as_bytes()),
            ("Other.app/Contents/Info.plist", b"not a plist"),
        ]);
        let id = resolve_bundle_id(&mut reader, Path::new("k.zip")).unwrap();
        assert_eq!(id, "ai.kodegen.app");
        assert_eq!(reader.opened, vec!["Kodegen.app/Contents/Info.plist"]);
    }

    #[test]
    fn single_entry_without_descriptor_gets_placeholder() {
        let mut reader = ScriptedReader::new(&[("kodegen", b"\x7fELF")]);
        let id = resolve_bundle_id(&mut reader, Path::new("k.zip")).unwrap();
        assert_eq!(id, "com.example.kodegen");
        assert!(reader.opened.is_empty());
    }

    #[test]
    fn multiple_entries_without_descriptor_fail() {
        let mut reader = ScriptedReader::new(&[("kodegen", b""), ("README", b"")]);
        let err = resolve_bundle_id(&mut reader, Path::new("k.zip")).unwrap_err();
        assert!(matches!(err, StapleError::DescriptorNotFound { .. }));
    }

    #[test]
    fn empty_archive_fails() {
        let mut reader = ScriptedReader::new(&[]);
        let err = resolve_bundle_id(&mut reader, Path::new("k.zip")).unwrap_err();
        assert!(matches!(err, StapleError::DescriptorNotFound { .. }));
    }

    #[test]
    fn descriptor_without_identifier_is_reported() {
        let plist: &[u8] = br#"<?xml version="1.0"?><plist version="1.0"><dict><key>CFBundleName</key><string>K</string></dict></plist>"#;
        let mut reader = ScriptedReader::new(&[("K.app/Contents/Info.plist", plist)]);
        let err = resolve_bundle_id(&mut reader, Path::new("k.zip")).unwrap_err();
        assert!(matches!(err, StapleError::MissingBundleIdentifier { .. }));
    }

    #[test]
    fn malformed_descriptor_is_plist_error() {
        let mut reader = ScriptedReader::new(&[("K.app/Contents/Info.plist", b"garbage")]);
        let err = resolve_bundle_id(&mut reader, Path::new("k.zip")).unwrap_err();
        assert!(matches!(err, StapleError::Plist(_)));
    }
}
