//! Managed file registry.
//!
//! Uploaded files are written under the public or private storage root and
//! tracked in `{DATA_DIR}/files.json`. A file starts out `temporary` and is
//! made `permanent` once something references it (an ingestion run or the
//! site settings).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use intake_core::persist::JsonFile;
use intake_core::IntakeError;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("{0}")]
    InvalidUpload(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("file storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file registry error: {0}")]
    Registry(#[from] IntakeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Temporary,
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedFile {
    pub id: Uuid,
    /// `{scheme}://{relative path}`, e.g. `public://contacts.csv`.
    pub uri: String,
    pub visibility: Visibility,
    pub status: FileStatus,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl ManagedFile {
    /// Path relative to the storage root.
    pub fn relative_path(&self) -> &str {
        self.uri
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.uri)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileIndex {
    files: Vec<ManagedFile>,
}

pub struct FileRegistry {
    index: JsonFile,
    public_dir: PathBuf,
    private_dir: PathBuf,
    base_url: String,
}

impl FileRegistry {
    pub fn open(
        data_dir: &Path,
        public_dir: &Path,
        private_dir: &Path,
        base_url: &str,
    ) -> Result<Self, FileError> {
        let index = JsonFile::new(data_dir.join("files.json"));
        let state: FileIndex = index.read()?;
        std::fs::create_dir_all(public_dir)?;
        std::fs::create_dir_all(private_dir)?;
        info!(
            files = state.files.len(),
            "file registry opened at {}",
            index.path().display()
        );
        Ok(Self {
            index,
            public_dir: public_dir.to_path_buf(),
            private_dir: private_dir.to_path_buf(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn files(&self) -> Result<Vec<ManagedFile>, FileError> {
        let state: FileIndex = self.index.read()?;
        Ok(state.files)
    }

    fn root(&self, visibility: Visibility) -> &Path {
        match visibility {
            Visibility::Public => &self.public_dir,
            Visibility::Private => &self.private_dir,
        }
    }

    /// Write `bytes` under the storage root for `visibility` and register the
    /// file as temporary. An existing file at the same location is replaced
    /// and keeps its id.
    pub fn save(
        &self,
        visibility: Visibility,
        subdir: Option<&str>,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<ManagedFile, FileError> {
        let name = sanitize_file_name(file_name)
            .ok_or_else(|| FileError::InvalidUpload("Invalid file name.".to_string()))?;
        let relative = match subdir {
            Some(dir) => format!("{}/{}", dir.trim_matches('/'), name),
            None => name,
        };
        let path = self.root(visibility).join(&relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;

        let uri = format!("{}://{}", visibility.scheme(), relative);
        let size = bytes.len() as u64;
        let file = self.index.update(|state: &mut FileIndex| -> Result<ManagedFile, FileError> {
            Ok(match state.files.iter_mut().find(|f| f.uri == uri) {
                Some(existing) => {
                    existing.size = size;
                    existing.created_at = Utc::now();
                    existing.clone()
                }
                None => {
                    let file = ManagedFile {
                        id: Uuid::new_v4(),
                        uri,
                        visibility,
                        status: FileStatus::Temporary,
                        size,
                        created_at: Utc::now(),
                    };
                    state.files.push(file.clone());
                    file
                }
            })
        })?;
        debug!(file_id = %file.id, uri = %file.uri, size = file.size, "file saved");
        Ok(file)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<ManagedFile>, FileError> {
        Ok(self.files()?.into_iter().find(|f| f.id == id))
    }

    pub fn find_by_uri(&self, uri: &str) -> Result<Option<ManagedFile>, FileError> {
        Ok(self.files()?.into_iter().find(|f| f.uri == uri))
    }

    /// Resolve a previously issued public URL back to its file. Only the
    /// percent-decoded basename of the URL path is used, looked up at the
    /// public root.
    pub fn resolve_url(&self, file_url: &str) -> Result<Option<ManagedFile>, FileError> {
        let basename = match url::Url::parse(file_url) {
            Ok(parsed) => {
                let last = parsed.path().rsplit('/').next().unwrap_or_default();
                match urlencoding::decode(last) {
                    Ok(decoded) => decoded.into_owned(),
                    Err(_) => return Ok(None),
                }
            }
            Err(_) => file_url.rsplit('/').next().unwrap_or_default().to_string(),
        };
        if basename.is_empty() {
            return Ok(None);
        }
        self.find_by_uri(&format!("public://{}", basename))
    }

    pub fn set_permanent(&self, id: Uuid) -> Result<ManagedFile, FileError> {
        self.index.update(|state: &mut FileIndex| {
            let file = state
                .files
                .iter_mut()
                .find(|f| f.id == id)
                .ok_or_else(|| FileError::NotFound(id.to_string()))?;
            file.status = FileStatus::Permanent;
            Ok(file.clone())
        })
    }

    /// Absolute filesystem path of a registered file.
    pub fn path_of(&self, file: &ManagedFile) -> PathBuf {
        self.root(file.visibility).join(file.relative_path())
    }

    /// Absolute URL for a registered file, with each path segment
    /// percent-encoded.
    pub fn url_of(&self, file: &ManagedFile) -> String {
        let prefix: &[&str] = match file.visibility {
            Visibility::Public => &["files"],
            Visibility::Private => &["system", "files"],
        };
        let segments = prefix
            .iter()
            .copied()
            .chain(file.relative_path().split('/'));

        let mut url = match url::Url::parse(&self.base_url) {
            Ok(url) => url,
            Err(_) => return self.joined_url(segments),
        };
        match url.path_segments_mut() {
            Ok(mut path) => {
                path.pop_if_empty().extend(segments);
            }
            Err(()) => return self.joined_url(segments),
        }
        url.to_string()
    }

    /// Fallback for a base URL the `url` crate cannot take path segments on.
    fn joined_url<'a>(&self, segments: impl Iterator<Item = &'a str>) -> String {
        let encoded: Vec<String> = segments
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        format!("{}/{}", self.base_url, encoded.join("/"))
    }
}

/// Keep only the final path component and reject names that would escape
/// the storage root.
fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base == "." || base == ".." || base.contains('\0') {
        return None;
    }
    Some(base.to_string())
}

/// Lower-cased extension of a client-supplied file name.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(dir: &Path) -> FileRegistry {
        FileRegistry::open(
            dir,
            &dir.join("files/public"),
            &dir.join("files/private"),
            "http://localhost:3001/",
        )
        .unwrap()
    }

    #[test]
    fn test_save_registers_temporary_file() {
        let tmp = tempfile::tempdir().unwrap();
        let files = registry(tmp.path());

        let file = files.save(Visibility::Public, None, "contacts.csv", b"a,b,c,d\n").unwrap();
        assert_eq!(file.uri, "public://contacts.csv");
        assert_eq!(file.status, FileStatus::Temporary);
        assert_eq!(file.size, 8);
        assert!(files.path_of(&file).exists());
        assert_eq!(files.url_of(&file), "http://localhost:3001/files/contacts.csv");
    }

    #[test]
    fn test_resave_replaces_and_keeps_id() {
        let tmp = tempfile::tempdir().unwrap();
        let files = registry(tmp.path());
        let first = files.save(Visibility::Public, None, "c.csv", b"one").unwrap();
        let second = files.save(Visibility::Public, None, "c.csv", b"three").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(std::fs::read(files.path_of(&second)).unwrap(), b"three");
    }

    #[test]
    fn test_resolve_url_uses_basename() {
        let tmp = tempfile::tempdir().unwrap();
        let files = registry(tmp.path());
        let file = files.save(Visibility::Public, None, "contacts.csv", b"x").unwrap();

        let url = files.url_of(&file);
        assert_eq!(files.resolve_url(&url).unwrap(), Some(file.clone()));
        assert_eq!(
            files.resolve_url("https://elsewhere.example/any/dir/contacts.csv").unwrap(),
            Some(file)
        );
        assert!(files.resolve_url("http://localhost:3001/files/missing.csv").unwrap().is_none());
        assert!(files.resolve_url("http://localhost:3001/").unwrap().is_none());
    }

    #[test]
    fn test_url_encodes_names_and_resolves_back() {
        let tmp = tempfile::tempdir().unwrap();
        let files = registry(tmp.path());
        let file = files.save(Visibility::Public, None, "my contacts é.csv", b"x").unwrap();

        let url = files.url_of(&file);
        assert_eq!(url, "http://localhost:3001/files/my%20contacts%20%C3%A9.csv");
        assert_eq!(files.resolve_url(&url).unwrap(), Some(file.clone()));
        // Clients that send the name unencoded still resolve.
        assert_eq!(
            files.resolve_url("http://localhost:3001/files/my contacts é.csv").unwrap(),
            Some(file)
        );
    }

    #[test]
    fn test_registries_on_one_directory_share_the_index() {
        let tmp = tempfile::tempdir().unwrap();
        let first = registry(tmp.path());
        let second = registry(tmp.path());

        let a = first.save(Visibility::Public, None, "a.csv", b"a").unwrap();
        let b = second.save(Visibility::Public, None, "b.csv", b"b").unwrap();
        second.set_permanent(a.id).unwrap();

        assert_eq!(first.get(a.id).unwrap().unwrap().status, FileStatus::Permanent);
        assert!(first.get(b.id).unwrap().is_some());
    }

    #[test]
    fn test_private_files_use_system_path() {
        let tmp = tempfile::tempdir().unwrap();
        let files = registry(tmp.path());
        let file = files
            .save(Visibility::Private, Some("uploads"), "logo.png", b"png")
            .unwrap();
        assert_eq!(file.uri, "private://uploads/logo.png");
        assert_eq!(files.url_of(&file), "http://localhost:3001/system/files/uploads/logo.png");
        assert!(tmp.path().join("files/private/uploads/logo.png").exists());
    }

    #[test]
    fn test_set_permanent_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let id = {
            let files = registry(tmp.path());
            let file = files.save(Visibility::Public, None, "c.csv", b"x").unwrap();
            files.set_permanent(file.id).unwrap();
            file.id
        };
        let files = registry(tmp.path());
        assert_eq!(files.get(id).unwrap().unwrap().status, FileStatus::Permanent);
        assert!(matches!(files.set_permanent(Uuid::new_v4()), Err(FileError::NotFound(_))));
    }

    #[test]
    fn test_path_components_are_stripped() {
        let tmp = tempfile::tempdir().unwrap();
        let files = registry(tmp.path());
        let file = files.save(Visibility::Public, None, "../../etc/passwd.csv", b"x").unwrap();
        assert_eq!(file.uri, "public://passwd.csv");
        assert!(files.save(Visibility::Public, None, "..", b"x").is_err());
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert_eq!(extension_of("DATA.CSV").as_deref(), Some("csv"));
        assert_eq!(extension_of("notes"), None);
    }
}
