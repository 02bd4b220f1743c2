use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{TodoError, TodoResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct FileId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileResource {
    pub id: FileId,
    pub name: String,
    #[serde(rename = "type")]
    pub mime: String,
    /// `data:` URL holding the file bytes.
    #[serde(rename = "url")]
    pub content_ref: String,
    #[serde(with = "super::timestamp")]
    pub uploaded_at: DateTime<Utc>,
}

impl FileResource {
    pub fn kind(&self) -> FileKind { FileKind::from_mime(&self.mime) }
}

#[derive(Debug, Clone)]
pub struct NewFileResource {
    pub name: String,
    pub mime: String,
    pub content_ref: String,
}

/// Uploaded files, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResourceStore {
    files: Vec<FileResource>,
    next_id: u64,
}

impl Default for FileResourceStore {
    fn default() -> Self { Self { files: Vec::new(), next_id: 1 } }
}

impl FileResourceStore {
    pub fn new() -> Self { Self::default() }

    /// Rebuilds a store from persisted parts. The counter is raised past every
    /// id already present so a stale or missing counter never hands out a live id.
    pub fn from_parts(files: Vec<FileResource>, next_id: u64) -> Self {
        let floor = files.iter().map(|f| f.id.0.saturating_add(1)).max().unwrap_or(1);
        Self { files, next_id: next_id.max(floor) }
    }

    /// Fails once the counter reaches `u64::MAX`, which is never handed out.
    pub fn add(&mut self, input: NewFileResource, now: DateTime<Utc>) -> TodoResult<FileResource> {
        let after = self.next_id.checked_add(1).ok_or(TodoError::IdsExhausted("file"))?;
        let file = FileResource {
            id: FileId(self.next_id),
            name: input.name,
            mime: input.mime,
            content_ref: input.content_ref,
            uploaded_at: now,
        };
        self.next_id = after;
        self.files.insert(0, file.clone());
        Ok(file)
    }

    pub fn remove(&mut self, id: FileId) -> Option<FileResource> {
        let pos = self.files.iter().position(|f| f.id == id)?;
        Some(self.files.remove(pos))
    }

    pub fn get(&self, id: FileId) -> Option<&FileResource> { self.files.iter().find(|f| f.id == id) }

    pub fn list(&self) -> &[FileResource] { &self.files }

    pub fn next_id(&self) -> u64 { self.next_id }

    pub fn len(&self) -> usize { self.files.len() }

    pub fn is_empty(&self) -> bool { self.files.is_empty() }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind { Document, Spreadsheet, Pdf, Image, Other }

impl FileKind {
    /// Substring match on the MIME type; the first matching rule wins.
    pub fn from_mime(mime: &str) -> Self {
        if mime.contains("word") || mime.contains("document") {
            Self::Document
        } else if mime.contains("excel") || mime.contains("spreadsheet") {
            Self::Spreadsheet
        } else if mime.contains("pdf") {
            Self::Pdf
        } else if mime.contains("image") {
            Self::Image
        } else {
            Self::Other
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Document => "📝",
            Self::Spreadsheet => "📊",
            Self::Pdf => "📄",
            Self::Image => "🖼️",
            Self::Other => "📎",
        }
    }
}

pub const ACCEPTED_EXTENSIONS: &[&str] = &["doc", "docx", "xls", "xlsx", "pdf", "jpg", "jpeg", "png"];

fn extension(name: &str) -> Option<String> {
    Path::new(name).extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase())
}

pub fn is_accepted_upload(name: &str) -> bool {
    extension(name).is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
}

pub fn guess_mime(name: &str) -> &'static str {
    match extension(name).as_deref() {
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("pdf") => "application/pdf",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn upload(name: &str) -> NewFileResource {
        NewFileResource { name: name.into(), mime: guess_mime(name).into(), content_ref: "data:,".into() }
    }

    #[test]
    fn add_assigns_ids_and_keeps_newest_first() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let mut store = FileResourceStore::new();
        let a = store.add(upload("a.pdf"), t0).unwrap();
        let b = store.add(upload("b.png"), t0 + Duration::minutes(1)).unwrap();
        assert_eq!(a.id, FileId(1));
        assert_eq!(b.id, FileId(2));
        assert_eq!(b.uploaded_at, t0 + Duration::minutes(1));
        let names: Vec<_> = store.list().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["b.png", "a.pdf"]);
    }

    #[test]
    fn remove_missing_is_a_no_op_and_ids_are_not_reused() {
        let now = Utc::now();
        let mut store = FileResourceStore::new();
        let a = store.add(upload("a.pdf"), now).unwrap();
        assert!(store.remove(FileId(42)).is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.remove(a.id).map(|f| f.id), Some(a.id));
        assert!(store.is_empty());
        assert_eq!(store.add(upload("c.pdf"), now).unwrap().id, FileId(2));
    }

    #[test]
    fn from_parts_raises_a_stale_counter() {
        let mut store = FileResourceStore::new();
        store.add(upload("a.pdf"), Utc::now()).unwrap();
        store.add(upload("b.pdf"), Utc::now()).unwrap();
        let rebuilt = FileResourceStore::from_parts(store.list().to_vec(), 1);
        assert_eq!(rebuilt.next_id(), 3);
        assert_eq!(FileResourceStore::from_parts(Vec::new(), 9).next_id(), 9);
    }

    #[test]
    fn the_last_id_is_never_handed_out() {
        let mut store = FileResourceStore::from_parts(Vec::new(), u64::MAX - 1);
        assert_eq!(store.add(upload("a.pdf"), Utc::now()).unwrap().id, FileId(u64::MAX - 1));
        assert_eq!(store.add(upload("b.pdf"), Utc::now()), Err(TodoError::IdsExhausted("file")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.next_id(), u64::MAX);
    }

    #[test]
    fn kind_follows_mime_substrings() {
        assert_eq!(FileKind::from_mime("application/msword"), FileKind::Document);
        assert_eq!(FileKind::from_mime("application/vnd.ms-excel"), FileKind::Spreadsheet);
        assert_eq!(FileKind::from_mime("application/pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_mime("image/png"), FileKind::Image);
        assert_eq!(FileKind::from_mime("text/plain"), FileKind::Other);
        assert_eq!(FileKind::Pdf.icon(), "📄");
    }

    #[test]
    fn only_picker_extensions_are_accepted() {
        assert!(is_accepted_upload("Report.PDF"));
        assert!(is_accepted_upload("scan.jpeg"));
        assert!(!is_accepted_upload("notes.txt"));
        assert!(!is_accepted_upload("README"));
        assert_eq!(guess_mime("photo.JPG"), "image/jpeg");
        assert_eq!(guess_mime("archive.zip"), "application/octet-stream");
    }
}
