//! Markdown vault on disk: note creation and keyword retrieval.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::collaborators::{KnowledgeBase, NewNote, NoteStore, RetrievedChunk, SavedNote};
use crate::error::ServiceError;

const MAX_SLUG_CHARS: usize = 60;
const MAX_CHUNK_CHARS: usize = 1200;
const MAX_FILES_SCANNED: usize = 5000;
const MAX_NAME_SUFFIX: usize = 1000;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "what", "when", "where", "which", "who", "how", "did",
    "does", "about", "with", "that", "this", "from", "have", "has", "you", "your", "my", "our",
    "can", "could", "would", "should", "tell", "me", "any", "there",
];

/// A directory of markdown notes (Obsidian-style vault).
pub struct VaultNoteStore {
    root: PathBuf,
}

impl VaultNoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Lowercase ascii slug; falls back to "note".
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
        if slug.len() >= MAX_SLUG_CHARS {
            break;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "note".to_string()
    } else {
        slug
    }
}

/// Relative folder path with `..`, roots and prefixes removed.
fn safe_folder(folder: &str) -> PathBuf {
    Path::new(folder.trim())
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// Create `<slug>.md`, or `<slug>-N.md` for the first free N. The file is
/// created exclusively, so concurrent writers never share a path.
fn create_unique(dir: &Path, slug: &str) -> Result<(PathBuf, File), ServiceError> {
    for n in 1..=MAX_NAME_SUFFIX {
        let path = if n == 1 {
            dir.join(format!("{}.md", slug))
        } else {
            dir.join(format!("{}-{}.md", slug, n))
        };
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(ServiceError(format!("cannot create {}: {}", path.display(), e))),
        }
    }
    Err(ServiceError(format!(
        "too many notes named '{}' in {}",
        slug,
        dir.display()
    )))
}

fn render(note: &NewNote, now: DateTime<Utc>) -> String {
    let mut out = String::from("---\n");
    out.push_str(&format!("title: \"{}\"\n", note.title.replace('"', "'")));
    out.push_str(&format!("created: {}\n", now.to_rfc3339()));
    if !note.tags.is_empty() {
        out.push_str(&format!("tags: [{}]\n", note.tags.join(", ")));
    }
    out.push_str("---\n\n");
    out.push_str(&format!("# {}\n\n", note.title));
    out.push_str(note.content.trim());
    out.push('\n');
    out
}

impl NoteStore for VaultNoteStore {
    fn create_note(&self, note: NewNote, now: DateTime<Utc>) -> Result<SavedNote, ServiceError> {
        let folder = safe_folder(&note.folder);
        let dir = self.root.join(&folder);
        std::fs::create_dir_all(&dir)
            .map_err(|e| ServiceError(format!("cannot create {}: {}", dir.display(), e)))?;

        let slug = slugify(&note.title);
        let (path, mut file) = create_unique(&dir, &slug)?;
        file.write_all(render(&note, now).as_bytes())
            .map_err(|e| ServiceError(format!("cannot write {}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Note written");

        Ok(SavedNote {
            title: note.title,
            folder: folder.display().to_string(),
            path,
        })
    }
}

/// Lowercased, deduplicated query words worth matching on.
pub(crate) fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

fn markdown_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if hidden {
                continue;
            }
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|e| e == "md") {
                files.push(path);
                if files.len() >= MAX_FILES_SCANNED {
                    return files;
                }
            }
        }
    }
    files
}

fn search_vault(root: &Path, query: &str, limit: usize) -> Vec<RetrievedChunk> {
    let terms = query_terms(query);
    if terms.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<RetrievedChunk> = markdown_files(root)
        .into_iter()
        .filter_map(|path| {
            let text = std::fs::read_to_string(&path).ok()?;
            let lower = text.to_lowercase();
            let matched = terms.iter().filter(|t| lower.contains(t.as_str())).count();
            if matched == 0 {
                return None;
            }
            let occurrences: usize = terms.iter().map(|t| lower.matches(t.as_str()).count()).sum();
            let score = matched as f32 / terms.len() as f32 + (occurrences as f32).ln_1p() * 0.1;
            let source = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .display()
                .to_string();
            Some(RetrievedChunk {
                source,
                text: text.chars().take(MAX_CHUNK_CHARS).collect(),
                score,
            })
        })
        .collect();

    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.source.cmp(&b.source)));
    hits.truncate(limit);
    hits
}

#[async_trait]
impl KnowledgeBase for VaultNoteStore {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievedChunk>, ServiceError> {
        let root = self.root.clone();
        let query = query.to_string();
        let hits = tokio::task::spawn_blocking(move || search_vault(&root, &query, limit))
            .await
            .map_err(|e| ServiceError(format!("vault search failed: {}", e)))?;
        debug!(hits = hits.len(), "Vault searched");
        Ok(hits)
    }
}
