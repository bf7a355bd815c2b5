//! Local filesystem backend
//!
//! Paths are resolved through an [`AliasTable`] first. Listings walk the tree lazily, one
//! directory at a time, with the entries of each directory sorted by name.

use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::alias::AliasTable;
use crate::error::{Error, ErrorKind, Result};
use crate::storage::{Client, DirOpt, EncKeys, ListOptions, ListStream, StatOptions, Storage};
use crate::url::{Content, EntryType, Location};

fn io_error(error: std::io::Error, path: &Path) -> Error {
    if error.kind() == std::io::ErrorKind::NotFound {
        Error::new(ErrorKind::NotFound(path.to_string_lossy().into_owned()))
    } else {
        Error::new(ErrorKind::Backend(
            anyhow::Error::from(error).context(format!("failed accessing {path:?}")),
        ))
    }
}

fn entry_type(file_type: std::fs::FileType) -> EntryType {
    if file_type.is_file() {
        EntryType::File
    } else if file_type.is_dir() {
        EntryType::Directory
    } else if file_type.is_symlink() {
        EntryType::Symlink
    } else {
        EntryType::Other
    }
}

fn content(path: &Path, metadata: &std::fs::Metadata, entry_type: EntryType) -> Content {
    Content {
        location: Location::with_separator(path.to_string_lossy(), MAIN_SEPARATOR),
        entry_type,
        size: if entry_type.is_regular() { metadata.len() } else { 0 },
        time: metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        version_id: None,
    }
}

#[derive(Clone, Debug, Default)]
pub struct LocalStorage {
    aliases: AliasTable,
}

impl LocalStorage {
    pub fn new(aliases: AliasTable) -> Self {
        Self { aliases }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn expand_alias(&self, url: &str) -> (String, String) {
        self.aliases.expand(url)
    }

    async fn stat(
        &self,
        _cancel: &CancellationToken,
        url: &str,
        options: &StatOptions,
    ) -> Result<Content> {
        if options.version_id.is_some() {
            return Err(
                Error::new(ErrorKind::NotSupported("version ids on a local filesystem"))
                    .trace("stat", [url]),
            );
        }
        if options.archive {
            return Err(
                Error::new(ErrorKind::NotSupported("archive browsing on a local filesystem"))
                    .trace("stat", [url]),
            );
        }
        let (_, path) = self.expand_alias(url);
        let path = PathBuf::from(path);
        let metadata = if options.follow_links {
            tokio::fs::metadata(&path).await
        } else {
            tokio::fs::symlink_metadata(&path).await
        };
        let metadata = metadata.map_err(|error| io_error(error, &path).trace("stat", [url]))?;
        Ok(content(&path, &metadata, entry_type(metadata.file_type())))
    }

    async fn is_dir(
        &self,
        _cancel: &CancellationToken,
        url: &str,
        _enc_keys: &EncKeys,
        _time_ref: Option<DateTime<Utc>>,
    ) -> bool {
        let (_, path) = self.expand_alias(url);
        tokio::fs::metadata(&path)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false)
    }

    fn client(&self, url: &str) -> Result<Box<dyn Client>> {
        let (_, path) = self.expand_alias(url);
        Ok(Box::new(LocalClient {
            url: Location::with_separator(path, MAIN_SEPARATOR),
        }))
    }
}

struct LocalClient {
    url: Location,
}

impl Client for LocalClient {
    fn url(&self) -> &Location {
        &self.url
    }

    fn list(&self, cancel: CancellationToken, options: ListOptions) -> ListStream {
        let walk = Walk {
            root: Some(PathBuf::from(&self.url.path)),
            stack: Vec::new(),
            cancel,
            options,
        };
        futures::stream::unfold(walk, |mut walk| async move {
            let item = walk.next_item().await?;
            Some((item, walk))
        })
        .boxed()
    }
}

struct Frame {
    entries: std::vec::IntoIter<PathBuf>,
    /// emitted once the directory is exhausted when listing with `DirOpt::Last`
    dir: Option<Content>,
}

struct Walk {
    root: Option<PathBuf>,
    stack: Vec<Frame>,
    cancel: CancellationToken,
    options: ListOptions,
}

async fn read_sorted(path: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(path)
        .await
        .map_err(|error| io_error(error, path))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|error| io_error(error, path))?
    {
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

impl Walk {
    async fn next_item(&mut self) -> Option<Result<Content>> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }
            if let Some(root) = self.root.take() {
                if let Some(item) = self.visit(root, true).await {
                    return Some(item);
                }
                continue;
            }
            let frame = self.stack.last_mut()?;
            match frame.entries.next() {
                Some(path) => {
                    if let Some(item) = self.visit(path, false).await {
                        return Some(item);
                    }
                }
                None => {
                    let frame = self.stack.pop()?;
                    if let Some(dir) = frame.dir {
                        return Some(Ok(dir));
                    }
                }
            }
        }
    }

    /// Returns the item to emit for `path`, if any, and descends into directories.
    async fn visit(&mut self, path: PathBuf, is_root: bool) -> Option<Result<Content>> {
        let mut metadata = match tokio::fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(error) => return Some(Err(io_error(error, &path))),
        };
        if metadata.file_type().is_symlink() {
            match tokio::fs::metadata(&path).await {
                Ok(target) if target.is_file() => {
                    return self.admit(content(&path, &target, EntryType::File));
                }
                // the listed root itself is always followed
                Ok(target) if is_root && target.is_dir() => metadata = target,
                Err(error) if is_root => return Some(Err(io_error(error, &path))),
                _ => return Some(Ok(content(&path, &metadata, EntryType::Symlink))),
            }
        }
        let file_type = metadata.file_type();
        if !file_type.is_dir() {
            return self.admit(content(&path, &metadata, entry_type(file_type)));
        }
        let dir = content(&path, &metadata, EntryType::Directory);
        if !is_root && !self.options.recursive {
            return Some(Ok(dir));
        }
        let entries = match read_sorted(&path).await {
            Ok(entries) => entries,
            Err(error) => return Some(Err(error)),
        };
        let (first, last) = match (is_root, self.options.show_dir) {
            (true, _) | (false, DirOpt::Never) => (None, None),
            (false, DirOpt::First) => (Some(dir), None),
            (false, DirOpt::Last) => (None, Some(dir)),
        };
        self.stack.push(Frame {
            entries: entries.into_iter(),
            dir: last,
        });
        first.map(Ok)
    }

    fn admit(&self, content: Content) -> Option<Result<Content>> {
        if let Some(time_ref) = self.options.time_ref
            && content.time > time_ref
        {
            tracing::trace!("omitting {:?} modified after {time_ref}", &content.location.path);
            return None;
        }
        Some(Ok(content))
    }
}
