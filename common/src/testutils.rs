use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::PrepareOptions;
use crate::error::{Error, ErrorKind, Result};
use crate::prepare::Job;
use crate::storage::{Client, EncKeys, ListOptions, ListStream, StatOptions, Storage};
use crate::url::{Content, EntryType, Location};

pub fn at(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap()
}

pub fn options(sources: &[&str], target: &str) -> PrepareOptions {
    PrepareOptions {
        sources: sources.iter().map(|source| source.to_string()).collect(),
        target: target.to_string(),
        ..Default::default()
    }
}

pub async fn drain(mut jobs: mpsc::Receiver<Job>) -> Vec<Job> {
    let mut all = Vec::new();
    while let Some(job) = jobs.recv().await {
        all.push(job);
    }
    all
}

#[derive(Clone, Debug)]
enum Kind {
    File { size: u64, version_id: Option<String> },
    Dir,
    Symlink,
    Broken,
}

#[derive(Clone, Debug)]
struct Entry {
    path: String,
    kind: Kind,
    time: DateTime<Utc>,
}

impl Entry {
    fn content(&self) -> Result<Content> {
        let (entry_type, size, version_id) = match &self.kind {
            Kind::File { size, version_id } => (EntryType::File, *size, version_id.clone()),
            Kind::Dir => (EntryType::Directory, 0, None),
            Kind::Symlink => (EntryType::Symlink, 0, None),
            Kind::Broken => {
                return Err(Error::new(ErrorKind::Backend(anyhow::anyhow!(
                    "{} is unreadable",
                    self.path
                ))));
            }
        };
        Ok(Content {
            location: Location::new(self.path.clone()),
            entry_type,
            size,
            time: self.time,
            version_id,
        })
    }
}

#[derive(Default)]
struct Counters {
    live_listings: AtomicUsize,
    items_listed: AtomicUsize,
}

struct ListingGuard(Arc<Counters>);

impl ListingGuard {
    fn new(counters: Arc<Counters>) -> Self {
        counters.live_listings.fetch_add(1, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for ListingGuard {
    fn drop(&mut self) {
        self.0.live_listings.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory backend keyed by slash-separated paths, listed in insertion order.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    alias: Option<String>,
    unreachable: Vec<String>,
    entries: Vec<Entry>,
    endless: Option<String>,
    counters: Arc<Counters>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// Any client created for a URL under `alias` fails.
    pub fn unreachable(mut self, alias: &str) -> Self {
        self.unreachable.push(alias.to_string());
        self
    }

    fn push(mut self, path: &str, kind: Kind, time: DateTime<Utc>) -> Self {
        self.entries.push(Entry {
            path: path.to_string(),
            kind,
            time,
        });
        self
    }

    pub fn file(self, path: &str, size: u64) -> Self {
        self.file_at(path, size, DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn file_at(self, path: &str, size: u64, time: DateTime<Utc>) -> Self {
        self.push(
            path,
            Kind::File {
                size,
                version_id: None,
            },
            time,
        )
    }

    pub fn versioned_file(self, path: &str, size: u64, version_id: &str) -> Self {
        self.push(
            path,
            Kind::File {
                size,
                version_id: Some(version_id.to_string()),
            },
            DateTime::<Utc>::UNIX_EPOCH,
        )
    }

    pub fn dir(self, path: &str) -> Self {
        self.push(path, Kind::Dir, DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn symlink(self, path: &str) -> Self {
        self.push(path, Kind::Symlink, DateTime::<Utc>::UNIX_EPOCH)
    }

    /// An entry whose stat and listing always fail.
    pub fn broken(self, path: &str) -> Self {
        self.push(path, Kind::Broken, DateTime::<Utc>::UNIX_EPOCH)
    }

    /// A directory whose listing never ends.
    pub fn endless(mut self, path: &str) -> Self {
        self.endless = Some(path.to_string());
        self
    }

    pub fn live_listings(&self) -> usize {
        self.counters.live_listings.load(Ordering::SeqCst)
    }

    pub fn items_listed(&self) -> usize {
        self.counters.items_listed.load(Ordering::SeqCst)
    }

    fn has_children(&self, path: &str) -> bool {
        let prefix = format!("{path}/");
        self.endless.as_deref() == Some(path)
            || self
                .entries
                .iter()
                .any(|entry| path.is_empty() || entry.path.starts_with(&prefix))
    }
}

fn trimmed(path: &str) -> &str {
    path.trim_end_matches('/')
}

#[async_trait]
impl Storage for MemoryStorage {
    fn expand_alias(&self, url: &str) -> (String, String) {
        if let Some((first, rest)) = url.split_once('/')
            && (self.alias.as_deref() == Some(first) || self.unreachable.iter().any(|a| a == first))
        {
            return (first.to_string(), rest.to_string());
        }
        (String::new(), url.to_string())
    }

    async fn stat(
        &self,
        _cancel: &CancellationToken,
        url: &str,
        options: &StatOptions,
    ) -> Result<Content> {
        let (_, path) = self.expand_alias(url);
        let path = trimmed(&path);
        if let Some(entry) = self.entries.iter().find(|entry| entry.path == path) {
            let content = entry.content().map_err(|error| error.trace("stat", [url]))?;
            if options.version_id.is_some() && options.version_id != content.version_id {
                return Err(Error::new(ErrorKind::NotFound(url.to_string())).trace("stat", [url]));
            }
            return Ok(content);
        }
        if self.has_children(path) {
            return Ok(Content {
                location: Location::new(path),
                entry_type: EntryType::Directory,
                size: 0,
                time: DateTime::<Utc>::UNIX_EPOCH,
                version_id: None,
            });
        }
        Err(Error::new(ErrorKind::NotFound(url.to_string())).trace("stat", [url]))
    }

    async fn is_dir(
        &self,
        _cancel: &CancellationToken,
        url: &str,
        _enc_keys: &EncKeys,
        _time_ref: Option<DateTime<Utc>>,
    ) -> bool {
        let (_, path) = self.expand_alias(url);
        let path = trimmed(&path);
        self.entries
            .iter()
            .any(|entry| entry.path == path && matches!(entry.kind, Kind::Dir))
            || self.has_children(path)
    }

    fn client(&self, url: &str) -> Result<Box<dyn Client>> {
        let (alias, path) = self.expand_alias(url);
        if self.unreachable.contains(&alias) {
            return Err(Error::new(ErrorKind::Backend(anyhow::anyhow!(
                "alias {alias} is unreachable"
            ))));
        }
        Ok(Box::new(MemoryClient {
            url: Location::new(path),
            storage: self.clone(),
        }))
    }
}

struct MemoryClient {
    url: Location,
    storage: MemoryStorage,
}

impl Client for MemoryClient {
    fn url(&self) -> &Location {
        &self.url
    }

    fn list(&self, cancel: CancellationToken, options: ListOptions) -> ListStream {
        let path = trimmed(&self.url.path).to_string();
        let counters = self.storage.counters.clone();
        if self.storage.endless.as_deref() == Some(path.as_str()) {
            let guard = ListingGuard::new(counters.clone());
            return futures::stream::unfold((0u64, guard), move |(index, guard)| {
                let cancel = cancel.clone();
                let counters = counters.clone();
                let path = path.clone();
                async move {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    counters.items_listed.fetch_add(1, Ordering::SeqCst);
                    let content = Content {
                        location: Location::new(format!("{path}/{index:08}")),
                        entry_type: EntryType::File,
                        size: 1,
                        time: DateTime::<Utc>::UNIX_EPOCH,
                        version_id: None,
                    };
                    Some((Ok(content), (index + 1, guard)))
                }
            })
            .boxed();
        }
        let prefix = format!("{path}/");
        let items: Vec<Result<Content>> = self
            .storage
            .entries
            .iter()
            .filter(|entry| {
                let below = if path.is_empty() {
                    Some(entry.path.as_str())
                } else if entry.path == path && !matches!(entry.kind, Kind::Dir) {
                    Some("")
                } else {
                    entry.path.strip_prefix(prefix.as_str())
                };
                match below {
                    Some(rest) => options.recursive || !rest.contains('/'),
                    None => false,
                }
            })
            .filter(|entry| options.time_ref.is_none_or(|time_ref| entry.time <= time_ref))
            .map(Entry::content)
            .collect();
        if items.is_empty() {
            let url = self.url.path.clone();
            return futures::stream::iter([Err(Error::new(ErrorKind::NotFound(url)))]).boxed();
        }
        let guard = ListingGuard::new(counters.clone());
        futures::stream::unfold((items.into_iter(), guard), move |(mut items, guard)| {
            let counters = counters.clone();
            async move {
                let item = items.next()?;
                counters.items_listed.fetch_add(1, Ordering::SeqCst);
                Some((item, (items, guard)))
            }
        })
        .boxed()
    }
}
