//! Backend collaborators consumed by the job preparation core
//!
//! Implementations are injected as `Arc<dyn Storage>`. The core never touches a backend
//! directly, which lets tests substitute an in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, ErrorKind, Result};
use crate::url::{Content, Location};

/// Server-side encryption key bound to a path prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixKey {
    pub prefix: String,
    pub key: String,
}

/// Encryption keys indexed by alias.
pub type EncKeys = std::collections::HashMap<String, Vec<PrefixKey>>;

/// Whether (and when) directories are emitted by a listing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DirOpt {
    #[default]
    Never,
    First,
    Last,
}

#[derive(Clone, Debug, Default)]
pub struct ListOptions {
    pub recursive: bool,
    pub time_ref: Option<DateTime<Utc>>,
    pub show_dir: DirOpt,
    pub archive: bool,
}

#[derive(Clone, Debug, Default)]
pub struct StatOptions {
    pub version_id: Option<String>,
    pub follow_links: bool,
    pub enc_keys: std::sync::Arc<EncKeys>,
    pub time_ref: Option<DateTime<Utc>>,
    pub archive: bool,
}

/// Items of a listing. An `Err` item is a failure of one entry; the listing goes on.
pub type ListStream = BoxStream<'static, Result<Content>>;

/// A client bound to one source URL.
pub trait Client: Send + Sync {
    /// Alias-stripped location this client was created for.
    fn url(&self) -> &Location;

    /// Lazily enumerates the entries under [`Client::url`].
    fn list(&self, cancel: CancellationToken, options: ListOptions) -> ListStream;
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Splits `url` into its alias and the alias-stripped path.
    fn expand_alias(&self, url: &str) -> (String, String);

    async fn stat(
        &self,
        cancel: &CancellationToken,
        url: &str,
        options: &StatOptions,
    ) -> Result<Content>;

    /// Must return `false` for paths that do not exist.
    async fn is_dir(
        &self,
        cancel: &CancellationToken,
        url: &str,
        enc_keys: &EncKeys,
        time_ref: Option<DateTime<Utc>>,
    ) -> bool;

    fn client(&self, url: &str) -> Result<Box<dyn Client>>;

    /// Cheap existence check used for recursive sources: returns the first non-directory entry
    /// found under `url`.
    async fn probe(
        &self,
        cancel: &CancellationToken,
        url: &str,
        time_ref: Option<DateTime<Utc>>,
        archive: bool,
    ) -> Result<Content> {
        let client = self.client(url)?;
        let mut listing = client.list(
            cancel.clone(),
            ListOptions {
                recursive: true,
                time_ref,
                show_dir: DirOpt::Never,
                archive,
            },
        );
        let first = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::new(ErrorKind::Cancelled).trace("probe", [url])),
            first = listing.next() => first,
        };
        match first {
            Some(content) => content.map_err(|error| error.trace("probe", [url])),
            None => Err(Error::new(ErrorKind::NotFound(url.to_string())).trace("probe", [url])),
        }
    }
}
