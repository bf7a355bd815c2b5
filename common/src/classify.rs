//! Classification of a copy invocation into one of the four canonical shapes
//!
//! ```text
//! A: copy(f, f)        -> copy(f, f)
//! B: copy(f, d)        -> copy(f, d/f)          -> A
//! C: copy(d1..., d2)   -> []copy(f, d2/d1/f)    -> []A
//! D: copy([]f, d)      -> []C
//! ```
//!
//! Invalid combinations (`copy(d, f)`, `copy(d..., f)`, `copy([](f|d)..., f)`) are reported as
//! an `ErrorKind::InvalidArgument` error.

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::PrepareOptions;
use crate::error::{Error, ErrorKind, Result};
use crate::storage::{StatOptions, Storage};
use crate::url::Content;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Type A: a single file copied to a file path.
    SingleFile { version_id: Option<String> },
    /// Type B: a single file copied into an existing directory.
    FileIntoDir { version_id: Option<String> },
    /// Type C: a directory (or any source under `--recursive`) copied into a directory.
    Recursive,
    /// Type D: multiple sources copied into an existing directory.
    MultiSource,
}

/// The classification rule, free of any I/O.
///
/// `source` is the probe result for the single source and is ignored when `sources > 1`.
/// `target_is_dir` is only consulted when the outcome depends on it.
pub fn decide(
    sources: usize,
    recursive: bool,
    source: Option<&Content>,
    target_is_dir: bool,
) -> std::result::Result<Classification, ErrorKind> {
    match sources {
        0 => Err(ErrorKind::InvalidArgument),
        1 => {
            let Some(source) = source else {
                return Err(ErrorKind::InvalidArgument);
            };
            if source.entry_type.is_dir() || recursive {
                Ok(Classification::Recursive)
            } else if target_is_dir {
                Ok(Classification::FileIntoDir {
                    version_id: source.version_id.clone(),
                })
            } else {
                Ok(Classification::SingleFile {
                    version_id: source.version_id.clone(),
                })
            }
        }
        _ if target_is_dir => Ok(Classification::MultiSource),
        _ => Err(ErrorKind::InvalidArgument),
    }
}

/// Probes the sources and target of `options` and classifies the invocation.
#[instrument(skip(storage, cancel, options), fields(sources = ?options.sources, target = %options.target))]
pub async fn classify(
    storage: &dyn Storage,
    cancel: &CancellationToken,
    options: &PrepareOptions,
) -> Result<Classification> {
    if let [source_url] = options.sources.as_slice() {
        let probed = if options.recursive {
            storage
                .probe(cancel, source_url, options.time_ref, options.archive)
                .await
        } else {
            storage
                .stat(
                    cancel,
                    source_url,
                    &StatOptions {
                        version_id: options.version_id.clone(),
                        follow_links: false,
                        enc_keys: options.enc_keys.clone(),
                        time_ref: options.time_ref,
                        archive: options.archive,
                    },
                )
                .await
        };
        let source = probed.map_err(|error| error.trace("classify", [source_url.as_str()]))?;
        let target_is_dir = if source.entry_type.is_dir() || options.recursive {
            false
        } else {
            storage
                .is_dir(cancel, &options.target, &options.enc_keys, options.time_ref)
                .await
        };
        let classification = decide(1, options.recursive, Some(&source), target_is_dir)
            .map_err(|kind| Error::new(kind).trace("classify", [source_url.as_str()]))?;
        tracing::debug!("classified as {:?}", &classification);
        return Ok(classification);
    }
    let target_is_dir = !options.sources.is_empty()
        && storage
            .is_dir(cancel, &options.target, &options.enc_keys, options.time_ref)
            .await;
    let classification =
        decide(options.sources.len(), options.recursive, None, target_is_dir).map_err(|kind| {
            Error::new(kind).trace("classify", options.sources.iter().map(String::as_str))
        })?;
    tracing::debug!("classified as {:?}", &classification);
    Ok(classification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{MemoryStorage, options};
    use tracing_test::traced_test;

    fn content(entry_type: crate::url::EntryType, version_id: Option<&str>) -> Content {
        Content {
            location: crate::url::Location::new("x"),
            entry_type,
            size: 1,
            time: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
            version_id: version_id.map(str::to_string),
        }
    }

    #[test]
    fn decide_is_a_pure_function_of_its_inputs() {
        use crate::url::EntryType::*;
        let file = content(File, Some("v1"));
        let dir = content(Directory, None);
        let single = |v: Option<&str>| Classification::SingleFile {
            version_id: v.map(str::to_string),
        };
        let into = |v: Option<&str>| Classification::FileIntoDir {
            version_id: v.map(str::to_string),
        };
        assert_eq!(decide(1, false, Some(&file), false).unwrap(), single(Some("v1")));
        assert_eq!(decide(1, false, Some(&file), true).unwrap(), into(Some("v1")));
        for target_is_dir in [false, true] {
            assert_eq!(
                decide(1, false, Some(&dir), target_is_dir).unwrap(),
                Classification::Recursive
            );
            assert_eq!(
                decide(1, true, Some(&file), target_is_dir).unwrap(),
                Classification::Recursive
            );
        }
        assert_eq!(decide(3, false, None, true).unwrap(), Classification::MultiSource);
        assert!(matches!(
            decide(2, true, None, false),
            Err(ErrorKind::InvalidArgument)
        ));
        assert!(matches!(decide(0, false, None, true), Err(ErrorKind::InvalidArgument)));
        // identical inputs, identical outcome
        assert_eq!(
            decide(1, false, Some(&file), true).unwrap(),
            decide(1, false, Some(&file), true).unwrap()
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn single_file_to_new_path_is_type_a() {
        let storage = MemoryStorage::new().file("src/file.txt", 3);
        let result = classify(&storage, &CancellationToken::new(), &options(&["src/file.txt"], "dst/new.txt"))
            .await
            .unwrap();
        assert_eq!(result, Classification::SingleFile { version_id: None });
    }

    #[tokio::test]
    async fn single_file_over_existing_file_is_type_a() {
        let storage = MemoryStorage::new()
            .file("src/file.txt", 3)
            .file("dst/existing.txt", 1);
        let result = classify(
            &storage,
            &CancellationToken::new(),
            &options(&["src/file.txt"], "dst/existing.txt"),
        )
        .await
        .unwrap();
        assert_eq!(result, Classification::SingleFile { version_id: None });
    }

    #[tokio::test]
    async fn single_file_into_existing_dir_is_type_b_with_version() {
        let storage = MemoryStorage::new()
            .versioned_file("src/file.txt", 3, "v7")
            .file("dst/other.txt", 1);
        let result = classify(&storage, &CancellationToken::new(), &options(&["src/file.txt"], "dst"))
            .await
            .unwrap();
        assert_eq!(
            result,
            Classification::FileIntoDir {
                version_id: Some("v7".to_string())
            }
        );
    }

    #[tokio::test]
    async fn recursion_wins_over_literal_file() {
        let storage = MemoryStorage::new().file("src/file.txt", 3).file("dst/x", 1);
        let mut opts = options(&["src/file.txt"], "dst");
        opts.recursive = true;
        let result = classify(&storage, &CancellationToken::new(), &opts).await.unwrap();
        assert_eq!(result, Classification::Recursive);
    }

    #[tokio::test]
    async fn directory_source_is_type_c_regardless_of_target() {
        let storage = MemoryStorage::new().file("src/dir/a.txt", 3);
        let result = classify(&storage, &CancellationToken::new(), &options(&["src/dir"], "nowhere"))
            .await
            .unwrap();
        assert_eq!(result, Classification::Recursive);
    }

    #[tokio::test]
    async fn multiple_sources_into_dir_is_type_d() {
        let storage = MemoryStorage::new()
            .file("f1.txt", 1)
            .file("f2.txt", 1)
            .dir("bucket");
        let result = classify(&storage, &CancellationToken::new(), &options(&["f1.txt", "f2.txt"], "bucket"))
            .await
            .unwrap();
        assert_eq!(result, Classification::MultiSource);
    }

    #[tokio::test]
    #[traced_test]
    async fn multiple_sources_into_file_is_invalid() {
        let storage = MemoryStorage::new()
            .file("f1.txt", 1)
            .file("f2.txt", 1)
            .file("newname", 1);
        let error = classify(&storage, &CancellationToken::new(), &options(&["f1.txt", "f2.txt"], "newname"))
            .await
            .unwrap_err();
        assert!(matches!(error.kind, ErrorKind::InvalidArgument));
        assert_eq!(error.causal_path()[0].urls, vec!["f1.txt", "f2.txt"]);
    }

    #[tokio::test]
    async fn missing_source_propagates_probe_error() {
        let storage = MemoryStorage::new();
        let error = classify(&storage, &CancellationToken::new(), &options(&["nope.txt"], "dst"))
            .await
            .unwrap_err();
        assert!(error.is_not_found());
        let ops: Vec<_> = error.causal_path().iter().map(|e| e.operation).collect();
        assert_eq!(ops, vec!["stat", "classify"]);
    }

    #[tokio::test]
    async fn recursive_probe_of_empty_prefix_fails() {
        let storage = MemoryStorage::new().file("other/a.txt", 1);
        let mut opts = options(&["empty"], "dst");
        opts.recursive = true;
        let error = classify(&storage, &CancellationToken::new(), &opts)
            .await
            .unwrap_err();
        assert!(error.is_not_found());
    }
}
