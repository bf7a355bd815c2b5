use chrono::{DateTime, Utc};

/// Rejects sources relying on '.' expansion.
pub fn validate_sources(sources: &[String]) -> anyhow::Result<()> {
    for src in sources {
        if src == "." || src.ends_with("/.") {
            return Err(anyhow::anyhow!(
                "expanding source directory ({:?}) using dot operator ('.') is not supported, please use absolute \
                path or '*' instead",
                std::path::PathBuf::from(src)
            ));
        }
    }
    Ok(())
}

/// Validates that destination path doesn't end with problematic patterns like . or ..
pub fn validate_destination_path(dst_path_str: &str) -> anyhow::Result<()> {
    // check the raw string, Path::file_name() normalizes
    if dst_path_str.ends_with("/.") || dst_path_str == "." {
        return Err(anyhow::anyhow!(
            "Destination path cannot end with '.' (current directory).\n\
            If you want to copy into the current directory, use './' instead.\n\
            Example: 'bcp source.txt ./' copies source.txt into current directory as source.txt"
        ));
    } else if dst_path_str.ends_with("/..") || dst_path_str == ".." {
        return Err(anyhow::anyhow!(
            "Destination path cannot end with '..' (parent directory).\n\
            If you want to copy into the parent directory, use '../' instead.\n\
            Example: 'bcp source.txt ../' copies source.txt into parent directory as source.txt"
        ));
    }
    Ok(())
}

/// Parses `ALIAS/PREFIX=KEY` encryption key specs into per-alias prefix keys.
pub fn parse_enc_keys(args: &[String]) -> anyhow::Result<common::storage::EncKeys> {
    let mut keys = common::storage::EncKeys::new();
    for arg in args {
        let (prefix, key) = arg.split_once('=').ok_or_else(|| {
            anyhow::anyhow!("encryption key {arg:?} must have the form ALIAS/PREFIX=KEY")
        })?;
        let alias = prefix.split('/').next().unwrap_or_default();
        if alias.is_empty() || key.is_empty() {
            return Err(anyhow::anyhow!(
                "encryption key {arg:?} must have the form ALIAS/PREFIX=KEY"
            ));
        }
        keys.entry(alias.to_string())
            .or_default()
            .push(common::storage::PrefixKey {
                prefix: prefix.to_string(),
                key: key.to_string(),
            });
    }
    Ok(keys)
}

/// Point in time from either an RFC 3339 timestamp or a duration counted back from `now`.
pub fn parse_rewind(value: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.with_timezone(&Utc));
    }
    let duration = humantime::parse_duration(value).map_err(|error| {
        anyhow::anyhow!("invalid rewind {value:?}, expected a duration or an RFC 3339 time: {error}")
    })?;
    before(now, duration)
}

/// `now - duration`, failing when the result is out of range.
pub fn before(now: DateTime<Utc>, duration: std::time::Duration) -> anyhow::Result<DateTime<Utc>> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|duration| now.checked_sub_signed(duration))
        .ok_or_else(|| anyhow::anyhow!("duration {duration:?} reaches too far into the past"))
}
