use std::env;
use std::path::PathBuf;

include!(concat!(env!("OUT_DIR"), "/nad_archive_env_allowlist.rs"));

pub const ENV_PREFIX: &str = "NAD_ARCHIVE_";

fn fallback_dotenv_path(archive_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    let base = archive_home.or(home_dir)?;
    Some(base.join("nad-archive/.env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("NAD_ARCHIVE_HOME").map(PathBuf::from),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}

/// `NAD_ARCHIVE_*` variables in `keys` that nothing reads, usually typos.
pub fn unknown_env_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut unknown: Vec<String> = keys
        .into_iter()
        .map(|key| key.as_ref().to_string())
        .filter(|key| key.starts_with(ENV_PREFIX))
        .filter(|key| !GENERATED_NAD_ARCHIVE_ENV_ALLOWLIST.contains(&key.as_str()))
        .collect();
    unknown.sort();
    unknown.dedup();
    unknown
}

pub fn unknown_process_env_keys() -> Vec<String> {
    unknown_env_keys(env::vars_os().filter_map(|(key, _)| key.into_string().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn fallback_uses_archive_home_subdir() {
        let got = fallback_dotenv_path(
            Some(PathBuf::from("/srv/archive")),
            Some(PathBuf::from("/home/alice")),
        );

        let want = Some(PathBuf::from("/srv/archive/nad-archive/.env"));
        assert_eq!(got, want);
    }

    #[test]
    fn fallback_uses_home_when_archive_home_unset() {
        let got = fallback_dotenv_path(None, Some(PathBuf::from("/home/alice")));
        let want = Some(PathBuf::from("/home/alice/nad-archive/.env"));
        assert_eq!(got, want);
    }

    #[test]
    fn allowlist_covers_keys_read_in_source() {
        for key in [
            "NAD_ARCHIVE_HOME",
            "NAD_ARCHIVE_BASE_URL",
            "NAD_ARCHIVE_BATCH_SIZE",
            "NAD_ARCHIVE_POLL_MAX_ATTEMPTS",
        ] {
            assert!(GENERATED_NAD_ARCHIVE_ENV_ALLOWLIST.contains(&key), "{key}");
        }
    }

    #[test]
    fn allowlist_ignores_identifiers_and_bare_prefix() {
        let from_identifier = format!("{ENV_PREFIX}ENV_ALLOWLIST");
        assert!(!GENERATED_NAD_ARCHIVE_ENV_ALLOWLIST.contains(&from_identifier.as_str()));
        assert!(!GENERATED_NAD_ARCHIVE_ENV_ALLOWLIST.contains(&ENV_PREFIX));
        assert!(
            GENERATED_NAD_ARCHIVE_ENV_ALLOWLIST
                .iter()
                .all(|key| key.len() > ENV_PREFIX.len())
        );
    }

    #[test]
    fn unknown_keys_are_reported_once_and_sorted() {
        // Built at runtime so the allowlist scan in build.rs never sees them.
        let typo = format!("{ENV_PREFIX}BATCH_SZIE");
        let stray = format!("{ENV_PREFIX}AAA");
        let got = unknown_env_keys([
            typo.as_str(),
            "PATH",
            "NAD_ARCHIVE_BASE_URL",
            typo.as_str(),
            stray.as_str(),
        ]);
        assert_eq!(got, vec![stray.clone(), typo.clone()]);
    }
}
