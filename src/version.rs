#![allow(clippy::doc_markdown)] // Generated file contains OPT_LEVEL without backticks

use std::sync::LazyLock;

include!(concat!(env!("OUT_DIR"), "/built.rs"));

/// Version of mgtranscode: the package version, followed by the git commit hash and a
/// `-dirty` marker when built from a modified checkout.
pub static VERSION: LazyLock<String> = LazyLock::new(|| {
    let prefix = match GIT_COMMIT_HASH_SHORT {
        Some(hash) => format!("{PKG_VERSION}-{hash}"),
        None => PKG_VERSION.to_string(),
    };
    let suffix = if GIT_DIRTY == Some(true) { "-dirty" } else { "" };
    format!("{prefix}{suffix}")
});
