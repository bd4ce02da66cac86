//! Last-resort diagnostics: unanticipated failures are appended to a
//! local dump file with enough context to debug remotely, while the
//! student only sees an opaque message.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use chrono::Local;

pub const DUMP_FILE_NAME: &str = "__exercheck_dump.log";

pub const INTERNAL_ERROR_MSG: &str =
    "An internal exercheck error occurred. Tell your teacher about it";

/// Appends full context for `err` to the dump file in `dir`.
/// Best-effort: diagnostics must never turn into a second failure.
pub fn dump_internal_error(dir: &Path, err: &anyhow::Error) {
    let mut buf = String::new();
    let _ = write!(buf, "\n\n{}\n\n", "=".repeat(100));
    let _ = writeln!(buf, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%z"));
    let _ = writeln!(buf, "exercheck {}", env!("CARGO_PKG_VERSION"));
    if let Ok(issue) = std::fs::read_to_string("/etc/issue") {
        let _ = writeln!(buf, "{}", issue.trim_end());
    }
    for (key, value) in std::env::vars() {
        let _ = writeln!(buf, "{}={}", key, value);
    }
    let _ = writeln!(buf, "\n{:?}", err);

    let path = dir.join(DUMP_FILE_NAME);
    let res = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&path)
        .and_then(|mut f| f.write_all(buf.as_bytes()));
    if let Err(e) = res {
        log::warn!("Could not write diagnostic dump {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dump_appends_timestamp_and_error_chain() {
        let dir = std::env::temp_dir().join(format!("exercheck-diag-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let _ = std::fs::remove_file(dir.join(DUMP_FILE_NAME));

        let err = anyhow::anyhow!("inner cause").context("outer context");
        dump_internal_error(&dir, &err);
        dump_internal_error(&dir, &err);

        let dump = std::fs::read_to_string(dir.join(DUMP_FILE_NAME)).unwrap();
        assert!(dump.contains("outer context"));
        assert!(dump.contains("inner cause"));
        assert_eq!(dump.matches(&"=".repeat(100)).count(), 2);
    }
}
