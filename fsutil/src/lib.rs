use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{self, ReadDir},
    path::{Path, PathBuf},
    time::SystemTime,
};

pub mod error {
    use std::{io, path::PathBuf};

    pub type Result<T> = std::result::Result<T, self::Error>;

    type Msg = &'static str;

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("{0} ({1}): {2}")]
        SingleIO(Msg, PathBuf, #[source] io::Error),

        #[error("{0} (from='{1}', to='{2}'): {3}")]
        FromToIO(Msg, PathBuf, PathBuf, #[source] io::Error),

        #[error("Invalid glob pattern '{0}': {1}")]
        InvalidGlobPattern(String, #[source] ::glob::PatternError),

        #[error("Cannot serialize to YAML (dest='{0}'): {1}")]
        SerializeToYaml(PathBuf, #[source] serde_yaml::Error),

        #[error("Cannot deserialize from YAML (src='{0}'): {1}")]
        DeserializeFromYaml(PathBuf, #[source] serde_yaml::Error),
    }
}
pub use error::{Error, Result};

pub fn mkdir_all(path: impl AsRef<Path>) -> Result<()> {
    let dir = path.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::SingleIO("Cannot create dir", dir.to_owned(), e))
}

pub fn write<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    fs::write(&filepath, contents)
        .map_err(|e| Error::SingleIO("Cannot write file", filepath.as_ref().to_owned(), e))
}

pub fn write_with_mkdir<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    if let Some(dir) = filepath.as_ref().parent() {
        self::mkdir_all(dir)?;
    }
    self::write(filepath, contents)
}

pub fn read_to_string(filepath: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

pub fn remove_file(filepath: impl AsRef<Path>) -> Result<()> {
    fs::remove_file(&filepath)
        .map_err(|e| Error::SingleIO("Cannot remove file", filepath.as_ref().to_owned(), e))
}

pub fn remove_dir_all(dir: impl AsRef<Path>) -> Result<()> {
    fs::remove_dir_all(&dir)
        .map_err(|e| Error::SingleIO("Cannot remove dir", dir.as_ref().to_owned(), e))
}

pub fn read_dir(dir: impl AsRef<Path>) -> Result<ReadDir> {
    fs::read_dir(&dir).map_err(|e| Error::SingleIO("Cannot read dir", dir.as_ref().to_owned(), e))
}

/// Copying a path onto itself is a no-op: `fs::copy` would truncate the
/// file before reading it back.
pub fn copy_file(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<u64> {
    if from.as_ref() == to.as_ref() {
        let meta = from.as_ref().metadata().map_err(|e| {
            Error::SingleIO("Cannot stat file", from.as_ref().to_owned(), e)
        })?;
        return Ok(meta.len());
    }
    fs::copy(&from, &to).map_err(|e| {
        Error::FromToIO(
            "Cannot copy file",
            from.as_ref().to_owned(),
            to.as_ref().to_owned(),
            e,
        )
    })
}

pub fn modified_time(filepath: impl AsRef<Path>) -> Result<SystemTime> {
    let filepath = filepath.as_ref();
    filepath
        .metadata()
        .and_then(|m| m.modified())
        .map_err(|e| Error::SingleIO("Cannot stat file", filepath.to_owned(), e))
}

/// Recursively copies every entry of `src_dir` into `dst_dir`, creating
/// `dst_dir` if necessary. Existing files are overwritten.
pub fn copy_contents_all(src_dir: impl AsRef<Path>, dst_dir: impl AsRef<Path>) -> Result<()> {
    self::mkdir_all(&dst_dir)?;
    for entry in self::read_dir(&src_dir)? {
        let entry = entry.map_err(|e| {
            Error::FromToIO(
                "Cannot access dir entry on `copy_contents_all()`",
                src_dir.as_ref().to_owned(),
                dst_dir.as_ref().to_owned(),
                e,
            )
        })?;
        let dst = dst_dir.as_ref().join(entry.file_name());
        let ty = entry.file_type().map_err(|e| {
            Error::SingleIO(
                "Cannot get filetype on `copy_contents_all()`",
                entry.path(),
                e,
            )
        })?;
        if ty.is_dir() {
            self::copy_contents_all(entry.path(), dst)?;
        } else {
            self::copy_file(entry.path(), dst)?;
        }
    }
    Ok(())
}

/// Removes every regular file directly inside `dir` whose name matches `pattern`
/// (e.g. "*.class"). Subdirectories are not descended into.
pub fn remove_files_matching(dir: impl AsRef<Path>, pattern: &str) -> Result<()> {
    let pat = ::glob::Pattern::new(pattern)
        .map_err(|e| Error::InvalidGlobPattern(pattern.to_owned(), e))?;
    for entry in self::read_dir(&dir)?.filter_map(std::result::Result::ok) {
        let Ok(ty) = entry.file_type() else {
            continue;
        };
        if ty.is_dir() {
            continue;
        }
        if pat.matches(&entry.file_name().to_string_lossy()) {
            self::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Collects, recursively, every file under `dir` with the given extension
/// (without the leading dot). Result is sorted for reproducibility.
pub fn files_with_extension(dir: impl AsRef<Path>, ext: &str) -> Result<Vec<PathBuf>> {
    fn walk(dir: &Path, ext: &str, acc: &mut Vec<PathBuf>) -> Result<()> {
        for entry in self::read_dir(dir)?.filter_map(std::result::Result::ok) {
            let Ok(ty) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            if ty.is_dir() {
                walk(&path, ext, acc)?;
            } else if path.extension().map_or(false, |x| x == ext) {
                acc.push(path);
            }
        }
        Ok(())
    }
    let mut acc = Vec::new();
    walk(dir.as_ref(), ext, &mut acc)?;
    acc.sort();
    Ok(acc)
}

pub fn write_yaml_with_mkdir<P, T>(filepath: P, data: &T) -> Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let s = serde_yaml::to_string(data)
        .map_err(|e| Error::SerializeToYaml(filepath.as_ref().to_owned(), e))?;
    write_with_mkdir(filepath, &s)
}

pub fn read_yaml_with_deserialize<P, T>(filepath: P) -> Result<T>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let filepath = filepath.as_ref();
    let s = self::read_to_string(filepath)?;
    serde_yaml::from_str(&s).map_err(|e| Error::DeserializeFromYaml(filepath.to_owned(), e))
}
