//! Path resolution: where the student repo, the exercise under grading,
//! the spec files and the staging copy live.
//!
//! Protected mode is the student setup (repo in a fixed place, specs
//! shipped under the support dir, tests run on a staged copy). Dev mode
//! (`EXERCHECK_UNPROTECTED` set) is the teacher setup: everything
//! relative to the current directory, no staging, no VCS checks.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::judge::JUNIT_FILE_NAME;

pub const WORKDIR_ENV: &str = "EXERCHECK_DIR";
pub const SUPPORT_DIR_ENV: &str = "EXERCHECK_SUPPORT_DIR";
pub const SPEC_DIR_ENV: &str = "EXERCHECK_SPEC_DIR";
pub const UNPROTECTED_ENV: &str = "EXERCHECK_UNPROTECTED";

pub const DEFAULT_WORKDIR_NAME: &str = "exercises";
pub const SUPPORT_DIR_NAME: &str = ".exercheck";
pub const SPEC_SUBDIR_NAME: &str = "exercises";
pub const SPECS_FILENAME: &str = "specs.yaml";
pub const STAGING_RELATIVE_PATH: &str = "tmp/test";
pub const AUTOCOMMIT_FLAG_RELATIVE_PATH: &str = "tmp/last.yaml";

pub fn is_protected() -> bool {
    std::env::var_os(UNPROTECTED_ENV).is_none()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Root of the student's exercise repository.
    pub working_dir: PathBuf,
    /// Folder of the exercise being graded (the invocation directory).
    pub target_dir: PathBuf,
    pub protected: bool,
}

impl Layout {
    pub fn resolve(workdir_flag: Option<&Path>, current_dir: &Path) -> Result<Self> {
        let protected = is_protected();
        let working_dir = Self::find_working_dir(workdir_flag, current_dir, protected)?;

        if protected && working_dir != current_dir.parent().unwrap_or(Path::new("")) {
            return Err(Error::user(
                "The current directory is not inside the working directory",
            ));
        }

        Ok(Self {
            working_dir,
            target_dir: current_dir.to_owned(),
            protected,
        })
    }

    fn find_working_dir(
        workdir_flag: Option<&Path>,
        current_dir: &Path,
        protected: bool,
    ) -> Result<PathBuf> {
        if let Some(path) = workdir_flag {
            if !path.is_dir() {
                return Err(Error::user(format!(
                    "Cannot find the directory {} given with --workdir",
                    path.display()
                )));
            }
            return Ok(path.to_owned());
        }
        if let Some(path) = std::env::var_os(WORKDIR_ENV).map(PathBuf::from) {
            if !path.is_dir() {
                return Err(Error::user(format!(
                    "Cannot find the directory {} named by the {} env var",
                    path.display(),
                    WORKDIR_ENV
                )));
            }
            return Ok(path);
        }
        if !protected {
            return Ok(current_dir.to_owned());
        }
        let path = dirs::home_dir()
            .map(|home| home.join(DEFAULT_WORKDIR_NAME))
            .filter(|p| p.is_dir());
        path.ok_or_else(|| {
            Error::user_with_tip(
                "Cannot find your exercise repository",
                "Check that your system is set up as described in the course notes",
            )
        })
    }

    /// Name of the exercise folder, e.g. "01_19_switch".
    pub fn exercise_name(&self) -> String {
        self.target_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Short id of the exercise: the first two '_'-separated segments.
    pub fn exercise_id(&self) -> String {
        let name = self.exercise_name();
        name.splitn(3, '_').take(2).collect::<Vec<_>>().join("_")
    }

    pub fn support_dir(&self) -> Result<PathBuf> {
        if !self.protected {
            return Ok(self.target_dir.clone());
        }
        let dir = match std::env::var_os(SUPPORT_DIR_ENV) {
            Some(d) => PathBuf::from(d),
            None => self.working_dir.join(SUPPORT_DIR_NAME),
        };
        if !dir.is_dir() {
            return Err(Error::user(format!(
                "Cannot find the support directory {}",
                dir.display()
            )));
        }
        Ok(dir)
    }

    pub fn specs_dir(&self, specs_flag: Option<&Path>) -> Result<PathBuf> {
        if !self.protected {
            return Ok(match specs_flag {
                Some(path) if path.is_dir() => path.to_owned(),
                Some(path) => path.parent().unwrap_or(Path::new(".")).to_owned(),
                None => self.target_dir.clone(),
            });
        }
        let dir = match std::env::var_os(SPEC_DIR_ENV) {
            Some(d) => PathBuf::from(d),
            None => self.support_dir()?.join(SPEC_SUBDIR_NAME),
        };
        if !dir.is_dir() {
            return Err(Error::user(format!(
                "Cannot find the spec directory {}",
                dir.display()
            )));
        }
        Ok(dir)
    }

    pub fn spec_file(&self, specs_flag: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = specs_flag {
            return Ok(if path.is_dir() {
                path.join(SPECS_FILENAME)
            } else {
                path.to_owned()
            });
        }
        let path = if self.protected {
            self.specs_dir(None)?
                .join(format!("{}.yaml", self.exercise_name()))
        } else {
            self.specs_dir(None)?.join(SPECS_FILENAME)
        };
        if !path.is_file() {
            return Err(Error::user_with_tip(
                "The current directory does not correspond to a known exercise",
                format!(
                    "If you believe it should be one, check that the name\n\
                     '{}' is exactly the one given in the assignment",
                    self.exercise_name()
                ),
            ));
        }
        Ok(path)
    }

    /// Path of the shipped JUnit suite for this exercise, if the teacher
    /// provides one.
    pub fn junit_file(&self, specs_flag: Option<&Path>) -> Result<PathBuf> {
        let dir = self.specs_dir(specs_flag)?;
        Ok(if self.protected {
            dir.join(format!("{}.junit", self.exercise_name()))
        } else {
            dir.join(JUNIT_FILE_NAME)
        })
    }

    pub fn autocommit_flag_file(&self) -> Result<PathBuf> {
        Ok(self.support_dir()?.join(AUTOCOMMIT_FLAG_RELATIVE_PATH))
    }

    /// Prepares the directory tests run in. Protected mode stages a fresh
    /// copy of the target under the (gitignored) support tmp dir; dev mode
    /// tests in place.
    pub fn prepare_staging(&self) -> Result<PathBuf> {
        if !self.protected {
            return Ok(self.target_dir.clone());
        }
        let staging = self.support_dir()?.join(STAGING_RELATIVE_PATH);
        if staging.exists() {
            fsutil::remove_dir_all(&staging)?;
        }
        fsutil::copy_contents_all(&self.target_dir, &staging)?;
        Ok(staging)
    }

    /// Protected-mode precondition: every source file must have a compiled
    /// artifact at least as new as itself. Guarantees students compiled
    /// (and saw compiler output) before grading.
    pub fn ensure_sources_compiled(&self) -> Result<()> {
        if !self.protected {
            return Ok(());
        }
        for srcfile in fsutil::files_with_extension(&self.target_dir, "java")? {
            let rel = srcfile
                .strip_prefix(&self.target_dir)
                .unwrap_or(&srcfile)
                .to_path_buf();
            let tip = format!(
                "Consider one of:\n$ javac {}\nor\n$ javac *.java",
                rel.display()
            );
            let compiled = srcfile.with_extension("class");
            if !compiled.is_file() {
                return Err(Error::user_with_tip(
                    format!("The file {} is not compiled", rel.display()),
                    tip,
                ));
            }
            if fsutil::modified_time(&srcfile)? > fsutil::modified_time(&compiled)? {
                return Err(Error::user_with_tip(
                    format!("The file {} was modified after compiling", rel.display()),
                    tip,
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn dev_layout(target: &str) -> Layout {
        Layout {
            working_dir: PathBuf::from("/repo"),
            target_dir: PathBuf::from(target),
            protected: false,
        }
    }

    #[test]
    fn exercise_id_is_the_first_two_segments() {
        let layout = dev_layout("/repo/01_19_weekday_switch");
        assert_eq!(layout.exercise_name(), "01_19_weekday_switch");
        assert_eq!(layout.exercise_id(), "01_19");

        let layout = dev_layout("/repo/freeform");
        assert_eq!(layout.exercise_id(), "freeform");
    }

    #[test]
    fn dev_mode_stages_in_place() {
        let layout = dev_layout("/repo/01_19_weekday_switch");
        assert_eq!(
            layout.prepare_staging().unwrap(),
            PathBuf::from("/repo/01_19_weekday_switch")
        );
    }

    #[test]
    fn dev_mode_skips_compile_freshness_check() {
        let layout = dev_layout("/nonexistent/dir");
        assert!(layout.ensure_sources_compiled().is_ok());
    }

    #[test]
    fn explicit_spec_dir_flag_is_completed_with_the_default_filename() {
        let layout = dev_layout("/repo/x");
        let dir = std::env::temp_dir();
        assert_eq!(
            layout.spec_file(Some(&dir)).unwrap(),
            dir.join(SPECS_FILENAME)
        );
        // A file path is taken verbatim.
        let file = dir.join("custom.yaml");
        assert_eq!(layout.spec_file(Some(&file)).unwrap(), file);
    }
}
