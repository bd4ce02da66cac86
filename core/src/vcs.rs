//! Version-control guard: grading refuses to run until the exercise is
//! recorded in git, and offers an autocommit convenience for successive
//! runs on the same exercise. Talks to plain `git` via subprocess.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::paths::Layout;

pub const AUTOCOMMIT_AUTHOR_NAME: &str = "exercheck";

const MSG_MISSING_ADD: &str = "You need to add files to git";
const MSG_MISSING_COMMIT: &str = "You need to record your changes in git";
const MSG_MISSING_COMMIT_TIP: &str =
    "Consider:\n$ git commit -am \"<description of the changes>\"";

#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadCommit {
    pub sha: String,
    pub author_email: String,
    pub message: String,
}

impl GitRepo {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn git(&self, args: &[&str]) -> anyhow::Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .with_context(|| format!("Failed to run 'git {}'", args.join(" ")))?;
        if !output.status.success() {
            bail!(
                "'git {}' failed in {}: {}",
                args.join(" "),
                self.root.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    // --untracked-files=all: git otherwise collapses a wholly-untracked
    // directory to a single "?? dir/" entry.
    fn status_porcelain(&self) -> anyhow::Result<Vec<String>> {
        Ok(self
            .git(&["status", "--porcelain", "--untracked-files=all"])?
            .lines()
            .map(str::to_owned)
            .collect())
    }

    /// Untracked files under `subdir`, relative to `subdir`.
    pub fn untracked_under(&self, subdir: &str) -> anyhow::Result<Vec<String>> {
        Ok(untracked_in(&self.status_porcelain()?, subdir))
    }

    /// True when tracked files have uncommitted modifications (untracked
    /// files elsewhere in the repo do not count).
    pub fn is_dirty(&self) -> anyhow::Result<bool> {
        Ok(has_uncommitted_changes(&self.status_porcelain()?))
    }

    pub fn head(&self) -> anyhow::Result<HeadCommit> {
        let out = self.git(&["log", "-1", "--format=%H%x00%ae%x00%B"])?;
        let mut fields = out.splitn(3, '\0');
        let (Some(sha), Some(author_email), Some(message)) =
            (fields.next(), fields.next(), fields.next())
        else {
            bail!("Unexpected 'git log' output: {:?}", out);
        };
        Ok(HeadCommit {
            sha: sha.to_owned(),
            author_email: author_email.to_owned(),
            message: message.trim_end().to_owned(),
        })
    }

    pub fn commit_all(&self, author_name: &str, author_email: &str, message: &str) -> anyhow::Result<()> {
        self.git(&["add", "--all"])?;
        self.git(&[
            "commit",
            "-m",
            message,
            "--author",
            &format!("{} <{}>", author_name, author_email),
        ])?;
        Ok(())
    }
}

fn untracked_in(porcelain: &[String], subdir: &str) -> Vec<String> {
    let prefix = format!("{}/", subdir);
    porcelain
        .iter()
        .filter_map(|line| line.strip_prefix("?? "))
        .filter_map(|path| path.strip_prefix(&prefix))
        .filter(|path| !path.is_empty())
        .map(str::to_owned)
        .collect()
}

fn has_uncommitted_changes(porcelain: &[String]) -> bool {
    porcelain.iter().any(|line| !line.starts_with("??"))
}

/// On-disk record of the last grading run, driving the autocommit
/// sequence numbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutocommitFlag {
    pub msg: String,
    pub seq: i64,
    pub exercise: String,
    pub sha: String,
}

/// Decides whether the repo state allows another autocommit in the
/// running sequence: either the sequence just started, or HEAD is the
/// autocommit we made last time (its message ends with the student's
/// original message).
fn next_autocommit(flag: &AutocommitFlag, head_message: &str) -> Option<(i64, String)> {
    let parts: Vec<&str> = head_message.splitn(3, ": ").collect();
    let expected_head = flag.seq == 0 || (parts.len() == 2 && flag.msg == parts[1]);
    expected_head.then(|| (flag.seq + 1, flag.msg.clone()))
}

fn autocommit_message(seq: i64, exercise_id: &str, msg: &str) -> String {
    format!("exercheck autocommit #{} {}: {}", seq, exercise_id, msg)
}

pub struct VcsGuard {
    repo: GitRepo,
    flag_path: PathBuf,
    exercise_name: String,
    exercise_id: String,
}

impl VcsGuard {
    pub fn new(layout: &Layout) -> Result<Self> {
        Ok(Self {
            repo: GitRepo::open(&layout.working_dir),
            flag_path: layout.autocommit_flag_file()?,
            exercise_name: layout.exercise_name(),
            exercise_id: layout.exercise_id(),
        })
    }

    /// The precondition grading requires: everything in the exercise
    /// folder added, everything in the repo committed. A dirty repo is
    /// autocommitted when the previous run recorded the same exercise.
    pub fn ensure_committed(&self) -> Result<()> {
        let unstaged = self.repo.untracked_under(&self.exercise_name)?;
        if !unstaged.is_empty() {
            return Err(Error::user_with_tip(
                MSG_MISSING_ADD,
                format!(
                    "Consider one of:\n$ git add {}\nor\n$ git add --all",
                    unstaged.join(" ")
                ),
            ));
        }

        if self.repo.is_dirty()? {
            match self.load_flag() {
                Some(flag) if flag.exercise == self.exercise_name => self.autocommit(&flag)?,
                _ => {
                    return Err(Error::user_with_tip(
                        MSG_MISSING_COMMIT,
                        MSG_MISSING_COMMIT_TIP,
                    ))
                }
            }
        } else {
            self.reset_flag()?;
        }
        Ok(())
    }

    fn load_flag(&self) -> Option<AutocommitFlag> {
        if !self.flag_path.is_file() {
            return None;
        }
        fsutil::read_yaml_with_deserialize(&self.flag_path).ok()
    }

    fn autocommit(&self, flag: &AutocommitFlag) -> Result<()> {
        let head = self.repo.head()?;
        let Some((seq, msg)) = next_autocommit(flag, &head.message) else {
            // Sequence broken by a manual commit; start over silently.
            return self.reset_flag();
        };
        let comment = autocommit_message(seq, &self.exercise_id, &msg);
        if let Err(e) = self
            .repo
            .commit_all(AUTOCOMMIT_AUTHOR_NAME, &head.author_email, &comment)
        {
            log::warn!("Autocommit failed: {:#}", e);
            return Ok(());
        }
        let new_head = self.repo.head()?;
        fsutil::write_yaml_with_mkdir(
            &self.flag_path,
            &AutocommitFlag {
                msg,
                seq,
                exercise: self.exercise_name.clone(),
                sha: new_head.sha,
            },
        )?;
        Ok(())
    }

    fn reset_flag(&self) -> Result<()> {
        let old = self.load_flag();
        let head = self.repo.head()?;
        let msg = match &old {
            Some(flag) if flag.sha == head.sha => flag.msg.clone(),
            _ => head.message.clone(),
        };
        let contents = AutocommitFlag {
            msg,
            seq: 0,
            exercise: self.exercise_name.clone(),
            sha: head.sha,
        };
        if old.as_ref() != Some(&contents) {
            fsutil::write_yaml_with_mkdir(&self.flag_path, &contents)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn lines(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn untracked_files_are_filtered_by_exercise_folder() {
        let porcelain = lines(&[
            "?? 01_19_switch/Notes.java",
            "?? other_dir/Draft.java",
            " M 01_19_switch/Main.java",
        ]);
        assert_eq!(
            untracked_in(&porcelain, "01_19_switch"),
            vec!["Notes.java".to_owned()]
        );
    }

    #[test]
    fn collapsed_untracked_dir_entry_yields_no_empty_path() {
        let porcelain = lines(&["?? 01_19_switch/"]);
        assert_eq!(untracked_in(&porcelain, "01_19_switch"), Vec::<String>::new());
    }

    #[test]
    fn untracked_only_repos_are_not_dirty() {
        assert!(!has_uncommitted_changes(&lines(&["?? elsewhere/x.txt"])));
        assert!(has_uncommitted_changes(&lines(&[" M a.java"])));
        assert!(has_uncommitted_changes(&lines(&["A  b.java", "?? c"])));
        assert!(!has_uncommitted_changes(&[]));
    }

    #[test]
    fn autocommit_sequence_continues_after_our_own_commit() {
        let flag = AutocommitFlag {
            msg: "solve exercise".into(),
            seq: 2,
            exercise: "01_19_switch".into(),
            sha: "abc".into(),
        };
        let head = autocommit_message(2, "01_19", "solve exercise");
        assert_eq!(
            next_autocommit(&flag, &head),
            Some((3, "solve exercise".to_owned()))
        );
    }

    #[test]
    fn autocommit_sequence_starts_from_a_fresh_flag() {
        let flag = AutocommitFlag {
            msg: "initial".into(),
            seq: 0,
            exercise: "e".into(),
            sha: "abc".into(),
        };
        // seq 0 accepts any HEAD message.
        assert_eq!(
            next_autocommit(&flag, "whatever the student wrote"),
            Some((1, "initial".to_owned()))
        );
    }

    #[test]
    fn manual_commit_breaks_the_autocommit_sequence() {
        let flag = AutocommitFlag {
            msg: "solve exercise".into(),
            seq: 2,
            exercise: "e".into(),
            sha: "abc".into(),
        };
        assert_eq!(next_autocommit(&flag, "fix bug by hand"), None);
        assert_eq!(
            next_autocommit(&flag, "exercheck autocommit #2 01_19: other message"),
            None
        );
    }

    #[test]
    fn autocommit_message_format() {
        assert_eq!(
            autocommit_message(4, "01_19", "wip"),
            "exercheck autocommit #4 01_19: wip"
        );
    }
}
