// src/exec/script.rs

//! Script composition and on-disk script helpers.
//!
//! Generated files are numbered (`<prefix>_000.sh`, `<prefix>_001.sh`, ...)
//! and never overwritten, so every attempt at a stage leaves its scripts
//! behind for inspection.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use regex::Regex;

use crate::errors::Result;

pub const EXPERIMENT_SCRIPT_PREFIX: &str = "experiment-script";
pub const SUBMIT_SCRIPT_PREFIX: &str = "qsub-script";
pub const STDOUT_FILE: &str = "stdout";
pub const SCRIPT_SUFFIX: &str = ".sh";

const MAX_NUMBERED: u32 = 10_000;

/// Bash preamble that changes into the directory holding the running script,
/// following symlinks.
pub const CD_TO_SCRIPT_PARENT: &str = r#"
# Change directory to the parent directory of the calling bash script.
SOURCE="${BASH_SOURCE[0]}"
while [ -h "$SOURCE" ]; do
  DIR="$( cd -P "$( dirname "$SOURCE" )" && pwd )"
  SOURCE="$(readlink "$SOURCE")"
  [[ $SOURCE != /* ]] && SOURCE="$DIR/$SOURCE"
done
DIR="$( cd -P "$( dirname "$SOURCE" )" && pwd )"
echo "Changing directory to $DIR"
cd $DIR
"#;

/// Full stage script: preamble, optional environment setup, body, then the
/// completion marker.
pub fn compose_script(setupenv: Option<&Path>, body: &str, marker: &str) -> String {
    let mut script = String::from(CD_TO_SCRIPT_PARENT);
    if let Some(setupenv) = setupenv {
        script.push_str(&format!("source {}\n\n", setupenv.display()));
    }
    script.push_str(body);
    script.push_str(&format!("\ntouch '{marker}'\n"));
    script
}

/// Run `cmd` under `time`, echo it first, and stop the script with the
/// command's status if it fails.
pub fn checked_command(cmd: &str) -> String {
    format!(
        r#"CMD="time {cmd}"
echo $CMD
$CMD

EXIT=$?
if [[ $EXIT != 0 ]] ; then
    echo Error $EXIT
    exit $EXIT
fi
"#,
        cmd = cmd.trim_end()
    )
}

fn numbered_path(dir: &Path, prefix: &str, suffix: &str, n: u32) -> PathBuf {
    dir.join(format!("{prefix}_{n:03}{suffix}"))
}

/// Create the first free `<prefix>_NNN<suffix>` file in `dir`.
pub fn new_numbered_file(dir: &Path, prefix: &str, suffix: &str) -> Result<(File, PathBuf)> {
    for n in 0..MAX_NUMBERED {
        let path = numbered_path(dir, prefix, suffix, n);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("creating {}", path.display()))
                    .into());
            }
        }
    }
    Err(anyhow!("no free file name for prefix '{prefix}' in {}", dir.display()).into())
}

/// Create the first free `<prefix>_NNN` directory under `parent`, creating
/// `parent` if needed.
pub fn new_directory(parent: &Path, prefix: &str) -> Result<PathBuf> {
    fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    for n in 0..MAX_NUMBERED {
        let path = numbered_path(parent, prefix, "", n);
        match fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("creating {}", path.display()))
                    .into());
            }
        }
    }
    Err(anyhow!("no free directory name for prefix '{prefix}' in {}", parent.display()).into())
}

/// Persist `content` as a new numbered, user-executable script in `dir`.
pub fn write_script(dir: &Path, prefix: &str, content: &str) -> Result<PathBuf> {
    let (mut file, path) = new_numbered_file(dir, prefix, SCRIPT_SUFFIX)?;
    file.write_all(content.as_bytes())
        .and_then(|()| file.write_all(b"\n"))
        .with_context(|| format!("writing {}", path.display()))?;
    make_user_executable(&path)?;
    Ok(path)
}

#[cfg(unix)]
fn make_user_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o100);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_user_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Highest-numbered `<prefix>_NNN.sh` in `dir`, if any.
pub fn latest_script(dir: &Path, prefix: &str) -> Result<Option<PathBuf>> {
    let re = Regex::new(&format!(r"^{}_(\d+){}$", regex::escape(prefix), regex::escape(SCRIPT_SUFFIX)))
        .context("compiling script name regex")?;

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut best: Option<(u64, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(caps) = re.captures(&name) else {
            continue;
        };
        let Ok(n) = caps[1].parse::<u64>() else {
            continue;
        };
        if best.as_ref().is_none_or(|(b, _)| n > *b) {
            best = Some((n, entry.path()));
        }
    }
    Ok(best.map(|(_, path)| path))
}

/// Last `n` lines of a text file; empty if the file is missing.
pub fn tail_lines(path: &Path, n: usize) -> String {
    let Ok(bytes) = fs::read(path) else {
        return String::new();
    };
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// `path` relative to `base` when it lives below it.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
