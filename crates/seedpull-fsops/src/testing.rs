//! Simulated command runner for tests that exercise the stages without
//! `lftp`, `unzip` or `unrar` installed.
//!
//! The seedbox is modelled as a local directory: remote path `/data/x` maps
//! to `<remote_root>/data/x`. Archives are plain-text manifests; each
//! non-empty line names a file the extractor creates next to the archive.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use walkdir::WalkDir;

use crate::command::{CommandRunner, CommandSpec, lftp_unquote};
use crate::error::{FsOpsError, FsOpsResult};

/// Command runner that simulates the subordinate programs on the local filesystem.
#[derive(Debug)]
pub struct SimulatedRunner {
    remote_root: PathBuf,
    calls: Mutex<Vec<CommandSpec>>,
    failures: Mutex<BTreeMap<String, usize>>,
    discards: Mutex<usize>,
}

impl SimulatedRunner {
    /// Simulate a seedbox whose filesystem root is `remote_root`.
    #[must_use]
    pub fn new(remote_root: impl Into<PathBuf>) -> Self {
        Self {
            remote_root: remote_root.into(),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(BTreeMap::new()),
            discards: Mutex::new(0),
        }
    }

    /// Make the next `times` invocations of `program` exit with status 1.
    pub fn fail_next(&self, program: &str, times: usize) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(program.to_string(), times);
    }

    /// Delete the local target of the next `times` successful transfers, as if
    /// something cleaned the staging directory right after the fetch.
    pub fn discard_next_fetch(&self, times: usize) {
        *self.discards.lock().unwrap_or_else(PoisonError::into_inner) = times;
    }

    /// Every command run so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Program names of every command run so far, in order.
    #[must_use]
    pub fn programs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|spec| spec.program)
            .collect()
    }

    /// Local path standing in for `remote` on the seedbox.
    #[must_use]
    pub fn remote_path(&self, remote: &str) -> PathBuf {
        self.remote_root.join(remote.trim_start_matches('/'))
    }

    fn take_failure(&self, program: &str) -> bool {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        match failures.get_mut(program) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn take_discard(&self) -> bool {
        let mut discards = self.discards.lock().unwrap_or_else(PoisonError::into_inner);
        if *discards == 0 {
            return false;
        }
        *discards -= 1;
        true
    }

    fn run_lftp(&self, operation: &'static str, spec: &CommandSpec) -> FsOpsResult<PathBuf> {
        let script = spec.args.get(1).map_or("", String::as_str);
        let transfer = script.split(" && ").nth(1).unwrap_or_default();
        let words = split_lftp_words(transfer);
        match words.first().map(String::as_str) {
            Some("mirror") => {
                let [.., remote, local] = words.as_slice() else {
                    return Err(malformed(operation, transfer));
                };
                copy_merge(&self.remote_path(remote), Path::new(local))?;
                Ok(PathBuf::from(local))
            }
            Some("pget") => {
                let output = words.iter().position(|word| word == "-o");
                match output {
                    Some(index) if index >= 1 && index + 1 < words.len() => {
                        let remote = self.remote_path(&words[index - 1]);
                        let target = PathBuf::from(&words[index + 1]);
                        fs::copy(&remote, &target)
                            .map_err(|source| FsOpsError::io(operation, remote, source))?;
                        Ok(target)
                    }
                    _ => Err(malformed(operation, transfer)),
                }
            }
            _ => Err(malformed(operation, transfer)),
        }
    }

    fn run_extractor(operation: &'static str, archive: &Path, target: &Path) -> FsOpsResult<()> {
        let manifest = fs::read_to_string(archive)
            .map_err(|source| FsOpsError::io(operation, archive, source))?;
        for line in manifest.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let path = target.join(line);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|source| FsOpsError::io(operation, parent, source))?;
            }
            fs::write(&path, format!("extracted from {}", archive.display()))
                .map_err(|source| FsOpsError::io(operation, &path, source))?;
        }
        Ok(())
    }
}

impl CommandRunner for SimulatedRunner {
    fn run(&self, operation: &'static str, spec: &CommandSpec) -> FsOpsResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(spec.clone());

        if self.take_failure(&spec.program) {
            return Err(FsOpsError::CommandFailed {
                operation,
                program: spec.program.clone(),
                status: Some(1),
            });
        }

        match (spec.program.as_str(), spec.args.as_slice()) {
            ("lftp", _) => {
                let target = self.run_lftp(operation, spec)?;
                if self.take_discard() {
                    let removed = if target.is_dir() {
                        fs::remove_dir_all(&target)
                    } else {
                        fs::remove_file(&target)
                    };
                    removed.map_err(|source| FsOpsError::io(operation, &target, source))?;
                }
                Ok(())
            }
            ("unzip", [_, archive, _, target]) | ("unrar", [_, _, _, archive, target]) => {
                Self::run_extractor(operation, Path::new(archive), Path::new(target))
            }
            _ => Err(FsOpsError::CommandSpawn {
                operation,
                program: spec.program.clone(),
                source: io::Error::from(io::ErrorKind::NotFound),
            }),
        }
    }
}

fn malformed(operation: &'static str, transfer: &str) -> FsOpsError {
    FsOpsError::InvalidInput {
        field: operation,
        reason: "unrecognised_lftp_transfer",
        value: Some(transfer.to_string()),
    }
}

fn split_lftp_words(script: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    for ch in script.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
        } else if in_quotes && ch == '\\' {
            current.push(ch);
            escaped = true;
        } else if ch == '"' {
            current.push(ch);
            in_quotes = !in_quotes;
        } else if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
        .into_iter()
        .map(|word| lftp_unquote(&word).unwrap_or(word))
        .collect()
}

fn copy_merge(source: &Path, destination: &Path) -> FsOpsResult<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|err| FsOpsError::walkdir("simulated.mirror", source, err))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| malformed("simulated.mirror", &entry.path().to_string_lossy()))?;
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|err| FsOpsError::io("simulated.mirror", &target, err))?;
        } else {
            fs::copy(entry.path(), &target)
                .map_err(|err| FsOpsError::io("simulated.mirror", &target, err))?;
        }
    }
    Ok(())
}
