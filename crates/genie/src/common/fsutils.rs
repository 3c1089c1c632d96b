use std::path::{Path, PathBuf};

use crate::JobId;

/// Directory with files owned by the service inside a job directory.
pub const GENIE_DIR: &str = "genie";
pub const LOGS_DIR: &str = "logs";
pub const DONE_FILE: &str = "genie.done";
pub const RUN_SCRIPT: &str = "run.sh";
pub const STDOUT_FILE: &str = "stdout";
pub const STDERR_FILE: &str = "stderr";

pub fn absolute_path(path: PathBuf) -> crate::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// `<working_dir>/<job_id>`
pub fn job_dir(working_dir: &Path, job_id: &JobId) -> PathBuf {
    working_dir.join(job_id.as_str())
}

/// `<working_dir>/<job_id>/genie`
pub fn genie_dir(working_dir: &Path, job_id: &JobId) -> PathBuf {
    job_dir(working_dir, job_id).join(GENIE_DIR)
}

/// `<working_dir>/<job_id>/genie/genie.done`
pub fn done_file_path(working_dir: &Path, job_id: &JobId) -> PathBuf {
    genie_dir(working_dir, job_id).join(DONE_FILE)
}

/// `<working_dir>/<job_id>/genie/logs/<job_id>.tar.gz`
pub fn local_archive_path(working_dir: &Path, job_id: &JobId) -> PathBuf {
    genie_dir(working_dir, job_id)
        .join(LOGS_DIR)
        .join(archive_file_name(job_id))
}

pub fn archive_file_name(job_id: &JobId) -> String {
    format!("{job_id}.tar.gz")
}

/// `<archive_root>/<job_id>.tar.gz`
pub fn archive_location(archive_root: &str, job_id: &JobId) -> String {
    format!(
        "{}/{}",
        archive_root.trim_end_matches('/'),
        archive_file_name(job_id)
    )
}

/// Returns the last path segment of an URI or a path.
pub fn file_name_from_uri(uri: &str) -> Option<&str> {
    uri.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
}
