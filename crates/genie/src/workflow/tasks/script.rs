use std::fmt::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::common::error::GenieError;
use crate::common::fsutils::{DONE_FILE, RUN_SCRIPT, STDERR_FILE, STDOUT_FILE};
use crate::workflow::{JobExecutionContext, WorkflowTask};

/// Writes the executable launch script `run.sh` into the job directory.
///
/// The script exports the job environment, sources the staged setup files,
/// runs the command with its output redirected into the job directory and
/// writes the done file with the exit code of the command when it ends.
/// Termination signals received by the script are forwarded to the command.
pub struct ScriptTask {
    shell: PathBuf,
}

impl ScriptTask {
    pub fn new(shell: PathBuf) -> Self {
        Self { shell }
    }
}

/// Quotes a value for the POSIX shell.
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn quote_path(path: &Path) -> String {
    shell_quote(&path.display().to_string())
}

fn render_script(ctx: &JobExecutionContext, shell: &Path) -> crate::Result<String> {
    let mut args: Vec<&str> = ctx.command.executable.split_whitespace().collect();
    if args.is_empty() {
        return Err(GenieError::GenericError(format!(
            "Command {} has an empty executable",
            ctx.command.id
        )));
    }
    args.extend(ctx.request.command_args.iter().map(|arg| arg.as_str()));
    let command_line = args
        .iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ");

    let mut script = String::new();
    write_script(&mut script, ctx, shell, &command_line)
        .map_err(|e| GenieError::GenericError(e.to_string()))?;
    Ok(script)
}

fn write_script(
    out: &mut String,
    ctx: &JobExecutionContext,
    shell: &Path,
    command_line: &str,
) -> std::fmt::Result {
    writeln!(out, "#!{}", shell.display())?;
    writeln!(out, "# Launch script of job {}", ctx.job_id())?;
    writeln!(out)?;
    for (name, value) in &ctx.env {
        writeln!(out, "export {name}={}", shell_quote(value))?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "GENIE_DONE_FILE={}",
        quote_path(&ctx.genie_dir().join(DONE_FILE))
    )?;
    writeln!(out, "child_pid=\"\"")?;
    writeln!(out, "terminated=\"\"")?;
    writeln!(out)?;
    writeln!(out, "finish() {{")?;
    writeln!(
        out,
        "    printf '{{\"exitCode\": %d}}\\n' \"$1\" > \"$GENIE_DONE_FILE\""
    )?;
    writeln!(out, "    exit \"$1\"")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "forward_signal() {{")?;
    writeln!(out, "    terminated=1")?;
    writeln!(out, "    if [ -n \"$child_pid\" ]; then")?;
    writeln!(out, "        kill -TERM \"$child_pid\" 2>/dev/null")?;
    writeln!(out, "    fi")?;
    writeln!(out, "}}")?;
    writeln!(out, "trap forward_signal TERM INT")?;
    writeln!(out)?;
    writeln!(out, "cd {} || finish 1", quote_path(&ctx.job_dir))?;
    for setup_file in &ctx.setup_files {
        writeln!(out, ". {} || finish $?", quote_path(setup_file))?;
    }
    writeln!(out)?;
    writeln!(out, "if [ -n \"$terminated\" ]; then")?;
    writeln!(out, "    finish 143")?;
    writeln!(out, "fi")?;
    writeln!(
        out,
        "{command_line} > {} 2> {} &",
        shell_quote(STDOUT_FILE),
        shell_quote(STDERR_FILE)
    )?;
    writeln!(out, "child_pid=$!")?;
    writeln!(out, "wait \"$child_pid\"")?;
    writeln!(out, "exit_code=$?")?;
    // `wait` returns early when a trapped signal arrives
    writeln!(out, "while kill -0 \"$child_pid\" 2>/dev/null; do")?;
    writeln!(out, "    wait \"$child_pid\"")?;
    writeln!(out, "    exit_code=$?")?;
    writeln!(out, "done")?;
    writeln!(out, "finish \"$exit_code\"")?;
    Ok(())
}

impl WorkflowTask for ScriptTask {
    fn name(&self) -> &'static str {
        "launch script"
    }

    fn execute(&self, ctx: &mut JobExecutionContext) -> crate::Result<()> {
        let script = render_script(ctx, &self.shell)?;
        let path = ctx.job_dir.join(RUN_SCRIPT);
        std::fs::write(&path, script)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        log::debug!("Job {}: launch script written to {}", ctx.job_id(), path.display());
        ctx.script = Some(path);
        Ok(())
    }
}
