// src/exec/command.rs

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use futures::Stream;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info};

use crate::graph::{Node, Work};

/// Work that runs `cmd` through the platform shell.
///
/// Each stdout line is produced as an intermediate value; the last line
/// becomes the node's output. A non-zero exit status fails the node. The
/// child is spawned with `kill_on_drop`, so a node timeout (or an aborted
/// execution) kills the process.
pub fn command_work(cmd: impl Into<String>) -> Work<String> {
    let cmd = cmd.into();
    Work::streaming(move |node: Node<String>| command_lines(node.label(), cmd.clone()))
}

struct RunningCommand {
    label: String,
    cmd: String,
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

enum Phase {
    NotStarted { label: String, cmd: String },
    Reading(RunningCommand),
    Done,
}

fn command_lines(label: String, cmd: String) -> impl Stream<Item = Result<String>> + Send {
    futures::stream::unfold(Phase::NotStarted { label, cmd }, |phase| async move {
        match phase {
            Phase::Done => None,
            Phase::NotStarted { label, cmd } => match spawn_command(label, cmd) {
                Ok(running) => next_line(running).await,
                Err(err) => Some((Err(err), Phase::Done)),
            },
            Phase::Reading(running) => next_line(running).await,
        }
    })
}

fn spawn_command(label: String, cmd: String) -> Result<RunningCommand> {
    info!(node = %label, cmd = %cmd, "starting command");

    // Build a shell command appropriate for the platform.
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&cmd);
        c
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for node '{label}'"))?;

    let stdout = child
        .stdout
        .take()
        .with_context(|| format!("no stdout pipe for node '{label}'"))?;

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        let label = label.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(node = %label, "stderr: {}", line);
            }
        });
    }

    Ok(RunningCommand {
        label,
        cmd,
        child,
        lines: BufReader::new(stdout).lines(),
    })
}

async fn next_line(mut running: RunningCommand) -> Option<(Result<String>, Phase)> {
    let next = running.lines.next_line().await;
    match next {
        Ok(Some(line)) => Some((Ok(line), Phase::Reading(running))),
        Ok(None) => match wait_for_exit(running).await {
            Ok(()) => None,
            Err(err) => Some((Err(err), Phase::Done)),
        },
        Err(err) => {
            let err = anyhow::Error::from(err)
                .context(format!("reading stdout of node '{}'", running.label));
            Some((Err(err), Phase::Done))
        }
    }
}

async fn wait_for_exit(mut running: RunningCommand) -> Result<()> {
    let status = running
        .child
        .wait()
        .await
        .with_context(|| format!("waiting for process of node '{}'", running.label))?;

    let code = status.code().unwrap_or(-1);
    info!(
        node = %running.label,
        exit_code = code,
        success = status.success(),
        "command exited"
    );

    if !status.success() {
        bail!("command `{}` exited with status {}", running.cmd, code);
    }
    Ok(())
}
