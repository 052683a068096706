//! Best-effort "open this URL in a browser".
//!
//! Nothing here can fail the flow. The URL is always logged as well, so the
//! operator can open it by hand when no launcher works.
//!
//! Launchers are started directly, never through a shell: the authorize URL
//! carries `&`-separated parameters that `cmd.exe` or `sh` would split.

use std::process::Stdio;

use tokio::process::Command;

/// A launcher as `(program, leading args)`. The URL is appended as the last
/// argument.
pub type Launcher<'a> = (&'a str, &'a [&'a str]);

/// Launchers tried in order on this platform, unless the flow is given its
/// own list.
#[cfg(target_os = "macos")]
pub const LAUNCHERS: &[Launcher<'static>] =
    &[("open", &[]), ("xdg-open", &[]), ("google-chrome", &[])];

#[cfg(target_os = "windows")]
pub const LAUNCHERS: &[Launcher<'static>] = &[
    ("rundll32", &["url.dll,FileProtocolHandler"]),
    ("explorer", &[]),
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const LAUNCHERS: &[Launcher<'static>] = &[
    ("xdg-open", &[]),
    ("sensible-browser", &[]),
    ("google-chrome", &[]),
    ("open", &[]),
];

/// Try each of `launchers` in order until one exits successfully.
///
/// Returns the program that worked, if any.
pub async fn open_url_with<'a>(launchers: &[Launcher<'a>], url: &str) -> Option<&'a str> {
    for &(program, args) in launchers {
        let status = command(program, args, url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {
                tracing::debug!(launcher = program, "opened authorize URL in browser");
                return Some(program);
            }
            Ok(status) => tracing::trace!(launcher = program, %status, "browser launcher failed"),
            Err(e) => tracing::trace!(launcher = program, error = %e, "browser launcher unavailable"),
        }
    }

    tracing::warn!(url = %url, "error opening URL in browser");
    None
}

/// Fire-and-forget [`open_url_with`] on a detached task.
pub fn spawn_open(launchers: &'static [Launcher<'static>], url: String) {
    tokio::spawn(async move {
        open_url_with(launchers, &url).await;
    });
}

fn command(program: &str, args: &[&str], url: &str) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args).arg(url);
    cmd
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
