// src/utils/shutdown.rs
//! Process signals that stop the miner

use crate::utils::error::MinerError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancels `token` on the first SIGINT or SIGTERM
///
/// The handlers are installed before this returns, so a signal arriving
/// right afterwards is not lost. The listener task also ends once `token`
/// is cancelled for any other reason. Must be called inside a tokio runtime.
///
/// # Errors
/// Returns `MinerError::IoError` if a signal handler cannot be installed.
#[cfg(unix)]
pub fn cancel_on_signal(token: CancellationToken) -> Result<JoinHandle<()>, MinerError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => log::info!("Received SIGINT, stopping workers"),
            _ = sigterm.recv() => log::info!("Received SIGTERM, stopping workers"),
            _ = token.cancelled() => return,
        }
        token.cancel();
    }))
}

/// Cancels `token` on Ctrl-C
///
/// # Errors
/// Never fails on this platform; the signature matches the unix version.
#[cfg(not(unix))]
pub fn cancel_on_signal(token: CancellationToken) -> Result<JoinHandle<()>, MinerError> {
    Ok(tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => log::info!("Received Ctrl-C, stopping workers"),
                Err(e) => {
                    log::error!("Unable to listen for Ctrl-C: {}", e);
                    return;
                }
            },
            _ = token.cancelled() => return,
        }
        token.cancel();
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[cfg(unix)]
    #[tokio::test]
    async fn sigterm_cancels_the_token() {
        let token = CancellationToken::new();
        let listener = cancel_on_signal(token.clone()).unwrap();

        let status = std::process::Command::new("kill")
            .arg("-TERM")
            .arg(std::process::id().to_string())
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .expect("SIGTERM should cancel the token");
        listener.await.unwrap();
    }

    #[tokio::test]
    async fn listener_ends_when_the_token_is_cancelled_elsewhere() {
        let token = CancellationToken::new();
        let listener = cancel_on_signal(token.clone()).unwrap();

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), listener)
            .await
            .expect("listener should stop")
            .unwrap();
    }
}
