// Interrupt handling.
// The first Ctrl+C cancels the root token, a second one exits immediately.

use tokio_util::sync::CancellationToken;

/// Exit status after a forced quit.
const FORCE_QUIT_CODE: i32 = 130;

/// Cancel `token` on Ctrl+C.
pub fn install_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            return;
        }
        tracing::debug!("Shutdown requested");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Force quit!");
            std::process::exit(FORCE_QUIT_CODE);
        }
    });
}
