//! Startup logging and privilege checks for hang-analyzer.
//!
//! Debuggers need ptrace rights over the target processes, so a run as an
//! unprivileged user is allowed but warned about.

use tracing::{info, warn};

/// Logs version, build and host information at the start of a run.
pub fn log_system_info() {
    info!(
        "hang-analyzer {} (built {})",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_BUILD_TIMESTAMP")
    );
    info!(
        "OS: {} {} ({})",
        std::env::consts::OS,
        std::env::consts::ARCH,
        std::env::consts::FAMILY
    );

    log_current_user();

    match std::env::current_dir() {
        Ok(dir) => info!("Working directory: {}", dir.display()),
        Err(e) => warn!("Cannot determine working directory: {}", e),
    }
}

#[cfg(unix)]
fn log_current_user() {
    use nix::unistd::{getuid, User};

    let uid = getuid();
    match User::from_uid(uid) {
        Ok(Some(user)) => info!("Current user: {} (uid={})", user.name, uid),
        Ok(None) => info!("Current user: uid={}", uid),
        Err(e) => tracing::debug!("Failed to look up user for uid={}: {}", uid, e),
    }
}

#[cfg(not(unix))]
fn log_current_user() {
    match std::env::var("USERNAME") {
        Ok(name) => info!("Current user: {}", name),
        Err(_) => info!("Current user: unknown"),
    }
}

/// Warns when running without the privileges debuggers usually need.
#[cfg(unix)]
pub fn check_user_privileges() {
    if !nix::unistd::geteuid().is_root() {
        warn!("Not running as root - debuggers may not be able to attach to other users' processes");
    } else {
        tracing::debug!("Running as root (uid=0)");
    }
}

#[cfg(not(unix))]
pub fn check_user_privileges() {}
