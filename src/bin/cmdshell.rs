// EN: src/bin/cmdshell.rs

use clap::Parser;
use cmdshell::{CancellationToken, cli::Cli};
use colored::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// The main entry point of the `cmdshell` application.
/// It sets up logging and Ctrl+C handling, runs the command, and exits with
/// the interpreter's exit status.
fn main() {
    env_logger::init();

    let cancellation_token = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(&cancellation_token);

    match cmdshell::cli::run(&Cli::parse(), &cancellation_token) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // --- Centralized Error Handling ---
            eprintln!("\n{}: {:#}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Raises `token` on the first Ctrl+C.
///
/// The signal is awaited on a small single-threaded runtime living on its own
/// thread, so the blocking run on the main thread is not affected.
fn install_interrupt_handler(token: &CancellationToken) {
    let token = token.clone();
    let spawned = thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    log::warn!("Ctrl+C handling unavailable: {}", e);
                    return;
                }
            };
            match runtime.block_on(tokio::signal::ctrl_c()) {
                Ok(()) => {
                    log::debug!("Ctrl+C received, interrupting the run");
                    token.store(true, Ordering::SeqCst);
                }
                Err(e) => log::warn!("Failed to listen for Ctrl+C: {}", e),
            }
        });
    if let Err(e) = spawned {
        log::warn!("Could not start the Ctrl+C listener: {}", e);
    }
}
