//! NetCert Core Engine - Network Security Certification CLI

use netcert_core::{run_with_ctrl_c, AppContext};

#[tokio::main]
async fn main() {
    if let Err(e) = netcert_core::logging::init_logging() {
        eprintln!("[WARN] Failed to initialize structured logging: {}", e);
    }

    let context = AppContext::from_env();
    if let Err(e) = run_with_ctrl_c(std::env::args(), &context).await {
        netcert_core::log_error!("{:#}", e);
        std::process::exit(1);
    }
}
