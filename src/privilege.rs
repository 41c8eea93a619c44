//! The collector reads socket tables and firewall state, which usually needs root.

/// Whether the current process runs with elevated privileges.
#[cfg(unix)]
pub fn is_elevated() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_elevated() -> bool {
    // No cheap runtime check; the collector reports its own failures.
    true
}

/// Non-fatal warning printed before a scan or enumeration without privileges.
pub fn privilege_warning() -> String {
    let exe = std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|s| s.to_string_lossy().to_string()))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
    format!(
        "WARNING: Running without elevated privileges.\n\
        The collector may not see every socket, process or firewall rule,\n\
        so the report can under-count risky ports and connections.\n\
        For a complete scan run: sudo {} [args]",
        exe
    )
}
