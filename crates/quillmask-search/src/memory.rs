use sysinfo::{MemoryRefreshKind, RefreshKind, System};

/// Free (available) system memory in kilobytes.
pub fn free_memory_in_kbytes() -> u64 {
    let sys = System::new_with_specifics(
        RefreshKind::new().with_memory(MemoryRefreshKind::new().with_ram()),
    );
    sys.available_memory() / 1024
}

/// Resident set size of the current process in kilobytes.
pub fn used_memory_in_kbytes() -> u64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };
    let mut sys = System::new();
    if !sys.refresh_process(pid) {
        return 0;
    }
    sys.process(pid).map(|p| p.memory() / 1024).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probes_report_nonzero_on_a_live_system() {
        assert!(free_memory_in_kbytes() > 0);
        assert!(used_memory_in_kbytes() > 0);
    }
}
