//! Real-time scheduling for burst timing (Linux SCHED_FIFO / affinity / mlockall; macOS mlockall).
//!
//! Applied once per process, from the thread that later spawns the burst
//! worker; Linux threads inherit scheduling policy and priority from their
//! creator. Every step is best effort and failures are logged as warnings.

use crate::cli::RtLock;

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn mlock(flags: libc::c_int) -> std::io::Result<()> {
    let rc = unsafe { libc::mlockall(flags) };
    if rc != 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use super::{RtLock, mlock};
    use libc::{CPU_ISSET, CPU_SET, CPU_ZERO, SCHED_FIFO};

    /// Capacity of cpu_set_t in CPU indices (bits).
    const MAX_CPUSET_BITS: usize = std::mem::size_of::<libc::cpu_set_t>() * 8;
    const CAP_SYS_NICE: u64 = 1 << 23;

    fn retryable(err: &std::io::Error) -> bool {
        matches!(err.raw_os_error(), Some(code) if code == libc::EPERM || code == libc::ENOMEM)
    }

    fn memlock_limit() -> Option<String> {
        let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
        let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) };
        if rc != 0 {
            return None;
        }
        let cur = unsafe { rlim.assume_init() }.rlim_cur;
        Some(if cur == libc::RLIM_INFINITY {
            "memlock limit: unlimited".to_string()
        } else {
            format!("memlock limit: {} KiB", cur / 1024)
        })
    }

    pub(super) fn lock_memory(lock: RtLock) -> eyre::Result<()> {
        let err = match lock {
            RtLock::None => return Ok(()),
            RtLock::Current => match mlock(libc::MCL_CURRENT) {
                Ok(()) => return Ok(()),
                Err(e) => e,
            },
            RtLock::All => match mlock(libc::MCL_CURRENT | libc::MCL_FUTURE) {
                Ok(()) => return Ok(()),
                // Fall back to resident pages only.
                Err(e) if retryable(&e) => match mlock(libc::MCL_CURRENT) {
                    Ok(()) => {
                        tracing::warn!(error = %e, "mlockall(current|future) failed; locked current pages only");
                        return Ok(());
                    }
                    Err(_) => e,
                },
                Err(e) => e,
            },
        };
        let mut msg = format!("mlockall failed: {err}");
        if retryable(&err) {
            if let Some(limit) = memlock_limit() {
                msg.push_str(&format!("; {limit}"));
            }
            msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'");
        }
        Err(eyre::eyre!(msg))
    }

    fn has_sys_nice() -> bool {
        let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
            return true;
        };
        status
            .lines()
            .filter(|l| l.starts_with("CapEff:"))
            .filter_map(|l| l.split_whitespace().nth(1))
            .filter_map(|hex| u64::from_str_radix(hex, 16).ok())
            .any(|caps| caps & CAP_SYS_NICE != 0)
    }

    pub(super) fn fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
        let euid = unsafe { libc::geteuid() };
        if euid != 0 && !has_sys_nice() {
            eyre::bail!(
                "SCHED_FIFO needs CAP_SYS_NICE or root (euid {euid}); \
                 try 'sudo setcap cap_sys_nice=ep $(which stimctl)'"
            );
        }
        let (min, max) = unsafe {
            (
                libc::sched_get_priority_min(SCHED_FIFO),
                libc::sched_get_priority_max(SCHED_FIFO),
            )
        };
        let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
        let prio = prio.unwrap_or(max).clamp(min, max);
        let param = libc::sched_param {
            sched_priority: prio,
        };
        let rc = unsafe { libc::sched_setscheduler(0, SCHED_FIFO, &param) };
        if rc != 0 {
            return Err(eyre::eyre!(std::io::Error::last_os_error()));
        }
        Ok(prio)
    }

    pub(super) fn pin_cpu(cpu: Option<usize>) -> eyre::Result<usize> {
        let target = cpu.unwrap_or(0);
        let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
        if online < 1 {
            eyre::bail!("_SC_NPROCESSORS_ONLN < 1");
        }
        if target as libc::c_long >= online {
            eyre::bail!("requested CPU {target} >= online {online}");
        }
        if target >= MAX_CPUSET_BITS {
            eyre::bail!("requested CPU {target} exceeds cpu_set_t capacity {MAX_CPUSET_BITS}");
        }
        let size = std::mem::size_of::<libc::cpu_set_t>();
        let mut allowed: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::sched_getaffinity(0, size, &mut allowed) };
        if rc == 0 && !unsafe { CPU_ISSET(target, &allowed) } {
            eyre::bail!("CPU {target} not permitted by current affinity mask");
        }
        let mut desired: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        unsafe {
            CPU_ZERO(&mut desired);
            CPU_SET(target, &mut desired);
        }
        let rc = unsafe { libc::sched_setaffinity(0, size, &desired) };
        if rc != 0 {
            return Err(eyre::eyre!(std::io::Error::last_os_error()));
        }
        Ok(target)
    }
}

#[cfg(target_os = "linux")]
pub fn setup_rt_once(rt: bool, prio: Option<i32>, lock: RtLock, rt_cpu: Option<usize>) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();
    if !rt {
        return;
    }
    RT_ONCE.get_or_init(|| {
        match linux::lock_memory(lock) {
            Ok(()) => tracing::info!(mode = ?lock, "rt: memory lock applied"),
            Err(err) => tracing::warn!(error = %err, "rt: memory lock not applied"),
        }
        match linux::fifo_priority(prio) {
            Ok(p) => tracing::info!(prio = p, "rt: SCHED_FIFO applied"),
            Err(err) => tracing::warn!(error = %err, "rt: SCHED_FIFO not applied"),
        }
        match linux::pin_cpu(rt_cpu) {
            Ok(cpu) => tracing::info!(cpu, "rt: pinned"),
            Err(err) => tracing::warn!(error = %err, "rt: affinity not applied"),
        }
    });
}

#[cfg(target_os = "macos")]
pub fn setup_rt_once(rt: bool, lock: RtLock) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();
    if !rt {
        return;
    }
    RT_ONCE.get_or_init(|| {
        let res = match lock {
            RtLock::None => Ok(()),
            RtLock::Current => mlock(libc::MCL_CURRENT),
            RtLock::All => mlock(libc::MCL_CURRENT | libc::MCL_FUTURE),
        };
        match res {
            Ok(()) => tracing::info!(mode = ?lock, "rt: memory lock applied"),
            Err(err) => tracing::warn!(error = %err, "rt: memory lock not applied"),
        }
        tracing::warn!("rt: macOS has no SCHED_FIFO or affinity; only mlockall applied");
    });
}
