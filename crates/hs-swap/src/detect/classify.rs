//! Per-process classification rules

use hs_core::traits::ProcessInfo;
use hs_core::ClientKind;

/// Process names of the Firedancer client
pub const FD_NAMES: &[&str] = &["fdctl", "firedancer"];

/// Process names of the Agave client
pub const AGAVE_NAMES: &[&str] = &["agave-validator", "solana-validator"];

/// Subcommands that mean Firedancer is actually validating
const FD_RUN_TOKENS: &[&str] = &["run", "run1"];

/// Arguments of short-lived Firedancer invocations
const FD_EXCLUDED_TOKENS: &[&str] = &["set-identity", "--help", "--version"];

fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn name_pool(process: &ProcessInfo) -> [Option<String>; 2] {
    [
        Some(base_name(&process.name).to_ascii_lowercase()),
        process.exe_basename().map(str::to_ascii_lowercase),
    ]
}

fn pool_matches(pool: &[Option<String>; 2], names: &[&str]) -> bool {
    pool.iter().flatten().any(|n| names.contains(&n.as_str()))
}

/// Local rule: name pool or argument substring, Firedancer first
pub fn classify_local(process: &ProcessInfo) -> Option<ClientKind> {
    let pool = name_pool(process);
    let args = process.command_line();

    if pool_matches(&pool, FD_NAMES) || FD_NAMES.iter().any(|n| args.contains(n)) {
        return Some(ClientKind::Fd);
    }
    if pool_matches(&pool, AGAVE_NAMES) || AGAVE_NAMES.iter().any(|n| args.contains(n)) {
        return Some(ClientKind::Agave);
    }
    None
}

/// Whether the arguments carry a Firedancer run subcommand
pub fn has_run_token(args: &[String]) -> bool {
    args.iter().skip(1).any(|a| {
        let a = a.to_ascii_lowercase();
        FD_RUN_TOKENS.contains(&a.as_str()) || a.starts_with("run-agave")
    })
}

/// A running Firedancer validator: matched by name, in run mode, and not a
/// one-off control command
pub fn is_fd_validator(process: &ProcessInfo) -> bool {
    let named = pool_matches(&name_pool(process), FD_NAMES)
        || process
            .args
            .iter()
            .skip(1)
            .any(|a| a.eq_ignore_ascii_case("firedancer"));
    if !named || !has_run_token(&process.args) {
        return false;
    }
    !process.args.iter().skip(1).any(|a| {
        let a = a.to_ascii_lowercase();
        FD_EXCLUDED_TOKENS.contains(&a.as_str())
    })
}

/// An Agave validator: matched by name or by a whole argument word
pub fn is_agave_validator(process: &ProcessInfo) -> bool {
    if pool_matches(&name_pool(process), AGAVE_NAMES) {
        return true;
    }
    process
        .args
        .iter()
        .flat_map(|a| a.split_whitespace())
        .any(|word| AGAVE_NAMES.iter().any(|n| word.eq_ignore_ascii_case(n)))
}

/// Remote exhaustive-scan rule. The ledger filter applies to Agave only.
pub fn classify_remote(process: &ProcessInfo, ledger: Option<&str>) -> Option<ClientKind> {
    if is_fd_validator(process) {
        return Some(ClientKind::Fd);
    }
    if is_agave_validator(process) {
        let in_ledger = ledger.map_or(true, |dir| process.references_path(dir));
        if in_ledger {
            return Some(ClientKind::Agave);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc(name: &str, args: &[&str]) -> ProcessInfo {
        ProcessInfo {
            pid: 1,
            name: name.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_local_prefers_fd_per_process() {
        let p = proc("bash", &["bash", "-c", "fdctl run; agave-validator"]);
        assert_eq!(classify_local(&p), Some(ClientKind::Fd));
        let a = proc("agave-validator", &["agave-validator", "--ledger", "/l"]);
        assert_eq!(classify_local(&a), Some(ClientKind::Agave));
        assert_eq!(classify_local(&proc("sshd", &["sshd"])), None);
    }

    #[test]
    fn test_fd_requires_run_mode() {
        let running = proc("fdctl", &["/opt/fdctl", "run", "--config", "c.toml"]);
        assert!(is_fd_validator(&running));
        let run1 = proc("fdctl", &["fdctl", "run1", "net", "0"]);
        assert!(is_fd_validator(&run1));
        let agave_tile = proc("fdctl", &["fdctl", "run-agave", "--config", "c"]);
        assert!(is_fd_validator(&agave_tile));

        let control = proc("fdctl", &["fdctl", "set-identity", "--config", "c", "k", "run"]);
        assert!(!is_fd_validator(&control));
        let help = proc("fdctl", &["fdctl", "run", "--help"]);
        assert!(!is_fd_validator(&help));
        let configure = proc("fdctl", &["fdctl", "configure", "init", "all"]);
        assert!(!is_fd_validator(&configure));
    }

    #[test]
    fn test_agave_whole_word_match() {
        let wrapped = proc("systemd-run", &["systemd-run", "agave-validator", "--ledger", "/l"]);
        assert!(is_agave_validator(&wrapped));
        let lookalike = proc("tail", &["tail", "-f", "/var/log/agave-validator.log"]);
        assert!(!is_agave_validator(&lookalike));
    }

    #[test]
    fn test_remote_ledger_filter_is_agave_only() {
        let mut agave = proc("agave-validator", &["agave-validator", "--ledger", "/mnt/a"]);
        agave.cwd = Some("/".into());
        assert_eq!(classify_remote(&agave, Some("/mnt/a")), Some(ClientKind::Agave));
        assert_eq!(classify_remote(&agave, Some("/mnt/b")), None);

        let fd = proc("fdctl", &["fdctl", "run"]);
        assert_eq!(classify_remote(&fd, Some("/mnt/b")), Some(ClientKind::Fd));
    }
}
