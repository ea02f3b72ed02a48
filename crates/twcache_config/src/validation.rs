use std::{fmt, net::SocketAddr};

use crate::{CacheBackend, TwcacheConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Warning,
    Error,
}

/// Problems found in a loaded configuration, in detection order.
#[derive(Debug, Default)]
pub struct ConfigReport {
    issues: Vec<(Severity, String)>,
}

impl ConfigReport {
    /// A config with errors must not be used as-is.
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|(sev, _)| *sev == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.of(Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.of(Severity::Warning)
    }

    fn of(&self, severity: Severity) -> impl Iterator<Item = &str> {
        self.issues
            .iter()
            .filter(move |(sev, _)| *sev == severity)
            .map(|(_, msg)| msg.as_str())
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.issues.push((Severity::Warning, message.into()));
    }

    fn error(&mut self, message: impl Into<String>) {
        self.issues.push((Severity::Error, message.into()));
    }
}

/// Errors first, then warnings, one `- ` line each.
impl fmt::Display for ConfigReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sections = 0;
        for (title, severity) in [("Errors", Severity::Error), ("Warnings", Severity::Warning)] {
            let mut lines = self.of(severity).peekable();
            if lines.peek().is_none() {
                continue;
            }
            if sections > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{title}:")?;
            for line in lines {
                writeln!(f, "  - {line}")?;
            }
            sections += 1;
        }
        Ok(())
    }
}

/// Validate a configuration and return a report of issues.
pub fn validate(cfg: &TwcacheConfig) -> ConfigReport {
    let mut report = ConfigReport::default();

    validate_server(cfg, &mut report);
    validate_auth(cfg, &mut report);
    validate_cache(cfg, &mut report);
    validate_forward(cfg, &mut report);

    report
}

fn validate_server(cfg: &TwcacheConfig, report: &mut ConfigReport) {
    if cfg.server.listen.parse::<SocketAddr>().is_err() {
        report.error(format!(
            "server.listen '{}' is not a valid socket address",
            cfg.server.listen
        ));
    }
    if cfg.server.max_connections == 0 {
        report.error("server.max_connections must be greater than 0");
    }
}

fn validate_auth(cfg: &TwcacheConfig, report: &mut ConfigReport) {
    if cfg.auth.api_key.is_empty() {
        report.error("auth.api_key is empty; every request would be rejected");
    } else if cfg.auth.uses_default_key() {
        report.warn("auth.api_key is the built-in default; set CACHE_API_KEY in production");
    }
}

fn validate_cache(cfg: &TwcacheConfig, report: &mut ConfigReport) {
    match cfg.cache.backend {
        CacheBackend::Sqlite => {
            if cfg.cache.db_path.trim().is_empty() {
                report.error("cache.db_path is empty");
            }
            if cfg.cache.max_db_connections == 0 {
                report.error("cache.max_db_connections must be greater than 0");
            }
            if cfg.cache.busy_timeout_ms == 0 {
                report.warn("cache.busy_timeout_ms is 0; contended writes will fail immediately");
            }
        }
        CacheBackend::Memory => {
            report.warn("cache.backend is 'memory'; cached entries are lost on restart");
        }
    }
}

fn validate_forward(cfg: &TwcacheConfig, report: &mut ConfigReport) {
    let fwd = &cfg.forward;
    if fwd.min_timeout_secs == 0 {
        report.error("forward.min_timeout_secs must be greater than 0");
    }
    if fwd.min_timeout_secs > fwd.max_timeout_secs {
        report.error(format!(
            "forward.min_timeout_secs ({}) is greater than forward.max_timeout_secs ({})",
            fwd.min_timeout_secs, fwd.max_timeout_secs
        ));
    } else if !fwd.timeout_in_range(fwd.default_timeout_secs) {
        report.error(format!(
            "forward.default_timeout_secs ({}) is outside [{}, {}]",
            fwd.default_timeout_secs, fwd.min_timeout_secs, fwd.max_timeout_secs
        ));
    }
}
