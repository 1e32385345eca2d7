//! External tool probing.
//!
//! Absence of a tool is a normal boolean result, never an error. Probe
//! results are cached process-wide with a short TTL; tools do not appear or
//! disappear mid-session, but a re-probe after a failure is allowed via
//! [`SystemProber::refresh`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The externally-installed tools the pipeline drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalTool {
    Ffmpeg,
    Ffprobe,
    YtDlp,
}

impl ExternalTool {
    /// Executable name looked up in PATH.
    pub fn command(&self) -> &'static str {
        match self {
            ExternalTool::Ffmpeg => "ffmpeg",
            ExternalTool::Ffprobe => "ffprobe",
            ExternalTool::YtDlp => "yt-dlp",
        }
    }

    /// Actionable remedy surfaced with `DependencyMissing` errors.
    pub fn remedy(&self) -> &'static str {
        match self {
            ExternalTool::Ffmpeg | ExternalTool::Ffprobe => {
                "Install FFmpeg (e.g. `brew install ffmpeg` or `apt install ffmpeg`) and make sure it is on PATH"
            }
            ExternalTool::YtDlp => {
                "Install yt-dlp (e.g. `brew install yt-dlp` or `pipx install yt-dlp`) and make sure it is on PATH"
            }
        }
    }
}

impl fmt::Display for ExternalTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command())
    }
}

/// Tool availability oracle.
///
/// Implementations must not fail for "not installed"; that is a `false`.
pub trait ToolProbe: Send + Sync {
    fn check_tool(&self, tool: ExternalTool) -> bool;

    /// First missing tool out of `tools`, if any.
    fn first_missing(&self, tools: &[ExternalTool]) -> Option<ExternalTool> {
        tools.iter().copied().find(|t| !self.check_tool(*t))
    }
}

/// PATH-based prober with a TTL cache.
pub struct SystemProber {
    ttl: Duration,
    cache: Mutex<HashMap<ExternalTool, (bool, Instant)>>,
}

impl Default for SystemProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl SystemProber {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Drop cached results so the next check re-probes PATH.
    pub fn refresh(&self) {
        self.cache.lock().expect("prober cache poisoned").clear();
    }
}

impl ToolProbe for SystemProber {
    fn check_tool(&self, tool: ExternalTool) -> bool {
        let mut cache = self.cache.lock().expect("prober cache poisoned");
        if let Some((available, probed_at)) = cache.get(&tool) {
            if probed_at.elapsed() < self.ttl {
                return *available;
            }
        }

        let available = which::which(tool.command()).is_ok();
        cache.insert(tool, (available, Instant::now()));
        available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(Vec<ExternalTool>);

    impl ToolProbe for FixedProbe {
        fn check_tool(&self, tool: ExternalTool) -> bool {
            self.0.contains(&tool)
        }
    }

    #[test]
    fn test_first_missing_reports_in_order() {
        let probe = FixedProbe(vec![ExternalTool::Ffmpeg]);
        assert_eq!(
            probe.first_missing(&[ExternalTool::Ffmpeg, ExternalTool::YtDlp]),
            Some(ExternalTool::YtDlp)
        );
        assert_eq!(probe.first_missing(&[ExternalTool::Ffmpeg]), None);
    }

    #[test]
    fn test_system_prober_caches() {
        let prober = SystemProber::new(Duration::from_secs(600));
        // Whatever the environment has, two checks within the TTL agree.
        let first = prober.check_tool(ExternalTool::Ffmpeg);
        let second = prober.check_tool(ExternalTool::Ffmpeg);
        assert_eq!(first, second);

        prober.refresh();
        assert_eq!(prober.check_tool(ExternalTool::Ffmpeg), first);
    }

    #[test]
    fn test_remedies_are_actionable() {
        for tool in [ExternalTool::Ffmpeg, ExternalTool::Ffprobe, ExternalTool::YtDlp] {
            assert!(tool.remedy().contains("Install"));
            assert!(tool.remedy().contains("PATH"));
        }
    }
}
