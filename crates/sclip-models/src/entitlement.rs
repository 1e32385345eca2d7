//! Entitlement tiers and the per-job capability snapshot.
//!
//! The snapshot is resolved once at job admission and treated as immutable
//! for the job's lifetime. No ambient "is pro" flag exists anywhere in the
//! pipeline.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::format::FormatId;
use crate::request::ClipOptions;

/// Plan tier granted to an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
}

impl PlanTier {
    /// Parse a plan string from the license server, defaulting to Free for
    /// anything unrecognized (fail-safe toward the restrictive tier).
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "pro" | "lifetime" => PlanTier::Pro,
            _ => PlanTier::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
        }
    }
}

/// Immutable capability snapshot for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct Entitlement {
    pub tier: PlanTier,
}

impl Entitlement {
    pub fn free() -> Self {
        Self {
            tier: PlanTier::Free,
        }
    }

    pub fn pro() -> Self {
        Self {
            tier: PlanTier::Pro,
        }
    }

    pub fn is_pro(&self) -> bool {
        self.tier == PlanTier::Pro
    }

    /// Whether this installation may export at the given tier.
    pub fn allows_format(&self, format: FormatId) -> bool {
        self.is_pro() || !format.requires_pro()
    }

    /// Check the option toggles; AI summaries are a Pro feature.
    ///
    /// Returns the name of the first denied option, or `None` when all
    /// requested options are permitted.
    pub fn denied_option(&self, options: &ClipOptions) -> Option<&'static str> {
        if options.summary && !self.is_pro() {
            return Some("summary");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_fail_safe() {
        assert_eq!(PlanTier::parse("pro"), PlanTier::Pro);
        assert_eq!(PlanTier::parse("Lifetime"), PlanTier::Pro);
        assert_eq!(PlanTier::parse("free"), PlanTier::Free);
        assert_eq!(PlanTier::parse("enterprise"), PlanTier::Free);
        assert_eq!(PlanTier::parse(""), PlanTier::Free);
    }

    #[test]
    fn test_format_gating() {
        let free = Entitlement::free();
        assert!(free.allows_format(FormatId::Hd720p60));
        assert!(!free.allows_format(FormatId::Fhd1080p30));

        let pro = Entitlement::pro();
        assert!(pro.allows_format(FormatId::Uhd2160));
    }

    #[test]
    fn test_summary_option_gating() {
        let options = ClipOptions {
            summary: true,
            ..ClipOptions::default()
        };
        assert_eq!(Entitlement::free().denied_option(&options), Some("summary"));
        assert_eq!(Entitlement::pro().denied_option(&options), None);
        assert_eq!(
            Entitlement::free().denied_option(&ClipOptions::default()),
            None
        );
    }
}
