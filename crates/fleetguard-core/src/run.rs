//! Per-invocation run configuration

use crate::feature::{Feature, Preset};
use crate::profile::Profile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What the operator asked for in one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Requested hardening profile
    pub profile: Profile,

    /// Features to keep working; rules that break them are skipped
    #[serde(default)]
    pub requested_features: BTreeSet<Feature>,

    /// Audit mode runs only audit rules; remediation mode runs only the others
    #[serde(default)]
    pub audit: bool,
}

impl RunConfiguration {
    /// Remediation run for a profile with no features requested
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            requested_features: BTreeSet::new(),
            audit: false,
        }
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.requested_features.insert(feature);
        self
    }

    pub fn with_features(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        self.requested_features.extend(features);
        self
    }

    /// Add the features implied by a preset
    pub fn with_preset(self, preset: Preset) -> Self {
        self.with_features(preset.features().iter().copied())
    }

    pub fn with_audit(mut self, audit: bool) -> Self {
        self.audit = audit;
        self
    }
}
