//! Cluster profile supplied by the introspection collaborator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of third-party controller detected in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControllerKind {
    Gitops,
    ServiceMesh,
    Ingress,
    Secrets,
    Monitoring,
    Security,
}

impl ControllerKind {
    /// Lowercase identifier used when matching controller kinds against
    /// catalog tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerKind::Gitops => "gitops",
            ControllerKind::ServiceMesh => "service-mesh",
            ControllerKind::Ingress => "ingress",
            ControllerKind::Secrets => "secrets",
            ControllerKind::Monitoring => "monitoring",
            ControllerKind::Security => "security",
        }
    }
}

/// A third-party controller detected in the cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedController {
    pub name: String,
    pub kind: ControllerKind,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Immutable snapshot of the target cluster, consumed read-only.
///
/// Produced once per run by the cluster introspection collaborator; the
/// engine never refreshes or mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterProfile {
    /// Platform identity (e.g. a managed service name), if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Cluster version string.
    pub version: String,

    #[serde(default)]
    pub node_count: u32,

    #[serde(default)]
    pub namespace_count: u32,

    /// Detected third-party controllers and add-ons.
    #[serde(default)]
    pub controllers: Vec<DetectedController>,

    /// Security posture flags (feature name -> enabled).
    #[serde(default)]
    pub security_features: BTreeMap<String, bool>,

    /// Compliance frameworks the cluster declares.
    #[serde(default)]
    pub compliance_frameworks: Vec<String>,
}

impl ClusterProfile {
    /// Minimal profile for a bare cluster, useful as a test baseline.
    pub fn bare(version: impl Into<String>) -> Self {
        Self {
            platform: None,
            version: version.into(),
            node_count: 0,
            namespace_count: 0,
            controllers: Vec::new(),
            security_features: BTreeMap::new(),
            compliance_frameworks: Vec::new(),
        }
    }

    /// Lowercased controller names and kind identifiers, used by the
    /// candidate filter's tag matching.
    pub fn controller_terms(&self) -> Vec<String> {
        let mut terms = Vec::with_capacity(self.controllers.len() * 2);
        for controller in &self.controllers {
            terms.push(controller.name.to_lowercase());
            terms.push(controller.kind.as_str().to_string());
        }
        terms.sort();
        terms.dedup();
        terms
    }
}
