//! Machine roles.

use std::collections::BTreeMap;

use thiserror::Error;

/// Label carrying a machine's role.
pub const ROLE_LABEL: &str = "cluster.k8s.io/role";

/// Label naming the cluster a machine belongs to.
pub const CLUSTER_NAME_LABEL: &str = "cluster.k8s.io/cluster-name";

/// Role a machine plays in its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Runs the cluster's API and management components.
    ControlPlane,
    /// Runs regular workloads.
    Worker,
}

impl Role {
    pub const fn as_label(&self) -> &'static str {
        match self {
            Role::ControlPlane => "controlplane",
            Role::Worker => "node",
        }
    }

    pub const fn is_control_plane(&self) -> bool {
        matches!(self, Role::ControlPlane)
    }

    /// Resolve the role from a machine's labels.
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Result<Self, RoleError> {
        labels
            .get(ROLE_LABEL)
            .ok_or(RoleError::Missing)?
            .parse()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "controlplane" => Ok(Role::ControlPlane),
            "node" => Ok(Role::Worker),
            "" => Err(RoleError::Missing),
            other => Err(RoleError::Unknown(other.to_string())),
        }
    }
}

/// Why a machine's role could not be resolved.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoleError {
    #[error("machine has no 'cluster.k8s.io/role' label")]
    Missing,

    #[error("unknown machine role '{0}'")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn labels(role: Option<&str>) -> BTreeMap<String, String> {
        role.map(|r| BTreeMap::from([(ROLE_LABEL.to_string(), r.to_string())]))
            .unwrap_or_default()
    }

    #[rstest]
    #[case(Some("controlplane"), Ok(Role::ControlPlane))]
    #[case(Some("node"), Ok(Role::Worker))]
    #[case(Some(""), Err(RoleError::Missing))]
    #[case(None, Err(RoleError::Missing))]
    #[case(Some("master"), Err(RoleError::Unknown("master".into())))]
    fn test_role_from_labels(#[case] label: Option<&str>, #[case] expected: Result<Role, RoleError>) {
        assert_eq!(Role::from_labels(&labels(label)), expected);
    }

    #[test]
    fn test_role_label_roundtrip() {
        for role in [Role::ControlPlane, Role::Worker] {
            assert_eq!(role.as_label().parse::<Role>(), Ok(role));
        }
    }
}
