//! Principal URNs and the permission lists sent with deploy and run requests.

use flowsmith_types::{DeployOptions, RunOptions};

pub const GROUP_URN_PREFIX: &str = "urn:globus:groups:id:";
pub const IDENTITY_URN_PREFIX: &str = "urn:globus:auth:identity:";

/// Kind of principal a permission is granted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalKind {
    Group,
    Identity,
}

/// Permission lists a client can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPermission {
    VisibleTo,
    RunnableBy,
    AdministeredBy,
    ManageBy,
    MonitorBy,
}

impl FlowPermission {
    /// Permissions set when deploying or updating a flow.
    pub const DEPLOY: [FlowPermission; 3] = [FlowPermission::VisibleTo, FlowPermission::RunnableBy, FlowPermission::AdministeredBy];
    /// Permissions set when starting a run.
    pub const RUN: [FlowPermission; 2] = [FlowPermission::ManageBy, FlowPermission::MonitorBy];

    pub fn field_name(&self) -> &'static str {
        match self {
            FlowPermission::VisibleTo => "visible_to",
            FlowPermission::RunnableBy => "runnable_by",
            FlowPermission::AdministeredBy => "administered_by",
            FlowPermission::ManageBy => "manage_by",
            FlowPermission::MonitorBy => "monitor_by",
        }
    }

    fn deploy_list<'a>(&self, options: &'a mut DeployOptions) -> Option<&'a mut Vec<String>> {
        match self {
            FlowPermission::VisibleTo => Some(&mut options.visible_to),
            FlowPermission::RunnableBy => Some(&mut options.runnable_by),
            FlowPermission::AdministeredBy => Some(&mut options.administered_by),
            FlowPermission::ManageBy | FlowPermission::MonitorBy => None,
        }
    }

    fn run_list<'a>(&self, options: &'a mut RunOptions) -> Option<&'a mut Vec<String>> {
        match self {
            FlowPermission::ManageBy => Some(&mut options.manage_by),
            FlowPermission::MonitorBy => Some(&mut options.monitor_by),
            _ => None,
        }
    }
}

/// URN for a principal id. Ids that already carry a URN prefix are returned unchanged.
pub fn principal_urn(kind: PrincipalKind, id: &str) -> String {
    if id.starts_with("urn:") {
        return id.to_string();
    }
    match kind {
        PrincipalKind::Group => format!("{GROUP_URN_PREFIX}{id}"),
        PrincipalKind::Identity => format!("{IDENTITY_URN_PREFIX}{id}"),
    }
}

/// Grant `principals` on every deploy-time permission.
pub fn apply_deploy_permissions(options: &mut DeployOptions, principals: &[String]) {
    for permission in FlowPermission::DEPLOY {
        if let Some(list) = permission.deploy_list(options) {
            list.extend(principals.iter().cloned());
        }
    }
}

/// Grant `principals` on every run-time permission.
pub fn apply_run_permissions(options: &mut RunOptions, principals: &[String]) {
    for permission in FlowPermission::RUN {
        if let Some(list) = permission.run_list(options) {
            list.extend(principals.iter().cloned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urns_are_prefixed_once() {
        assert_eq!(principal_urn(PrincipalKind::Group, "g-1"), "urn:globus:groups:id:g-1");
        assert_eq!(principal_urn(PrincipalKind::Identity, "u-1"), "urn:globus:auth:identity:u-1");
        assert_eq!(principal_urn(PrincipalKind::Group, "urn:globus:groups:id:g-1"), "urn:globus:groups:id:g-1");
    }

    #[test]
    fn permissions_fill_every_list() {
        let principals = vec![principal_urn(PrincipalKind::Group, "g-1")];
        let mut deploy = DeployOptions::default();
        apply_deploy_permissions(&mut deploy, &principals);
        assert_eq!(deploy.visible_to, principals);
        assert_eq!(deploy.runnable_by, principals);
        assert_eq!(deploy.administered_by, principals);

        let mut run = RunOptions::default();
        apply_run_permissions(&mut run, &principals);
        assert_eq!(run.manage_by, principals);
        assert_eq!(run.monitor_by, principals);
        assert_eq!(FlowPermission::RUN.map(|p| p.field_name()), ["manage_by", "monitor_by"]);
    }
}
