//! Flatpak-flavored operation descriptors.

use crate::scheduler::{OperationDescriptor, OperationKind};

/// Estimated seconds for a Flatpak install.
const INSTALL_ESTIMATE_SECS: f64 = 45.0;

/// Estimated seconds for a Flatpak update or remove.
const OTHER_ESTIMATE_SECS: f64 = 20.0;

/// Builds one descriptor per application id.
///
/// List order doubles as priority: applications earlier in the list are
/// scheduled first. Flatpak handles one ref per invocation, so every
/// application gets its own operation.
pub fn operations(app_ids: &[String], kind: OperationKind) -> Vec<OperationDescriptor> {
    app_ids
        .iter()
        .enumerate()
        .map(|(index, app_id)| {
            let command = match kind {
                OperationKind::Install => vec![
                    "flatpak".to_string(),
                    "install".to_string(),
                    "--noninteractive".to_string(),
                    "flathub".to_string(),
                    app_id.clone(),
                ],
                OperationKind::Update => vec![
                    "flatpak".to_string(),
                    "update".to_string(),
                    "--noninteractive".to_string(),
                    app_id.clone(),
                ],
                OperationKind::Remove => vec![
                    "flatpak".to_string(),
                    "remove".to_string(),
                    "--noninteractive".to_string(),
                    app_id.clone(),
                ],
            };

            let estimate = if kind == OperationKind::Install {
                INSTALL_ESTIMATE_SECS
            } else {
                OTHER_ESTIMATE_SECS
            };

            OperationDescriptor::new(app_id.clone(), kind, "flatpak", command)
                .with_priority(100 - index as i32)
                .with_estimated_secs(estimate)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apps(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_update_command_shape() {
        let ops = operations(&apps(&["org.mozilla.firefox"]), OperationKind::Update);

        assert_eq!(ops.len(), 1);
        assert_eq!(
            ops[0].command,
            vec!["flatpak", "update", "--noninteractive", "org.mozilla.firefox"]
        );
        assert_eq!(ops[0].manager, "flatpak");
        assert_eq!(ops[0].estimated_secs, 20.0);
    }

    #[test]
    fn test_install_targets_flathub() {
        let ops = operations(&apps(&["org.gimp.GIMP"]), OperationKind::Install);

        assert_eq!(
            ops[0].command,
            vec![
                "flatpak",
                "install",
                "--noninteractive",
                "flathub",
                "org.gimp.GIMP"
            ]
        );
        assert_eq!(ops[0].estimated_secs, 45.0);
    }

    #[test]
    fn test_list_order_sets_priority() {
        let ops = operations(
            &apps(&["first.App", "second.App", "third.App"]),
            OperationKind::Remove,
        );

        assert_eq!(ops[0].priority, 100);
        assert_eq!(ops[1].priority, 99);
        assert_eq!(ops[2].priority, 98);
        assert!(ops.iter().all(|op| op.dependencies.is_empty()));
    }
}
