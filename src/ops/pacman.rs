//! pacman-flavored operation descriptors.
//!
//! Installs are grouped into batches so one pacman transaction covers
//! several packages; updates and removes stay individual so a single
//! failure does not take unrelated packages down with it.

use crate::scheduler::{OperationDescriptor, OperationKind};

/// Packages per batched install transaction.
const INSTALL_BATCH_SIZE: usize = 5;

/// Estimated seconds per package in a batched install.
const INSTALL_ESTIMATE_SECS: f64 = 30.0;

/// Estimated seconds for an individual update or remove.
const OTHER_ESTIMATE_SECS: f64 = 15.0;

/// Builds descriptors for the given packages.
///
/// Install batches are named `batch-<n>-<pkg+pkg+...>` so the batch name
/// stays a usable identifier; list order doubles as priority.
pub fn operations(packages: &[String], kind: OperationKind) -> Vec<OperationDescriptor> {
    match kind {
        OperationKind::Install => batched_installs(packages),
        OperationKind::Update | OperationKind::Remove => individual(packages, kind),
    }
}

fn batched_installs(packages: &[String]) -> Vec<OperationDescriptor> {
    packages
        .chunks(INSTALL_BATCH_SIZE)
        .enumerate()
        .map(|(index, batch)| {
            let mut command = vec![
                "sudo".to_string(),
                "pacman".to_string(),
                "-S".to_string(),
                "--needed".to_string(),
                "--noconfirm".to_string(),
            ];
            command.extend(batch.iter().cloned());

            let name = format!("batch-{}-{}", index, batch.join("+"));
            let start = index * INSTALL_BATCH_SIZE;

            OperationDescriptor::new(name, OperationKind::Install, "pacman", command)
                .with_priority(100 - start as i32)
                .with_estimated_secs(INSTALL_ESTIMATE_SECS * batch.len() as f64)
        })
        .collect()
}

fn individual(packages: &[String], kind: OperationKind) -> Vec<OperationDescriptor> {
    packages
        .iter()
        .enumerate()
        .map(|(index, package)| {
            let flag = match kind {
                OperationKind::Remove => "-R",
                _ => "-S",
            };
            let command = vec![
                "sudo".to_string(),
                "pacman".to_string(),
                flag.to_string(),
                "--noconfirm".to_string(),
                package.clone(),
            ];

            OperationDescriptor::new(package.clone(), kind, "pacman", command)
                .with_priority(100 - index as i32)
                .with_estimated_secs(OTHER_ESTIMATE_SECS)
        })
        .collect()
}
