//! End-to-end patch resolution tests.

use machinecfg_patch::{load_patches, resolve, PatchError};
use proptest::prelude::*;
use rstest::rstest;

const BASE: &str = "\
version: v1alpha1
machine:
  type: controlplane
  install:
    disk: /dev/sda
cluster:
  clusterName: demo
";

#[test]
fn test_no_patches_returns_base_verbatim() {
    let out = resolve::<&str>(BASE, &[]).unwrap();
    assert_eq!(out, BASE.as_bytes());
}

#[test]
fn test_patches_apply_in_order() {
    // Patch 1 relies on the mapping introduced by patch 0.
    let patches = [
        "machine:\n  network:\n    hostname: cp-1\n",
        "- op: replace\n  path: /machine/network/hostname\n  value: cp-2\n",
    ];

    let out = String::from_utf8(resolve(BASE, &patches).unwrap()).unwrap();
    assert!(out.contains("hostname: cp-2"));
    assert!(!out.contains("hostname: cp-1"));
}

#[test]
fn test_order_is_load_bearing() {
    let patches = [
        "- op: replace\n  path: /machine/network/hostname\n  value: cp-2\n",
        "machine:\n  network:\n    hostname: cp-1\n",
    ];

    let err = resolve(BASE, &patches).unwrap_err();
    assert!(matches!(err, PatchError::Apply { index: 0, .. }));
}

#[test]
fn test_failing_patch_produces_no_document() {
    let patches = [
        "machine:\n  install:\n    wipe: true\n",
        "- op: remove\n  path: /does/not/exist\n",
        "cluster:\n  clusterName: other\n",
    ];

    let err = resolve(BASE, &patches).unwrap_err();
    assert_eq!(err.patch_index(), Some(1));
}

#[test]
fn test_empty_patch_is_noop() {
    let out = resolve(BASE, &[""]).unwrap();
    let reparsed: serde_yaml::Value = serde_yaml::from_slice(&out).unwrap();
    let original: serde_yaml::Value = serde_yaml::from_str(BASE).unwrap();
    assert_eq!(reparsed, original);
}

#[rstest]
#[case::scalar("just text", 0)]
#[case::bad_op("- op: nope\n  path: /a\n", 0)]
#[case::mixed_sequence("- op: add\n  path: /a\n  value: 1\n- 42\n", 0)]
fn test_load_errors(#[case] text: &str, #[case] index: usize) {
    let err = load_patches(&[text]).unwrap_err();
    assert!(err.is_load_error());
    assert_eq!(err.patch_index(), Some(index));
}

#[test]
fn test_load_error_reports_position() {
    let err = load_patches(&["machine: {}", "", "not: [valid"]).unwrap_err();
    assert_eq!(err.patch_index(), Some(2));
}

#[test]
fn test_multi_document_merge_by_kind() {
    let base = "version: v1alpha1\n---\napiVersion: v1alpha1\nkind: ExtensionServiceConfig\nname: nut\nenvironment:\n- A=1\n";
    let patch = "apiVersion: v1alpha1\nkind: ExtensionServiceConfig\nname: nut\nenvironment:\n- B=2\n";

    let out = String::from_utf8(resolve(base, &[patch]).unwrap()).unwrap();
    let docs: Vec<&str> = out.split("---\n").collect();
    assert_eq!(docs.len(), 2);
    assert!(docs[1].contains("A=1"));
    assert!(docs[1].contains("B=2"));
}

proptest! {
    #[test]
    fn prop_resolution_is_deterministic(
        hostname in "[a-z][a-z0-9-]{0,20}",
        disk in "/dev/[a-z]{3}",
        sans in proptest::collection::vec("[a-z]{1,8}\\.example", 0..4),
    ) {
        let patches = vec![
            format!("machine:\n  network:\n    hostname: {hostname}\n"),
            format!("- op: replace\n  path: /machine/install/disk\n  value: {disk}\n"),
            format!("machine:\n  certSANs: [{}]\n", sans.join(", ")),
        ];

        let first = resolve(BASE, &patches).unwrap();
        let second = resolve(BASE, &patches).unwrap();
        prop_assert_eq!(first, second);
    }
}
