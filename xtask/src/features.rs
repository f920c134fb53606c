use anyhow::{Context, Result};

use crate::cargo;

/// Each tier must build with default features off and nothing else enabled
const FEATURE_TIERS: &[(&str, &[&str])] = &[
    ("courier-common", &[]),
    ("courier-common", &["foundation"]),
    ("courier-common", &["runtime"]),
    ("courier-core", &[]),
    ("courier-core", &["test-utils"]),
];

/// `cargo check` every tier in isolation
pub fn test_feature_matrix() -> Result<()> {
    let total = FEATURE_TIERS.len();
    for (index, (package, features)) in FEATURE_TIERS.iter().enumerate() {
        let joined = features.join(",");
        let tier = if joined.is_empty() { "bare".to_string() } else { joined.clone() };
        println!("[tier {}/{total}] {package}: {tier}", index + 1);

        let mut args = vec!["check", "-p", *package, "--no-default-features"];
        if !joined.is_empty() {
            args.extend(["--features", joined.as_str()]);
        }
        cargo(&args).with_context(|| format!("{package} does not build with tier `{tier}`"))?;
    }
    println!("[tier] {total} tiers build");
    Ok(())
}
