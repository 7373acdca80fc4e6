// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates Kubernetes CRD YAML files from the Rust types in src/crd.rs so
//! the manifests in deploy/crds/ never drift from the code.
//!
//! Usage:
//!   cargo run --bin crdgen

use kube::CustomResourceExt;
use package_coordination::crd::{Adoption, ClusterAdoption, ClusterHandover};
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/crds");
    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML files from src/crd.rs...");

    generate_crd::<Adoption>("adoptions.crd.yaml", output_dir)?;
    generate_crd::<ClusterAdoption>("clusteradoptions.crd.yaml", output_dir)?;
    generate_crd::<ClusterHandover>("clusterhandovers.crd.yaml", output_dir)?;

    println!("✓ Successfully generated CRD YAML files in deploy/crds/");
    println!("\nNext steps:");
    println!("  1. Review the generated files");
    println!("  2. Deploy with: kubectl apply -f deploy/crds/");

    Ok(())
}

fn generate_crd<T>(filename: &str, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>>
where
    T: CustomResourceExt,
{
    let yaml = serde_yaml::to_string(&T::crd())?;
    let content = format!("{COPYRIGHT_HEADER}{yaml}");

    fs::write(output_dir.join(filename), content)?;
    println!("  ✓ Generated {filename}");

    Ok(())
}
