//! Build variant modelling
//!
//! A variant is one flavor per declared dimension combined with a build type,
//! producing one distinct package output. Variant names follow the Gradle
//! camel-case convention so assemble task names and output subdirectories can
//! be derived from the declared dimensions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A flavor dimension (e.g. "paidMode" with flavors "free" and "paid")
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlavorDimension {
    /// Dimension name, used only for diagnostics
    pub name: String,

    /// Flavors in this dimension (at least one required)
    pub flavors: Vec<String>,
}

/// One concrete build variant: one flavor per dimension plus a build type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Selected flavor per dimension, in dimension declaration order
    pub flavors: Vec<String>,

    /// Build type (e.g. "debug", "release")
    pub build_type: String,
}

impl Variant {
    /// Camel-case suffix for the assemble task, e.g. `FreeMinSdk21Debug`
    pub fn task_suffix(&self) -> String {
        let mut s = String::new();
        for flavor in &self.flavors {
            s.push_str(&capitalize(flavor));
        }
        s.push_str(&capitalize(&self.build_type));
        s
    }

    /// Assemble task name, e.g. `assembleFreeMinSdk21Debug`
    pub fn assemble_task(&self) -> String {
        format!("assemble{}", self.task_suffix())
    }

    /// Combined flavor directory component, e.g. `freeMinSdk21`
    ///
    /// Empty when no dimensions are declared; the output tree then nests
    /// directly by build type.
    pub fn flavor_combination(&self) -> String {
        let mut s = String::new();
        for (i, flavor) in self.flavors.iter().enumerate() {
            if i == 0 {
                s.push_str(flavor);
            } else {
                s.push_str(&capitalize(flavor));
            }
        }
        s
    }

    /// Expected output subdirectory relative to the toolchain output root,
    /// e.g. `freeMinSdk21/debug` (or just `debug` without dimensions)
    pub fn output_subdir(&self) -> PathBuf {
        let combo = self.flavor_combination();
        if combo.is_empty() {
            PathBuf::from(&self.build_type)
        } else {
            PathBuf::from(combo).join(&self.build_type)
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for flavor in &self.flavors {
            write!(f, "{}-", flavor)?;
        }
        write!(f, "{}", self.build_type)
    }
}

/// Enumerate all variants: the cartesian product of one flavor per dimension
/// with every build type
///
/// With no dimensions declared, variants degenerate to the bare build types.
pub fn enumerate(dimensions: &[FlavorDimension], build_types: &[String]) -> Vec<Variant> {
    let mut combos: Vec<Vec<String>> = vec![Vec::new()];

    for dimension in dimensions {
        let mut next = Vec::with_capacity(combos.len() * dimension.flavors.len());
        for combo in &combos {
            for flavor in &dimension.flavors {
                let mut extended = combo.clone();
                extended.push(flavor.clone());
                next.push(extended);
            }
        }
        combos = next;
    }

    let mut variants = Vec::with_capacity(combos.len() * build_types.len());
    for combo in &combos {
        for build_type in build_types {
            variants.push(Variant {
                flavors: combo.clone(),
                build_type: build_type.clone(),
            });
        }
    }
    variants
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
