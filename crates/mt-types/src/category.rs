use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;

/// Independent misfit contribution class
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    BodyWaves,
    SurfaceWaves,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::BodyWaves, Category::SurfaceWaves];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::BodyWaves => "body_waves",
            Category::SurfaceWaves => "surface_waves",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "body_waves" => Ok(Category::BodyWaves),
            "surface_waves" => Ok(Category::SurfaceWaves),
            other => Err(ConfigError::UnknownCategory(other.to_string())),
        }
    }
}

/// Per-category values, iterated in category order.
///
/// Iteration order is fixed so that summing across categories is
/// bit-reproducible on every worker.
pub type CategoryMap<T> = BTreeMap<Category, T>;

/// Check that two category maps cover exactly the same categories.
///
/// `misfits` is checked against `processors`; the first category present in
/// one and absent in the other is reported.
pub fn validate_categories<A, B>(
    processors: &CategoryMap<A>,
    misfits: &CategoryMap<B>,
) -> Result<(), ConfigError> {
    if processors.is_empty() && misfits.is_empty() {
        return Err(ConfigError::NoCategories);
    }
    if let Some(category) = misfits.keys().find(|c| !processors.contains_key(c)) {
        return Err(ConfigError::MissingProcessor {
            category: *category,
        });
    }
    if let Some(category) = processors.keys().find(|c| !misfits.contains_key(c)) {
        return Err(ConfigError::MissingMisfit {
            category: *category,
        });
    }
    Ok(())
}
