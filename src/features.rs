//! Interpretation of one-hot encoded feature names.
//!
//! An encoded column is named `<base><sep><category>`; plain numeric columns
//! have no separator. Only the first separator counts, so `color_dark_red`
//! is base `color`, category `dark_red`.

use std::collections::{BTreeMap, BTreeSet};

/// Base feature name -> categories. Ordered so labels come out sorted.
pub type CategoryMap = BTreeMap<String, BTreeSet<String>>;

/// Splits a column name on the first `separator` into `(base, category)`.
pub fn split_feature(name: &str, separator: char) -> (&str, Option<&str>) {
    match name.split_once(separator) {
        Some((base, category)) => (base, Some(category)),
        None => (name, None),
    }
}

/// Collects, for each base feature, the categories present among `names`.
///
/// Names without a separator (numeric features) are not recorded. A trailing
/// separator (`color_`) yields an empty category; it is skipped rather than
/// recorded as `""`, so it never appears in an `in {..}` label and never
/// keeps a `≠` label from collapsing to the last remaining category.
pub fn base_categories<S: AsRef<str>>(names: &[S], separator: char) -> CategoryMap {
    let mut categories = CategoryMap::new();
    for name in names {
        if let (base, Some(category)) = split_feature(name.as_ref(), separator) {
            if category.is_empty() {
                continue;
            }
            categories
                .entry(base.to_string())
                .or_default()
                .insert(category.to_string());
        }
    }
    categories
}
