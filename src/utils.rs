//! Small helpers shared by the tree model and the DOT renderer.

use std::borrow::Cow;

/// Determines the index of the largest class weight.
///
/// Ties are broken by choosing the lower index, which is the class
/// scikit-learn's `predict` picks for finite weights. NaN weights are skipped
/// rather than propagated: a NaN never wins, and an all-NaN slice yields 0.
/// numpy's `argmax` would instead return the first NaN.
///
/// # Returns
/// `None` if `weights` is empty.
pub fn argmax(weights: &[f64]) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    let mut max_val = f64::NEG_INFINITY;
    let mut winning_index = 0;
    for (index, &val) in weights.iter().enumerate() {
        // Strict comparison keeps the earlier index on ties.
        if val > max_val {
            max_val = val;
            winning_index = index;
        }
    }
    Some(winning_index)
}

/// Escapes a string for use inside a double-quoted DOT attribute.
pub fn escape_label(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['"', '\\']) {
        return Cow::Borrowed(raw);
    }
    let mut escaped = String::with_capacity(raw.len() + 2);
    for ch in raw.chars() {
        if ch == '"' || ch == '\\' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    Cow::Owned(escaped)
}
