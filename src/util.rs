use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use eframe::egui::{Vec2, vec2};

/// Two values in `[-1, 1]` derived from `id`, identical on every call.
pub fn stable_pair(id: &str) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}

/// Unit vector derived from `id`.
pub fn stable_direction(id: &str) -> Vec2 {
    let (x, y) = stable_pair(id);
    let direction = vec2(x, y);
    let length = direction.length();
    if length > 0.001 {
        direction / length
    } else {
        vec2(1.0, 0.0)
    }
}

pub fn truncate_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_owned();
    }
    let mut short = label
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_values_repeat_and_stay_in_range() {
        assert_eq!(stable_pair("grid"), stable_pair("grid"));
        let (x, y) = stable_pair("anything");
        assert!((-1.0..=1.0).contains(&x) && (-1.0..=1.0).contains(&y));
        assert!((stable_direction("grid").length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn long_labels_are_shortened() {
        assert_eq!(truncate_label("short", 10), "short");
        assert_eq!(truncate_label("abcdefghij", 5), "abcd…");
    }
}
