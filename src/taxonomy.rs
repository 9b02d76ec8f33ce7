use crate::errors::{FreshscanError, Result};

/// One entry of the canonical produce/freshness taxonomy.
///
/// The table is static and read-only: the pipeline consults it to translate
/// raw detector labels, and view rendering consults it for care metadata.
/// Nothing in the request path mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxonomyEntry {
    /// Canonical key, matching the detector's raw label vocabulary.
    pub key: &'static str,
    /// Human-facing class name reported in prediction results.
    pub display_name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    pub care_tips: &'static [&'static str],
    /// Consumption warning for stale produce, where applicable.
    pub warning: Option<&'static str>,
}

/// Canonical taxonomy, ordered fresh-to-stale per produce type. This order is
/// the presentation order for informational listings.
pub const TAXONOMY: [TaxonomyEntry; 12] = [
    TaxonomyEntry {
        key: "Fresh Apple",
        display_name: "Fresh Apple",
        icon: "🍎",
        description: "Firm apple with bright, glossy skin",
        care_tips: &[
            "Refrigerate at 0-4°C",
            "Keep away from ethylene-producing fruit",
            "Keeps 4-6 weeks refrigerated",
        ],
        warning: None,
    },
    TaxonomyEntry {
        key: "Stale Apple",
        display_name: "Stale Apple",
        icon: "🍎",
        description: "Wrinkled, dull apple past its prime",
        care_tips: &["Suitable for compost", "Discard if moldy"],
        warning: Some("Not recommended for consumption"),
    },
    TaxonomyEntry {
        key: "Fresh Banana",
        display_name: "Fresh Banana",
        icon: "🍌",
        description: "Ripe banana, yellow skin with few brown spots",
        care_tips: &[
            "Store at room temperature",
            "Keep out of direct sunlight",
            "Refrigerate once fully ripe",
        ],
        warning: None,
    },
    TaxonomyEntry {
        key: "Stale Banana",
        display_name: "Stale Banana",
        icon: "🍌",
        description: "Overripe banana, mostly brown or black skin",
        care_tips: &["Good for banana bread", "Freeze for smoothies"],
        warning: Some("Usable for baking if not moldy"),
    },
    TaxonomyEntry {
        key: "Fresh Orange",
        display_name: "Fresh Orange",
        icon: "🍊",
        description: "Smooth-skinned orange, heavy for its size",
        care_tips: &[
            "Store in a cool room",
            "Keeps 1-2 weeks at room temperature",
            "Refrigerate for longer storage",
        ],
        warning: None,
    },
    TaxonomyEntry {
        key: "Stale Orange",
        display_name: "Stale Orange",
        icon: "🍊",
        description: "Drying orange with wrinkled or blemished skin",
        care_tips: &[],
        warning: Some("Nutritional quality has declined"),
    },
    TaxonomyEntry {
        key: "Fresh Tomato",
        display_name: "Fresh Tomato",
        icon: "🍅",
        description: "Firm tomato with even red color",
        care_tips: &[
            "Store at room temperature, not refrigerated",
            "Keep out of direct sunlight",
            "Do not stack with other fruit",
        ],
        warning: None,
    },
    TaxonomyEntry {
        key: "Stale Tomato",
        display_name: "Stale Tomato",
        icon: "🍅",
        description: "Soft tomato with uneven color or blemishes",
        care_tips: &[],
        warning: Some("Avoid consumption if moldy"),
    },
    TaxonomyEntry {
        key: "Fresh Capsicum",
        display_name: "Fresh Capsicum",
        icon: "🫑",
        description: "Glossy, crisp capsicum with a fresh green stem",
        care_tips: &[
            "Refrigerate in a perforated bag",
            "Keeps 1-2 weeks",
            "Do not wash before storing",
        ],
        warning: None,
    },
    TaxonomyEntry {
        key: "Stale Capsicum",
        display_name: "Stale Capsicum",
        icon: "🫑",
        description: "Dull, wilting capsicum losing its crispness",
        care_tips: &[],
        warning: None,
    },
    TaxonomyEntry {
        key: "Fresh Bitter Gourd",
        display_name: "Fresh Bitter Gourd",
        icon: "🥒",
        description: "Plump bitter gourd with bright green ridged skin",
        care_tips: &[
            "Refrigerate in a closed container",
            "Keeps 4-5 days",
            "Wrap in a perforated bag",
        ],
        warning: None,
    },
    TaxonomyEntry {
        key: "Stale Bitter Gourd",
        display_name: "Stale Bitter Gourd",
        icon: "🥒",
        description: "Yellowing, softening bitter gourd",
        care_tips: &[],
        warning: Some("Taste and texture have degraded"),
    },
];

/// Entries in fresh-to-stale presentation order, for informational views.
pub fn entries_in_display_order() -> &'static [TaxonomyEntry] {
    &TAXONOMY
}

/// Fold a label for matching: lower-case, spaces/hyphens/underscores removed.
fn fold(label: &str) -> String {
    label
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Map a raw detector label onto its canonical taxonomy entry.
///
/// Matching is case-, space-, hyphen- and underscore-insensitive on both
/// sides. A raw label with no canonical entry is a typed error rather than a
/// silent pass-through, so taxonomy/model drift surfaces immediately instead
/// of reaching users as an untranslated class name.
pub fn canonicalize(raw_label: &str) -> Result<&'static TaxonomyEntry> {
    let folded = fold(raw_label);
    TAXONOMY
        .iter()
        .find(|entry| fold(entry.key) == folded)
        .ok_or_else(|| FreshscanError::UnknownLabel {
            label: raw_label.to_string(),
        })
}
