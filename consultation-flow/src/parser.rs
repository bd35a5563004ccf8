//! Recovers plant and confidence records from the free-text answer of the
//! recommendation service.
//!
//! The service embeds two kinds of markers in its answer:
//!
//! ```text
//! PLANTA_1: Manzanilla | Alivia el dolor de estómago | Efectividad: Alta
//! RNA_1: Manzanilla | 87%
//! ```
//!
//! Text around the markers is ignored and a missing marker is never an error.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use tracing::{debug, warn};

use crate::models::{PlantRecord, PredictionEntry, UNSPECIFIED_EFFECTIVENESS};

/// `PLANTA_<n>: <name> | <description> [| Efectividad: <value>]`
static PLANT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"PLANTA_\d+:\s*([^|\n]+)\|([^|\n]+)(?:\|\s*Efectividad:\s*([^|\n]+))?")
        .expect("Invalid plant marker regex")
});

/// `RNA_<label>: <name> | <number>[%]`
static CONFIDENCE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"RNA_\w+:\s*([^|\n]+)\|\s*(-?\d+(?:[.,]\d+)?)\s*%?")
        .expect("Invalid confidence marker regex")
});

/// `PLANTA_<n>: <name>`, used when no confidence markers are present
static PLANT_NAME_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"PLANTA_\d+:\s*([^|\n]+)").expect("Invalid plant name regex")
});

/// Inclusive bounds of the synthetic confidence fallback
pub const SYNTHETIC_CONFIDENCE_MIN: u32 = 50;
pub const SYNTHETIC_CONFIDENCE_MAX: u32 = 95;

/// Extracts every `PLANTA_<n>` record, left to right
pub fn extract_plants(text: &str) -> Vec<PlantRecord> {
    let plants: Vec<PlantRecord> = PLANT_MARKER
        .captures_iter(text)
        .map(|caps| PlantRecord {
            name: clean_field(&caps[1]),
            description: clean_field(&caps[2]),
            effectiveness: caps
                .get(3)
                .map(|m| clean_field(m.as_str()))
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| UNSPECIFIED_EFFECTIVENESS.to_string()),
        })
        .collect();

    debug!(count = plants.len(), "Extracted plant records");
    plants
}

/// Extracts `RNA_` confidences, falling back to synthetic scores for
/// `PLANTA_` names when the answer carries no confidence markers at all.
pub fn extract_confidences(text: &str) -> Vec<PredictionEntry> {
    let entries = extract_marked_confidences(text);
    if !entries.is_empty() {
        return entries;
    }

    let names = extract_plant_names(text);
    if names.is_empty() {
        return Vec::new();
    }
    synthetic_confidence_fallback(&names, &mut rand::rng())
}

/// Confidences stated explicitly by `RNA_` markers. The number is kept as
/// written, a `87%` marker yields 87.
pub fn extract_marked_confidences(text: &str) -> Vec<PredictionEntry> {
    CONFIDENCE_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let name = clean_field(&caps[1]);
            let raw = caps[2].replace(',', ".");
            match raw.parse::<f64>() {
                Ok(confidence) => Some(PredictionEntry::new(name, confidence)),
                Err(e) => {
                    warn!(marker = %&caps[0], error = %e, "Skipping unparsable confidence");
                    None
                }
            }
        })
        .collect()
}

/// Plant names from `PLANTA_<n>:` markers, descriptions ignored
pub fn extract_plant_names(text: &str) -> Vec<String> {
    PLANT_NAME_MARKER
        .captures_iter(text)
        .map(|caps| clean_field(&caps[1]))
        .filter(|name| !name.is_empty())
        .collect()
}

/// Assigns every plant a made-up confidence drawn uniformly from
/// [`SYNTHETIC_CONFIDENCE_MIN`, `SYNTHETIC_CONFIDENCE_MAX`].
///
/// These numbers are not model output. They exist so that no plant is shown
/// without a confidence when the service sends none; removing this fallback is
/// a product decision.
pub fn synthetic_confidence_fallback<R: Rng + ?Sized>(
    names: &[String],
    rng: &mut R,
) -> Vec<PredictionEntry> {
    warn!(
        count = names.len(),
        "No confidence markers in answer, using synthetic confidences"
    );
    names
        .iter()
        .map(|name| {
            let score = rng.random_range(SYNTHETIC_CONFIDENCE_MIN..=SYNTHETIC_CONFIDENCE_MAX);
            PredictionEntry::new(name.clone(), f64::from(score))
        })
        .collect()
}

fn clean_field(raw: &str) -> String {
    raw.trim().trim_matches('*').trim().to_string()
}
