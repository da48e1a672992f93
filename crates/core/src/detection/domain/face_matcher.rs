use crate::config::settings::{MAX_MATCH_THRESHOLD, MIN_MATCH_THRESHOLD};
use crate::shared::constants::UNKNOWN_LABEL;

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.55;

/// Fixed-length numeric encoding of one face.
#[derive(Clone, Debug, PartialEq)]
pub struct Descriptor(pub Vec<f32>);

impl Descriptor {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Euclidean distance, `None` when lengths differ.
    pub fn distance(&self, other: &Descriptor) -> Option<f64> {
        if self.0.len() != other.0.len() {
            return None;
        }
        let sum: f64 = self
            .0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| {
                let d = *a as f64 - *b as f64;
                d * d
            })
            .sum();
        Some(sum.sqrt())
    }
}

/// Known identities and their reference descriptors, in load order.
#[derive(Clone, Debug, Default)]
pub struct Gallery {
    entries: Vec<(String, Descriptor)>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, descriptor: Descriptor) {
        self.entries.push((name.into(), descriptor));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchResult {
    pub label: String,
    /// Distance to the closest gallery entry, `None` for an empty gallery.
    pub distance: Option<f64>,
}

impl MatchResult {
    pub fn is_known(&self) -> bool {
        self.label != UNKNOWN_LABEL
    }
}

/// Nearest-neighbour identity lookup with an acceptance threshold.
#[derive(Clone, Copy, Debug)]
pub struct FaceMatcher {
    threshold: f64,
}

impl FaceMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(MIN_MATCH_THRESHOLD, MAX_MATCH_THRESHOLD),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Closest gallery entry, accepted only when strictly below the threshold.
    ///
    /// Ties keep the earliest entry, so the result depends on nothing but
    /// the inputs.
    pub fn best_match(&self, descriptor: &Descriptor, gallery: &Gallery) -> MatchResult {
        let mut best: Option<(usize, f64)> = None;
        for (i, (_, reference)) in gallery.entries.iter().enumerate() {
            let Some(d) = descriptor.distance(reference) else {
                continue;
            };
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }

        match best {
            Some((i, d)) if d < self.threshold => MatchResult {
                label: gallery.entries[i].0.clone(),
                distance: Some(d),
            },
            Some((_, d)) => MatchResult {
                label: UNKNOWN_LABEL.to_string(),
                distance: Some(d),
            },
            None => MatchResult {
                label: UNKNOWN_LABEL.to_string(),
                distance: None,
            },
        }
    }
}

impl Default for FaceMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}
