// Quality dropdown contents derived from the backend's format list.
// - Distinct heights >= 144, highest first, behind a leading "max" entry.
// - Falls back to two fixed entries when no usable height is reported.
// - Keeps the current selection across a rebuild when asked to and when it still exists.
use std::collections::BTreeSet;

use crate::model::Format;

const MIN_HEIGHT: u64 = 144;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityOption {
    pub value: String,
    pub label: String,
}

impl QualityOption {
    fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QualityCatalog {
    options: Vec<QualityOption>,
    selected: usize,
}

impl Default for QualityCatalog {
    fn default() -> Self {
        Self::from_formats(&[])
    }
}

impl QualityCatalog {
    pub fn from_formats(formats: &[Format]) -> Self {
        Self {
            options: build_options(formats),
            selected: 0,
        }
    }

    /// Replaces the options. With `preserve`, the previous value stays selected if it survived.
    pub fn rebuild(&mut self, formats: &[Format], preserve: bool) {
        let previous = preserve.then(|| self.selected_value().to_string());
        self.options = build_options(formats);
        self.selected = previous
            .and_then(|value| self.position(&value))
            .unwrap_or(0);
    }

    pub fn options(&self) -> &[QualityOption] {
        &self.options
    }

    #[cfg(test)]
    pub fn values(&self) -> Vec<&str> {
        self.options.iter().map(|o| o.value.as_str()).collect()
    }

    pub fn selected(&self) -> &QualityOption {
        &self.options[self.selected]
    }

    pub fn selected_value(&self) -> &str {
        &self.selected().value
    }

    /// Returns false and leaves the selection alone if `value` is not offered.
    pub fn select(&mut self, value: &str) -> bool {
        match self.position(value) {
            Some(index) => {
                self.selected = index;
                true
            }
            None => false,
        }
    }

    fn position(&self, value: &str) -> Option<usize> {
        self.options.iter().position(|o| o.value == value)
    }
}

fn build_options(formats: &[Format]) -> Vec<QualityOption> {
    let heights = formats
        .iter()
        .filter_map(|f| f.height)
        .filter(|h| *h >= MIN_HEIGHT)
        .collect::<BTreeSet<_>>();

    if heights.is_empty() {
        return fallback_options();
    }

    std::iter::once(QualityOption::new("max", "Max (Best)"))
        .chain(heights.into_iter().rev().map(|h| {
            let label = format!("{h}p");
            QualityOption::new(label.clone(), label)
        }))
        .collect()
}

fn fallback_options() -> Vec<QualityOption> {
    vec![
        QualityOption::new("max", "Max (4K/8K)"),
        QualityOption::new("1080p", "1080p Compatible"),
    ]
}
