//! Display-label cleanup hook.
//!
//! Real cleanup (street types, abbreviations, punctuation) belongs to the
//! caller; the classifier only hands it the raw feed headsign.

pub trait LabelCleaner {
    fn clean_headsign(&self, headsign: &str) -> String;

    fn clean_stop_name(&self, name: &str) -> String {
        name.to_string()
    }
}

/// Trims and collapses runs of whitespace.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicLabelCleaner;

impl LabelCleaner for BasicLabelCleaner {
    fn clean_headsign(&self, headsign: &str) -> String {
        collapse_whitespace(headsign)
    }

    fn clean_stop_name(&self, name: &str) -> String {
        collapse_whitespace(name)
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
