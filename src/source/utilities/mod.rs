/// Timestamp parsing and calendar bucketing helpers.
pub mod date_helpers;
/// First-seen grouping and per-group selection helpers.
pub mod grouping;
/// Hyperlink extraction from markup-embedded fields.
pub mod markup;
