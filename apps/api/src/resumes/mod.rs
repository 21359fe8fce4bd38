// Resume versioning: formset edits, forks into new versions, version chains.

pub mod formsets;
pub mod handlers;
pub mod service;
pub mod versions;
