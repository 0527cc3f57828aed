pub mod add;
pub mod ingest;
pub mod plan;
pub mod report;
pub mod rules;
pub mod sample;
pub mod status;
