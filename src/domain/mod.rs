pub mod challenges;
pub mod evaluator;
pub mod filter_spec;
pub mod geojson;
pub mod predicates;
pub mod property;
pub mod view;
