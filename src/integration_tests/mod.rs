pub mod core;
pub mod registry;
pub mod scenarios;
pub mod test_cases;
