pub mod outcome;
pub mod overrides;
