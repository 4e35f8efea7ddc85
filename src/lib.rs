pub mod data;
pub mod inference;
pub mod model;
pub mod training;
