pub mod duration;
pub mod line;
pub mod parameters;
pub mod token;
