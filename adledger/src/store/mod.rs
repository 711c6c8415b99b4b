pub mod aggregate;
pub mod both;
pub mod catalog;
pub mod counter;
