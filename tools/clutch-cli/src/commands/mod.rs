pub mod check;
pub mod cut;
pub mod edl;
pub mod probe;
