pub mod beats;
pub mod chart;
pub mod detection;
pub mod effects;
pub mod gameplay;
pub mod judgment;
pub mod note;
pub mod scores;
pub mod timing;
