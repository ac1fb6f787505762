pub mod display;
pub mod logging;
pub mod time_series;
