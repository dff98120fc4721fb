//! Data acquisition: the city reference list and the weather API.

pub mod bulk;
pub mod cities;
pub mod openweather;
