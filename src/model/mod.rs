pub mod feature_row;
pub mod price_series;
pub mod recommendation;
