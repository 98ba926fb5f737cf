mod handler;

pub use handler::analyze_predictions;
