mod analysis;
pub mod user;

pub use analysis::{AnalyzeRequest, PredictionAnalysis};
pub use user::{PublicMetrics, Tweet, TwitterUser, UserData};
