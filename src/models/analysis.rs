use serde::{Deserialize, Serialize};

use super::user::{Tweet, TwitterUser};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionAnalysis {
    pub highest_accuracy: f64,
    pub top_topics: Vec<String>,
    pub rating: String,
    pub best_predictions: Vec<String>,
    pub worst_predictions: Vec<String>,
    pub summary: String,
    pub next_pick: String,
    pub catch_phrases: Vec<String>,
}

impl Default for PredictionAnalysis {
    fn default() -> Self {
        Self {
            highest_accuracy: 0.0,
            top_topics: Vec::new(),
            rating: "Unknown".to_string(),
            best_predictions: Vec::new(),
            worst_predictions: Vec::new(),
            summary: String::new(),
            next_pick: String::new(),
            catch_phrases: Vec::new(),
        }
    }
}

// analyzePredictions 请求体，字段缺失时返回 400
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub user_data: Option<TwitterUser>,
    pub tweets: Option<Vec<Tweet>>,
}
