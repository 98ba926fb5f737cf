use std::fmt::Write;

use crate::models::{PublicMetrics, Tweet, TwitterUser};

/// 提示词中最多包含的推文条数
pub const MAX_PROMPT_TWEETS: usize = 10;

/// 根据用户资料和最近推文构造提示词，相同输入总是得到相同输出
pub fn build_prompt(user: &TwitterUser, tweets: &[Tweet]) -> String {
    let metric = |pick: fn(&PublicMetrics) -> u64| {
        user.public_metrics
            .as_ref()
            .map(|m| pick(m).to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    };
    let name = if user.name.trim().is_empty() {
        "Unknown"
    } else {
        user.name.as_str()
    };
    let description = user
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or("No description available");

    let mut prompt = String::new();
    let _ = writeln!(prompt, "Analyze the Twitter profile of @{}:", user.username);
    let _ = writeln!(prompt, "- Name: {}", name);
    let _ = writeln!(prompt, "- Followers: {}", metric(|m| m.followers_count));
    let _ = writeln!(prompt, "- Following: {}", metric(|m| m.following_count));
    let _ = writeln!(prompt, "- Tweet count: {}", metric(|m| m.tweet_count));
    let _ = writeln!(prompt, "- Description: {}", description);
    prompt.push('\n');

    prompt.push_str("Recent tweets:\n");
    for tweet in tweets.iter().take(MAX_PROMPT_TWEETS) {
        let _ = writeln!(prompt, "- {}", tweet.text);
    }
    prompt.push('\n');

    prompt.push_str(
        "Based on this information, generate a humorous prediction analysis including:\n\
         1. The highest accuracy prediction they've made (estimate a percentage)\n\
         2. Top 3 topics they like to talk about\n\
         3. A witty rating of their prediction ability (e.g., \"Crystal Ball Polisher\", \"Fortune Cookie Writer\")\n\
         4. Top 3 best predictions they might have made (based on the tweets provided)\n\
         5. Top 3 worst predictions they might have made (based on the tweets provided)\n\
         6. A short, humorous summary about the type of predictor they are\n\
         7. A prediction for what they might pick next\n\
         8. Three catch phrases they might use (e.g., \"Quant said...\", \"@username predicted...\")\n\n\
         Provide this information in a structured format, clearly labeling each section \
         and separating sections with a blank line.",
    );
    prompt
}
