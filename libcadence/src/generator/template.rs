//! Offline, deterministic generator used when no AI endpoint is configured

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{ContentGenerator, GenerationRequest, PlanRequest};
use crate::error::GenerationError;
use crate::types::{Platform, Tone};

const TWEET_LIMIT: usize = 280;
const PLAN_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGenerator;

fn hashtag(topic: &str) -> String {
    let tag: String = topic
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars().filter(|c| c.is_alphanumeric());
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    format!("#{}", tag)
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

fn render(platform: Platform, request: &GenerationRequest) -> String {
    let topic = request.topic.trim();
    let explanation = request.explanation.trim();
    let tag = hashtag(topic);

    match platform {
        Platform::LinkedIn => format!(
            "{}\n\n{}\n\nWhat has your experience been? Share your thoughts below.\n\n{} #Insights",
            topic, explanation, tag
        ),
        Platform::Facebook => format!(
            "{} 💡\n\n{}\n\nTell us what you think in the comments! {}",
            topic, explanation, tag
        ),
        Platform::Twitter => {
            let suffix = format!(" {}", tag);
            let budget = TWEET_LIMIT.saturating_sub(suffix.chars().count());
            let body = if explanation.is_empty() {
                topic.to_string()
            } else {
                format!("{}: {}", topic, explanation)
            };
            format!("{}{}", truncate_chars(&body, budget), suffix)
        }
        Platform::Instagram => format!(
            "✨ {} ✨\n\n{}\n\nDouble tap if this resonates! 👇\n\n{} #Inspiration #Community",
            topic, explanation, tag
        ),
    }
}

#[async_trait]
impl ContentGenerator for TemplateGenerator {
    async fn generate_for_platforms(&self, request: &GenerationRequest) -> BTreeMap<Platform, String> {
        request
            .platforms
            .iter()
            .map(|&platform| (platform, render(platform, request)))
            .collect()
    }

    /// A 30-day plan following the distribution weights, as a JSON array
    async fn plan_month(&self, request: &PlanRequest) -> Result<String, GenerationError> {
        let weights = request.distribution;
        let share = |percent: u8| (u32::from(percent) * PLAN_DAYS + 50) / 100;
        let educational = share(weights.educational);
        let engagement = share(weights.engagement);

        let plan: Vec<serde_json::Value> = (1..=PLAN_DAYS)
            .map(|day| {
                let (topic, tone, platforms) = if day <= educational {
                    (
                        format!("{} explained for {} (part {})", request.industry, request.target_audience, day),
                        Tone::Educational,
                        vec![Platform::LinkedIn, Platform::Twitter],
                    )
                } else if day <= educational + engagement {
                    (
                        format!("Ask {}: biggest {} challenge this week", request.target_audience, request.industry),
                        Tone::Casual,
                        vec![Platform::Facebook, Platform::Instagram],
                    )
                } else {
                    (
                        format!("How we help {} in {}", request.target_audience, request.industry),
                        Tone::Promotional,
                        vec![Platform::LinkedIn, Platform::Facebook],
                    )
                };

                serde_json::json!({
                    "day": day,
                    "topic": topic,
                    "explanation": format!("Day {} post supporting {}", day, request.content_goal),
                    "tone": tone,
                    "platforms": platforms,
                })
            })
            .collect();

        serde_json::to_string_pretty(&plan).map_err(|e| GenerationError::Response(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::parse_monthly_plan;
    use crate::types::{ContentGoal, Distribution};

    fn request(platforms: Vec<Platform>) -> GenerationRequest {
        GenerationRequest {
            topic: "AI in Healthcare".to_string(),
            explanation: "Faster, cheaper diagnostics".to_string(),
            tone: Tone::Professional,
            platforms,
        }
    }

    #[test]
    fn test_hashtag() {
        assert_eq!(hashtag("AI in healthcare!"), "#AIInHealthcare");
        assert_eq!(hashtag(""), "#");
    }

    #[tokio::test]
    async fn test_one_entry_per_platform() {
        let content = TemplateGenerator
            .generate_for_platforms(&request(Platform::ALL.to_vec()))
            .await;
        assert_eq!(content.len(), 4);
        assert!(content[&Platform::LinkedIn].contains("Faster, cheaper diagnostics"));
        assert!(content[&Platform::Instagram].contains("#AIInHealthcare"));
    }

    #[tokio::test]
    async fn test_tweet_fits_limit() {
        let mut long = request(vec![Platform::Twitter]);
        long.explanation = "word ".repeat(200);
        let content = TemplateGenerator.generate_for_platforms(&long).await;
        let tweet = &content[&Platform::Twitter];
        assert!(tweet.chars().count() <= TWEET_LIMIT);
        assert!(tweet.ends_with("#AIInHealthcare"));
    }

    #[tokio::test]
    async fn test_plan_follows_distribution_and_parses() {
        let text = TemplateGenerator
            .plan_month(&PlanRequest {
                industry: "Fintech".to_string(),
                target_audience: "CFOs".to_string(),
                content_goal: ContentGoal::Branding,
                distribution: Distribution::default(),
            })
            .await
            .unwrap();

        let topics = parse_monthly_plan(&text);
        assert_eq!(topics.len(), 30);
        assert_eq!(topics[0].day, 1);
        assert_eq!(topics[29].day, 30);

        let educational = topics.iter().filter(|t| t.tone == Tone::Educational).count();
        let engagement = topics.iter().filter(|t| t.tone == Tone::Casual).count();
        let promotional = topics.iter().filter(|t| t.tone == Tone::Promotional).count();
        assert_eq!((educational, engagement, promotional), (18, 8, 4));
    }
}
