use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::{LearnerError, Result},
    gateway::TextGenerator,
    output::{ModelOutput, parse_model_output},
};

const DEFAULT_LEARNING_PATH: &str =
    "Start with beginner courses and progressively move to advanced topics.";
const UNAVAILABLE_LEARNING_PATH: &str = "Unable to fetch resources at this time. Please try again.";

/// One recommended course or portal. Platforms describe their entries with different fields, so
/// anything beyond title/url/description is kept as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LearningResources {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub udemy: Vec<Resource>,
    #[serde(default)]
    pub linkedin_learning: Vec<Resource>,
    #[serde(default)]
    pub coursera: Vec<Resource>,
    #[serde(default)]
    pub government_resources: Vec<Resource>,
    #[serde(default)]
    pub other_platforms: Vec<Resource>,
    #[serde(default)]
    pub learning_path: String,
    #[serde(default)]
    pub total_resources: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LearningResources {
    pub fn count(&self) -> usize {
        self.udemy.len()
            + self.linkedin_learning.len()
            + self.coursera.len()
            + self.government_resources.len()
            + self.other_platforms.len()
    }
}

/// Trimmed topic, at least two characters long.
pub fn validate_topic(topic: &str) -> Result<&str> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(LearnerError::invalid("Topic is required"));
    }
    if topic.chars().count() < 2 {
        return Err(LearnerError::invalid(
            "Topic must be at least 2 characters long",
        ));
    }
    Ok(topic)
}

fn resources_prompt(topic: &str) -> String {
    format!(
        r#"You are an expert learning resource curator. A user wants to learn about "{topic}".

Provide a comprehensive list of the BEST learning resources from multiple platforms. For each resource, provide:
1. **Direct URL links** (actual working URLs, not placeholders)
2. Course/resource title
3. Platform name
4. Brief description
5. Difficulty level (Beginner/Intermediate/Advanced)
6. Estimated duration (if applicable)

Include resources from:
1. **Udemy** - At least 3-5 top-rated courses with real Udemy URLs
2. **LinkedIn Learning** - At least 3-5 courses with real LinkedIn Learning URLs
3. **Coursera** - At least 3-5 courses with real Coursera URLs
4. **Government Resources** - Official government learning portals, certifications, or educational websites
5. **Other Platforms** - FreeCodeCamp, Khan Academy, edX, YouTube channels, official documentation

**IMPORTANT:**
- Use REAL, WORKING URLs that users can click and access
- Prioritize free or affordable options
- Include a mix of beginner to advanced resources

Respond with ONLY a valid JSON object (no markdown, no code fences) with this structure:
{{
  "topic": "{topic}",
  "udemy": [{{"title": "Course title", "url": "https://www.udemy.com/course/...", "description": "Brief description", "level": "Beginner", "duration": "X hours", "price": "Free/Paid"}}],
  "linkedin_learning": [{{"title": "Course title", "url": "https://www.linkedin.com/learning/...", "description": "Brief description", "level": "Beginner", "duration": "X hours"}}],
  "coursera": [{{"title": "Course title", "url": "https://www.coursera.org/learn/...", "description": "Brief description", "level": "Beginner", "duration": "X weeks", "provider": "University"}}],
  "government_resources": [{{"title": "Resource title", "url": "https://...", "description": "Brief description", "organization": "Agency", "type": "Course/Certification/Portal"}}],
  "other_platforms": [{{"title": "Resource title", "platform": "Platform name", "url": "https://...", "description": "Brief description", "level": "Beginner", "price": "Free/Paid"}}],
  "learning_path": "Recommended step-by-step learning path in 2-3 sentences",
  "total_resources": 25
}}
"#
    )
}

/// Interpret backend output for `topic`, defaulting what is missing.
pub fn parse_resources(topic: &str, raw: &str) -> LearningResources {
    match parse_model_output::<LearningResources>(raw) {
        ModelOutput::Parsed(mut resources) => {
            if resources.topic.trim().is_empty() {
                resources.topic = topic.to_string();
            }
            if resources.learning_path.trim().is_empty() {
                resources.learning_path = DEFAULT_LEARNING_PATH.to_string();
            }
            resources.total_resources = resources.count();
            resources.error = None;
            resources
        }
        ModelOutput::Malformed(_) => {
            tracing::warn!(topic, "Learning resources were not valid JSON");
            LearningResources {
                topic: topic.to_string(),
                learning_path: UNAVAILABLE_LEARNING_PATH.to_string(),
                error: Some("Failed to parse AI response".to_string()),
                ..Default::default()
            }
        }
    }
}

/// Backend errors propagate; malformed output does not.
pub async fn recommend_resources(
    generator: &dyn TextGenerator,
    topic: &str,
) -> Result<LearningResources> {
    let topic = validate_topic(topic)?;
    tracing::info!(topic, "Fetching learning resources");

    let raw = generator.generate_text(&resources_prompt(topic)).await?;
    let resources = parse_resources(topic, &raw);
    tracing::info!(topic, total = resources.total_resources, "Fetched learning resources");
    Ok(resources)
}
