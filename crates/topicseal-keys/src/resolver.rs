//! Topic → secret path resolution.
//!
//! A multi-topic resolver answers every property (path, key attribute name,
//! encryption flag, team) independently, looking only at the rules that
//! define that property:
//!
//! 1. a rule whose `topic_name` equals the topic wins outright
//! 2. otherwise the rule with the longest matching `topic_prefix`
//! 3. otherwise the default rule
//!
//! A topic with no path anywhere is a configuration error. The other
//! properties fall back to safe defaults.

use serde::Deserialize;

use crate::error::KeyError;
use crate::types::DEFAULT_KEY_ATTRIBUTE_NAME;

pub const TOPIC_NAME_PLACEHOLDER: &str = "%TOPICNAME%";
pub const TEAM_NAME_PLACEHOLDER: &str = "%TEAMNAME%";

/// Single topic name that matches every topic.
pub const WILDCARD_TOPIC: &str = "*";

/// One entry of a multi-topic mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicRule {
    pub is_default: bool,
    pub encryption_enabled: Option<bool>,
    pub topic_name: Option<String>,
    pub topic_prefix: Option<String>,
    pub path: Option<String>,
    pub path_template: Option<String>,
    pub team_name: Option<String>,
    pub key_attribute_name: Option<String>,
}

impl TopicRule {
    /// Rule matching exactly one topic.
    pub fn exact(topic: impl Into<String>) -> Self {
        Self {
            topic_name: Some(topic.into()),
            ..Default::default()
        }
    }

    /// Rule matching every topic starting with `prefix`.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            topic_prefix: Some(prefix.into()),
            ..Default::default()
        }
    }

    /// Fallback rule.
    pub fn fallback() -> Self {
        Self {
            is_default: true,
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_path_template(mut self, template: impl Into<String>) -> Self {
        self.path_template = Some(template.into());
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team_name = Some(team.into());
        self
    }

    pub fn with_key_attribute_name(mut self, name: impl Into<String>) -> Self {
        self.key_attribute_name = Some(name.into());
        self
    }

    pub fn with_encryption_enabled(mut self, enabled: bool) -> Self {
        self.encryption_enabled = Some(enabled);
        self
    }

    fn path_spec(&self) -> Option<PathSpec<'_>> {
        match (&self.path, &self.path_template) {
            (Some(path), _) => Some(PathSpec::Literal(path)),
            (None, Some(template)) => Some(PathSpec::Template(template)),
            (None, None) => None,
        }
    }
}

enum PathSpec<'a> {
    Literal(&'a str),
    Template(&'a str),
}

/// Mapping for a deployment that encrypts a single topic (or all of them).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleTopic {
    /// Topic name, or `*` for every topic.
    pub topic: String,
    /// Secret path. `%TOPICNAME%` is substituted.
    pub path: String,
    #[serde(default)]
    pub key_attribute_name: Option<String>,
}

impl SingleTopic {
    fn matches(&self, topic: &str) -> bool {
        self.topic == WILDCARD_TOPIC || self.topic == topic
    }
}

/// Serialized form of a resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolverSettings {
    Single(SingleTopic),
    Multi { rules: Vec<TopicRule> },
}

/// Resolves which secret path and attribute back a topic's key.
#[derive(Debug, Clone)]
pub enum TopicPathResolver {
    Single(SingleTopic),
    Multi(Vec<TopicRule>),
}

impl TopicPathResolver {
    pub fn single(
        topic: impl Into<String>,
        path: impl Into<String>,
        key_attribute_name: Option<String>,
    ) -> Self {
        TopicPathResolver::Single(SingleTopic {
            topic: topic.into(),
            path: path.into(),
            key_attribute_name,
        })
    }

    /// Build a multi-topic resolver, rejecting contradictory rule sets.
    pub fn multi(rules: Vec<TopicRule>) -> Result<Self, KeyError> {
        let defaults = rules.iter().filter(|r| r.is_default).count();
        if defaults > 1 {
            return Err(KeyError::Configuration(format!(
                "{} default topic rules configured, at most one allowed",
                defaults
            )));
        }
        for rule in &rules {
            if rule.path.is_some() && rule.path_template.is_some() {
                return Err(KeyError::Configuration(format!(
                    "topic rule {} sets both path and pathTemplate",
                    describe(rule)
                )));
            }
            if !rule.is_default && rule.topic_name.is_none() && rule.topic_prefix.is_none() {
                return Err(KeyError::Configuration(
                    "non-default topic rule needs a topicName or topicPrefix".into(),
                ));
            }
        }
        Ok(TopicPathResolver::Multi(rules))
    }

    pub fn from_settings(settings: ResolverSettings) -> Result<Self, KeyError> {
        match settings {
            ResolverSettings::Single(single) => Ok(TopicPathResolver::Single(single)),
            ResolverSettings::Multi { rules } => Self::multi(rules),
        }
    }

    /// Secret-store path backing the topic's key.
    pub fn path(&self, topic: &str) -> Result<String, KeyError> {
        match self {
            TopicPathResolver::Single(single) => {
                if !single.matches(topic) {
                    return Err(KeyError::Configuration(format!(
                        "no secret path configured for topic \"{}\"",
                        topic
                    )));
                }
                render_template(&single.path, topic, None)
            }
            TopicPathResolver::Multi(rules) => {
                let spec = resolve(rules, topic, TopicRule::path_spec).ok_or_else(|| {
                    KeyError::Configuration(format!(
                        "no topic rule supplies a path for \"{}\" and no default rule exists",
                        topic
                    ))
                })?;
                match spec {
                    PathSpec::Literal(path) => Ok(path.to_string()),
                    PathSpec::Template(template) => {
                        let team = self.team_name(topic);
                        render_template(template, topic, team.as_deref())
                    }
                }
            }
        }
    }

    /// Name of the secret attribute holding the key material.
    pub fn key_attribute_name(&self, topic: &str) -> String {
        let configured = match self {
            TopicPathResolver::Single(single) => single.key_attribute_name.as_deref(),
            TopicPathResolver::Multi(rules) => {
                resolve(rules, topic, |r| r.key_attribute_name.as_deref())
            }
        };
        configured.unwrap_or(DEFAULT_KEY_ATTRIBUTE_NAME).to_string()
    }

    pub fn is_encryption_enabled(&self, topic: &str) -> bool {
        match self {
            TopicPathResolver::Single(single) => single.matches(topic),
            TopicPathResolver::Multi(rules) => {
                resolve(rules, topic, |r| r.encryption_enabled).unwrap_or(true)
            }
        }
    }

    pub fn team_name(&self, topic: &str) -> Option<String> {
        match self {
            TopicPathResolver::Single(_) => None,
            TopicPathResolver::Multi(rules) => {
                resolve(rules, topic, |r| r.team_name.as_deref()).map(str::to_string)
            }
        }
    }
}

fn resolve<'a, T>(
    rules: &'a [TopicRule],
    topic: &str,
    pick: impl Fn(&'a TopicRule) -> Option<T>,
) -> Option<T> {
    if let Some(value) = rules
        .iter()
        .filter(|r| r.topic_name.as_deref() == Some(topic))
        .find_map(&pick)
    {
        return Some(value);
    }

    // Longest prefix wins; on equal length the earlier rule wins.
    let longest = rules
        .iter()
        .filter_map(|r| {
            let prefix = r.topic_prefix.as_deref()?;
            if !topic.starts_with(prefix) {
                return None;
            }
            pick(r).map(|value| (prefix.len(), value))
        })
        .fold(None, |best: Option<(usize, T)>, (len, value)| match best {
            Some((best_len, _)) if best_len >= len => best,
            _ => Some((len, value)),
        });
    if let Some((_, value)) = longest {
        return Some(value);
    }

    rules.iter().filter(|r| r.is_default).find_map(pick)
}

fn render_template(template: &str, topic: &str, team: Option<&str>) -> Result<String, KeyError> {
    let mut path = template.to_string();
    if template.contains(TEAM_NAME_PLACEHOLDER) {
        let team = team.ok_or_else(|| {
            KeyError::Configuration(format!(
                "path template \"{}\" needs a team name but none is configured for \"{}\"",
                template, topic
            ))
        })?;
        path = path.replace(TEAM_NAME_PLACEHOLDER, team);
    }
    Ok(path.replace(TOPIC_NAME_PLACEHOLDER, topic))
}

fn describe(rule: &TopicRule) -> String {
    match (&rule.topic_name, &rule.topic_prefix) {
        (Some(name), _) => format!("\"{}\"", name),
        (None, Some(prefix)) => format!("\"{}*\"", prefix),
        (None, None) => "<default>".to_string(),
    }
}
