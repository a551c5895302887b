//! The fixed topic taxonomy and the named topic-ordering templates.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::TemplateConfig;
use crate::error::{ProposalError, Result};

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// A required section of a business proposal.
///
/// Declaration order is the taxonomy order; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "Company Overview")]
    CompanyOverview,
    #[serde(rename = "Mission and Vision Statement")]
    MissionAndVision,
    #[serde(rename = "Executive Summary")]
    ExecutiveSummary,
    #[serde(rename = "Owners and Partnerships")]
    OwnersAndPartnerships,
    #[serde(rename = "Industry Overview and Trends")]
    IndustryOverview,
    #[serde(rename = "Competition")]
    Competition,
    #[serde(rename = "Problem Statement")]
    ProblemStatement,
    #[serde(rename = "Marketing Plan")]
    MarketingPlan,
    #[serde(rename = "Proposed Solution")]
    ProposedSolution,
    #[serde(rename = "Market Analysis")]
    MarketAnalysis,
    #[serde(rename = "Sustainable Practices")]
    SustainablePractices,
    #[serde(rename = "Implementation Timeline")]
    ImplementationTimeline,
    #[serde(rename = "Staff Names")]
    StaffNames,
    #[serde(rename = "Financial Objectives")]
    FinancialObjectives,
    #[serde(rename = "Exit Strategy")]
    ExitStrategy,
    #[serde(rename = "Conclusion")]
    Conclusion,
}

/// Every topic, in taxonomy order.
pub const TAXONOMY: [Topic; 16] = [
    Topic::CompanyOverview,
    Topic::MissionAndVision,
    Topic::ExecutiveSummary,
    Topic::OwnersAndPartnerships,
    Topic::IndustryOverview,
    Topic::Competition,
    Topic::ProblemStatement,
    Topic::MarketingPlan,
    Topic::ProposedSolution,
    Topic::MarketAnalysis,
    Topic::SustainablePractices,
    Topic::ImplementationTimeline,
    Topic::StaffNames,
    Topic::FinancialObjectives,
    Topic::ExitStrategy,
    Topic::Conclusion,
];

impl Topic {
    /// The literal section name, used for gap detection and headings.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CompanyOverview => "Company Overview",
            Self::MissionAndVision => "Mission and Vision Statement",
            Self::ExecutiveSummary => "Executive Summary",
            Self::OwnersAndPartnerships => "Owners and Partnerships",
            Self::IndustryOverview => "Industry Overview and Trends",
            Self::Competition => "Competition",
            Self::ProblemStatement => "Problem Statement",
            Self::MarketingPlan => "Marketing Plan",
            Self::ProposedSolution => "Proposed Solution",
            Self::MarketAnalysis => "Market Analysis",
            Self::SustainablePractices => "Sustainable Practices",
            Self::ImplementationTimeline => "Implementation Timeline",
            Self::StaffNames => "Staff Names",
            Self::FinancialObjectives => "Financial Objectives",
            Self::ExitStrategy => "Exit Strategy",
            Self::Conclusion => "Conclusion",
        }
    }

    /// URL-safe identifier used by the detail-collection endpoints.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::CompanyOverview => "company-overview",
            Self::MissionAndVision => "mission-vision",
            Self::ExecutiveSummary => "executive-summary",
            Self::OwnersAndPartnerships => "owners-and-partnerships",
            Self::IndustryOverview => "industry-overview-and-trends",
            Self::Competition => "competition",
            Self::ProblemStatement => "problem-statement",
            Self::MarketingPlan => "marketing-plan",
            Self::ProposedSolution => "proposed-solution",
            Self::MarketAnalysis => "market-analysis",
            Self::SustainablePractices => "sustainable-practices",
            Self::ImplementationTimeline => "implementation-timeline",
            Self::StaffNames => "staff-names",
            Self::FinancialObjectives => "financial-objectives",
            Self::ExitStrategy => "exit-strategy",
            Self::Conclusion => "conclusion",
        }
    }

    /// Resolve a display name or slug to a topic.
    ///
    /// Matching ignores case and treats runs of spaces, hyphens and
    /// underscores as one separator. Anything else is rejected.
    pub fn parse(input: &str) -> Result<Self> {
        let key = separator_key(input);
        TAXONOMY
            .iter()
            .copied()
            .find(|t| separator_key(t.name()) == key || separator_key(t.slug()) == key)
            .ok_or_else(|| ProposalError::UnknownTopic(input.trim().to_string()))
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Topic {
    type Err = ProposalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn separator_key(s: &str) -> String {
    static SEP_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[\s_-]+").expect("valid regex"));
    SEP_RE
        .replace_all(s.trim(), " ")
        .to_lowercase()
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// A named ordering of topics; defines section order in the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub name: String,
    pub topics: Vec<Topic>,
    /// Shipped with the tool rather than defined in config.
    pub builtin: bool,
}

impl Template {
    /// Build a template, rejecting empty or duplicated topic lists.
    pub fn new(name: impl Into<String>, topics: Vec<Topic>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ProposalError::config("template name must not be empty"));
        }
        if topics.is_empty() {
            return Err(ProposalError::config(format!(
                "template '{name}' lists no topics"
            )));
        }
        for (i, topic) in topics.iter().enumerate() {
            if topics[..i].contains(topic) {
                return Err(ProposalError::config(format!(
                    "template '{name}' lists '{topic}' more than once"
                )));
            }
        }
        Ok(Self {
            name,
            topics,
            builtin: false,
        })
    }
}

/// Name of the template used when the caller does not pick one.
pub const DEFAULT_TEMPLATE: &str = "Template 1";

fn builtin_templates() -> Vec<Template> {
    use Topic::*;

    let table: [(&str, [Topic; 9]); 3] = [
        (
            "Template 1",
            [
                CompanyOverview,
                MissionAndVision,
                ExecutiveSummary,
                ProblemStatement,
                ProposedSolution,
                MarketAnalysis,
                MarketingPlan,
                ImplementationTimeline,
                Conclusion,
            ],
        ),
        (
            "Template 2",
            [
                ExecutiveSummary,
                ProblemStatement,
                MarketAnalysis,
                ProposedSolution,
                MarketingPlan,
                ImplementationTimeline,
                Conclusion,
                CompanyOverview,
                MissionAndVision,
            ],
        ),
        (
            "Template 3",
            [
                MarketAnalysis,
                ProblemStatement,
                ProposedSolution,
                MarketingPlan,
                ImplementationTimeline,
                Conclusion,
                MissionAndVision,
                CompanyOverview,
                ExecutiveSummary,
            ],
        ),
    ];

    table
        .into_iter()
        .map(|(name, topics)| Template {
            name: name.to_string(),
            topics: topics.to_vec(),
            builtin: true,
        })
        .collect()
}

/// The registered set of templates: the built-ins plus any from config.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self {
            templates: builtin_templates(),
        }
    }
}

impl TemplateRegistry {
    /// Built-ins extended with the `[[templates]]` entries from config.
    pub fn from_config(custom: &[TemplateConfig]) -> Result<Self> {
        let mut registry = Self::default();
        for entry in custom {
            let topics = entry
                .topics
                .iter()
                .map(|t| Topic::parse(t))
                .collect::<Result<Vec<_>>>()
                .map_err(|e| {
                    ProposalError::config(format!("template '{}': {e}", entry.name))
                })?;
            registry.register(Template::new(entry.name.clone(), topics)?)?;
        }
        Ok(registry)
    }

    /// Add a template. Names are unique, compared case-insensitively.
    pub fn register(&mut self, template: Template) -> Result<()> {
        if self.find(&template.name).is_some() {
            return Err(ProposalError::config(format!(
                "template '{}' is already registered",
                template.name
            )));
        }
        self.templates.push(template);
        Ok(())
    }

    /// Look up a template by name.
    pub fn get(&self, name: &str) -> Result<&Template> {
        self.find(name)
            .ok_or_else(|| ProposalError::UnknownTemplate(name.to_string()))
    }

    /// All templates in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    fn find(&self, name: &str) -> Option<&Template> {
        let wanted = name.trim();
        self.templates
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(wanted))
    }
}
