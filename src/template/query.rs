//! Template search and ordering

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::core::identity::RecordId;
use crate::template::model::{SortPolicy, Template};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Name,
    Usage,
    Date,
    /// Best text match first; without a search term this is name order
    Relevance,
}

impl From<SortPolicy> for SortBy {
    fn from(policy: SortPolicy) -> Self {
        match policy {
            SortPolicy::Name => SortBy::Name,
            SortPolicy::Usage => SortBy::Usage,
            SortPolicy::Date => SortBy::Date,
        }
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(SortBy::Name),
            "usage" => Ok(SortBy::Usage),
            "date" => Ok(SortBy::Date),
            "relevance" => Ok(SortBy::Relevance),
            _ => Err(format!(
                "Unknown sort field: {}. Use name, usage, date, or relevance",
                s
            )),
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortBy::Name => write!(f, "name"),
            SortBy::Usage => write!(f, "usage"),
            SortBy::Date => write!(f, "date"),
            SortBy::Relevance => write!(f, "relevance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("Unknown sort order: {}. Use asc or desc", s)),
        }
    }
}

/// Conjunctive template filter with sort and pagination
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Case-insensitive substring of name, description or any tag
    pub search: Option<String>,
    pub category: Option<RecordId>,
    /// Matches templates carrying at least one of these tags
    pub tags: Vec<String>,
    pub node_type: Option<String>,
    pub author: Option<String>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn category(mut self, category: RecordId) -> Self {
        self.category = Some(category);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn node_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn sort(mut self, by: SortBy, order: SortOrder) -> Self {
        self.sort_by = by;
        self.sort_order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(&self, template: &Template) -> bool {
        if let Some(category) = &self.category {
            if template.category.as_ref() != Some(category) {
                return false;
            }
        }
        if let Some(node_type) = &self.node_type {
            if &template.node_type != node_type {
                return false;
            }
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| template.has_tag(t)) {
            return false;
        }
        if let Some(author) = &self.author {
            if &template.metadata.author != author {
                return false;
            }
        }
        match self.search_term() {
            Some(term) => relevance(template, &term) > 0,
            None => true,
        }
    }

    fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    /// Filter, sort, then paginate
    pub fn apply<'a, I>(&self, templates: I) -> Vec<Template>
    where
        I: IntoIterator<Item = &'a Template>,
    {
        let mut results: Vec<&Template> = templates.into_iter().filter(|t| self.matches(t)).collect();
        let term = self.search_term();
        sort_templates(&mut results, self.sort_by, self.sort_order, term.as_deref());
        results
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

/// Name 3, tag 2, description 1; zero means no match
fn relevance(template: &Template, term: &str) -> u32 {
    let mut score = 0;
    if template.name.to_lowercase().contains(term) {
        score += 3;
    }
    if template
        .metadata
        .tags
        .iter()
        .any(|tag| tag.to_lowercase().contains(term))
    {
        score += 2;
    }
    if template.description.to_lowercase().contains(term) {
        score += 1;
    }
    score
}

fn by_name(a: &Template, b: &Template) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}

pub fn sort_templates(templates: &mut [&Template], by: SortBy, order: SortOrder, term: Option<&str>) {
    templates.sort_by(|a, b| {
        let ordering = match by {
            SortBy::Name => by_name(a, b),
            SortBy::Usage => a.metadata.usage_count.cmp(&b.metadata.usage_count),
            SortBy::Date => a.metadata.updated_at.cmp(&b.metadata.updated_at),
            SortBy::Relevance => match term {
                // higher score is "smaller" so ascending puts best first
                Some(term) => relevance(b, term)
                    .cmp(&relevance(a, term))
                    .then_with(|| by_name(a, b)),
                None => by_name(a, b),
            },
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::IdPrefix;
    use crate::core::value::PropertyBag;
    use crate::template::model::{TemplateConfig, TemplateMetadata, UiConfig};

    fn template(name: &str, node_type: &str, tags: &[&str], usage: u64) -> Template {
        let mut metadata = TemplateMetadata::new("alice", tags.iter().map(|t| t.to_string()).collect());
        metadata.usage_count = usage;
        Template {
            id: RecordId::new(IdPrefix::Tpl),
            name: name.into(),
            description: format!("{} description", name),
            category: None,
            icon: String::new(),
            node_type: node_type.into(),
            properties: PropertyBag::new(),
            ui_config: UiConfig::default(),
            template_config: TemplateConfig::default(),
            metadata,
            dynamic_form: None,
            preview: None,
        }
    }

    fn fixtures() -> Vec<Template> {
        vec![
            template("Send Invoice", "bpmn:ServiceTask", &["finance"], 5),
            template("approve leave", "bpmn:UserTask", &["hr"], 12),
            template("Archive", "bpmn:ServiceTask", &["records", "finance"], 0),
            template("Escalate", "bpmn:UserTask", &["hr", "sla"], 3),
        ]
    }

    fn names(results: &[Template]) -> Vec<&str> {
        results.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_default_sort_is_name_ascending_case_insensitive() {
        let all = fixtures();
        let results = SearchQuery::new().apply(&all);
        assert_eq!(names(&results), vec!["approve leave", "Archive", "Escalate", "Send Invoice"]);
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let all = fixtures();
        let results = SearchQuery::new()
            .node_type("bpmn:ServiceTask")
            .tag("finance")
            .text("INV")
            .apply(&all);
        assert_eq!(names(&results), vec!["Send Invoice"]);
    }

    #[test]
    fn test_text_matches_tags_and_description() {
        let all = fixtures();
        assert_eq!(names(&SearchQuery::new().text("sla").apply(&all)), vec!["Escalate"]);
        assert_eq!(SearchQuery::new().text("description").apply(&all).len(), 4);
    }

    #[test]
    fn test_pagination_after_sort() {
        let all = fixtures();
        let results = SearchQuery::new()
            .sort(SortBy::Usage, SortOrder::Desc)
            .offset(1)
            .limit(2)
            .apply(&all);
        assert_eq!(names(&results), vec!["Send Invoice", "Escalate"]);
    }

    #[test]
    fn test_relevance_prefers_name_hits() {
        let mut all = fixtures();
        all[2].description = "finance archive for invoices".into();
        let results = SearchQuery::new()
            .text("invoice")
            .sort(SortBy::Relevance, SortOrder::Asc)
            .apply(&all);
        assert_eq!(names(&results), vec!["Send Invoice", "Archive"]);
    }

    #[test]
    fn test_author_filter() {
        let mut all = fixtures();
        all[0].metadata.author = "bob".into();
        let results = SearchQuery::new().author("bob").apply(&all);
        assert_eq!(names(&results), vec!["Send Invoice"]);
    }
}
