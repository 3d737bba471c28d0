use crate::models::{Article, Category};

/// PostFilter
///
/// Narrows an already-fetched post list. Every set criterion must match; an
/// empty filter keeps everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFilter {
    /// Case-insensitive substring of title, excerpt, content or author name.
    pub query: Option<String>,
    pub category: Option<Category>,
    /// Exact tag name.
    pub tag: Option<String>,
}

impl PostFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn matches(&self, article: &Article) -> bool {
        if self.category.is_some_and(|c| c != article.category) {
            return false;
        }

        if let Some(tag) = self.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            if !article.tags.iter().any(|t| t.name == tag) {
                return false;
            }
        }

        match self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            Some(query) => {
                let needle = query.to_lowercase();
                [
                    article.title.as_str(),
                    article.excerpt.as_str(),
                    article.content.as_str(),
                    article.author.name.as_str(),
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }

    /// The matching posts, in their original order.
    pub fn apply<'a>(&self, posts: &'a [Article]) -> Vec<&'a Article> {
        posts.iter().filter(|post| self.matches(post)).collect()
    }
}
