/// A single `gh search prs` qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchFilter {
    StateOpen,
    AuthorMe,
    ReviewRequestedMe,
    InvolvesMe,
    DraftTrue,
    DraftFalse,
    ArchivedFalse,
    SortCreated,
}

impl SearchFilter {
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::StateOpen => "--state=open",
            Self::AuthorMe => "--author=@me",
            Self::ReviewRequestedMe => "--review-requested=@me",
            Self::InvolvesMe => "--involves=@me",
            Self::DraftTrue => "--draft=true",
            Self::DraftFalse => "--draft=false",
            Self::ArchivedFalse => "--archived=false",
            Self::SortCreated => "--sort=created",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub label: String,
    pub filters: Vec<SearchFilter>,
}

impl Category {
    pub fn new(label: &str, filters: &[SearchFilter]) -> Self {
        Self {
            label: label.to_string(),
            filters: filters.to_vec(),
        }
    }
}

/// The tabs shown at startup, in display order.
pub fn default_categories() -> Vec<Category> {
    use SearchFilter::*;

    vec![
        Category::new(
            "Review Requested",
            &[StateOpen, ReviewRequestedMe, DraftFalse, ArchivedFalse, SortCreated],
        ),
        Category::new(
            "My PRs",
            &[StateOpen, AuthorMe, DraftFalse, ArchivedFalse, SortCreated],
        ),
        Category::new(
            "Drafts",
            &[StateOpen, InvolvesMe, DraftTrue, ArchivedFalse, SortCreated],
        ),
        Category::new(
            "Involved",
            &[StateOpen, InvolvesMe, DraftFalse, ArchivedFalse, SortCreated],
        ),
    ]
}
