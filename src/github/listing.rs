//! Search and table-sort behaviour of each listed item type.

use crate::view::{any_contains, Listable, SortField, SortValue};

use super::types::{Follower, Gist, PullRequest, Repository};

// ============================================================================
// Repositories
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryField {
  Name,
  FullName,
  Language,
  Stars,
  Forks,
  Watchers,
  Size,
  Created,
  Updated,
  Pushed,
}

impl SortField for RepositoryField {
  fn parse(name: &str) -> Option<Self> {
    match name.trim().to_lowercase().as_str() {
      "name" => Some(Self::Name),
      "full_name" => Some(Self::FullName),
      "language" => Some(Self::Language),
      "stargazers_count" | "stars" => Some(Self::Stars),
      "forks_count" | "forks" => Some(Self::Forks),
      "watchers_count" | "watchers" => Some(Self::Watchers),
      "size" => Some(Self::Size),
      "created_at" | "created" => Some(Self::Created),
      "updated_at" | "updated" => Some(Self::Updated),
      "pushed_at" | "pushed" => Some(Self::Pushed),
      _ => None,
    }
  }

  fn name(&self) -> &'static str {
    match self {
      Self::Name => "name",
      Self::FullName => "full_name",
      Self::Language => "language",
      Self::Stars => "stargazers_count",
      Self::Forks => "forks_count",
      Self::Watchers => "watchers_count",
      Self::Size => "size",
      Self::Created => "created_at",
      Self::Updated => "updated_at",
      Self::Pushed => "pushed_at",
    }
  }
}

impl Listable for Repository {
  type Field = RepositoryField;

  fn matches(&self, needle: &str) -> bool {
    any_contains(
      [
        Some(self.name.as_str()),
        self.description.as_deref(),
        self.language.as_deref(),
      ]
      .into_iter()
      .flatten()
      .chain(self.topics.iter().map(String::as_str)),
      needle,
    )
  }

  fn sort_value(&self, field: RepositoryField) -> SortValue {
    match field {
      RepositoryField::Name => SortValue::text(&self.name),
      RepositoryField::FullName => SortValue::text(&self.full_name),
      RepositoryField::Language => SortValue::opt_text(self.language.as_deref()),
      RepositoryField::Stars => SortValue::int(saturate(self.stargazers_count)),
      RepositoryField::Forks => SortValue::int(saturate(self.forks_count)),
      RepositoryField::Watchers => SortValue::int(saturate(self.watchers_count)),
      RepositoryField::Size => SortValue::int(saturate(self.size)),
      RepositoryField::Created => SortValue::opt_time(self.created_at),
      RepositoryField::Updated => SortValue::opt_time(self.updated_at),
      RepositoryField::Pushed => SortValue::opt_time(self.pushed_at),
    }
  }
}

// ============================================================================
// Gists
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GistField {
  Description,
  Comments,
  Files,
  Public,
  Created,
  Updated,
}

impl SortField for GistField {
  fn parse(name: &str) -> Option<Self> {
    match name.trim().to_lowercase().as_str() {
      "description" => Some(Self::Description),
      "comments" => Some(Self::Comments),
      "files" | "file_count" => Some(Self::Files),
      "public" => Some(Self::Public),
      "created_at" | "created" => Some(Self::Created),
      "updated_at" | "updated" => Some(Self::Updated),
      _ => None,
    }
  }

  fn name(&self) -> &'static str {
    match self {
      Self::Description => "description",
      Self::Comments => "comments",
      Self::Files => "files",
      Self::Public => "public",
      Self::Created => "created_at",
      Self::Updated => "updated_at",
    }
  }
}

impl Listable for Gist {
  type Field = GistField;

  fn matches(&self, needle: &str) -> bool {
    let files = self
      .files
      .iter()
      .flat_map(|f| [Some(f.filename.as_str()), f.language.as_deref()])
      .flatten();
    any_contains(self.description.as_deref().into_iter().chain(files), needle)
  }

  fn sort_value(&self, field: GistField) -> SortValue {
    match field {
      GistField::Description => SortValue::opt_text(self.description.as_deref()),
      GistField::Comments => SortValue::int(saturate(self.comments)),
      GistField::Files => SortValue::int(saturate(self.file_count as u64)),
      GistField::Public => SortValue::Bool(self.public),
      GistField::Created => SortValue::opt_time(self.created_at),
      GistField::Updated => SortValue::opt_time(self.updated_at),
    }
  }
}

// ============================================================================
// Followers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerField {
  Login,
  Id,
  Type,
}

impl SortField for FollowerField {
  fn parse(name: &str) -> Option<Self> {
    match name.trim().to_lowercase().as_str() {
      "login" => Some(Self::Login),
      "id" => Some(Self::Id),
      "type" => Some(Self::Type),
      _ => None,
    }
  }

  fn name(&self) -> &'static str {
    match self {
      Self::Login => "login",
      Self::Id => "id",
      Self::Type => "type",
    }
  }
}

impl Listable for Follower {
  type Field = FollowerField;

  fn matches(&self, needle: &str) -> bool {
    any_contains([self.login.as_str(), self.account_type.as_str()], needle)
  }

  fn sort_value(&self, field: FollowerField) -> SortValue {
    match field {
      FollowerField::Login => SortValue::text(&self.login),
      FollowerField::Id => SortValue::int(saturate(self.id)),
      FollowerField::Type => SortValue::opt_text(Some(self.account_type.as_str())),
    }
  }
}

// ============================================================================
// Pull requests
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestField {
  Number,
  Title,
  State,
  Author,
  Repository,
  Comments,
  Commits,
  Additions,
  Deletions,
  ChangedFiles,
  Created,
  Updated,
  Closed,
}

impl SortField for PullRequestField {
  fn parse(name: &str) -> Option<Self> {
    match name.trim().to_lowercase().as_str() {
      "number" => Some(Self::Number),
      "title" => Some(Self::Title),
      "state" => Some(Self::State),
      "author" | "user" => Some(Self::Author),
      "repository" | "repo" => Some(Self::Repository),
      "comments" => Some(Self::Comments),
      "commits" => Some(Self::Commits),
      "additions" => Some(Self::Additions),
      "deletions" => Some(Self::Deletions),
      "changed_files" => Some(Self::ChangedFiles),
      "created_at" | "created" => Some(Self::Created),
      "updated_at" | "updated" => Some(Self::Updated),
      "closed_at" | "closed" => Some(Self::Closed),
      _ => None,
    }
  }

  fn name(&self) -> &'static str {
    match self {
      Self::Number => "number",
      Self::Title => "title",
      Self::State => "state",
      Self::Author => "author",
      Self::Repository => "repository",
      Self::Comments => "comments",
      Self::Commits => "commits",
      Self::Additions => "additions",
      Self::Deletions => "deletions",
      Self::ChangedFiles => "changed_files",
      Self::Created => "created_at",
      Self::Updated => "updated_at",
      Self::Closed => "closed_at",
    }
  }
}

impl Listable for PullRequest {
  type Field = PullRequestField;

  fn matches(&self, needle: &str) -> bool {
    let number = self.number.to_string();
    let fields = [
      Some(self.title.as_str()),
      self.body.as_deref(),
      self.user.as_ref().map(|u| u.login.as_str()),
      self.repository.as_ref().map(|r| r.name.as_str()),
      self.repository.as_ref().map(|r| r.full_name.as_str()),
      Some(number.as_str()),
    ];
    any_contains(fields.into_iter().flatten(), needle)
  }

  fn sort_value(&self, field: PullRequestField) -> SortValue {
    match field {
      PullRequestField::Number => SortValue::int(saturate(self.number)),
      PullRequestField::Title => SortValue::text(&self.title),
      PullRequestField::State => SortValue::text(&self.state),
      PullRequestField::Author => SortValue::opt_text(self.user.as_ref().map(|u| u.login.as_str())),
      PullRequestField::Repository => {
        SortValue::opt_text(self.repository.as_ref().map(|r| r.full_name.as_str()))
      }
      PullRequestField::Comments => SortValue::int(saturate(self.comments)),
      PullRequestField::Commits => SortValue::int(saturate(self.commits)),
      PullRequestField::Additions => SortValue::int(saturate(self.additions)),
      PullRequestField::Deletions => SortValue::int(saturate(self.deletions)),
      PullRequestField::ChangedFiles => SortValue::int(saturate(self.changed_files)),
      PullRequestField::Created => SortValue::opt_time(self.created_at),
      PullRequestField::Updated => SortValue::opt_time(self.updated_at),
      PullRequestField::Closed => SortValue::opt_time(self.closed_at),
    }
  }
}

fn saturate(n: u64) -> i64 {
  i64::try_from(n).unwrap_or(i64::MAX)
}


#[cfg(test)]
mod tests {
  use super::fixtures::*;
  use super::*;
  use crate::cache::CachedCollection;
  use crate::resource::ResourceType;
  use crate::view::{apply, SortDirection, SortSpec, ViewRequest};

  fn numbers(result: &crate::view::ViewResult<PullRequest>) -> Vec<u64> {
    result.items.iter().map(|pr| pr.number).collect()
  }

  fn pulls() -> CachedCollection<PullRequest> {
    CachedCollection::new(
      "1",
      ResourceType::PullRequests,
      vec![
        pull_request(5, "Fix login"),
        pull_request(2, "Add docs"),
        pull_request(8, "Refactor"),
      ],
    )
  }

  #[test]
  fn test_pull_requests_sorted_by_number() {
    let request = ViewRequest {
      sort: Some(SortSpec::new(PullRequestField::Number, SortDirection::Asc)),
      ..Default::default()
    };
    let result = apply(&pulls(), &request);
    assert_eq!(numbers(&result), vec![2, 5, 8]);

    let request = ViewRequest {
      sort: Some(SortSpec::new(PullRequestField::Created, SortDirection::Desc)),
      ..Default::default()
    };
    assert_eq!(numbers(&apply(&pulls(), &request)), vec![8, 5, 2]);
  }

  #[test]
  fn test_pull_request_search() {
    let request = ViewRequest {
      search: Some("fix".to_string()),
      ..Default::default()
    };
    let result = apply(&pulls(), &request);
    assert_eq!(result.total_count, 1);
    assert_eq!(numbers(&result), vec![5]);

    // Number and repository are searchable too
    let by_number = ViewRequest {
      search: Some("8".to_string()),
      ..Default::default()
    };
    assert_eq!(numbers(&apply(&pulls(), &by_number)), vec![8]);

    let by_repo = ViewRequest {
      search: Some("OCTO/GH".to_string()),
      ..Default::default()
    };
    assert_eq!(apply(&pulls(), &by_repo).total_count, 3);
  }

  #[test]
  fn test_repository_missing_language_sorts_last() {
    let collection = CachedCollection::new(
      "1",
      ResourceType::Repositories,
      vec![
        repository(1, "a", None),
        repository(2, "b", Some("Rust")),
        repository(3, "c", Some("go")),
      ],
    );

    for direction in [SortDirection::Asc, SortDirection::Desc] {
      let request = ViewRequest {
        sort: Some(SortSpec::new(RepositoryField::Language, direction)),
        ..Default::default()
      };
      let result = apply(&collection, &request);
      assert_eq!(result.items.last().map(|r| r.id), Some(1));
    }
  }

  #[test]
  fn test_repository_topics_are_searchable() {
    let mut tagged = repository(1, "tool", None);
    tagged.topics = vec!["caching".to_string()];
    assert!(tagged.matches("cach"));
    assert!(!repository(2, "tool", None).matches("cach"));
  }

  #[test]
  fn test_field_aliases() {
    assert_eq!(RepositoryField::parse("stars"), Some(RepositoryField::Stars));
    assert_eq!(RepositoryField::parse("Updated"), Some(RepositoryField::Updated));
    assert_eq!(RepositoryField::parse("bogus"), None);
    assert_eq!(GistField::parse("created"), Some(GistField::Created));
    assert_eq!(PullRequestField::parse("closed"), Some(PullRequestField::Closed));
    assert_eq!(FollowerField::parse("type").map(|f| f.name()), Some("type"));
  }

  #[test]
  fn test_follower_search_by_login() {
    let collection = CachedCollection::new(
      "1",
      ResourceType::Followers,
      vec![follower(1, "alice"), follower(2, "bob")],
    );
    let request = ViewRequest {
      search: Some("ALI".to_string()),
      ..Default::default()
    };
    assert_eq!(apply(&collection, &request).items[0].login, "alice");
  }
}
