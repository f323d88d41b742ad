//! Cache key discipline.
//!
//! One key per owner and resource type, plus a few per-owner scalar
//! entries (profile, rate-limit reports). Query shaping (sort, search, page)
//! is never folded into a key: every view is derived from the one cached
//! collection.

use std::fmt;

use crate::resource::ResourceType;

/// Namespace of the short-lived rate-limit probe.
const RATE_LIMIT_NAMESPACE: &str = "rate_limit";
const RATE_LIMIT_REPORT_NAMESPACE: &str = "rate_limit_full";
const PROFILE_NAMESPACE: &str = "profile";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
  /// Full dataset of one resource type
  Dataset {
    resource_type: ResourceType,
    owner_id: String,
  },
  /// Last known GitHub rate-limit headroom for an owner's token
  RateLimit { owner_id: String },
  /// Full quota report served by the debug endpoint
  RateLimitReport { owner_id: String },
  /// Extended user profile
  Profile { owner_id: String },
}

impl CacheKey {
  pub fn dataset(resource_type: ResourceType, owner_id: &str) -> Self {
    Self::Dataset {
      resource_type,
      owner_id: owner_id.to_string(),
    }
  }

  pub fn rate_limit(owner_id: &str) -> Self {
    Self::RateLimit {
      owner_id: owner_id.to_string(),
    }
  }

  pub fn rate_limit_report(owner_id: &str) -> Self {
    Self::RateLimitReport {
      owner_id: owner_id.to_string(),
    }
  }

  pub fn profile(owner_id: &str) -> Self {
    Self::Profile {
      owner_id: owner_id.to_string(),
    }
  }

  /// Every key that belongs to an owner.
  pub fn all_for_owner(owner_id: &str) -> Vec<CacheKey> {
    ResourceType::ALL
      .iter()
      .map(|rt| Self::dataset(*rt, owner_id))
      .chain([
        Self::rate_limit(owner_id),
        Self::rate_limit_report(owner_id),
        Self::profile(owner_id),
      ])
      .collect()
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Dataset {
        resource_type,
        owner_id,
      } => write!(f, "{}:{}", resource_type, owner_id),
      Self::RateLimit { owner_id } => write!(f, "{}:{}", RATE_LIMIT_NAMESPACE, owner_id),
      Self::RateLimitReport { owner_id } => {
        write!(f, "{}:{}", RATE_LIMIT_REPORT_NAMESPACE, owner_id)
      }
      Self::Profile { owner_id } => write!(f, "{}:{}", PROFILE_NAMESPACE, owner_id),
    }
  }
}

/// Owner segment of a rendered key (`"gists:42"` -> `"42"`).
pub fn owner_of(key: &str) -> Option<&str> {
  key.split_once(':').map(|(_, owner)| owner)
}
