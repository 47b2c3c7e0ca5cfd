use jobgate_core::{AppError, AppResult};
use jobgate_domain::{ThrottleCategory, ThrottlePolicy};

/// Active policy for every throttle category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottlePolicies {
    policies: [ThrottlePolicy; 8],
}

impl ThrottlePolicies {
    /// Returns the built-in policy table.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            policies: ThrottleCategory::ALL.map(ThrottlePolicy::default_for),
        }
    }

    /// Builds the table from defaults plus `THROTTLE_<SLUG>_LIMIT` and
    /// `THROTTLE_<SLUG>_WINDOW_SECONDS` values returned by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut policies = Self::defaults();

        for category in ThrottleCategory::ALL {
            let prefix = category.env_prefix();
            let limit = parse_override::<u32>(&lookup, &format!("{prefix}_LIMIT"))?;
            let window_seconds =
                parse_override::<i64>(&lookup, &format!("{prefix}_WINDOW_SECONDS"))?;

            if limit.is_none() && window_seconds.is_none() {
                continue;
            }

            let policy = policies.get(category).with_overrides(limit, window_seconds)?;
            policies = policies.with_policy(policy);
        }

        Ok(policies)
    }

    /// Replaces the policy for the policy's category.
    #[must_use]
    pub fn with_policy(mut self, policy: ThrottlePolicy) -> Self {
        let index = policy.category() as usize;
        self.policies[index] = policy;
        self
    }

    /// Returns the policy for a category.
    #[must_use]
    pub fn get(&self, category: ThrottleCategory) -> &ThrottlePolicy {
        &self.policies[category as usize]
    }

    /// Iterates policies in category order.
    pub fn iter(&self) -> impl Iterator<Item = &ThrottlePolicy> {
        self.policies.iter()
    }
}

impl Default for ThrottlePolicies {
    fn default() -> Self {
        Self::defaults()
    }
}

fn parse_override<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> AppResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .filter(|value| !value.trim().is_empty())
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))
        })
        .transpose()
}
