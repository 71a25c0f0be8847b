use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    pub fn merge(&self, other: &TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
        }
    }

    /// Merge optional usages; `None` entries are skipped and an
    /// all-`None` input stays `None`.
    pub fn merge_options<'a, I>(usages: I) -> Option<TokenUsage>
    where
        I: IntoIterator<Item = &'a Option<TokenUsage>>,
    {
        usages
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<TokenUsage>, usage| match acc {
                Some(acc) => Some(acc.merge(usage)),
                None => Some(usage.clone()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_options_skips_none() {
        let a = Some(TokenUsage::new(10, 5));
        let b = None;
        let c = Some(TokenUsage::new(1, 1));
        let merged = TokenUsage::merge_options([&a, &b, &c]).unwrap();
        assert_eq!(merged.prompt_tokens, 11);
        assert_eq!(merged.completion_tokens, 6);
        assert_eq!(merged.total_tokens, 17);
    }

    #[test]
    fn merge_options_of_all_none_is_none() {
        assert_eq!(TokenUsage::merge_options([&None, &None]), None);
    }
}
