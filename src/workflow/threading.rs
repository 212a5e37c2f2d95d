//! Reply-thread resolution — does a new draft continue a prior topic?

use std::sync::Arc;

use crate::error::LlmError;
use crate::llm::NewsAnalyst;
use crate::store::PublishedPost;

/// Decides whether a draft continues one of the ledger's topics.
///
/// "Same topic" is narrow: the same event, person, or team continuation —
/// never mere domain overlap. Candidates go to the analyst title-only to
/// bound cost. Callers must treat `Ok(None)` as "no reply", never an error;
/// `Err` is a collaborator failure and is subject to the configured
/// resolver-failure policy.
pub struct ThreadResolver {
    analyst: Arc<dyn NewsAnalyst>,
}

impl ThreadResolver {
    pub fn new(analyst: Arc<dyn NewsAnalyst>) -> Self {
        Self { analyst }
    }

    /// Resolve the draft against a candidate window of published posts,
    /// returning the uid of the post it should reply to.
    pub async fn resolve(
        &self,
        title: &str,
        draft_text: &str,
        candidates: &[PublishedPost],
    ) -> Result<Option<String>, LlmError> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let titles: Vec<String> = candidates.iter().map(|p| p.title.clone()).collect();
        let index = self.analyst.find_related(title, draft_text, &titles).await?;

        match index.and_then(|i| candidates.get(i)) {
            Some(post) => {
                tracing::info!(target_uid = %post.uid, "thread resolver matched a prior post");
                Ok(Some(post.uid.clone()))
            }
            None => {
                tracing::debug!("thread resolver found no continuation");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::feed::NewsItem;
    use crate::llm::BatchScore;

    /// Analyst stub with a fixed thread-matching answer.
    struct FixedAnalyst {
        answer: Result<Option<usize>, ()>,
    }

    #[async_trait]
    impl NewsAnalyst for FixedAnalyst {
        async fn score_batch(&self, _items: &[NewsItem]) -> Result<Vec<BatchScore>, LlmError> {
            Ok(Vec::new())
        }

        async fn generate_post(
            &self,
            _title: &str,
            _article: &str,
            _style_context: &[String],
        ) -> Result<String, LlmError> {
            Ok(String::new())
        }

        async fn find_related(
            &self,
            _title: &str,
            _draft_text: &str,
            _candidate_titles: &[String],
        ) -> Result<Option<usize>, LlmError> {
            self.answer.clone().map_err(|_| LlmError::RequestFailed {
                reason: "stubbed outage".to_string(),
            })
        }
    }

    fn posts(n: usize) -> Vec<PublishedPost> {
        (0..n)
            .map(|i| PublishedPost {
                uid: format!("uid{i}"),
                title: format!("title {i}"),
                text: format!("text {i}"),
                channel_message_id: i as i64 + 100,
                timestamp: Utc::now(),
            })
            .collect()
    }

    fn resolver(answer: Result<Option<usize>, ()>) -> ThreadResolver {
        ThreadResolver::new(Arc::new(FixedAnalyst { answer }))
    }

    #[tokio::test]
    async fn fixed_index_maps_to_that_candidate() {
        let r = resolver(Ok(Some(1)));
        let result = r.resolve("t", "d", &posts(3)).await.unwrap();
        assert_eq!(result.as_deref(), Some("uid1"));
    }

    #[tokio::test]
    async fn null_index_is_no_reply() {
        let r = resolver(Ok(None));
        assert_eq!(r.resolve("t", "d", &posts(3)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn out_of_range_index_is_no_reply() {
        let r = resolver(Ok(Some(9)));
        assert_eq!(r.resolve("t", "d", &posts(3)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_candidates_skip_the_analyst() {
        // The stub would error, but with no candidates it is never asked.
        let r = resolver(Err(()));
        assert_eq!(r.resolve("t", "d", &[]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn analyst_failure_propagates_for_policy_handling() {
        let r = resolver(Err(()));
        assert!(r.resolve("t", "d", &posts(3)).await.is_err());
    }
}
