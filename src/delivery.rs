//! Reply delivery: inline text or a `response.txt` attachment.
//!
//! Chat platforms cap message length. Replies within
//! [`AssistantConfig::inline_reply_limit`](crate::AssistantConfig) characters
//! go out inline; longer ones become a UTF-8 text attachment, and the text
//! is kept in a [`ResponseCache`] so the user can ask for a DOCX export of
//! it afterwards.

use serde::Serialize;
use tracing::debug;

use crate::cache::ResponseCache;
use crate::config::AssistantConfig;
use crate::error::RenderError;
use crate::pipeline::render::render_markdown_to_docx;

pub const ATTACHMENT_FILENAME: &str = "response.txt";
pub const EXPORT_FILENAME: &str = "response.docx";
pub const ATTACHMENT_CAPTION: &str = "The reply is too long for a message, sending it as a file.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Inline {
        text: String,
    },
    Attachment {
        filename: String,
        caption: String,
        #[serde(skip)]
        bytes: Vec<u8>,
        /// Key for [`ReplyPlanner::export_docx`].
        cache_id: String,
    },
}

#[derive(Debug)]
pub struct ReplyPlanner {
    inline_limit: usize,
    cache: ResponseCache,
}

impl ReplyPlanner {
    pub fn new(config: &AssistantConfig) -> Self {
        Self {
            inline_limit: config.inline_reply_limit,
            cache: ResponseCache::new(config.cache_capacity, config.cache_ttl()),
        }
    }

    pub fn plan(&self, text: &str) -> Reply {
        let chars = text.chars().count();
        if chars <= self.inline_limit {
            return Reply::Inline {
                text: text.to_string(),
            };
        }

        let cache_id = self.cache.insert(text);
        debug!(
            "Reply of {} chars exceeds {}; sending as attachment {}",
            chars, self.inline_limit, cache_id
        );
        Reply::Attachment {
            filename: ATTACHMENT_FILENAME.to_string(),
            caption: ATTACHMENT_CAPTION.to_string(),
            bytes: text.as_bytes().to_vec(),
            cache_id,
        }
    }

    /// Render a cached reply as DOCX. `Ok(None)` when it expired or was
    /// evicted.
    pub fn export_docx(&self, cache_id: &str) -> Result<Option<Vec<u8>>, RenderError> {
        match self.cache.get(cache_id) {
            Some(text) => render_markdown_to_docx(&text).map(Some),
            None => Ok(None),
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::Document;
    use crate::pipeline::extract::plain_text;

    fn planner(limit: usize) -> ReplyPlanner {
        let config = AssistantConfig::builder()
            .inline_reply_limit(limit)
            .build()
            .unwrap();
        ReplyPlanner::new(&config)
    }

    #[test]
    fn short_reply_is_inline() {
        let reply = planner(10).plan("0123456789");
        assert_eq!(reply, Reply::Inline { text: "0123456789".into() });
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        // 10 Cyrillic characters are 20 bytes.
        assert!(matches!(planner(10).plan("ДокументЫЙ"), Reply::Inline { .. }));
    }

    #[test]
    fn long_reply_becomes_cached_attachment() {
        let planner = planner(5);
        let Reply::Attachment { filename, bytes, cache_id, .. } = planner.plan("# Title\n\nbody text")
        else {
            panic!("expected attachment");
        };
        assert_eq!(filename, ATTACHMENT_FILENAME);
        assert_eq!(bytes, b"# Title\n\nbody text");
        assert_eq!(planner.cache().len(), 1);

        let docx = planner.export_docx(&cache_id).unwrap().expect("cached");
        let doc = Document::parse(&docx).unwrap();
        assert_eq!(plain_text(&doc), "Title\nbody text");
    }

    #[test]
    fn unknown_export_is_none() {
        assert_eq!(planner(5).export_docx("nope").unwrap(), None);
    }
}
