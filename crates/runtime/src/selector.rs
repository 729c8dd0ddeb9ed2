//! Section selection: the oracle reads the digest and names the regions to
//! extract.

use tracing::{debug, info, instrument};

use pagesift_config::SelectionMode;
use pagesift_dom::{Identifier, split_hints};
use pagesift_llm::{Oracle, find_json_array};

use crate::prompts::selection_prompt;
use crate::{CallContext, ExtractError};

/// What the selector produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Structured identifiers, matched strictly.
    Identifiers(Vec<Identifier>),
    /// Free-text hints, matched loosely.
    Hints(Vec<String>),
}

impl Selection {
    pub fn len(&self) -> usize {
        match self {
            Self::Identifiers(ids) => ids.len(),
            Self::Hints(hints) => hints.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read a selector reply.
///
/// Strict mode needs a JSON array (fenced or inline); a reply without one
/// is an [`ExtractError::OracleResponse`].  Entries without a tag are
/// dropped.  Loose mode splits the reply into hints and never fails.
pub fn parse_selection(reply: &str, mode: SelectionMode) -> Result<Selection, ExtractError> {
    match mode {
        SelectionMode::Strict => {
            let values = find_json_array(reply).ok_or_else(|| {
                ExtractError::OracleResponse(format!(
                    "no JSON array in a {}-char selector reply",
                    reply.chars().count()
                ))
            })?;
            Ok(Selection::Identifiers(Identifier::from_values(&values)))
        }
        SelectionMode::Loose => Ok(Selection::Hints(split_hints(reply))),
    }
}

#[instrument(skip_all, fields(mode = ?mode, digest_len = digest.len()))]
pub async fn select_sections(
    oracle: &dyn Oracle,
    ctx: &CallContext,
    task: &str,
    digest: &str,
    mode: SelectionMode,
) -> Result<Selection, ExtractError> {
    let prompt = selection_prompt(task, digest, mode);
    let reply = ctx.guard(oracle.complete(&prompt)).await??;
    ctx.record("selection_reply", &reply).await;
    debug!(reply_len = reply.len(), "selector replied");

    let selection = parse_selection(&reply, mode)?;
    info!(count = selection.len(), "sections selected");
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_array_is_preferred() {
        let reply = "Sure! [not json]\n```json\n[{\"tag\": \"h2\", \"text\": \"Schedule\"}]\n```";
        let selection = parse_selection(reply, SelectionMode::Strict).unwrap();
        assert_eq!(
            selection,
            Selection::Identifiers(vec![Identifier::new("h2").with_text("Schedule")])
        );
    }

    #[test]
    fn first_parseable_inline_array() {
        let reply = "Look at [these] ones: [{\"tag\":\"table\",\"id\":\"games\"}] thanks";
        let Selection::Identifiers(ids) = parse_selection(reply, SelectionMode::Strict).unwrap()
        else {
            panic!("expected identifiers");
        };
        assert_eq!(ids, vec![Identifier::new("table").with_id("games")]);
    }

    #[test]
    fn reply_without_array_is_a_parse_failure() {
        let err = parse_selection("The schedule section, probably.", SelectionMode::Strict)
            .unwrap_err();
        assert!(matches!(err, ExtractError::OracleResponse(_)));
    }

    #[test]
    fn tagless_entries_are_rejected_before_matching() {
        let reply = r#"[{"id": "x"}, {"tag": "p", "class": "game"}]"#;
        let selection = parse_selection(reply, SelectionMode::Strict).unwrap();
        assert_eq!(
            selection,
            Selection::Identifiers(vec![Identifier::new("p").with_class("game")])
        );
    }

    #[test]
    fn loose_mode_accepts_free_text() {
        let selection = parse_selection("schedule, games\nscores", SelectionMode::Loose).unwrap();
        assert_eq!(
            selection,
            Selection::Hints(vec!["schedule".into(), "games".into(), "scores".into()])
        );
    }
}
